//! Software compositor for one map frame: base map (or placeholder grid),
//! territory tiles, then place markers.

use faction_map_shared::{LayerKind, LayerState, Place, TILE_SIZE, ViewMode, Viewport};
use image::{Rgba, RgbaImage};

use crate::surface::{for_each_disc_pixel, source_over};
use crate::tile_cache::TileCache;

pub const BACKGROUND: (u8, u8, u8) = (0xf0, 0xf0, 0xf0);
pub const PLACEHOLDER_FILL: (u8, u8, u8) = (0xe0, 0xe0, 0xe0);
pub const GRID_LINE: (u8, u8, u8) = (0xcc, 0xcc, 0xcc);
pub const MARKER_FILL: (u8, u8, u8) = (0xd3, 0x2f, 0x2f);
pub const MARKER_HIGHLIGHT: (u8, u8, u8) = (0x19, 0x76, 0xd2);
pub const GRID_SPACING: f64 = 100.0;
pub const MARKER_RADIUS: f64 = 6.0;
pub const MARKER_HIGHLIGHT_RADIUS: f64 = 10.0;

/// Everything one frame is composed from.
pub struct RenderInput<'a> {
    pub viewport: &'a Viewport,
    pub layers: &'a [LayerState],
    pub base_image: Option<&'a RgbaImage>,
    /// Map size in map pixels; the placeholder grid covers this area when no image is loaded.
    pub map_size: (u32, u32),
    pub tiles: &'a TileCache,
    pub places: &'a [Place],
    pub view_mode: ViewMode,
    pub selected_place: Option<&'a str>,
}

fn layer(layers: &[LayerState], kind: LayerKind) -> Option<&LayerState> {
    layers.iter().find(|layer| layer.kind == kind && layer.visible)
}

/// Canvas-pixel rectangle `[x0, x1) x [y0, y1)` covering a map-space rectangle, clipped to the frame.
fn canvas_rect(
    viewport: &Viewport,
    frame: &RgbaImage,
    (mx0, my0): (f64, f64),
    (mx1, my1): (f64, f64),
) -> Option<(u32, u32, u32, u32)> {
    let (cx0, cy0) = viewport.to_canvas(mx0, my0);
    let (cx1, cy1) = viewport.to_canvas(mx1, my1);
    let x0 = cx0.min(cx1).floor().max(0.0);
    let y0 = cy0.min(cy1).floor().max(0.0);
    let x1 = cx0.max(cx1).ceil().min(f64::from(frame.width()));
    let y1 = cy0.max(cy1).ceil().min(f64::from(frame.height()));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Compose one frame. Hidden layers are skipped entirely.
pub fn render_frame(frame: &mut RgbaImage, input: &RenderInput<'_>) {
    let (r, g, b) = BACKGROUND;
    for px in frame.pixels_mut() {
        *px = Rgba([r, g, b, 255]);
    }
    if input.viewport.scale <= 0.0 {
        return;
    }

    if let Some(base) = layer(input.layers, LayerKind::Base) {
        match input.base_image {
            Some(image) => draw_base_image(frame, input.viewport, image, base.opacity),
            None => draw_placeholder(frame, input.viewport, input.map_size, base.opacity),
        }
    }
    if let Some(territory) = layer(input.layers, LayerKind::Territory) {
        draw_tiles(frame, input.viewport, input.tiles, territory.opacity);
    }
    if let Some(markers) = layer(input.layers, LayerKind::Marker) {
        draw_markers(frame, input, markers.opacity);
    }
}

fn draw_base_image(frame: &mut RgbaImage, viewport: &Viewport, image: &RgbaImage, opacity: f64) {
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let Some((x0, y0, x1, y1)) = canvas_rect(viewport, frame, (0.0, 0.0), (w, h)) else {
        return;
    };
    for cy in y0..y1 {
        for cx in x0..x1 {
            let (mx, my) = viewport.to_map(f64::from(cx) + 0.5, f64::from(cy) + 0.5);
            if mx < 0.0 || my < 0.0 || mx >= w || my >= h {
                continue;
            }
            let src = image.get_pixel(mx as u32, my as u32);
            let alpha = f64::from(src[3]) / 255.0 * opacity;
            source_over(frame.get_pixel_mut(cx, cy), (src[0], src[1], src[2]), alpha);
        }
    }
}

fn draw_placeholder(frame: &mut RgbaImage, viewport: &Viewport, map_size: (u32, u32), opacity: f64) {
    let (w, h) = (f64::from(map_size.0), f64::from(map_size.1));
    let Some((x0, y0, x1, y1)) = canvas_rect(viewport, frame, (0.0, 0.0), (w, h)) else {
        return;
    };
    // A canvas pixel is on a grid line when its map-space span contains a
    // multiple of the grid spacing, so lines stay one pixel wide at any zoom.
    let crosses_line = |m0: f64, m1: f64, extent: f64| {
        let line = (m0 / GRID_SPACING).ceil() * GRID_SPACING;
        line < m1 && line <= extent
    };

    for cy in y0..y1 {
        for cx in x0..x1 {
            let (mx, my) = viewport.to_map(f64::from(cx) + 0.5, f64::from(cy) + 0.5);
            if mx < 0.0 || my < 0.0 || mx >= w || my >= h {
                continue;
            }
            let (mx0, my0) = viewport.to_map(f64::from(cx), f64::from(cy));
            let (mx1, my1) = viewport.to_map(f64::from(cx) + 1.0, f64::from(cy) + 1.0);
            let color = if crosses_line(mx0, mx1, w) || crosses_line(my0, my1, h) {
                GRID_LINE
            } else {
                PLACEHOLDER_FILL
            };
            source_over(frame.get_pixel_mut(cx, cy), color, opacity);
        }
    }
}

/// Tiles are drawn in key order, so overlapping factions always stack the
/// same way regardless of cache layout.
fn draw_tiles(frame: &mut RgbaImage, viewport: &Viewport, tiles: &TileCache, opacity: f64) {
    let size = f64::from(TILE_SIZE);
    let mut ordered: Vec<_> = tiles.iter().collect();
    ordered.sort_unstable_by(|a, b| a.0.cmp(b.0));
    for (key, surface) in ordered {
        let (ox, oy) = key.coord.origin();
        let Some((x0, y0, x1, y1)) = canvas_rect(viewport, frame, (ox, oy), (ox + size, oy + size))
        else {
            continue;
        };
        let pixels = surface.pixels();
        for cy in y0..y1 {
            for cx in x0..x1 {
                let (mx, my) = viewport.to_map(f64::from(cx) + 0.5, f64::from(cy) + 0.5);
                let (lx, ly) = (mx - ox, my - oy);
                if lx < 0.0 || ly < 0.0 || lx >= size || ly >= size {
                    continue;
                }
                let src = pixels.get_pixel(lx as u32, ly as u32);
                if src[3] == 0 {
                    continue;
                }
                let alpha = f64::from(src[3]) / 255.0 * opacity;
                source_over(frame.get_pixel_mut(cx, cy), (src[0], src[1], src[2]), alpha);
            }
        }
    }
}

fn draw_markers(frame: &mut RgbaImage, input: &RenderInput<'_>, opacity: f64) {
    let (width, height) = frame.dimensions();
    for place in input.places {
        if !input.view_mode.shows(place.scope) {
            continue;
        }
        let Some(position) = place.position else {
            continue;
        };
        let (cx, cy) = input.viewport.to_canvas(position.x, position.y);

        if input.selected_place == Some(place.id.as_str()) {
            for_each_disc_pixel(width, height, cx, cy, MARKER_HIGHLIGHT_RADIUS, |x, y| {
                source_over(frame.get_pixel_mut(x, y), MARKER_HIGHLIGHT, opacity * 0.6);
            });
        }
        for_each_disc_pixel(width, height, cx, cy, MARKER_RADIUS, |x, y| {
            source_over(frame.get_pixel_mut(x, y), MARKER_FILL, opacity);
        });
    }
}

/// The topmost visible marker within `radius` canvas pixels of a canvas point.
pub fn hit_test_marker<'a>(
    places: &'a [Place],
    viewport: &Viewport,
    view_mode: ViewMode,
    canvas_x: f64,
    canvas_y: f64,
    radius: f64,
) -> Option<&'a Place> {
    places.iter().rev().find(|place| {
        if !view_mode.shows(place.scope) {
            return false;
        }
        let Some(position) = place.position else {
            return false;
        };
        let (px, py) = viewport.to_canvas(position.x, position.y);
        let (dx, dy) = (px - canvas_x, py - canvas_y);
        dx * dx + dy * dy <= radius * radius
    })
}
