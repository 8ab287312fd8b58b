use std::io::Cursor;

use faction_map_shared::TILE_SIZE;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::SurfaceError;

/// Source-over composite of a solid color with `alpha` (0..=1) onto one
/// straight-alpha pixel.
pub(crate) fn source_over(dst: &mut Rgba<u8>, rgb: (u8, u8, u8), alpha: f64) {
    let src_a = alpha.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let dst_a = f64::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }

    let mix = |src: u8, dst: u8| {
        let c = (f64::from(src) * src_a + f64::from(dst) * dst_a * (1.0 - src_a)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        mix(rgb.0, dst[0]),
        mix(rgb.1, dst[1]),
        mix(rgb.2, dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// Pixel rectangle `[x0, x1) x [y0, y1)` of a disc clipped to a `width` x `height` raster.
fn disc_bounds(cx: f64, cy: f64, radius: f64, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = (cx - radius).floor().max(0.0);
    let y0 = (cy - radius).floor().max(0.0);
    let x1 = (cx + radius).ceil().min(f64::from(width));
    let y1 = (cy + radius).ceil().min(f64::from(height));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Calls `f` for every pixel whose center lies inside the disc.
pub(crate) fn for_each_disc_pixel(
    width: u32,
    height: u32,
    cx: f64,
    cy: f64,
    radius: f64,
    mut f: impl FnMut(u32, u32),
) {
    let Some((x0, y0, x1, y1)) = disc_bounds(cx, cy, radius, width, height) else {
        return;
    };
    let r2 = radius * radius;
    for y in y0..y1 {
        let dy = f64::from(y) + 0.5 - cy;
        for x in x0..x1 {
            let dx = f64::from(x) + 0.5 - cx;
            if dx * dx + dy * dy <= r2 {
                f(x, y);
            }
        }
    }
}

/// One faction's territory raster for a single tile. Always `TILE_SIZE` square,
/// straight (non-premultiplied) RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSurface {
    pixels: RgbaImage,
}

impl Default for TileSurface {
    fn default() -> Self {
        Self::blank()
    }
}

impl TileSurface {
    /// Fully transparent tile.
    pub fn blank() -> Self {
        Self {
            pixels: RgbaImage::new(TILE_SIZE, TILE_SIZE),
        }
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self, SurfaceError> {
        let pixels = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        if pixels.width() != TILE_SIZE || pixels.height() != TILE_SIZE {
            return Err(SurfaceError::Size {
                width: pixels.width(),
                height: pixels.height(),
                expected: TILE_SIZE,
            });
        }
        Ok(Self { pixels })
    }

    pub fn to_png(&self) -> Result<Vec<u8>, SurfaceError> {
        let mut out = Cursor::new(Vec::new());
        self.pixels.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    /// Fill a disc with `rgb` at `alpha`, composited source-over.
    pub fn fill_disc(&mut self, cx: f64, cy: f64, radius: f64, rgb: (u8, u8, u8), alpha: f64) {
        let pixels = &mut self.pixels;
        for_each_disc_pixel(TILE_SIZE, TILE_SIZE, cx, cy, radius, |x, y| {
            source_over(pixels.get_pixel_mut(x, y), rgb, alpha);
        });
    }

    /// Remove all color and alpha inside a disc (destination-out at full strength).
    pub fn erase_disc(&mut self, cx: f64, cy: f64, radius: f64) {
        let pixels = &mut self.pixels;
        for_each_disc_pixel(TILE_SIZE, TILE_SIZE, cx, cy, radius, |x, y| {
            *pixels.get_pixel_mut(x, y) = Rgba([0, 0, 0, 0]);
        });
    }
}
