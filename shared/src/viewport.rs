/// Viewport manages the pan/zoom transformation from map space to canvas space:
/// `canvas = map * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 5.0;
const ZOOM_OUT_STEP: f64 = 0.9;
const ZOOM_IN_STEP: f64 = 1.1;

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(offset_x: f64, offset_y: f64, scale: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            scale,
        }
    }

    /// Convert map coordinates to canvas coordinates.
    pub fn to_canvas(&self, mx: f64, my: f64) -> (f64, f64) {
        (
            mx * self.scale + self.offset_x,
            my * self.scale + self.offset_y,
        )
    }

    /// Convert canvas coordinates to map coordinates.
    pub fn to_map(&self, cx: f64, cy: f64) -> (f64, f64) {
        (
            (cx - self.offset_x) / self.scale,
            (cy - self.offset_y) / self.scale,
        )
    }

    /// Zoom one wheel step toward a cursor position (canvas coordinates).
    /// Positive `delta` (wheel down) zooms out.
    pub fn zoom_at(&mut self, delta: f64, cursor_x: f64, cursor_y: f64) {
        let step = if delta > 0.0 {
            ZOOM_OUT_STEP
        } else {
            ZOOM_IN_STEP
        };
        let new_scale = (self.scale * step).clamp(MIN_SCALE, MAX_SCALE);
        let ratio = new_scale / self.scale;

        // Keep the map point under the cursor fixed
        self.offset_x = cursor_x - (cursor_x - self.offset_x) * ratio;
        self.offset_y = cursor_y - (cursor_y - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    /// Pan by canvas-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Fit the viewport to show the given map-space bounds with padding.
    pub fn fit_bounds(
        &mut self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        canvas_w: f64,
        canvas_h: f64,
    ) {
        let map_w = max_x - min_x;
        let map_h = max_y - min_y;

        if map_w <= 0.0 || map_h <= 0.0 || canvas_w <= 0.0 || canvas_h <= 0.0 {
            return;
        }

        let padding = 0.05;
        let scale_x = canvas_w / (map_w * (1.0 + padding * 2.0));
        let scale_y = canvas_h / (map_h * (1.0 + padding * 2.0));
        self.scale = scale_x.min(scale_y).clamp(MIN_SCALE, MAX_SCALE);

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        self.offset_x = canvas_w / 2.0 - center_x * self.scale;
        self.offset_y = canvas_h / 2.0 - center_y * self.scale;
    }
}
