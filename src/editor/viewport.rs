use bevy::math::Vec2;

/// Pan/zoom transform between screen space and canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Screen position of the canvas origin before panning.
    pub origin: Vec2,
    pub pan: Vec2,
    pub zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Viewport {
    pub fn new(origin: Vec2, min_zoom: f32, max_zoom: f32) -> Self {
        Self {
            origin,
            pan: Vec2::ZERO,
            zoom: 1.0,
            min_zoom,
            max_zoom,
        }
    }

    pub fn screen_to_canvas(&self, screen: Vec2) -> Vec2 {
        (screen - self.origin - self.pan) / self.zoom
    }

    pub fn canvas_to_screen(&self, canvas: Vec2) -> Vec2 {
        self.origin + self.pan + canvas * self.zoom
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        if dx.is_finite() && dy.is_finite() {
            self.pan += Vec2::new(dx, dy);
        }
    }

    pub fn zoom_by(&mut self, delta: f32) {
        if delta.is_finite() {
            self.zoom = (self.zoom + delta).clamp(self.min_zoom, self.max_zoom);
        }
    }
}
