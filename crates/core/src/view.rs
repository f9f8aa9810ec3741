use glam::Vec2;

pub const DEFAULT_ZOOM: f32 = 5.0;
pub const MIN_WHEEL_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 20.0;
pub const MIN_FOCUS_ZOOM: f32 = 0.1;
const FOCUS_MARGIN: f32 = 1.2;
const WHEEL_ZOOM_STEP: f32 = 1.1;
const PAN_SPEED: f32 = 2.0;

/// Maps canvas space to widget-local screen space: `screen = canvas * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasView {
    pub pan: Vec2,
    pub zoom: f32,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl CanvasView {
    pub fn to_screen(&self, p: Vec2) -> Vec2 {
        p * self.zoom + self.pan
    }

    pub fn to_canvas(&self, s: Vec2) -> Vec2 {
        (s - self.pan) / self.zoom
    }

    /// Wheel zoom that keeps the canvas point under `mouse` in place.
    pub fn zoom_at(&mut self, mouse: Vec2, wheel_delta: f32) {
        let anchor = self.to_canvas(mouse);
        self.zoom = (self.zoom * WHEEL_ZOOM_STEP.powf(wheel_delta)).clamp(MIN_WHEEL_ZOOM, MAX_ZOOM);
        self.pan = mouse - anchor * self.zoom;
    }

    pub fn pan_by(&mut self, screen_delta: Vec2) {
        self.pan += screen_delta / self.zoom * PAN_SPEED;
    }

    /// Fits `points` into `viewport` with a small margin. Returns false when
    /// there is nothing to focus on.
    pub fn focus_on(&mut self, points: &[Vec2], viewport: Vec2) -> bool {
        let Some((min, max)) = crate::curve::bounds_2d(points.iter().copied()) else {
            return false;
        };
        let size = max - min;
        let center = (min + max) * 0.5;

        let mut zoom = f32::INFINITY;
        if size.x > f32::EPSILON {
            zoom = zoom.min(viewport.x / (size.x * FOCUS_MARGIN));
        }
        if size.y > f32::EPSILON {
            zoom = zoom.min(viewport.y / (size.y * FOCUS_MARGIN));
        }
        if !zoom.is_finite() {
            zoom = self.zoom;
        }

        self.zoom = zoom.clamp(MIN_FOCUS_ZOOM, MAX_ZOOM);
        self.pan = viewport * 0.5 - center * self.zoom;
        true
    }

    /// Grid line offsets in screen space for the visible area, paired with a
    /// flag telling whether the line is a major one.
    pub fn grid_lines(&self, viewport: Vec2, spacing: f32, subdivisions: u32) -> GridLines {
        let mut lines = GridLines::default();
        let subdivisions = subdivisions.max(1) as i64;
        let step = spacing / subdivisions as f32;
        if step * self.zoom < 2.0 {
            return lines;
        }
        let min = self.to_canvas(Vec2::ZERO);
        let max = self.to_canvas(viewport);

        let start_x = (min.x / step).floor() as i64;
        let end_x = (max.x / step).ceil() as i64;
        for i in start_x..=end_x {
            let x = i as f32 * step;
            let major = i.rem_euclid(subdivisions) == 0;
            lines.vertical.push((self.to_screen(Vec2::new(x, 0.0)).x, major));
        }

        let start_y = (min.y / step).floor() as i64;
        let end_y = (max.y / step).ceil() as i64;
        for i in start_y..=end_y {
            let y = i as f32 * step;
            let major = i.rem_euclid(subdivisions) == 0;
            lines.horizontal.push((self.to_screen(Vec2::new(0.0, y)).y, major));
        }
        lines
    }
}

#[derive(Debug, Clone, Default)]
pub struct GridLines {
    pub vertical: Vec<(f32, bool)>,
    pub horizontal: Vec<(f32, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_round_trip() {
        let view = CanvasView {
            pan: Vec2::new(30.0, -12.0),
            zoom: 2.5,
        };
        let p = Vec2::new(4.0, 7.0);
        let back = view.to_canvas(view.to_screen(p));
        assert!(back.distance(p) < 1.0e-5);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut view = CanvasView::default();
        let mouse = Vec2::new(120.0, 80.0);
        let before = view.to_canvas(mouse);
        view.zoom_at(mouse, 3.0);
        let after = view.to_canvas(mouse);
        assert!(before.distance(after) < 1.0e-3);
        assert!(view.zoom > DEFAULT_ZOOM);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = CanvasView::default();
        view.zoom_at(Vec2::ZERO, 200.0);
        assert_eq!(view.zoom, MAX_ZOOM);
        view.zoom_at(Vec2::ZERO, -200.0);
        assert_eq!(view.zoom, MIN_WHEEL_ZOOM);
    }

    #[test]
    fn pan_scales_with_zoom() {
        let mut view = CanvasView {
            pan: Vec2::ZERO,
            zoom: 4.0,
        };
        view.pan_by(Vec2::new(8.0, -4.0));
        assert_eq!(view.pan, Vec2::new(4.0, -2.0));
    }

    #[test]
    fn focus_centers_bounds() {
        let mut view = CanvasView::default();
        let points = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 50.0)];
        let viewport = Vec2::new(800.0, 600.0);
        assert!(view.focus_on(&points, viewport));
        let expected_zoom = (800.0_f32 / 120.0).min(600.0 / 60.0);
        assert!((view.zoom - expected_zoom).abs() < 1.0e-4);
        let center = view.to_screen(Vec2::new(50.0, 25.0));
        assert!(center.distance(viewport * 0.5) < 1.0e-3);
    }

    #[test]
    fn focus_without_points_is_noop() {
        let mut view = CanvasView::default();
        assert!(!view.focus_on(&[], Vec2::new(100.0, 100.0)));
        assert_eq!(view, CanvasView::default());
    }

    #[test]
    fn grid_marks_major_lines() {
        let view = CanvasView {
            pan: Vec2::ZERO,
            zoom: 1.0,
        };
        let lines = view.grid_lines(Vec2::new(200.0, 100.0), 100.0, 4);
        assert!(lines.vertical.iter().any(|(x, major)| *major && x.abs() < 1.0e-3));
        assert!(lines.vertical.iter().any(|(x, major)| !*major && (x - 25.0).abs() < 1.0e-3));
    }
}
