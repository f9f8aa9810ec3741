use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A single key on a pattern outline.
///
/// `use_bezier` marks a point whose tangents are edited by hand. Plain ("N")
/// points get their tangents recomputed from their neighbours whenever the
/// outline changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub input_key: f32,
    pub position: Vec2,
    pub arrive_tangent: Vec2,
    pub leave_tangent: Vec2,
    pub use_bezier: bool,
}

impl CurvePoint {
    pub fn new(input_key: f32, position: Vec2, use_bezier: bool) -> Self {
        Self {
            input_key,
            position,
            arrive_tangent: Vec2::ZERO,
            leave_tangent: Vec2::ZERO,
            use_bezier,
        }
    }

    /// Screen-independent position of the arrive handle.
    pub fn arrive_handle(&self) -> Vec2 {
        self.position - self.arrive_tangent
    }

    pub fn leave_handle(&self) -> Vec2 {
        self.position + self.leave_tangent
    }
}

/// Hermite curve through an ordered list of keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub points: Vec<CurvePoint>,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: &[Vec2]) -> Self {
        let mut curve = Self::new();
        for p in positions {
            curve.push_point(*p, false);
        }
        curve.recalculate_linear_tangents();
        curve
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.points.iter().map(|p| p.position)
    }

    pub fn push_point(&mut self, position: Vec2, use_bezier: bool) -> usize {
        let index = self.points.len();
        self.points
            .push(CurvePoint::new(index as f32, position, use_bezier));
        index
    }

    /// Removes a key, renumbers the remaining input keys and re-derives tangents.
    pub fn remove_point(&mut self, index: usize) -> Option<CurvePoint> {
        if index >= self.points.len() {
            return None;
        }
        let removed = self.points.remove(index);
        for (i, p) in self.points.iter_mut().enumerate() {
            p.input_key = i as f32;
        }
        self.auto_set_tangents();
        Some(removed)
    }

    pub fn eval(&self, t: f32) -> Vec2 {
        let Some(first) = self.points.first() else {
            return Vec2::ZERO;
        };
        let last = self.points[self.points.len() - 1];
        if self.points.len() == 1 || t <= first.input_key {
            return first.position;
        }
        if t >= last.input_key {
            return last.position;
        }

        let next = self
            .points
            .iter()
            .position(|p| p.input_key > t)
            .unwrap_or(self.points.len() - 1);
        let a = self.points[next - 1];
        let b = self.points[next];
        let span = b.input_key - a.input_key;
        if span <= f32::EPSILON {
            return a.position;
        }
        let alpha = (t - a.input_key) / span;
        hermite(
            a.position,
            a.leave_tangent * span,
            b.position,
            b.arrive_tangent * span,
            alpha,
        )
    }

    /// Catmull-Rom style tangents for every key; open ends get zero tangents.
    pub fn auto_set_tangents(&mut self) {
        let n = self.points.len();
        for i in 0..n {
            let tangent = if i == 0 || i + 1 == n {
                Vec2::ZERO
            } else {
                (self.points[i + 1].position - self.points[i - 1].position) * 0.5
            };
            self.points[i].arrive_tangent = tangent;
            self.points[i].leave_tangent = tangent;
        }
    }

    /// Half-delta tangents toward each neighbour, skipping bezier keys.
    pub fn recalculate_linear_tangents(&mut self) {
        let n = self.points.len();
        for i in 0..n {
            if self.points[i].use_bezier {
                continue;
            }
            let p = self.points[i].position;
            self.points[i].arrive_tangent = if i > 0 {
                (p - self.points[i - 1].position) * 0.5
            } else {
                Vec2::ZERO
            };
            self.points[i].leave_tangent = if i + 1 < n {
                (self.points[i + 1].position - p) * 0.5
            } else {
                Vec2::ZERO
            };
        }
    }

    /// Open-curve end conditions: nothing arrives at the first key and
    /// nothing leaves the last one.
    pub fn set_open_end_tangents(&mut self) {
        let n = self.points.len();
        if n < 2 {
            return;
        }
        let first_delta = self.points[1].position - self.points[0].position;
        self.points[0].arrive_tangent = Vec2::ZERO;
        self.points[0].leave_tangent = first_delta * 0.5;

        let last_delta = self.points[n - 1].position - self.points[n - 2].position;
        self.points[n - 1].arrive_tangent = last_delta * 0.5;
        self.points[n - 1].leave_tangent = Vec2::ZERO;
    }

    /// Samples segments `0..n-1`, excluding each segment's end key.
    pub fn sample_segments(&self, samples_per_segment: usize) -> Vec<Vec2> {
        let n = self.points.len();
        let samples_per_segment = samples_per_segment.max(1);
        if n < 2 {
            return self.positions().collect();
        }
        let mut samples = Vec::with_capacity((n - 1) * samples_per_segment);
        for seg in 0..n - 1 {
            let k0 = self.points[seg].input_key;
            let k1 = self.points[seg + 1].input_key;
            for s in 0..samples_per_segment {
                let alpha = s as f32 / samples_per_segment as f32;
                samples.push(self.eval(k0 + (k1 - k0) * alpha));
            }
        }
        samples
    }

}

pub fn bounds_2d(points: impl IntoIterator<Item = Vec2>) -> Option<(Vec2, Vec2)> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
    Some((min, max))
}

fn hermite(p0: Vec2, t0: Vec2, p1: Vec2, t1: Vec2, a: f32) -> Vec2 {
    let a2 = a * a;
    let a3 = a2 * a;
    p0 * (2.0 * a3 - 3.0 * a2 + 1.0)
        + t0 * (a3 - 2.0 * a2 + a)
        + t1 * (a3 - a2)
        + p1 * (-2.0 * a3 + 3.0 * a2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        a.distance(b) < 1.0e-4
    }

    #[test]
    fn linear_tangents_use_half_deltas() {
        let mut curve = Curve::new();
        curve.push_point(Vec2::new(0.0, 0.0), false);
        curve.push_point(Vec2::new(1.0, 2.0), false);
        curve.push_point(Vec2::new(2.0, 0.0), false);
        curve.recalculate_linear_tangents();

        let p = &curve.points;
        assert!(approx(p[0].arrive_tangent, Vec2::ZERO));
        assert!(approx(p[0].leave_tangent, Vec2::new(0.5, 1.0)));
        assert!(approx(p[1].arrive_tangent, Vec2::new(0.5, 1.0)));
        assert!(approx(p[1].leave_tangent, Vec2::new(0.5, -1.0)));
        assert!(approx(p[2].arrive_tangent, Vec2::new(0.5, -1.0)));
        assert!(approx(p[2].leave_tangent, Vec2::ZERO));
    }

    #[test]
    fn linear_tangents_skip_bezier_points() {
        let mut curve = Curve::new();
        curve.push_point(Vec2::new(0.0, 0.0), false);
        curve.push_point(Vec2::new(4.0, 0.0), true);
        curve.push_point(Vec2::new(8.0, 0.0), false);
        curve.points[1].leave_tangent = Vec2::new(0.0, 7.0);
        curve.recalculate_linear_tangents();
        assert_eq!(curve.points[1].leave_tangent, Vec2::new(0.0, 7.0));
        assert!(approx(curve.points[0].leave_tangent, Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn eval_hits_keys_and_stays_on_straight_line() {
        let curve = Curve::from_positions(&[Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0)]);
        assert!(approx(curve.eval(0.0), Vec2::ZERO));
        assert!(approx(curve.eval(1.0), Vec2::new(10.0, 0.0)));
        assert!(approx(curve.eval(2.0), Vec2::new(20.0, 0.0)));
        let mid = curve.eval(0.5);
        assert!(mid.y.abs() < 1.0e-4);
        assert!(mid.x > 0.0 && mid.x < 10.0);
    }

    #[test]
    fn eval_clamps_outside_range() {
        let curve = Curve::from_positions(&[Vec2::new(1.0, 1.0), Vec2::new(3.0, 1.0)]);
        assert_eq!(curve.eval(-5.0), Vec2::new(1.0, 1.0));
        assert_eq!(curve.eval(9.0), Vec2::new(3.0, 1.0));
        assert_eq!(Curve::new().eval(0.3), Vec2::ZERO);
    }

    #[test]
    fn open_end_tangents() {
        let mut curve = Curve::new();
        curve.push_point(Vec2::new(0.0, 0.0), true);
        curve.push_point(Vec2::new(2.0, 0.0), true);
        curve.push_point(Vec2::new(2.0, 4.0), true);
        curve.auto_set_tangents();
        curve.set_open_end_tangents();
        assert_eq!(curve.points[0].arrive_tangent, Vec2::ZERO);
        assert!(approx(curve.points[0].leave_tangent, Vec2::new(1.0, 0.0)));
        assert!(approx(curve.points[2].arrive_tangent, Vec2::new(0.0, 2.0)));
        assert_eq!(curve.points[2].leave_tangent, Vec2::ZERO);
        assert!(approx(curve.points[1].leave_tangent, Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn remove_point_renumbers_keys() {
        let mut curve =
            Curve::from_positions(&[Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0), Vec2::new(3.0, 0.0)]);
        let removed = curve.remove_point(1).expect("removed");
        assert_eq!(removed.position, Vec2::X);
        let keys: Vec<f32> = curve.points.iter().map(|p| p.input_key).collect();
        assert_eq!(keys, vec![0.0, 1.0, 2.0]);
        assert!(curve.remove_point(10).is_none());
    }

    #[test]
    fn sampling_excludes_last_key() {
        let curve = Curve::from_positions(&[Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)]);
        let samples = curve.sample_segments(10);
        assert_eq!(samples.len(), 20);
        assert!(approx(samples[0], Vec2::ZERO));
        assert!(approx(samples[10], Vec2::new(10.0, 0.0)));
        assert!(samples.iter().all(|s| !approx(*s, Vec2::new(10.0, 10.0))));
    }
}
