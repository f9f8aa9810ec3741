use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::sewing::{SeamClickState, SeamDefinition};
use crate::view::DEFAULT_ZOOM;

/// Which outline a click or selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeRef {
    /// The outline still being drawn.
    Current,
    Completed(usize),
}

impl ShapeRef {
    pub fn completed_index(self) -> Option<usize> {
        match self {
            ShapeRef::Current => None,
            ShapeRef::Completed(index) => Some(index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub shape: ShapeRef,
    pub point: usize,
}

/// Snapshot of everything the undo stack restores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasState {
    pub curve: Curve,
    pub completed_shapes: Vec<Curve>,
    pub selected_point: Option<usize>,
    pub pan: Vec2,
    pub zoom: f32,
    pub seams: Vec<SeamDefinition>,
    pub seam_preview_points: Vec<ClickTarget>,
    pub seam_click_state: SeamClickState,
    pub a_start: Option<ClickTarget>,
    pub a_end: Option<ClickTarget>,
    pub b_start: Option<ClickTarget>,
    pub b_end: Option<ClickTarget>,
    pub selected_seam: Option<usize>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            curve: Curve::default(),
            completed_shapes: Vec::new(),
            selected_point: None,
            pan: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            seams: Vec::new(),
            seam_preview_points: Vec::new(),
            seam_click_state: SeamClickState::None,
            a_start: None,
            a_end: None,
            b_start: None,
            b_end: None,
            selected_seam: None,
        }
    }
}

impl CanvasState {
    pub fn shape(&self, shape: ShapeRef) -> Option<&Curve> {
        match shape {
            ShapeRef::Current => Some(&self.curve),
            ShapeRef::Completed(index) => self.completed_shapes.get(index),
        }
    }

    pub fn shape_mut(&mut self, shape: ShapeRef) -> Option<&mut Curve> {
        match shape {
            ShapeRef::Current => Some(&mut self.curve),
            ShapeRef::Completed(index) => self.completed_shapes.get_mut(index),
        }
    }

    pub fn point_position(&self, target: ClickTarget) -> Option<Vec2> {
        self.shape(target.shape)?
            .points
            .get(target.point)
            .map(|p| p.position)
    }

    pub fn all_positions(&self) -> Vec<Vec2> {
        self.completed_shapes
            .iter()
            .flat_map(|shape| shape.positions())
            .chain(self.curve.positions())
            .collect()
    }
}

// Sewing progress does not take part in equality.
impl PartialEq for CanvasState {
    fn eq(&self, other: &Self) -> bool {
        self.curve == other.curve
            && self.completed_shapes == other.completed_shapes
            && self.selected_point == other.selected_point
            && self.pan == other.pan
            && (self.zoom - other.zoom).abs() <= 1.0e-4
    }
}

pub const DEFAULT_HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<CanvasState>,
    redo: Vec<CanvasState>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.trim();
    }

    pub fn save(&mut self, state: CanvasState) {
        self.undo.push(state);
        self.redo.clear();
        self.trim();
    }

    pub fn undo(&mut self, current: &mut CanvasState) -> bool {
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        self.redo.push(std::mem::replace(current, previous));
        true
    }

    pub fn redo(&mut self, current: &mut CanvasState) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        self.undo.push(std::mem::replace(current, next));
        self.trim();
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn trim(&mut self) {
        if self.undo.len() > self.limit {
            let excess = self.undo.len() - self.limit;
            self.undo.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_points(count: usize) -> CanvasState {
        let mut state = CanvasState::default();
        for i in 0..count {
            state.curve.push_point(Vec2::new(i as f32, 0.0), false);
        }
        state
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut history = History::default();
        let mut current = state_with_points(1);

        history.save(current.clone());
        current = state_with_points(2);

        assert!(history.undo(&mut current));
        assert_eq!(current.curve.len(), 1);
        assert!(history.can_redo());

        assert!(history.redo(&mut current));
        assert_eq!(current.curve.len(), 2);
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_on_empty_stack_is_noop() {
        let mut history = History::default();
        let mut current = state_with_points(3);
        assert!(!history.undo(&mut current));
        assert!(!history.redo(&mut current));
        assert_eq!(current.curve.len(), 3);
    }

    #[test]
    fn save_clears_redo() {
        let mut history = History::default();
        let mut current = state_with_points(1);
        history.save(current.clone());
        current = state_with_points(2);
        history.undo(&mut current);
        assert_eq!(history.redo_len(), 1);
        history.save(current.clone());
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn history_limit_drops_oldest() {
        let mut history = History::with_limit(2);
        for i in 0..5 {
            history.save(state_with_points(i));
        }
        assert_eq!(history.undo_len(), 2);
        let mut current = CanvasState::default();
        history.undo(&mut current);
        assert_eq!(current.curve.len(), 4);
    }

    #[test]
    fn equality_ignores_seams_and_tolerates_zoom_noise() {
        let a = state_with_points(2);
        let mut b = a.clone();
        b.seam_preview_points.push(ClickTarget {
            shape: ShapeRef::Completed(0),
            point: 1,
        });
        b.zoom += 1.0e-6;
        assert_eq!(a, b);
        b.pan = Vec2::new(1.0, 0.0);
        assert_ne!(a, b);
    }
}
