use std::collections::{BTreeMap, BTreeSet};

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::canvas_state::{CanvasState, ClickTarget, History, ShapeRef};
use crate::error::SewingError;
use crate::pattern::{PatternPiece, PieceId, PieceSet};
use crate::triangulate::nearest_sample;

pub const SEAM_POINT_COUNT: usize = 10;
pub const DEFAULT_SEAM_STIFFNESS: f32 = 1.0;
pub const SEW_PICK_RADIUS: f32 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeIndices {
    pub start: usize,
    pub end: usize,
}

/// Two outline edges that get sewn together, by shape and key index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeamDefinition {
    pub shape_a: usize,
    pub edge_a: EdgeIndices,
    pub shape_b: usize,
    pub edge_b: EdgeIndices,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeamClickState {
    #[default]
    None,
    ClickedAStart,
    ClickedAEnd,
    ClickedBStart,
    ClickedBEnd,
}

/// Runtime seam between two pieces. Kept index-aligned with the seam
/// definitions; a constraint whose pieces are gone has `None` references.
#[derive(Debug, Clone, PartialEq)]
pub struct SewingConstraint {
    pub piece_a: Option<PieceId>,
    pub vertex_a: Option<usize>,
    pub piece_b: Option<PieceId>,
    pub vertex_b: Option<usize>,
    pub screen_points_a: Vec<Vec2>,
    pub screen_points_b: Vec<Vec2>,
    pub stiffness: f32,
}

impl SewingConstraint {
    pub fn pieces(&self) -> Option<(PieceId, PieceId)> {
        Some((self.piece_a?, self.piece_b?))
    }

    pub fn detach(&mut self) {
        self.piece_a = None;
        self.piece_b = None;
        self.vertex_a = None;
        self.vertex_b = None;
    }
}

/// Outcome of one click in sew mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SewClick {
    Missed,
    /// The click hit the unfinished outline; it has to be finalised first.
    NeedsFinalise,
    Accepted(SeamClickState),
    Rejected(SewingError),
    Completed(usize),
}

#[derive(Debug, Clone)]
pub struct SewingManager {
    pub constraints: Vec<SewingConstraint>,
    pub stiffness: f32,
}

impl Default for SewingManager {
    fn default() -> Self {
        Self {
            constraints: Vec::new(),
            stiffness: DEFAULT_SEAM_STIFFNESS,
        }
    }
}

impl SewingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nearest outline key within the pick radius, checking the unfinished
    /// outline before the finished ones.
    pub fn pick_target(state: &CanvasState, canvas_pos: Vec2, zoom: f32) -> Option<ClickTarget> {
        let radius = SEW_PICK_RADIUS / zoom;
        let mut best_dist = radius * radius;
        let mut best = None;

        let shapes = std::iter::once((ShapeRef::Current, &state.curve)).chain(
            state
                .completed_shapes
                .iter()
                .enumerate()
                .map(|(i, s)| (ShapeRef::Completed(i), s)),
        );
        for (shape, curve) in shapes {
            for (point, p) in curve.points.iter().enumerate() {
                let d = p.position.distance_squared(canvas_pos);
                if d < best_dist {
                    best_dist = d;
                    best = Some(ClickTarget { shape, point });
                }
            }
        }
        best
    }

    pub fn validate_mesh_for_shape(
        shape: ShapeRef,
        pieces: &PieceSet,
    ) -> Result<&PatternPiece, SewingError> {
        let ShapeRef::Completed(index) = shape else {
            tracing::warn!("sewing: click target is not a finished shape");
            return Err(SewingError::InvalidTarget);
        };
        let Some(piece) = pieces.piece_for_shape(index) else {
            tracing::warn!("sewing: no piece generated for shape {}", index);
            return Err(SewingError::MissingMesh);
        };
        if piece.mesh.triangle_count() == 0 || !piece.has_boundary_samples() {
            tracing::warn!("sewing: piece {} for shape {} is empty", piece.label, index);
            return Err(SewingError::InvalidMesh);
        }
        Ok(piece)
    }

    pub fn validate_targets(
        a_start: ClickTarget,
        b_start: ClickTarget,
        pieces: &PieceSet,
    ) -> Result<(), SewingError> {
        let a_ok = Self::validate_mesh_for_shape(a_start.shape, pieces).is_ok();
        let b_ok = Self::validate_mesh_for_shape(b_start.shape, pieces).is_ok();
        if !a_ok || !b_ok {
            tracing::warn!("sewing: piece A ok={} piece B ok={}", a_ok, b_ok);
            return Err(SewingError::MissingPieces);
        }
        if a_start.shape == b_start.shape {
            return Err(SewingError::SameShape);
        }
        Ok(())
    }

    /// Advances the four-click seam state machine. Every accepted click
    /// pushes an undo snapshot first.
    pub fn click(
        &mut self,
        state: &mut CanvasState,
        history: &mut History,
        canvas_pos: Vec2,
        pieces: &PieceSet,
    ) -> SewClick {
        let Some(target) = Self::pick_target(state, canvas_pos, state.zoom) else {
            tracing::trace!("sew click missed all control points");
            return SewClick::Missed;
        };
        if target.shape == ShapeRef::Current {
            return SewClick::NeedsFinalise;
        }
        if let Err(err) = Self::validate_mesh_for_shape(target.shape, pieces) {
            return SewClick::Rejected(err);
        }

        match state.seam_click_state {
            SeamClickState::None | SeamClickState::ClickedBEnd => {
                history.save(state.clone());
                state.a_start = Some(target);
                state.seam_click_state = SeamClickState::ClickedAStart;
            }
            SeamClickState::ClickedAStart => {
                if state.a_start.map(|t| t.shape) != Some(target.shape) {
                    tracing::warn!("sew: A end is on a different shape than A start");
                    return SewClick::Rejected(SewingError::DifferentShape);
                }
                history.save(state.clone());
                state.a_end = Some(target);
                state.seam_click_state = SeamClickState::ClickedAEnd;
            }
            SeamClickState::ClickedAEnd => {
                history.save(state.clone());
                state.b_start = Some(target);
                state.seam_click_state = SeamClickState::ClickedBStart;
            }
            SeamClickState::ClickedBStart => {
                if state.b_start.map(|t| t.shape) != Some(target.shape) {
                    tracing::warn!("sew: B end is on a different shape than B start");
                    return SewClick::Rejected(SewingError::DifferentShape);
                }
                history.save(state.clone());
                state.b_end = Some(target);
                state.seam_click_state = SeamClickState::ClickedBEnd;
                state.seam_preview_points.push(target);
                return self.complete_seam(state, pieces);
            }
        }

        state.seam_preview_points.push(target);
        tracing::info!("sew: {:?} = {:?}", state.seam_click_state, target);
        SewClick::Accepted(state.seam_click_state)
    }

    fn complete_seam(&mut self, state: &mut CanvasState, pieces: &PieceSet) -> SewClick {
        let targets = (state.a_start, state.a_end, state.b_start, state.b_end);
        let (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) = targets else {
            state.seam_preview_points.clear();
            state.seam_click_state = SeamClickState::None;
            return SewClick::Rejected(SewingError::InvalidTarget);
        };

        if let Err(err) = Self::validate_targets(a_start, b_start, pieces) {
            state.seam_preview_points.clear();
            state.seam_click_state = SeamClickState::None;
            return SewClick::Rejected(err);
        }

        let result = match self.finalise_seam(state, [a_start, a_end, b_start, b_end], pieces) {
            Some(index) => SewClick::Completed(index),
            None => SewClick::Rejected(SewingError::InvalidTarget),
        };
        state.seam_preview_points.clear();
        state.seam_click_state = SeamClickState::None;
        result
    }

    /// Records a seam between two finished outlines and builds its constraint.
    pub fn finalise_seam(
        &mut self,
        state: &mut CanvasState,
        targets: [ClickTarget; 4],
        pieces: &PieceSet,
    ) -> Option<usize> {
        let [a_start, a_end, b_start, b_end] = targets;
        let definition = SeamDefinition {
            shape_a: a_start.shape.completed_index()?,
            edge_a: EdgeIndices {
                start: a_start.point,
                end: a_end.point,
            },
            shape_b: b_start.shape.completed_index()?,
            edge_b: EdgeIndices {
                start: b_start.point,
                end: b_end.point,
            },
        };
        let constraint = self.build_constraint(&definition, state, pieces)?;

        state.seams.push(definition);
        self.constraints.push(constraint);
        tracing::info!(
            "seam finalised between shapes {} and {} (points [{},{}] and [{},{}])",
            definition.shape_a,
            definition.shape_b,
            definition.edge_a.start,
            definition.edge_a.end,
            definition.edge_b.start,
            definition.edge_b.end
        );
        Some(state.seams.len() - 1)
    }

    pub fn build_constraint(
        &self,
        definition: &SeamDefinition,
        state: &CanvasState,
        pieces: &PieceSet,
    ) -> Option<SewingConstraint> {
        let point = |shape: usize, index: usize| {
            state
                .completed_shapes
                .get(shape)?
                .points
                .get(index)
                .map(|p| p.position)
        };
        let a1 = point(definition.shape_a, definition.edge_a.start)?;
        let a2 = point(definition.shape_a, definition.edge_a.end)?;
        let b1 = point(definition.shape_b, definition.edge_b.start)?;
        let b2 = point(definition.shape_b, definition.edge_b.end)?;

        let piece_a = pieces.piece_for_shape(definition.shape_a);
        let piece_b = pieces.piece_for_shape(definition.shape_b);
        let start_vid = |piece: Option<&PatternPiece>, index: usize| {
            piece.and_then(|p| p.poly_index_to_vid.get(index).copied().flatten())
        };

        Some(SewingConstraint {
            piece_a: piece_a.map(|p| p.id),
            vertex_a: start_vid(piece_a, definition.edge_a.start),
            piece_b: piece_b.map(|p| p.id),
            vertex_b: start_vid(piece_b, definition.edge_b.start),
            screen_points_a: lerp_points(a1, a2, SEAM_POINT_COUNT),
            screen_points_b: lerp_points(b1, b2, SEAM_POINT_COUNT),
            stiffness: self.stiffness,
        })
    }

    /// Rebuilds every constraint from the seam definitions, e.g. after undo
    /// or after the pieces were regenerated.
    pub fn rebuild_constraints(&mut self, state: &CanvasState, pieces: &PieceSet) {
        self.constraints = state
            .seams
            .iter()
            .map(|definition| {
                self.build_constraint(definition, state, pieces)
                    .unwrap_or_else(|| SewingConstraint {
                        piece_a: None,
                        vertex_a: None,
                        piece_b: None,
                        vertex_b: None,
                        screen_points_a: Vec::new(),
                        screen_points_b: Vec::new(),
                        stiffness: self.stiffness,
                    })
            })
            .collect();
    }

    pub fn remove_seam(&mut self, state: &mut CanvasState, index: usize) -> bool {
        if index >= state.seams.len() {
            return false;
        }
        state.seams.remove(index);
        if index < self.constraints.len() {
            self.constraints.remove(index);
        }
        tracing::info!("seam {} removed", index);
        true
    }

    pub fn clear_all(&mut self, state: &mut CanvasState) {
        state.seams.clear();
        state.seam_preview_points.clear();
        state.seam_click_state = SeamClickState::None;
        state.a_start = None;
        state.a_end = None;
        state.b_start = None;
        state.b_end = None;
        state.selected_seam = None;
        self.constraints.clear();
    }

    /// Maps each seam to piece vertices and moves the pieces together.
    /// Returns how many seams were aligned.
    pub fn build_and_align_all(&self, pieces: &mut PieceSet) -> usize {
        self.constraints
            .iter()
            .filter(|constraint| build_and_align_seam(constraint, pieces))
            .count()
    }
}

pub fn lerp_points(a: Vec2, b: Vec2, count: usize) -> Vec<Vec2> {
    let count = count.max(2);
    (0..count)
        .map(|i| a.lerp(b, i as f32 / (count - 1) as f32))
        .collect()
}

/// Seam endpoints per finished shape, used to highlight sewn keys.
pub fn sewn_point_sets(seams: &[SeamDefinition]) -> BTreeMap<usize, BTreeSet<usize>> {
    let mut sets: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for seam in seams {
        let a = sets.entry(seam.shape_a).or_default();
        a.insert(seam.edge_a.start);
        a.insert(seam.edge_a.end);
        let b = sets.entry(seam.shape_b).or_default();
        b.insert(seam.edge_b.start);
        b.insert(seam.edge_b.end);
    }
    sets
}

/// Segment indices (segment `i` runs from key `i` to `i + 1`) along the
/// shorter way round a closed outline. Ties go forward.
pub fn shortest_arc_segments(start: usize, end: usize, count: usize) -> BTreeSet<usize> {
    let mut segments = BTreeSet::new();
    if count <= 1 || start == end {
        return segments;
    }
    let s = start % count;
    let e = end % count;
    let forward = (e + count - s) % count;
    let backward = (s + count - e) % count;
    if forward <= backward {
        segments.extend((0..forward).map(|k| (s + k) % count));
    } else {
        segments.extend((0..backward).map(|k| (s + count * 2 - k - 1) % count));
    }
    segments
}

fn build_and_align_seam(constraint: &SewingConstraint, pieces: &mut PieceSet) -> bool {
    let Some((id_a, id_b)) = constraint.pieces() else {
        tracing::warn!("build seam: constraint has no pieces");
        return false;
    };
    let (pa, pb) = (&constraint.screen_points_a, &constraint.screen_points_b);
    if pa.len() < 2 || pb.len() < 2 {
        tracing::warn!(
            "build seam: not enough screen points (A={}, B={})",
            pa.len(),
            pb.len()
        );
        return false;
    }

    let Some((piece_a, piece_b)) = pieces.get_pair_mut(id_a, id_b) else {
        tracing::warn!("build seam: pieces for seam are missing, generate meshes first");
        return false;
    };
    if !piece_a.has_boundary_samples() || !piece_b.has_boundary_samples() {
        tracing::warn!(
            "build seam: {} or {} has no boundary samples",
            piece_a.label,
            piece_b.label
        );
        return false;
    }

    let seam_a = lerp_points(pa[0], pa[pa.len() - 1], SEAM_POINT_COUNT);
    let seam_b = lerp_points(pb[0], pb[pb.len() - 1], SEAM_POINT_COUNT);
    let vids_a = map_seam_to_vids(piece_a, &seam_a);
    let vids_b = map_seam_to_vids(piece_b, &seam_b);

    let mut paired_a = Vec::new();
    let mut paired_b = Vec::new();
    for (a, b) in vids_a.iter().zip(vids_b.iter()) {
        if let (Some(a), Some(b)) = (a, b) {
            paired_a.push(*a);
            paired_b.push(*b);
        }
    }
    if paired_a.is_empty() {
        tracing::warn!("build seam: no valid paired seam vertices");
        return false;
    }

    let world_a: Vec<Vec3> = paired_a.iter().filter_map(|v| piece_a.world_vertex(*v)).collect();
    let world_b: Vec<Vec3> = paired_b.iter().filter_map(|v| piece_b.world_vertex(*v)).collect();
    let mut world_b_rev = world_b.clone();
    world_b_rev.reverse();
    let avg_normal = average_distance(&world_a, &world_b);
    let avg_reversed = average_distance(&world_a, &world_b_rev);
    if avg_reversed + 1.0e-4 < avg_normal {
        paired_b.reverse();
        tracing::debug!(
            "reversed B seam ordering (avg normal={:.3} reversed={:.3})",
            avg_normal,
            avg_reversed
        );
    }

    piece_a.seam_vertex_ids = paired_a;
    piece_b.seam_vertex_ids = paired_b;
    tracing::info!(
        "seam prepared between {} and {} ({} vertex pairs)",
        piece_a.label,
        piece_b.label,
        piece_a.seam_vertex_ids.len()
    );
    align_seam_pieces(piece_a, piece_b)
}

fn map_seam_to_vids(piece: &PatternPiece, seam: &[Vec2]) -> Vec<Option<usize>> {
    seam.iter()
        .map(|q| {
            nearest_sample(&piece.boundary_samples_2d, *q)
                .and_then(|i| piece.boundary_sample_vids.get(i).copied().flatten())
                .filter(|vid| *vid < piece.mesh.vertex_count())
        })
        .collect()
}

fn average_distance(a: &[Vec3], b: &[Vec3]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return f32::MAX;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x.distance(*y)).sum::<f32>() / n as f32
}

/// Rotates B so its seam runs parallel to A's, then splits the remaining
/// offset evenly between both pieces.
pub fn align_seam_pieces(a: &mut PatternPiece, b: &mut PatternPiece) -> bool {
    let n = a.seam_vertex_ids.len().min(b.seam_vertex_ids.len());
    if n == 0 {
        tracing::warn!("cannot align: a seam vertex list is empty");
        return false;
    }
    let valid = |i: usize| {
        a.seam_vertex_ids[i] < a.mesh.vertex_count() && b.seam_vertex_ids[i] < b.mesh.vertex_count()
    };
    let (Some(first), Some(last)) = ((0..n).find(|i| valid(*i)), (0..n).rev().find(|i| valid(*i)))
    else {
        tracing::warn!("cannot align: no valid seam vertices");
        return false;
    };
    if first >= last {
        tracing::warn!("not enough valid seam points to compute direction");
        return false;
    }

    let world = |piece: &PatternPiece, i: usize| piece.world_vertex(piece.seam_vertex_ids[i]);
    let (Some(a0), Some(a1), Some(b0), Some(b1)) =
        (world(a, first), world(a, last), world(b, first), world(b, last))
    else {
        return false;
    };

    let dir_a = (a1 - a0).normalize_or_zero();
    let dir_b = (b1 - b0).normalize_or_zero();
    if dir_a == Vec3::ZERO || dir_b == Vec3::ZERO {
        tracing::warn!("degenerate seam direction, skipping rotation");
    } else {
        let rotation = Quat::from_rotation_arc(dir_b, dir_a);
        let mid_b = (b0 + b1) * 0.5;
        b.rotate_about(mid_b, rotation);
        tracing::debug!("rotated {} by {:.3} rad", b.label, rotation.angle_between(Quat::IDENTITY));
    }

    let mut total = Vec3::ZERO;
    let mut count = 0;
    for i in 0..n {
        let (Some(wa), Some(wb)) = (world(a, i), world(b, i)) else {
            continue;
        };
        total += wa - wb;
        count += 1;
    }
    if count == 0 {
        tracing::warn!("no valid seam points to translate after rotation");
        return false;
    }

    let half = total / count as f32 * 0.5;
    a.translate(-half);
    b.translate(half);
    tracing::info!("aligned {} and {} (offset {:?})", a.label, b.label, half * 2.0);
    true
}
