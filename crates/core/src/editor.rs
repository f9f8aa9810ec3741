use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::assets::{save_shape_asset, CanvasAssetManager};
use crate::canvas_state::{CanvasState, ClickTarget, History, ShapeRef};
use crate::error::AssetError;
use crate::merge::{merge_sewn_groups, MergeReport};
use crate::pattern::PieceSet;
use crate::scene::write_obj;
use crate::sewing::{sewn_point_sets, SewClick, SewingManager};
use crate::sim_settings::{set_cloth_collision_flags, ClothPreset, ClothSimConfig, ClothSimSettings};
use crate::view::CanvasView;

pub const POINT_SELECT_RADIUS: f32 = 10.0;
pub const TANGENT_SELECT_RADIUS: f32 = 25.0;
pub const SEAM_SELECT_RADIUS: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    #[default]
    Draw,
    Select,
    Sew,
}

impl EditorMode {
    pub fn label(self) -> &'static str {
        match self {
            EditorMode::Draw => "Draw",
            EditorMode::Select => "Select",
            EditorMode::Sew => "Sew",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TangentHandle {
    Arrive,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragKind {
    Point,
    Tangent(TangentHandle),
}

/// What a select click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectHit {
    Point(ClickTarget),
    Tangent(ClickTarget, TangentHandle),
    Seam(usize),
    Nothing,
}

/// Keys the canvas reacts to, independent of the windowing toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    Num1,
    Num2,
    Num3,
    Z,
    Y,
    F,
    T,
    B,
    N,
    Enter,
    Delete,
}

/// Squared distance from `p` to the segment `a`-`b`.
pub fn dist_point_to_segment_sq(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= 1.0e-8 {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

/// The pattern canvas: drawing, selection, sewing and everything the tool
/// panels trigger. Screen positions are widget-local pixels.
#[derive(Debug, Clone)]
pub struct CanvasEditor {
    pub mode: EditorMode,
    pub state: CanvasState,
    pub history: History,
    pub sewing: SewingManager,
    pub pieces: PieceSet,
    pub sim_settings: ClothSimSettings,
    pub sim_config: ClothSimConfig,
    pub assets: CanvasAssetManager,
    pub asset_root: PathBuf,
    pub use_bezier_points: bool,
    pub separate_tangents: bool,
    pub selected_shape: ShapeRef,
    pub selected_tangent: Option<TangentHandle>,
    pub sewn_points: BTreeMap<usize, BTreeSet<usize>>,
    pub viewport: Vec2,
    drag: Option<DragKind>,
}

impl Default for CanvasEditor {
    fn default() -> Self {
        Self {
            mode: EditorMode::Draw,
            state: CanvasState::default(),
            history: History::default(),
            sewing: SewingManager::new(),
            pieces: PieceSet::new(),
            sim_settings: ClothSimSettings::default(),
            sim_config: ClothSimConfig::default(),
            assets: CanvasAssetManager::new(),
            asset_root: PathBuf::from("Content"),
            use_bezier_points: true,
            separate_tangents: false,
            selected_shape: ShapeRef::Current,
            selected_tangent: None,
            sewn_points: BTreeMap::new(),
            viewport: Vec2::new(800.0, 600.0),
            drag: None,
        }
    }
}

impl CanvasEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> CanvasView {
        CanvasView {
            pan: self.state.pan,
            zoom: self.state.zoom,
        }
    }

    fn set_view(&mut self, view: CanvasView) {
        self.state.pan = view.pan;
        self.state.zoom = view.zoom;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn selected_target(&self) -> Option<ClickTarget> {
        self.state.selected_point.map(|point| ClickTarget {
            shape: self.selected_shape,
            point,
        })
    }

    pub fn set_mode(&mut self, mode: EditorMode) {
        if self.mode != mode {
            tracing::info!("switched to {} mode", mode.label());
        }
        self.mode = mode;
        self.drag = None;
    }

    fn save_undo(&mut self) {
        self.history.save(self.state.clone());
    }

    fn refresh_sewn_points(&mut self) {
        self.sewn_points = sewn_point_sets(&self.state.seams);
    }

    fn clear_selection(&mut self) {
        self.state.selected_point = None;
        self.selected_shape = ShapeRef::Current;
        self.selected_tangent = None;
        self.drag = None;
    }

    /// Dispatches a primary click according to the active mode.
    pub fn primary_click(&mut self, screen: Vec2) -> Option<SewClick> {
        match self.mode {
            EditorMode::Draw => {
                self.draw_click(screen);
                None
            }
            EditorMode::Select => {
                self.select_click(screen);
                None
            }
            EditorMode::Sew => Some(self.sew_click(screen)),
        }
    }

    pub fn draw_click(&mut self, screen: Vec2) -> usize {
        let canvas = self.view().to_canvas(screen);
        self.save_undo();

        let curve = &mut self.state.curve;
        let index = curve.push_point(canvas, self.use_bezier_points);
        if self.use_bezier_points {
            curve.auto_set_tangents();
        } else {
            curve.recalculate_linear_tangents();
        }
        curve.set_open_end_tangents();
        tracing::debug!("draw: added point at {:.2},{:.2}", canvas.x, canvas.y);
        index
    }

    pub fn select_click(&mut self, screen: Vec2) -> SelectHit {
        let canvas = self.view().to_canvas(screen);
        let hit = self.hit_test(screen, canvas);
        match hit {
            SelectHit::Point(target) => {
                self.save_undo();
                self.selected_shape = target.shape;
                self.state.selected_point = Some(target.point);
                self.state.selected_seam = None;
                self.selected_tangent = None;
                self.drag = Some(DragKind::Point);
            }
            SelectHit::Tangent(target, handle) => {
                self.save_undo();
                self.selected_shape = target.shape;
                self.state.selected_point = Some(target.point);
                self.state.selected_seam = None;
                self.selected_tangent = Some(handle);
                self.drag = Some(DragKind::Tangent(handle));
            }
            SelectHit::Seam(index) => {
                self.save_undo();
                self.clear_selection();
                self.state.selected_seam = Some(index);
                tracing::info!("seam {} selected", index);
            }
            SelectHit::Nothing => {
                self.clear_selection();
                self.state.selected_seam = None;
            }
        }
        hit
    }

    fn hit_test(&self, screen: Vec2, canvas: Vec2) -> SelectHit {
        let zoom = self.state.zoom;
        let point_radius = POINT_SELECT_RADIUS / zoom;
        let tangent_radius = TANGENT_SELECT_RADIUS / zoom;

        let completed = self
            .state
            .completed_shapes
            .iter()
            .enumerate()
            .map(|(i, s)| (ShapeRef::Completed(i), s));
        let ordered: Vec<_> = completed
            .chain(std::iter::once((ShapeRef::Current, &self.state.curve)))
            .collect();

        for (shape, curve) in &ordered {
            for (point, p) in curve.points.iter().enumerate() {
                if p.position.distance(canvas) < point_radius {
                    return SelectHit::Point(ClickTarget { shape: *shape, point });
                }
            }
        }

        for (shape, curve) in &ordered {
            for (point, p) in curve.points.iter().enumerate() {
                if !p.use_bezier {
                    continue;
                }
                let target = ClickTarget { shape: *shape, point };
                if p.arrive_handle().distance(canvas) < tangent_radius {
                    return SelectHit::Tangent(target, TangentHandle::Arrive);
                }
                if p.leave_handle().distance(canvas) < tangent_radius {
                    return SelectHit::Tangent(target, TangentHandle::Leave);
                }
            }
        }

        let view = self.view();
        let radius_sq = SEAM_SELECT_RADIUS * SEAM_SELECT_RADIUS;
        let point = |shape: usize, index: usize| {
            self.state
                .point_position(ClickTarget {
                    shape: ShapeRef::Completed(shape),
                    point: index,
                })
                .map(|p| view.to_screen(p))
        };
        for (index, seam) in self.state.seams.iter().enumerate() {
            let lines = [
                (point(seam.shape_a, seam.edge_a.start), point(seam.shape_b, seam.edge_b.start)),
                (point(seam.shape_a, seam.edge_a.end), point(seam.shape_b, seam.edge_b.end)),
            ];
            for (a, b) in lines {
                if let (Some(a), Some(b)) = (a, b) {
                    if dist_point_to_segment_sq(screen, a, b) <= radius_sq {
                        return SelectHit::Seam(index);
                    }
                }
            }
        }

        SelectHit::Nothing
    }

    /// Moves whatever the last select click grabbed. Returns false when
    /// nothing is being dragged.
    pub fn drag_to(&mut self, screen: Vec2) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        let Some(index) = self.state.selected_point else {
            return false;
        };
        let canvas = self.view().to_canvas(screen);
        let shape = self.selected_shape;
        let separate = self.separate_tangents;
        let Some(curve) = self.state.shape_mut(shape) else {
            return false;
        };
        let Some(point) = curve.points.get_mut(index) else {
            return false;
        };

        match drag {
            DragKind::Tangent(handle) => {
                if shape != ShapeRef::Current {
                    point.use_bezier = true;
                }
                let link = point.use_bezier && !separate;
                let delta = canvas - point.position;
                match handle {
                    TangentHandle::Arrive => {
                        point.arrive_tangent = -delta;
                        if link {
                            point.leave_tangent =
                                -delta.normalize_or_zero() * point.leave_tangent.length();
                        }
                    }
                    TangentHandle::Leave => {
                        point.leave_tangent = delta;
                        if link {
                            point.arrive_tangent =
                                delta.normalize_or_zero() * point.arrive_tangent.length();
                        }
                    }
                }
            }
            DragKind::Point => {
                point.position = canvas;
                if !point.use_bezier {
                    curve.recalculate_linear_tangents();
                }
            }
        }
        true
    }

    pub fn release(&mut self) -> bool {
        let was_dragging = self.drag.take().is_some();
        self.selected_tangent = None;
        was_dragging
    }

    /// Deletes the selected seam, or failing that the selected point.
    pub fn delete_selected(&mut self) -> bool {
        if let Some(index) = self.state.selected_seam {
            self.save_undo();
            self.sewing.remove_seam(&mut self.state, index);
            self.state.selected_seam = None;
            self.refresh_sewn_points();
            return true;
        }

        let Some(index) = self.state.selected_point else {
            return false;
        };
        self.save_undo();
        let shape = self.selected_shape;
        let removed = self
            .state
            .shape_mut(shape)
            .and_then(|curve| curve.remove_point(index))
            .is_some();
        if removed {
            tracing::info!("deleted point {} of {:?}", index, shape);
        }
        self.clear_selection();
        removed
    }

    /// Moves the outline being drawn into the finished shapes.
    pub fn finalise_current_shape(&mut self) -> Option<usize> {
        if self.state.curve.is_empty() {
            tracing::debug!("finalise: no points to finalise");
            return None;
        }
        self.save_undo();
        let mut curve = std::mem::take(&mut self.state.curve);
        curve.set_open_end_tangents();
        self.state.completed_shapes.push(curve);
        if self.selected_shape == ShapeRef::Current {
            self.clear_selection();
        }
        tracing::info!("shape finalised, ready to start a new one");
        Some(self.state.completed_shapes.len() - 1)
    }

    pub fn sew_click(&mut self, screen: Vec2) -> SewClick {
        let canvas = self.view().to_canvas(screen);
        let result = self
            .sewing
            .click(&mut self.state, &mut self.history, canvas, &self.pieces);
        match &result {
            SewClick::Completed(index) => {
                self.refresh_sewn_points();
                tracing::info!("seam {} created", index);
            }
            SewClick::Rejected(err) => tracing::warn!("sew click rejected: {}", err),
            _ => {}
        }
        result
    }

    /// Answer to `SewClick::NeedsFinalise`: finalise the outline, build its
    /// mesh and repeat the click against the new shape.
    pub fn finalise_and_sew(&mut self, screen: Vec2) -> SewClick {
        if self.finalise_current_shape().is_none() {
            return SewClick::Missed;
        }
        self.generate_meshes();
        self.sew_click(screen)
    }

    fn restore_after_history(&mut self) {
        self.clear_selection();
        self.refresh_sewn_points();
        self.sewing.rebuild_constraints(&self.state, &self.pieces);
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.undo(&mut self.state) {
            return false;
        }
        self.restore_after_history();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.redo(&mut self.state) {
            return false;
        }
        self.restore_after_history();
        true
    }

    pub fn focus(&mut self, viewport: Vec2) -> bool {
        let mut view = self.view();
        let focused = view.focus_on(&self.state.all_positions(), viewport);
        self.set_view(view);
        focused
    }

    pub fn zoom_at(&mut self, mouse: Vec2, wheel_delta: f32) {
        let mut view = self.view();
        view.zoom_at(mouse, wheel_delta);
        self.set_view(view);
    }

    pub fn pan_by(&mut self, screen_delta: Vec2) {
        let mut view = self.view();
        view.pan_by(screen_delta);
        self.set_view(view);
    }

    pub fn key_down(&mut self, key: EditorKey, ctrl: bool) -> bool {
        match key {
            EditorKey::Delete => self.delete_selected(),
            EditorKey::Num1 => {
                self.set_mode(EditorMode::Draw);
                true
            }
            EditorKey::Num2 => {
                self.set_mode(EditorMode::Select);
                true
            }
            EditorKey::Num3 => {
                self.set_mode(EditorMode::Sew);
                true
            }
            EditorKey::Z if ctrl => self.undo(),
            EditorKey::Y if ctrl => self.redo(),
            EditorKey::F => self.focus(self.viewport),
            EditorKey::T if self.mode == EditorMode::Select => {
                self.separate_tangents = true;
                true
            }
            EditorKey::B if self.mode == EditorMode::Draw => {
                self.use_bezier_points = true;
                true
            }
            EditorKey::N if self.mode == EditorMode::Draw => {
                self.use_bezier_points = false;
                true
            }
            EditorKey::Enter if self.mode == EditorMode::Draw => {
                self.finalise_current_shape().is_some()
            }
            _ => false,
        }
    }

    pub fn key_up(&mut self, key: EditorKey) -> bool {
        if key == EditorKey::T && self.mode == EditorMode::Select {
            self.separate_tangents = false;
            return true;
        }
        false
    }

    /// Regenerates a piece for every finished shape and re-binds the seams.
    pub fn generate_meshes(&mut self) -> usize {
        let count = self.pieces.generate_all(&self.state.completed_shapes);
        self.sewing.rebuild_constraints(&self.state, &self.pieces);
        tracing::info!("generated {} pattern pieces", count);
        count
    }

    pub fn sew_all(&mut self) -> usize {
        self.sewing.rebuild_constraints(&self.state, &self.pieces);
        let aligned = self.sewing.build_and_align_all(&mut self.pieces);
        tracing::info!("aligned {} of {} seams", aligned, self.sewing.constraints.len());
        aligned
    }

    pub fn merge_sewn(&mut self) -> MergeReport {
        let report = merge_sewn_groups(&mut self.pieces, &mut self.sewing.constraints);
        tracing::info!(
            "merge: {} merged pieces, {} components skipped",
            report.merged.len(),
            report.skipped_components
        );
        report
    }

    pub fn clear_all_shapes(&mut self) {
        self.save_undo();
        self.state.curve.clear();
        self.state.completed_shapes.clear();
        self.sewing.clear_all(&mut self.state);
        self.pieces.clear();
        self.clear_selection();
        self.refresh_sewn_points();
        tracing::info!("cleared all shapes");
    }

    pub fn clear_all_sewing(&mut self) {
        self.save_undo();
        self.sewing.clear_all(&mut self.state);
        self.refresh_sewn_points();
        tracing::info!("cleared all sewing");
    }

    pub fn save_asset(&self, asset_path: &str, name: &str) -> Result<PathBuf, AssetError> {
        save_shape_asset(&self.asset_root, asset_path, name, &self.state)
    }

    /// Replaces the canvas with a saved asset. The previous canvas stays on
    /// the undo stack.
    pub fn load_asset(&mut self, path: impl Into<PathBuf>) -> Result<(), AssetError> {
        let loaded = self.assets.select(path)?;
        self.save_undo();
        self.state = loaded;
        self.pieces.clear();
        self.sewing.constraints.clear();
        self.clear_selection();
        self.refresh_sewn_points();
        Ok(())
    }

    pub fn apply_sim_preset(&mut self, preset: ClothPreset) -> bool {
        self.sim_settings.selected_preset = preset;
        let applied = self.sim_settings.apply_selected(&mut self.sim_config);
        if applied {
            set_cloth_collision_flags(&mut self.sim_config.collision);
        }
        applied
    }

    pub fn export_obj(&self, path: &Path) -> Result<(), AssetError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_obj(&mut writer, &self.pieces)?;
        writer.flush()?;
        tracing::info!("exported {} pieces to {}", self.pieces.len(), path.display());
        Ok(())
    }
}
