use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::canvas_state::CanvasState;
use crate::curve::{Curve, CurvePoint};
use crate::error::AssetError;
use crate::sewing::SeamDefinition;
use crate::view::DEFAULT_ZOOM;

pub const ASSET_FOLDER: &str = "ClothDesign";
pub const ASSET_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurvePointData {
    pub input_key: f32,
    pub position: Vec2,
    pub arrive_tangent: Vec2,
    pub leave_tangent: Vec2,
    pub use_bezier: bool,
}

impl Default for CurvePointData {
    fn default() -> Self {
        Self {
            input_key: 0.0,
            position: Vec2::ZERO,
            arrive_tangent: Vec2::ZERO,
            leave_tangent: Vec2::ZERO,
            use_bezier: false,
        }
    }
}

impl From<&CurvePoint> for CurvePointData {
    fn from(point: &CurvePoint) -> Self {
        Self {
            input_key: point.input_key,
            position: point.position,
            arrive_tangent: point.arrive_tangent,
            leave_tangent: point.leave_tangent,
            use_bezier: point.use_bezier,
        }
    }
}

impl From<&CurvePointData> for CurvePoint {
    fn from(data: &CurvePointData) -> Self {
        Self {
            input_key: data.input_key,
            position: data.position,
            arrive_tangent: data.arrive_tangent,
            leave_tangent: data.leave_tangent,
            use_bezier: data.use_bezier,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeData {
    pub completed_cloth_shape: Vec<CurvePointData>,
}

/// On-disk form of a canvas: the finished outlines, the one in progress and
/// the seams between finished outlines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothShapeAsset {
    pub cloth_curve_points: Vec<CurvePointData>,
    pub cloth_shapes: Vec<ShapeData>,
    pub seams: Vec<SeamDefinition>,
}

impl ClothShapeAsset {
    pub fn from_state(state: &CanvasState) -> Self {
        Self {
            cloth_curve_points: state.curve.points.iter().map(CurvePointData::from).collect(),
            cloth_shapes: state
                .completed_shapes
                .iter()
                .map(|shape| ShapeData {
                    completed_cloth_shape: shape.points.iter().map(CurvePointData::from).collect(),
                })
                .collect(),
            seams: state.seams.clone(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, AssetError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Replaces characters that are not safe in a file or folder name.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolves `<root>/ClothDesign/<asset_path>/<name>.json`.
pub fn asset_file_path(root: &Path, asset_path: &str, name: &str) -> Result<PathBuf, AssetError> {
    if asset_path.contains(':') || asset_path.contains('?') {
        return Err(AssetError::InvalidPath(asset_path.to_string()));
    }
    let name = sanitize_name(name);
    if name.is_empty() {
        return Err(AssetError::EmptyName);
    }

    let mut path = root.join(ASSET_FOLDER);
    for segment in asset_path.split(['/', '\\']) {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(AssetError::InvalidPath(asset_path.to_string()));
        }
        path.push(sanitize_name(segment));
    }
    path.push(format!("{name}.{ASSET_EXTENSION}"));
    Ok(path)
}

pub fn save_shape_asset(
    root: &Path,
    asset_path: &str,
    name: &str,
    state: &CanvasState,
) -> Result<PathBuf, AssetError> {
    let path = asset_file_path(root, asset_path, name)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let asset = ClothShapeAsset::from_state(state);
    let data = serde_json::to_string_pretty(&asset)?;
    fs::write(&path, data)?;
    tracing::info!("asset saved: {}", path.display());
    Ok(path)
}

/// Builds a fresh canvas from an asset. Empty outlines are dropped and the
/// view is reset. Seams are renumbered to the surviving outlines; seams that
/// touch a dropped outline or a missing key are discarded.
pub fn load_canvas_state(asset: &ClothShapeAsset) -> CanvasState {
    let mut state = CanvasState::default();
    let mut remap = vec![None; asset.cloth_shapes.len()];
    for (old, shape) in asset.cloth_shapes.iter().enumerate() {
        if shape.completed_cloth_shape.is_empty() {
            continue;
        }
        remap[old] = Some(state.completed_shapes.len());
        state.completed_shapes.push(Curve {
            points: shape.completed_cloth_shape.iter().map(CurvePoint::from).collect(),
        });
    }

    let shape_len = |index: usize| state.completed_shapes.get(index).map_or(0, Curve::len);
    let mut seams = Vec::with_capacity(asset.seams.len());
    for seam in &asset.seams {
        let mapped = remap.get(seam.shape_a).copied().flatten().zip(
            remap.get(seam.shape_b).copied().flatten(),
        );
        let Some((shape_a, shape_b)) = mapped else {
            tracing::warn!("asset seam references a missing shape; dropped");
            continue;
        };
        let (len_a, len_b) = (shape_len(shape_a), shape_len(shape_b));
        if seam.edge_a.start.max(seam.edge_a.end) >= len_a
            || seam.edge_b.start.max(seam.edge_b.end) >= len_b
        {
            tracing::warn!("asset seam references a missing point; dropped");
            continue;
        }
        seams.push(SeamDefinition {
            shape_a,
            shape_b,
            ..*seam
        });
    }
    state.seams = seams;
    state.curve = Curve {
        points: asset.cloth_curve_points.iter().map(CurvePoint::from).collect(),
    };
    state.selected_point = None;
    state.pan = Vec2::ZERO;
    state.zoom = DEFAULT_ZOOM;
    state
}

#[derive(Debug, Clone, Default)]
pub struct CanvasAssetManager {
    selected: Option<PathBuf>,
}

impl CanvasAssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, path: impl Into<PathBuf>) -> Result<CanvasState, AssetError> {
        let path = path.into();
        let asset = ClothShapeAsset::read(&path)?;
        tracing::info!("selected shape asset: {}", path.display());
        self.selected = Some(path);
        Ok(load_canvas_state(&asset))
    }

    pub fn reload(&self) -> Result<CanvasState, AssetError> {
        let path = self.selected.as_deref().ok_or(AssetError::NoSelection)?;
        let asset = ClothShapeAsset::read(path)?;
        Ok(load_canvas_state(&asset))
    }

    /// Every shape asset under `<root>/ClothDesign`, sorted by path.
    pub fn list_assets(root: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![root.join(ASSET_FOLDER)];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|ext| ext == ASSET_EXTENSION) {
                    found.push(path);
                }
            }
        }
        found.sort();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sewing::EdgeIndices;

    fn sample_state() -> CanvasState {
        let mut state = CanvasState::default();
        state.completed_shapes.push(Curve::from_positions(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
        ]));
        state.curve.push_point(Vec2::new(50.0, 50.0), true);
        state.selected_point = Some(0);
        state.pan = Vec2::new(12.0, -3.0);
        state.zoom = 2.0;
        state
    }

    #[test]
    fn rejects_illegal_paths_and_names() {
        let root = Path::new("/tmp");
        assert!(matches!(
            asset_file_path(root, "bad:path", "a"),
            Err(AssetError::InvalidPath(_))
        ));
        assert!(matches!(
            asset_file_path(root, "what?", "a"),
            Err(AssetError::InvalidPath(_))
        ));
        assert!(matches!(asset_file_path(root, "ok", "  "), Err(AssetError::EmptyName)));
    }

    #[test]
    fn path_layout_and_sanitising() {
        let path = asset_file_path(Path::new("root"), "Shirts/Summer", "my shirt").expect("path");
        assert_eq!(path, Path::new("root/ClothDesign/Shirts/Summer/my_shirt.json"));
    }

    #[test]
    fn save_then_select_resets_view() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = sample_state();
        let path = save_shape_asset(dir.path(), "Tests", "Shape", &state).expect("save");
        assert!(path.exists());

        let mut manager = CanvasAssetManager::new();
        let loaded = manager.select(&path).expect("load");
        assert_eq!(loaded.completed_shapes, state.completed_shapes);
        assert_eq!(loaded.curve, state.curve);
        assert_eq!(loaded.selected_point, None);
        assert_eq!(loaded.pan, Vec2::ZERO);
        assert_eq!(loaded.zoom, DEFAULT_ZOOM);
        assert!(loaded.seams.is_empty());

        assert_eq!(manager.selected_path(), Some(path.as_path()));
        assert_eq!(manager.reload().expect("reload").completed_shapes.len(), 1);
        assert_eq!(CanvasAssetManager::list_assets(dir.path()), vec![path]);
    }

    #[test]
    fn empty_shapes_are_skipped() {
        let asset = ClothShapeAsset {
            cloth_curve_points: Vec::new(),
            cloth_shapes: vec![
                ShapeData::default(),
                ShapeData {
                    completed_cloth_shape: vec![CurvePointData::default()],
                },
            ],
            seams: Vec::new(),
        };
        let state = load_canvas_state(&asset);
        assert_eq!(state.completed_shapes.len(), 1);
        assert!(state.curve.is_empty());
    }

    fn triangle_data(x: f32) -> ShapeData {
        ShapeData {
            completed_cloth_shape: [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]
                .iter()
                .map(|(px, py)| CurvePointData {
                    position: Vec2::new(x + px, *py),
                    ..CurvePointData::default()
                })
                .collect(),
        }
    }

    fn seam(shape_a: usize, shape_b: usize, end_b: usize) -> SeamDefinition {
        SeamDefinition {
            shape_a,
            edge_a: EdgeIndices { start: 0, end: 1 },
            shape_b,
            edge_b: EdgeIndices { start: 1, end: end_b },
        }
    }

    #[test]
    fn seams_survive_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut state = sample_state();
        state.completed_shapes.push(state.completed_shapes[0].clone());
        state.seams.push(seam(0, 1, 2));
        let path = save_shape_asset(dir.path(), "", "Sewn", &state).expect("save");

        let loaded = CanvasAssetManager::new().select(&path).expect("load");
        assert_eq!(loaded.seams, state.seams);
    }

    #[test]
    fn seams_follow_dropped_shapes() {
        let asset = ClothShapeAsset {
            cloth_curve_points: Vec::new(),
            cloth_shapes: vec![ShapeData::default(), triangle_data(0.0), triangle_data(50.0)],
            seams: vec![seam(1, 2, 2), seam(0, 1, 2), seam(1, 2, 7)],
        };
        let state = load_canvas_state(&asset);
        assert_eq!(state.completed_shapes.len(), 2);
        assert_eq!(state.seams, vec![seam(0, 1, 2)]);
    }

    #[test]
    fn reload_without_selection_fails() {
        assert!(matches!(
            CanvasAssetManager::new().reload(),
            Err(AssetError::NoSelection)
        ));
    }
}
