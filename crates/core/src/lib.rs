mod assets;
mod canvas_state;
mod curve;
mod editor;
mod error;
mod merge;
mod mesh;
mod pattern;
mod project;
mod scene;
mod sewing;
mod sim_settings;
mod triangulate;
mod view;

pub use assets::{
    asset_file_path, load_canvas_state, sanitize_name, save_shape_asset, CanvasAssetManager,
    ClothShapeAsset, CurvePointData, ShapeData, ASSET_EXTENSION, ASSET_FOLDER,
};
pub use canvas_state::{CanvasState, ClickTarget, History, ShapeRef, DEFAULT_HISTORY_LIMIT};
pub use curve::{Curve, CurvePoint};
pub use editor::{
    dist_point_to_segment_sq, CanvasEditor, EditorKey, EditorMode, SelectHit, TangentHandle,
};
pub use error::{AssetError, ProjectError, SewingError, TriangulationError};
pub use merge::{
    adjacency, component_has_external_seams, connected_components, merge_component,
    merge_sewn_groups, MergeReport,
};
pub use mesh::Mesh;
pub use pattern::{build_pattern_piece, PatternPiece, PieceId, PieceSet};
pub use project::{CanvasSettings, PanelSettings, Project, ProjectSettings, PROJECT_VERSION};
pub use scene::{write_obj, SceneMesh, SceneRange, SceneSnapshot};
pub use sewing::{
    align_seam_pieces, lerp_points, sewn_point_sets, shortest_arc_segments, EdgeIndices,
    SeamClickState, SeamDefinition, SewClick, SewingConstraint, SewingManager,
};
pub use sim_settings::{
    set_cloth_collision_flags, ClothPhysicalConfig, ClothPreset, ClothSimConfig,
    ClothSimSettings, CollisionSettings, Weighted,
};
pub use triangulate::{
    point_in_polygon, sample_shape, triangulate_shape, ShapeTriangulation, SAMPLES_PER_SEGMENT,
};
pub use view::{CanvasView, GridLines, DEFAULT_ZOOM, MAX_ZOOM};
