use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriangulationError {
    #[error("need at least 3 points to triangulate, got {0}")]
    TooFewPoints(usize),
    #[error("failed to insert vertex ({x}, {y}) into triangulation")]
    InvalidVertex { x: f32, y: f32 },
    #[error("triangulation produced no triangles")]
    Empty,
}

/// Reasons a sewing click or seam is refused. The messages are shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SewingError {
    #[error("Invalid shape target.")]
    InvalidTarget,
    #[error("No mesh is spawned for the selected shape.")]
    MissingMesh,
    #[error("The pattern mesh for the selected shape is missing or invalid. Regenerate meshes first.")]
    InvalidMesh,
    #[error("Edge end point must be on the same shape as its start point.")]
    DifferentShape,
    #[error("Cannot finalise seam: both pattern meshes must exist. Regenerate meshes and try again.")]
    MissingPieces,
    #[error("Cannot finalise seam: both targets refer to the same shape/mesh.")]
    SameShape,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset name is empty")]
    EmptyName,
    #[error("invalid asset path {0:?}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no asset selected")]
    NoSelection,
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported project version {found} (expected <= {expected})")]
    Version { found: u32, expected: u32 },
}
