use glam::{Mat4, Quat, Vec2, Vec3};

use crate::curve::Curve;
use crate::error::TriangulationError;
use crate::mesh::Mesh;
use crate::triangulate::triangulate_shape;

const UV_SCALE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceId(pub u64);

/// A triangulated pattern piece placed in the world.
///
/// The mesh is stored relative to the piece origin; `translation` and
/// `rotation` place it. Boundary samples keep the 2D outline they came from so
/// seams drawn on the canvas can be mapped back onto mesh vertices.
#[derive(Debug, Clone)]
pub struct PatternPiece {
    pub id: PieceId,
    pub label: String,
    pub source_shape: Option<usize>,
    pub mesh: Mesh,
    pub translation: Vec3,
    pub rotation: Quat,
    pub seam_vertex_ids: Vec<usize>,
    pub poly_index_to_vid: Vec<Option<usize>>,
    pub boundary_samples_2d: Vec<Vec2>,
    pub boundary_sample_vids: Vec<Option<usize>>,
    pub boundary_sample_world: Vec<Vec3>,
}

impl PatternPiece {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    pub fn world_vertex(&self, vid: usize) -> Option<Vec3> {
        let local = self.mesh.vertex(vid)?;
        Some(self.rotation * local + self.translation)
    }

    pub fn world_mesh(&self) -> Mesh {
        let mut mesh = self.mesh.clone();
        mesh.transform(self.matrix());
        mesh
    }

    pub fn has_boundary_samples(&self) -> bool {
        !self.boundary_samples_2d.is_empty()
    }

    pub fn refresh_boundary_world_positions(&mut self) {
        self.boundary_sample_world = self
            .boundary_sample_vids
            .iter()
            .map(|vid| vid.and_then(|v| self.world_vertex(v)).unwrap_or(Vec3::ZERO))
            .collect();
    }

    /// Rotates the piece about a world-space pivot.
    pub fn rotate_about(&mut self, pivot: Vec3, rotation: Quat) {
        self.translation = rotation * (self.translation - pivot) + pivot;
        self.rotation = (rotation * self.rotation).normalize();
        self.refresh_boundary_world_positions();
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.translation += offset;
        self.refresh_boundary_world_positions();
    }
}

/// Triangulates `curve` into a piece centred on its area-weighted centroid.
pub fn build_pattern_piece(
    id: PieceId,
    label: String,
    source_shape: Option<usize>,
    curve: &Curve,
    seam_range: Option<(usize, usize)>,
) -> Result<PatternPiece, TriangulationError> {
    let tri = triangulate_shape(curve, seam_range)?;
    let mut mesh = tri.mesh;
    let centroid = mesh.area_weighted_centroid().ok_or(TriangulationError::Empty)?;
    mesh.center_vertices(centroid);
    mesh.planar_uvs(UV_SCALE);
    mesh.set_up_normals();

    let mut piece = PatternPiece {
        id,
        label,
        source_shape,
        mesh,
        translation: centroid,
        rotation: Quat::IDENTITY,
        seam_vertex_ids: tri.seam_vids,
        poly_index_to_vid: tri.poly_index_to_vid,
        boundary_samples_2d: tri.boundary_samples,
        boundary_sample_vids: tri.boundary_vids,
        boundary_sample_world: Vec::new(),
    };
    piece.refresh_boundary_world_positions();
    Ok(piece)
}

#[derive(Debug, Clone, Default)]
pub struct PieceSet {
    pieces: Vec<PatternPiece>,
    next_id: u64,
    generated_counter: usize,
    merged_counter: usize,
}

impl PieceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternPiece> {
        self.pieces.iter()
    }

    pub fn get(&self, id: PieceId) -> Option<&PatternPiece> {
        self.pieces.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PieceId) -> Option<&mut PatternPiece> {
        self.pieces.iter_mut().find(|p| p.id == id)
    }

    pub fn get_pair_mut(
        &mut self,
        a: PieceId,
        b: PieceId,
    ) -> Option<(&mut PatternPiece, &mut PatternPiece)> {
        if a == b {
            return None;
        }
        let ia = self.pieces.iter().position(|p| p.id == a)?;
        let ib = self.pieces.iter().position(|p| p.id == b)?;
        if ia < ib {
            let (left, right) = self.pieces.split_at_mut(ib);
            Some((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.pieces.split_at_mut(ia);
            Some((&mut right[0], &mut left[ib]))
        }
    }

    pub fn piece_for_shape(&self, shape_index: usize) -> Option<&PatternPiece> {
        self.pieces
            .iter()
            .find(|p| p.source_shape == Some(shape_index))
    }

    pub fn remove(&mut self, id: PieceId) -> Option<PatternPiece> {
        let index = self.pieces.iter().position(|p| p.id == id)?;
        Some(self.pieces.remove(index))
    }

    pub fn clear(&mut self) {
        self.pieces.clear();
    }

    pub fn allocate_id(&mut self) -> PieceId {
        let id = PieceId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn next_generated_label(&mut self) -> String {
        let label = format!("ClothMeshActor_{}", self.generated_counter);
        self.generated_counter += 1;
        label
    }

    pub fn next_merged_label(&mut self) -> String {
        let label = format!("MergedPatternMesh_{}", self.merged_counter);
        self.merged_counter += 1;
        label
    }

    pub fn push(&mut self, piece: PatternPiece) -> PieceId {
        let id = piece.id;
        self.pieces.push(piece);
        id
    }

    /// Rebuilds every piece from the finished outlines. Outlines that fail to
    /// triangulate are logged and left without a piece.
    pub fn generate_all(&mut self, shapes: &[Curve]) -> usize {
        self.clear();
        for (index, shape) in shapes.iter().enumerate() {
            let id = self.allocate_id();
            let label = self.next_generated_label();
            match build_pattern_piece(id, label, Some(index), shape, None) {
                Ok(piece) => {
                    tracing::info!(
                        "generated {} for shape {} ({} triangles)",
                        piece.label,
                        index,
                        piece.mesh.triangle_count()
                    );
                    self.pieces.push(piece);
                }
                Err(err) => {
                    tracing::warn!("shape {} skipped: {}", index, err);
                }
            }
        }
        self.pieces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Curve {
        Curve::from_positions(&[
            Vec2::new(x, y),
            Vec2::new(x + w, y),
            Vec2::new(x + w, y + h),
            Vec2::new(x, y + h),
        ])
    }

    #[test]
    fn piece_is_centred_on_its_centroid() {
        let mut set = PieceSet::new();
        let id = set.allocate_id();
        let piece = build_pattern_piece(id, "p".into(), Some(0), &rect(10.0, 20.0, 40.0, 20.0), None)
            .expect("piece");
        assert!(piece.translation.distance(Vec3::new(30.0, 30.0, 0.0)) < 0.05);
        let local = piece.mesh.area_weighted_centroid().expect("centroid");
        assert!(local.length() < 1.0e-3);
        let world = piece.boundary_sample_world[0];
        assert!(world.distance(Vec3::new(10.0, 20.0, 0.0)) < 1.0e-3);
    }

    #[test]
    fn generate_all_skips_degenerate_shapes() {
        let mut set = PieceSet::new();
        let shapes = vec![
            rect(0.0, 0.0, 10.0, 10.0),
            Curve::from_positions(&[Vec2::ZERO, Vec2::X]),
            rect(50.0, 0.0, 10.0, 10.0),
        ];
        assert_eq!(set.generate_all(&shapes), 2);
        assert!(set.piece_for_shape(1).is_none());
        assert_eq!(
            set.piece_for_shape(2).map(|p| p.label.as_str()),
            Some("ClothMeshActor_2")
        );
    }

    #[test]
    fn rotate_about_pivot() {
        let mut set = PieceSet::new();
        set.generate_all(&[rect(0.0, 0.0, 10.0, 10.0)]);
        let id = set.piece_for_shape(0).expect("piece").id;
        let piece = set.get_mut(id).expect("piece");
        piece.rotate_about(Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2));
        assert!(piece.translation.distance(Vec3::new(-5.0, 5.0, 0.0)) < 1.0e-3);
    }

    #[test]
    fn pair_access_is_ordered() {
        let mut set = PieceSet::new();
        set.generate_all(&[rect(0.0, 0.0, 10.0, 10.0), rect(20.0, 0.0, 10.0, 10.0)]);
        let a = set.piece_for_shape(0).expect("a").id;
        let b = set.piece_for_shape(1).expect("b").id;
        let (pb, pa) = set.get_pair_mut(b, a).expect("pair");
        assert_eq!(pa.id, a);
        assert_eq!(pb.id, b);
        assert!(set.get_pair_mut(a, a).is_none());
    }
}
