use std::collections::HashMap;

use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions_indices(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            normals: None,
            uvs: None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex(&self, vid: usize) -> Option<Vec3> {
        self.positions.get(vid).map(|p| Vec3::from(*p))
    }

    pub fn compute_normals(&mut self) -> bool {
        if !self.indices.len().is_multiple_of(3) || self.positions.is_empty() {
            return false;
        }

        let mut accum = vec![Vec3::ZERO; self.positions.len()];

        for tri in self.indices.chunks_exact(3) {
            let Some([p0, p1, p2]) = self.triangle_positions(tri) else {
                continue;
            };
            let normal = (p1 - p0).cross(p2 - p0);
            accum[tri[0] as usize] += normal;
            accum[tri[1] as usize] += normal;
            accum[tri[2] as usize] += normal;
        }

        let normals = accum
            .into_iter()
            .map(|n| {
                let len = n.length();
                if len > 0.0 {
                    (n / len).to_array()
                } else {
                    [0.0, 0.0, 1.0]
                }
            })
            .collect();

        self.normals = Some(normals);
        true
    }

    /// Flat pattern pieces lie in the XY plane and face +Z.
    pub fn set_up_normals(&mut self) {
        self.normals = Some(vec![[0.0, 0.0, 1.0]; self.positions.len()]);
    }

    pub fn planar_uvs(&mut self, scale: f32) {
        self.uvs = Some(
            self.positions
                .iter()
                .map(|p| [p[0] * scale, p[1] * scale])
                .collect(),
        );
    }

    pub fn transform(&mut self, matrix: Mat4) {
        for p in &mut self.positions {
            let v = matrix.transform_point3(Vec3::from(*p));
            *p = v.to_array();
        }

        if let Some(normals) = &mut self.normals {
            let normal_matrix = matrix.inverse().transpose();
            for n in normals {
                let v = normal_matrix.transform_vector3(Vec3::from(*n));
                let len = v.length();
                *n = if len > 0.0 {
                    (v / len).to_array()
                } else {
                    [0.0, 0.0, 1.0]
                };
            }
        }
    }

    pub fn translate(&mut self, offset: Vec3) {
        for p in &mut self.positions {
            *p = (Vec3::from(*p) + offset).to_array();
        }
    }

    /// Moves `pivot` to the local origin.
    pub fn center_vertices(&mut self, pivot: Vec3) {
        self.translate(-pivot);
    }

    /// Area-weighted centroid of the triangles, falling back to the vertex
    /// average for degenerate meshes.
    pub fn area_weighted_centroid(&self) -> Option<Vec3> {
        if self.positions.is_empty() {
            return None;
        }

        let mut weighted = Vec3::ZERO;
        let mut total_area = 0.0;
        for tri in self.indices.chunks_exact(3) {
            let Some([p0, p1, p2]) = self.triangle_positions(tri) else {
                continue;
            };
            let area = 0.5 * (p1 - p0).cross(p2 - p0).length();
            weighted += (p0 + p1 + p2) / 3.0 * area;
            total_area += area;
        }

        if total_area > f32::EPSILON {
            return Some(weighted / total_area);
        }

        let sum: Vec3 = self.positions.iter().map(|p| Vec3::from(*p)).sum();
        Some(sum / self.positions.len() as f32)
    }

    /// Number of edges used by exactly one triangle.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_use_counts()
            .values()
            .filter(|count| **count == 1)
            .count()
    }

    pub fn boundary_vertices(&self) -> Vec<bool> {
        let mut flags = vec![false; self.positions.len()];
        for ((a, b), count) in self.edge_use_counts() {
            if count == 1 {
                flags[a as usize] = true;
                flags[b as usize] = true;
            }
        }
        flags
    }

    /// Welds boundary vertices that belong to different `groups` and sit within
    /// `vertex_tolerance` of each other. Candidates are bucketed on a grid of
    /// `search_tolerance` cells. Degenerate triangles and unused vertices are
    /// removed afterwards. Returns how many vertices were welded away.
    pub fn weld_boundaries(
        &mut self,
        groups: &[u32],
        search_tolerance: f32,
        vertex_tolerance: f32,
    ) -> usize {
        if groups.len() != self.positions.len() || self.positions.is_empty() {
            return 0;
        }

        let boundary = self.boundary_vertices();
        let cell = search_tolerance.max(vertex_tolerance).max(f32::EPSILON);
        let key = |p: Vec3| {
            (
                (p.x / cell).floor() as i32,
                (p.y / cell).floor() as i32,
                (p.z / cell).floor() as i32,
            )
        };

        let mut buckets: HashMap<(i32, i32, i32), Vec<usize>> = HashMap::new();
        let mut remap: Vec<usize> = (0..self.positions.len()).collect();
        let mut welded = 0;
        let tolerance_sq = vertex_tolerance * vertex_tolerance;

        for vid in 0..self.positions.len() {
            if !boundary[vid] {
                continue;
            }
            let p = Vec3::from(self.positions[vid]);
            let (cx, cy, cz) = key(p);

            let mut best: Option<(usize, f32)> = None;
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let Some(candidates) = buckets.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for &other in candidates {
                            if groups[other] == groups[vid] {
                                continue;
                            }
                            let d = p.distance_squared(Vec3::from(self.positions[other]));
                            if d <= tolerance_sq && best.is_none_or(|(_, bd)| d < bd) {
                                best = Some((other, d));
                            }
                        }
                    }
                }
            }

            match best {
                Some((target, _)) => {
                    remap[vid] = target;
                    welded += 1;
                }
                None => buckets.entry((cx, cy, cz)).or_default().push(vid),
            }
        }

        if welded == 0 {
            return 0;
        }

        let mut indices = Vec::with_capacity(self.indices.len());
        for tri in self.indices.chunks_exact(3) {
            let a = remap[tri[0] as usize] as u32;
            let b = remap[tri[1] as usize] as u32;
            let c = remap[tri[2] as usize] as u32;
            if a == b || b == c || a == c {
                continue;
            }
            indices.extend_from_slice(&[a, b, c]);
        }
        self.indices = indices;
        self.compact();
        welded
    }

    /// Drops vertices no triangle references and rewrites indices to match.
    pub fn compact(&mut self) {
        let mut used = vec![false; self.positions.len()];
        for &i in &self.indices {
            if let Some(flag) = used.get_mut(i as usize) {
                *flag = true;
            }
        }

        let mut new_index = vec![u32::MAX; self.positions.len()];
        let mut next = 0u32;
        for (vid, is_used) in used.iter().enumerate() {
            if *is_used {
                new_index[vid] = next;
                next += 1;
            }
        }

        let keep = |values: &[[f32; 3]]| -> Vec<[f32; 3]> {
            values
                .iter()
                .zip(used.iter())
                .filter(|(_, u)| **u)
                .map(|(v, _)| *v)
                .collect()
        };
        self.positions = keep(&self.positions);
        if let Some(normals) = &self.normals {
            self.normals = Some(keep(normals));
        }
        if let Some(uvs) = &self.uvs {
            self.uvs = Some(
                uvs.iter()
                    .zip(used.iter())
                    .filter(|(_, u)| **u)
                    .map(|(v, _)| *v)
                    .collect(),
            );
        }
        for i in &mut self.indices {
            *i = new_index[*i as usize];
        }
    }

    pub fn merge(meshes: &[Mesh]) -> Mesh {
        let mut merged = Mesh::default();
        let mut vertex_offset = 0u32;

        for mesh in meshes {
            merged.positions.extend_from_slice(&mesh.positions);
            merged
                .indices
                .extend(mesh.indices.iter().map(|i| i + vertex_offset));
            vertex_offset += mesh.positions.len() as u32;
        }

        let normals: Option<Vec<Vec<[f32; 3]>>> =
            meshes.iter().map(|mesh| mesh.normals.clone()).collect();
        merged.normals = normals.map(|n| n.concat());

        let uvs: Option<Vec<Vec<[f32; 2]>>> = meshes.iter().map(|mesh| mesh.uvs.clone()).collect();
        merged.uvs = uvs.map(|u| u.concat());

        merged
    }

    fn triangle_positions(&self, tri: &[u32]) -> Option<[Vec3; 3]> {
        Some([
            self.vertex(tri[0] as usize)?,
            self.vertex(tri[1] as usize)?,
            self.vertex(tri[2] as usize)?,
        ])
    }

    fn edge_use_counts(&self) -> HashMap<(u32, u32), usize> {
        let mut counts = HashMap::new();
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let edge = if a < b { (a, b) } else { (b, a) };
                *counts.entry(edge).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(offset_x: f32) -> Mesh {
        Mesh::with_positions_indices(
            vec![
                [offset_x, 0.0, 0.0],
                [offset_x + 1.0, 0.0, 0.0],
                [offset_x + 1.0, 1.0, 0.0],
                [offset_x, 1.0, 0.0],
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn normals_for_ccw_triangle_face_up() {
        let mut mesh = Mesh::with_positions_indices(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        );
        assert!(mesh.compute_normals());
        let normals = mesh.normals.expect("normals");
        for n in normals {
            assert!((n[2] - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn merge_offsets_indices() {
        let merged = Mesh::merge(&[quad(0.0), quad(5.0)]);
        assert_eq!(merged.positions.len(), 8);
        assert_eq!(&merged.indices[6..], &[4, 5, 6, 4, 6, 7]);
        assert!(merged.normals.is_none());
    }

    #[test]
    fn centroid_is_area_weighted() {
        let mesh = quad(2.0);
        let c = mesh.area_weighted_centroid().expect("centroid");
        assert!(c.distance(Vec3::new(2.5, 0.5, 0.0)) < 1.0e-5);
    }

    #[test]
    fn centroid_falls_back_to_average() {
        let mesh = Mesh::with_positions_indices(vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]], vec![]);
        let c = mesh.area_weighted_centroid().expect("centroid");
        assert_eq!(c, Vec3::new(1.0, 0.0, 0.0));
        assert!(Mesh::new().area_weighted_centroid().is_none());
    }

    #[test]
    fn quad_has_four_boundary_edges() {
        assert_eq!(quad(0.0).boundary_edge_count(), 4);
    }

    #[test]
    fn weld_joins_touching_quads() {
        let mut mesh = Mesh::merge(&[quad(0.0), quad(1.0)]);
        let groups = [0, 0, 0, 0, 1, 1, 1, 1];
        let welded = mesh.weld_boundaries(&groups, 5.5, 1.05e-2);
        assert_eq!(welded, 2);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.boundary_edge_count(), 6);
    }

    #[test]
    fn weld_ignores_same_group() {
        let mut mesh = Mesh::merge(&[quad(0.0), quad(1.0)]);
        let groups = [0; 8];
        assert_eq!(mesh.weld_boundaries(&groups, 5.5, 0.1), 0);
        assert_eq!(mesh.vertex_count(), 8);
    }

    #[test]
    fn compact_drops_unused_vertices() {
        let mut mesh = Mesh::with_positions_indices(
            vec![[0.0; 3], [9.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 2, 3],
        );
        mesh.compact();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }
}
