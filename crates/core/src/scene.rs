use std::io::{self, Write};

use crate::mesh::Mesh;
use crate::pattern::{PatternPiece, PieceId, PieceSet};

#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl SceneMesh {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let normals = match &mesh.normals {
            Some(normals) => normals.clone(),
            None => {
                let mut temp = mesh.clone();
                temp.compute_normals();
                temp.normals
                    .unwrap_or_else(|| vec![[0.0, 0.0, 1.0]; mesh.positions.len()])
            }
        };
        let uvs = mesh
            .uvs
            .clone()
            .unwrap_or_else(|| vec![[0.0, 0.0]; mesh.positions.len()]);

        Self {
            positions: mesh.positions.clone(),
            normals,
            uvs,
            indices: mesh.indices.clone(),
        }
    }
}

/// Where one piece lives inside the combined scene buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRange {
    pub piece: PieceId,
    pub label: String,
    pub first_vertex: usize,
    pub vertex_count: usize,
    pub first_index: usize,
    pub index_count: usize,
}

#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub mesh: SceneMesh,
    pub ranges: Vec<SceneRange>,
}

impl SceneSnapshot {
    /// All pieces in world space, merged into one buffer set.
    pub fn from_pieces(pieces: &PieceSet) -> Self {
        let meshes: Vec<Mesh> = pieces.iter().map(PatternPiece::world_mesh).collect();
        let mut ranges = Vec::with_capacity(meshes.len());
        let mut first_vertex = 0;
        let mut first_index = 0;
        for (piece, mesh) in pieces.iter().zip(meshes.iter()) {
            ranges.push(SceneRange {
                piece: piece.id,
                label: piece.label.clone(),
                first_vertex,
                vertex_count: mesh.vertex_count(),
                first_index,
                index_count: mesh.indices.len(),
            });
            first_vertex += mesh.vertex_count();
            first_index += mesh.indices.len();
        }

        Self {
            mesh: SceneMesh::from_mesh(&Mesh::merge(&meshes)),
            ranges,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.indices.len() / 3
    }
}

/// Writes every piece as its own Wavefront OBJ object in world space.
pub fn write_obj<W: Write>(writer: &mut W, pieces: &PieceSet) -> io::Result<()> {
    writeln!(writer, "# clothdesign pattern export")?;
    let mut base = 1usize;
    for piece in pieces.iter() {
        let scene = SceneMesh::from_mesh(&piece.world_mesh());
        writeln!(writer, "o {}", piece.label)?;
        for p in &scene.positions {
            writeln!(writer, "v {} {} {}", p[0], p[1], p[2])?;
        }
        for uv in &scene.uvs {
            writeln!(writer, "vt {} {}", uv[0], uv[1])?;
        }
        for n in &scene.normals {
            writeln!(writer, "vn {} {} {}", n[0], n[1], n[2])?;
        }
        for tri in scene.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize + base);
            writeln!(writer, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        }
        base += scene.positions.len();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use glam::Vec2;

    fn pieces() -> PieceSet {
        let mut set = PieceSet::new();
        set.generate_all(&[
            Curve::from_positions(&[
                Vec2::new(0.0, 0.0),
                Vec2::new(20.0, 0.0),
                Vec2::new(20.0, 20.0),
                Vec2::new(0.0, 20.0),
            ]),
            Curve::from_positions(&[
                Vec2::new(50.0, 0.0),
                Vec2::new(70.0, 0.0),
                Vec2::new(60.0, 20.0),
            ]),
        ]);
        set
    }

    #[test]
    fn snapshot_ranges_cover_buffers() {
        let set = pieces();
        let snapshot = SceneSnapshot::from_pieces(&set);
        assert_eq!(snapshot.ranges.len(), 2);
        let last = &snapshot.ranges[1];
        assert_eq!(last.first_vertex + last.vertex_count, snapshot.mesh.positions.len());
        assert_eq!(last.first_index + last.index_count, snapshot.mesh.indices.len());
        assert_eq!(snapshot.mesh.normals.len(), snapshot.mesh.positions.len());
    }

    #[test]
    fn obj_export_reads_back() {
        let set = pieces();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pattern.obj");
        let mut file = std::fs::File::create(&path).expect("create");
        write_obj(&mut file, &set).expect("write");
        drop(file);

        let (models, _) = tobj::load_obj(
            &path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .expect("load obj");
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "ClothMeshActor_0");

        let expected: usize = set.iter().map(|p| p.mesh.triangle_count()).sum();
        let loaded: usize = models.iter().map(|m| m.mesh.indices.len() / 3).sum();
        assert_eq!(loaded, expected);

        let xs: Vec<f32> = models[1].mesh.positions.chunks_exact(3).map(|p| p[0]).collect();
        assert!(xs.iter().all(|x| (49.0..=71.0).contains(x)));
    }
}
