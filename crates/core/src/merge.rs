use std::collections::{BTreeSet, HashMap};

use glam::Quat;

use crate::mesh::Mesh;
use crate::pattern::{PatternPiece, PieceId, PieceSet};
use crate::sewing::SewingConstraint;

pub const MERGE_SEARCH_TOLERANCE: f32 = 5.5;
pub const MERGE_VERTEX_TOLERANCE: f32 = 1.05;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: Vec<PieceId>,
    pub skipped_components: usize,
    pub retired_seams: usize,
}

/// Undirected piece adjacency from the sewing constraints, ignoring seams
/// that sew a piece to itself.
pub fn adjacency(
    pieces: &[PieceId],
    constraints: &[SewingConstraint],
) -> Vec<BTreeSet<usize>> {
    let index: HashMap<PieceId, usize> = pieces.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut adj = vec![BTreeSet::new(); pieces.len()];
    for constraint in constraints {
        let Some((a, b)) = constraint.pieces() else {
            continue;
        };
        let (Some(&ia), Some(&ib)) = (index.get(&a), index.get(&b)) else {
            continue;
        };
        if ia == ib {
            continue;
        }
        adj[ia].insert(ib);
        adj[ib].insert(ia);
    }
    adj
}

/// Connected components over nodes that have at least one neighbour.
pub fn connected_components(adj: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    let mut visited = vec![false; adj.len()];
    let mut components = Vec::new();

    for start in 0..adj.len() {
        if visited[start] || adj[start].is_empty() {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);
            stack.extend(adj[node].iter().copied().filter(|n| !visited[*n]));
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}

pub fn component_has_external_seams(
    component: &BTreeSet<PieceId>,
    constraints: &[SewingConstraint],
) -> bool {
    constraints
        .iter()
        .filter_map(SewingConstraint::pieces)
        .any(|(a, b)| component.contains(&a) != component.contains(&b))
}

/// Combines the pieces into one world-space mesh and welds coincident
/// boundary vertices between different pieces.
pub fn merge_component(pieces: &[&PatternPiece]) -> Option<Mesh> {
    let meshes: Vec<Mesh> = pieces.iter().map(|p| p.world_mesh()).collect();
    let groups: Vec<u32> = meshes
        .iter()
        .enumerate()
        .flat_map(|(i, mesh)| std::iter::repeat(i as u32).take(mesh.vertex_count()))
        .collect();

    let mut merged = Mesh::merge(&meshes);
    let boundary_before = merged.boundary_edge_count();
    let welded = merged.weld_boundaries(&groups, MERGE_SEARCH_TOLERANCE, MERGE_VERTEX_TOLERANCE);
    if welded > 0 {
        tracing::info!(
            "merge: welded {} vertices, boundary edges {} -> {}",
            welded,
            boundary_before,
            merged.boundary_edge_count()
        );
    } else {
        tracing::warn!("merge: no coincident seam vertices were welded");
    }

    if merged.triangle_count() == 0 {
        return None;
    }
    merged.compute_normals();
    Some(merged)
}

/// Replaces every closed group of sewn pieces by a single merged piece and
/// retires the seams inside each group.
pub fn merge_sewn_groups(pieces: &mut PieceSet, constraints: &mut [SewingConstraint]) -> MergeReport {
    let ids: Vec<PieceId> = pieces.iter().map(|p| p.id).collect();
    let adj = adjacency(&ids, constraints);
    let mut report = MergeReport::default();

    for component in connected_components(&adj) {
        if component.len() < 2 {
            continue;
        }
        let members: BTreeSet<PieceId> = component.iter().map(|i| ids[*i]).collect();
        if component_has_external_seams(&members, constraints) {
            tracing::warn!(
                "merge: skipping component of size {}: has external seams",
                component.len()
            );
            report.skipped_components += 1;
            continue;
        }

        let sources: Vec<&PatternPiece> = members.iter().filter_map(|id| pieces.get(*id)).collect();
        let Some(mut mesh) = merge_component(&sources) else {
            tracing::warn!("merge: merged mesh had no triangles");
            report.skipped_components += 1;
            continue;
        };

        let Some(centroid) = mesh.area_weighted_centroid() else {
            report.skipped_components += 1;
            continue;
        };
        mesh.center_vertices(centroid);

        for id in &members {
            pieces.remove(*id);
        }
        let id = pieces.allocate_id();
        let label = pieces.next_merged_label();
        tracing::info!("merge: {} built from {} pieces", label, members.len());
        pieces.push(PatternPiece {
            id,
            label,
            source_shape: None,
            mesh,
            translation: centroid,
            rotation: Quat::IDENTITY,
            seam_vertex_ids: Vec::new(),
            poly_index_to_vid: Vec::new(),
            boundary_samples_2d: Vec::new(),
            boundary_sample_vids: Vec::new(),
            boundary_sample_world: Vec::new(),
        });
        report.merged.push(id);

        for constraint in constraints.iter_mut() {
            let Some((a, b)) = constraint.pieces() else {
                continue;
            };
            if members.contains(&a) && members.contains(&b) {
                constraint.detach();
                report.retired_seams += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas_state::{CanvasState, ClickTarget, ShapeRef};
    use crate::curve::Curve;
    use crate::sewing::SewingManager;
    use glam::Vec2;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Curve {
        Curve::from_positions(&[
            Vec2::new(x, y),
            Vec2::new(x + w, y),
            Vec2::new(x + w, y + h),
            Vec2::new(x, y + h),
        ])
    }

    fn constraint(a: u64, b: u64) -> SewingConstraint {
        SewingConstraint {
            piece_a: Some(PieceId(a)),
            vertex_a: None,
            piece_b: Some(PieceId(b)),
            vertex_b: None,
            screen_points_a: Vec::new(),
            screen_points_b: Vec::new(),
            stiffness: 1.0,
        }
    }

    #[test]
    fn adjacency_ignores_self_seams() {
        let ids = [PieceId(0), PieceId(1), PieceId(2)];
        let adj = adjacency(&ids, &[constraint(0, 1), constraint(2, 2)]);
        assert_eq!(adj[0], BTreeSet::from([1]));
        assert!(adj[2].is_empty());
    }

    #[test]
    fn components_skip_isolated_nodes() {
        let ids = [PieceId(0), PieceId(1), PieceId(2), PieceId(3), PieceId(4)];
        let adj = adjacency(&ids, &[constraint(0, 1), constraint(1, 2), constraint(3, 4)]);
        let components = connected_components(&adj);
        assert_eq!(components, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn external_seams_are_detected() {
        let members = BTreeSet::from([PieceId(0), PieceId(1)]);
        assert!(component_has_external_seams(&members, &[constraint(1, 5)]));
        assert!(!component_has_external_seams(&members, &[constraint(0, 1)]));
    }

    #[test]
    fn sewn_pair_merges_into_one_piece() {
        let mut state = CanvasState::default();
        state.completed_shapes.push(rect(0.0, 0.0, 40.0, 40.0));
        state.completed_shapes.push(rect(100.0, 0.0, 40.0, 40.0));
        state.completed_shapes.push(rect(300.0, 0.0, 40.0, 40.0));
        let mut pieces = PieceSet::new();
        pieces.generate_all(&state.completed_shapes);

        let mut sewing = SewingManager::new();
        let targets = [
            ClickTarget { shape: ShapeRef::Completed(0), point: 1 },
            ClickTarget { shape: ShapeRef::Completed(0), point: 2 },
            ClickTarget { shape: ShapeRef::Completed(1), point: 0 },
            ClickTarget { shape: ShapeRef::Completed(1), point: 3 },
        ];
        sewing.finalise_seam(&mut state, targets, &pieces).expect("seam");
        sewing.build_and_align_all(&mut pieces);

        let sewn: Vec<&PatternPiece> =
            pieces.iter().filter(|p| p.source_shape != Some(2)).collect();
        let triangles: usize = sewn.iter().map(|p| p.mesh.triangle_count()).sum();
        let vertices: usize = sewn.iter().map(|p| p.mesh.vertex_count()).sum();
        let boundary: usize = sewn.iter().map(|p| p.mesh.boundary_edge_count()).sum();
        let report = merge_sewn_groups(&mut pieces, &mut sewing.constraints);

        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.retired_seams, 1);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.piece_for_shape(2).is_some());
        let merged = pieces.get(report.merged[0]).expect("merged");
        assert_eq!(merged.label, "MergedPatternMesh_0");
        assert!(merged.source_shape.is_none());
        assert!(merged.mesh.triangle_count() <= triangles);
        assert!(merged.mesh.vertex_count() < vertices);
        assert!(merged.mesh.boundary_edge_count() < boundary);
        assert!(merged.mesh.normals.is_some());
        assert!(sewing.constraints[0].pieces().is_none());
    }
}
