use glam::Vec2;
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, Point2, Triangulation};

use crate::curve::{bounds_2d, Curve};
use crate::error::TriangulationError;
use crate::mesh::Mesh;

pub const SAMPLES_PER_SEGMENT: usize = 10;
pub const INTERIOR_GRID_RESOLUTION: usize = 20;

/// Output of triangulating one outline, still in canvas coordinates.
#[derive(Debug, Clone, Default)]
pub struct ShapeTriangulation {
    pub mesh: Mesh,
    /// Mesh vertex for each outline key.
    pub poly_index_to_vid: Vec<Option<usize>>,
    pub boundary_samples: Vec<Vec2>,
    pub boundary_vids: Vec<Option<usize>>,
    pub seam_vids: Vec<usize>,
}

/// Even-odd crossing test.
pub fn point_in_polygon(p: Vec2, poly: &[Vec2]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = poly[i];
        let b = poly[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Samples the outline and returns the sample indices covered by the
/// optional `(start, end)` key range.
///
/// Curve segments are sampled along the Hermite curve. The closing edge from
/// the last key back to the first is a straight chord and is sampled linearly,
/// so every key, the last one included, lands on a sample.
pub fn sample_shape(curve: &Curve, seam_range: Option<(usize, usize)>) -> (Vec<Vec2>, Vec<usize>) {
    let mut samples = curve.sample_segments(SAMPLES_PER_SEGMENT);
    if let (Some(first), Some(last)) = (curve.points.first(), curve.points.last()) {
        if curve.len() >= 2 {
            for s in 0..SAMPLES_PER_SEGMENT {
                let alpha = s as f32 / SAMPLES_PER_SEGMENT as f32;
                samples.push(last.position.lerp(first.position, alpha));
            }
        }
    }
    let seam = match seam_range {
        Some((start, end)) => {
            let lo = start.min(end) * SAMPLES_PER_SEGMENT;
            let hi = start.max(end) * SAMPLES_PER_SEGMENT;
            (0..samples.len()).filter(|k| *k >= lo && *k <= hi).collect()
        }
        None => Vec::new(),
    };
    (samples, seam)
}

/// Cell centres of a regular grid over the outline bounds that fall inside it.
pub fn interior_grid_points(boundary: &[Vec2]) -> Vec<Vec2> {
    let Some((min, max)) = bounds_2d(boundary.iter().copied()) else {
        return Vec::new();
    };
    let step = (max - min) / INTERIOR_GRID_RESOLUTION as f32;
    let mut points = Vec::new();
    for gy in 0..INTERIOR_GRID_RESOLUTION {
        for gx in 0..INTERIOR_GRID_RESOLUTION {
            let p = min + Vec2::new((gx as f32 + 0.5) * step.x, (gy as f32 + 0.5) * step.y);
            if point_in_polygon(p, boundary) {
                points.push(p);
            }
        }
    }
    points
}

/// Closed loop edges over the first `count` boundary samples.
pub fn boundary_edges(count: usize) -> Vec<(usize, usize)> {
    (0..count).map(|i| (i, (i + 1) % count)).collect()
}

pub fn triangulate_shape(
    curve: &Curve,
    seam_range: Option<(usize, usize)>,
) -> Result<ShapeTriangulation, TriangulationError> {
    if curve.len() < 3 {
        return Err(TriangulationError::TooFewPoints(curve.len()));
    }

    let (boundary, seam_samples) = sample_shape(curve, seam_range);
    let interior = interior_grid_points(&boundary);

    let mut cdt = ConstrainedDelaunayTriangulation::<Point2<f64>>::new();
    let mut handles = Vec::with_capacity(boundary.len() + interior.len());
    for p in boundary.iter().chain(interior.iter()) {
        let handle = cdt
            .insert(Point2::new(p.x as f64, p.y as f64))
            .map_err(|_| TriangulationError::InvalidVertex { x: p.x, y: p.y })?;
        handles.push(handle);
    }

    let mut skipped = 0;
    for (a, b) in boundary_edges(boundary.len()) {
        let (ha, hb) = (handles[a], handles[b]);
        if ha == hb {
            continue;
        }
        if cdt.can_add_constraint(ha, hb) {
            cdt.add_constraint(ha, hb);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        tracing::warn!("triangulation: skipped {} crossing outline edges", skipped);
    }

    let mut positions = vec![[0.0f32; 3]; cdt.num_vertices()];
    for vertex in cdt.vertices() {
        let p = vertex.position();
        positions[vertex.fix().index()] = [p.x as f32, p.y as f32, 0.0];
    }

    let mut indices = Vec::new();
    for face in cdt.inner_faces() {
        let verts = face.vertices();
        let corners = verts.map(|v| {
            let p = v.position();
            Vec2::new(p.x as f32, p.y as f32)
        });
        let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
        if !point_in_polygon(centroid, &boundary) {
            continue;
        }
        indices.extend(verts.iter().map(|v| v.fix().index() as u32));
    }

    if indices.is_empty() {
        return Err(TriangulationError::Empty);
    }

    let vid = |h: &FixedVertexHandle| Some(h.index());
    let boundary_vids: Vec<Option<usize>> = handles[..boundary.len()].iter().map(vid).collect();
    let poly_index_to_vid = curve
        .points
        .iter()
        .map(|point| nearest_sample(&boundary, point.position).and_then(|k| boundary_vids[k]))
        .collect();
    let seam_vids = seam_samples
        .iter()
        .filter_map(|k| boundary_vids[*k])
        .collect();

    tracing::debug!(
        "triangulation: {} vertices, {} triangles",
        positions.len(),
        indices.len() / 3
    );

    Ok(ShapeTriangulation {
        mesh: Mesh::with_positions_indices(positions, indices),
        poly_index_to_vid,
        boundary_samples: boundary,
        boundary_vids,
        seam_vids,
    })
}

pub(crate) fn nearest_sample(samples: &[Vec2], target: Vec2) -> Option<usize> {
    samples
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.distance_squared(target)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Curve {
        Curve::from_positions(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(size, 0.0),
            Vec2::new(size, size),
            Vec2::new(0.0, size),
        ])
    }

    #[test]
    fn point_in_polygon_square() {
        let poly = [Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0), Vec2::new(0.0, 10.0)];
        assert!(point_in_polygon(Vec2::new(5.0, 5.0), &poly));
        assert!(!point_in_polygon(Vec2::new(15.0, 5.0), &poly));
        assert!(!point_in_polygon(Vec2::new(5.0, 5.0), &poly[..2]));
    }

    #[test]
    fn boundary_edges_close_the_loop() {
        assert_eq!(boundary_edges(3), vec![(0, 1), (1, 2), (2, 0)]);
    }

    #[test]
    fn seam_range_selects_sample_indices() {
        let (samples, seam) = sample_shape(&square(10.0), Some((2, 1)));
        assert_eq!(samples.len(), 40);
        assert!(samples[30].distance(Vec2::new(0.0, 10.0)) < 1.0e-5);
        assert_eq!(seam.first(), Some(&10));
        assert_eq!(seam.last(), Some(&20));
        assert_eq!(seam.len(), 11);
    }

    #[test]
    fn interior_points_stay_inside() {
        let (samples, _) = sample_shape(&square(100.0), None);
        let interior = interior_grid_points(&samples);
        assert!(!interior.is_empty());
        assert!(interior.iter().all(|p| point_in_polygon(*p, &samples)));
    }

    #[test]
    fn too_few_points_is_an_error() {
        let curve = Curve::from_positions(&[Vec2::ZERO, Vec2::X]);
        assert!(matches!(
            triangulate_shape(&curve, None),
            Err(TriangulationError::TooFewPoints(2))
        ));
    }

    #[test]
    fn square_triangulates_with_ccw_faces() {
        let tri = triangulate_shape(&square(100.0), None).expect("triangulation");
        assert!(tri.mesh.triangle_count() > 0);
        assert_eq!(tri.boundary_samples.len(), 40);
        assert_eq!(tri.poly_index_to_vid.len(), 4);
        assert!(tri.poly_index_to_vid.iter().all(Option::is_some));

        for t in tri.mesh.indices.chunks_exact(3) {
            let p: Vec<Vec2> = t
                .iter()
                .map(|i| {
                    let v = tri.mesh.positions[*i as usize];
                    Vec2::new(v[0], v[1])
                })
                .collect();
            let cross = (p[1] - p[0]).perp_dot(p[2] - p[0]);
            assert!(cross > 0.0);
        }
    }

    #[test]
    fn triangulated_area_matches_outline() {
        let tri = triangulate_shape(&square(100.0), None).expect("triangulation");
        let area: f32 = tri
            .mesh
            .indices
            .chunks_exact(3)
            .map(|t| {
                let p: Vec<Vec2> = t
                    .iter()
                    .map(|i| {
                        let v = tri.mesh.positions[*i as usize];
                        Vec2::new(v[0], v[1])
                    })
                    .collect();
                0.5 * (p[1] - p[0]).perp_dot(p[2] - p[0])
            })
            .sum();
        assert!((area - 10_000.0).abs() < 1.0);
    }
}
