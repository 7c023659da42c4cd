use nalgebra::{Isometry3, Point3, Vector3};

use pcalign_3d::PointCloud;

use crate::index::SpatialIndex;

/// One accepted source/target pairing for a single ICP iteration.
#[derive(Debug, Clone)]
pub struct Correspondence {
    /// Index of the point in the source cloud.
    pub source_index: usize,
    /// Source point under the accumulated registration pose.
    pub source: Point3<f64>,
    /// Matched target point.
    pub target: Point3<f64>,
    /// Unit normal of the target surface at the matched point.
    pub normal: Vector3<f64>,
    /// Euclidean nearest-neighbor distance at match time.
    pub distance: f64,
}

/// Pair every source point (transformed by `pose`) with its nearest
/// target point within `max_distance`.
///
/// Points with no neighbor inside the bound contribute no correspondence;
/// this is a hard filter, not a down-weighting. `normals` must hold one
/// unit normal per target point.
pub fn find_correspondences(
    source: &PointCloud,
    target: &PointCloud,
    normals: &[[f64; 3]],
    pose: &Isometry3<f64>,
    index: &dyn SpatialIndex,
    max_distance: f64,
) -> Vec<Correspondence> {
    let mut correspondences = Vec::with_capacity(source.len());

    for (source_index, point) in source.points().iter().enumerate() {
        let transformed = pose.transform_point(&Point3::from(*point));
        let query = [transformed.x, transformed.y, transformed.z];
        if let Some((target_index, distance)) = index.query_nearest(&query, max_distance) {
            correspondences.push(Correspondence {
                source_index,
                source: transformed,
                target: Point3::from(target.points()[target_index]),
                normal: Vector3::from(normals[target_index]),
                distance,
            });
        }
    }

    correspondences
}
