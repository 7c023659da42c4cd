use kiddo::immutable::float::kdtree::ImmutableKdTree;

use pcalign_3d::PointCloud;

/// Nearest-neighbor query contract of the spatial index.
///
/// The registration loop only consumes this interface; any structure
/// able to answer bounded nearest-neighbor queries over the target
/// cloud can stand in for the provided k-d tree.
pub trait SpatialIndex {
    /// Index of the nearest target point within `max_distance` of
    /// `point`, together with its Euclidean distance; `None` when no
    /// point lies inside the bound.
    fn query_nearest(&self, point: &[f64; 3], max_distance: f64) -> Option<(usize, f64)>;
}

/// Spatial index over a target point cloud backed by a k-d tree.
pub struct KdTreeIndex {
    tree: ImmutableKdTree<f64, u32, 3, 32>,
}

impl KdTreeIndex {
    /// Build the index over the points of `cloud`.
    ///
    /// PRECONDITION: `cloud` is not empty.
    pub fn build(cloud: &PointCloud) -> Self {
        Self {
            tree: ImmutableKdTree::new_from_slice(cloud.points()),
        }
    }
}

impl SpatialIndex for KdTreeIndex {
    fn query_nearest(&self, point: &[f64; 3], max_distance: f64) -> Option<(usize, f64)> {
        let nearest = self.tree.nearest_one::<kiddo::SquaredEuclidean>(point);
        let distance = nearest.distance.sqrt();
        (distance <= max_distance).then_some((nearest.item as usize, distance))
    }
}
