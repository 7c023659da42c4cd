use nalgebra::{Matrix3, Vector3};

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix in row-major layout.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated buffer for the transformed points.
///
/// PRECONDITION: `dst_points` has the same length as `src_points`.
///
/// Example:
///
/// ```
/// use pcalign_3d::linalg::transform_points3d;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points3d(&src_points, &rotation, &translation, &mut dst_points);
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points3d(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    assert_eq!(src_points.len(), dst_points.len());

    let rotation = Matrix3::from_fn(|i, j| dst_r_src[i][j]);
    let translation = Vector3::from(*dst_t_src);

    for (src, dst) in src_points.iter().zip(dst_points.iter_mut()) {
        let p = rotation * Vector3::from(*src) + translation;
        *dst = [p.x, p.y, p.z];
    }
}
