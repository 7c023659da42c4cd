use nalgebra::{Rotation3, Unit, Vector3};

/// Compute the rotation matrix from an axis and angle.
///
/// The axis does not need to be normalized; a zero axis is rejected.
///
/// Example:
///
/// ```
/// use pcalign_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] - (-1.0)).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    let v = Vector3::from(*axis);
    if v.norm() < 1e-10 {
        return Err("cannot compute rotation matrix from a zero vector");
    }

    let rotation = Rotation3::from_axis_angle(&Unit::new_normalize(v), angle);
    let m = rotation.matrix();

    Ok([
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ])
}
