//! Point-to-plane residual models for the two supported parameterizations.
//!
//! The parameter vector is an incremental transform in the tangent space,
//! linearized about the identity: `[tx ty tz | wx wy wz]` for the rigid
//! 6-DOF model, `[wx wy wz]` for the rotation-only 3-DOF model. The
//! rotation block is an axis-angle (so(3)) vector mapped through the
//! quaternion exponential; increments compose multiplicatively, never by
//! angle addition.

use nalgebra::{Isometry3, SVector, Translation3, UnitQuaternion, Vector3, Vector6};

use pcalign_optim::Model;

use crate::correspondence::Correspondence;

/// Extension of [`Model`] for rigid registration: the model linearizes a
/// set of correspondences and knows how to turn a parameter vector into
/// a rigid increment.
pub trait IcpModel<const D: usize>: Model<D> + Default {
    /// Replace the correspondence set to linearize against.
    fn set_correspondences(&mut self, correspondences: Vec<Correspondence>);

    /// Rigid increment corresponding to a parameter vector.
    fn increment(x: &SVector<f64, D>) -> Isometry3<f64>;
}

/// Rigid 6-DOF point-to-plane model.
///
/// Residual: `(R·p + t − q) · n` with the tentative increment `(R, t)`
/// cached by [`Model::apply`]. Jacobian row: `[nᵀ | (p′ × n)ᵀ]` where
/// `p′` is the source point under the cached increment.
#[derive(Debug, Clone)]
pub struct PointToPlane {
    correspondences: Vec<Correspondence>,
    increment: Isometry3<f64>,
}

impl Default for PointToPlane {
    fn default() -> Self {
        Self {
            correspondences: Vec::new(),
            increment: Isometry3::identity(),
        }
    }
}

impl Model<6> for PointToPlane {
    fn apply(&mut self, x: &SVector<f64, 6>) {
        self.increment = <Self as IcpModel<6>>::increment(x);
    }

    fn num_residuals(&self) -> usize {
        self.correspondences.len()
    }

    fn residual_jacobian(&self, index: usize) -> (f64, SVector<f64, 6>) {
        let c = &self.correspondences[index];
        let p = self.increment.transform_point(&c.source);
        let residual = (p - c.target).dot(&c.normal);
        let rotational = p.coords.cross(&c.normal);
        (
            residual,
            Vector6::new(
                c.normal.x,
                c.normal.y,
                c.normal.z,
                rotational.x,
                rotational.y,
                rotational.z,
            ),
        )
    }

    fn plus(&self, x: &SVector<f64, 6>, delta: &SVector<f64, 6>) -> SVector<f64, 6> {
        let composed = <Self as IcpModel<6>>::increment(delta) * <Self as IcpModel<6>>::increment(x);
        let t = composed.translation.vector;
        let w = composed.rotation.scaled_axis();
        Vector6::new(t.x, t.y, t.z, w.x, w.y, w.z)
    }
}

impl IcpModel<6> for PointToPlane {
    fn set_correspondences(&mut self, correspondences: Vec<Correspondence>) {
        self.correspondences = correspondences;
    }

    fn increment(x: &SVector<f64, 6>) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(x[0], x[1], x[2]),
            UnitQuaternion::from_scaled_axis(Vector3::new(x[3], x[4], x[5])),
        )
    }
}

/// Rotation-only 3-DOF point-to-plane model.
///
/// Same residual as [`PointToPlane`] with the translation pinned to
/// zero; the Jacobian row keeps only the rotational block `(p′ × n)ᵀ`.
#[derive(Debug, Clone)]
pub struct PointToPlaneRotation {
    correspondences: Vec<Correspondence>,
    increment: Isometry3<f64>,
}

impl Default for PointToPlaneRotation {
    fn default() -> Self {
        Self {
            correspondences: Vec::new(),
            increment: Isometry3::identity(),
        }
    }
}

impl Model<3> for PointToPlaneRotation {
    fn apply(&mut self, x: &SVector<f64, 3>) {
        self.increment = <Self as IcpModel<3>>::increment(x);
    }

    fn num_residuals(&self) -> usize {
        self.correspondences.len()
    }

    fn residual_jacobian(&self, index: usize) -> (f64, SVector<f64, 3>) {
        let c = &self.correspondences[index];
        let p = self.increment.transform_point(&c.source);
        let residual = (p - c.target).dot(&c.normal);
        (residual, p.coords.cross(&c.normal))
    }

    fn plus(&self, x: &SVector<f64, 3>, delta: &SVector<f64, 3>) -> SVector<f64, 3> {
        let composed =
            UnitQuaternion::from_scaled_axis(*delta) * UnitQuaternion::from_scaled_axis(*x);
        composed.scaled_axis()
    }
}

impl IcpModel<3> for PointToPlaneRotation {
    fn set_correspondences(&mut self, correspondences: Vec<Correspondence>) {
        self.correspondences = correspondences;
    }

    fn increment(x: &SVector<f64, 3>) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_scaled_axis(*x),
        )
    }
}
