//! Outer ICP loop: correspondence search, inner optimization, transform
//! accumulation and convergence policy.

use nalgebra::{Isometry3, Matrix4, SVector};
use thiserror::Error;

use pcalign_3d::PointCloud;
use pcalign_optim::{CostFunction, GaussNewton, GaussNewtonParams, OptimizerStatus};

use crate::correspondence::find_correspondences;
use crate::index::{KdTreeIndex, SpatialIndex};
use crate::model::IcpModel;

/// Hard failures of [`Registration::align`].
///
/// These are surfaced only while the registration has never completed a
/// successful ICP iteration; afterwards the loop degrades softly and
/// keeps the last valid transform (see [`RegistrationStatus`]).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// The target cloud does not carry one normal per point.
    #[error("target point cloud does not carry one unit normal per point")]
    MissingNormals,

    /// Fewer correspondences than free parameters were accepted.
    #[error("not enough correspondences: found {found}, need at least {required}")]
    InsufficientCorrespondences {
        /// Correspondences accepted by the distance filter.
        found: usize,
        /// Minimum required, equal to the degrees of freedom.
        required: usize,
    },

    /// The normal equations could not be solved on the first iteration.
    #[error("normal equations are singular; the correspondence geometry is degenerate")]
    SingularSystem,
}

/// Terminal state of one [`Registration::align`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// The increment magnitude fell below the transformation epsilon.
    Converged,
    /// The ICP iteration cap was reached; the result is usable.
    MaxIterationsReached,
    /// A later iteration ran out of correspondences; the transform from
    /// the last successful iteration is kept.
    InsufficientCorrespondences,
    /// The inner optimizer failed on a later iteration; the transform
    /// from the last successful iteration is kept.
    SingularSystem,
}

/// Registration configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationParams {
    /// Cap on outer ICP iterations.
    pub max_icp_iterations: usize,
    /// Cap on Gauss-Newton steps per ICP iteration.
    pub max_optimization_iterations: usize,
    /// Hard acceptance bound for nearest-neighbor matches.
    pub max_correspondence_distance: f64,
    /// Outer convergence threshold on the increment magnitude.
    pub transformation_epsilon: f64,
    /// Inner convergence threshold on the Gauss-Newton step norm.
    pub parameter_epsilon: f64,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            max_icp_iterations: 50,
            max_optimization_iterations: 2,
            max_correspondence_distance: 1.0,
            transformation_epsilon: 1e-6,
            parameter_epsilon: 1e-8,
        }
    }
}

/// Summary of one [`Registration::align`] call.
#[derive(Debug, Clone)]
pub struct RegistrationSummary {
    /// Why the loop terminated.
    pub status: RegistrationStatus,
    /// Outer iterations that completed an optimization.
    pub iterations: usize,
    /// Weighted cost at the last inner linearization.
    pub final_cost: f64,
    /// Correspondences accepted in the last search.
    pub num_correspondences: usize,
    /// The accumulated transform as a 4×4 homogeneous matrix.
    pub transformation: Matrix4<f64>,
}

/// Point-to-plane ICP registration for a fixed parameterization.
///
/// Owns the accumulated pose (identity at construction) together with
/// one cost function and one Gauss-Newton optimizer configured for `D`
/// degrees of freedom. The pose persists for the lifetime of the
/// object: calling [`align`](Registration::align) again resumes from
/// the current estimate. One instance serves one alignment at a time.
///
/// The output convention is a column-major homogeneous matrix acting on
/// column vectors, `p_target = T · p_source`.
pub struct Registration<M: IcpModel<D>, const D: usize> {
    params: RegistrationParams,
    optimizer: GaussNewton<D>,
    cost: CostFunction<M, D>,
    transformation: Isometry3<f64>,
    successful_iterations: usize,
}

/// Rigid 6-DOF point-to-plane registration.
pub type Registration6Dof = Registration<crate::model::PointToPlane, 6>;

/// Rotation-only 3-DOF point-to-plane registration.
pub type Registration3Dof = Registration<crate::model::PointToPlaneRotation, 3>;

impl<M: IcpModel<D>, const D: usize> Default for Registration<M, D> {
    fn default() -> Self {
        Self::new(RegistrationParams::default())
    }
}

impl<M: IcpModel<D>, const D: usize> Registration<M, D> {
    /// Create a registration with the given configuration.
    pub fn new(params: RegistrationParams) -> Self {
        let optimizer = GaussNewton::new(GaussNewtonParams {
            max_iterations: params.max_optimization_iterations,
            parameter_tolerance: params.parameter_epsilon,
            ..Default::default()
        });
        Self {
            params,
            optimizer,
            cost: CostFunction::new(M::default()),
            transformation: Isometry3::identity(),
            successful_iterations: 0,
        }
    }

    /// Cap the Gauss-Newton steps per ICP iteration.
    pub fn set_max_optimization_iterations(&mut self, max_iterations: usize) {
        self.params.max_optimization_iterations = max_iterations;
        self.optimizer.set_max_iterations(max_iterations);
    }

    /// Cap the outer ICP iterations.
    pub fn set_max_icp_iterations(&mut self, max_iterations: usize) {
        self.params.max_icp_iterations = max_iterations;
    }

    /// Set the hard acceptance bound for nearest-neighbor matches.
    pub fn set_max_correspondence_distance(&mut self, distance: f64) {
        self.params.max_correspondence_distance = distance;
    }

    /// Mutable access to the cost function, e.g. to install a robust
    /// loss or a covariance plug-in.
    pub fn cost_mut(&mut self) -> &mut CostFunction<M, D> {
        &mut self.cost
    }

    /// The accumulated pose.
    pub fn pose(&self) -> &Isometry3<f64> {
        &self.transformation
    }

    /// The accumulated transform as a homogeneous matrix. Valid at any
    /// point, including after an aborted loop (best available estimate).
    pub fn final_transformation(&self) -> Matrix4<f64> {
        self.transformation.to_homogeneous()
    }

    /// Align `source` onto `target`, building a k-d tree index over the
    /// target internally.
    ///
    /// The target must carry one unit normal per point.
    pub fn align(
        &mut self,
        source: &PointCloud,
        target: &PointCloud,
    ) -> Result<RegistrationSummary, RegistrationError> {
        if target.is_empty() {
            return Err(RegistrationError::InsufficientCorrespondences {
                found: 0,
                required: D,
            });
        }
        let index = KdTreeIndex::build(target);
        self.align_with_index(source, target, &index)
    }

    /// Align `source` onto `target` using a caller-provided spatial
    /// index over the target points.
    pub fn align_with_index(
        &mut self,
        source: &PointCloud,
        target: &PointCloud,
        index: &dyn SpatialIndex,
    ) -> Result<RegistrationSummary, RegistrationError> {
        let normals = match target.normals() {
            Some(normals) if normals.len() == target.len() => normals,
            _ => return Err(RegistrationError::MissingNormals),
        };

        let mut status = RegistrationStatus::MaxIterationsReached;
        let mut iterations = 0;
        let mut final_cost = f64::INFINITY;
        let mut num_correspondences = 0;

        for iteration in 0..self.params.max_icp_iterations {
            let correspondences = find_correspondences(
                source,
                target,
                normals,
                &self.transformation,
                index,
                self.params.max_correspondence_distance,
            );
            num_correspondences = correspondences.len();
            log::debug!(
                "icp iteration {}: {} correspondences",
                iteration,
                num_correspondences
            );

            if num_correspondences < D {
                if self.successful_iterations == 0 {
                    return Err(RegistrationError::InsufficientCorrespondences {
                        found: num_correspondences,
                        required: D,
                    });
                }
                log::warn!(
                    "icp aborted: {} correspondences, need at least {}",
                    num_correspondences,
                    D
                );
                status = RegistrationStatus::InsufficientCorrespondences;
                break;
            }

            self.cost.model_mut().set_correspondences(correspondences);
            let mut x = SVector::<f64, D>::zeros();
            let report = self.optimizer.minimize(&mut self.cost, &mut x);

            match report.status {
                OptimizerStatus::SingularSystem | OptimizerStatus::DivergentStep => {
                    if self.successful_iterations == 0 {
                        return Err(RegistrationError::SingularSystem);
                    }
                    log::warn!("icp aborted: optimizer failed with {:?}", report.status);
                    status = RegistrationStatus::SingularSystem;
                    break;
                }
                OptimizerStatus::Converged | OptimizerStatus::MaxIterationsReached => {}
            }

            final_cost = report.final_cost;
            self.transformation = M::increment(&x) * self.transformation;
            self.successful_iterations += 1;
            iterations = iteration + 1;

            if x.norm() < self.params.transformation_epsilon {
                log::debug!("icp converged after {} iterations", iterations);
                status = RegistrationStatus::Converged;
                break;
            }
        }

        Ok(RegistrationSummary {
            status,
            iterations,
            final_cost,
            num_correspondences,
            transformation: self.transformation.to_homogeneous(),
        })
    }
}
