//! Gauss-Newton optimizer for small dense least-squares problems.
//!
//! Each step builds the normal equations `H·Δx = −b` with `H ≈ JᵀJ` and
//! solves them with a dense Cholesky factorization of the D×D system.
//! A system that is not positive definite is reported as a terminal
//! status, never raised as a panic.

use nalgebra::{SMatrix, SVector};
use thiserror::Error;

use crate::cost::CostFunction;
use crate::model::Model;

/// Failure of a single Gauss-Newton step. The parameter vector is left
/// untouched when a step fails.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum StepError {
    /// The normal equations are singular or not positive definite.
    #[error("normal equations are singular or not positive definite")]
    SingularSystem,

    /// The solved increment exceeds the divergence bound.
    #[error("step norm {norm:.3e} exceeds divergence bound {bound:.3e}")]
    DivergentStep {
        /// Norm of the offending increment.
        norm: f64,
        /// Configured sanity bound.
        bound: f64,
    },
}

/// Terminal state of a [`GaussNewton::minimize`] run.
///
/// Every variant is a normal, reportable outcome the caller branches on;
/// reaching the iteration cap still leaves a usable parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerStatus {
    /// The last increment fell below the parameter tolerance.
    Converged,
    /// The iteration cap was reached before convergence.
    MaxIterationsReached,
    /// The normal-equation solve failed.
    SingularSystem,
    /// An increment exceeded the divergence bound.
    DivergentStep,
}

/// Result of one accepted Gauss-Newton step.
#[derive(Debug, Clone, Copy)]
pub struct Step<const D: usize> {
    /// The solved increment, already composed onto the parameter vector.
    pub delta: SVector<f64, D>,
    /// Weighted cost at the linearization point (before the update).
    pub cost: f64,
}

/// Summary of a [`GaussNewton::minimize`] run.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerReport {
    /// Why the run terminated.
    pub status: OptimizerStatus,
    /// Number of steps performed.
    pub iterations: usize,
    /// Weighted cost at the last linearization point.
    pub final_cost: f64,
}

/// Gauss-Newton configuration.
#[derive(Debug, Clone, Copy)]
pub struct GaussNewtonParams {
    /// Maximum number of steps per [`GaussNewton::minimize`] call.
    pub max_iterations: usize,
    /// Convergence threshold on the increment norm.
    pub parameter_tolerance: f64,
    /// Sanity bound on the increment norm; larger steps are rejected.
    pub divergence_bound: f64,
}

impl Default for GaussNewtonParams {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            parameter_tolerance: 1e-8,
            divergence_bound: 1e4,
        }
    }
}

/// Gauss-Newton optimizer for a fixed parameter dimension `D`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussNewton<const D: usize> {
    params: GaussNewtonParams,
}

impl<const D: usize> GaussNewton<D> {
    /// Create an optimizer with the given configuration.
    pub fn new(params: GaussNewtonParams) -> Self {
        Self { params }
    }

    /// Current configuration.
    pub fn params(&self) -> &GaussNewtonParams {
        &self.params
    }

    /// Cap the number of steps per minimize call.
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.params.max_iterations = max_iterations;
    }

    /// True when the increment norm is below the parameter tolerance.
    pub fn has_converged(&self, delta: &SVector<f64, D>) -> bool {
        delta.norm() < self.params.parameter_tolerance
    }

    /// Perform one Gauss-Newton step: linearize, solve `H·Δx = −b`, and
    /// compose the increment onto `x`.
    ///
    /// On failure `x` is left unmodified.
    pub fn step<M: Model<D>>(
        &self,
        cost: &mut CostFunction<M, D>,
        x: &mut SVector<f64, D>,
    ) -> Result<Step<D>, StepError> {
        let mut hessian = SMatrix::<f64, D, D>::zeros();
        let mut b = SVector::<f64, D>::zeros();

        cost.init(&mut hessian, &mut b);
        let total_cost = cost.linearize(x, &mut hessian, &mut b);

        let chol = hessian.cholesky().ok_or(StepError::SingularSystem)?;
        let delta = chol.solve(&(-b));

        let norm = delta.norm();
        if !norm.is_finite() || norm > self.params.divergence_bound {
            return Err(StepError::DivergentStep {
                norm,
                bound: self.params.divergence_bound,
            });
        }

        *x = cost.model().plus(x, &delta);
        log::debug!("gauss-newton step: cost {:.6e}, |dx| {:.3e}", total_cost, norm);

        Ok(Step {
            delta,
            cost: total_cost,
        })
    }

    /// Run [`step`](GaussNewton::step) until convergence or the iteration
    /// cap, whichever comes first.
    ///
    /// `x` always holds the last computed parameters on return, including
    /// when the cap is reached; with `max_iterations == 0` the input is
    /// returned unchanged.
    pub fn minimize<M: Model<D>>(
        &self,
        cost: &mut CostFunction<M, D>,
        x: &mut SVector<f64, D>,
    ) -> OptimizerReport {
        if self.params.max_iterations == 0 {
            return OptimizerReport {
                status: OptimizerStatus::MaxIterationsReached,
                iterations: 0,
                final_cost: cost.compute_cost(x),
            };
        }

        let mut final_cost = f64::INFINITY;
        for iteration in 0..self.params.max_iterations {
            match self.step(cost, x) {
                Ok(step) => {
                    final_cost = step.cost;
                    if self.has_converged(&step.delta) {
                        return OptimizerReport {
                            status: OptimizerStatus::Converged,
                            iterations: iteration + 1,
                            final_cost,
                        };
                    }
                }
                Err(err) => {
                    log::warn!("gauss-newton aborted at iteration {}: {}", iteration, err);
                    let status = match err {
                        StepError::SingularSystem => OptimizerStatus::SingularSystem,
                        StepError::DivergentStep { .. } => OptimizerStatus::DivergentStep,
                    };
                    return OptimizerReport {
                        status,
                        iterations: iteration,
                        final_cost,
                    };
                }
            }
        }

        OptimizerReport {
            status: OptimizerStatus::MaxIterationsReached,
            iterations: self.params.max_iterations,
            final_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{SVector, Vector2};

    /// r_i = a_i · x - y_i with Euclidean parameters.
    struct LinearModel {
        a: Vec<Vector2<f64>>,
        y: Vec<f64>,
        x: Vector2<f64>,
    }

    impl LinearModel {
        fn new(a: Vec<Vector2<f64>>, y: Vec<f64>) -> Self {
            Self {
                a,
                y,
                x: Vector2::zeros(),
            }
        }
    }

    impl Model<2> for LinearModel {
        fn apply(&mut self, x: &SVector<f64, 2>) {
            self.x = *x;
        }

        fn num_residuals(&self) -> usize {
            self.a.len()
        }

        fn residual_jacobian(&self, index: usize) -> (f64, SVector<f64, 2>) {
            (self.a[index].dot(&self.x) - self.y[index], self.a[index])
        }
    }

    fn well_posed_cost() -> CostFunction<LinearModel, 2> {
        // Solution of the least-squares problem is exactly x = (1, 2).
        let model = LinearModel::new(
            vec![
                Vector2::new(1.0, 0.0),
                Vector2::new(0.0, 1.0),
                Vector2::new(1.0, 1.0),
            ],
            vec![1.0, 2.0, 3.0],
        );
        CostFunction::new(model)
    }

    #[test]
    fn test_linear_problem_converges() {
        let mut cost = well_posed_cost();
        let optimizer = GaussNewton::<2>::new(GaussNewtonParams::default());

        let mut x = Vector2::zeros();
        let report = optimizer.minimize(&mut cost, &mut x);

        assert_eq!(report.status, OptimizerStatus::Converged);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-9);
        // A linear problem is solved by the first step; the second only
        // confirms convergence.
        assert!(report.iterations <= 2);
    }

    #[test]
    fn test_step_costs_non_increasing() {
        let mut cost = well_posed_cost();
        let optimizer = GaussNewton::<2>::new(GaussNewtonParams::default());

        let mut x = Vector2::new(-3.0, 4.0);
        let mut costs = Vec::new();
        for _ in 0..4 {
            let step = optimizer.step(&mut cost, &mut x).unwrap();
            costs.push(step.cost);
        }
        for pair in costs.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn test_singular_system_reported_without_update() {
        // Both residuals constrain the same direction; H is rank one.
        let model = LinearModel::new(
            vec![Vector2::new(1.0, 0.0), Vector2::new(2.0, 0.0)],
            vec![1.0, 2.0],
        );
        let mut cost = CostFunction::new(model);
        let optimizer = GaussNewton::<2>::new(GaussNewtonParams::default());

        let mut x = Vector2::new(0.5, -0.5);
        let err = optimizer.step(&mut cost, &mut x).unwrap_err();
        assert_eq!(err, StepError::SingularSystem);
        assert_eq!(x, Vector2::new(0.5, -0.5));

        let report = optimizer.minimize(&mut cost, &mut x);
        assert_eq!(report.status, OptimizerStatus::SingularSystem);
        assert_eq!(x, Vector2::new(0.5, -0.5));
    }

    #[test]
    fn test_empty_problem_is_singular() {
        let model = LinearModel::new(vec![], vec![]);
        let mut cost = CostFunction::new(model);
        let optimizer = GaussNewton::<2>::new(GaussNewtonParams::default());

        let mut x = Vector2::zeros();
        let report = optimizer.minimize(&mut cost, &mut x);
        assert_eq!(report.status, OptimizerStatus::SingularSystem);
    }

    #[test]
    fn test_zero_max_iterations_returns_input() {
        let mut cost = well_posed_cost();
        let optimizer = GaussNewton::<2>::new(GaussNewtonParams {
            max_iterations: 0,
            ..Default::default()
        });

        let mut x = Vector2::new(0.25, -0.75);
        let report = optimizer.minimize(&mut cost, &mut x);

        assert_eq!(report.status, OptimizerStatus::MaxIterationsReached);
        assert_eq!(report.iterations, 0);
        assert_eq!(x, Vector2::new(0.25, -0.75));
    }

    #[test]
    fn test_divergence_bound_rejects_step() {
        let mut cost = well_posed_cost();
        let optimizer = GaussNewton::<2>::new(GaussNewtonParams {
            divergence_bound: 1e-6,
            ..Default::default()
        });

        let mut x = Vector2::zeros();
        let err = optimizer.step(&mut cost, &mut x).unwrap_err();
        assert!(matches!(err, StepError::DivergentStep { .. }));
        assert_eq!(x, Vector2::zeros());

        let report = optimizer.minimize(&mut cost, &mut x);
        assert_eq!(report.status, OptimizerStatus::DivergentStep);
    }
}
