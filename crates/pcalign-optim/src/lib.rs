#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Residual/Jacobian generator trait.
pub mod model;

/// Robust loss plug-ins.
pub mod loss;

/// Measurement-uncertainty weighting plug-ins.
pub mod covariance;

/// Cost function composing a model with loss and covariance weights.
pub mod cost;

/// Gauss-Newton optimizer over the normal equations.
pub mod gauss_newton;

pub use cost::CostFunction;
pub use covariance::{Covariance, DiagonalCovariance, IdentityCovariance};
pub use gauss_newton::{
    GaussNewton, GaussNewtonParams, OptimizerReport, OptimizerStatus, Step, StepError,
};
pub use loss::{HuberLoss, IdentityLoss, LossFunction};
pub use model::Model;
