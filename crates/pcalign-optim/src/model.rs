use nalgebra::SVector;

/// Residual and Jacobian generator for a least-squares problem with `D`
/// free parameters.
///
/// A model owns whatever problem data it needs (point pairs, measurements)
/// and exposes its residuals by index, so [`CostFunction`](crate::CostFunction)
/// and [`GaussNewton`](crate::GaussNewton) stay independent of any concrete
/// data representation. `D` is fixed at compile time; the parameter vector is
/// an *increment* in the tangent space of the estimated quantity.
///
/// [`apply`](Model::apply) must be called whenever the parameter vector
/// changes, before [`residual_jacobian`](Model::residual_jacobian) is queried.
pub trait Model<const D: usize>: Send + Sync {
    /// Refresh internal state (e.g. a cached transform) for the increment `x`.
    fn apply(&mut self, x: &SVector<f64, D>);

    /// Number of residuals in the current problem.
    fn num_residuals(&self) -> usize;

    /// Residual and Jacobian row of residual `index`, evaluated at the
    /// parameters last passed to [`apply`](Model::apply).
    fn residual_jacobian(&self, index: usize) -> (f64, SVector<f64, D>);

    /// Compose the increment `delta` onto `x`.
    ///
    /// The default is plain vector addition for Euclidean parameters;
    /// manifold-valued models (rotations) override this with the group
    /// composition so that small steps never leave the manifold.
    fn plus(&self, x: &SVector<f64, D>, delta: &SVector<f64, D>) -> SVector<f64, D> {
        x + delta
    }
}
