use nalgebra::{SMatrix, SVector};

use crate::covariance::{Covariance, IdentityCovariance};
use crate::loss::{IdentityLoss, LossFunction};
use crate::model::Model;

/// Cost function composing a [`Model`] with loss and covariance weights
/// into normal-equation contributions.
///
/// Both plug-ins default to the identity, which makes the cost a plain
/// sum of squared residuals. They can be swapped without touching the
/// model or the optimizer.
pub struct CostFunction<M, const D: usize> {
    model: M,
    loss: Box<dyn LossFunction>,
    covariance: Box<dyn Covariance>,
}

impl<M: Model<D>, const D: usize> CostFunction<M, D> {
    /// Create a cost function with identity loss and covariance.
    pub fn new(model: M) -> Self {
        Self {
            model,
            loss: Box::new(IdentityLoss),
            covariance: Box::new(IdentityCovariance),
        }
    }

    /// Replace the robust loss plug-in.
    pub fn set_loss(&mut self, loss: Box<dyn LossFunction>) {
        self.loss = loss;
    }

    /// Replace the covariance plug-in.
    pub fn set_covariance(&mut self, covariance: Box<dyn Covariance>) {
        self.covariance = covariance;
    }

    /// Shared access to the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model, e.g. to load a fresh problem.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Zero the Hessian and gradient accumulators.
    pub fn init(&mut self, hessian: &mut SMatrix<f64, D, D>, b: &mut SVector<f64, D>) {
        hessian.fill(0.0);
        b.fill(0.0);
    }

    /// Linearize every residual at `x`, accumulating `H += w·JᵀJ` and
    /// `b += w·Jᵀr`, and return the total weighted cost.
    ///
    /// With zero residuals the accumulators stay zero and the cost is 0;
    /// the resulting singular system is for the optimizer to detect.
    pub fn linearize(
        &mut self,
        x: &SVector<f64, D>,
        hessian: &mut SMatrix<f64, D, D>,
        b: &mut SVector<f64, D>,
    ) -> f64 {
        self.model.apply(x);

        let mut total = 0.0;
        for i in 0..self.model.num_residuals() {
            let (r, jacobian) = self.model.residual_jacobian(i);
            let (rho, rho_prime) = self.loss.weight(r * r);
            let cov = self.covariance.weight(i);
            let w = cov * rho_prime;

            *hessian += (jacobian * jacobian.transpose()) * w;
            *b += jacobian * (r * w);
            total += cov * rho;
        }
        log::trace!(
            "linearized {} residuals, cost {:.6e}",
            self.model.num_residuals(),
            total
        );
        total
    }

    /// Total weighted cost at `x` without touching the accumulators.
    pub fn compute_cost(&mut self, x: &SVector<f64, D>) -> f64 {
        self.model.apply(x);

        let mut total = 0.0;
        for i in 0..self.model.num_residuals() {
            let (r, _) = self.model.residual_jacobian(i);
            let (rho, _) = self.loss.weight(r * r);
            total += self.covariance.weight(i) * rho;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::DiagonalCovariance;
    use crate::loss::HuberLoss;
    use approx::assert_relative_eq;
    use nalgebra::{SMatrix, SVector, Vector2};

    /// r_i = a_i · x - y_i, the plain linear least-squares model.
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

    #[test]
    fn test_linearize_single_residual() {
        // One residual r = x0 - 3 at x = 0: r = -3, J = [1, 0].
        let model = LinearModel::new(vec![Vector2::new(1.0, 0.0)], vec![3.0]);
        let mut cost = CostFunction::new(model);

        let mut h = SMatrix::<f64, 2, 2>::zeros();
        let mut b = SVector::<f64, 2>::zeros();
        cost.init(&mut h, &mut b);
        let total = cost.linearize(&Vector2::zeros(), &mut h, &mut b);

        assert_relative_eq!(total, 9.0);
        assert_relative_eq!(h[(0, 0)], 1.0);
        assert_relative_eq!(h[(1, 1)], 0.0);
        assert_relative_eq!(b[0], -3.0);
        assert_relative_eq!(b[1], 0.0);
    }

    #[test]
    fn test_linearize_hessian_symmetric() {
        let model = LinearModel::new(
            vec![Vector2::new(1.0, 2.0), Vector2::new(-0.5, 3.0)],
            vec![1.0, -2.0],
        );
        let mut cost = CostFunction::new(model);

        let mut h = SMatrix::<f64, 2, 2>::zeros();
        let mut b = SVector::<f64, 2>::zeros();
        cost.init(&mut h, &mut b);
        cost.linearize(&Vector2::new(0.3, -0.7), &mut h, &mut b);

        assert_relative_eq!(h[(0, 1)], h[(1, 0)]);
    }

    #[test]
    fn test_zero_residuals_leave_system_zero() {
        let model = LinearModel::new(vec![], vec![]);
        let mut cost = CostFunction::new(model);

        let mut h = SMatrix::<f64, 2, 2>::from_element(7.0);
        let mut b = SVector::<f64, 2>::from_element(7.0);
        cost.init(&mut h, &mut b);
        let total = cost.linearize(&Vector2::zeros(), &mut h, &mut b);

        assert_eq!(total, 0.0);
        assert_eq!(h, SMatrix::<f64, 2, 2>::zeros());
        assert_eq!(b, SVector::<f64, 2>::zeros());
    }

    #[test]
    fn test_compute_cost_matches_linearize() {
        let model = LinearModel::new(
            vec![Vector2::new(1.0, 1.0), Vector2::new(2.0, -1.0)],
            vec![0.5, 1.5],
        );
        let mut cost = CostFunction::new(model);
        let x = Vector2::new(0.1, 0.2);

        let mut h = SMatrix::<f64, 2, 2>::zeros();
        let mut b = SVector::<f64, 2>::zeros();
        cost.init(&mut h, &mut b);
        let from_linearize = cost.linearize(&x, &mut h, &mut b);
        let from_compute = cost.compute_cost(&x);

        assert_relative_eq!(from_linearize, from_compute);
    }

    #[test]
    fn test_covariance_scales_contributions() {
        let model = LinearModel::new(vec![Vector2::new(1.0, 0.0)], vec![2.0]);
        let mut cost = CostFunction::new(model);
        cost.set_covariance(Box::new(DiagonalCovariance::new(vec![0.5])));

        let mut h = SMatrix::<f64, 2, 2>::zeros();
        let mut b = SVector::<f64, 2>::zeros();
        cost.init(&mut h, &mut b);
        let total = cost.linearize(&Vector2::zeros(), &mut h, &mut b);

        assert_relative_eq!(total, 2.0); // 0.5 * (-2)^2
        assert_relative_eq!(h[(0, 0)], 0.5);
        assert_relative_eq!(b[0], -1.0);
    }

    #[test]
    fn test_huber_downweights_large_residual() {
        let model = LinearModel::new(vec![Vector2::new(1.0, 0.0)], vec![10.0]);
        let mut cost = CostFunction::new(model);
        cost.set_loss(Box::new(HuberLoss::new(1.0)));

        let mut h = SMatrix::<f64, 2, 2>::zeros();
        let mut b = SVector::<f64, 2>::zeros();
        cost.init(&mut h, &mut b);
        cost.linearize(&Vector2::zeros(), &mut h, &mut b);

        // weight = delta / |r| = 0.1
        assert_relative_eq!(h[(0, 0)], 0.1, epsilon = 1e-12);
        assert_relative_eq!(b[0], -1.0, epsilon = 1e-12);
    }
}
