//! Robust loss functions for least squares optimization.

/// Trait for robust loss functions.
///
/// For a squared residual `s = r²` the loss reports the pair
/// `(ρ(s), ρ'(s))`: the contribution to the total cost and the weight
/// applied to that residual's normal-equation blocks. The identity loss
/// makes the solver plain least squares.
pub trait LossFunction: Send + Sync {
    /// Loss value ρ(s) and influence weight ρ'(s) for a squared residual `s`.
    fn weight(&self, squared_residual: f64) -> (f64, f64);
}

/// Identity loss: ρ(s) = s, weight always 1.0 (L2 baseline).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLoss;

impl LossFunction for IdentityLoss {
    fn weight(&self, squared_residual: f64) -> (f64, f64) {
        (squared_residual, 1.0)
    }
}

/// Huber loss: quadratic near zero, linear beyond `delta`.
///
/// Down-weights residuals with magnitude above `delta` so single outlier
/// correspondences cannot dominate the normal equations.
#[derive(Debug, Clone, Copy)]
pub struct HuberLoss {
    /// Transition point between the quadratic and linear regimes.
    pub delta: f64,
}

impl HuberLoss {
    /// Create a new Huber loss. Panics if `delta <= 0`.
    pub fn new(delta: f64) -> Self {
        assert!(delta > 0.0, "Huber delta must be positive, got {}", delta);
        HuberLoss { delta }
    }
}

impl LossFunction for HuberLoss {
    fn weight(&self, squared_residual: f64) -> (f64, f64) {
        let delta_sq = self.delta * self.delta;
        if squared_residual <= delta_sq {
            (squared_residual, 1.0)
        } else {
            let norm = squared_residual.sqrt();
            (2.0 * self.delta * norm - delta_sq, self.delta / norm)
        }
    }
}
