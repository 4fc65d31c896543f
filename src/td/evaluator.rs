//! Evaluator trait: the differentiable value function consumed by training.
//!
//! An evaluator maps a feature vector to a scalar value from the perspective
//! the features were encoded in. Parameters are exposed as one flat slice so
//! that eligibility traces and gradients share a single shape.

use std::path::Path;

use rand::RngCore;

use crate::models::CheckpointError;
use crate::td::engine::Features;

/// Differentiable scalar evaluation of a position.
///
/// Values must lie within the fixed outcome-score range of the
/// implementation (for `ValueNet`, `[-2, 2]`).
pub trait Evaluator: Send + Sync {
    /// Number of trainable parameters.
    fn num_params(&self) -> usize;

    /// Value of one position. No gradient is tracked.
    fn evaluate(&self, features: &[f32]) -> f32;

    /// Values of many positions, in order.
    fn evaluate_batch(&self, batch: &[Features]) -> Vec<f32> {
        batch.iter().map(|f| self.evaluate(f)).collect()
    }

    /// Value of one position plus its gradient with respect to every
    /// parameter. `grad` has length `num_params()` and is overwritten.
    fn evaluate_with_grad(&self, features: &[f32], grad: &mut [f32]) -> f32;

    /// Like [`evaluate_with_grad`](Self::evaluate_with_grad), with a fraction
    /// `dropout` of hidden units dropped for this one call. Evaluators without
    /// hidden units ignore the rate.
    fn evaluate_with_grad_dropout(
        &self,
        features: &[f32],
        grad: &mut [f32],
        dropout: f32,
        rng: &mut dyn RngCore,
    ) -> f32 {
        let _ = (dropout, rng);
        self.evaluate_with_grad(features, grad)
    }

    /// Flat parameter view.
    fn params(&self) -> &[f32];

    /// Mutable flat parameter view. Only the trainer writes through this.
    fn params_mut(&mut self) -> &mut [f32];

    /// Write the parameters to `path` so that training can resume from them.
    fn checkpoint(&self, path: &Path) -> Result<(), CheckpointError> {
        Err(CheckpointError::Io(format!(
            "evaluator cannot be checkpointed to {}",
            path.display()
        )))
    }
}

/// Index of the first non-finite entry, if any.
pub fn first_non_finite(values: &[f32]) -> Option<usize> {
    values.iter().position(|v| !v.is_finite())
}
