//! Eligibility trace and the TD(λ) parameter update.
//!
//! The trace is a decayed running sum of value gradients, one accumulator
//! per evaluator parameter. A TD error observed later in an episode is
//! credited to earlier positions in proportion to their trace weight.
//!
//! The trace buffer is allocated once and reused across episodes. Only the
//! trainer that owns it may mutate it.

/// Largest TD error magnitude applied in a single update.
pub const DELTA_CLIP: f32 = 1.0;

/// Per-parameter eligibility accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityTrace {
    values: Vec<f32>,
}

impl EligibilityTrace {
    /// Zeroed trace for `num_params` parameters.
    pub fn new(num_params: usize) -> Self {
        Self {
            values: vec![0.0; num_params],
        }
    }

    /// Zero every accumulator. Called at the start of each episode.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// `e ← λ·e + grad`.
    pub fn decay_and_accumulate(&mut self, lambda: f32, grad: &[f32]) {
        debug_assert_eq!(self.values.len(), grad.len(), "trace/gradient shape mismatch");
        for (e, &g) in self.values.iter_mut().zip(grad) {
            *e = lambda * *e + g;
        }
    }

    /// Current accumulator values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of accumulators.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the trace has no accumulators.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// TD error of one step, before and after clipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TdDelta {
    /// `Y_new - Y_old`, used for the surprise diagnostic.
    pub raw: f32,
    /// `raw` clamped to `[-DELTA_CLIP, DELTA_CLIP]`, used for the update.
    pub applied: f32,
}

impl TdDelta {
    /// Compute the TD error between two consecutive estimates.
    pub fn between(y_old: f32, y_new: f32) -> Self {
        let raw = y_new - y_old;
        Self {
            raw,
            applied: raw.clamp(-DELTA_CLIP, DELTA_CLIP),
        }
    }
}

/// `θ ← θ + α·δ·e` with δ clamped. Returns both the raw and applied δ.
pub fn apply_td_update(
    params: &mut [f32],
    trace: &EligibilityTrace,
    learning_rate: f32,
    y_old: f32,
    y_new: f32,
) -> TdDelta {
    debug_assert_eq!(params.len(), trace.len(), "trace/parameter shape mismatch");
    let delta = TdDelta::between(y_old, y_new);
    let step = learning_rate * delta.applied;
    for (p, &e) in params.iter_mut().zip(trace.values()) {
        *p += step * e;
    }
    delta
}
