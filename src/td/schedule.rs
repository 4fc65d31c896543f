//! Exploration and learning-rate schedules.
//!
//! Exploration (Dirichlet mixing weight eps and softmax temperature) decays
//! exponentially per stage toward a floor. The learning rate decays on
//! plateau: when the benchmark win rate stops improving for long enough it
//! is pulled toward its floor by a fixed retention factor.

use serde::{Deserialize, Serialize};

/// Exponential decay from `initial` toward `floor` with a half-life in stages.
///
/// ```text
/// value(stage) = floor + (initial - floor) * 2^(-stage / half_life)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSchedule {
    /// Value at stage 0.
    pub initial: f64,
    /// Asymptotic value.
    pub floor: f64,
    /// Stages for the distance to the floor to halve.
    pub half_life: f64,
}

impl ExplorationSchedule {
    /// Create a schedule.
    pub fn new(initial: f64, floor: f64, half_life: f64) -> Self {
        Self {
            initial,
            floor,
            half_life,
        }
    }

    /// Default mixing-weight schedule: 0.25 decaying to 0.1, half-life 15.
    pub fn default_eps() -> Self {
        Self::new(0.25, 0.1, 15.0)
    }

    /// Default temperature schedule: 1.0 decaying to 0.1, half-life 20.
    pub fn default_temperature() -> Self {
        Self::new(1.0, 0.1, 20.0)
    }

    /// Scheduled value at a stage.
    pub fn value(&self, stage: usize) -> f64 {
        self.floor + (self.initial - self.floor) * 2f64.powf(-(stage as f64) / self.half_life)
    }
}

/// Outcome of feeding one stage's win rate to the plateau tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlateauOutcome {
    /// Win rate improved by at least the threshold; counter reset.
    Improved,
    /// No sufficient improvement; counter incremented.
    Stagnant {
        /// Consecutive stagnant stages so far.
        count: u32,
    },
    /// Stagnation exceeded patience; learning rate decayed and counter reset.
    Decayed {
        /// Learning rate before the decay.
        from: f64,
        /// Learning rate after the decay.
        to: f64,
    },
}

/// Decay-on-plateau learning-rate controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauDecay {
    /// Current learning rate.
    pub learning_rate: f64,
    /// Lower bound the rate decays toward.
    pub floor: f64,
    /// Fraction of `(lr - floor)` kept on each decay.
    pub retention: f64,
    /// Minimum stage-over-stage win-rate gain that counts as improvement.
    pub threshold: f64,
    /// Stagnant stages tolerated before decaying.
    pub patience: u32,
    /// Win rate of the previous stage.
    pub last_win_rate: f64,
    /// Consecutive stagnant stages.
    pub stagnant: u32,
}

impl PlateauDecay {
    /// Create a controller starting at `learning_rate`.
    pub fn new(learning_rate: f64, floor: f64, retention: f64, threshold: f64, patience: u32) -> Self {
        Self {
            learning_rate,
            floor,
            retention,
            threshold,
            patience,
            last_win_rate: 0.0,
            stagnant: 0,
        }
    }

    /// Record a stage's win rate and decay the learning rate if the plateau
    /// has lasted more than `patience` stages.
    pub fn observe(&mut self, win_rate: f64) -> PlateauOutcome {
        let improvement = win_rate - self.last_win_rate;
        self.last_win_rate = win_rate;

        if improvement >= self.threshold {
            self.stagnant = 0;
            return PlateauOutcome::Improved;
        }

        self.stagnant += 1;
        if self.stagnant > self.patience {
            let from = self.learning_rate;
            self.learning_rate = self.floor + self.retention * (self.learning_rate - self.floor);
            self.stagnant = 0;
            PlateauOutcome::Decayed {
                from,
                to: self.learning_rate,
            }
        } else {
            PlateauOutcome::Stagnant {
                count: self.stagnant,
            }
        }
    }
}
