//! TD(λ) self-play training module.
//!
//! This module trains a value function for a two-player dice board game by
//! playing it against itself, and uses that value function to choose moves.
//! It is generic over any rules implementation of the [`Engine`] trait and
//! any differentiable [`Evaluator`].
//!
//! # Overview
//!
//! - [`dice`]: the 21 unordered dice outcomes and their probabilities
//! - [`playout`]: turn sign and ply bookkeeping around an engine
//! - [`selector`] / [`lookahead`]: Greedy, Noisy, Lookahead, Random,
//!   Heuristic and Human move selection
//! - [`trace`] / [`trainer`]: eligibility traces and the TD(λ) episode loop
//! - [`schedule`]: exploration decay and plateau learning-rate decay
//! - [`benchmark`]: head-to-head evaluation, sequential or on rayon
//!
//! # Usage
//!
//! ```ignore
//! use nardi_td::games::nardi::{NardiEngine, NARDI_FEATURES};
//! use nardi_td::models::{Architecture, ValueNet};
//! use nardi_td::td::{TdTrainer, TrainerConfig};
//!
//! let model = ValueNet::new(Architecture::Compact, NARDI_FEATURES, 7);
//! let config = TrainerConfig::default().with_stages(10).with_seed(7);
//! let mut trainer = TdTrainer::new(NardiEngine::new(), model, config)?;
//!
//! let stats = trainer.train()?;
//! println!("win rates: {:?}", stats.win_rates());
//! ```
//!
//! # Theory
//!
//! The value estimate `Y` of a position is tracked from the first player's
//! side. After every move the TD error `δ = Y_new - Y_old` moves the
//! parameters along the eligibility trace:
//! ```text
//! e ← λ·e + ∇Y_old
//! θ ← θ + α · clip(δ, -1, 1) · e
//! ```
//! When the game ends `Y_new` is the final margin, signed toward the winner.
//!
//! # References
//!
//! - Sutton, R. "Learning to Predict by the Methods of Temporal Differences" (1988)
//! - Tesauro, G. "Temporal Difference Learning and TD-Gammon" (1995)

pub mod benchmark;
pub mod config;
pub mod dice;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lookahead;
pub mod playout;
pub mod schedule;
pub mod selector;
pub mod trace;
pub mod trainer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenient access
pub use benchmark::{benchmark, benchmark_parallel, BenchmarkResult, BenchmarkSettings, Contender};
pub use config::{ConfigError, StageRecord, TrainerConfig, TrainingStats};
pub use dice::{bucket_probabilities, Dice, DiceBucket, NUM_DICE_BUCKETS};
pub use engine::{Candidate, Engine, Features, Grandchildren};
pub use error::{ContractViolation, TdError};
pub use evaluator::Evaluator;
pub use playout::{GameRecord, Playout, TurnOutcome};
pub use schedule::{ExplorationSchedule, PlateauDecay, PlateauOutcome};
pub use selector::{HumanAgent, NoiseParams, Policy, Strategy};
pub use trainer::{EpisodeReport, TdTrainer, TrainerEvent, TrainingRunState};
