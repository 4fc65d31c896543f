//! # Nardi TD
//!
//! Self-play TD(λ) training of a neural value function for Long Nardi, and
//! move selection on top of it.
//!
//! ## Features
//!
//! - **Generic core**: trains any game implementing the `Engine` trait with
//!   any differentiable `Evaluator`
//! - **Move selection**: greedy, noisy (softmax plus Dirichlet noise),
//!   two-ply expectiminimax lookahead, random and heuristic baselines
//! - **Schedules**: exploration decay per stage and plateau learning-rate
//!   decay driven by benchmark win rate
//! - **Parallel benchmarks**: head-to-head games split across rayon workers
//! - **Checkpointing**: save and resume the value network
//!
//! ## Quick Start
//!
//! ```ignore
//! use nardi_td::games::nardi::{NardiEngine, NARDI_FEATURES};
//! use nardi_td::models::{Architecture, ValueNet};
//! use nardi_td::td::{TdTrainer, TrainerConfig};
//!
//! let model = ValueNet::new(Architecture::Compact, NARDI_FEATURES, 1);
//! let mut trainer = TdTrainer::new(NardiEngine::new(), model, TrainerConfig::default())?;
//! trainer.train()?;
//! trainer.model().save("nardi.bin")?;
//! ```
//!
//! ## Modules
//!
//! - [`td`]: training loop, selectors, lookahead and benchmarks
//! - [`models`]: the value network
//! - [`games`]: the Long Nardi engine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     TD(λ) Trainer (Generic)                      │
//! │  - Eligibility traces     - Exploration / plateau schedules     │
//! │  - Stage benchmarks       - Checkpoints and training report     │
//! └─────────────────────────────────────────────────────────────────┘
//!                │                                  │
//!                │ Engine trait                     │ Evaluator trait
//!                ▼                                  ▼
//!   ┌─────────────────────────┐        ┌─────────────────────────┐
//!   │      NardiEngine        │        │        ValueNet         │
//!   │  - Move generation      │        │  - MLP, outcome softmax │
//!   │  - Reply tables (rayon) │        │  - Binary checkpoints   │
//!   └─────────────────────────┘        └─────────────────────────┘
//! ```

#![warn(missing_docs)]

/// TD(λ) training and move selection.
pub mod td;

/// Value network implementations.
pub mod models;

/// Game engines.
pub mod games;

// Re-export commonly used types at crate root for convenience
pub use games::nardi::{NardiBoard, NardiEngine, NARDI_FEATURES};
pub use models::{Architecture, ValueNet};
pub use td::{Engine, Evaluator, Strategy, TdError, TdTrainer, TrainerConfig};
