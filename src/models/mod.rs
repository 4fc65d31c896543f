//! Concrete evaluators.
//!
//! The training core only needs the [`Evaluator`](crate::td::Evaluator)
//! contract. [`ValueNet`] is the network used by the binaries: a small MLP
//! whose output is the expected game score.

pub mod value_net;

pub use value_net::{ValueNet, NUM_OUTCOMES, OUTCOME_SCORES};

use serde::{Deserialize, Serialize};

use crate::td::config::ConfigError;

/// Largest hidden layer accepted.
const MAX_HIDDEN: usize = 4096;

/// Hidden-layer sizes of the value network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Architecture {
    /// 64 → 16 hidden units.
    #[default]
    Compact,
    /// 128 → 32 hidden units.
    Wide,
    /// Explicit sizes.
    Custom {
        /// First hidden layer width.
        hidden1: usize,
        /// Second hidden layer width.
        hidden2: usize,
    },
}

impl Architecture {
    /// `(hidden1, hidden2)` for this variant.
    pub fn hidden_sizes(&self) -> (usize, usize) {
        match *self {
            Self::Compact => (64, 16),
            Self::Wide => (128, 32),
            Self::Custom { hidden1, hidden2 } => (hidden1, hidden2),
        }
    }

    /// Parse `compact`, `wide`, or `H1xH2` (e.g. `256x64`).
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let arch = match text.to_ascii_lowercase().as_str() {
            "compact" => Self::Compact,
            "wide" => Self::Wide,
            other => {
                let bad = || ConfigError::InvalidArchitecture(text.to_string());
                let (a, b) = other.split_once('x').ok_or_else(bad)?;
                Self::Custom {
                    hidden1: a.trim().parse().map_err(|_| bad())?,
                    hidden2: b.trim().parse().map_err(|_| bad())?,
                }
            }
        };
        arch.validate()?;
        Ok(arch)
    }

    /// Reject empty or oversized layers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (h1, h2) = self.hidden_sizes();
        for h in [h1, h2] {
            if h == 0 || h > MAX_HIDDEN {
                return Err(ConfigError::InvalidArchitecture(format!(
                    "hidden size {} must be in 1..={}",
                    h, MAX_HIDDEN
                )));
            }
        }
        Ok(())
    }
}

/// Errors reading or writing evaluator checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// Filesystem failure.
    Io(String),
    /// The file does not start with the expected magic bytes.
    BadMagic,
    /// The blob was written by an unknown format version.
    UnsupportedVersion(u32),
    /// The stored network does not match the requested architecture.
    ShapeMismatch(String),
    /// The blob is shorter than its header promises.
    Truncated,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{}", e),
            Self::BadMagic => write!(f, "bad checkpoint magic (expected NTDV)"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported checkpoint version {}", v),
            Self::ShapeMismatch(msg) => write!(f, "shape mismatch: {}", msg),
            Self::Truncated => write!(f, "checkpoint truncated"),
        }
    }
}

impl std::error::Error for CheckpointError {}
