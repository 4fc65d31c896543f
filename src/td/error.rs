//! Error types surfaced by the training and move-selection core.
//!
//! Every failure is a typed value returned to the caller. Nothing in the
//! core prints and carries on.

use std::fmt;

use crate::models::CheckpointError;
use crate::td::config::ConfigError;
use crate::td::dice::DiceBucket;

/// A broken promise at the engine boundary.
///
/// These indicate a defect in either the engine or its caller and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// `apply` received a candidate that was not produced by the most recent
    /// enumeration (or one that was already applied).
    StaleCandidate {
        /// Stamp of the engine's current enumeration.
        expected: u64,
        /// Stamp carried by the candidate.
        got: u64,
    },
    /// `winner_result` was queried before the game ended.
    NotTerminal,
    /// A grandchild table reported ordinary replies in a bucket that also
    /// carries an immediate opponent win.
    WinWithReplies {
        /// Child index.
        child: usize,
        /// Offending bucket.
        bucket: DiceBucket,
        /// Number of ordinary replies reported.
        replies: usize,
    },
    /// Reply counts and reply features disagree in length.
    ReplyCountMismatch {
        /// Sum of all per-bucket counts.
        counted: usize,
        /// Number of reply feature vectors.
        features: usize,
    },
    /// A grandchild table covers a different number of children than asked.
    ChildCountMismatch {
        /// Children passed in.
        children: usize,
        /// Per-child rows returned.
        rows: usize,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleCandidate { expected, got } => write!(
                f,
                "candidate from enumeration {} applied, current enumeration is {}",
                got, expected
            ),
            Self::NotTerminal => write!(f, "winner_result queried before the game ended"),
            Self::WinWithReplies { child, bucket, replies } => write!(
                f,
                "child {} bucket {} has an immediate win and {} ordinary replies",
                child, bucket, replies
            ),
            Self::ReplyCountMismatch { counted, features } => write!(
                f,
                "reply counts sum to {} but {} reply features were returned",
                counted, features
            ),
            Self::ChildCountMismatch { children, rows } => write!(
                f,
                "grandchild table has {} rows for {} children",
                rows, children
            ),
        }
    }
}

impl std::error::Error for ContractViolation {}

/// Top-level error for training, playouts and benchmarks.
#[derive(Debug)]
pub enum TdError {
    /// Invalid setup; raised before any simulation starts.
    Config(ConfigError),
    /// Engine boundary defect.
    Contract(ContractViolation),
    /// A value estimate or gradient became NaN or infinite.
    NumericInstability {
        /// Stage index at the time of failure.
        stage: usize,
        /// Episode index within the stage.
        episode: usize,
        /// Ply within the episode.
        ply: u32,
        /// What was non-finite.
        detail: String,
    },
    /// Loading or saving evaluator parameters failed.
    Checkpoint(CheckpointError),
    /// Writing diagnostics failed.
    Io(String),
}

impl TdError {
    /// Build a numeric-instability error for a value or gradient.
    pub fn numeric(stage: usize, episode: usize, ply: u32, detail: impl Into<String>) -> Self {
        Self::NumericInstability {
            stage,
            episode,
            ply,
            detail: detail.into(),
        }
    }

    /// Attach the stage and episode to a numeric-instability error raised
    /// below the trainer. Other variants pass through.
    pub fn locate(self, stage: usize, episode: usize) -> Self {
        match self {
            Self::NumericInstability { ply, detail, .. } => Self::NumericInstability {
                stage,
                episode,
                ply,
                detail,
            },
            other => other,
        }
    }
}

impl fmt::Display for TdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {}", e),
            Self::Contract(e) => write!(f, "engine contract violation: {}", e),
            Self::NumericInstability { stage, episode, ply, detail } => write!(
                f,
                "numeric instability at stage {} episode {} ply {}: {}",
                stage, episode, ply, detail
            ),
            Self::Checkpoint(e) => write!(f, "checkpoint error: {}", e),
            Self::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for TdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Contract(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for TdError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ContractViolation> for TdError {
    fn from(e: ContractViolation) -> Self {
        Self::Contract(e)
    }
}

impl From<CheckpointError> for TdError {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}

impl From<std::io::Error> for TdError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
