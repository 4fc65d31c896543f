//! Configuration options for the TD(λ) trainer.
//!
//! This module provides the configuration struct that controls training:
//! the TD parameters, exploration schedules, plateau-based learning-rate
//! decay, benchmarking and checkpoint/diagnostic destinations.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::Architecture;
use crate::td::benchmark::BenchmarkResult;
use crate::td::error::TdError;
use crate::td::schedule::ExplorationSchedule;
use crate::td::selector::Strategy;

/// Configuration for the TD(λ) trainer.
///
/// # Example
/// ```
/// use nardi_td::td::TrainerConfig;
///
/// let config = TrainerConfig::default().with_stages(10).with_seed(7);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.lambda, 0.7);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Evaluator architecture.
    pub architecture: Architecture,

    /// Number of outer stages.
    pub stages: usize,

    /// Self-play episodes per stage.
    pub episodes_per_stage: usize,

    /// Trace decay λ in `[0, 1]`.
    pub lambda: f64,

    /// Initial learning rate α.
    pub learning_rate: f64,

    /// Learning-rate floor for plateau decay.
    pub learning_rate_floor: f64,

    /// Fraction of hidden units dropped per training gradient, in `[0, 1)`.
    /// Move selection and benchmarks always evaluate without dropout.
    pub dropout: f64,

    /// Fraction of `(lr - floor)` kept on each plateau decay.
    pub lr_retention: f64,

    /// Minimum stage-over-stage win-rate gain counted as improvement.
    ///
    /// Win rates are fractions in `[0, 1]`.
    pub improvement_threshold: f64,

    /// Stagnant stages tolerated before decaying the learning rate.
    pub patience: u32,

    /// Last ply index that uses noisy move selection; later plies are greedy.
    pub noisy_plies: u32,

    /// Dirichlet mixing-weight schedule.
    pub eps: ExplorationSchedule,

    /// Softmax temperature schedule.
    pub temperature: ExplorationSchedule,

    /// Games per seating in the per-stage benchmark.
    pub benchmark_games: usize,

    /// Games per seating before and after training (0 disables).
    pub edge_benchmark_games: usize,

    /// Opponent strategy for benchmarks. Must not need a model.
    pub baseline: Strategy,

    /// Worker threads for benchmarks (`None` = all cores).
    pub benchmark_threads: Option<usize>,

    /// Games per benchmark job.
    pub benchmark_chunk: usize,

    /// Where evaluator parameters are saved after every stage.
    pub checkpoint: Option<PathBuf>,

    /// Where the JSON training report is written.
    pub diagnostics_dir: Option<PathBuf>,

    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::default(),
            stages: 100,
            episodes_per_stage: 5000,
            lambda: 0.7,
            learning_rate: 0.01,
            learning_rate_floor: 0.001,
            dropout: 0.0,
            lr_retention: 0.7,
            improvement_threshold: 0.0003,
            patience: 5,
            noisy_plies: 24,
            eps: ExplorationSchedule::default_eps(),
            temperature: ExplorationSchedule::default_temperature(),
            benchmark_games: 1000,
            edge_benchmark_games: 20,
            baseline: Strategy::Heuristic,
            benchmark_threads: None,
            benchmark_chunk: 64,
            checkpoint: None,
            diagnostics_dir: None,
            seed: None,
        }
    }
}

impl TrainerConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A small configuration for smoke runs and tests.
    pub fn fast() -> Self {
        Self {
            stages: 3,
            episodes_per_stage: 20,
            benchmark_games: 10,
            edge_benchmark_games: 0,
            ..Default::default()
        }
    }

    /// Builder method: set the evaluator architecture.
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Builder method: set the stage count.
    pub fn with_stages(mut self, stages: usize) -> Self {
        self.stages = stages;
        self
    }

    /// Builder method: set episodes per stage.
    pub fn with_episodes_per_stage(mut self, episodes: usize) -> Self {
        self.episodes_per_stage = episodes;
        self
    }

    /// Builder method: set λ.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Builder method: set the initial learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Builder method: set the training dropout rate.
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Builder method: set benchmark games per seating.
    pub fn with_benchmark_games(mut self, games: usize) -> Self {
        self.benchmark_games = games;
        self
    }

    /// Builder method: set the benchmark baseline.
    pub fn with_baseline(mut self, baseline: Strategy) -> Self {
        self.baseline = baseline;
        self
    }

    /// Builder method: set benchmark threads.
    pub fn with_benchmark_threads(mut self, threads: usize) -> Self {
        self.benchmark_threads = Some(threads);
        self
    }

    /// Builder method: set the checkpoint path.
    pub fn with_checkpoint<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    /// Builder method: set the diagnostics directory.
    pub fn with_diagnostics_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.diagnostics_dir = Some(dir.into());
        self
    }

    /// Builder method: set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from a JSON string. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return the first error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("lambda", self.lambda)?;
        check_unit("lr_retention", self.lr_retention)?;

        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(ConfigError::out_of_range("learning_rate", self.learning_rate));
        }
        if self.learning_rate_floor < 0.0 || self.learning_rate_floor > self.learning_rate {
            return Err(ConfigError::out_of_range(
                "learning_rate_floor",
                self.learning_rate_floor,
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::out_of_range("dropout", self.dropout));
        }
        if !self.improvement_threshold.is_finite() {
            return Err(ConfigError::out_of_range(
                "improvement_threshold",
                self.improvement_threshold,
            ));
        }

        check_schedule("eps", &self.eps, 0.0)?;
        check_unit("eps.initial", self.eps.initial)?;
        check_schedule("temperature", &self.temperature, f64::MIN_POSITIVE)?;

        if self.benchmark_games == 0 {
            return Err(ConfigError::out_of_range("benchmark_games", 0.0));
        }
        if self.benchmark_chunk == 0 {
            return Err(ConfigError::out_of_range("benchmark_chunk", 0.0));
        }
        if self.baseline.needs_model() || self.baseline == Strategy::Human {
            return Err(ConfigError::InvalidBaseline(self.baseline));
        }

        self.architecture.validate()?;
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(name, value))
    }
}

fn check_schedule(
    name: &'static str,
    schedule: &ExplorationSchedule,
    min_floor: f64,
) -> Result<(), ConfigError> {
    if !(schedule.half_life > 0.0) || !schedule.half_life.is_finite() {
        return Err(ConfigError::out_of_range(name, schedule.half_life));
    }
    if schedule.floor < min_floor || schedule.floor > schedule.initial {
        return Err(ConfigError::out_of_range(name, schedule.floor));
    }
    Ok(())
}

/// Statistics collected during a training run.
///
/// Serialised as the `training_report.json` diagnostics file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingStats {
    /// One record per completed stage.
    pub stages: Vec<StageRecord>,

    /// Per-ply signed value estimates of the first episode of each stage.
    pub value_traces: Vec<Vec<f32>>,

    /// Greedy vs baseline before the first stage.
    pub pre_training: Option<BenchmarkResult>,

    /// Greedy vs baseline after the last stage.
    pub post_training: Option<BenchmarkResult>,

    /// Self-play episodes completed.
    pub episodes: u64,

    /// Total wall-clock time (in seconds).
    pub elapsed_seconds: f64,

    /// Episodes per second.
    pub episodes_per_second: f64,
}

/// Summary of one training stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage index.
    pub stage: usize,
    /// Dirichlet mixing weight used.
    pub eps: f64,
    /// Softmax temperature used.
    pub temperature: f64,
    /// Learning rate in effect during the stage.
    pub learning_rate: f64,
    /// Largest unclipped |δ| seen in any episode of the stage.
    pub max_surprise: f32,
    /// Greedy vs baseline benchmark at the end of the stage.
    pub benchmark: BenchmarkResult,
    /// Self-play margins won by the first and second seat during this stage.
    pub self_play_points: [u64; 2],
}

impl StageRecord {
    /// Benchmark win rate of the stage.
    pub fn win_rate(&self) -> f64 {
        self.benchmark.win_rate()
    }
}

impl TrainingStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update episodes per second based on elapsed time.
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.episodes_per_second = self.episodes as f64 / self.elapsed_seconds;
        }
    }

    /// Benchmark win rates, one per stage.
    pub fn win_rates(&self) -> Vec<f64> {
        self.stages.iter().map(StageRecord::win_rate).collect()
    }

    /// Write the stats as pretty JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), TdError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| TdError::Io(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Errors raised while setting up training or binding strategies.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A strategy name that is not one of the known strategies.
    UnknownStrategy(String),
    /// A model-backed strategy was requested without a model.
    MissingModel(Strategy),
    /// The human strategy needs an agent; bind it with `Policy::human`.
    HumanRequiresAgent,
    /// The benchmark baseline must not need a model or a human.
    InvalidBaseline(Strategy),
    /// A hyperparameter is outside its valid range.
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// The network architecture is unusable.
    InvalidArchitecture(String),
    /// Reading the configuration file failed.
    IoError(String),
    /// The configuration file is not valid JSON for this struct.
    ParseError(String),
}

impl ConfigError {
    fn out_of_range(name: &'static str, value: f64) -> Self {
        Self::OutOfRange { name, value }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStrategy(name) => write!(f, "unknown strategy '{}'", name),
            Self::MissingModel(s) => write!(f, "strategy '{}' requires a model", s),
            Self::HumanRequiresAgent => write!(f, "human strategy requires an attached agent"),
            Self::InvalidBaseline(s) => {
                write!(f, "strategy '{}' cannot be used as a benchmark baseline", s)
            }
            Self::OutOfRange { name, value } => {
                write!(f, "{} = {} is out of range", name, value)
            }
            Self::InvalidArchitecture(msg) => write!(f, "invalid architecture: {}", msg),
            Self::IoError(e) => write!(f, "IO error: {}", e),
            Self::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
