//! Self-play TD(λ) trainer.
//!
//! The trainer owns one playout, the evaluator being trained and all mutable
//! training state. An episode is a game of noisy self-play:
//!
//! ```text
//! INIT      reset; (Y, ∇Y) = sign · V(board); e = 0
//! STEP      e = λe + ∇Y_old
//!           play a noisy move
//!           Y_new = sign · V(board)          (not terminal)
//!                 = -sign_after · margin     (terminal)
//!           δ = Y_new - Y_old;  θ += α · clip(δ) · e
//! TERMINAL  report max |δ|, plies, winner, margin
//! ```
//!
//! `Y` is always expressed from the first player's side, so the update is
//! the same whichever player moved.
//!
//! Stages wrap episodes with decaying exploration, a greedy-vs-baseline
//! benchmark, plateau learning-rate decay and checkpointing.

use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::td::benchmark::{benchmark_parallel, BenchmarkResult, BenchmarkSettings, Contender};
use crate::td::config::{StageRecord, TrainerConfig, TrainingStats};
use crate::td::engine::Engine;
use crate::td::error::TdError;
use crate::td::evaluator::{first_non_finite, Evaluator};
use crate::td::playout::Playout;
use crate::td::schedule::{PlateauDecay, PlateauOutcome};
use crate::td::selector::{apply_noisy_move, NoiseParams, Strategy};
use crate::td::trace::{apply_td_update, EligibilityTrace, TdDelta};

/// File name of the diagnostics report.
pub const REPORT_FILE: &str = "training_report.json";

/// Mutable state of a training run.
#[derive(Debug, Clone)]
pub struct TrainingRunState {
    /// Current stage.
    pub stage: usize,
    /// Current Dirichlet mixing weight.
    pub eps: f64,
    /// Current softmax temperature.
    pub temperature: f64,
    /// Learning-rate controller.
    pub plateau: PlateauDecay,
    /// Self-play margins won by the first and second seat over the whole run.
    pub points: [u64; 2],
}

impl TrainingRunState {
    fn new(config: &TrainerConfig) -> Self {
        Self {
            stage: 0,
            eps: config.eps.value(0),
            temperature: config.temperature.value(0),
            plateau: PlateauDecay::new(
                config.learning_rate,
                config.learning_rate_floor,
                config.lr_retention,
                config.improvement_threshold,
                config.patience,
            ),
            points: [0; 2],
        }
    }

    /// Learning rate in effect.
    pub fn learning_rate(&self) -> f64 {
        self.plateau.learning_rate
    }
}

/// Outcome of one self-play episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    /// Largest unclipped |δ| of the episode.
    pub max_surprise: f32,
    /// Plies played, including passes.
    pub plies: u32,
    /// +1 if the first player won, -1 otherwise.
    pub winner_sign: i8,
    /// Winning margin.
    pub margin: u8,
    /// Signed value after every ply, when tracking was requested.
    pub value_trace: Option<Vec<f32>>,
}

/// Result of one TD step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// TD error of the step.
    pub delta: TdDelta,
    /// Whether the move ended the game.
    pub terminal: bool,
}

/// Which edge benchmark an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePhase {
    /// Before the first stage.
    Before,
    /// After the last stage.
    After,
}

/// Progress notifications from [`TdTrainer::train_with_callback`].
#[derive(Debug)]
pub enum TrainerEvent<'a> {
    /// A stage is about to start.
    StageStarted {
        /// Stage index.
        stage: usize,
        /// Episodes in the stage.
        episodes: usize,
    },
    /// An episode finished.
    EpisodeFinished {
        /// Stage index.
        stage: usize,
        /// Episode index within the stage.
        episode: usize,
        /// Episode outcome.
        report: &'a EpisodeReport,
    },
    /// A stage finished, benchmark included.
    StageFinished(&'a StageRecord),
    /// A pre- or post-training benchmark finished.
    EdgeBenchmark {
        /// Before or after training.
        phase: EdgePhase,
        /// Benchmark tallies.
        result: &'a BenchmarkResult,
    },
}

#[derive(Debug, Clone, Default)]
struct EpisodeState {
    episode: usize,
    y_old: f32,
    max_surprise: f32,
    values: Option<Vec<f32>>,
}

/// TD(λ) self-play trainer.
///
/// # Example
/// ```ignore
/// let engine = NardiEngine::new();
/// let model = ValueNet::new(Architecture::Compact, NARDI_FEATURES, 1);
/// let mut trainer = TdTrainer::new(engine, model, TrainerConfig::fast())?;
/// let stats = trainer.train()?;
/// println!("final win rate: {:?}", stats.win_rates().last());
/// ```
pub struct TdTrainer<G: Engine, M: Evaluator> {
    playout: Playout<G>,
    model: M,
    config: TrainerConfig,
    state: TrainingRunState,
    trace: EligibilityTrace,
    grad: Vec<f32>,
    episode: EpisodeState,
    rng: StdRng,
    stats: TrainingStats,
}

impl<G: Engine, M: Evaluator> TdTrainer<G, M> {
    /// Create a trainer. The configuration is validated here, before any
    /// simulation starts.
    pub fn new(engine: G, model: M, config: TrainerConfig) -> Result<Self, TdError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let num_params = model.num_params();

        Ok(Self {
            playout: Playout::new(engine),
            state: TrainingRunState::new(&config),
            trace: EligibilityTrace::new(num_params),
            grad: vec![0.0; num_params],
            episode: EpisodeState::default(),
            model,
            config,
            rng,
            stats: TrainingStats::new(),
        })
    }

    /// The evaluator being trained.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consume the trainer and return the trained evaluator.
    pub fn into_model(self) -> M {
        self.model
    }

    /// The configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Current run state.
    pub fn state(&self) -> &TrainingRunState {
        &self.state
    }

    /// The eligibility trace.
    pub fn trace(&self) -> &EligibilityTrace {
        &self.trace
    }

    /// The playout driver.
    pub fn playout(&self) -> &Playout<G> {
        &self.playout
    }

    /// Statistics so far.
    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    fn noise(&self) -> NoiseParams {
        NoiseParams {
            noisy_plies: self.config.noisy_plies,
            eps: self.state.eps,
            temperature: self.state.temperature,
        }
    }

    fn numeric_error(&self, detail: String) -> TdError {
        TdError::numeric(
            self.state.stage,
            self.episode.episode,
            self.playout.ply(),
            detail,
        )
    }

    /// `sign · V(board)` and its gradient, written to the staging buffer.
    fn signed_value_and_grad(&mut self) -> Result<f32, TdError> {
        let features = self.playout.engine().board_features();
        let dropout = self.config.dropout as f32;
        let value =
            self.model
                .evaluate_with_grad_dropout(&features, &mut self.grad, dropout, &mut self.rng);
        if !value.is_finite() {
            return Err(self.numeric_error(format!("value estimate is {}", value)));
        }
        if let Some(i) = first_non_finite(&self.grad) {
            return Err(self.numeric_error(format!("gradient entry {} is {}", i, self.grad[i])));
        }

        let sign = f32::from(self.playout.sign());
        self.grad.iter_mut().for_each(|g| *g *= sign);
        Ok(sign * value)
    }

    /// INIT: reset the game, evaluate the start position and zero the trace.
    pub fn begin_episode(
        &mut self,
        setup: Option<&G::Board>,
        track_values: bool,
    ) -> Result<(), TdError> {
        self.playout.reset(setup);
        let y = self.signed_value_and_grad()?;
        self.trace.reset();
        self.episode.y_old = y;
        self.episode.max_surprise = 0.0;
        self.episode.values = track_values.then(|| vec![y]);
        Ok(())
    }

    /// STEP: accumulate the trace, play one noisy move and apply the update.
    pub fn step(&mut self) -> Result<StepOutcome, TdError> {
        let lambda = self.config.lambda as f32;
        self.trace.decay_and_accumulate(lambda, &self.grad);

        let noise = self.noise();
        apply_noisy_move(&mut self.playout, &self.model, noise, &mut self.rng)
            .map_err(|e| e.locate(self.state.stage, self.episode.episode))?;

        let terminal = self.playout.is_terminal();
        let y_new = if terminal {
            let margin = self.playout.engine().winner_result()?;
            let winner = self.playout.winner_sign();
            let seat = if winner == 1 { 0 } else { 1 };
            self.state.points[seat] += u64::from(margin);
            -f32::from(self.playout.sign()) * f32::from(margin)
        } else {
            self.signed_value_and_grad()?
        };

        let learning_rate = self.state.learning_rate() as f32;
        let delta = apply_td_update(
            self.model.params_mut(),
            &self.trace,
            learning_rate,
            self.episode.y_old,
            y_new,
        );

        self.episode.max_surprise = self.episode.max_surprise.max(delta.raw.abs());
        self.episode.y_old = y_new;
        if let Some(values) = self.episode.values.as_mut() {
            values.push(y_new);
        }

        Ok(StepOutcome { delta, terminal })
    }

    /// Play a full self-play episode with updates and report its outcome.
    pub fn play_episode(
        &mut self,
        setup: Option<&G::Board>,
        track_values: bool,
    ) -> Result<EpisodeReport, TdError> {
        self.begin_episode(setup, track_values)?;
        while !self.step()?.terminal {}

        Ok(EpisodeReport {
            max_surprise: self.episode.max_surprise,
            plies: self.playout.ply(),
            winner_sign: self.playout.winner_sign(),
            margin: self.playout.engine().winner_result()?,
            value_trace: self.episode.values.take(),
        })
    }

    /// Greedy with the current model against the configured baseline.
    pub fn benchmark_against_baseline(
        &mut self,
        games_per_seating: usize,
    ) -> Result<BenchmarkResult, TdError> {
        let settings = BenchmarkSettings {
            games_per_seating,
            chunk: self.config.benchmark_chunk,
            threads: self.config.benchmark_threads,
            seed: self.rng.gen(),
        };
        benchmark_parallel(
            self.playout.engine(),
            Contender::with_model(Strategy::Greedy, &self.model),
            Contender::model_free(self.config.baseline),
            &settings,
            |_| {},
        )
    }

    fn save_checkpoint(&self) -> Result<(), TdError> {
        if let Some(path) = &self.config.checkpoint {
            self.model.checkpoint(path)?;
            debug!("checkpoint written to {}", path.display());
        }
        Ok(())
    }

    /// Run one stage: episodes, benchmark, plateau check and checkpoint.
    pub fn run_stage<F>(&mut self, stage: usize, callback: &mut F) -> Result<StageRecord, TdError>
    where
        F: FnMut(&TrainerEvent<'_>),
    {
        self.state.stage = stage;
        self.state.eps = self.config.eps.value(stage);
        self.state.temperature = self.config.temperature.value(stage);
        let points_before = self.state.points;
        let learning_rate = self.state.learning_rate();

        info!(
            "stage {}: eps={:.4} temperature={:.4} lr={:.6}",
            stage, self.state.eps, self.state.temperature, learning_rate
        );
        callback(&TrainerEvent::StageStarted {
            stage,
            episodes: self.config.episodes_per_stage,
        });

        let mut max_surprise = 0.0f32;
        for episode in 0..self.config.episodes_per_stage {
            self.episode.episode = episode;
            let report = self.play_episode(None, episode == 0)?;
            debug!(
                "stage {} episode {}: {} plies, winner {:+}, margin {}, surprise {:.4}",
                stage, episode, report.plies, report.winner_sign, report.margin, report.max_surprise
            );
            max_surprise = max_surprise.max(report.max_surprise);
            self.stats.episodes += 1;
            callback(&TrainerEvent::EpisodeFinished {
                stage,
                episode,
                report: &report,
            });
            if let Some(values) = report.value_trace {
                self.stats.value_traces.push(values);
            }
        }

        let benchmark = self.benchmark_against_baseline(self.config.benchmark_games)?;
        let win_rate = benchmark.win_rate();
        info!(
            "stage {}: win rate vs {} = {:.2}% ({}-{}), max surprise {:.4}",
            stage,
            self.config.baseline,
            win_rate * 100.0,
            benchmark.points_a,
            benchmark.points_b,
            max_surprise
        );

        match self.state.plateau.observe(win_rate) {
            PlateauOutcome::Decayed { from, to } => {
                warn!("win rate plateaued, learning rate {:.6} -> {:.6}", from, to);
            }
            PlateauOutcome::Stagnant { count } => {
                debug!("stagnant for {} stage(s)", count);
            }
            PlateauOutcome::Improved => {}
        }

        self.save_checkpoint()?;

        let record = StageRecord {
            stage,
            eps: self.state.eps,
            temperature: self.state.temperature,
            learning_rate,
            max_surprise,
            benchmark,
            self_play_points: [
                self.state.points[0] - points_before[0],
                self.state.points[1] - points_before[1],
            ],
        };
        callback(&TrainerEvent::StageFinished(&record));
        self.stats.stages.push(record.clone());
        Ok(record)
    }

    fn edge_benchmark<F>(
        &mut self,
        phase: EdgePhase,
        callback: &mut F,
    ) -> Result<Option<BenchmarkResult>, TdError>
    where
        F: FnMut(&TrainerEvent<'_>),
    {
        let games = self.config.edge_benchmark_games;
        if games == 0 {
            return Ok(None);
        }
        let result = self.benchmark_against_baseline(games)?;
        info!(
            "{:?} training: win rate vs {} = {:.2}%",
            phase,
            self.config.baseline,
            result.win_rate() * 100.0
        );
        callback(&TrainerEvent::EdgeBenchmark {
            phase,
            result: &result,
        });
        Ok(Some(result))
    }

    /// Run the configured number of stages.
    pub fn train(&mut self) -> Result<&TrainingStats, TdError> {
        self.train_with_callback(|_| {})
    }

    /// Run the configured number of stages, reporting progress.
    pub fn train_with_callback<F>(&mut self, mut callback: F) -> Result<&TrainingStats, TdError>
    where
        F: FnMut(&TrainerEvent<'_>),
    {
        let start_time = Instant::now();

        self.stats.pre_training = self.edge_benchmark(EdgePhase::Before, &mut callback)?;

        for stage in 0..self.config.stages {
            self.run_stage(stage, &mut callback)?;
            self.stats.elapsed_seconds = start_time.elapsed().as_secs_f64();
            self.stats.update_rate();
        }

        self.stats.post_training = self.edge_benchmark(EdgePhase::After, &mut callback)?;

        self.stats.elapsed_seconds = start_time.elapsed().as_secs_f64();
        self.stats.update_rate();

        if let Some(dir) = self.config.diagnostics_dir.clone() {
            self.write_report(&dir)?;
        }

        Ok(&self.stats)
    }

    /// Write `training_report.json` into `dir`, creating it if needed.
    pub fn write_report(&self, dir: &Path) -> Result<(), TdError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        self.stats.save_json(&path)?;
        info!("diagnostics written to {}", path.display());
        Ok(())
    }
}
