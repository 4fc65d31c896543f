//! Head-to-head benchmarking of two strategies.
//!
//! A benchmark plays `games_per_seating` games with each contender seated
//! first, and tallies the winning margins. The win rate of contender A is
//! `points_a / (points_a + points_b)`.
//!
//! [`benchmark_parallel`] splits the games into chunks on a rayon pool. Each
//! job clones the engine, resolves its own policies and owns a `StdRng`
//! seeded from the job seed, so results do not depend on the thread count.
//! Only the point tallies are merged.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::td::config::ConfigError;
use crate::td::engine::Engine;
use crate::td::error::TdError;
use crate::td::evaluator::Evaluator;
use crate::td::playout::Playout;
use crate::td::selector::{NoiseParams, Policy, Strategy};

/// Point tallies from a benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Margins won by contender A.
    pub points_a: u64,
    /// Margins won by contender B.
    pub points_b: u64,
    /// Games played.
    pub games: usize,
}

impl BenchmarkResult {
    /// Fraction of points won by A, or 0 when no points were scored.
    pub fn win_rate(&self) -> f64 {
        let total = self.points_a + self.points_b;
        if total == 0 {
            0.0
        } else {
            self.points_a as f64 / total as f64
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            points_a: self.points_a + other.points_a,
            points_b: self.points_b + other.points_b,
            games: self.games + other.games,
        }
    }
}

/// A strategy plus the model it evaluates with, if any.
#[derive(Debug)]
pub struct Contender<'m, M> {
    /// Strategy to resolve.
    pub strategy: Strategy,
    /// Model for model-backed strategies.
    pub model: Option<&'m M>,
}

impl<'m, M> Clone for Contender<'m, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'m, M> Copy for Contender<'m, M> {}

impl<'m, M: Evaluator> Contender<'m, M> {
    /// A model-backed contender.
    pub fn with_model(strategy: Strategy, model: &'m M) -> Self {
        Self {
            strategy,
            model: Some(model),
        }
    }

    /// A contender that needs no model.
    pub fn model_free(strategy: Strategy) -> Self {
        Self {
            strategy,
            model: None,
        }
    }

    fn resolve<G: Engine>(&self) -> Result<Policy<'m, G, M>, ConfigError> {
        Policy::resolve(self.strategy, self.model, NoiseParams::default())
    }
}

/// How a parallel benchmark is split and seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkSettings {
    /// Games with each contender seated first.
    pub games_per_seating: usize,
    /// Games per job.
    pub chunk: usize,
    /// Worker threads (`None` = rayon default).
    pub threads: Option<usize>,
    /// Seed from which every job seed is derived.
    pub seed: u64,
}

impl BenchmarkSettings {
    /// Settings with the default chunk size and thread count.
    pub fn new(games_per_seating: usize, seed: u64) -> Self {
        Self {
            games_per_seating,
            chunk: 64,
            threads: None,
            seed,
        }
    }
}

/// Play games sequentially on one playout, A and B alternating seats.
///
/// `a` is seated first for the first `games_per_seating` games and second
/// for the rest.
pub fn benchmark<G: Engine, M: Evaluator, R: Rng>(
    playout: &mut Playout<G>,
    a: &mut Policy<'_, G, M>,
    b: &mut Policy<'_, G, M>,
    games_per_seating: usize,
    setup: Option<&G::Board>,
    rng: &mut R,
) -> Result<BenchmarkResult, TdError> {
    let mut result = BenchmarkResult::default();
    for a_first in [true, false] {
        let seated = play_games(playout, a, b, a_first, games_per_seating, setup, rng)?;
        result = result.merge(seated);
    }
    Ok(result)
}

fn play_games<G: Engine, M: Evaluator, R: Rng>(
    playout: &mut Playout<G>,
    a: &mut Policy<'_, G, M>,
    b: &mut Policy<'_, G, M>,
    a_first: bool,
    games: usize,
    setup: Option<&G::Board>,
    rng: &mut R,
) -> Result<BenchmarkResult, TdError> {
    let mut result = BenchmarkResult::default();
    for _ in 0..games {
        let record = if a_first {
            playout.play_game(a, b, setup, rng)?
        } else {
            playout.play_game(b, a, setup, rng)?
        };
        let a_won = record.first_won == a_first;
        if a_won {
            result.points_a += u64::from(record.margin);
        } else {
            result.points_b += u64::from(record.margin);
        }
        result.games += 1;
    }
    Ok(result)
}

/// One unit of parallel work.
#[derive(Debug, Clone, Copy)]
struct Job {
    a_first: bool,
    games: usize,
    seed: u64,
}

fn plan_jobs(settings: &BenchmarkSettings) -> Vec<Job> {
    let chunk = settings.chunk.max(1);
    let mut jobs = Vec::new();
    for a_first in [true, false] {
        let mut remaining = settings.games_per_seating;
        while remaining > 0 {
            let games = remaining.min(chunk);
            let seed = settings
                .seed
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add(jobs.len() as u64);
            jobs.push(Job { a_first, games, seed });
            remaining -= games;
        }
    }
    jobs
}

/// Play a benchmark on a rayon pool.
///
/// Contenders are resolved up front so configuration errors surface before
/// any game is played. `on_progress` receives the number of finished games
/// after every job.
pub fn benchmark_parallel<G, M, F>(
    engine: &G,
    a: Contender<'_, M>,
    b: Contender<'_, M>,
    settings: &BenchmarkSettings,
    on_progress: F,
) -> Result<BenchmarkResult, TdError>
where
    G: Engine,
    M: Evaluator,
    F: Fn(usize) + Sync,
{
    a.resolve::<G>()?;
    b.resolve::<G>()?;

    let jobs = plan_jobs(settings);
    debug!(
        "benchmark {} vs {}: {} jobs of up to {} games",
        a.strategy,
        b.strategy,
        jobs.len(),
        settings.chunk
    );

    let finished = AtomicUsize::new(0);
    let run = || {
        jobs.par_iter()
            .map(|job| -> Result<BenchmarkResult, TdError> {
                let mut playout = Playout::new(engine.clone());
                let mut policy_a = a.resolve::<G>()?;
                let mut policy_b = b.resolve::<G>()?;
                let mut rng = StdRng::seed_from_u64(job.seed);
                let result = play_games(
                    &mut playout,
                    &mut policy_a,
                    &mut policy_b,
                    job.a_first,
                    job.games,
                    None,
                    &mut rng,
                )?;
                let done = finished.fetch_add(result.games, Ordering::Relaxed) + result.games;
                on_progress(done);
                Ok(result)
            })
            .try_reduce(BenchmarkResult::default, |x, y| Ok(x.merge(y)))
    };

    match settings.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| TdError::Io(e.to_string()))?;
            pool.install(run)
        }
        None => run(),
    }
}
