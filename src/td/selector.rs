//! Move selection policies.
//!
//! A [`Strategy`] is the textual name of a policy (as found in config files
//! and on the command line). It is resolved once, together with its model
//! and exploration parameters, into a [`Policy`] that plays turns on a
//! [`Playout`].
//!
//! Every policy plays a full turn: enumerate, choose, apply, advance. An
//! empty enumeration is a pass and leaves the board untouched.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::td::config::ConfigError;
use crate::td::dice::Dice;
use crate::td::engine::{Candidate, Engine, Features};
use crate::td::error::TdError;
use crate::td::evaluator::{first_non_finite, Evaluator};
use crate::td::lookahead::lookahead_choice;
use crate::td::playout::{Playout, TurnOutcome};

/// Named move-selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Highest-valued candidate.
    Greedy,
    /// Softmax over values mixed with Dirichlet noise, early plies only.
    Noisy,
    /// Two-ply expectiminimax over the opponent's dice.
    Lookahead,
    /// Uniform over candidates.
    Random,
    /// Most points occupied after the move.
    Heuristic,
    /// An external agent picks the move.
    Human,
}

impl Strategy {
    /// Every strategy, in declaration order.
    pub const ALL: [Strategy; 6] = [
        Strategy::Greedy,
        Strategy::Noisy,
        Strategy::Lookahead,
        Strategy::Random,
        Strategy::Heuristic,
        Strategy::Human,
    ];

    /// Lower-case name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Greedy => "greedy",
            Strategy::Noisy => "noisy",
            Strategy::Lookahead => "lookahead",
            Strategy::Random => "random",
            Strategy::Heuristic => "heuristic",
            Strategy::Human => "human",
        }
    }

    /// Whether this strategy evaluates positions with a model.
    pub fn needs_model(self) -> bool {
        matches!(self, Strategy::Greedy | Strategy::Noisy | Strategy::Lookahead)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name() == lowered)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// Exploration parameters for the Noisy policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    /// Noise applies while `ply <= noisy_plies`; greedy afterwards.
    pub noisy_plies: u32,
    /// Weight of the Dirichlet noise in the mixture.
    pub eps: f64,
    /// Softmax temperature.
    pub temperature: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            noisy_plies: 24,
            eps: 0.25,
            temperature: 1.0,
        }
    }
}

/// An external decision maker, e.g. an interactive front end.
pub trait HumanAgent<B>: Send {
    /// Pick one of `candidates` for the given roll. Only called with a
    /// non-empty list.
    fn choose(&mut self, candidates: &[Candidate<B>], dice: Option<Dice>) -> usize;
}

impl<B, A: HumanAgent<B> + ?Sized> HumanAgent<B> for &mut A {
    fn choose(&mut self, candidates: &[Candidate<B>], dice: Option<Dice>) -> usize {
        (**self).choose(candidates, dice)
    }
}

/// A resolved strategy, ready to play turns.
pub enum Policy<'a, G: Engine, M: Evaluator> {
    /// See [`Strategy::Greedy`].
    Greedy(&'a M),
    /// See [`Strategy::Noisy`].
    Noisy(&'a M, NoiseParams),
    /// See [`Strategy::Lookahead`].
    Lookahead(&'a M),
    /// See [`Strategy::Random`].
    Random,
    /// See [`Strategy::Heuristic`].
    Heuristic,
    /// See [`Strategy::Human`].
    Human(Box<dyn HumanAgent<G::Board> + 'a>),
}

impl<'a, G: Engine, M: Evaluator> fmt::Debug for Policy<'a, G, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Noisy(_, noise) => write!(f, "Policy::Noisy({:?})", noise),
            other => write!(f, "Policy::{}", other.strategy()),
        }
    }
}

impl<'a, G: Engine, M: Evaluator> Policy<'a, G, M> {
    /// Bind a strategy to its model and noise parameters.
    ///
    /// Model-backed strategies without a model are rejected, as is `Human`,
    /// which needs an agent (see [`Policy::human`]).
    pub fn resolve(
        strategy: Strategy,
        model: Option<&'a M>,
        noise: NoiseParams,
    ) -> Result<Self, ConfigError> {
        let need = |model: Option<&'a M>| model.ok_or(ConfigError::MissingModel(strategy));
        Ok(match strategy {
            Strategy::Greedy => Policy::Greedy(need(model)?),
            Strategy::Noisy => Policy::Noisy(need(model)?, noise),
            Strategy::Lookahead => Policy::Lookahead(need(model)?),
            Strategy::Random => Policy::Random,
            Strategy::Heuristic => Policy::Heuristic,
            Strategy::Human => return Err(ConfigError::HumanRequiresAgent),
        })
    }

    /// Bind an external agent.
    pub fn human(agent: impl HumanAgent<G::Board> + 'a) -> Self {
        Policy::Human(Box::new(agent))
    }

    /// The strategy this policy was resolved from.
    pub fn strategy(&self) -> Strategy {
        match self {
            Policy::Greedy(_) => Strategy::Greedy,
            Policy::Noisy(..) => Strategy::Noisy,
            Policy::Lookahead(_) => Strategy::Lookahead,
            Policy::Random => Strategy::Random,
            Policy::Heuristic => Strategy::Heuristic,
            Policy::Human(_) => Strategy::Human,
        }
    }

    /// Play one turn for the side to move.
    pub fn play_turn<R: Rng>(
        &mut self,
        playout: &mut Playout<G>,
        rng: &mut R,
    ) -> Result<TurnOutcome, TdError> {
        match self {
            Policy::Greedy(model) => apply_greedy_move(playout, *model, rng),
            Policy::Noisy(model, noise) => apply_noisy_move(playout, *model, *noise, rng),
            Policy::Lookahead(model) => apply_lookahead_move(playout, *model, rng),
            Policy::Random => apply_random_move(playout, rng),
            Policy::Heuristic => apply_heuristic_move(playout, rng),
            Policy::Human(agent) => {
                let candidates = playout.engine_mut().roll_and_enumerate(rng);
                if candidates.is_empty() {
                    return playout.commit(&candidates, None);
                }
                let index = agent.choose(&candidates, playout.engine().dice());
                if index >= candidates.len() {
                    return Err(ConfigError::OutOfRange {
                        name: "human move index",
                        value: index as f64,
                    }
                    .into());
                }
                playout.commit(&candidates, Some(index))
            }
        }
    }
}

/// Evaluate candidate features, rejecting non-finite outputs.
pub fn evaluate_candidates<M: Evaluator>(
    model: &M,
    features: &[Features],
    ply: u32,
) -> Result<Vec<f32>, TdError> {
    let values = model.evaluate_batch(features);
    match first_non_finite(&values) {
        Some(i) => Err(TdError::numeric(
            0,
            0,
            ply,
            format!("candidate {} evaluated to {}", i, values[i]),
        )),
        None => Ok(values),
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax_first(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Softmax of `values / temperature` after subtracting the maximum.
pub fn softmax_priors(values: &[f32], temperature: f64) -> Vec<f64> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = values
        .iter()
        .map(|&v| ((v as f64 - max) / temperature).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Dirichlet concentration for `n` candidates: `clip(6 / n, 0.2, 0.8)`.
pub fn dirichlet_alpha(n: usize) -> f64 {
    (6.0 / n as f64).clamp(0.2, 0.8)
}

/// Mix `priors` with symmetric Dirichlet noise at weight `eps`, then
/// renormalise.
///
/// Dirichlet samples are drawn as Gamma(α, 1) variates normalised to sum to
/// one. With a single prior there is nothing to mix.
pub fn add_dirichlet_noise<R: Rng + ?Sized>(priors: &[f64], eps: f64, rng: &mut R) -> Vec<f64> {
    let n = priors.len();
    if n <= 1 {
        return priors.to_vec();
    }

    let gamma = match Gamma::new(dirichlet_alpha(n), 1.0) {
        Ok(g) => g,
        Err(_) => return priors.to_vec(),
    };
    let mut noise: Vec<f64> = (0..n).map(|_| gamma.sample(rng)).collect();
    let noise_sum: f64 = noise.iter().sum();
    if noise_sum > 0.0 {
        noise.iter_mut().for_each(|x| *x /= noise_sum);
    } else {
        noise.iter_mut().for_each(|x| *x = 1.0 / n as f64);
    }

    let mut mixed: Vec<f64> = priors
        .iter()
        .zip(&noise)
        .map(|(&p, &eta)| (1.0 - eps) * p + eps * eta)
        .collect();
    let total: f64 = mixed.iter().sum();
    mixed.iter_mut().for_each(|p| *p /= total);
    mixed
}

/// Sample an index from a probability distribution.
pub fn sample_index<R: Rng + ?Sized>(distribution: &[f64], rng: &mut R) -> usize {
    let r: f64 = rng.gen();
    let mut cumsum = 0.0;
    for (i, &p) in distribution.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return i;
        }
    }
    // Rounding can leave the total a hair under 1.
    distribution.len() - 1
}

fn candidate_features<B>(candidates: &[Candidate<B>]) -> Vec<Features> {
    candidates.iter().map(|c| c.features.clone()).collect()
}

/// Roll and play the highest-valued candidate.
pub fn apply_greedy_move<G: Engine, M: Evaluator, R: Rng>(
    playout: &mut Playout<G>,
    model: &M,
    rng: &mut R,
) -> Result<TurnOutcome, TdError> {
    let candidates = playout.engine_mut().roll_and_enumerate(rng);
    if candidates.is_empty() {
        return playout.commit(&candidates, None);
    }
    let values = evaluate_candidates(model, &candidate_features(&candidates), playout.ply())?;
    let chosen = argmax_first(&values);
    playout.commit(&candidates, chosen)
}

/// Roll and sample from the noisy value distribution while `ply <= K`;
/// play greedily afterwards.
pub fn apply_noisy_move<G: Engine, M: Evaluator, R: Rng>(
    playout: &mut Playout<G>,
    model: &M,
    noise: NoiseParams,
    rng: &mut R,
) -> Result<TurnOutcome, TdError> {
    if playout.ply() > noise.noisy_plies {
        return apply_greedy_move(playout, model, rng);
    }

    let candidates = playout.engine_mut().roll_and_enumerate(rng);
    let chosen = match candidates.len() {
        0 => None,
        1 => Some(0),
        _ => {
            let values =
                evaluate_candidates(model, &candidate_features(&candidates), playout.ply())?;
            let priors = softmax_priors(&values, noise.temperature);
            let mixed = add_dirichlet_noise(&priors, noise.eps, rng);
            Some(sample_index(&mixed, rng))
        }
    };
    playout.commit(&candidates, chosen)
}

/// Roll and play the two-ply expectiminimax choice.
pub fn apply_lookahead_move<G: Engine, M: Evaluator, R: Rng>(
    playout: &mut Playout<G>,
    model: &M,
    rng: &mut R,
) -> Result<TurnOutcome, TdError> {
    let candidates = playout.engine_mut().roll_and_enumerate(rng);
    if candidates.is_empty() {
        return playout.commit(&candidates, None);
    }
    let chosen = lookahead_choice(playout.engine(), &candidates, model, playout.ply())?;
    playout.commit(&candidates, Some(chosen))
}

/// Roll and play a uniformly random candidate.
pub fn apply_random_move<G: Engine, R: Rng>(
    playout: &mut Playout<G>,
    rng: &mut R,
) -> Result<TurnOutcome, TdError> {
    let candidates = playout.engine_mut().roll_and_enumerate(rng);
    let chosen = (!candidates.is_empty()).then(|| rng.gen_range(0..candidates.len()));
    playout.commit(&candidates, chosen)
}

/// Roll and play the candidate with the best heuristic score.
pub fn apply_heuristic_move<G: Engine, R: Rng>(
    playout: &mut Playout<G>,
    rng: &mut R,
) -> Result<TurnOutcome, TdError> {
    let candidates = playout.engine_mut().roll_and_enumerate(rng);
    let engine = playout.engine();
    let scores: Vec<f32> = candidates
        .iter()
        .map(|c| engine.heuristic_score(c) as f32)
        .collect();
    let chosen = argmax_first(&scores);
    playout.commit(&candidates, chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::td::testing::{ConstantEvaluator, CountingEvaluator, ScriptedEngine};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("greedy".parse::<Strategy>().unwrap(), Strategy::Greedy);
        assert_eq!("Lookahead".parse::<Strategy>().unwrap(), Strategy::Lookahead);
        assert_eq!(
            "minimax".parse::<Strategy>(),
            Err(ConfigError::UnknownStrategy("minimax".to_string()))
        );
        for s in Strategy::ALL {
            assert_eq!(s.to_string().parse::<Strategy>().unwrap(), s);
        }
    }

    #[test]
    fn test_resolve_requires_model() {
        let err = Policy::<ScriptedEngine, ConstantEvaluator>::resolve(
            Strategy::Greedy,
            None,
            NoiseParams::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingModel(Strategy::Greedy));

        let err = Policy::<ScriptedEngine, ConstantEvaluator>::resolve(
            Strategy::Human,
            None,
            NoiseParams::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::HumanRequiresAgent);

        let policy = Policy::<ScriptedEngine, ConstantEvaluator>::resolve(
            Strategy::Heuristic,
            None,
            NoiseParams::default(),
        )
        .unwrap();
        assert_eq!(policy.strategy(), Strategy::Heuristic);
    }

    #[test]
    fn test_argmax_first_breaks_ties_by_order() {
        assert_eq!(argmax_first(&[0.5, 0.9, 0.9, 0.1]), Some(1));
        assert_eq!(argmax_first(&[0.0, 0.0]), Some(0));
        assert_eq!(argmax_first(&[]), None);
    }

    #[test]
    fn test_dirichlet_mixture_is_a_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [2usize, 5, 30, 120] {
            let values: Vec<f32> = (0..n).map(|i| (i as f32 * 0.37).sin()).collect();
            let priors = softmax_priors(&values, 0.5);
            let mixed = add_dirichlet_noise(&priors, 0.25, &mut rng);
            assert_eq!(mixed.len(), n);
            assert!(mixed.iter().all(|&p| p >= 0.0));
            assert!((mixed.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dirichlet_alpha_is_clipped() {
        assert_eq!(dirichlet_alpha(2), 0.8);
        assert!((dirichlet_alpha(10) - 0.6).abs() < 1e-12);
        assert_eq!(dirichlet_alpha(100), 0.2);
    }

    #[test]
    fn test_softmax_with_zero_noise_keeps_priors() {
        let mut rng = StdRng::seed_from_u64(1);
        let priors = softmax_priors(&[1.0, 0.0], 1.0);
        let mixed = add_dirichlet_noise(&priors, 0.0, &mut rng);
        for (a, b) in priors.iter().zip(&mixed) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(priors[0] > priors[1]);
    }

    #[test]
    fn test_single_candidate_noisy_move_skips_evaluation() {
        let engine = ScriptedEngine::single_move_per_turn();
        let mut playout = Playout::new(engine);
        playout.reset(None);
        let model = CountingEvaluator::default();
        let mut rng = StdRng::seed_from_u64(3);

        let outcome =
            apply_noisy_move(&mut playout, &model, NoiseParams::default(), &mut rng).unwrap();
        assert_eq!(outcome, TurnOutcome::Moved { index: 0, candidates: 1 });
        assert_eq!(model.calls(), 0);
        assert_eq!(playout.ply(), 1);
        assert_eq!(playout.sign(), -1);
    }

    #[test]
    fn test_pass_leaves_board_and_advances() {
        let engine = ScriptedEngine::passing();
        let mut playout = Playout::new(engine);
        playout.reset(None);
        let before = playout.engine().board().clone();
        let model = ConstantEvaluator(0.0);
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = apply_greedy_move(&mut playout, &model, &mut rng).unwrap();
        assert_eq!(outcome, TurnOutcome::Passed);
        assert_eq!(playout.engine().board(), &before);
        assert_eq!(playout.sign(), -1);
    }

    #[test]
    fn test_non_finite_value_is_reported() {
        let engine = ScriptedEngine::branching(3);
        let mut playout = Playout::new(engine);
        playout.reset(None);
        let model = ConstantEvaluator(f32::NAN);
        let mut rng = StdRng::seed_from_u64(3);

        let err = apply_greedy_move(&mut playout, &model, &mut rng).unwrap_err();
        assert!(matches!(err, TdError::NumericInstability { ply: 0, .. }));
    }

    /// Always answers with the same index and remembers what it was shown.
    struct FixedChoice {
        index: usize,
        seen: Option<(usize, Option<Dice>)>,
    }

    impl HumanAgent<(u32, usize)> for FixedChoice {
        fn choose(&mut self, candidates: &[Candidate<(u32, usize)>], dice: Option<Dice>) -> usize {
            self.seen = Some((candidates.len(), dice));
            self.index
        }
    }

    #[test]
    fn test_human_choice_is_applied() {
        let mut playout = Playout::new(ScriptedEngine::branching(3));
        playout.reset(None);
        let mut rng = StdRng::seed_from_u64(5);
        let mut policy: Policy<'_, ScriptedEngine, ConstantEvaluator> =
            Policy::human(FixedChoice { index: 2, seen: None });
        assert_eq!(policy.strategy(), Strategy::Human);

        let outcome = policy.play_turn(&mut playout, &mut rng).unwrap();
        assert_eq!(outcome, TurnOutcome::Moved { index: 2, candidates: 3 });
        assert_eq!(playout.engine().board(), &(1, 2));
        assert_eq!(playout.sign(), -1);
    }

    #[test]
    fn test_human_sees_the_roll() {
        let mut playout = Playout::new(ScriptedEngine::branching(4));
        playout.reset(None);
        let mut rng = StdRng::seed_from_u64(6);
        let mut agent = FixedChoice { index: 0, seen: None };
        {
            let mut policy: Policy<'_, ScriptedEngine, ConstantEvaluator> =
                Policy::human(&mut agent);
            policy.play_turn(&mut playout, &mut rng).unwrap();
        }
        let (count, dice) = agent.seen.unwrap();
        assert_eq!(count, 4);
        assert_eq!(dice, playout.engine().dice());
        assert!(dice.is_some());
    }

    #[test]
    fn test_human_index_out_of_range_is_rejected() {
        let mut playout = Playout::new(ScriptedEngine::branching(3));
        playout.reset(None);
        let mut rng = StdRng::seed_from_u64(5);
        let mut policy: Policy<'_, ScriptedEngine, ConstantEvaluator> =
            Policy::human(FixedChoice { index: 7, seen: None });

        let err = policy.play_turn(&mut playout, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            TdError::Config(ConfigError::OutOfRange { name: "human move index", .. })
        ));
        assert_eq!(playout.engine().board(), &(0, 0));
        assert_eq!(playout.ply(), 0);
    }

    #[test]
    fn test_sample_index_follows_distribution() {
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(sample_index(&[0.0, 1.0, 0.0], &mut rng), 1);
        let mut hits = [0usize; 2];
        for _ in 0..10_000 {
            hits[sample_index(&[0.25, 0.75], &mut rng)] += 1;
        }
        assert!(hits[1] > hits[0] * 2);
    }
}
