//! Test doubles for the engine and evaluator traits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::td::dice::{Dice, NUM_DICE_BUCKETS};
use crate::td::engine::{Candidate, Engine, Features, Grandchildren};
use crate::td::error::ContractViolation;
use crate::td::evaluator::Evaluator;

/// Always returns the same value with a zero gradient.
#[derive(Debug, Clone, Copy)]
pub struct ConstantEvaluator(pub f32);

impl Evaluator for ConstantEvaluator {
    fn num_params(&self) -> usize {
        0
    }

    fn evaluate(&self, _features: &[f32]) -> f32 {
        self.0
    }

    fn evaluate_with_grad(&self, _features: &[f32], _grad: &mut [f32]) -> f32 {
        self.0
    }

    fn params(&self) -> &[f32] {
        &[]
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut []
    }
}

/// Zero-valued evaluator that counts how many positions it was asked about.
#[derive(Debug, Clone, Default)]
pub struct CountingEvaluator {
    calls: Arc<AtomicUsize>,
}

impl CountingEvaluator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Evaluator for CountingEvaluator {
    fn num_params(&self) -> usize {
        0
    }

    fn evaluate(&self, _features: &[f32]) -> f32 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        0.0
    }

    fn evaluate_with_grad(&self, features: &[f32], _grad: &mut [f32]) -> f32 {
        self.evaluate(features)
    }

    fn params(&self) -> &[f32] {
        &[]
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut []
    }
}

/// `w · x`, whose gradient is simply `x`.
#[derive(Debug, Clone)]
pub struct LinearEvaluator {
    pub weights: Vec<f32>,
}

impl LinearEvaluator {
    pub fn new(weights: Vec<f32>) -> Self {
        Self { weights }
    }
}

impl Evaluator for LinearEvaluator {
    fn num_params(&self) -> usize {
        self.weights.len()
    }

    fn evaluate(&self, features: &[f32]) -> f32 {
        self.weights.iter().zip(features).map(|(w, x)| w * x).sum()
    }

    fn evaluate_with_grad(&self, features: &[f32], grad: &mut [f32]) -> f32 {
        for (g, &x) in grad.iter_mut().zip(features) {
            *g = x;
        }
        self.evaluate(features)
    }

    fn params(&self) -> &[f32] {
        &self.weights
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }
}

/// A toy engine with a fixed branching factor and game length.
///
/// The board is `(moves_played, last_choice)`. Candidate `i` of a turn has
/// features `[1.0, i as f32]`. The game ends once `length` moves have been
/// applied; the final move wins by `margin`. Candidate lists and reply
/// tables can be overridden for selector tests.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    branching: usize,
    length: u32,
    margin: u8,
    board: (u32, usize),
    stamp: u64,
    dice: Option<Dice>,
    scripted_children: Option<Vec<(Features, Option<u8>)>>,
    scripted_replies: Option<Grandchildren>,
}

impl ScriptedEngine {
    pub fn new(branching: usize, length: u32, margin: u8) -> Self {
        Self {
            branching,
            length,
            margin,
            board: (0, 0),
            stamp: 0,
            dice: None,
            scripted_children: None,
            scripted_replies: None,
        }
    }

    pub fn single_move_per_turn() -> Self {
        Self::new(1, 1_000, 1)
    }

    pub fn passing() -> Self {
        Self::new(0, 1_000, 1)
    }

    pub fn branching(n: usize) -> Self {
        Self::new(n, 1_000, 1)
    }

    /// Every turn offers exactly these candidates.
    pub fn with_children(mut self, children: Vec<(Features, Option<u8>)>) -> Self {
        self.branching = children.len();
        self.scripted_children = Some(children);
        self
    }

    /// `children_to_grandchildren` returns this table verbatim.
    pub fn with_replies(mut self, replies: Grandchildren) -> Self {
        self.scripted_replies = Some(replies);
        self
    }

    fn enumerate(&mut self, dice: Dice) -> Vec<Candidate<(u32, usize)>> {
        self.dice = Some(dice);
        self.stamp += 1;
        let depth = self.board.0 + 1;
        (0..self.branching)
            .map(|i| {
                let (features, win) = match &self.scripted_children {
                    Some(children) => children[i].clone(),
                    None => (
                        vec![1.0, i as f32],
                        (depth >= self.length).then_some(self.margin),
                    ),
                };
                Candidate {
                    board: (depth, i),
                    features,
                    win,
                    stamp: self.stamp,
                }
            })
            .collect()
    }
}

impl Engine for ScriptedEngine {
    type Board = (u32, usize);

    fn reset(&mut self, setup: Option<&Self::Board>) {
        self.board = setup.copied().unwrap_or((0, 0));
        self.dice = None;
        self.stamp += 1;
    }

    fn roll_and_enumerate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Candidate<Self::Board>> {
        let dice = (rng.gen_range(1..=6), rng.gen_range(1..=6));
        self.enumerate(dice)
    }

    fn set_and_enumerate(&mut self, dice: Dice) -> Vec<Candidate<Self::Board>> {
        self.enumerate(dice)
    }

    fn apply(&mut self, candidate: &Candidate<Self::Board>) -> Result<(), ContractViolation> {
        if candidate.stamp != self.stamp {
            return Err(ContractViolation::StaleCandidate {
                expected: self.stamp,
                got: candidate.stamp,
            });
        }
        self.board = candidate.board;
        self.stamp += 1;
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.board.0 >= self.length
    }

    fn winner_result(&self) -> Result<u8, ContractViolation> {
        if self.is_terminal() {
            Ok(self.margin)
        } else {
            Err(ContractViolation::NotTerminal)
        }
    }

    fn board_features(&self) -> Features {
        vec![1.0, self.board.1 as f32]
    }

    fn dice(&self) -> Option<Dice> {
        self.dice
    }

    fn board(&self) -> &Self::Board {
        &self.board
    }

    fn children_to_grandchildren(
        &self,
        children: &[Candidate<Self::Board>],
    ) -> Result<Grandchildren, ContractViolation> {
        if let Some(table) = &self.scripted_replies {
            return Ok(table.clone());
        }
        Ok(Grandchildren {
            features: Vec::new(),
            counts: vec![[0; NUM_DICE_BUCKETS]; children.len()],
            wins: vec![[0; NUM_DICE_BUCKETS]; children.len()],
        })
    }

    fn heuristic_score(&self, candidate: &Candidate<Self::Board>) -> f64 {
        candidate.board.1 as f64
    }
}
