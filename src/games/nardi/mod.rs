//! Long Nardi rules engine.
//!
//! [`NardiEngine`] implements [`Engine`] for the trainer and selectors.
//! Candidates carry features from the mover's side; the reply table for
//! lookahead is built per child on the rayon pool.

pub mod board;
pub mod movegen;

pub use board::{NardiBoard, BLACK, CHECKERS, HOME_START, NARDI_FEATURES, POINTS, WHITE};
pub use movegen::legal_boards;

use log::trace;
use rand::Rng;
use rayon::prelude::*;

use crate::td::dice::{Dice, DiceBucket, NUM_DICE_BUCKETS};
use crate::td::engine::{Candidate, Engine, Features, Grandchildren};
use crate::td::error::ContractViolation;

use board::opponent;

/// Game state: board, side to move, current roll and enumeration stamp.
#[derive(Debug, Clone)]
pub struct NardiEngine {
    board: NardiBoard,
    to_move: usize,
    dice: Option<Dice>,
    stamp: u64,
}

impl Default for NardiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NardiEngine {
    /// Standard starting position, White to move.
    pub fn new() -> Self {
        Self {
            board: NardiBoard::standard(),
            to_move: WHITE,
            dice: None,
            stamp: 0,
        }
    }

    /// Player to move.
    pub fn to_move(&self) -> usize {
        self.to_move
    }

    fn enumerate(&mut self, dice: Dice) -> Vec<Candidate<NardiBoard>> {
        self.dice = Some(dice);
        self.stamp += 1;
        let mover = self.to_move;
        let boards = legal_boards(&self.board, mover, dice);
        if boards.is_empty() {
            trace!("player {} cannot move with {:?}, passing", mover, dice);
            self.to_move = opponent(mover);
            return Vec::new();
        }
        let stamp = self.stamp;
        boards
            .into_iter()
            .map(|board| candidate(board, mover, stamp))
            .collect()
    }
}

fn candidate(board: NardiBoard, mover: usize, stamp: u64) -> Candidate<NardiBoard> {
    let win = board.has_won(mover).then(|| board.margin_for(mover));
    Candidate {
        features: board.features(mover),
        win,
        board,
        stamp,
    }
}

/// Replies of `replier` to one child, bucket by bucket.
struct ReplyRow {
    features: Vec<Features>,
    counts: [usize; NUM_DICE_BUCKETS],
    wins: [u8; NUM_DICE_BUCKETS],
}

fn reply_row(board: &NardiBoard, replier: usize) -> ReplyRow {
    let mut row = ReplyRow {
        features: Vec::new(),
        counts: [0; NUM_DICE_BUCKETS],
        wins: [0; NUM_DICE_BUCKETS],
    };
    if board.has_won(opponent(replier)) {
        return row;
    }
    for bucket in DiceBucket::all() {
        let b = bucket.index();
        let replies = legal_boards(board, replier, bucket.dice());
        let best_win = replies
            .iter()
            .filter(|r| r.has_won(replier))
            .map(|r| r.margin_for(replier))
            .max();
        match best_win {
            Some(margin) => row.wins[b] = margin,
            None => {
                row.counts[b] = replies.len();
                row.features
                    .extend(replies.iter().map(|r| r.features(replier)));
            }
        }
    }
    row
}

impl Engine for NardiEngine {
    type Board = NardiBoard;

    fn reset(&mut self, setup: Option<&NardiBoard>) {
        self.board = setup.cloned().unwrap_or_default();
        self.to_move = WHITE;
        self.dice = None;
        self.stamp += 1;
    }

    fn roll_and_enumerate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Candidate<NardiBoard>> {
        let dice = (rng.gen_range(1..=6), rng.gen_range(1..=6));
        self.enumerate(dice)
    }

    fn set_and_enumerate(&mut self, dice: Dice) -> Vec<Candidate<NardiBoard>> {
        self.enumerate(dice)
    }

    fn apply(&mut self, candidate: &Candidate<NardiBoard>) -> Result<(), ContractViolation> {
        if candidate.stamp != self.stamp {
            return Err(ContractViolation::StaleCandidate {
                expected: self.stamp,
                got: candidate.stamp,
            });
        }
        self.board = candidate.board.clone();
        self.to_move = opponent(self.to_move);
        self.stamp += 1;
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.board.has_won(WHITE) || self.board.has_won(BLACK)
    }

    fn winner_result(&self) -> Result<u8, ContractViolation> {
        [WHITE, BLACK]
            .into_iter()
            .find(|&p| self.board.has_won(p))
            .map(|p| self.board.margin_for(p))
            .ok_or(ContractViolation::NotTerminal)
    }

    fn board_features(&self) -> Features {
        self.board.features(self.to_move)
    }

    fn dice(&self) -> Option<Dice> {
        self.dice
    }

    fn board(&self) -> &NardiBoard {
        &self.board
    }

    fn children_to_grandchildren(
        &self,
        children: &[Candidate<NardiBoard>],
    ) -> Result<Grandchildren, ContractViolation> {
        let replier = opponent(self.to_move);
        let rows: Vec<ReplyRow> = children
            .par_iter()
            .map(|child| reply_row(&child.board, replier))
            .collect();

        let mut table = Grandchildren {
            features: Vec::new(),
            counts: Vec::with_capacity(rows.len()),
            wins: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.features.extend(row.features);
            table.counts.push(row.counts);
            table.wins.push(row.wins);
        }
        table.validate()?;
        Ok(table)
    }

    /// Number of points the mover occupies after the move.
    fn heuristic_score(&self, candidate: &Candidate<NardiBoard>) -> f64 {
        candidate.board.occupied(self.to_move) as f64
    }
}
