//! Engine trait: the board/rules collaborator consumed by the training core.
//!
//! Any game that implements `Engine` can be trained and played by the TD
//! trainer and the move selectors. The trait keeps the core independent of
//! board representation and rules.

use std::fmt::Debug;
use std::hash::Hash;

use rand::Rng;

use crate::td::dice::{Dice, DiceBucket, NUM_DICE_BUCKETS};
use crate::td::error::ContractViolation;

/// Network input for one position.
pub type Features = Vec<f32>;

/// A reachable end-of-turn position produced by an enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<B> {
    /// The board after the move.
    pub board: B,
    /// Features of `board`, encoded from the perspective of the player who
    /// made the move.
    pub features: Features,
    /// `Some(margin)` when this move ends the game in the mover's favour.
    pub win: Option<u8>,
    /// Enumeration this candidate belongs to. `apply` rejects any other.
    pub stamp: u64,
}

impl<B> Candidate<B> {
    /// Whether playing this candidate wins immediately.
    pub fn is_win(&self) -> bool {
        self.win.is_some()
    }
}

/// Opponent replies to a set of first-ply children, grouped by dice bucket.
///
/// `features` is flattened child-major, then bucket-major, so the replies of
/// child `c` under bucket `b` are a contiguous run of `counts[c][b]` entries.
/// A non-zero `wins[c][b]` is the margin of an immediate opponent win under
/// that bucket, in which case `counts[c][b]` is zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grandchildren {
    /// Reply features from the replying player's perspective.
    pub features: Vec<Features>,
    /// Ordinary reply counts per child per bucket.
    pub counts: Vec<[usize; NUM_DICE_BUCKETS]>,
    /// Immediate-win margins per child per bucket (0 = no forced win).
    pub wins: Vec<[u8; NUM_DICE_BUCKETS]>,
}

impl Grandchildren {
    /// Check the mutual-exclusivity and length invariants.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        let mut counted = 0;
        for (child, (counts, wins)) in self.counts.iter().zip(self.wins.iter()).enumerate() {
            for bucket in DiceBucket::all() {
                let b = bucket.index();
                if wins[b] != 0 && counts[b] != 0 {
                    return Err(ContractViolation::WinWithReplies {
                        child,
                        bucket,
                        replies: counts[b],
                    });
                }
                counted += counts[b];
            }
        }
        if counted != self.features.len() {
            return Err(ContractViolation::ReplyCountMismatch {
                counted,
                features: self.features.len(),
            });
        }
        Ok(())
    }
}

/// The rules engine for a two-player dice game.
///
/// # Turn hand-over
/// `apply` passes the move to the opponent. When an enumeration returns an
/// empty list the side to move has no legal move; the engine has already
/// handed the turn over, and the caller only advances its own turn state.
///
/// # Example
/// ```ignore
/// impl Engine for MyGame {
///     type Board = MyBoard;
///     // ... implement required methods
/// }
/// ```
pub trait Engine: Clone + Send + Sync {
    /// Full board representation, comparable and hashable for deduplication.
    type Board: Clone + Eq + Hash + Debug + Send + Sync;

    /// Start a new game from the standard position, or from `setup` with the
    /// first player to move.
    fn reset(&mut self, setup: Option<&Self::Board>);

    /// Roll the dice and list every distinct end-of-turn position.
    ///
    /// The order is deterministic for a given position and roll.
    fn roll_and_enumerate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Candidate<Self::Board>>;

    /// Like `roll_and_enumerate` but with the given dice.
    fn set_and_enumerate(&mut self, dice: Dice) -> Vec<Candidate<Self::Board>>;

    /// Play a candidate from the immediately preceding enumeration.
    fn apply(&mut self, candidate: &Candidate<Self::Board>) -> Result<(), ContractViolation>;

    /// Whether the game is over.
    fn is_terminal(&self) -> bool;

    /// Winning margin (1 for a plain win, 2 for a mars). Only valid once
    /// terminal.
    fn winner_result(&self) -> Result<u8, ContractViolation>;

    /// Features of the current position from the side to move's perspective.
    fn board_features(&self) -> Features;

    /// Dice of the current turn, if rolled.
    fn dice(&self) -> Option<Dice>;

    /// Current board.
    fn board(&self) -> &Self::Board;

    /// Bucket of the current roll.
    fn dice_as_idx(&self) -> Option<DiceBucket> {
        self.dice().map(DiceBucket::from_dice)
    }

    /// Canonical roll for a bucket.
    fn flat_to_dice(&self, bucket: DiceBucket) -> Dice {
        bucket.dice()
    }

    /// For each child, enumerate the opponent's replies under every bucket.
    ///
    /// The engine state is not modified.
    fn children_to_grandchildren(
        &self,
        children: &[Candidate<Self::Board>],
    ) -> Result<Grandchildren, ContractViolation>;

    /// Cheap positional score used by the heuristic baseline. Higher is
    /// better for the player who made the move.
    fn heuristic_score(&self, candidate: &Candidate<Self::Board>) -> f64;
}
