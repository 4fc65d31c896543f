//! End-of-turn enumeration for Long Nardi.
//!
//! A turn is searched depth first over single-checker moves. Only the
//! resulting boards are kept, deduplicated in first-seen order. A player
//! must use as many dice as possible, and the larger die when only one of
//! two can be used.
//!
//! Rules enforced per checker move:
//! - no landing on a point held by the opponent;
//! - at most one checker leaves the head per turn, two on the opening roll
//!   of 6-6, 4-4 or 3-3;
//! - bearing off only once every checker is home, with an exact die or a
//!   larger die for the rearmost checker;
//! - no run of six own points unless an opponent checker is already past it.

use rustc_hash::FxHashSet;

use crate::games::nardi::board::{opponent, NardiBoard, CHECKERS, HOME_START, POINTS};
use crate::td::dice::Dice;

/// Checkers allowed to leave the head this turn.
pub fn head_limit(board: &NardiBoard, player: usize, dice: Dice) -> u8 {
    let opening = board.count(player, 0) == CHECKERS;
    if opening && dice.0 == dice.1 && matches!(dice.0, 3 | 4 | 6) {
        2
    } else {
        1
    }
}

/// Destination of moving one checker from `from` by `die`, if legal before
/// the block check. `POINTS` means borne off.
pub fn single_move(
    board: &NardiBoard,
    player: usize,
    from: usize,
    die: u8,
    head_moves: u8,
    head_limit: u8,
) -> Option<usize> {
    if board.count(player, from) == 0 {
        return None;
    }
    if from == 0 && head_moves >= head_limit {
        return None;
    }

    let to = from + die as usize;
    if to < POINTS {
        return (!board.blocked_for(player, to)).then_some(to);
    }

    if !board.all_home(player) {
        return None;
    }
    if to > POINTS && (HOME_START..from).any(|r| board.count(player, r) > 0) {
        return None;
    }
    Some(POINTS)
}

/// Whether `player`'s checker landing on `landed` completes a six-point run
/// that no opponent checker has passed.
pub fn creates_illegal_block(board: &NardiBoard, player: usize, landed: usize) -> bool {
    let lowest = landed.saturating_sub(5);
    let highest = landed.min(POINTS - 6);
    (lowest..=highest).any(|start| {
        (start..start + 6).all(|r| board.count(player, r) > 0) && !block_is_passed(board, player, start)
    })
}

/// A block on `player`'s points `start..start + 6` is allowed when an
/// opponent checker is already beyond it in the opponent's own direction.
fn block_is_passed(board: &NardiBoard, player: usize, start: usize) -> bool {
    let their_start = (start + 12) % POINTS;
    let their_end = their_start + 5;
    if their_end >= POINTS {
        // Straddles the opponent's route start; nothing can be trapped behind it.
        return true;
    }
    let them = opponent(player);
    (their_end + 1..POINTS).any(|r| board.count(them, r) > 0)
}

fn dice_moves(dice: Dice) -> Vec<u8> {
    if dice.0 == dice.1 {
        vec![dice.0; 4]
    } else {
        vec![dice.0, dice.1]
    }
}

struct Leaf {
    board: NardiBoard,
    used: usize,
    larger_used: bool,
}

struct TurnSearch {
    player: usize,
    head_limit: u8,
    larger_die: u8,
    total_moves: usize,
    visited: FxHashSet<(NardiBoard, Vec<u8>, u8)>,
    leaves: Vec<Leaf>,
}

impl TurnSearch {
    fn search(
        &mut self,
        board: &NardiBoard,
        remaining: &[u8],
        head_moves: u8,
        used: usize,
        larger_used: bool,
    ) {
        if !self.visited.insert((board.clone(), remaining.to_vec(), head_moves)) {
            return;
        }

        let mut moved = false;
        let mut tried = [false; 7];
        for (i, &die) in remaining.iter().enumerate() {
            if std::mem::replace(&mut tried[die as usize], true) {
                continue;
            }
            let rest: Vec<u8> = remaining
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &d)| d)
                .collect();

            for from in 0..POINTS {
                let Some(to) =
                    single_move(board, self.player, from, die, head_moves, self.head_limit)
                else {
                    continue;
                };
                let mut next = board.clone();
                next.shift(self.player, from, to);
                if to < POINTS && creates_illegal_block(&next, self.player, to) {
                    continue;
                }
                moved = true;
                self.search(
                    &next,
                    &rest,
                    head_moves + u8::from(from == 0),
                    used + 1,
                    larger_used || die == self.larger_die,
                );
            }
        }

        if !moved {
            // Bearing off the last checker ends the turn with every die
            // accounted for.
            let used = if board.has_won(self.player) {
                self.total_moves
            } else {
                used
            };
            self.leaves.push(Leaf {
                board: board.clone(),
                used,
                larger_used,
            });
        }
    }
}

/// Every distinct board `player` can reach with `dice`, in deterministic
/// first-seen order. Empty when no checker can move.
pub fn legal_boards(board: &NardiBoard, player: usize, dice: Dice) -> Vec<NardiBoard> {
    let moves = dice_moves(dice);
    let mut search = TurnSearch {
        player,
        head_limit: head_limit(board, player, dice),
        larger_die: dice.0.max(dice.1),
        total_moves: moves.len(),
        visited: FxHashSet::default(),
        leaves: Vec::new(),
    };
    search.search(board, &moves, 0, 0, false);

    let leaves = search.leaves;
    let max_used = leaves.iter().map(|l| l.used).max().unwrap_or(0);
    if max_used == 0 {
        return Vec::new();
    }
    let need_larger =
        max_used == 1 && dice.0 != dice.1 && leaves.iter().any(|l| l.used == 1 && l.larger_used);

    let mut seen = FxHashSet::default();
    leaves
        .into_iter()
        .filter(|l| l.used == max_used && (!need_larger || l.larger_used))
        .map(|l| l.board)
        .filter(|b| seen.insert(b.clone()))
        .collect()
}
