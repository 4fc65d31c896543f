//! Playout driver: turn bookkeeping for one game.
//!
//! The driver owns the engine together with the turn sign (+1 for the first
//! player, -1 for the second) and the ply counter. Every turn, played or
//! passed, flips the sign and increments the ply, so after `n` plies the
//! sign is `(-1)^n` relative to the first mover.

use rand::Rng;

use crate::td::engine::{Candidate, Engine};
use crate::td::error::TdError;
use crate::td::evaluator::Evaluator;
use crate::td::selector::Policy;

/// What happened on one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A candidate was applied.
    Moved {
        /// Index of the applied candidate in enumeration order.
        index: usize,
        /// Number of candidates that were available.
        candidates: usize,
    },
    /// No legal move; the turn passed without touching the board.
    Passed,
}

/// Result of one complete game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRecord {
    /// Whether the policy seated first won.
    pub first_won: bool,
    /// Winning margin (1 or 2).
    pub margin: u8,
    /// Plies played, including passes.
    pub plies: u32,
}

/// Engine plus turn state for one game at a time.
#[derive(Debug, Clone)]
pub struct Playout<G: Engine> {
    engine: G,
    sign: i8,
    ply: u32,
}

impl<G: Engine> Playout<G> {
    /// Wrap an engine. Call `reset` before playing.
    pub fn new(engine: G) -> Self {
        Self {
            engine,
            sign: 1,
            ply: 0,
        }
    }

    /// Start a new game from the standard position or `setup`.
    pub fn reset(&mut self, setup: Option<&G::Board>) {
        self.engine.reset(setup);
        self.sign = 1;
        self.ply = 0;
    }

    /// Flip the side to move and count the ply.
    pub fn advance_turn(&mut self) {
        self.sign = -self.sign;
        self.ply += 1;
    }

    /// +1 when the first player is to move, -1 otherwise.
    pub fn sign(&self) -> i8 {
        self.sign
    }

    /// Plies played so far in this game.
    pub fn ply(&self) -> u32 {
        self.ply
    }

    /// The engine.
    pub fn engine(&self) -> &G {
        &self.engine
    }

    /// Mutable engine access for enumeration.
    pub fn engine_mut(&mut self) -> &mut G {
        &mut self.engine
    }

    /// Whether the game is over.
    pub fn is_terminal(&self) -> bool {
        self.engine.is_terminal()
    }

    /// Apply the chosen candidate (or pass when `chosen` is `None`) and
    /// advance the turn.
    pub fn commit(
        &mut self,
        candidates: &[Candidate<G::Board>],
        chosen: Option<usize>,
    ) -> Result<TurnOutcome, TdError> {
        let outcome = match chosen {
            Some(index) => {
                self.engine.apply(&candidates[index])?;
                TurnOutcome::Moved {
                    index,
                    candidates: candidates.len(),
                }
            }
            None => TurnOutcome::Passed,
        };
        self.advance_turn();
        Ok(outcome)
    }

    /// Sign of the player who won, valid once terminal.
    ///
    /// The winning move has already advanced the turn, so the winner is the
    /// side that is *not* to move.
    pub fn winner_sign(&self) -> i8 {
        -self.sign
    }

    /// Play one full game between two policies.
    ///
    /// `first` moves when the sign is +1. The loop runs until the engine
    /// reports termination.
    pub fn play_game<M: Evaluator, R: Rng>(
        &mut self,
        first: &mut Policy<'_, G, M>,
        second: &mut Policy<'_, G, M>,
        setup: Option<&G::Board>,
        rng: &mut R,
    ) -> Result<GameRecord, TdError> {
        self.reset(setup);

        while !self.is_terminal() {
            if self.sign == 1 {
                first.play_turn(self, rng)?;
            } else {
                second.play_turn(self, rng)?;
            }
        }

        Ok(GameRecord {
            first_won: self.winner_sign() == 1,
            margin: self.engine.winner_result()?,
            plies: self.ply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::td::testing::{ConstantEvaluator, ScriptedEngine};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type P<'a> = Policy<'a, ScriptedEngine, ConstantEvaluator>;

    #[test]
    fn test_sign_alternates_across_passes() {
        let mut playout = Playout::new(ScriptedEngine::passing());
        let mut rng = StdRng::seed_from_u64(5);
        let mut policy: P<'_> = Policy::Random;
        playout.reset(None);

        for ply in 1..=5u32 {
            let outcome = policy.play_turn(&mut playout, &mut rng).unwrap();
            assert_eq!(outcome, TurnOutcome::Passed);
            assert_eq!(playout.ply(), ply);
            assert_eq!(playout.sign(), if ply % 2 == 0 { 1 } else { -1 });
        }
        assert_eq!(playout.engine().board(), &(0, 0));
    }

    #[test]
    fn test_commit_reports_the_move() {
        let mut playout = Playout::new(ScriptedEngine::branching(3));
        playout.reset(None);
        let candidates = playout.engine_mut().set_and_enumerate((2, 5));
        let outcome = playout.commit(&candidates, Some(2)).unwrap();
        assert_eq!(outcome, TurnOutcome::Moved { index: 2, candidates: 3 });
        assert_eq!(playout.sign(), -1);
        assert_eq!(playout.engine().board(), &(1, 2));
    }

    #[test]
    fn test_play_game_credits_the_last_mover() {
        let mut playout = Playout::new(ScriptedEngine::new(2, 4, 2));
        let mut rng = StdRng::seed_from_u64(0);
        let mut first: P<'_> = Policy::Heuristic;
        let mut second: P<'_> = Policy::Random;

        let record = playout.play_game(&mut first, &mut second, None, &mut rng).unwrap();
        assert_eq!(record, GameRecord { first_won: false, margin: 2, plies: 4 });

        // A fresh game resets the turn state.
        playout.reset(None);
        assert_eq!((playout.sign(), playout.ply()), (1, 0));
    }
}
