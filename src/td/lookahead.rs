//! Two-ply expectiminimax over the opponent's dice.
//!
//! Every value here is read from the perspective the features were encoded
//! in: a child from the mover's side, a grandchild from the replier's side.
//! For each child and each of the 21 dice buckets the opponent's best
//! outcome is
//!
//! * the margin of a forced win, when the bucket has one;
//! * the best reply value, when the bucket has ordinary replies;
//! * the negated child value, when the opponent must pass.
//!
//! The child's score is the probability-weighted sum of those outcomes,
//! negated back to the mover's side.

use crate::td::dice::{bucket_probabilities, NUM_DICE_BUCKETS};
use crate::td::engine::{Candidate, Engine, Features, Grandchildren};
use crate::td::error::{ContractViolation, TdError};
use crate::td::evaluator::Evaluator;
use crate::td::selector::{argmax_first, evaluate_candidates};

/// Index of the immediate win with the largest margin, first among equals.
pub fn best_immediate_win<B>(candidates: &[Candidate<B>]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (i, margin) in candidates.iter().enumerate().filter_map(|(i, c)| c.win.map(|m| (i, m))) {
        match best {
            Some((_, m)) if margin <= m => {}
            _ => best = Some((i, margin)),
        }
    }
    best.map(|(i, _)| i)
}

/// Combine child values, reply values and the reply table into one score per
/// child, from the mover's perspective.
///
/// `table` must already be validated against `reply_values`.
pub fn expectiminimax_scores(
    child_values: &[f32],
    reply_values: &[f32],
    table: &Grandchildren,
) -> Vec<f32> {
    let probabilities = bucket_probabilities();
    let mut offset = 0;
    let mut scores = Vec::with_capacity(child_values.len());

    for (c, &child_value) in child_values.iter().enumerate() {
        let mut expected = 0.0f32;
        for b in 0..NUM_DICE_BUCKETS {
            let replies = table.counts[c][b];
            let outcome = if table.wins[c][b] != 0 {
                f32::from(table.wins[c][b])
            } else if replies > 0 {
                reply_values[offset..offset + replies]
                    .iter()
                    .copied()
                    .fold(f32::NEG_INFINITY, f32::max)
            } else {
                -child_value
            };
            offset += replies;
            expected += probabilities[b] * outcome;
        }
        scores.push(-expected);
    }
    scores
}

/// Lookahead score of every child.
pub fn lookahead_scores<G: Engine, M: Evaluator>(
    engine: &G,
    children: &[Candidate<G::Board>],
    model: &M,
    ply: u32,
) -> Result<Vec<f32>, TdError> {
    let table = engine.children_to_grandchildren(children)?;
    if table.counts.len() != children.len() || table.wins.len() != children.len() {
        return Err(ContractViolation::ChildCountMismatch {
            children: children.len(),
            rows: table.counts.len().min(table.wins.len()),
        }
        .into());
    }
    table.validate()?;

    let child_features: Vec<Features> = children.iter().map(|c| c.features.clone()).collect();
    let child_values = evaluate_candidates(model, &child_features, ply)?;
    let reply_values = evaluate_candidates(model, &table.features, ply)?;

    Ok(expectiminimax_scores(&child_values, &reply_values, &table))
}

/// Pick the child to play. `children` must be non-empty.
///
/// An immediate win short-circuits the search; otherwise the highest
/// lookahead score wins, first index on ties.
pub fn lookahead_choice<G: Engine, M: Evaluator>(
    engine: &G,
    children: &[Candidate<G::Board>],
    model: &M,
    ply: u32,
) -> Result<usize, TdError> {
    if let Some(win) = best_immediate_win(children) {
        return Ok(win);
    }
    let scores = lookahead_scores(engine, children, model, ply)?;
    Ok(argmax_first(&scores).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::td::dice::DiceBucket;
    use crate::td::playout::{Playout, TurnOutcome};
    use crate::td::selector::apply_lookahead_move;
    use crate::td::testing::{CountingEvaluator, LinearEvaluator, ScriptedEngine};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn empty_rows(n: usize) -> (Vec<[usize; NUM_DICE_BUCKETS]>, Vec<[u8; NUM_DICE_BUCKETS]>) {
        (vec![[0; NUM_DICE_BUCKETS]; n], vec![[0; NUM_DICE_BUCKETS]; n])
    }

    #[test]
    fn test_all_passes_score_equals_child_value() {
        // If the opponent can never move, the position after our move is
        // exactly what we are left with.
        let (counts, wins) = empty_rows(2);
        let table = Grandchildren { features: vec![], counts, wins };
        let scores = expectiminimax_scores(&[0.75, -1.25], &[], &table);
        assert!((scores[0] - 0.75).abs() < 1e-6);
        assert!((scores[1] + 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_hand_computed_expectation() {
        let (mut counts, mut wins) = empty_rows(2);
        let lowest = DiceBucket::from_dice((1, 1)).index();
        let highest = DiceBucket::from_dice((6, 6)).index();
        counts[0][lowest] = 2;
        wins[0][highest] = 2;
        let table = Grandchildren {
            features: vec![vec![0.3], vec![0.9]],
            counts,
            wins,
        };
        table.validate().unwrap();

        let scores = expectiminimax_scores(&[0.5, -0.2], &[0.3, 0.9], &table);

        // Child 0: opponent best reply 0.9 on 1-1, forced mars on 6-6, passes
        // elsewhere (each double is 1/36).
        let expected0 = (0.9 + 2.0 - 0.5 * 34.0) / 36.0;
        assert!((scores[0] + expected0).abs() < 1e-5, "got {}", scores[0]);
        assert!((scores[1] + 0.2).abs() < 1e-5);
        assert_eq!(argmax_first(&scores), Some(0));
    }

    #[test]
    fn test_reply_slices_follow_child_then_bucket_order() {
        let (mut counts, wins) = empty_rows(2);
        counts[0][0] = 1;
        counts[1][0] = 1;
        // Child 1's only reply is worth a lot to the opponent.
        let table = Grandchildren {
            features: vec![vec![0.0], vec![2.0]],
            counts,
            wins,
        };
        let scores = expectiminimax_scores(&[0.0, 0.0], &[0.0, 2.0], &table);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_immediate_win_prefers_largest_margin_then_first() {
        let engine = ScriptedEngine::branching(0).with_children(vec![
            (vec![0.0], None),
            (vec![0.0], Some(1)),
            (vec![0.0], Some(2)),
            (vec![0.0], Some(2)),
        ]);
        let mut playout = Playout::new(engine);
        playout.reset(None);
        let model = CountingEvaluator::default();
        let mut rng = StdRng::seed_from_u64(0);

        let outcome = apply_lookahead_move(&mut playout, &model, &mut rng).unwrap();
        assert_eq!(outcome, TurnOutcome::Moved { index: 2, candidates: 4 });
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_lookahead_is_deterministic_and_matches_hand_scores() {
        let (mut counts, mut wins) = empty_rows(3);
        // Child 0 lets the opponent reply well on every bucket. Child 2 gives
        // up a forced win on one bucket but is otherwise the strongest.
        for b in 0..NUM_DICE_BUCKETS {
            counts[0][b] = 1;
        }
        wins[2][5] = 1;
        let replies = Grandchildren {
            features: vec![vec![1.0]; NUM_DICE_BUCKETS],
            counts,
            wins,
        };
        let engine = ScriptedEngine::branching(0)
            .with_children(vec![(vec![0.2], None), (vec![0.1], None), (vec![0.3], None)])
            .with_replies(replies);
        let model = LinearEvaluator::new(vec![1.0]);
        let mut rng = StdRng::seed_from_u64(5);

        let mut picks = Vec::new();
        for _ in 0..3 {
            let mut playout = Playout::new(engine.clone());
            playout.reset(None);
            picks.push(apply_lookahead_move(&mut playout, &model, &mut rng).unwrap());
        }
        assert!(picks.iter().all(|p| *p == picks[0]));

        let mut engine = engine;
        let children = engine.set_and_enumerate((3, 4));
        let scores = lookahead_scores(&engine, &children, &model, 0).unwrap();
        // Child 2: 0.3 everywhere except a forced single win on bucket 5.
        let p5 = DiceBucket::from_index(5).unwrap().probability();
        let expected2 = -(p5 * 1.0 + (1.0 - p5) * -0.3);
        assert!((scores[0] + 1.0).abs() < 1e-5);
        assert!((scores[1] - 0.1).abs() < 1e-5);
        assert!((scores[2] - expected2).abs() < 1e-5);
        assert_eq!(lookahead_choice(&engine, &children, &model, 0).unwrap(), 2);
    }

    #[test]
    fn test_inconsistent_table_is_a_contract_violation() {
        let (mut counts, mut wins) = empty_rows(1);
        counts[0][4] = 1;
        wins[0][4] = 1;
        let engine = ScriptedEngine::branching(0)
            .with_children(vec![(vec![0.0], None)])
            .with_replies(Grandchildren {
                features: vec![vec![0.0]],
                counts,
                wins,
            });
        let mut engine = engine;
        let children = engine.set_and_enumerate((1, 2));
        let model = LinearEvaluator::new(vec![1.0]);
        let err = lookahead_scores(&engine, &children, &model, 0).unwrap_err();
        assert!(matches!(
            err,
            TdError::Contract(ContractViolation::WinWithReplies { child: 0, .. })
        ));
    }
}
