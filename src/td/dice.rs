//! Dice buckets: the 21 unordered outcomes of a two-die roll.
//!
//! The lookahead search averages over every roll the opponent could get.
//! Since the order of the two dice never matters, the 36 ordered rolls
//! collapse into 21 buckets: 6 doubles (probability 1/36 each) and 15
//! non-doubles (probability 1/18 each).
//!
//! ## Bucket layout
//!
//! ```text
//! (1,1) (1,2) (1,3) (1,4) (1,5) (1,6)    ->  0 ..  5
//!       (2,2) (2,3) (2,4) (2,5) (2,6)    ->  6 .. 10
//!             (3,3) (3,4) (3,5) (3,6)    -> 11 .. 14
//!                   (4,4) (4,5) (4,6)    -> 15 .. 17
//!                         (5,5) (5,6)    -> 18 .. 19
//!                               (6,6)    -> 20
//! ```

use std::fmt;

/// A pair of die faces, each in `1..=6`.
pub type Dice = (u8, u8);

/// Number of distinct unordered two-die rolls.
pub const NUM_DICE_BUCKETS: usize = 21;

/// First bucket index of each row in the layout above, indexed by the
/// smaller die minus one.
const ROW_START: [u8; 6] = [0, 6, 11, 15, 18, 20];

/// One of the 21 equivalence classes of a two-die roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiceBucket(u8);

impl DiceBucket {
    /// Bucket for a given index, or `None` if the index is out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        if index < NUM_DICE_BUCKETS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Bucket containing the given roll, regardless of die order.
    ///
    /// # Panics
    /// Panics if either face is outside `1..=6`.
    pub fn from_dice(dice: Dice) -> Self {
        let (lo, hi) = if dice.0 <= dice.1 { dice } else { (dice.1, dice.0) };
        assert!(
            (1..=6).contains(&lo) && (1..=6).contains(&hi),
            "die faces must be in 1..=6, got {:?}",
            dice
        );
        Self(ROW_START[(lo - 1) as usize] + (hi - lo))
    }

    /// Bucket index in `0..21`.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Canonical roll for this bucket, smaller die first.
    pub fn dice(self) -> Dice {
        let idx = self.0;
        let lo = ROW_START
            .iter()
            .rposition(|&start| start <= idx)
            .map(|row| row as u8 + 1)
            .unwrap_or(1);
        let hi = lo + (idx - ROW_START[(lo - 1) as usize]);
        (lo, hi)
    }

    /// Whether both dice show the same face.
    pub fn is_double(self) -> bool {
        let (a, b) = self.dice();
        a == b
    }

    /// Probability of rolling this bucket with two fair dice.
    pub fn probability(self) -> f32 {
        if self.is_double() {
            1.0 / 36.0
        } else {
            1.0 / 18.0
        }
    }

    /// Iterate over all 21 buckets in index order.
    pub fn all() -> impl Iterator<Item = DiceBucket> {
        (0..NUM_DICE_BUCKETS as u8).map(DiceBucket)
    }
}

impl fmt::Display for DiceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.dice();
        write!(f, "{}-{}", a, b)
    }
}

/// Bucket probabilities in index order.
pub fn bucket_probabilities() -> [f32; NUM_DICE_BUCKETS] {
    let mut probs = [0.0; NUM_DICE_BUCKETS];
    for bucket in DiceBucket::all() {
        probs[bucket.index()] = bucket.probability();
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_sum_to_one() {
        let total: f64 = DiceBucket::all().map(|b| b.probability() as f64).sum();
        assert!((total - 1.0).abs() < 1e-6, "bucket probabilities sum to {}", total);

        let doubles = DiceBucket::all().filter(|b| b.is_double()).count();
        assert_eq!(doubles, 6);
        assert_eq!(NUM_DICE_BUCKETS - doubles, 15);
    }

    #[test]
    fn test_bucket_layout_matches_table() {
        assert_eq!(DiceBucket::from_dice((1, 1)).index(), 0);
        assert_eq!(DiceBucket::from_dice((1, 6)).index(), 5);
        assert_eq!(DiceBucket::from_dice((2, 2)).index(), 6);
        assert_eq!(DiceBucket::from_dice((3, 4)).index(), 12);
        assert_eq!(DiceBucket::from_dice((5, 6)).index(), 19);
        assert_eq!(DiceBucket::from_dice((6, 6)).index(), 20);
    }

    #[test]
    fn test_every_ordered_roll_lands_in_its_bucket() {
        let mut hits = [0u32; NUM_DICE_BUCKETS];
        for a in 1..=6u8 {
            for b in 1..=6u8 {
                let bucket = DiceBucket::from_dice((a, b));
                assert_eq!(bucket, DiceBucket::from_dice((b, a)));
                let (lo, hi) = bucket.dice();
                assert_eq!((lo, hi), (a.min(b), a.max(b)));
                hits[bucket.index()] += 1;
            }
        }
        // Empirical frequency over the 36 ordered rolls matches the stated probability.
        for bucket in DiceBucket::all() {
            let freq = hits[bucket.index()] as f32 / 36.0;
            assert!((freq - bucket.probability()).abs() < 1e-6, "bucket {}", bucket);
        }
    }

    #[test]
    fn test_from_index_bounds() {
        assert!(DiceBucket::from_index(20).is_some());
        assert!(DiceBucket::from_index(21).is_none());
        assert_eq!(DiceBucket::from_index(17).map(|b| b.dice()), Some((4, 6)));
    }
}
