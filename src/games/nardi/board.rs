//! Long Nardi board representation and feature encoding.
//!
//! Points are stored in absolute order `0..24`. White (player 0) starts with
//! all fifteen checkers on absolute point 0, Black (player 1) on absolute
//! point 12. Both move in the same direction, so a player's *relative*
//! point `r` is absolute point `(r + 12 * player) % 24`: relative 0 is the
//! head and relative 18..24 is home.

use std::fmt;

/// Checkers per player.
pub const CHECKERS: u8 = 15;

/// Points on the board.
pub const POINTS: usize = 24;

/// First relative point of a player's home.
pub const HOME_START: usize = 18;

/// Columns per feature row: 24 points plus one summary column.
const COLUMNS: usize = POINTS + 1;

/// Feature rows: three own channels and three opponent channels.
const ROWS: usize = 6;

/// Length of a feature vector.
pub const NARDI_FEATURES: usize = ROWS * COLUMNS;

/// White moves first.
pub const WHITE: usize = 0;

/// Black moves second.
pub const BLACK: usize = 1;

/// The other player.
pub fn opponent(player: usize) -> usize {
    1 - player
}

/// Absolute point of a player's relative point.
pub fn absolute(player: usize, rel: usize) -> usize {
    (rel + 12 * player) % POINTS
}

/// Checker placement plus borne-off counts.
///
/// `points[a]` is positive for White checkers and negative for Black.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NardiBoard {
    points: [i8; POINTS],
    off: [u8; 2],
}

impl Default for NardiBoard {
    fn default() -> Self {
        Self::standard()
    }
}

impl NardiBoard {
    /// Both players' fifteen checkers on their heads.
    pub fn standard() -> Self {
        let mut points = [0i8; POINTS];
        points[absolute(WHITE, 0)] = CHECKERS as i8;
        points[absolute(BLACK, 0)] = -(CHECKERS as i8);
        Self { points, off: [0; 2] }
    }

    /// An empty board with nothing borne off. Used to build positions.
    pub fn empty() -> Self {
        Self {
            points: [0; POINTS],
            off: [0; 2],
        }
    }

    /// Build a position from `(relative point, count)` lists per player and
    /// borne-off counts. Returns `None` if the placement is inconsistent.
    pub fn from_placement(
        white: &[(usize, u8)],
        black: &[(usize, u8)],
        off: [u8; 2],
    ) -> Option<Self> {
        let mut board = Self::empty();
        board.off = off;
        for (player, placement) in [(WHITE, white), (BLACK, black)] {
            for &(rel, count) in placement {
                if rel >= POINTS || board.points[absolute(player, rel)] != 0 {
                    return None;
                }
                board.points[absolute(player, rel)] = signed(player, count);
            }
        }
        for player in [WHITE, BLACK] {
            let total: u32 = (0..POINTS).map(|r| u32::from(board.count(player, r))).sum();
            if total + u32::from(board.off[player]) != u32::from(CHECKERS) {
                return None;
            }
        }
        Some(board)
    }

    /// Checkers `player` has on their relative point `rel`.
    pub fn count(&self, player: usize, rel: usize) -> u8 {
        let v = self.points[absolute(player, rel % POINTS)];
        match (player, v.signum()) {
            (WHITE, 1) => v as u8,
            (BLACK, -1) => (-v) as u8,
            _ => 0,
        }
    }

    /// Whether the opponent of `player` holds relative point `rel`.
    pub fn blocked_for(&self, player: usize, rel: usize) -> bool {
        let v = self.points[absolute(player, rel)];
        match player {
            WHITE => v < 0,
            _ => v > 0,
        }
    }

    /// Checkers borne off by `player`.
    pub fn off(&self, player: usize) -> u8 {
        self.off[player]
    }

    /// Whether `player` has borne off every checker.
    pub fn has_won(&self, player: usize) -> bool {
        self.off[player] == CHECKERS
    }

    /// Margin of the winner: 2 for a mars (loser has borne off nothing).
    pub fn margin_for(&self, winner: usize) -> u8 {
        if self.off[opponent(winner)] == 0 {
            2
        } else {
            1
        }
    }

    /// Whether every remaining checker of `player` is home.
    pub fn all_home(&self, player: usize) -> bool {
        (0..HOME_START).all(|r| self.count(player, r) == 0)
    }

    /// Points occupied by `player`.
    pub fn occupied(&self, player: usize) -> usize {
        (0..POINTS).filter(|&r| self.count(player, r) > 0).count()
    }

    /// Checkers of `player` neither home nor borne off.
    pub fn not_home(&self, player: usize) -> u8 {
        (0..HOME_START).map(|r| self.count(player, r)).sum()
    }

    /// Move one checker of `player` from `from` to `to` (relative points).
    /// `to >= 24` bears the checker off.
    pub(crate) fn shift(&mut self, player: usize, from: usize, to: usize) {
        let step = signed(player, 1);
        self.points[absolute(player, from)] -= step;
        if to >= POINTS {
            self.off[player] += 1;
        } else {
            self.points[absolute(player, to)] += step;
        }
    }

    /// Six-channel feature encoding from `player`'s perspective.
    ///
    /// For every relative point: own checker present, own point made (two
    /// or more), own extra checkers; then the same three channels for the
    /// opponent at that point. The summary column holds borne-off counts,
    /// occupied points and checkers not yet home for each side. Counts are
    /// scaled by 1/15.
    pub fn features(&self, player: usize) -> Vec<f32> {
        let scale = 1.0 / f32::from(CHECKERS);
        let them = opponent(player);
        let mut f = vec![0.0f32; NARDI_FEATURES];

        for rel in 0..POINTS {
            let abs = absolute(player, rel);
            let v = self.points[abs];
            let n = v.unsigned_abs();
            if n == 0 {
                continue;
            }
            let own = (v > 0) == (player == WHITE);
            let row = if own { 0 } else { 3 };
            f[row * COLUMNS + rel] = 1.0;
            if n >= 2 {
                f[(row + 1) * COLUMNS + rel] = 1.0;
                f[(row + 2) * COLUMNS + rel] = f32::from(n - 2) * scale;
            }
        }

        let summary = POINTS;
        f[summary] = f32::from(self.off[player]) * scale;
        f[COLUMNS + summary] = f32::from(self.off[them]) * scale;
        f[2 * COLUMNS + summary] = self.occupied(player) as f32 * scale;
        f[3 * COLUMNS + summary] = self.occupied(them) as f32 * scale;
        f[4 * COLUMNS + summary] = f32::from(self.not_home(player)) * scale;
        f[5 * COLUMNS + summary] = f32::from(self.not_home(them)) * scale;
        f
    }
}

fn signed(player: usize, count: u8) -> i8 {
    if player == WHITE {
        count as i8
    } else {
        -(count as i8)
    }
}

impl fmt::Display for NardiBoard {
    /// Two rows in absolute order, `W`/`B` followed by the count.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = |v: i8| match v.signum() {
            1 => format!("W{:<2}", v),
            -1 => format!("B{:<2}", -v),
            _ => " . ".to_string(),
        };
        let top: Vec<String> = (12..24).rev().map(|a| cell(self.points[a])).collect();
        let bottom: Vec<String> = (0..12).map(|a| cell(self.points[a])).collect();
        writeln!(f, "{}   off W{} B{}", top.join(" "), self.off[WHITE], self.off[BLACK])?;
        write!(f, "{}", bottom.join(" "))
    }
}
