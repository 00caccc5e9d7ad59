use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payouts of the classic fifteen-step ladder.
pub const DEFAULT_PRIZES: [i64; 15] = [
    100, 200, 300, 500, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 125_000, 250_000,
    500_000, 1_000_000,
];

/// Levels whose amount is guaranteed once the player has passed them.
pub const DEFAULT_FIREPROOF_LEVELS: [usize; 2] = [4, 9];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrizeTableError {
    #[error("prize table must define at least one level")]
    Empty,
    #[error("prize for level {level} ({amount}) does not exceed the previous level")]
    NotIncreasing { level: usize, amount: i64 },
    #[error("prize for level {level} must be positive")]
    NonPositive { level: usize },
    #[error("fireproof level {level} is outside the ladder (max level {max_level})")]
    FireproofOutOfRange { level: usize, max_level: usize },
}

/// Ordered level -> amount mapping with minimum-guarantee checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTable {
    amounts: Vec<i64>,
    fireproof_levels: Vec<usize>,
}

impl PrizeTable {
    pub fn new(amounts: Vec<i64>, fireproof_levels: Vec<usize>) -> Result<Self, PrizeTableError> {
        if amounts.is_empty() {
            return Err(PrizeTableError::Empty);
        }

        for (level, amount) in amounts.iter().copied().enumerate() {
            if amount <= 0 {
                return Err(PrizeTableError::NonPositive { level });
            }
            if level > 0 && amount <= amounts[level - 1] {
                return Err(PrizeTableError::NotIncreasing { level, amount });
            }
        }

        let max_level = amounts.len() - 1;
        let mut fireproof_levels = fireproof_levels;
        fireproof_levels.sort_unstable();
        fireproof_levels.dedup();
        if let Some(&level) = fireproof_levels.iter().find(|&&level| level > max_level) {
            return Err(PrizeTableError::FireproofOutOfRange { level, max_level });
        }

        Ok(Self {
            amounts,
            fireproof_levels,
        })
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn max_level(&self) -> usize {
        self.amounts.len() - 1
    }

    pub fn fireproof_levels(&self) -> &[usize] {
        &self.fireproof_levels
    }

    /// Payout for a completed level. Panics on a level outside the ladder.
    pub fn amount_for_level(&self, level: usize) -> i64 {
        self.amounts[level]
    }

    /// Largest guaranteed amount among fireproof levels strictly below `level`.
    pub fn nearest_fireproof_amount_below(&self, level: usize) -> i64 {
        self.fireproof_levels
            .iter()
            .rev()
            .find(|&&fireproof| fireproof < level)
            .map(|&fireproof| self.amounts[fireproof])
            .unwrap_or(0)
    }
}

impl Default for PrizeTable {
    fn default() -> Self {
        Self {
            amounts: DEFAULT_PRIZES.to_vec(),
            fireproof_levels: DEFAULT_FIREPROOF_LEVELS.to_vec(),
        }
    }
}
