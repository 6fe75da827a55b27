//! Dice duel error types.

use super::models::GameId;
use crate::ledger::LedgerError;
use thiserror::Error;

/// Dice duel errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    /// Bet below the table minimum
    #[error("bet too low: minimum is {min} coins")]
    BetTooLow { min: i64 },

    /// Game does not exist (or is already gone)
    #[error("game {0} not found")]
    NotFound(GameId),

    /// An opponent already joined
    #[error("game {0} already has an opponent")]
    AlreadyMatched(GameId),

    /// Only the creator may cancel an open game
    #[error("game {0} belongs to another user")]
    NotCreator(GameId),

    /// Balance problem while staking
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for dice duel operations
pub type DiceResult<T> = Result<T, DiceError>;
