//! Head-to-head dice duels.
//!
//! A duel holds the creator's stake from the moment it is created; the
//! opponent's stake joins the bank on match, and the full bank is always
//! redistributed on resolution (winner take bank minus 1% commission, draws
//! refund both sides). Duels that never find an opponent are refunded by the
//! expiry sweep.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{DiceError, DiceResult};
pub use manager::{DiceRoller, DiceService, RandomRoller};
pub use models::{DiceGame, GameId, OpenGame, Outcome};
