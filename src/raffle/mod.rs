//! Pooled raffle with stake-weighted draws.
//!
//! One round is active at a time. Every bet debits immediately and joins the
//! round's bank; once two distinct bettors are in, a countdown arms and the
//! draw fires when it expires. The winner is picked by a weighted linear scan
//! over the stakes in the order they first entered the round, takes the bank
//! minus the 1% commission, and the slot clears for the next round.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{RaffleError, RaffleResult};
pub use manager::RaffleService;
pub use models::{BetReceipt, RaffleRound, RaffleStake, RoundId, select_winner};
