//! Raffle data models and the winner selection function.

use crate::ledger::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Round ID type
pub type RoundId = i64;

/// One bettor's accumulated stake in a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleStake {
    pub user_id: UserId,
    pub amount: i64,
}

/// One raffle round.
///
/// Stakes are kept in the order bettors first entered the round; the draw
/// scans them in that same order, so the ordering is part of the round's
/// observable behavior, not an implementation detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleRound {
    pub id: RoundId,
    pub stakes: Vec<RaffleStake>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub winner_id: Option<UserId>,
    pub total_bank: i64,
}

impl RaffleRound {
    pub fn new(id: RoundId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            stakes: Vec::new(),
            created_at,
            finished_at: None,
            winner_id: None,
            total_bank: 0,
        }
    }

    /// Add to a bettor's stake, keeping first-entry order.
    pub fn add_stake(&mut self, user_id: UserId, amount: i64) {
        self.total_bank += amount;
        if let Some(stake) = self.stakes.iter_mut().find(|s| s.user_id == user_id) {
            stake.amount += amount;
        } else {
            self.stakes.push(RaffleStake { user_id, amount });
        }
    }

    /// A bettor's total stake so far.
    pub fn stake_of(&self, user_id: UserId) -> i64 {
        self.stakes
            .iter()
            .find(|s| s.user_id == user_id)
            .map_or(0, |s| s.amount)
    }

    /// Number of distinct bettors.
    pub fn distinct_bettors(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_finished(&self) -> bool {
        self.winner_id.is_some()
    }
}

/// What a bettor sees after placing a raffle bet.
#[derive(Debug, Clone, PartialEq)]
pub struct BetReceipt {
    pub round_id: RoundId,
    pub total_bank: i64,
    pub user_stake: i64,
    /// Current winning chance as a percentage of the bank.
    pub chance: f64,
}

/// Weighted winner selection over stakes in insertion order.
///
/// `r` is a point in `[0, bank)`; the first stake whose running total reaches
/// it (inclusive boundary) wins. Returns `None` only if the stakes do not
/// cover `r`, which cannot happen for an in-range point; callers treat that
/// as an anomaly.
pub fn select_winner(stakes: &[RaffleStake], r: i64) -> Option<UserId> {
    let mut running = 0i64;
    for stake in stakes {
        if running + stake.amount >= r {
            return Some(stake.user_id);
        }
        running += stake.amount;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stakes(pairs: &[(UserId, i64)]) -> Vec<RaffleStake> {
        pairs
            .iter()
            .map(|&(user_id, amount)| RaffleStake { user_id, amount })
            .collect()
    }

    #[test]
    fn winner_boundary_is_inclusive() {
        // Stakes [10, 90]: the first bettor covers [0, 10], the second the rest.
        let s = stakes(&[(1, 10), (2, 90)]);
        assert_eq!(select_winner(&s, 0), Some(1));
        assert_eq!(select_winner(&s, 10), Some(1));
        assert_eq!(select_winner(&s, 11), Some(2));
        assert_eq!(select_winner(&s, 95), Some(2));
        assert_eq!(select_winner(&s, 99), Some(2));
    }

    #[test]
    fn winner_scan_respects_insertion_order() {
        let s = stakes(&[(5, 50), (1, 50)]);
        assert_eq!(select_winner(&s, 50), Some(5));
        assert_eq!(select_winner(&s, 51), Some(1));
    }

    #[test]
    fn out_of_range_point_finds_nobody() {
        let s = stakes(&[(1, 10), (2, 90)]);
        assert_eq!(select_winner(&s, 101), None);
        assert_eq!(select_winner(&[], 0), None);
    }

    #[test]
    fn repeat_bets_accumulate_in_place() {
        let mut round = RaffleRound::new(1, Utc::now());
        round.add_stake(7, 10);
        round.add_stake(8, 20);
        round.add_stake(7, 5);

        assert_eq!(round.total_bank, 35);
        assert_eq!(round.distinct_bettors(), 2);
        assert_eq!(round.stake_of(7), 15);
        assert_eq!(round.stakes[0].user_id, 7);
    }
}
