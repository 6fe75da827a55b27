//! Player statistics over finished dice games.
//!
//! Everything here is a pure function over game records pulled from the
//! store; profit counts the stake only, never the commission, so a player's
//! profit and the house cut are reported independently.

use crate::dice::{DiceGame, Outcome};
use crate::ledger::UserId;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A participant's profit in one finished game.
///
/// Stake-only accounting: `+bet` for a win, `-bet` for a loss, zero for a
/// draw or for a game the user did not play in.
pub fn game_profit(uid: UserId, game: &DiceGame) -> i64 {
    let is_creator = uid == game.creator_id;
    let is_opponent = game.opponent_id == Some(uid);
    if !is_creator && !is_opponent {
        return 0;
    }
    match game.outcome {
        Outcome::Draw | Outcome::Pending => 0,
        Outcome::CreatorWon if is_creator => game.bet,
        Outcome::OpponentWon if is_opponent => game.bet,
        _ => -game.bet,
    }
}

/// Games played and net profit over one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodStats {
    pub games: usize,
    pub profit: i64,
}

/// Day, week and month windows for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub day: PeriodStats,
    pub week: PeriodStats,
    pub month: PeriodStats,
}

/// Aggregate a user's finished games into rolling windows ending at `now`.
///
/// The windows nest: a game inside the last day also counts toward the week
/// and the month. Games with no finish time are skipped.
pub fn user_stats(uid: UserId, games: &[DiceGame], now: DateTime<Utc>) -> UserStats {
    let mut stats = UserStats::default();
    for game in games {
        let Some(finished_at) = game.finished_at else {
            continue;
        };
        let age = now - finished_at;
        let profit = game_profit(uid, game);

        if age <= Duration::days(30) {
            stats.month.games += 1;
            stats.month.profit += profit;
        }
        if age <= Duration::days(7) {
            stats.week.games += 1;
            stats.week.profit += profit;
        }
        if age <= Duration::days(1) {
            stats.day.games += 1;
            stats.day.profit += profit;
        }
    }
    stats
}

/// All-time profit leaderboard across every finished game.
///
/// Ties order by user id so the listing is stable across runs.
pub fn profit_rating(games: &[DiceGame], limit: usize) -> Vec<(UserId, i64)> {
    let mut profits: HashMap<UserId, i64> = HashMap::new();
    for game in games {
        *profits.entry(game.creator_id).or_default() += game_profit(game.creator_id, game);
        if let Some(opponent) = game.opponent_id {
            *profits.entry(opponent).or_default() += game_profit(opponent, game);
        }
    }

    let mut rating: Vec<(UserId, i64)> = profits.into_iter().collect();
    rating.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    rating.truncate(limit);
    rating
}
