//! Engine configuration.

use crate::ledger::UserId;
use std::collections::HashSet;

/// Divisor for the house commission: 1% of the bank, floor-divided.
pub const COMMISSION_DIVISOR: i64 = 100;

/// Commission taken from a bank on a resolved game or raffle draw.
pub fn commission(bank: i64) -> i64 {
    bank / COMMISSION_DIVISOR
}

/// Engine configuration.
///
/// Defaults mirror the production deployment; every timing knob has an
/// environment override so tests and staging can shrink the timers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Account accruing all commission (also the operator principal).
    pub house_account: UserId,

    /// Accounts allowed to run balance-adjustment commands.
    pub admins: HashSet<UserId>,

    /// Minimum dice duel bet in coins.
    pub dice_min_bet: i64,

    /// Minimum raffle bet in coins.
    pub raffle_min_bet: i64,

    /// Quick-bet buttons offered by the chat layer.
    pub raffle_quick_bets: [i64; 3],

    /// Countdown from the second distinct raffle bettor to the draw.
    pub raffle_timer_secs: u64,

    /// Unmatched dice games older than this are refunded and removed.
    pub game_ttl_secs: i64,

    /// Interval between expiry sweeps.
    pub sweep_interval_secs: u64,

    /// Interval between deposit feed polls.
    pub deposit_poll_secs: u64,

    /// Presentation delay after each dice roll, in milliseconds.
    pub roll_settle_ms: u64,

    /// External rate cache TTL.
    pub rate_ttl_secs: u64,

    /// Rate used when the provider fails before any successful fetch.
    pub rate_fallback: f64,

    /// Currency-rate endpoint.
    pub rate_url: String,

    /// Deposit wallet address polled for inbound transactions.
    pub deposit_address: String,

    /// Capacity of the background durability write queue.
    pub write_queue_capacity: usize,

    /// Maximum finished games returned for a user's history.
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            house_account: 0,
            admins: HashSet::new(),
            dice_min_bet: 10,
            raffle_min_bet: 10,
            raffle_quick_bets: [10, 100, 1000],
            raffle_timer_secs: 40,
            game_ttl_secs: 120,
            sweep_interval_secs: 30,
            deposit_poll_secs: 20,
            roll_settle_ms: 3000,
            rate_ttl_secs: 60,
            rate_fallback: 100.0,
            rate_url: "https://tonapi.io/v2/rates?tokens=ton&currencies=rub".to_string(),
            deposit_address: String::new(),
            write_queue_capacity: 1024,
            history_limit: 30,
        }
    }
}

impl Config {
    /// Build a configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let admins = std::env::var("ARENA_ADMIN_IDS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|s| s.trim().parse().ok())
                    .collect::<HashSet<UserId>>()
            })
            .unwrap_or_default();

        Self {
            house_account: env_parse("ARENA_HOUSE_ACCOUNT", defaults.house_account),
            admins,
            dice_min_bet: env_parse("ARENA_DICE_MIN_BET", defaults.dice_min_bet),
            raffle_min_bet: env_parse("ARENA_RAFFLE_MIN_BET", defaults.raffle_min_bet),
            raffle_quick_bets: defaults.raffle_quick_bets,
            raffle_timer_secs: env_parse("ARENA_RAFFLE_TIMER_SECS", defaults.raffle_timer_secs),
            game_ttl_secs: env_parse("ARENA_GAME_TTL_SECS", defaults.game_ttl_secs),
            sweep_interval_secs: env_parse("ARENA_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            deposit_poll_secs: env_parse("ARENA_DEPOSIT_POLL_SECS", defaults.deposit_poll_secs),
            roll_settle_ms: env_parse("ARENA_ROLL_SETTLE_MS", defaults.roll_settle_ms),
            rate_ttl_secs: env_parse("ARENA_RATE_TTL_SECS", defaults.rate_ttl_secs),
            rate_fallback: env_parse("ARENA_RATE_FALLBACK", defaults.rate_fallback),
            rate_url: std::env::var("ARENA_RATE_URL").unwrap_or(defaults.rate_url),
            deposit_address: std::env::var("ARENA_DEPOSIT_ADDRESS")
                .unwrap_or(defaults.deposit_address),
            write_queue_capacity: env_parse("ARENA_WRITE_QUEUE_CAP", defaults.write_queue_capacity),
            history_limit: env_parse("ARENA_HISTORY_LIMIT", defaults.history_limit),
        }
    }

    /// Check whether a user may run admin commands.
    pub fn is_admin(&self, uid: UserId) -> bool {
        uid == self.house_account || self.admins.contains(&uid)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_is_one_percent_floored() {
        assert_eq!(commission(200), 2);
        assert_eq!(commission(199), 1);
        assert_eq!(commission(99), 0);
        assert_eq!(commission(100), 1);
    }

    #[test]
    fn house_account_is_always_admin() {
        let config = Config {
            house_account: 42,
            ..Config::default()
        };
        assert!(config.is_admin(42));
        assert!(!config.is_admin(43));
    }
}
