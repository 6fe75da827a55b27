//! Raffle round lifecycle: betting, timer arming, weighted draw.

use super::{
    errors::{RaffleError, RaffleResult},
    models::{BetReceipt, RaffleRound, RoundId, select_winner},
};
use crate::config::{Config, commission};
use crate::ledger::{Ledger, UserId};
use crate::notify::Notifier;
use crate::store::{StoreWriter, WriteOp};
use chrono::Utc;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

struct RaffleState {
    current: Option<RaffleRound>,
    next_id: RoundId,
    timer_armed: bool,
}

/// Raffle service.
///
/// Holds at most one active round. Bets and the draw both run under a single
/// non-suspending lock acquisition; the countdown runs in a worker task that
/// carries the round id it was armed for, so a timer that outlives its round
/// fires into nothing instead of drawing a successor early.
pub struct RaffleService {
    state: Mutex<RaffleState>,
    ledger: Arc<Ledger>,
    writer: StoreWriter,
    notifier: Arc<dyn Notifier>,
    timer_tx: mpsc::UnboundedSender<RoundId>,
    min_bet: i64,
    timer_secs: u64,
    house_account: UserId,
}

impl RaffleService {
    /// Build the service and spawn its countdown worker.
    pub fn new(
        config: &Config,
        ledger: Arc<Ledger>,
        writer: StoreWriter,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<RoundId>();
        let service = Arc::new(Self {
            state: Mutex::new(RaffleState {
                current: None,
                next_id: 1,
                timer_armed: false,
            }),
            ledger,
            writer,
            notifier,
            timer_tx,
            min_bet: config.raffle_min_bet,
            timer_secs: config.raffle_timer_secs,
            house_account: config.house_account,
        });

        let worker = Arc::clone(&service);
        let delay = Duration::from_secs(config.raffle_timer_secs);
        tokio::spawn(async move {
            while let Some(round_id) = timer_rx.recv().await {
                let service = Arc::clone(&worker);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    service.fire_timer(round_id).await;
                });
            }
        });
        service
    }

    /// Place a bet in the active round, opening one if none exists.
    ///
    /// The stake is debited immediately. Once the round has two distinct
    /// bettors the draw countdown arms; repeat bets never re-arm it.
    ///
    /// # Errors
    ///
    /// * `RaffleError::BetTooLow` - bet below the minimum
    /// * `RaffleError::Ledger` - insufficient funds
    pub fn place_bet(&self, user: UserId, amount: i64) -> RaffleResult<BetReceipt> {
        if amount < self.min_bet {
            return Err(RaffleError::BetTooLow { min: self.min_bet });
        }

        let (receipt, armed_for) = {
            let mut state = self.locked();
            self.ledger.try_debit(user, amount)?;

            let round = match state.current.take() {
                Some(round) => round,
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    let round = RaffleRound::new(id, Utc::now());
                    self.writer.enqueue(WriteOp::UpsertRaffleRound(round.clone()));
                    log::info!("raffle round {id} opened");
                    round
                }
            };
            let round = state.current.insert(round);

            round.add_stake(user, amount);
            self.writer.enqueue(WriteOp::AppendRaffleBet {
                round_id: round.id,
                user_id: user,
                amount,
            });

            let receipt = BetReceipt {
                round_id: round.id,
                total_bank: round.total_bank,
                user_stake: round.stake_of(user),
                chance: round.stake_of(user) as f64 * 100.0 / round.total_bank as f64,
            };

            let round_id = round.id;
            let distinct_bettors = round.distinct_bettors();
            let armed_for = if !state.timer_armed && distinct_bettors >= 2 {
                state.timer_armed = true;
                Some(round_id)
            } else {
                None
            };
            (receipt, armed_for)
        };

        if let Some(round_id) = armed_for {
            log::info!(
                "raffle round {round_id} countdown armed ({}s)",
                self.timer_secs
            );
            if self.timer_tx.send(round_id).is_err() {
                log::error!("raffle countdown worker is gone, round {round_id} will not auto-draw");
            }
        }
        Ok(receipt)
    }

    /// Snapshot of the active round, if any.
    pub fn current(&self) -> Option<RaffleRound> {
        self.locked().current.clone()
    }

    /// Draw the active round at a random point in `[0, bank)`.
    pub async fn draw_now(&self) -> Option<RaffleRound> {
        self.run_draw(None, None).await
    }

    /// Draw the active round at an explicit point; for deterministic callers.
    pub async fn draw_at(&self, r: i64) -> Option<RaffleRound> {
        self.run_draw(None, Some(r)).await
    }

    /// Countdown expiry for the round the timer was armed against.
    async fn fire_timer(&self, round_id: RoundId) {
        self.run_draw(Some(round_id), None).await;
    }

    /// Perform a draw if the round qualifies.
    ///
    /// A round with fewer than two distinct bettors (or an empty bank) is
    /// skipped in place with the countdown disarmed, so the next qualifying
    /// bet arms a fresh one. A timer firing for a round that is already gone
    /// does nothing at all.
    async fn run_draw(&self, expected: Option<RoundId>, forced_r: Option<i64>) -> Option<RaffleRound> {
        let (finished, bettors) = {
            let mut state = self.locked();
            let current_id = state.current.as_ref().map(|r| r.id)?;
            if let Some(expected) = expected {
                if expected != current_id {
                    log::debug!("stale raffle timer for round {expected} ignored");
                    return None;
                }
            }
            state.timer_armed = false;

            let qualifies = state
                .current
                .as_ref()
                .is_some_and(|r| r.distinct_bettors() >= 2 && r.total_bank > 0);
            if !qualifies {
                log::info!("raffle round {current_id} draw skipped: not enough bettors");
                return None;
            }

            let mut round = state.current.take()?;
            let bank = round.total_bank;
            let r = forced_r.unwrap_or_else(|| rand::rng().random_range(0..bank));
            let winner = select_winner(&round.stakes, r).unwrap_or_else(|| {
                // unreachable for an in-range point, but never abort a draw
                log::warn!("raffle round {current_id}: point {r} outside bank {bank}");
                let idx = rand::rng().random_range(0..round.stakes.len());
                round.stakes[idx].user_id
            });

            let fee = commission(bank);
            self.ledger.credit(winner, bank - fee);
            self.ledger.credit(self.house_account, fee);

            round.winner_id = Some(winner);
            round.finished_at = Some(Utc::now());
            self.writer.enqueue(WriteOp::UpsertRaffleRound(round.clone()));

            let bettors: Vec<UserId> = round.stakes.iter().map(|s| s.user_id).collect();
            (round, bettors)
        };

        let winner = finished.winner_id.unwrap_or_default();
        let bank = finished.total_bank;
        let prize = bank - commission(bank);
        log::info!(
            "raffle round {} drawn: winner {winner}, bank {bank}, prize {prize}",
            finished.id
        );

        let text = format!(
            "Raffle #{id} is over! Bank: {bank} coins. Winner: {winner}, prize {prize} coins.",
            id = finished.id
        );
        for &uid in &bettors {
            if let Err(e) = self.notifier.notify_user(uid, &text).await {
                log::warn!("raffle result notification to {uid} failed: {e}");
            }
        }
        if let Err(e) = self.notifier.notify_operator(&text).await {
            log::warn!("raffle operator notification failed: {e}");
        }
        Some(finished)
    }

    fn locked(&self) -> MutexGuard<'_, RaffleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::store::{MemoryStore, StoreWriter};

    const HOUSE: UserId = 900;

    fn service(timer_secs: u64) -> (Arc<RaffleService>, Arc<Ledger>, Arc<RecordingNotifier>) {
        let writer = StoreWriter::spawn(Arc::new(MemoryStore::new()), 256);
        let ledger = Arc::new(Ledger::new(writer.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let config = Config {
            house_account: HOUSE,
            raffle_timer_secs: timer_secs,
            ..Config::default()
        };
        let service = RaffleService::new(
            &config,
            Arc::clone(&ledger),
            writer,
            notifier.clone() as Arc<dyn Notifier>,
        );
        (service, ledger, notifier)
    }

    #[tokio::test]
    async fn bet_validation_leaves_balances_alone() {
        let (service, ledger, _) = service(1_000);
        ledger.credit(1, 50);
        assert_eq!(
            service.place_bet(1, 5).unwrap_err(),
            RaffleError::BetTooLow { min: 10 }
        );
        assert!(matches!(
            service.place_bet(1, 500).unwrap_err(),
            RaffleError::Ledger(crate::ledger::LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance_of(1), 50);
        assert!(service.current().is_none());
    }

    #[tokio::test]
    async fn receipt_tracks_bank_stake_and_chance() {
        let (service, ledger, _) = service(1_000);
        ledger.credit(1, 100);
        ledger.credit(2, 100);

        let first = service.place_bet(1, 10).unwrap();
        assert_eq!(first.total_bank, 10);
        assert_eq!(first.user_stake, 10);
        assert!((first.chance - 100.0).abs() < f64::EPSILON);

        let second = service.place_bet(2, 30).unwrap();
        assert_eq!(second.round_id, first.round_id);
        assert_eq!(second.total_bank, 40);
        assert!((second.chance - 75.0).abs() < f64::EPSILON);

        let again = service.place_bet(1, 10).unwrap();
        assert_eq!(again.user_stake, 20);
        assert_eq!(ledger.balance_of(1), 80);
    }

    #[tokio::test]
    async fn weighted_draw_pays_bank_minus_commission() {
        // Stakes [10, 90], point 95: the second bettor's range is (10, 100].
        let (service, ledger, notifier) = service(1_000);
        ledger.credit(1, 100);
        ledger.credit(2, 100);
        service.place_bet(1, 10).unwrap();
        service.place_bet(2, 90).unwrap();

        let finished = service.draw_at(95).await.unwrap();
        assert_eq!(finished.winner_id, Some(2));
        assert_eq!(ledger.balance_of(1), 90);
        assert_eq!(ledger.balance_of(2), 109);
        assert_eq!(ledger.balance_of(HOUSE), 1);
        assert!(service.current().is_none());

        // every bettor and the operator hear about the result
        assert_eq!(notifier.messages_for(1).len(), 1);
        assert_eq!(notifier.messages_for(2).len(), 1);
        assert_eq!(notifier.operator_messages().len(), 1);
    }

    #[tokio::test]
    async fn draw_boundary_point_favors_the_earlier_stake() {
        let (service, ledger, _) = service(1_000);
        ledger.credit(1, 100);
        ledger.credit(2, 100);
        service.place_bet(1, 10).unwrap();
        service.place_bet(2, 90).unwrap();

        let finished = service.draw_at(10).await.unwrap();
        assert_eq!(finished.winner_id, Some(1));
        assert_eq!(ledger.balance_of(1), 189);
    }

    #[tokio::test]
    async fn lone_bettor_round_is_skipped_and_rearms_later() {
        let (service, ledger, _) = service(1_000);
        ledger.credit(1, 100);
        ledger.credit(2, 100);
        service.place_bet(1, 10).unwrap();

        assert!(service.draw_at(0).await.is_none());
        assert!(service.current().is_some());
        assert_eq!(ledger.balance_of(1), 90);
        assert!(!service.locked().timer_armed);

        // a second distinct bettor arms a fresh countdown
        service.place_bet(2, 10).unwrap();
        assert!(service.locked().timer_armed);
    }

    #[tokio::test]
    async fn stale_timer_never_touches_the_next_round() {
        let (service, ledger, _) = service(1_000);
        ledger.credit(1, 200);
        ledger.credit(2, 200);
        service.place_bet(1, 10).unwrap();
        service.place_bet(2, 10).unwrap();
        let old_id = service.current().unwrap().id;
        service.draw_at(0).await.unwrap();

        service.place_bet(1, 10).unwrap();
        service.fire_timer(old_id).await;
        let round = service.current().unwrap();
        assert_ne!(round.id, old_id);
        assert!(round.winner_id.is_none());
    }

    #[tokio::test]
    async fn armed_countdown_fires_the_draw() {
        let (service, ledger, _) = service(0);
        ledger.credit(1, 100);
        ledger.credit(2, 100);
        service.place_bet(1, 50).unwrap();
        service.place_bet(2, 50).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.current().is_none());
        assert_eq!(ledger.balance_of(HOUSE), 1);
        assert_eq!(ledger.balance_of(1) + ledger.balance_of(2), 199);
    }

    #[test]
    fn draw_conserves_coins_for_any_stakes() {
        use proptest::prelude::*;

        let runtime = tokio::runtime::Runtime::new().unwrap();
        proptest!(|(
            amounts in proptest::collection::vec(10i64..1_000, 2..6),
            point in 0.0f64..1.0,
        )| {
            runtime.block_on(async {
                let (service, ledger, _) = service(1_000);
                let total: i64 = amounts.iter().sum();
                for (i, &amount) in amounts.iter().enumerate() {
                    let uid = i as UserId + 1;
                    ledger.credit(uid, amount);
                    service.place_bet(uid, amount).unwrap();
                }

                let r = (point * total as f64) as i64;
                let finished = service.draw_at(r).await.unwrap();
                prop_assert!(finished.winner_id.is_some());

                let mut remaining = ledger.balance_of(HOUSE);
                for i in 0..amounts.len() {
                    remaining += ledger.balance_of(i as UserId + 1);
                }
                prop_assert_eq!(remaining, total);
                Ok(())
            })?;
        });
    }
}
