//! Dice duel lifecycle: create, join, resolve, cancel, expiry sweep.

use super::{
    errors::{DiceError, DiceResult},
    models::{DiceGame, GameId, OpenGame, Outcome},
};
use crate::config::{Config, commission};
use crate::ledger::{Ledger, UserId};
use crate::notify::Notifier;
use crate::store::{StoreWriter, WriteOp};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Source of dice rolls, injectable for deterministic tests.
pub trait DiceRoller: Send + Sync {
    /// One uniform roll in `1..=6`.
    fn roll(&self) -> u8;
}

/// Uniform random roller.
pub struct RandomRoller;

impl DiceRoller for RandomRoller {
    fn roll(&self) -> u8 {
        rand::rng().random_range(1..=6)
    }
}

struct DiceState {
    games: HashMap<GameId, DiceGame>,
    next_id: GameId,
}

/// Dice duel service.
///
/// Stake movements and state transitions for one duel happen under a single
/// lock acquisition without suspending; only the roll settle delay and the
/// result notifications await, and both run while the game is in a state no
/// other path will touch (`Matched`).
pub struct DiceService {
    state: Mutex<DiceState>,
    ledger: Arc<Ledger>,
    writer: StoreWriter,
    notifier: Arc<dyn Notifier>,
    roller: Box<dyn DiceRoller>,
    min_bet: i64,
    game_ttl_secs: i64,
    settle_delay: Duration,
    house_account: UserId,
}

impl DiceService {
    pub fn new(
        config: &Config,
        ledger: Arc<Ledger>,
        writer: StoreWriter,
        notifier: Arc<dyn Notifier>,
        roller: Box<dyn DiceRoller>,
    ) -> Self {
        Self {
            state: Mutex::new(DiceState {
                games: HashMap::new(),
                next_id: 1,
            }),
            ledger,
            writer,
            notifier,
            roller,
            min_bet: config.dice_min_bet,
            game_ttl_secs: config.game_ttl_secs,
            settle_delay: Duration::from_millis(config.roll_settle_ms),
            house_account: config.house_account,
        }
    }

    /// Create a duel, debiting the creator's stake immediately.
    ///
    /// # Errors
    ///
    /// * `DiceError::BetTooLow` - bet below the minimum
    /// * `DiceError::Ledger` - insufficient funds
    pub fn create(&self, creator: UserId, bet: i64) -> DiceResult<DiceGame> {
        if bet < self.min_bet {
            return Err(DiceError::BetTooLow { min: self.min_bet });
        }
        let mut state = self.locked();
        self.ledger.try_debit(creator, bet)?;
        let id = state.next_id;
        state.next_id += 1;
        let game = DiceGame::new(id, creator, bet, Utc::now());
        state.games.insert(id, game.clone());
        self.writer.enqueue(WriteOp::UpsertGame(game.clone()));
        log::info!("game {id} created by {creator} with bet {bet}");
        Ok(game)
    }

    /// Join an open duel and resolve it.
    ///
    /// The opponent's stake is debited and the game marked matched in one
    /// atomic step; resolution (rolls, payout, notifications) follows
    /// synchronously and returns the finished game.
    ///
    /// # Errors
    ///
    /// * `DiceError::NotFound` - no such game
    /// * `DiceError::AlreadyMatched` - someone already joined
    /// * `DiceError::Ledger` - insufficient funds
    pub async fn join(&self, opponent: UserId, game_id: GameId) -> DiceResult<DiceGame> {
        let (creator, bet) = {
            let mut state = self.locked();
            let game = state.games.get_mut(&game_id).ok_or(DiceError::NotFound(game_id))?;
            if game.opponent_id.is_some() {
                return Err(DiceError::AlreadyMatched(game_id));
            }
            self.ledger.try_debit(opponent, game.bet)?;
            game.opponent_id = Some(opponent);
            self.writer.enqueue(WriteOp::UpsertGame(game.clone()));
            (game.creator_id, game.bet)
        };
        log::info!("game {game_id} matched: {creator} vs {opponent} for {bet}");

        self.resolve(game_id, creator, opponent).await
    }

    /// Roll for both sides, settle the bank and notify the participants.
    ///
    /// The game is `Matched` while the rolls settle, so neither the sweep
    /// nor a second join can touch it; the payout itself is applied under
    /// the state lock in one step.
    async fn resolve(&self, game_id: GameId, creator: UserId, opponent: UserId) -> DiceResult<DiceGame> {
        let creator_roll = self.roller.roll();
        tokio::time::sleep(self.settle_delay).await;
        let opponent_roll = self.roller.roll();
        tokio::time::sleep(self.settle_delay).await;

        let game = {
            let mut state = self.locked();
            let game = state.games.get_mut(&game_id).ok_or(DiceError::NotFound(game_id))?;
            game.creator_roll = Some(creator_roll);
            game.opponent_roll = Some(opponent_roll);
            game.finished_at = Some(Utc::now());

            let bank = game.bank();
            game.outcome = if creator_roll > opponent_roll {
                let fee = commission(bank);
                self.ledger.credit(creator, bank - fee);
                self.ledger.credit(self.house_account, fee);
                Outcome::CreatorWon
            } else if opponent_roll > creator_roll {
                let fee = commission(bank);
                self.ledger.credit(opponent, bank - fee);
                self.ledger.credit(self.house_account, fee);
                Outcome::OpponentWon
            } else {
                self.ledger.credit(creator, game.bet);
                self.ledger.credit(opponent, game.bet);
                Outcome::Draw
            };

            let snapshot = game.clone();
            self.writer.enqueue(WriteOp::UpsertGame(snapshot.clone()));
            state.games.remove(&game_id);
            snapshot
        };
        log::info!(
            "game {game_id} finished {creator_roll}:{opponent_roll} ({})",
            game.outcome.label()
        );

        for &uid in &[creator, opponent] {
            let text = self.result_text(&game, uid);
            if let Err(e) = self.notifier.notify_user(uid, &text).await {
                log::warn!("result notification to {uid} failed: {e}");
            }
        }
        Ok(game)
    }

    /// Cancel an open duel; only the creator may, and only before a match.
    ///
    /// Returns the refunded stake.
    pub fn cancel(&self, caller: UserId, game_id: GameId) -> DiceResult<i64> {
        let mut state = self.locked();
        let game = state.games.get(&game_id).ok_or(DiceError::NotFound(game_id))?;
        if game.creator_id != caller {
            return Err(DiceError::NotCreator(game_id));
        }
        if game.opponent_id.is_some() {
            return Err(DiceError::AlreadyMatched(game_id));
        }
        let bet = game.bet;
        self.ledger.credit(caller, bet);
        state.games.remove(&game_id);
        log::info!("game {game_id} cancelled by {caller}, {bet} refunded");
        Ok(bet)
    }

    /// Joinable games, newest first.
    pub fn open_games(&self) -> Vec<OpenGame> {
        let state = self.locked();
        let mut open: Vec<OpenGame> = state
            .games
            .values()
            .filter(|g| g.is_open())
            .map(|g| OpenGame {
                id: g.id,
                creator_id: g.creator_id,
                bet: g.bet,
            })
            .collect();
        open.sort_by(|a, b| b.id.cmp(&a.id));
        open
    }

    /// Look up a game still held in memory.
    pub fn get(&self, game_id: GameId) -> Option<DiceGame> {
        self.locked().games.get(&game_id).cloned()
    }

    /// Refund and remove open games older than the TTL.
    ///
    /// Returns the number of games swept. Notifications are best-effort.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let refunded = {
            let mut state = self.locked();
            let expired: Vec<GameId> = state
                .games
                .values()
                .filter(|g| {
                    g.is_open() && (now - g.created_at).num_seconds() > self.game_ttl_secs
                })
                .map(|g| g.id)
                .collect();

            let mut refunded = Vec::with_capacity(expired.len());
            for id in expired {
                if let Some(game) = state.games.remove(&id) {
                    self.ledger.credit(game.creator_id, game.bet);
                    refunded.push((game.creator_id, id, game.bet));
                }
            }
            refunded
        };

        for &(creator, id, bet) in &refunded {
            log::info!("game {id} expired, {bet} refunded to {creator}");
            let text =
                format!("Game #{id} expired with no opponent. {bet} coins returned to your balance.");
            if let Err(e) = self.notifier.notify_user(creator, &text).await {
                log::debug!("expiry notification to {creator} failed: {e}");
            }
        }
        refunded.len()
    }

    /// Run the expiry sweep on an interval forever.
    pub fn spawn_sweeper(self: Arc<Self>, interval_secs: u64) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                self.sweep_expired(Utc::now()).await;
            }
        });
    }

    fn result_text(&self, game: &DiceGame, uid: UserId) -> String {
        let is_creator = uid == game.creator_id;
        let (yours, theirs) = if is_creator {
            (game.creator_roll, game.opponent_roll)
        } else {
            (game.opponent_roll, game.creator_roll)
        };
        let yours = yours.unwrap_or(0);
        let theirs = theirs.unwrap_or(0);
        let bank = game.bank();
        let verdict = match (game.outcome, is_creator) {
            (Outcome::Draw, _) => format!("Draw! Your {bet} coin stake was returned.", bet = game.bet),
            (Outcome::CreatorWon, true) | (Outcome::OpponentWon, false) => format!(
                "You won {prize} coins (bank {bank}, commission {fee}).",
                prize = bank - commission(bank),
                fee = commission(bank)
            ),
            _ => format!("You lost your {bet} coin stake.", bet = game.bet),
        };
        format!(
            "Game #{id}: you rolled {yours}, opponent rolled {theirs}. {verdict} Balance: {balance} coins.",
            id = game.id,
            balance = self.ledger.balance_of(uid)
        )
    }

    fn locked(&self) -> MutexGuard<'_, DiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::store::{MemoryStore, StoreWriter};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const HOUSE: UserId = 900;

    struct SeqRoller {
        rolls: StdMutex<VecDeque<u8>>,
    }

    impl SeqRoller {
        fn new(rolls: &[u8]) -> Self {
            Self {
                rolls: StdMutex::new(rolls.iter().copied().collect()),
            }
        }
    }

    impl DiceRoller for SeqRoller {
        fn roll(&self) -> u8 {
            self.rolls.lock().unwrap().pop_front().expect("roll queued")
        }
    }

    fn test_config() -> Config {
        Config {
            house_account: HOUSE,
            roll_settle_ms: 0,
            ..Config::default()
        }
    }

    fn service_with(rolls: &[u8]) -> (Arc<DiceService>, Arc<Ledger>, Arc<RecordingNotifier>) {
        let writer = StoreWriter::spawn(Arc::new(MemoryStore::new()), 256);
        let ledger = Arc::new(Ledger::new(writer.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = Arc::new(DiceService::new(
            &test_config(),
            Arc::clone(&ledger),
            writer,
            notifier.clone() as Arc<dyn Notifier>,
            Box::new(SeqRoller::new(rolls)),
        ));
        (service, ledger, notifier)
    }

    #[tokio::test]
    async fn create_debits_creator_and_lists_game() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(1, 100);
        let game = service.create(1, 40).unwrap();
        assert_eq!(ledger.balance_of(1), 60);
        assert!(game.is_open());
        assert_eq!(service.open_games().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_low_and_unfunded_bets() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(1, 100);
        assert_eq!(
            service.create(1, 5).unwrap_err(),
            DiceError::BetTooLow { min: 10 }
        );
        assert!(matches!(
            service.create(1, 500).unwrap_err(),
            DiceError::Ledger(crate::ledger::LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance_of(1), 100);
    }

    #[tokio::test]
    async fn full_duel_pays_winner_minus_commission() {
        // Spec scenario: creator 1000, opponent 500, bet 100, rolls 6 vs 3.
        let (service, ledger, notifier) = service_with(&[6, 3]);
        ledger.credit(1, 1000);
        ledger.credit(2, 500);

        let game = service.create(1, 100).unwrap();
        assert_eq!(ledger.balance_of(1), 900);

        let finished = service.join(2, game.id).await.unwrap();
        assert_eq!(ledger.balance_of(2), 400);
        assert_eq!(finished.outcome, Outcome::CreatorWon);
        assert_eq!(ledger.balance_of(1), 1098);
        assert_eq!(ledger.balance_of(HOUSE), 2);

        // both players were told the result
        assert_eq!(notifier.messages_for(1).len(), 1);
        assert_eq!(notifier.messages_for(2).len(), 1);
    }

    #[tokio::test]
    async fn draw_refunds_both_sides_without_commission() {
        let (service, ledger, _) = service_with(&[4, 4]);
        ledger.credit(1, 200);
        ledger.credit(2, 200);

        let game = service.create(1, 50).unwrap();
        let finished = service.join(2, game.id).await.unwrap();

        assert_eq!(finished.outcome, Outcome::Draw);
        assert_eq!(ledger.balance_of(1), 200);
        assert_eq!(ledger.balance_of(2), 200);
        assert_eq!(ledger.balance_of(HOUSE), 0);
    }

    #[tokio::test]
    async fn second_join_fails_with_already_matched() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(1, 100);
        ledger.credit(3, 100);
        let game = service.create(1, 20).unwrap();

        // pin the game in the matched state without resolving
        service.locked().games.get_mut(&game.id).unwrap().opponent_id = Some(2);

        let err = service.join(3, game.id).await.unwrap_err();
        assert_eq!(err, DiceError::AlreadyMatched(game.id));
        assert_eq!(ledger.balance_of(3), 100);
    }

    #[tokio::test]
    async fn join_missing_game_fails() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(2, 100);
        assert_eq!(service.join(2, 77).await.unwrap_err(), DiceError::NotFound(77));
        assert_eq!(ledger.balance_of(2), 100);
    }

    #[tokio::test]
    async fn cancel_refunds_only_for_the_open_creator() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(1, 100);
        let game = service.create(1, 30).unwrap();

        assert_eq!(
            service.cancel(2, game.id).unwrap_err(),
            DiceError::NotCreator(game.id)
        );
        assert_eq!(service.cancel(1, game.id).unwrap(), 30);
        assert_eq!(ledger.balance_of(1), 100);
        assert_eq!(service.cancel(1, game.id).unwrap_err(), DiceError::NotFound(game.id));
    }

    #[tokio::test]
    async fn sweep_refunds_expired_open_games_exactly() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(1, 500);
        let game = service.create(1, 120).unwrap();
        assert_eq!(ledger.balance_of(1), 380);

        // too young: untouched
        assert_eq!(service.sweep_expired(Utc::now()).await, 0);

        let later = Utc::now() + chrono::Duration::seconds(121);
        assert_eq!(service.sweep_expired(later).await, 1);
        assert_eq!(ledger.balance_of(1), 500);
        assert!(service.get(game.id).is_none());
    }

    #[tokio::test]
    async fn sweep_ignores_matched_games() {
        let (service, ledger, _) = service_with(&[]);
        ledger.credit(1, 100);
        let game = service.create(1, 20).unwrap();
        service.locked().games.get_mut(&game.id).unwrap().opponent_id = Some(2);

        let later = Utc::now() + chrono::Duration::seconds(500);
        assert_eq!(service.sweep_expired(later).await, 0);
        assert!(service.get(game.id).is_some());
    }

    #[test]
    fn resolution_conserves_coins_for_all_rolls() {
        use proptest::prelude::*;

        let runtime = tokio::runtime::Runtime::new().unwrap();
        proptest!(|(bet in 10i64..10_000, creator_roll in 1u8..=6, opponent_roll in 1u8..=6)| {
            runtime.block_on(async {
                let (service, ledger, _) = service_with(&[creator_roll, opponent_roll]);
                ledger.credit(1, bet);
                ledger.credit(2, bet);

                let game = service.create(1, bet).unwrap();
                service.join(2, game.id).await.unwrap();

                let total = ledger.balance_of(1) + ledger.balance_of(2) + ledger.balance_of(HOUSE);
                prop_assert_eq!(total, 2 * bet);
                Ok(())
            })?;
        });
    }
}
