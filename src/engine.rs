//! Composition root: wires the services together and runs the workers.

use crate::admin::AdminService;
use crate::config::Config;
use crate::deposit::{DepositFeed, DepositReconciler, TonFeed};
use crate::dice::{DiceGame, DiceRoller, DiceService, RandomRoller};
use crate::ledger::{Ledger, UserId};
use crate::notify::Notifier;
use crate::raffle::RaffleService;
use crate::rate::{HttpRateProvider, RateCache, RateProvider};
use crate::stats::{self, UserStats};
use crate::store::{Store, StoreWriter};
use crate::transfer::{TransferService, WithdrawalIntake};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Number of entries on the profit leaderboard.
const RATING_LIMIT: usize = 10;

/// Everything the chat layer talks to.
///
/// Construction preloads the ledger and the deposit dedupe set from the
/// store; the background workers (expiry sweep, deposit poll) only run once
/// [`Engine::spawn_workers`] is called, so embedders and tests can drive
/// the services directly instead.
pub struct Engine {
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub rate: Arc<RateCache>,
    pub dice: Arc<DiceService>,
    pub raffle: Arc<RaffleService>,
    pub transfers: TransferService,
    pub withdrawals: WithdrawalIntake,
    pub admin: AdminService,
    pub deposits: Arc<DepositReconciler>,
    store: Arc<dyn Store>,
    writer: StoreWriter,
}

impl Engine {
    /// Build an engine with every external seam injected.
    pub async fn new(
        config: Config,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        roller: Box<dyn DiceRoller>,
        rate_provider: Box<dyn RateProvider>,
        feed: Box<dyn DepositFeed>,
    ) -> anyhow::Result<Self> {
        let writer = StoreWriter::spawn(Arc::clone(&store), config.write_queue_capacity);

        let ledger = Arc::new(Ledger::new(writer.clone()));
        let accounts = store.load_accounts().await?;
        log::info!("loaded {} accounts from the store", accounts.len());
        ledger.preload(accounts);

        let processed = store.processed_deposit_ids().await?;
        log::info!("seeded {} processed deposit ids", processed.len());

        let rate = Arc::new(RateCache::new(
            rate_provider,
            Duration::from_secs(config.rate_ttl_secs),
            config.rate_fallback,
        ));

        let dice = Arc::new(DiceService::new(
            &config,
            Arc::clone(&ledger),
            writer.clone(),
            Arc::clone(&notifier),
            roller,
        ));
        let raffle = RaffleService::new(
            &config,
            Arc::clone(&ledger),
            writer.clone(),
            Arc::clone(&notifier),
        );
        let transfers = TransferService::new(
            Arc::clone(&ledger),
            writer.clone(),
            Arc::clone(&notifier),
        );
        let withdrawals = WithdrawalIntake::new(
            Arc::clone(&ledger),
            Arc::clone(&rate),
            Arc::clone(&notifier),
        );
        let admin = AdminService::new(&config, Arc::clone(&ledger), Arc::clone(&rate));
        let deposits = Arc::new(DepositReconciler::new(
            feed,
            Arc::clone(&ledger),
            Arc::clone(&rate),
            writer.clone(),
            Arc::clone(&notifier),
            processed,
        ));

        Ok(Self {
            config,
            ledger,
            rate,
            dice,
            raffle,
            transfers,
            withdrawals,
            admin,
            deposits,
            store,
            writer,
        })
    }

    /// Build an engine with the production seams: real randomness, the HTTP
    /// rate provider, and the chain deposit feed.
    pub async fn with_defaults(
        config: Config,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let rate_provider = Box::new(HttpRateProvider::new(config.rate_url.clone()));
        let feed = Box::new(TonFeed::new(&config.deposit_address));
        Self::new(
            config,
            store,
            notifier,
            Box::new(RandomRoller),
            rate_provider,
            feed,
        )
        .await
    }

    /// Start the expiry sweeper and the deposit poller.
    pub fn spawn_workers(&self) {
        Arc::clone(&self.dice).spawn_sweeper(self.config.sweep_interval_secs);
        Arc::clone(&self.deposits).spawn_poller(self.config.deposit_poll_secs);
    }

    /// A user's most recent finished games, capped by the history limit.
    pub async fn history(&self, uid: UserId) -> anyhow::Result<Vec<DiceGame>> {
        let mut games = self.store.finished_games_for_user(uid).await?;
        games.truncate(self.config.history_limit);
        Ok(games)
    }

    /// Day/week/month aggregates for one user.
    pub async fn stats_for(&self, uid: UserId) -> anyhow::Result<UserStats> {
        let games = self.store.finished_games_for_user(uid).await?;
        Ok(stats::user_stats(uid, &games, Utc::now()))
    }

    /// Top players by all-time stake profit.
    pub async fn rating(&self) -> anyhow::Result<Vec<(UserId, i64)>> {
        let games = self.store.all_finished_games().await?;
        Ok(stats::profit_rating(&games, RATING_LIMIT))
    }

    /// Durable writes dropped or failed since startup.
    pub fn write_failures(&self) -> u64 {
        self.writer.failures()
    }
}
