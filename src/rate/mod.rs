//! External currency rate with TTL caching and graceful degradation.
//!
//! Deposits and withdrawal quotes need the external-currency/coin rate, but
//! the provider is a third-party HTTP endpoint and must never be able to
//! stall or poison the ledger. [`RateCache::rate`] therefore always returns
//! a usable positive number: fresh when possible, stale when the provider
//! fails, and a fixed fallback before the first successful fetch.

pub mod http;

pub use http::HttpRateProvider;

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Source of the external currency rate (coins per one external unit).
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<f64>;
}

struct CachedRate {
    value: f64,
    fetched_at: Instant,
}

/// TTL cache over a [`RateProvider`].
pub struct RateCache {
    provider: Box<dyn RateProvider>,
    ttl: Duration,
    fallback: f64,
    cached: Mutex<Option<CachedRate>>,
}

impl RateCache {
    pub fn new(provider: Box<dyn RateProvider>, ttl: Duration, fallback: f64) -> Self {
        Self {
            provider,
            ttl,
            fallback,
            cached: Mutex::new(None),
        }
    }

    /// Current rate.
    ///
    /// Refreshes from the provider only when the cached value is older than
    /// the TTL. Provider failures (and non-positive or non-finite responses)
    /// degrade to the last good value, or to the fallback constant when
    /// nothing was ever fetched. Never returns an error.
    pub async fn rate(&self) -> f64 {
        if let Some(cached) = self.locked().as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.value;
            }
        }

        match self.provider.fetch().await {
            Ok(value) if value.is_finite() && value > 0.0 => {
                *self.locked() = Some(CachedRate {
                    value,
                    fetched_at: Instant::now(),
                });
                value
            }
            Ok(value) => {
                log::warn!("rate provider returned unusable value {value}, keeping stale rate");
                self.stale_or_fallback()
            }
            Err(e) => {
                log::warn!("rate provider failed: {e}, keeping stale rate");
                self.stale_or_fallback()
            }
        }
    }

    fn stale_or_fallback(&self) -> f64 {
        self.locked()
            .as_ref()
            .map(|c| c.value)
            .unwrap_or(self.fallback)
    }

    fn locked(&self) -> MutexGuard<'_, Option<CachedRate>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
