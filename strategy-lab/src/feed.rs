//! Market data sources.
//!
//! The synthetic feed simulates a random walk per symbol so the whole system
//! can run without an exchange connection.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use trading::Candle;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Most recent candles for `symbol`, oldest first, at most `limit` of them.
    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;
}

/// A random walk generator, one walk per symbol.
///
/// The first request for a symbol backfills `history_len` one-minute candles,
/// every later request advances the walk by one candle.
pub struct SyntheticFeed {
    history_len: usize,
    volatility: f64,
    series: Mutex<HashMap<String, Vec<Candle>>>,
}

impl SyntheticFeed {
    pub fn new(history_len: usize, volatility: f64) -> Self {
        Self {
            history_len,
            volatility,
            series: Mutex::new(HashMap::new()),
        }
    }

    /// Deterministic starting price in [50, 50_050) so symbols differ.
    fn start_price(symbol: &str) -> f64 {
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        50.0 + (hasher.finish() % 50_000) as f64
    }

    fn next_candle(&self, prev_close: f64, timestamp: chrono::DateTime<Utc>) -> Candle {
        let mut rng = rand::thread_rng();

        // Random walk: +/- volatility
        let change_pct = rng.gen_range(-self.volatility..=self.volatility);
        let close = (prev_close * (1.0 + change_pct)).max(0.01);
        let wick = prev_close.max(close) * rng.gen_range(0.0..=self.volatility / 2.0);
        let volume = rng.gen_range(100.0..10_000.0);

        Candle::new(
            timestamp,
            prev_close,
            prev_close.max(close) + wick,
            (prev_close.min(close) - wick).max(0.01),
            close,
            volume,
        )
    }

    fn backfill(&self, symbol: &str) -> Vec<Candle> {
        let now = Utc::now();
        let mut price = Self::start_price(symbol);
        let mut candles = Vec::with_capacity(self.history_len);
        for i in (0..self.history_len).rev() {
            let candle = self.next_candle(price, now - Duration::minutes(i as i64));
            price = candle.close;
            candles.push(candle);
        }
        candles
    }
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self::new(120, 0.01)
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticFeed {
    async fn candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let mut series = self
            .series
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match series.get_mut(symbol) {
            Some(candles) => {
                let last = candles.last().map(|c| (c.close, c.timestamp));
                if let Some((close, ts)) = last {
                    let candle = self.next_candle(close, ts.max(Utc::now()));
                    candles.push(candle);
                }
                if candles.len() > self.history_len {
                    let excess = candles.len() - self.history_len;
                    candles.drain(..excess);
                }
            }
            None => {
                let candles = self.backfill(symbol);
                series.insert(symbol.to_string(), candles);
            }
        }

        let candles = series.get(symbol).map(Vec::as_slice).unwrap_or_default();
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }
}
