//! Market data models.
//!
//! Includes the raw `Candle` the feeds produce and the `IndicatorBundle`
//! handed to signal generators and executors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Technical snapshot of a symbol at analysis time.
///
/// Indicators that could not be computed from the available history are
/// `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub symbol: String,
    pub close_price: f64,
    pub volume: f64,
    /// Most recent closes, oldest first.
    pub historical_prices: Vec<f64>,
    /// Most recent volumes, oldest first.
    pub historical_volumes: Vec<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub rsi: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub ema_50: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl IndicatorBundle {
    /// A bundle carrying only a price, used where no indicator history exists.
    pub fn from_price(symbol: impl Into<String>, close_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            close_price,
            ..Default::default()
        }
    }
}
