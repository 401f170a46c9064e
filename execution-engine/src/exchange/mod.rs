pub mod mock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trading::TradeAction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub side: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

pub trait Exchange: Send {
    fn submit(&mut self, symbol: &str, side: TradeAction, quantity: f64, market_price: f64)
        -> Fill;

    /// Fee charged on a fill of the given notional.
    fn fee_for(&self, notional: f64) -> f64;
}
