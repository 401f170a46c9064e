use super::action::{TradeAction, TradeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An open position held by an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub trade_type: TradeType,
    /// Always positive; direction lives in `trade_type`.
    pub quantity: f64,
    pub entry_price: f64,
    /// Capital committed when the position was opened.
    pub notional: f64,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.trade_type {
            TradeType::Long => (price - self.entry_price) * self.quantity,
            TradeType::Short => (self.entry_price - price) * self.quantity,
        }
    }

    /// Value the position contributes to the portfolio at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.trade_type {
            TradeType::Long => self.quantity * price,
            TradeType::Short => self.notional + self.unrealized_pnl(price),
        }
    }
}

pub type PositionBook = BTreeMap<String, Position>;

/// A completed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub trade_type: TradeType,
    pub price: f64,
    pub quantity: f64,
    pub notional: f64,
    pub fee: f64,
    /// Realized P&L, set when the trade closes a position.
    pub pnl: Option<f64>,
}

/// Portfolio value at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
    pub cash: f64,
    pub positions_value: f64,
    pub positions_count: usize,
    pub total_pnl: f64,
}

/// Position book at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub trade_type: TradeType,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub notional: f64,
}

/// Read-only view of an executor handed to signal generators and coordinators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub cash: f64,
    pub total_value: f64,
    pub positions: PositionBook,
}

impl PortfolioContext {
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(trade_type: TradeType) -> Position {
        Position {
            symbol: "BTC-USD".into(),
            trade_type,
            quantity: 2.0,
            entry_price: 100.0,
            notional: 200.0,
        }
    }

    #[test]
    fn test_long_value_tracks_price() {
        let p = position(TradeType::Long);
        assert_eq!(p.unrealized_pnl(110.0), 20.0);
        assert_eq!(p.market_value(110.0), 220.0);
    }

    #[test]
    fn test_short_gains_when_price_falls() {
        let p = position(TradeType::Short);
        assert_eq!(p.unrealized_pnl(90.0), 20.0);
        assert_eq!(p.market_value(90.0), 220.0);
        assert_eq!(p.market_value(110.0), 180.0);
    }
}
