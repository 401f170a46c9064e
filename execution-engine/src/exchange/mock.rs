use super::{Exchange, Fill};
use chrono::Utc;
use trading::TradeAction;

pub struct MockExchange {
    fee_rate: f64, // e.g. 0.001 for 10 bps
}

impl MockExchange {
    pub fn new(fee_rate: f64) -> Self {
        Self { fee_rate }
    }
}

impl Exchange for MockExchange {
    fn submit(
        &mut self,
        symbol: &str,
        side: TradeAction,
        quantity: f64,
        market_price: f64,
    ) -> Fill {
        // Perfect fill at market price, no slippage.
        Fill {
            symbol: symbol.to_string(),
            side,
            quantity,
            price: market_price,
            fee: self.fee_for(quantity * market_price),
            timestamp: Utc::now(),
        }
    }

    fn fee_for(&self, notional: f64) -> f64 {
        notional * self.fee_rate
    }
}
