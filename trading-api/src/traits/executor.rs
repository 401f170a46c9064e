use crate::model::{
    action::{TradeAction, TradeType},
    market_data::IndicatorBundle,
    portfolio::{PortfolioContext, PortfolioSnapshot, PositionBook, PositionSnapshot, TradeRecord},
};
use chrono::{DateTime, Utc};

/// Owns the trade state of a single instance.
///
/// Every method is synchronous: callers hold the executor only for the
/// duration of one call and never across an await point.
pub trait Executor: Send {
    /// Cash not committed to positions.
    fn current_capital(&self) -> f64;

    /// Cash plus marked value of every open position.
    fn portfolio_value(&self) -> f64;

    fn positions(&self) -> &PositionBook;

    /// Records the latest known price of `symbol` for valuation.
    fn mark_price(&mut self, symbol: &str, price: f64);

    /// Attempts a trade.
    ///
    /// # Arguments
    ///
    /// * `symbol` - The symbol to trade.
    /// * `action` / `trade_type` - The intent, see [`TradeAction::intent`].
    /// * `market` - Indicator context; its close price is the fill price.
    ///
    /// # Returns
    ///
    /// * `Some(TradeRecord)` if the trade was filled, `None` if it was not
    ///   possible (no cash, nothing to close, position limit reached, hold).
    fn execute_trade(
        &mut self,
        symbol: &str,
        action: TradeAction,
        trade_type: TradeType,
        market: &IndicatorBundle,
    ) -> Option<TradeRecord>;

    fn snapshot_positions(&mut self, timestamp: DateTime<Utc>);

    fn snapshot_portfolio(&mut self, timestamp: DateTime<Utc>);

    /// Portfolio snapshots, oldest first.
    fn portfolio_history(&self) -> &[PortfolioSnapshot];

    /// Filled trades, oldest first.
    fn trade_history(&self) -> &[TradeRecord];

    /// Position snapshots, oldest first.
    fn position_history(&self) -> &[PositionSnapshot];

    /// A detached copy of the state signal generators may look at.
    fn context(&self) -> PortfolioContext {
        PortfolioContext {
            cash: self.current_capital(),
            total_value: self.portfolio_value(),
            positions: self.positions().clone(),
        }
    }
}

impl Executor for Box<dyn Executor> {
    fn current_capital(&self) -> f64 {
        (**self).current_capital()
    }

    fn portfolio_value(&self) -> f64 {
        (**self).portfolio_value()
    }

    fn positions(&self) -> &PositionBook {
        (**self).positions()
    }

    fn mark_price(&mut self, symbol: &str, price: f64) {
        (**self).mark_price(symbol, price)
    }

    fn execute_trade(
        &mut self,
        symbol: &str,
        action: TradeAction,
        trade_type: TradeType,
        market: &IndicatorBundle,
    ) -> Option<TradeRecord> {
        (**self).execute_trade(symbol, action, trade_type, market)
    }

    fn snapshot_positions(&mut self, timestamp: DateTime<Utc>) {
        (**self).snapshot_positions(timestamp)
    }

    fn snapshot_portfolio(&mut self, timestamp: DateTime<Utc>) {
        (**self).snapshot_portfolio(timestamp)
    }

    fn portfolio_history(&self) -> &[PortfolioSnapshot] {
        (**self).portfolio_history()
    }

    fn trade_history(&self) -> &[TradeRecord] {
        (**self).trade_history()
    }

    fn position_history(&self) -> &[PositionSnapshot] {
        (**self).position_history()
    }
}
