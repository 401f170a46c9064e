use crate::exchange::{mock::MockExchange, Exchange};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use trading::{
    Executor, IndicatorBundle, PortfolioSnapshot, Position, PositionBook, PositionSnapshot,
    TradeAction, TradeIntent, TradeRecord, TradeType, TradingConfig,
};

/// Paper account of one trading instance.
///
/// Longs are bought outright with cash. Shorts reserve their opening
/// notional from cash and return it, plus or minus the price move, on close.
pub struct PaperExecutor {
    initial_capital: f64,
    cash: f64,
    risk_per_trade: f64,
    max_positions: usize,
    exchange: Box<dyn Exchange>,
    positions: PositionBook,
    prices: HashMap<String, f64>,
    trades: Vec<TradeRecord>,
    portfolio_history: Vec<PortfolioSnapshot>,
    position_history: Vec<PositionSnapshot>,
}

impl PaperExecutor {
    pub fn new(config: &TradingConfig, exchange: Box<dyn Exchange>) -> Self {
        Self {
            initial_capital: config.initial_capital,
            cash: config.initial_capital,
            risk_per_trade: config.risk_per_trade,
            max_positions: config.max_positions,
            exchange,
            positions: PositionBook::new(),
            prices: HashMap::new(),
            trades: Vec::new(),
            portfolio_history: Vec::new(),
            position_history: Vec::new(),
        }
    }

    pub fn with_fee_rate(config: &TradingConfig, fee_rate: f64) -> Self {
        Self::new(config, Box::new(MockExchange::new(fee_rate)))
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    fn price_for(&self, symbol: &str, market: &IndicatorBundle) -> Option<f64> {
        if market.close_price > 0.0 {
            return Some(market.close_price);
        }
        self.prices.get(symbol).copied().filter(|p| *p > 0.0)
    }

    fn last_price(&self, position: &Position) -> f64 {
        self.prices
            .get(&position.symbol)
            .copied()
            .unwrap_or(position.entry_price)
    }

    fn positions_value(&self) -> f64 {
        self.positions
            .values()
            .map(|p| p.market_value(self.last_price(p)))
            .sum()
    }

    fn open(&mut self, symbol: &str, trade_type: TradeType, price: f64) -> Option<TradeRecord> {
        if self.positions.contains_key(symbol) {
            debug!("PaperExecutor: {} already has an open position", symbol);
            return None;
        }
        if self.positions.len() >= self.max_positions {
            debug!("PaperExecutor: position limit {} reached", self.max_positions);
            return None;
        }

        // Notional plus its fee must fit in cash.
        let budget = self.portfolio_value() * self.risk_per_trade;
        let affordable = self.cash / (1.0 + self.exchange.fee_for(1.0));
        let notional = budget.min(affordable);
        if notional <= 0.0 {
            warn!("PaperExecutor: no cash available to open {}", symbol);
            return None;
        }

        let side = match trade_type {
            TradeType::Long => TradeAction::Buy,
            TradeType::Short => TradeAction::Sell,
        };
        let fill = self.exchange.submit(symbol, side, notional / price, price);
        self.cash -= fill.notional() + fill.fee;

        self.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                trade_type,
                quantity: fill.quantity,
                entry_price: fill.price,
                notional: fill.notional(),
            },
        );

        info!(
            "PaperExecutor: opened {} {} qty={:.6} @ {:.2}",
            trade_type, symbol, fill.quantity, fill.price
        );

        Some(self.record(fill.timestamp, symbol, side, trade_type, &fill, None))
    }

    fn close(&mut self, symbol: &str, trade_type: TradeType, price: f64) -> Option<TradeRecord> {
        match self.positions.get(symbol) {
            Some(p) if p.trade_type == trade_type => {}
            _ => {
                debug!("PaperExecutor: no {} position in {} to close", trade_type, symbol);
                return None;
            }
        }
        let position = self.positions.remove(symbol)?;

        let side = match trade_type {
            TradeType::Long => TradeAction::Sell,
            TradeType::Short => TradeAction::Buy,
        };
        let fill = self.exchange.submit(symbol, side, position.quantity, price);
        let gross = position.unrealized_pnl(fill.price);
        self.cash += position.market_value(fill.price) - fill.fee;

        info!(
            "PaperExecutor: closed {} {} qty={:.6} @ {:.2} pnl={:.2}",
            trade_type,
            symbol,
            fill.quantity,
            fill.price,
            gross - fill.fee
        );

        Some(self.record(
            fill.timestamp,
            symbol,
            side,
            trade_type,
            &fill,
            Some(gross - fill.fee),
        ))
    }

    fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        symbol: &str,
        action: TradeAction,
        trade_type: TradeType,
        fill: &crate::exchange::Fill,
        pnl: Option<f64>,
    ) -> TradeRecord {
        let record = TradeRecord {
            timestamp,
            symbol: symbol.to_string(),
            action,
            trade_type,
            price: fill.price,
            quantity: fill.quantity,
            notional: fill.notional(),
            fee: fill.fee,
            pnl,
        };
        self.trades.push(record.clone());
        record
    }
}

impl Executor for PaperExecutor {
    fn current_capital(&self) -> f64 {
        self.cash
    }

    fn portfolio_value(&self) -> f64 {
        self.cash + self.positions_value()
    }

    fn positions(&self) -> &PositionBook {
        &self.positions
    }

    fn mark_price(&mut self, symbol: &str, price: f64) {
        if price > 0.0 {
            self.prices.insert(symbol.to_string(), price);
        }
    }

    fn execute_trade(
        &mut self,
        symbol: &str,
        action: TradeAction,
        trade_type: TradeType,
        market: &IndicatorBundle,
    ) -> Option<TradeRecord> {
        let Some(price) = self.price_for(symbol, market) else {
            warn!("PaperExecutor: no price for {}, trade skipped", symbol);
            return None;
        };
        self.mark_price(symbol, price);

        match action.intent(trade_type) {
            TradeIntent::OpenLong => self.open(symbol, TradeType::Long, price),
            TradeIntent::OpenShort => self.open(symbol, TradeType::Short, price),
            TradeIntent::CloseLong => self.close(symbol, TradeType::Long, price),
            TradeIntent::CloseShort => self.close(symbol, TradeType::Short, price),
            TradeIntent::Hold => None,
        }
    }

    fn snapshot_positions(&mut self, timestamp: DateTime<Utc>) {
        let snapshots: Vec<PositionSnapshot> = self
            .positions
            .values()
            .map(|p| {
                let current_price = self.last_price(p);
                PositionSnapshot {
                    timestamp,
                    symbol: p.symbol.clone(),
                    trade_type: p.trade_type,
                    quantity: p.quantity,
                    entry_price: p.entry_price,
                    current_price,
                    unrealized_pnl: p.unrealized_pnl(current_price),
                    notional: p.notional,
                }
            })
            .collect();
        self.position_history.extend(snapshots);
    }

    fn snapshot_portfolio(&mut self, timestamp: DateTime<Utc>) {
        let positions_value = self.positions_value();
        let total_value = self.cash + positions_value;
        self.portfolio_history.push(PortfolioSnapshot {
            timestamp,
            total_value,
            cash: self.cash,
            positions_value,
            positions_count: self.positions.len(),
            total_pnl: total_value - self.initial_capital,
        });
    }

    fn portfolio_history(&self) -> &[PortfolioSnapshot] {
        &self.portfolio_history
    }

    fn trade_history(&self) -> &[TradeRecord] {
        &self.trades
    }

    fn position_history(&self) -> &[PositionSnapshot] {
        &self.position_history
    }
}

#[cfg(test)]
mod tests;
