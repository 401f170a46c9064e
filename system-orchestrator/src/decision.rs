//! Structured record of one processed cycle of one instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trading::{ExitPlan, IndicatorBundle, PortfolioSnapshot, TradeAction, TradeApproval, TradeRecord, TradeType};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
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

impl From<&IndicatorBundle> for IndicatorSnapshot {
    fn from(b: &IndicatorBundle) -> Self {
        Self {
            macd: b.macd,
            macd_signal: b.macd_signal,
            macd_histogram: b.macd_histogram,
            rsi: b.rsi,
            ema_12: b.ema_12,
            ema_26: b.ema_26,
            ema_50: b.ema_50,
            bb_upper: b.bb_upper,
            bb_middle: b.bb_middle,
            bb_lower: b.bb_lower,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDecision {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub indicators: IndicatorSnapshot,
    pub action: TradeAction,
    pub trade_type: TradeType,
    pub ai_reasoning: Option<String>,
    pub ai_confidence: Option<f64>,
    pub exit_plan: Option<ExitPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub symbol: String,
    pub action: TradeAction,
    pub trade_type: TradeType,
    /// `None` when the executor rejected the approved trade.
    pub trade: Option<TradeRecord>,
}

impl ExecutedTrade {
    pub fn succeeded(&self) -> bool {
        self.trade.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioDecisionRecord {
    pub reasoning: String,
    pub trades_proposed: Vec<TradeApproval>,
    pub trades_executed: Vec<ExecutedTrade>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioState {
    pub total_value: f64,
    pub cash: f64,
    pub positions_value: f64,
    pub positions_count: usize,
    pub total_pnl: f64,
}

impl From<&PortfolioSnapshot> for PortfolioState {
    fn from(s: &PortfolioSnapshot) -> Self {
        Self {
            total_value: s.total_value,
            cash: s.cash,
            positions_value: s.positions_value,
            positions_count: s.positions_count,
            total_pnl: s.total_pnl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub timestamp: DateTime<Utc>,
    pub check_number: u64,
    pub symbol_decisions: Vec<SymbolDecision>,
    pub portfolio_decision: PortfolioDecisionRecord,
    pub portfolio: PortfolioState,
}

impl DecisionEntry {
    pub fn new(timestamp: DateTime<Utc>, check_number: u64) -> Self {
        Self {
            timestamp,
            check_number,
            ..Default::default()
        }
    }
}
