//! Signal and decision payloads exchanged between analysis and coordination.

use super::action::{TradeAction, TradeType};
use super::market_data::IndicatorBundle;
use serde::{Deserialize, Serialize};

/// Exit conditions proposed by an AI signal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitPlan {
    #[serde(default)]
    pub profit_target_pct: Option<f64>,
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    #[serde(default)]
    pub invalidation_condition: Option<String>,
}

/// Output of an AI-assisted signal source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSignal {
    pub action: TradeAction,
    pub trade_type: TradeType,
    pub reasoning: String,
    /// 0 to 100.
    pub confidence: f64,
    pub exit_plan: Option<ExitPlan>,
}

/// Everything known about one symbol for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAnalysis {
    pub symbol: String,
    pub indicators: IndicatorBundle,
    pub technical_action: TradeAction,
    pub technical_trade_type: TradeType,
    pub ai: Option<AiSignal>,
}

impl AssetAnalysis {
    pub fn new(
        indicators: IndicatorBundle,
        technical: (TradeAction, TradeType),
        ai: Option<AiSignal>,
    ) -> Self {
        Self {
            symbol: indicators.symbol.clone(),
            indicators,
            technical_action: technical.0,
            technical_trade_type: technical.1,
            ai,
        }
    }
}

/// A single trade a coordinator approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeApproval {
    pub symbol: String,
    pub action: TradeAction,
    pub trade_type: TradeType,
}

impl TradeApproval {
    pub fn new(symbol: impl Into<String>, action: TradeAction, trade_type: TradeType) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            trade_type,
        }
    }
}

/// One coordinated decision for all symbols of an instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioDecision {
    pub reasoning: String,
    /// Ordered: approvals are executed in this order.
    pub trades: Vec<TradeApproval>,
}
