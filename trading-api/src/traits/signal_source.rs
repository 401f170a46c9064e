//! Signal contracts.
//!
//! A [`SignalSource`] turns market data into indicators and a technical
//! signal. An [`AiSignalSource`] is the optional model-backed second
//! opinion; an instance holds one only when AI signals are enabled.

use crate::model::{
    action::{TradeAction, TradeType},
    decision::AiSignal,
    market_data::IndicatorBundle,
    portfolio::PortfolioContext,
};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Computes indicators for `symbol`.
    ///
    /// Returns `Ok(None)` when there is not enough data, which callers treat
    /// as "skip this symbol", not as a failure.
    async fn analyze(&self, symbol: &str) -> Result<Option<IndicatorBundle>>;

    /// Pure rule-based signal derived from the bundle.
    fn signal(&self, indicators: &IndicatorBundle) -> (TradeAction, TradeType);
}

#[async_trait]
pub trait AiSignalSource: Send + Sync {
    /// Asks the model for a signal.
    ///
    /// Returns `Ok(None)` when the model produced nothing usable.
    async fn ai_signal(
        &self,
        indicators: &IndicatorBundle,
        portfolio: &PortfolioContext,
    ) -> Result<Option<AiSignal>>;
}
