use crate::model::{
    config::TradingConfig,
    decision::{AssetAnalysis, PortfolioDecision},
    portfolio::PortfolioContext,
};
use anyhow::Result;
use async_trait::async_trait;

/// Combines the per-symbol analyses of one instance into a single decision.
#[async_trait]
pub trait DecisionCoordinator: Send + Sync {
    /// # Arguments
    ///
    /// * `config` - The instance configuration (position limits, model).
    /// * `analyses` - One entry per symbol that could be analyzed this cycle.
    /// * `portfolio` - Current cash, value and open positions.
    async fn decide(
        &self,
        config: &TradingConfig,
        analyses: &[AssetAnalysis],
        portfolio: &PortfolioContext,
    ) -> Result<PortfolioDecision>;
}
