use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::fmt::Write;
use trading::{
    AssetAnalysis, DecisionCoordinator, PortfolioContext, PortfolioDecision, TradeAction,
    TradeApproval, TradeIntent, TradeType, TradingConfig,
};

#[derive(Debug, Clone)]
pub struct DecisionManagerConfig {
    /// AI signals below this confidence (percent) fall back to the technical signal.
    pub ai_confidence_threshold: f64,
    /// Confidence assigned to purely technical signals when ranking openings.
    pub technical_confidence: f64,
}

impl Default for DecisionManagerConfig {
    fn default() -> Self {
        Self {
            ai_confidence_threshold: 60.0,
            technical_confidence: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Recommendation<'a> {
    symbol: &'a str,
    action: TradeAction,
    trade_type: TradeType,
    confidence: f64,
    source: &'static str,
}

impl Recommendation<'_> {
    fn intent(&self) -> TradeIntent {
        self.action.intent(self.trade_type)
    }

    fn approval(&self) -> TradeApproval {
        TradeApproval::new(self.symbol, self.action, self.trade_type)
    }
}

/// Merges the per-symbol analyses of one instance into a single decision.
///
/// Closing signals on open positions are approved first. Openings are then
/// ranked by confidence and approved only while position slots remain.
pub struct PortfolioDecisionManager {
    config: DecisionManagerConfig,
}

impl PortfolioDecisionManager {
    pub fn new(config: DecisionManagerConfig) -> Self {
        Self { config }
    }

    fn recommend<'a>(&self, analysis: &'a AssetAnalysis) -> Recommendation<'a> {
        match &analysis.ai {
            Some(ai) if ai.confidence >= self.config.ai_confidence_threshold => Recommendation {
                symbol: &analysis.symbol,
                action: ai.action,
                trade_type: ai.trade_type,
                confidence: ai.confidence,
                source: "AI",
            },
            _ => Recommendation {
                symbol: &analysis.symbol,
                action: analysis.technical_action,
                trade_type: analysis.technical_trade_type,
                confidence: self.config.technical_confidence,
                source: "technical",
            },
        }
    }

    /// Pure decision logic, shared by the async trait implementation.
    pub fn coordinate(
        &self,
        config: &TradingConfig,
        analyses: &[AssetAnalysis],
        portfolio: &PortfolioContext,
    ) -> PortfolioDecision {
        let recommendations: Vec<Recommendation> =
            analyses.iter().map(|a| self.recommend(a)).collect();

        let mut reasoning = String::new();
        let mut trades = Vec::new();

        for rec in &recommendations {
            let _ = writeln!(
                reasoning,
                "{}: {} {} ({}, confidence {:.0}%)",
                rec.symbol, rec.action, rec.trade_type, rec.source, rec.confidence
            );
        }

        // Closes first
        for rec in recommendations.iter().filter(|r| r.intent().is_closing()) {
            match portfolio.position(rec.symbol) {
                Some(p) if p.trade_type == rec.trade_type => {
                    let _ = writeln!(reasoning, "- close {} {} approved", rec.trade_type, rec.symbol);
                    trades.push(rec.approval());
                }
                _ => {
                    debug!("DecisionManager: nothing to close for {}", rec.symbol);
                }
            }
        }

        let remaining = portfolio.positions.len().saturating_sub(trades.len());
        let mut slots = config.max_positions.saturating_sub(remaining);

        let mut openings: Vec<&Recommendation> = recommendations
            .iter()
            .filter(|r| r.intent().is_opening())
            .filter(|r| portfolio.position(r.symbol).is_none())
            .collect();
        openings.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        for rec in openings {
            if slots == 0 {
                let _ = writeln!(
                    reasoning,
                    "- open {} {} skipped: position limit {} reached",
                    rec.trade_type, rec.symbol, config.max_positions
                );
                continue;
            }
            let _ = writeln!(reasoning, "- open {} {} approved", rec.trade_type, rec.symbol);
            trades.push(rec.approval());
            slots -= 1;
        }

        if trades.is_empty() {
            reasoning.push_str("No trades approved this cycle.");
        }

        info!(
            "DecisionManager: {} symbol(s) analyzed, {} trade(s) approved for {}",
            analyses.len(),
            trades.len(),
            config.model_id
        );

        PortfolioDecision { reasoning, trades }
    }
}

impl Default for PortfolioDecisionManager {
    fn default() -> Self {
        Self::new(DecisionManagerConfig::default())
    }
}

#[async_trait]
impl DecisionCoordinator for PortfolioDecisionManager {
    async fn decide(
        &self,
        config: &TradingConfig,
        analyses: &[AssetAnalysis],
        portfolio: &PortfolioContext,
    ) -> Result<PortfolioDecision> {
        Ok(self.coordinate(config, analyses, portfolio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading::{AiSignal, IndicatorBundle, Position};

    fn analysis(symbol: &str, technical: (TradeAction, TradeType), ai: Option<AiSignal>) -> AssetAnalysis {
        AssetAnalysis::new(IndicatorBundle::from_price(symbol, 100.0), technical, ai)
    }

    fn ai(action: TradeAction, trade_type: TradeType, confidence: f64) -> Option<AiSignal> {
        Some(AiSignal {
            action,
            trade_type,
            reasoning: "test".into(),
            confidence,
            exit_plan: None,
        })
    }

    fn long(symbol: &str) -> Position {
        Position {
            symbol: symbol.into(),
            trade_type: TradeType::Long,
            quantity: 1.0,
            entry_price: 100.0,
            notional: 100.0,
        }
    }

    fn config(max_positions: usize) -> TradingConfig {
        TradingConfig::new(vec!["A".into()], "m1").with_max_positions(max_positions)
    }

    #[tokio::test]
    async fn test_low_confidence_ai_falls_back_to_technical() {
        let manager = PortfolioDecisionManager::default();
        let analyses = vec![analysis(
            "A",
            (TradeAction::Buy, TradeType::Long),
            ai(TradeAction::Sell, TradeType::Short, 40.0),
        )];

        let decision = manager
            .decide(&config(3), &analyses, &PortfolioContext::default())
            .await
            .unwrap();
        assert_eq!(
            decision.trades,
            vec![TradeApproval::new("A", TradeAction::Buy, TradeType::Long)]
        );
    }

    #[test]
    fn test_closes_first_then_openings_by_confidence() {
        let manager = PortfolioDecisionManager::default();
        let mut portfolio = PortfolioContext::default();
        portfolio.positions.insert("A".into(), long("A"));
        portfolio.positions.insert("B".into(), long("B"));

        let analyses = vec![
            analysis("C", (TradeAction::Buy, TradeType::Long), ai(TradeAction::Buy, TradeType::Long, 65.0)),
            analysis("A", (TradeAction::Sell, TradeType::Long), None),
            analysis("D", (TradeAction::Hold, TradeType::Long), ai(TradeAction::Sell, TradeType::Short, 90.0)),
            // Already held: no second opening
            analysis("B", (TradeAction::Buy, TradeType::Long), None),
            analysis("E", (TradeAction::Hold, TradeType::Long), None),
        ];

        // Two held, one closes, limit 2: one opening slot
        let decision = manager.coordinate(&config(2), &analyses, &portfolio);
        assert_eq!(
            decision.trades,
            vec![
                TradeApproval::new("A", TradeAction::Sell, TradeType::Long),
                TradeApproval::new("D", TradeAction::Sell, TradeType::Short),
            ]
        );
        assert!(decision.reasoning.contains("position limit 2 reached"));
    }

    #[test]
    fn test_close_requires_matching_position() {
        let manager = PortfolioDecisionManager::default();
        let mut portfolio = PortfolioContext::default();
        portfolio.positions.insert("A".into(), long("A"));

        // Cover signal on a long position closes nothing
        let analyses = vec![analysis("A", (TradeAction::Buy, TradeType::Short), None)];
        let decision = manager.coordinate(&config(3), &analyses, &portfolio);
        assert!(decision.trades.is_empty());
        assert!(decision.reasoning.contains("No trades approved"));
    }
}
