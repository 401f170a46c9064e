//! The per-instance work unit run once per cycle.

use crate::cache::NotificationCache;
use crate::decision::{
    DecisionEntry, ExecutedTrade, IndicatorSnapshot, PortfolioDecisionRecord, PortfolioState,
    SymbolDecision,
};
use crate::registry::TradingInstance;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use orchestrator_protocol::NotificationRecord;
use std::fmt::Write;
use std::sync::Arc;
use trading::{AssetAnalysis, DecisionCoordinator, SignalSource, TradeRecord};

/// Everything a work unit gets for one cycle.
#[derive(Clone)]
pub struct CycleContext {
    pub instance: Arc<TradingInstance>,
    pub cache: Arc<NotificationCache>,
    /// Shared by every instance of the cycle.
    pub timestamp: DateTime<Utc>,
    pub check_number: u64,
}

impl CycleContext {
    fn notify(&self, title: String, body: String) {
        let filters = vec![self.instance.model_id().to_string()];
        self.cache.push(
            self.instance.session_id(),
            NotificationRecord::new(title, body, filters),
        );
    }
}

#[async_trait]
pub trait InstanceProcessor: Send + Sync {
    /// Runs one check of one instance and returns the record to append to
    /// its decision history. An error fails this instance for this cycle
    /// only.
    async fn process(&self, ctx: CycleContext) -> Result<DecisionEntry>;
}

/// Analyse every symbol, coordinate, execute, snapshot.
pub struct TradingCycle {
    signals: Arc<dyn SignalSource>,
    coordinator: Arc<dyn DecisionCoordinator>,
}

impl TradingCycle {
    pub fn new(signals: Arc<dyn SignalSource>, coordinator: Arc<dyn DecisionCoordinator>) -> Self {
        Self {
            signals,
            coordinator,
        }
    }

    async fn analyze_symbols(
        &self,
        instance: &TradingInstance,
    ) -> Result<(Vec<AssetAnalysis>, Vec<SymbolDecision>)> {
        let mut analyses = Vec::new();
        let mut decisions = Vec::new();

        for symbol in &instance.config().symbols {
            let indicators = match self
                .signals
                .analyze(symbol)
                .await
                .with_context(|| format!("analyzing {}", symbol))?
            {
                Some(indicators) => indicators,
                None => {
                    warn!(
                        "Scheduler: not enough market data for {} ({}), skipping",
                        symbol,
                        instance.id()
                    );
                    continue;
                }
            };

            instance.with_executor(|ex| ex.mark_price(symbol, indicators.close_price));
            let technical = self.signals.signal(&indicators);

            let ai = match instance.ai_signals() {
                Some(source) => {
                    let portfolio = instance.with_executor(|ex| ex.context());
                    match source.ai_signal(&indicators, &portfolio).await {
                        Ok(signal) => signal,
                        Err(e) => {
                            warn!(
                                "Scheduler: AI signal failed for {} ({}), using technical only: {:#}",
                                symbol,
                                instance.id(),
                                e
                            );
                            None
                        }
                    }
                }
                None => None,
            };

            let (action, trade_type) = ai
                .as_ref()
                .map(|s| (s.action, s.trade_type))
                .unwrap_or(technical);

            decisions.push(SymbolDecision {
                symbol: symbol.clone(),
                price: indicators.close_price,
                volume: indicators.volume,
                indicators: IndicatorSnapshot::from(&indicators),
                action,
                trade_type,
                ai_reasoning: ai.as_ref().map(|s| s.reasoning.clone()),
                ai_confidence: ai.as_ref().map(|s| s.confidence),
                exit_plan: ai.as_ref().and_then(|s| s.exit_plan.clone()),
            });
            analyses.push(AssetAnalysis::new(indicators, technical, ai));
        }

        Ok((analyses, decisions))
    }
}

#[async_trait]
impl InstanceProcessor for TradingCycle {
    async fn process(&self, ctx: CycleContext) -> Result<DecisionEntry> {
        let instance = ctx.instance.clone();
        let model = instance.model_id().to_string();
        let mut entry = DecisionEntry::new(ctx.timestamp, ctx.check_number);

        // Phase 1
        let (analyses, symbol_decisions) = self.analyze_symbols(&instance).await?;
        entry.symbol_decisions = symbol_decisions;

        // Phase 2
        let portfolio = instance.with_executor(|ex| ex.context());
        let decision = self
            .coordinator
            .decide(instance.config(), &analyses, &portfolio)
            .await
            .context("coordinating portfolio decision")?;

        ctx.notify(
            format!("{} Analysis", model),
            format!(
                "Check #{} for {}\n\n{}",
                ctx.check_number,
                instance.config().symbols.join(", "),
                decision.reasoning
            ),
        );

        // Phase 3
        let mut executed = Vec::with_capacity(decision.trades.len());
        for approval in &decision.trades {
            let market = analyses
                .iter()
                .find(|a| a.symbol == approval.symbol)
                .map(|a| &a.indicators);
            let trade = market.and_then(|m| {
                instance.with_executor(|ex| {
                    ex.execute_trade(&approval.symbol, approval.action, approval.trade_type, m)
                })
            });

            let body = match &trade {
                Some(t) => {
                    info!(
                        "Scheduler: {} executed {} {} {}",
                        instance.id(),
                        t.action,
                        t.trade_type,
                        t.symbol
                    );
                    describe_trade(t)
                }
                None => format!(
                    "Failed to execute {} {} {}",
                    approval.action.as_str().to_uppercase(),
                    approval.trade_type.as_str().to_uppercase(),
                    approval.symbol
                ),
            };
            ctx.notify(format!("{} Trade", model), body);

            executed.push(ExecutedTrade {
                symbol: approval.symbol.clone(),
                action: approval.action,
                trade_type: approval.trade_type,
                trade,
            });
        }

        let ts = ctx.timestamp;
        entry.portfolio = instance.with_executor(|ex| {
            ex.snapshot_positions(ts);
            ex.snapshot_portfolio(ts);
            ex.portfolio_history()
                .last()
                .map(PortfolioState::from)
                .unwrap_or_default()
        });
        entry.portfolio_decision = PortfolioDecisionRecord {
            reasoning: decision.reasoning,
            trades_proposed: decision.trades,
            trades_executed: executed,
        };

        ctx.notify(
            format!("{} Portfolio Status", model),
            describe_portfolio(&entry.portfolio, instance.config().initial_capital),
        );

        Ok(entry)
    }
}

fn describe_trade(t: &TradeRecord) -> String {
    let mut body = format!(
        "{} {} {}: {:.6} @ {:.2} (notional {:.2}, fee {:.2})",
        t.action.as_str().to_uppercase(),
        t.trade_type.as_str().to_uppercase(),
        t.symbol,
        t.quantity,
        t.price,
        t.notional,
        t.fee
    );
    if let Some(pnl) = t.pnl {
        let _ = write!(body, ", realized P&L {:+.2}", pnl);
    }
    body
}

pub(crate) fn describe_portfolio(state: &PortfolioState, initial_capital: f64) -> String {
    let pct = if initial_capital > 0.0 {
        state.total_pnl / initial_capital * 100.0
    } else {
        0.0
    };
    format!(
        "Total value: ${:.2}\nCash: ${:.2}\nPositions: {} (${:.2})\nP&L: {:+.2} ({:+.2}%)",
        state.total_value, state.cash, state.positions_count, state.positions_value, state.total_pnl, pct
    )
}
