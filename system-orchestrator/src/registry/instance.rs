use crate::cache::DecisionHistoryLog;
use crate::config::ExportLimits;
use crate::decision::DecisionEntry;
use crate::export::InstanceExport;
use crate::locks::lock;
use chrono::{DateTime, Utc};
use orchestrator_protocol::InstanceSummary;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use trading::{AiSignalSource, Executor, TradingConfig};

/// One independently tracked strategy run.
///
/// The id and config never change after creation and `active` only ever
/// goes from true to false. Everything mutable sits behind its own short
/// lock so the status path never waits on a running cycle for long.
pub struct TradingInstance {
    id: String,
    session_id: String,
    config: TradingConfig,
    created_at: DateTime<Utc>,
    active: AtomicBool,
    check_count: AtomicU64,
    last_check: Mutex<Option<DateTime<Utc>>>,
    executor: Mutex<Box<dyn Executor>>,
    ai_signals: Option<Arc<dyn AiSignalSource>>,
    history: Mutex<DecisionHistoryLog>,
}

impl TradingInstance {
    pub(crate) fn new(
        id: String,
        session_id: String,
        config: TradingConfig,
        executor: Box<dyn Executor>,
        ai_signals: Option<Arc<dyn AiSignalSource>>,
        history_capacity: usize,
    ) -> Self {
        Self {
            id,
            session_id,
            config,
            created_at: Utc::now(),
            active: AtomicBool::new(true),
            check_count: AtomicU64::new(0),
            last_check: Mutex::new(None),
            executor: Mutex::new(executor),
            ai_signals,
            history: Mutex::new(DecisionHistoryLog::new(history_capacity)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the instance inactive. Returns whether this call changed it.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn check_count(&self) -> u64 {
        self.check_count.load(Ordering::Acquire)
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_check)
    }

    /// Starts a check: bumps the counter, stamps `last_check` and returns
    /// the new check number.
    pub fn begin_check(&self, at: DateTime<Utc>) -> u64 {
        let n = self.check_count.fetch_add(1, Ordering::AcqRel) + 1;
        *lock(&self.last_check) = Some(at);
        n
    }

    pub fn ai_signals(&self) -> Option<&Arc<dyn AiSignalSource>> {
        self.ai_signals.as_ref()
    }

    /// Runs `f` with exclusive access to the executor.
    ///
    /// The closure is synchronous so the lock can never be held across an
    /// await point.
    pub fn with_executor<R>(&self, f: impl FnOnce(&mut dyn Executor) -> R) -> R {
        let mut executor = lock(&self.executor);
        f(&mut **executor)
    }

    pub fn record_decision(&self, entry: DecisionEntry) {
        lock(&self.history).append(entry);
    }

    /// Newest first.
    pub fn recent_decisions(&self, n: usize) -> Vec<DecisionEntry> {
        lock(&self.history).recent(n)
    }

    /// Oldest first.
    pub fn decisions(&self) -> Vec<DecisionEntry> {
        lock(&self.history).all()
    }

    pub fn decision_count(&self) -> usize {
        lock(&self.history).len()
    }

    pub fn summary(&self) -> InstanceSummary {
        let (portfolio_value, open_positions, total_trades) = self.with_executor(|ex| {
            (
                ex.portfolio_value(),
                ex.positions().len(),
                ex.trade_history().len(),
            )
        });

        InstanceSummary {
            instance_id: self.id.clone(),
            model_id: self.config.model_id.clone(),
            symbols: self.config.symbols.clone(),
            active: self.is_active(),
            portfolio_value,
            total_pnl: portfolio_value - self.config.initial_capital,
            open_positions,
            total_trades,
            check_count: self.check_count(),
            created_at: self.created_at,
            last_check: self.last_check(),
        }
    }

    pub fn export(&self, limits: &ExportLimits) -> InstanceExport {
        let (portfolio_history, trade_history, position_history) = self.with_executor(|ex| {
            let portfolio = tail(ex.portfolio_history(), limits.portfolio_snapshots);
            let trades = tail(ex.trade_history(), limits.trades);

            // Positions open at the latest portfolio snapshot; an empty
            // book snapshots no rows, so it exports as empty
            let positions = ex.position_history();
            let latest = ex
                .portfolio_history()
                .last()
                .map(|p| p.timestamp)
                .or_else(|| positions.last().map(|p| p.timestamp));
            let positions: Vec<_> = positions
                .iter()
                .filter(|p| Some(p.timestamp) == latest)
                .cloned()
                .collect();
            (portfolio, trades, positions)
        });

        let decision_history = lock(&self.history).tail(limits.decisions);

        InstanceExport {
            instance_id: self.id.clone(),
            session_id: self.session_id.clone(),
            active: self.is_active(),
            created_at: self.created_at,
            last_check: self.last_check(),
            check_count: self.check_count(),
            config: self.config.clone(),
            portfolio_history,
            trade_history,
            position_history,
            decision_history,
        }
    }
}

impl std::fmt::Debug for TradingInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingInstance")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("model_id", &self.config.model_id)
            .field("active", &self.is_active())
            .field("check_count", &self.check_count())
            .finish()
    }
}

fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use execution_engine::PaperExecutor;
    use trading::{IndicatorBundle, TradeAction, TradeType};

    fn instance() -> TradingInstance {
        let cfg = TradingConfig::new(vec!["BTC-USD".into()], "m1");
        let executor = Box::new(PaperExecutor::with_fee_rate(&cfg, 0.001));
        TradingInstance::new("i1".into(), "s".into(), cfg, executor, None, 500)
    }

    fn trade(instance: &TradingInstance, action: TradeAction, at: DateTime<Utc>) {
        instance.with_executor(|ex| {
            let market = IndicatorBundle::from_price("BTC-USD", 100.0);
            assert!(ex.execute_trade("BTC-USD", action, TradeType::Long, &market).is_some());
            ex.snapshot_positions(at);
            ex.snapshot_portfolio(at);
        });
    }

    #[test]
    fn test_export_reports_positions_open_at_latest_snapshot() {
        let instance = instance();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 1, 0).unwrap();

        trade(&instance, TradeAction::Buy, t1);
        let export = instance.export(&ExportLimits::default());
        assert_eq!(export.position_history.len(), 1);
        assert_eq!(export.position_history[0].timestamp, t1);

        trade(&instance, TradeAction::Sell, t2);
        let export = instance.export(&ExportLimits::default());
        assert!(instance.with_executor(|ex| ex.positions().is_empty()));
        assert!(export.position_history.is_empty());
        assert_eq!(export.portfolio_history.len(), 2);
        assert_eq!(export.trade_history.len(), 2);
    }
}
