#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use execution_engine::PaperExecutor;
use orchestrator_protocol::{NotificationRecord, StreamEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use system_orchestrator::config::ExportLimits;
use system_orchestrator::{
    ConcurrencyLimiter, CycleContext, DecisionEntry, InstanceProcessor, InstanceRegistry,
    NoopExporter, NotificationCache, OrchestratorError, SchedulerDeps, SchedulerSlots,
    StateExporter, StateSnapshot, StreamSink,
};
use trading::TradingConfig;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Keeps every emitted event in order. `refuse_batches` and
/// `refuse_charts` make that many upcoming batch or chart emits fail.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(String, StreamEvent)>>,
    pub refuse_batches: AtomicUsize,
    pub refuse_charts: AtomicUsize,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Text { content } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Notifications { records, .. } => Some(records),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl StreamSink for RecordingSink {
    fn emit(&self, session_id: &str, event: StreamEvent) -> system_orchestrator::Result<()> {
        let refuse = match &event {
            StreamEvent::Notifications { .. } => Some(&self.refuse_batches),
            StreamEvent::Chart { .. } => Some(&self.refuse_charts),
            _ => None,
        };
        if let Some(counter) = refuse {
            let left = counter.load(Ordering::SeqCst);
            if left > 0 {
                counter.store(left - 1, Ordering::SeqCst);
                return Err(OrchestratorError::Sink("client went away".into()));
            }
        }
        self.events
            .lock()
            .unwrap()
            .push((session_id.to_string(), event));
        Ok(())
    }
}

/// Behaves per model: `bad*` returns an error, `boom*` panics, anything
/// else snapshots the portfolio and caches one notification.
#[derive(Default)]
pub struct ScriptedProcessor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl InstanceProcessor for ScriptedProcessor {
    async fn process(&self, ctx: CycleContext) -> Result<DecisionEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let model = ctx.instance.model_id().to_string();
        if model.starts_with("bad") {
            return Err(anyhow!("market data unavailable"));
        }
        if model.starts_with("boom") {
            panic!("signal source blew up");
        }

        let ts = ctx.timestamp;
        ctx.instance.with_executor(|ex| {
            ex.snapshot_positions(ts);
            ex.snapshot_portfolio(ts);
        });
        ctx.cache.push(
            ctx.instance.session_id(),
            NotificationRecord::new(format!("{} Portfolio Status", model), "ok", vec![model]),
        );
        Ok(DecisionEntry::new(ts, ctx.check_number))
    }
}

/// Fails every export and counts the attempts.
#[derive(Default)]
pub struct FailingExporter {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl StateExporter for FailingExporter {
    async fn export(&self, _snapshot: &StateSnapshot) -> system_orchestrator::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(OrchestratorError::Export("disk full".into()))
    }
}

pub struct Harness {
    pub registry: Arc<InstanceRegistry>,
    pub cache: Arc<NotificationCache>,
    pub sink: Arc<RecordingSink>,
    pub processor: Arc<ScriptedProcessor>,
    pub slots: Arc<SchedulerSlots>,
    pub deps: SchedulerDeps,
}

impl Harness {
    pub fn new(interval: Duration) -> Self {
        let registry = Arc::new(InstanceRegistry::default());
        let cache = Arc::new(NotificationCache::default());
        let sink = Arc::new(RecordingSink::default());
        let processor = Arc::new(ScriptedProcessor::default());
        let slots = Arc::new(SchedulerSlots::new());

        let deps = SchedulerDeps {
            registry: registry.clone(),
            cache: cache.clone(),
            limiter: ConcurrencyLimiter::new(2),
            processor: processor.clone(),
            sink: sink.clone(),
            exporter: Arc::new(NoopExporter),
            slots: slots.clone(),
            export_limits: ExportLimits::default(),
            interval,
        };

        Self {
            registry,
            cache,
            sink,
            processor,
            slots,
            deps,
        }
    }

    pub fn create(&self, session: &str, model: &str) -> String {
        let cfg = TradingConfig::new(vec!["BTC-USD".into()], model);
        let executor = Box::new(PaperExecutor::with_fee_rate(&cfg, 0.001));
        self.registry.create(session, cfg, executor, None)
    }

    pub fn calls(&self) -> usize {
        self.processor.calls.load(Ordering::SeqCst)
    }
}
