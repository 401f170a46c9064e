//! Wiring of the core: the setup path, one scheduler per session, control
//! commands and the session sweeper.

use crate::cache::NotificationCache;
use crate::command::CommandHandler;
use crate::config::SystemConfig;
use crate::decision::{DecisionEntry, PortfolioState};
use crate::error::{OrchestratorError, Result};
use crate::export::StateExporter;
use crate::limiter::ConcurrencyLimiter;
use crate::locks::lock;
use crate::registry::InstanceRegistry;
use crate::scheduler::worker::describe_portfolio;
use crate::scheduler::{CycleScheduler, InstanceProcessor, SchedulerDeps, SchedulerSlots};
use crate::sink::StreamSink;
use chrono::Utc;
use log::{debug, error, info, warn};
use orchestrator_protocol::{
    ControlCommand, ControlResponse, NotificationRecord, StreamEvent, TradingRequest,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strategy_lab::{AiSignalGenerator, LlmClient};
use tokio::task::JoinHandle;
use trading::{AiSignalSource, Executor, TradingConfig};

/// The per-instance collaborators built for each new instance.
pub struct InstanceParts {
    pub executor: Box<dyn Executor>,
    pub ai_signals: Option<Arc<dyn AiSignalSource>>,
}

pub trait InstanceFactory: Send + Sync {
    fn build(&self, config: &TradingConfig) -> anyhow::Result<InstanceParts>;
}

/// Paper executors with an optional LLM-backed signal source.
pub struct PaperInstanceFactory {
    fee_rate: f64,
    llm: Option<Arc<dyn LlmClient>>,
}

impl PaperInstanceFactory {
    pub fn new(fee_rate: f64, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { fee_rate, llm }
    }
}

impl InstanceFactory for PaperInstanceFactory {
    fn build(&self, config: &TradingConfig) -> anyhow::Result<InstanceParts> {
        let executor = Box::new(execution_engine::PaperExecutor::with_fee_rate(
            config,
            self.fee_rate,
        ));

        let ai_signals: Option<Arc<dyn AiSignalSource>> = match (&self.llm, config.use_ai_signals) {
            (Some(client), true) => Some(Arc::new(AiSignalGenerator::new(
                client.clone(),
                config.model_id.clone(),
            ))),
            (None, true) => {
                warn!(
                    "No LLM client configured, {} runs on technical signals only",
                    config.model_id
                );
                None
            }
            (_, false) => None,
        };

        Ok(InstanceParts {
            executor,
            ai_signals,
        })
    }
}

pub struct Orchestrator {
    default_model: String,
    default_capital: f64,
    factory: Arc<dyn InstanceFactory>,
    commands: CommandHandler,
    deps: SchedulerDeps,
    schedulers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        config: &SystemConfig,
        factory: Arc<dyn InstanceFactory>,
        processor: Arc<dyn InstanceProcessor>,
        sink: Arc<dyn StreamSink>,
        exporter: Arc<dyn StateExporter>,
    ) -> Self {
        let registry = Arc::new(InstanceRegistry::new(config.decision_history_capacity));
        let deps = SchedulerDeps {
            registry: registry.clone(),
            cache: Arc::new(NotificationCache::new(config.notification_cache_capacity)),
            limiter: ConcurrencyLimiter::new(config.max_concurrent_instances),
            processor,
            sink,
            exporter,
            slots: Arc::new(SchedulerSlots::new()),
            export_limits: config.export_limits.clone(),
            interval: config.check_interval(),
        };

        Self {
            default_model: config.default_model.clone(),
            default_capital: config.default_initial_capital,
            factory,
            commands: CommandHandler::new(registry),
            deps,
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.deps.registry
    }

    pub fn cache(&self) -> &Arc<NotificationCache> {
        &self.deps.cache
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.deps.limiter
    }

    pub fn is_scheduling(&self, session_id: &str) -> bool {
        self.deps.slots.is_running(session_id)
    }

    fn emit(&self, session_id: &str, event: StreamEvent) {
        if let Err(e) = self.deps.sink.emit(session_id, event) {
            error!("Failed to emit event to session {}: {}", session_id, e);
        }
    }

    /// Creates one instance per requested model and makes sure the
    /// session has a running scheduler.
    ///
    /// # Returns
    ///
    /// * The created instance ids, in creation order.
    /// * `Err(InvalidRequest)` if the request is rejected; a `Failed`
    ///   event has been emitted and nothing was created.
    pub async fn start(&self, session_id: &str, request: TradingRequest) -> Result<Vec<String>> {
        let parts = match self.prepare(request) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Setup failed for session {}: {}", session_id, e);
                self.emit(session_id, StreamEvent::failed(e.to_string()));
                return Err(e);
            }
        };

        let registry = &self.deps.registry;
        let mut ids = Vec::with_capacity(parts.len());
        for (config, part) in parts {
            let description = describe_config(&config);
            let id = registry.create(session_id, config, part.executor, part.ai_signals);
            self.emit(
                session_id,
                StreamEvent::text(format!("Started trading instance {}\n{}", id, description)),
            );
            ids.push(id);
        }

        let ts = Utc::now();
        for id in &ids {
            let Some(instance) = registry.get(session_id, id) else {
                continue;
            };
            let state = instance.with_executor(|ex| {
                ex.snapshot_positions(ts);
                ex.snapshot_portfolio(ts);
                ex.portfolio_history()
                    .last()
                    .map(PortfolioState::from)
                    .unwrap_or_default()
            });
            self.deps.cache.push(
                session_id,
                NotificationRecord::new(
                    format!("{} Initial Portfolio", instance.model_id()),
                    describe_portfolio(&state, instance.config().initial_capital),
                    vec![instance.model_id().to_string()],
                ),
            );
        }

        let snapshot = registry.export_state(&self.deps.export_limits);
        if let Err(e) = self.deps.exporter.export(&snapshot).await {
            warn!("Export: initial state export failed for session {}: {}", session_id, e);
        }

        self.ensure_scheduler(session_id);
        info!(
            "Session {}: started {} instance(s)",
            session_id,
            ids.len()
        );
        Ok(ids)
    }

    /// Expands and validates the request, and builds every instance's
    /// collaborators before anything is registered.
    fn prepare(&self, request: TradingRequest) -> Result<Vec<(TradingConfig, InstanceParts)>> {
        let configs = request.into_configs(&self.default_model, self.default_capital)?;

        let interval = self.deps.interval.as_secs();
        configs
            .into_iter()
            .map(|mut config| {
                config.check_interval_secs = interval;
                let parts = self.factory.build(&config).map_err(|e| {
                    OrchestratorError::InvalidRequest(format!(
                        "cannot set up {}: {:#}",
                        config.model_id, e
                    ))
                })?;
                Ok((config, parts))
            })
            .collect()
    }

    /// Spawns the session's scheduler unless one is already running.
    /// Returns whether a new scheduler was spawned.
    pub fn ensure_scheduler(&self, session_id: &str) -> bool {
        if !self.deps.slots.try_claim(session_id) {
            debug!(
                "Scheduler for session {} already running, new instances join its next cycle",
                session_id
            );
            return false;
        }

        let scheduler = CycleScheduler::new(session_id, self.deps.clone());
        let handle = tokio::spawn(scheduler.run());
        lock(&self.schedulers).insert(session_id.to_string(), handle);
        true
    }

    pub fn handle_command(&self, session_id: &str, command: ControlCommand) -> ControlResponse {
        self.commands.handle(session_id, command)
    }

    pub fn handle_query(&self, session_id: &str, query: &str) -> Option<ControlResponse> {
        self.commands.handle_query(session_id, query)
    }

    /// Newest first. `None` if the instance does not exist.
    pub fn recent_decisions(
        &self,
        session_id: &str,
        instance_id: &str,
        limit: usize,
    ) -> Option<Vec<DecisionEntry>> {
        self.deps
            .registry
            .get(session_id, instance_id)
            .map(|i| i.recent_decisions(limit))
    }

    /// Periodically evicts idle sessions together with their cached
    /// notifications.
    pub fn spawn_sweeper(self: &Arc<Self>, ttl: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let period = self.deps.interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                for session_id in this.deps.registry.prune_inactive(ttl) {
                    this.deps.cache.remove_session(&session_id);
                }
            }
        })
    }

    /// Cancels every scheduler, which stops their instances, then writes
    /// a final state export.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = lock(&self.schedulers).drain().collect();
        for (_, handle) in &handles {
            handle.abort();
        }
        for (session_id, handle) in handles {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => info!("Scheduler for session {} cancelled", session_id),
                Err(e) => error!("Scheduler for session {} ended abnormally: {}", session_id, e),
            }
        }
        self.deps.limiter.close();

        let snapshot = self.deps.registry.export_state(&self.deps.export_limits);
        if let Err(e) = self.deps.exporter.export(&snapshot).await {
            warn!("Export: final state export failed: {}", e);
        }
        info!("Orchestrator shut down");
    }
}

fn describe_config(config: &TradingConfig) -> String {
    format!(
        "- Model: {}\n- Symbols: {}\n- Initial capital: ${:.2}\n- Risk per trade: {:.1}%\n- Max positions: {}\n- AI signals: {}\n- Check interval: {}s",
        config.model_id,
        config.symbols.join(", "),
        config.initial_capital,
        config.risk_per_trade * 100.0,
        config.max_positions,
        if config.use_ai_signals { "enabled" } else { "disabled" },
        config.check_interval_secs
    )
}
