//! # Cycle Scheduler
//!
//! One scheduler governs the instances of one session. Each cycle it
//! stamps a single timestamp, fans the active instances out under the
//! shared [`ConcurrencyLimiter`], joins them, then flushes the session's
//! notifications, chart and exported state before sleeping.
//!
//! A failing or panicking instance is logged and reported to the session
//! as a warning; its siblings and the loop carry on.

pub mod chart;
pub mod slots;
pub mod worker;

use crate::cache::NotificationCache;
use crate::config::ExportLimits;
use crate::error::Result;
use crate::export::StateExporter;
use crate::limiter::ConcurrencyLimiter;
use crate::registry::InstanceRegistry;
use crate::sink::{emit_warning, StreamSink};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::{debug, error, info, warn};
use orchestrator_protocol::StreamEvent;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

pub use chart::build_chart;
pub use slots::SchedulerSlots;
pub use worker::{CycleContext, InstanceProcessor, TradingCycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
}

/// Everything a scheduler shares with the rest of the process.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub registry: Arc<InstanceRegistry>,
    pub cache: Arc<NotificationCache>,
    pub limiter: ConcurrencyLimiter,
    pub processor: Arc<dyn InstanceProcessor>,
    pub sink: Arc<dyn StreamSink>,
    pub exporter: Arc<dyn StateExporter>,
    pub slots: Arc<SchedulerSlots>,
    pub export_limits: ExportLimits,
    pub interval: Duration,
}

pub fn notifications_component_id(session_id: &str) -> String {
    format!("trading_status_{}", session_id)
}

pub fn chart_component_id(session_id: &str) -> String {
    format!("portfolio_chart_{}", session_id)
}

#[derive(Debug)]
enum Outcome {
    Completed,
    Failed(String),
    Panicked(String),
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    /// Instance ids dispatched this cycle, in registry order.
    pub dispatched: Vec<String>,
    pub failed: Vec<String>,
    pub notifications: usize,
    pub chart_emitted: bool,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.dispatched.len() - self.failed.len()
    }
}

pub struct CycleScheduler {
    session_id: String,
    deps: SchedulerDeps,
    state: SchedulerState,
    cycles: u64,
}

impl CycleScheduler {
    pub fn new(session_id: impl Into<String>, deps: SchedulerDeps) -> Self {
        Self {
            session_id: session_id.into(),
            deps,
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn transition(&mut self, next: SchedulerState) {
        if self.state != next {
            debug!(
                "Scheduler: session {} {:?} -> {:?}",
                self.session_id, self.state, next
            );
            self.state = next;
        }
    }

    /// Cycles until no instance of the session is active.
    ///
    /// If the returned future is dropped before it completes, every
    /// instance of the session is marked inactive and the session's
    /// scheduler slot is released.
    pub async fn run(mut self) {
        info!("Scheduler: starting for session {}", self.session_id);
        let mut guard = CancelGuard {
            session_id: self.session_id.clone(),
            registry: self.deps.registry.clone(),
            slots: self.deps.slots.clone(),
            armed: true,
        };

        loop {
            let registry = &self.deps.registry;
            let session_id = &self.session_id;
            let idle = self
                .deps
                .slots
                .release_if_idle(session_id, || registry.list_active(session_id).is_empty());
            if idle {
                break;
            }

            self.transition(SchedulerState::Running);
            let report = self.run_once().await;
            info!(
                "Scheduler: session {} cycle {} done ({} ok, {} failed, {} notifications)",
                self.session_id,
                self.cycles,
                report.succeeded(),
                report.failed.len(),
                report.notifications
            );

            self.transition(SchedulerState::Draining);
            tokio::time::sleep(self.deps.interval).await;
        }

        guard.armed = false;
        self.transition(SchedulerState::Idle);
        info!(
            "Scheduler: no active instances left in session {}, stopping after {} cycle(s)",
            self.session_id, self.cycles
        );
    }

    /// One full cycle: dispatch, join, flush, export. Never fails; every
    /// failure is logged and reported to the session.
    pub async fn run_once(&mut self) -> CycleReport {
        self.cycles += 1;
        let timestamp = Utc::now();

        // Instances created from here on wait for the next cycle
        let instances: Vec<_> = self
            .deps
            .registry
            .list(&self.session_id)
            .into_iter()
            .filter(|i| i.is_active())
            .collect();
        let dispatched: Vec<String> = instances.iter().map(|i| i.id().to_string()).collect();

        let mut set = JoinSet::new();
        for instance in instances {
            let limiter = self.deps.limiter.clone();
            let processor = self.deps.processor.clone();
            let cache = self.deps.cache.clone();
            let instance_id = instance.id().to_string();

            let work = async move {
                let permit = limiter.acquire().await?;
                let check_number = instance.begin_check(timestamp);
                let ctx = CycleContext {
                    instance: instance.clone(),
                    cache,
                    timestamp,
                    check_number,
                };
                let entry = processor.process(ctx).await;
                permit.release();
                instance.record_decision(entry?);
                anyhow::Ok(())
            };

            set.spawn(async move {
                let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(Ok(())) => Outcome::Completed,
                    Ok(Err(e)) => Outcome::Failed(format!("{:#}", e)),
                    Err(payload) => Outcome::Panicked(panic_message(payload)),
                };
                (instance_id, outcome)
            });
        }

        let mut failed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Outcome::Completed)) => {}
                Ok((instance_id, Outcome::Failed(reason))) => {
                    error!(
                        "Scheduler: instance {} in session {} failed: {}",
                        instance_id, self.session_id, reason
                    );
                    self.warn_session(format!(
                        "Warning: instance {} failed this cycle: {}",
                        instance_id, reason
                    ));
                    failed.push(instance_id);
                }
                Ok((instance_id, Outcome::Panicked(reason))) => {
                    error!(
                        "Scheduler: instance {} in session {} panicked: {}",
                        instance_id, self.session_id, reason
                    );
                    self.warn_session(format!(
                        "Warning: instance {} crashed this cycle: {}",
                        instance_id, reason
                    ));
                    failed.push(instance_id);
                }
                Err(e) => {
                    error!("Scheduler: task join error in session {}: {}", self.session_id, e);
                }
            }
        }
        failed.sort_by_key(|id| dispatched.iter().position(|d| d == id));

        let notifications = match self.flush_notifications() {
            Ok(n) => n,
            Err(e) => {
                self.cycle_failure("notification flush", &e);
                0
            }
        };

        let chart_emitted = match self.emit_chart() {
            Ok(emitted) => emitted,
            Err(e) => {
                self.cycle_failure("chart update", &e);
                false
            }
        };

        let snapshot = self.deps.registry.export_state(&self.deps.export_limits);
        if let Err(e) = self.deps.exporter.export(&snapshot).await {
            warn!("Export: state export failed after session {} cycle: {}", self.session_id, e);
        }

        CycleReport {
            timestamp,
            dispatched,
            failed,
            notifications,
            chart_emitted,
        }
    }

    /// Emits everything cached for the session as one batch. A batch the
    /// sink refuses goes back to the cache for the next cycle.
    fn flush_notifications(&self) -> Result<usize> {
        let records = self.deps.cache.drain(&self.session_id);
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();
        let event = StreamEvent::Notifications {
            component_id: notifications_component_id(&self.session_id),
            records: records.clone(),
        };
        if let Err(e) = self.deps.sink.emit(&self.session_id, event) {
            self.deps.cache.requeue_front(&self.session_id, records);
            return Err(e);
        }
        Ok(count)
    }

    fn emit_chart(&self) -> Result<bool> {
        let instances = self.deps.registry.list(&self.session_id);
        match build_chart(&self.session_id, &instances) {
            Some(chart) => {
                self.deps.sink.emit(
                    &self.session_id,
                    StreamEvent::Chart {
                        component_id: chart_component_id(&self.session_id),
                        chart,
                    },
                )?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn cycle_failure(&self, step: &str, e: &crate::error::OrchestratorError) {
        error!(
            "Scheduler: {} failed in session {}: {}",
            step, self.session_id, e
        );
        self.warn_session(format!("Warning: {} failed: {}", step, e));
    }

    fn warn_session(&self, message: String) {
        emit_warning(self.deps.sink.as_ref(), &self.session_id, message);
    }
}

impl std::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleScheduler")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .finish()
    }
}

/// Cleanup when a scheduler's future is dropped mid-flight.
struct CancelGuard {
    session_id: String,
    registry: Arc<InstanceRegistry>,
    slots: Arc<SchedulerSlots>,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.registry.deactivate_all(&self.session_id) {
            Ok(n) => warn!(
                "Scheduler: session {} cancelled, {} instance(s) stopped",
                self.session_id, n
            ),
            Err(e) => warn!("Scheduler: session {} cancelled: {}", self.session_id, e),
        }
        self.slots.release(&self.session_id);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
