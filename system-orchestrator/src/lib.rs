//! Orchestration core for long-lived trading instances grouped by session.
//!
//! [`Orchestrator`] is the entry point: it creates instances in the
//! [`InstanceRegistry`], runs one [`CycleScheduler`] per session and
//! answers control commands.

pub mod api;
pub mod args;
pub mod cache;
pub mod command;
pub mod config;
pub mod decision;
pub mod error;
pub mod event_bus;
pub mod export;
pub mod limiter;
mod locks;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod sink;

pub use cache::{DecisionHistoryLog, NotificationCache};
pub use command::CommandHandler;
pub use config::SystemConfig;
pub use decision::DecisionEntry;
pub use error::{OrchestratorError, Result};
pub use event_bus::EventBus;
pub use export::{JsonFileExporter, NoopExporter, StateExporter, StateSnapshot};
pub use limiter::ConcurrencyLimiter;
pub use orchestrator::{InstanceFactory, InstanceParts, Orchestrator, PaperInstanceFactory};
pub use registry::{InstanceRegistry, TradingInstance};
pub use scheduler::{
    CycleContext, CycleReport, CycleScheduler, InstanceProcessor, SchedulerDeps, SchedulerSlots,
    SchedulerState, TradingCycle,
};
pub use sink::StreamSink;
