//! Wire types of the orchestrator's control surface and streaming output.

pub mod messages;
pub mod model;

use thiserror::Error;

pub use messages::{ControlCommand, ControlResponse, SessionEvent, StreamEvent};
pub use model::{
    ChartPayload, ChartRow, InstanceSummary, NotificationRecord, TradingRequest, TIME_FORMAT,
};

/// Errors raised while interpreting inbound requests.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid trading configuration: {0}")]
    Config(#[from] trading::ConfigError),

    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}
