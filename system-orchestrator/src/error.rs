use orchestrator_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the orchestration core.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("instance {instance} not found in session {session}")]
    InstanceNotFound { session: String, instance: String },

    /// The initiating request could not be turned into instances.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("concurrency limiter closed")]
    LimiterClosed,

    #[error("stream sink error: {0}")]
    Sink(String),

    #[error("state export failed: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<ProtocolError> for OrchestratorError {
    fn from(e: ProtocolError) -> Self {
        OrchestratorError::InvalidRequest(e.to_string())
    }
}

/// A specialized Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
