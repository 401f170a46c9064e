use crate::error::Result;
use log::error;
use orchestrator_protocol::StreamEvent;

/// Destination of everything a session streams to its client.
pub trait StreamSink: Send + Sync {
    fn emit(&self, session_id: &str, event: StreamEvent) -> Result<()>;
}

/// Emits a text continuation. A failure to deliver is logged, not returned.
pub fn emit_warning(sink: &dyn StreamSink, session_id: &str, message: impl Into<String>) {
    if let Err(e) = sink.emit(session_id, StreamEvent::text(message)) {
        error!("Sink: failed to deliver warning to session {}: {}", session_id, e);
    }
}
