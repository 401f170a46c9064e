//! # Event Bus
//!
//! Fan-out of session events to every connected client.
//!
//! The scheduler and the setup path publish here through [`StreamSink`];
//! the websocket route subscribes and forwards each event as JSON. Slow
//! subscribers skip old events (`Lagged`) instead of blocking publishers.
//!
//! Notification batches are refused while no client is subscribed, so the
//! scheduler keeps them cached until someone is listening.

use crate::error::{OrchestratorError, Result};
use crate::sink::StreamSink;
use log::debug;
use orchestrator_protocol::{SessionEvent, StreamEvent};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

/// A wrapper around a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is not an error (e.g. no client connected yet)
        if self.sender.send(event).is_err() {
            debug!("EventBus: event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSink for EventBus {
    fn emit(&self, session_id: &str, event: StreamEvent) -> Result<()> {
        if matches!(event, StreamEvent::Notifications { .. }) && self.sender.receiver_count() == 0 {
            return Err(OrchestratorError::Sink(format!(
                "no client subscribed for session {}",
                session_id
            )));
        }
        self.publish(SessionEvent {
            session_id: session_id.to_string(),
            event,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_session_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit("s1", StreamEvent::text("hello")).unwrap();
        let got = rx.try_recv().unwrap();
        assert_eq!(got.session_id, "s1");
        assert_eq!(got.event, StreamEvent::text("hello"));
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        assert!(bus.emit("s1", StreamEvent::failed("x")).is_ok());
    }

    #[test]
    fn test_notifications_need_a_subscriber() {
        let bus = EventBus::new();
        let batch = StreamEvent::Notifications {
            component_id: "trading_status_s1".into(),
            records: vec![],
        };
        let err = bus.emit("s1", batch.clone()).unwrap_err();
        assert!(matches!(err, OrchestratorError::Sink(_)));

        let mut rx = bus.subscribe();
        bus.emit("s1", batch.clone()).unwrap();
        assert_eq!(rx.try_recv().unwrap().event, batch);
    }
}
