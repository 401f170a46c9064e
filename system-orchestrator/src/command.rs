//! Out-of-band control of a session's instances.
//!
//! Commands only flip registry flags and read summaries; a running
//! scheduler notices a stop on its next cycle.

use crate::error::OrchestratorError;
use crate::registry::InstanceRegistry;
use log::info;
use orchestrator_protocol::{ControlCommand, ControlResponse, InstanceSummary};
use std::fmt::Write;
use std::sync::Arc;

const NO_INSTANCES: &str = "No trading instances found in this session.";

#[derive(Debug, Clone)]
pub struct CommandHandler {
    registry: Arc<InstanceRegistry>,
}

impl CommandHandler {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self { registry }
    }

    /// Parses and handles free text.
    ///
    /// # Returns
    ///
    /// * `None` if the text is not a control request.
    pub fn handle_query(&self, session_id: &str, query: &str) -> Option<ControlResponse> {
        ControlCommand::parse(query).map(|cmd| self.handle(session_id, cmd))
    }

    pub fn handle(&self, session_id: &str, command: ControlCommand) -> ControlResponse {
        info!("Commands: {:?} for session {}", command, session_id);
        match command {
            ControlCommand::Stop {
                instance_id: Some(instance_id),
            } => self.stop_one(session_id, &instance_id),
            ControlCommand::Stop { instance_id: None } => self.stop_all(session_id),
            ControlCommand::Status => self.status(session_id),
        }
    }

    fn stop_one(&self, session_id: &str, instance_id: &str) -> ControlResponse {
        let changed = match self.registry.deactivate(session_id, instance_id) {
            Ok(changed) => changed,
            Err(OrchestratorError::SessionNotFound(_)) => return not_found(NO_INSTANCES),
            Err(_) => {
                return not_found(format!(
                    "Instance {} not found in this session.",
                    instance_id
                ))
            }
        };

        let (final_value, open_positions) = self
            .registry
            .get(session_id, instance_id)
            .map(|i| {
                let s = i.summary();
                (s.portfolio_value, s.open_positions)
            })
            .unwrap_or_default();

        let message = if changed {
            format!(
                "Stopped trading instance {}. Final value: ${:.2}, open positions: {}.",
                instance_id, final_value, open_positions
            )
        } else {
            format!("Trading instance {} was already stopped.", instance_id)
        };

        ControlResponse::Stopped {
            instance_id: instance_id.to_string(),
            final_value,
            open_positions,
            message,
        }
    }

    fn stop_all(&self, session_id: &str) -> ControlResponse {
        match self.registry.deactivate_all(session_id) {
            Ok(count) => ControlResponse::StoppedAll {
                count,
                message: format!("Stopped {} trading instance(s).", count),
            },
            Err(_) => not_found(NO_INSTANCES),
        }
    }

    fn status(&self, session_id: &str) -> ControlResponse {
        let instances: Vec<InstanceSummary> = self
            .registry
            .list(session_id)
            .iter()
            .map(|i| i.summary())
            .collect();

        if instances.is_empty() {
            return not_found(NO_INSTANCES);
        }

        let message = format_status(&instances);
        ControlResponse::Status { instances, message }
    }
}

fn not_found(message: impl Into<String>) -> ControlResponse {
    ControlResponse::NotFound {
        message: message.into(),
    }
}

fn format_status(instances: &[InstanceSummary]) -> String {
    let mut out = String::from("Trading status\n");
    for s in instances {
        let state = if s.active { "active" } else { "stopped" };
        let _ = writeln!(
            out,
            "\n{} ({}, {})\n  Symbols: {}\n  Portfolio value: ${:.2}\n  P&L: {:+.2}\n  Open positions: {}\n  Trades: {}\n  Checks: {}",
            s.instance_id,
            s.model_id,
            state,
            s.symbols.join(", "),
            s.portfolio_value,
            s.total_pnl,
            s.open_positions,
            s.total_trades,
            s.check_count
        );
    }
    out
}
