use crate::model::{ChartPayload, InstanceSummary, NotificationRecord};
use serde::{Deserialize, Serialize};

const STOP_WORDS: [&str; 5] = ["stop", "pause", "halt", "停止", "暂停"];
const STATUS_WORDS: [&str; 4] = ["status", "summary", "状态", "摘要"];
const INSTANCE_MARKERS: [&str; 2] = ["instance_id:", "instance:"];

/// Out-of-band control requests scoped to a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Stop one instance, or every instance of the session when `instance_id` is `None`.
    Stop {
        #[serde(default)]
        instance_id: Option<String>,
    },
    Status,
}

impl ControlCommand {
    /// Recognises a control intent in free text.
    ///
    /// Stop words win over status words. An `instance:<id>` or
    /// `instance_id:<id>` marker narrows a stop to one instance.
    ///
    /// # Returns
    ///
    /// * `None` if the text carries no control intent (e.g. a trading request).
    pub fn parse(query: &str) -> Option<Self> {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower
            .split_whitespace()
            .map(|w| w.trim_matches(is_edge_punctuation))
            .collect();

        if words.iter().any(|w| STOP_WORDS.contains(w)) {
            return Some(ControlCommand::Stop {
                instance_id: extract_instance_id(query),
            });
        }

        if words.iter().any(|w| STATUS_WORDS.contains(w)) {
            return Some(ControlCommand::Status);
        }

        None
    }
}

fn is_edge_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '。' | '，' | '？' | '！')
}

/// Byte offset just past the first instance marker, matched ASCII
/// case-insensitively on the query itself.
fn marker_end(query: &str) -> Option<usize> {
    query.char_indices().find_map(|(idx, _)| {
        INSTANCE_MARKERS.iter().find_map(|m| {
            query
                .get(idx..idx + m.len())
                .filter(|s| s.eq_ignore_ascii_case(m))
                .map(|_| idx + m.len())
        })
    })
}

fn extract_instance_id(query: &str) -> Option<String> {
    let rest = &query[marker_end(query)?..];
    rest.split_whitespace()
        .next()
        .map(|id| id.trim_matches(|c| c == '`' || c == '\'' || c == '"'))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Acknowledgement of a [`ControlCommand`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
    Stopped {
        instance_id: String,
        final_value: f64,
        open_positions: usize,
        message: String,
    },
    StoppedAll {
        count: usize,
        message: String,
    },
    Status {
        instances: Vec<InstanceSummary>,
        message: String,
    },
    NotFound {
        message: String,
    },
}

impl ControlResponse {
    /// The human-readable acknowledgement.
    pub fn message(&self) -> &str {
        match self {
            ControlResponse::Stopped { message, .. }
            | ControlResponse::StoppedAll { message, .. }
            | ControlResponse::Status { message, .. }
            | ControlResponse::NotFound { message } => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlResponse::NotFound { .. })
    }
}

/// A discrete emission to the streaming sink.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free text continuation, including warnings.
    Text { content: String },
    /// One batch per cycle holding every notification drained from the cache.
    Notifications {
        component_id: String,
        records: Vec<NotificationRecord>,
    },
    Chart {
        component_id: String,
        chart: ChartPayload,
    },
    /// Terminal failure of a request; nothing follows it.
    Failed { reason: String },
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text {
            content: content.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StreamEvent::Failed {
            reason: reason.into(),
        }
    }
}

/// A [`StreamEvent`] addressed to the session it belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session_id: String,
    pub event: StreamEvent,
}
