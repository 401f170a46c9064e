use super::client::ChatMessage;
use log::debug;
use std::collections::HashMap;

const JSON_HINT: &str = "Please respond in JSON format.";

/// Message rewriting for chat backends with a narrower role vocabulary.
///
/// Built once at startup and shared by every client that talks to such
/// a backend.
#[derive(Debug, Clone)]
pub struct RoleCompat {
    role_mapping: HashMap<String, String>,
    json_hint: bool,
}

impl RoleCompat {
    pub fn new(role_mapping: HashMap<String, String>, json_hint: bool) -> Self {
        Self {
            role_mapping,
            json_hint,
        }
    }

    /// Maps `developer` to `system`, the common need of OpenAI-compatible
    /// servers that predate the developer role.
    pub fn openai_compatible(json_hint: bool) -> Self {
        let mapping = HashMap::from([("developer".to_string(), "system".to_string())]);
        Self::new(mapping, json_hint)
    }

    /// No rewriting at all.
    pub fn passthrough() -> Self {
        Self::new(HashMap::new(), false)
    }

    /// Rewrites roles, merges consecutive system messages and, for JSON
    /// responses, makes sure the prompt mentions JSON.
    pub fn apply(&self, messages: Vec<ChatMessage>, json_response: bool) -> Vec<ChatMessage> {
        let mut out: Vec<ChatMessage> = Vec::with_capacity(messages.len());

        for mut msg in messages {
            if let Some(mapped) = self.role_mapping.get(&msg.role) {
                debug!("RoleCompat: role {} -> {}", msg.role, mapped);
                msg.role = mapped.clone();
            }

            match out.last_mut() {
                Some(prev) if prev.role == "system" && msg.role == "system" => {
                    prev.content.push_str("\n\n");
                    prev.content.push_str(&msg.content);
                }
                _ => out.push(msg),
            }
        }

        if json_response && self.json_hint {
            let mentions_json = out
                .iter()
                .any(|m| m.content.to_lowercase().contains("json"));
            if !mentions_json {
                if let Some(last) = out.last_mut() {
                    last.content.push_str("\n\n");
                    last.content.push_str(JSON_HINT);
                }
            }
        }

        out
    }
}

impl Default for RoleCompat {
    fn default() -> Self {
        Self::openai_compatible(true)
    }
}
