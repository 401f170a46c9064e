//! Session -> instance ownership and lifecycle.
//!
//! Each session is its own mutual-exclusion domain; the outer map lock is
//! held only long enough to find or insert a session.

pub mod instance;

use crate::config::ExportLimits;
use crate::error::{OrchestratorError, Result};
use crate::export::StateSnapshot;
use crate::locks::{lock, read, write};
use chrono::{DateTime, Utc};
use log::info;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trading::{AiSignalSource, Executor, TradingConfig};

pub use instance::TradingInstance;

const MODEL_NAME_LEN: usize = 15;

#[derive(Debug)]
struct SessionEntry {
    /// Insertion order.
    instances: Vec<Arc<TradingInstance>>,
    last_activity: DateTime<Utc>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            instances: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    fn find(&self, instance_id: &str) -> Option<&Arc<TradingInstance>> {
        self.instances.iter().find(|i| i.id() == instance_id)
    }

    fn last_seen(&self) -> DateTime<Utc> {
        self.instances
            .iter()
            .filter_map(|i| i.last_check())
            .fold(self.last_activity, DateTime::max)
    }
}

#[derive(Debug)]
pub struct InstanceRegistry {
    history_capacity: usize,
    sessions: std::sync::RwLock<BTreeMap<String, Arc<Mutex<SessionEntry>>>>,
}

impl InstanceRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history_capacity,
            sessions: std::sync::RwLock::new(BTreeMap::new()),
        }
    }

    fn session(&self, session_id: &str) -> Option<Arc<Mutex<SessionEntry>>> {
        read(&self.sessions).get(session_id).cloned()
    }

    fn session_or_insert(&self, session_id: &str) -> Arc<Mutex<SessionEntry>> {
        if let Some(entry) = self.session(session_id) {
            return entry;
        }
        write(&self.sessions)
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionEntry::new())))
            .clone()
    }

    /// Registers a new active instance and returns its id.
    ///
    /// Ids are unique within the session even for instances of the same
    /// model created within the same microsecond.
    pub fn create(
        &self,
        session_id: &str,
        config: TradingConfig,
        executor: Box<dyn Executor>,
        ai_signals: Option<Arc<dyn AiSignalSource>>,
    ) -> String {
        let session = self.session_or_insert(session_id);
        let mut entry = lock(&session);

        let now = Utc::now();
        let base = generate_instance_id(&config.model_id, now);
        let mut id = base.clone();
        let mut n = 1;
        while entry.find(&id).is_some() {
            id = format!("{}_{}", base, n);
            n += 1;
        }

        info!(
            "Registry: created instance {} (model {}) in session {}",
            id, config.model_id, session_id
        );

        entry.instances.push(Arc::new(TradingInstance::new(
            id.clone(),
            session_id.to_string(),
            config,
            executor,
            ai_signals,
            self.history_capacity,
        )));
        entry.last_activity = now;
        id
    }

    pub fn get(&self, session_id: &str, instance_id: &str) -> Option<Arc<TradingInstance>> {
        let session = self.session(session_id)?;
        let entry = lock(&session);
        entry.find(instance_id).cloned()
    }

    /// Every instance of the session, active or not, in insertion order.
    pub fn list(&self, session_id: &str) -> Vec<Arc<TradingInstance>> {
        self.session(session_id)
            .map(|s| lock(&s).instances.clone())
            .unwrap_or_default()
    }

    /// Ids of the session's active instances, in insertion order.
    pub fn list_active(&self, session_id: &str) -> Vec<String> {
        self.session(session_id)
            .map(|s| {
                lock(&s)
                    .instances
                    .iter()
                    .filter(|i| i.is_active())
                    .map(|i| i.id().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains_session(&self, session_id: &str) -> bool {
        read(&self.sessions).contains_key(session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        read(&self.sessions).keys().cloned().collect()
    }

    /// Marks one instance inactive.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` if the instance was active, `Ok(false)` if already stopped.
    pub fn deactivate(&self, session_id: &str, instance_id: &str) -> Result<bool> {
        let session = self
            .session(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;
        let mut entry = lock(&session);

        let changed = entry
            .find(instance_id)
            .ok_or_else(|| OrchestratorError::InstanceNotFound {
                session: session_id.to_string(),
                instance: instance_id.to_string(),
            })?
            .deactivate();

        if changed {
            info!("Registry: stopped instance {} in session {}", instance_id, session_id);
            entry.last_activity = Utc::now();
        }
        Ok(changed)
    }

    /// Marks every instance of the session inactive and returns how many
    /// were still active.
    pub fn deactivate_all(&self, session_id: &str) -> Result<usize> {
        let session = self
            .session(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotFound(session_id.to_string()))?;
        let mut entry = lock(&session);

        let count = entry.instances.iter().filter(|i| i.deactivate()).count();
        if count > 0 {
            info!("Registry: stopped {} instance(s) in session {}", count, session_id);
            entry.last_activity = Utc::now();
        }
        Ok(count)
    }

    /// Removes sessions with no active instance and no activity for `ttl`.
    /// Returns the removed session ids.
    pub fn prune_inactive(&self, ttl: Duration) -> Vec<String> {
        let ttl = match chrono::Duration::from_std(ttl) {
            Ok(ttl) => ttl,
            Err(_) => return Vec::new(),
        };
        let cutoff = Utc::now() - ttl;

        let mut sessions = write(&self.sessions);
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| {
                let entry = lock(s);
                entry.instances.iter().all(|i| !i.is_active()) && entry.last_seen() < cutoff
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            info!("Registry: pruned inactive session {}", id);
        }
        expired
    }

    /// Point-in-time export of every session.
    pub fn export_state(&self, limits: &ExportLimits) -> StateSnapshot {
        let sessions: Vec<Arc<Mutex<SessionEntry>>> =
            read(&self.sessions).values().cloned().collect();

        let instances = sessions
            .iter()
            .flat_map(|s| lock(s).instances.clone())
            .map(|i| i.export(limits))
            .collect();

        StateSnapshot {
            timestamp: Utc::now(),
            instances,
        }
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new(crate::cache::history::DEFAULT_CAPACITY)
    }
}

/// `trade_<timestamp>_<model name>_<model hash>`.
///
/// The model name is the last path segment of the model id, reduced to
/// identifier characters.
pub fn generate_instance_id(model_id: &str, at: DateTime<Utc>) -> String {
    let name: String = model_id
        .rsplit('/')
        .next()
        .unwrap_or(model_id)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MODEL_NAME_LEN)
        .collect();

    let mut hasher = DefaultHasher::new();
    model_id.hash(&mut hasher);
    let hash = hasher.finish() & 0xff_ffff;

    format!(
        "trade_{}_{}_{:06x}",
        at.format("%Y%m%d_%H%M%S_%6f"),
        name,
        hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_engine::PaperExecutor;

    fn config(model: &str) -> TradingConfig {
        TradingConfig::new(vec!["BTC-USD".into()], model)
    }

    fn create(registry: &InstanceRegistry, session: &str, model: &str) -> String {
        let cfg = config(model);
        let executor = Box::new(PaperExecutor::with_fee_rate(&cfg, 0.001));
        registry.create(session, cfg, executor, None)
    }

    #[test]
    fn test_instance_id_format() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 10, 21, 10, 0, 0).unwrap();
        let id = generate_instance_id("deepseek/deepseek-v3.1-terminus", at);
        assert!(id.starts_with("trade_20251021_100000_000000_deepseek_v3_1_t_"));
        assert_eq!(id.rsplit('_').next().unwrap().len(), 6);
    }

    #[test]
    fn test_ids_unique_in_tight_loop() {
        let registry = InstanceRegistry::default();
        let ids: Vec<String> = (0..50).map(|_| create(&registry, "s", "m1")).collect();

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 50);
        // Insertion order preserved
        assert_eq!(registry.list_active("s"), ids);
    }

    #[test]
    fn test_deactivate_is_one_way_and_scoped() {
        let registry = InstanceRegistry::default();
        let a = create(&registry, "s", "m1");
        let b = create(&registry, "s", "m2");

        assert!(registry.deactivate("s", &a).unwrap());
        assert!(!registry.deactivate("s", &a).unwrap());
        assert_eq!(registry.list_active("s"), vec![b.clone()]);
        assert!(registry.get("s", &b).unwrap().is_active());
        // Stopped instances stay queryable
        assert!(!registry.get("s", &a).unwrap().is_active());
    }

    #[test]
    fn test_unknown_targets_are_not_found() {
        let registry = InstanceRegistry::default();
        create(&registry, "s", "m1");

        assert!(registry.get("other", "x").is_none());
        assert!(matches!(
            registry.deactivate("other", "x"),
            Err(OrchestratorError::SessionNotFound(_))
        ));
        assert!(matches!(
            registry.deactivate("s", "x"),
            Err(OrchestratorError::InstanceNotFound { .. })
        ));
        assert!(matches!(
            registry.deactivate_all("other"),
            Err(OrchestratorError::SessionNotFound(_))
        ));
        assert!(registry.list_active("other").is_empty());
    }

    #[test]
    fn test_deactivate_all_counts_active_only() {
        let registry = InstanceRegistry::default();
        let a = create(&registry, "s", "m1");
        create(&registry, "s", "m2");
        create(&registry, "t", "m3");
        registry.deactivate("s", &a).unwrap();

        assert_eq!(registry.deactivate_all("s").unwrap(), 1);
        assert!(registry.list_active("s").is_empty());
        assert_eq!(registry.list_active("t").len(), 1);
    }

    #[test]
    fn test_prune_only_idle_sessions() {
        let registry = InstanceRegistry::default();
        create(&registry, "live", "m1");
        create(&registry, "done", "m2");
        registry.deactivate_all("done").unwrap();

        assert!(registry.prune_inactive(Duration::from_secs(3600)).is_empty());

        let pruned = registry.prune_inactive(Duration::ZERO);
        assert_eq!(pruned, vec!["done".to_string()]);
        assert!(!registry.contains_session("done"));
        assert!(registry.contains_session("live"));
    }
}
