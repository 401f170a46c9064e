use crate::locks::lock;
use log::debug;
use orchestrator_protocol::NotificationRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 5000;

/// Per-session FIFO of outbound notifications with oldest-first eviction.
///
/// Every operation takes the one lock, so a drain and the pushes of the
/// same cycle never interleave: a record is drained exactly once or stays
/// for the next drain.
#[derive(Debug)]
pub struct NotificationCache {
    capacity: usize,
    sessions: Mutex<HashMap<String, VecDeque<NotificationRecord>>>,
}

impl NotificationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, session_id: &str, record: NotificationRecord) {
        let mut sessions = lock(&self.sessions);
        let queue = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity.min(64)));

        while queue.len() >= self.capacity {
            queue.pop_front();
            debug!("NotificationCache: evicted oldest record of session {}", session_id);
        }
        queue.push_back(record);
    }

    /// Returns every cached record, oldest first, and clears the session's queue.
    pub fn drain(&self, session_id: &str) -> Vec<NotificationRecord> {
        let mut sessions = lock(&self.sessions);
        sessions
            .get_mut(session_id)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Puts undelivered records back ahead of anything pushed since the
    /// drain. Over capacity, the oldest records are evicted first.
    pub fn requeue_front(&self, session_id: &str, records: Vec<NotificationRecord>) {
        if records.is_empty() {
            return;
        }
        let mut sessions = lock(&self.sessions);
        let queue = sessions.entry(session_id.to_string()).or_default();
        for record in records.into_iter().rev() {
            queue.push_front(record);
        }
        while queue.len() > self.capacity {
            queue.pop_front();
            debug!("NotificationCache: evicted oldest record of session {}", session_id);
        }
    }

    /// Diagnostic read, leaves the queue untouched.
    pub fn peek_all(&self, session_id: &str) -> Vec<NotificationRecord> {
        let sessions = lock(&self.sessions);
        sessions
            .get(session_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, session_id: &str) -> usize {
        lock(&self.sessions).get(session_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    /// Forgets a session entirely.
    pub fn remove_session(&self, session_id: &str) {
        lock(&self.sessions).remove(session_id);
    }
}

impl Default for NotificationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(n: usize) -> NotificationRecord {
        NotificationRecord::new(format!("n{}", n), "body", vec!["m1".into()])
    }

    #[test]
    fn test_capacity_keeps_most_recent() {
        let cache = NotificationCache::new(5);
        for n in 0..12 {
            cache.push("s", record(n));
            assert!(cache.len("s") <= 5);
        }

        let titles: Vec<String> = cache.peek_all("s").into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["n7", "n8", "n9", "n10", "n11"]);
    }

    #[test]
    fn test_drain_clears_and_isolates_sessions() {
        let cache = NotificationCache::default();
        cache.push("a", record(1));
        cache.push("a", record(2));
        cache.push("b", record(3));

        let drained = cache.drain("a");
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].title, "n1");
        assert!(cache.drain("a").is_empty());
        assert_eq!(cache.len("b"), 1);
        assert!(cache.drain("unknown").is_empty());
    }

    #[test]
    fn test_requeue_front_keeps_order_and_capacity() {
        let cache = NotificationCache::new(4);
        cache.push("s", record(1));
        cache.push("s", record(2));
        let drained = cache.drain("s");
        cache.push("s", record(3));
        cache.push("s", record(4));
        cache.push("s", record(5));

        cache.requeue_front("s", drained);
        let titles: Vec<String> = cache.peek_all("s").into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["n2", "n3", "n4", "n5"]);
    }

    #[test]
    fn test_concurrent_pushes_are_drained_once() {
        let cache = Arc::new(NotificationCache::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for n in 0..500 {
                        cache.push("s", record(t * 1000 + n));
                    }
                })
            })
            .collect();

        let mut drained = Vec::new();
        for _ in 0..50 {
            drained.extend(cache.drain("s"));
        }
        for h in handles {
            h.join().unwrap();
        }
        drained.extend(cache.drain("s"));

        assert_eq!(drained.len(), 8 * 500);
        let mut titles: Vec<String> = drained.into_iter().map(|r| r.title).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), 8 * 500);
    }
}
