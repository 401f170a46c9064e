use crate::decision::DecisionEntry;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 500;

/// Bounded append log of one instance's decisions. Pure tail retention.
#[derive(Debug, Clone)]
pub struct DecisionHistoryLog {
    capacity: usize,
    entries: VecDeque<DecisionEntry>,
}

impl DecisionHistoryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn append(&mut self, entry: DecisionEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn all(&self) -> Vec<DecisionEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<DecisionEntry> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    /// The `n` most recent entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<DecisionEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DecisionHistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(n: u64) -> DecisionEntry {
        DecisionEntry::new(Utc::now(), n)
    }

    #[test]
    fn test_501_appends_keep_last_500() {
        let mut log = DecisionHistoryLog::default();
        for n in 1..=501 {
            log.append(entry(n));
        }

        assert_eq!(log.len(), 500);
        let all = log.all();
        assert_eq!(all.first().unwrap().check_number, 2);
        assert_eq!(all.last().unwrap().check_number, 501);
        assert!(all.windows(2).all(|w| w[0].check_number + 1 == w[1].check_number));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = DecisionHistoryLog::new(10);
        for n in 1..=4 {
            log.append(entry(n));
        }

        let recent: Vec<u64> = log.recent(3).iter().map(|e| e.check_number).collect();
        assert_eq!(recent, vec![4, 3, 2]);
        assert_eq!(log.recent(100).len(), 4);

        let tail: Vec<u64> = log.tail(2).iter().map(|e| e.check_number).collect();
        assert_eq!(tail, vec![3, 4]);
    }
}
