//! Bounded episodic archive: the last few "what I felt when I spoke" snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub turn: u64,
    pub timestamp: DateTime<Utc>,
    /// Significant activations at the time of the utterance.
    pub states: BTreeMap<String, f32>,
    /// Interlocutor states believed to be in play.
    pub empathy_target: Vec<String>,
}

impl MemoryEntry {
    /// `name (0.80), ...` for prompts, strongest first.
    pub fn describe(&self) -> String {
        let mut states: Vec<(&String, &f32)> = self.states.iter().collect();
        states.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        states
            .iter()
            .map(|(name, level)| format!("{} ({:.2})", name, level))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// FIFO with a hard capacity; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl MemoryArchive {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(
        &mut self,
        states: BTreeMap<String, f32>,
        empathy_target: Vec<String>,
        turn: u64,
    ) -> &MemoryEntry {
        self.entries.push_back(MemoryEntry {
            turn,
            timestamp: Utc::now(),
            states,
            empathy_target,
        });
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::trace!("Archive evicted turn {}", evicted.turn);
            }
        }
        &self.entries[self.entries.len() - 1]
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&MemoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(level: f32) -> BTreeMap<String, f32> {
        BTreeMap::from([("Гнев".to_string(), level)])
    }

    #[test]
    fn test_fifo_eviction() {
        let mut archive = MemoryArchive::new(5);
        for turn in 1..=8 {
            archive.record(states(0.5), vec![], turn);
            assert!(archive.len() <= 5);
        }
        let turns: Vec<u64> = archive.iter().map(|e| e.turn).collect();
        assert_eq!(turns, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_recent_is_most_recent_last() {
        let mut archive = MemoryArchive::default();
        for turn in 1..=3 {
            archive.record(states(0.5), vec!["Грусть".into()], turn);
        }
        let recent: Vec<u64> = archive.recent(2).iter().map(|e| e.turn).collect();
        assert_eq!(recent, vec![2, 3]);
        assert_eq!(archive.recent(10).len(), 3);
        assert!(archive.recent(0).is_empty());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut archive = MemoryArchive::new(0);
        archive.record(BTreeMap::new(), vec![], 1);
        archive.record(BTreeMap::new(), vec![], 2);
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.recent(1)[0].turn, 2);
    }

    #[test]
    fn test_describe_orders_by_level() {
        let mut archive = MemoryArchive::default();
        let entry = archive.record(
            BTreeMap::from([("А".to_string(), 0.4), ("Б".to_string(), 0.9)]),
            vec![],
            1,
        );
        assert_eq!(entry.describe(), "Б (0.90), А (0.40)");
    }
}
