//! Frequency tables with top-N extraction.

use std::collections::HashMap;

use logeye_core::TopEntry;

/// Counts per key for one aggregation window.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, amount: u64) {
        let entry = self.counts.entry(key.into()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn increment(&mut self, key: impl Into<String>) {
        self.add(key, 1);
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn distinct(&self) -> u64 {
        self.counts.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The `n` largest entries, descending by count. Ties break on the
    /// label so the result does not depend on hash order.
    pub fn top(&self, n: usize) -> Vec<TopEntry> {
        let mut entries: Vec<(&String, &u64)> = self.counts.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        entries
            .into_iter()
            .take(n)
            .map(|(label, metric)| TopEntry::new(label.clone(), *metric))
            .collect()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_is_sorted_truncated_and_stable() {
        let mut table = FrequencyTable::new();
        for (key, n) in [("b", 3), ("a", 3), ("c", 10), ("d", 1)] {
            table.add(key, n);
        }
        let top = table.top(3);
        assert_eq!(
            top,
            vec![TopEntry::new("c", 10), TopEntry::new("a", 3), TopEntry::new("b", 3)]
        );
        assert!(top.windows(2).all(|w| w[0].metric >= w[1].metric));
        assert_eq!(table.distinct(), 4);
    }

    #[test]
    fn top_never_exceeds_n() {
        let mut table = FrequencyTable::new();
        for i in 0..50 {
            table.increment(format!("k{i}"));
        }
        assert_eq!(table.top(10).len(), 10);
        assert!(table.top(0).is_empty());
        assert_eq!(FrequencyTable::new().top(10), Vec::new());
    }

    #[test]
    fn clear_resets() {
        let mut table = FrequencyTable::new();
        table.increment("x");
        table.increment("x");
        assert_eq!(table.get("x"), 2);
        table.clear();
        assert!(table.is_empty());
    }
}
