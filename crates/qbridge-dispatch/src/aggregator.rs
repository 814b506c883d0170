//! Run-event aggregation.
//!
//! An [`EventAggregator`] lives for exactly one run. It folds
//! [`RunEvent`]s into a [`Histogram`] and decides when the display is due
//! for a refresh.
//!
//! **Invariants:**
//! - `total()` never exceeds the shot count. Events past the shot count,
//!   or with a sequence index outside `0..shots`, are counted as rejected.
//! - Aggregation is commutative: the final histogram depends only on the
//!   multiset of accepted labels.

use std::collections::BTreeMap;
use std::time::Duration;

use qbridge_proto::RunEvent;
use tokio::time::Instant;
use tracing::warn;

/// Outcome label to count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    counts: BTreeMap<String, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for one label; zero if never seen.
    pub fn count(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Label-ordered `(label, count)` pairs.
    pub fn buckets(&self) -> Vec<(String, u64)> {
        self.counts
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect()
    }

    /// The label with the highest count. Ties go to the smallest label.
    pub fn most_frequent(&self) -> Option<(&str, u64)> {
        self.counts
            .iter()
            .fold(None, |best: Option<(&str, u64)>, (label, &count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((label.as_str(), count)),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }

    fn increment(&mut self, label: String) {
        *self.counts.entry(label).or_insert(0) += 1;
    }
}

impl FromIterator<(String, u64)> for Histogram {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut hist = Histogram::new();
        for (label, count) in iter {
            *hist.counts.entry(label).or_insert(0) += count;
        }
        hist
    }
}

/// When the display should be refreshed during a run.
///
/// A refresh is due after `every_events` accepted events, or once
/// `min_interval` has passed since the last refresh with at least one new
/// event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub every_events: u32,
    pub min_interval: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            every_events: 100,
            min_interval: Duration::from_millis(250),
        }
    }
}

impl RefreshPolicy {
    /// Refresh after every accepted event.
    pub fn every_event() -> Self {
        Self {
            every_events: 1,
            min_interval: Duration::ZERO,
        }
    }
}

/// Folds one run's events into a histogram.
#[derive(Debug)]
pub struct EventAggregator {
    shots: u32,
    histogram: Histogram,
    total: u32,
    rejected: u32,
    pending: u32,
    last_refresh: Instant,
    policy: RefreshPolicy,
}

impl EventAggregator {
    pub fn new(shots: u32, policy: RefreshPolicy) -> Self {
        Self {
            shots,
            histogram: Histogram::new(),
            total: 0,
            rejected: 0,
            pending: 0,
            last_refresh: Instant::now(),
            policy,
        }
    }

    /// Count one event. Returns whether a display refresh is due.
    pub fn on_event(&mut self, event: RunEvent) -> bool {
        if event.sequence_index >= self.shots || self.total >= self.shots {
            warn!(
                "Rejecting event #{} ('{}'): run has {} shots, {} accepted",
                event.sequence_index, event.outcome_label, self.shots, self.total
            );
            self.rejected += 1;
            return false;
        }

        self.histogram.increment(event.outcome_label);
        self.total += 1;
        self.pending += 1;

        let due = self.pending >= self.policy.every_events.max(1)
            || self.last_refresh.elapsed() >= self.policy.min_interval;
        if due {
            self.pending = 0;
            self.last_refresh = Instant::now();
        }
        due
    }

    /// A consistent copy of the counts so far.
    pub fn snapshot(&self) -> Histogram {
        self.histogram.clone()
    }

    /// Consume the aggregator, keeping the counts.
    pub fn into_histogram(self) -> Histogram {
        self.histogram
    }

    pub fn shots(&self) -> u32 {
        self.shots
    }

    /// Accepted events.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Events dropped for being out of range.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Whether every requested shot has been counted.
    pub fn is_complete(&self) -> bool {
        self.total == self.shots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> RefreshPolicy {
        RefreshPolicy {
            every_events: 1000,
            min_interval: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_three_shot_scenario() {
        let mut agg = EventAggregator::new(3, quiet());
        for (i, label) in ["0", "1", "0"].into_iter().enumerate() {
            agg.on_event(RunEvent::new(label, i as u32));
        }
        let hist = agg.snapshot();
        assert_eq!(hist.count("0"), 2);
        assert_eq!(hist.count("1"), 1);
        assert_eq!(hist.total(), 3);
        assert!(agg.is_complete());
        assert_eq!(hist.buckets(), vec![("0".into(), 2), ("1".into(), 1)]);
    }

    #[test]
    fn test_rejects_out_of_range_and_overflow() {
        let mut agg = EventAggregator::new(2, quiet());
        assert!(!agg.on_event(RunEvent::new("1", 5)));
        agg.on_event(RunEvent::new("1", 0));
        agg.on_event(RunEvent::new("1", 1));
        agg.on_event(RunEvent::new("0", 1));
        assert_eq!(agg.total(), 2);
        assert_eq!(agg.rejected(), 2);
        assert_eq!(agg.snapshot().count("0"), 0);
    }

    #[test]
    fn test_zero_shots_accepts_nothing() {
        let mut agg = EventAggregator::new(0, quiet());
        agg.on_event(RunEvent::new("0", 0));
        assert!(agg.is_complete());
        assert!(agg.snapshot().is_empty());
    }

    #[test]
    fn test_refresh_every_n_events() {
        let mut agg = EventAggregator::new(
            10,
            RefreshPolicy {
                every_events: 3,
                min_interval: Duration::from_secs(3600),
            },
        );
        let due: Vec<bool> = (0..6)
            .map(|i| agg.on_event(RunEvent::new("0", i)))
            .collect();
        assert_eq!(due, vec![false, false, true, false, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_interval() {
        let mut agg = EventAggregator::new(
            10,
            RefreshPolicy {
                every_events: 1000,
                min_interval: Duration::from_millis(100),
            },
        );
        assert!(!agg.on_event(RunEvent::new("0", 0)));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(agg.on_event(RunEvent::new("1", 1)));
        assert!(!agg.on_event(RunEvent::new("1", 2)));
    }

    #[test]
    fn test_most_frequent_prefers_smallest_label_on_tie() {
        let hist: Histogram = [("11".to_string(), 4), ("00".to_string(), 4), ("01".to_string(), 1)]
            .into_iter()
            .collect();
        assert_eq!(hist.most_frequent(), Some(("00", 4)));
        assert_eq!(Histogram::new().most_frequent(), None);
    }
}
