//! Rolling-window usage metrics.

use crate::types::{HistoryEntry, Side};
use crate::DAY_MS;
use std::collections::HashMap;

/// Usage counts over a trailing window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowMetrics {
    pub total: usize,
    pub by_region: HashMap<String, usize>,
    pub by_side: HashMap<Side, usize>,
}

/// Aggregate entries with `ts >= now - days * DAY_MS`.
///
/// Pure aggregation, typically evaluated for 7- and 30-day windows.
pub fn window_metrics(history: &[HistoryEntry], days: i64, now: i64) -> WindowMetrics {
    let cutoff = now - days * DAY_MS;
    let mut metrics = WindowMetrics::default();

    for entry in history.iter().filter(|h| h.ts >= cutoff) {
        metrics.total += 1;
        *metrics.by_region.entry(entry.region.clone()).or_default() += 1;
        *metrics.by_side.entry(entry.side).or_default() += 1;
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(region: &str, side: Side, ts: i64) -> HistoryEntry {
        HistoryEntry {
            id: format!("e_{}", ts),
            point_id: "p".into(),
            region: region.into(),
            side,
            ts,
            note: String::new(),
        }
    }

    #[test]
    fn test_window_filters_and_counts() {
        let now = 100 * DAY_MS;
        let history = [
            entry("abdomen", Side::Right, now - DAY_MS),
            entry("abdomen", Side::Left, now - 5 * DAY_MS),
            entry("thigh", Side::Left, now - 10 * DAY_MS),
            entry("arm", Side::Right, now - 40 * DAY_MS),
        ];

        let d7 = window_metrics(&history, 7, now);
        assert_eq!(d7.total, 2);
        assert_eq!(d7.by_region.get("abdomen"), Some(&2));
        assert_eq!(d7.by_region.get("thigh"), None);
        assert_eq!(d7.by_side.get(&Side::Left), Some(&1));
        assert_eq!(d7.by_side.get(&Side::Right), Some(&1));

        let d30 = window_metrics(&history, 30, now);
        assert_eq!(d30.total, 3);
        assert_eq!(d30.by_region.get("thigh"), Some(&1));

        // The 40-day-old entry only shows up in a wide enough window
        let d60 = window_metrics(&history, 60, now);
        assert_eq!(d60.total, 4);
        assert_eq!(d60.by_region.get("arm"), Some(&1));
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let now = 100 * DAY_MS;
        let history = [entry("abdomen", Side::Right, now - 7 * DAY_MS)];
        assert_eq!(window_metrics(&history, 7, now).total, 1);
        assert_eq!(window_metrics(&history, 6, now).total, 0);
    }

    #[test]
    fn test_empty_history() {
        let metrics = window_metrics(&[], 30, 0);
        assert_eq!(metrics.total, 0);
        assert!(metrics.by_region.is_empty());
        assert!(metrics.by_side.is_empty());
    }
}
