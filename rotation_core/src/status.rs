//! Per-point availability classification.

use crate::prefs::Preferences;
use crate::types::{HistoryEntry, PointStatus};

/// Classify a point as available or still in cooldown.
///
/// Takes the maximum `ts` among matching entries explicitly; the history
/// slice is not assumed to be sorted. A point with no history is always
/// available. The cooldown is a hard threshold: `elapsed >= cooldown`
/// means available, one millisecond less means recent.
pub fn status_of(
    point_id: &str,
    history: &[HistoryEntry],
    prefs: &Preferences,
    now: i64,
) -> PointStatus {
    let last_ts = history
        .iter()
        .filter(|h| h.point_id == point_id)
        .map(|h| h.ts)
        .max();

    match last_ts {
        None => PointStatus::Available,
        Some(ts) => {
            let elapsed = now - ts;
            if elapsed >= prefs.cooldown_ms() {
                PointStatus::Available
            } else {
                PointStatus::Recent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use crate::DAY_MS;

    fn entry(point_id: &str, ts: i64) -> HistoryEntry {
        HistoryEntry {
            id: format!("e_{}", ts),
            point_id: point_id.into(),
            region: "abdomen".into(),
            side: Side::Right,
            ts,
            note: String::new(),
        }
    }

    #[test]
    fn test_no_history_is_available() {
        let prefs = Preferences::default();
        assert_eq!(
            status_of("abd_r1", &[], &prefs, 1_000_000),
            PointStatus::Available
        );
    }

    #[test]
    fn test_cooldown_boundary() {
        let prefs = Preferences::default(); // cooldown 7 days
        let now = 100 * DAY_MS;
        let cooldown = 7 * DAY_MS;

        // One millisecond inside the cooldown: still recent
        let history = [entry("abd_r1", now - cooldown + 1)];
        assert_eq!(
            status_of("abd_r1", &history, &prefs, now),
            PointStatus::Recent
        );

        // Exactly at the threshold: available
        let history = [entry("abd_r1", now - cooldown)];
        assert_eq!(
            status_of("abd_r1", &history, &prefs, now),
            PointStatus::Available
        );
    }

    #[test]
    fn test_uses_maximum_even_when_unsorted() {
        let prefs = Preferences::default();
        let now = 100 * DAY_MS;

        // Old entry first, fresh entry buried later in the slice
        let history = [
            entry("abd_r1", now - 30 * DAY_MS),
            entry("abd_r2", now - 1),
            entry("abd_r1", now - DAY_MS),
        ];
        assert_eq!(
            status_of("abd_r1", &history, &prefs, now),
            PointStatus::Recent
        );
    }

    #[test]
    fn test_other_points_do_not_count() {
        let prefs = Preferences::default();
        let now = 100 * DAY_MS;
        let history = [entry("abd_r2", now - 1)];
        assert_eq!(
            status_of("abd_r1", &history, &prefs, now),
            PointStatus::Available
        );
    }
}
