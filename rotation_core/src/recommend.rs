//! Next-site recommendation scoring.
//!
//! The recommender ranks every usable point with a weighted sum:
//! - +50 for being past its cooldown
//! - side alternation relative to the last-used point (+20 / -10)
//! - region alternation relative to the last-used point (+15 / -5)
//! - spatial distance to the last-used point, capped at +20
//! - frequency dampening over the trailing 30 days (10 down to 0)
//!
//! Ties keep the earliest point in catalog declaration order.

use crate::catalog::Catalog;
use crate::prefs::Preferences;
use crate::status::status_of;
use crate::types::{HistoryEntry, Point, PointStatus};
use crate::DAY_MS;

/// Suggest the next injection point.
///
/// Returns `None` only when no catalog point sits in an enabled region.
/// When every usable point is still in cooldown the full usable set is
/// scored instead, so a suggestion is always produced.
pub fn suggest<'a>(
    catalog: &'a Catalog,
    history: &[HistoryEntry],
    prefs: &Preferences,
    now: i64,
) -> Option<&'a Point> {
    let usable: Vec<&Point> = catalog
        .all_points()
        .iter()
        .filter(|p| prefs.region_enabled(&p.region))
        .collect();
    if usable.is_empty() {
        tracing::debug!("No usable points: every region disabled");
        return None;
    }

    // Last-used point, regardless of region enablement. An entry whose
    // point no longer exists in the catalog yields no reference point and
    // the alternation/distance terms are skipped.
    let last = latest_entry(history).and_then(|h| catalog.lookup(&h.point_id));

    let available: Vec<&Point> = usable
        .iter()
        .copied()
        .filter(|p| status_of(&p.id, history, prefs, now) == PointStatus::Available)
        .collect();

    // Fall back to the full usable set when everything is in cooldown.
    let pool = if available.is_empty() { usable } else { available };

    let mut best: Option<(&Point, f64)> = None;
    for point in pool {
        let score = score_point(point, last, history, prefs, now);
        tracing::trace!(point = %point.id, score, "scored candidate");
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((point, score)),
        }
    }

    best.map(|(point, _)| point)
}

/// The most recent entry overall: maximum `ts`, ties keeping the entry
/// closest to the front of the log (store order is most-recent-first).
fn latest_entry(history: &[HistoryEntry]) -> Option<&HistoryEntry> {
    let mut latest: Option<&HistoryEntry> = None;
    for entry in history {
        match latest {
            Some(l) if entry.ts <= l.ts => {}
            _ => latest = Some(entry),
        }
    }
    latest
}

/// Score a single candidate point.
///
/// Status is recomputed here rather than taken from the pool: the
/// fallback pool can mix available and recent points.
fn score_point(
    point: &Point,
    last: Option<&Point>,
    history: &[HistoryEntry],
    prefs: &Preferences,
    now: i64,
) -> f64 {
    let mut score = 0.0;

    if status_of(&point.id, history, prefs, now) == PointStatus::Available {
        score += 50.0;
    }

    if let Some(last) = last {
        if prefs.alternate_side {
            score += if point.side != last.side { 20.0 } else { -10.0 };
        }
        if prefs.alternate_region {
            score += if point.region != last.region { 15.0 } else { -5.0 };
        }
        score += point.position.distance(&last.position).min(20.0);
    }

    let lookback = now - 30 * DAY_MS;
    let count30 = history
        .iter()
        .filter(|h| h.ts >= lookback && h.point_id == point.id)
        .count();
    score += 10.0 - (count30 as f64 * 2.0).min(10.0);

    score
}
