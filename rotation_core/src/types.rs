//! Core domain types for the Siterot system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Injection points and their body-map coordinates
//! - Anatomical areas (regions)
//! - History entries (the append-only injection log)
//! - Point availability status

use serde::{Deserialize, Serialize};

/// Which side of the body a point sits on.
///
/// `Na` is the sentinel used when an imported entry's point cannot be
/// resolved against the current catalog.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Na,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
            Side::Na => write!(f, "na"),
        }
    }
}

/// A coordinate on the fixed 0-100 normalized body-map plane.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Euclidean distance to another position, in plane units.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An injection point from the catalog.
///
/// Region and area name are flattened in at catalog construction so a
/// lookup never needs a second hop. Points never change after the catalog
/// is defined.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub id: String,
    pub name: String,
    pub side: Side,
    pub region: String,
    pub area_name: String,
    pub position: Position,
}

/// An anatomical grouping of points (e.g. abdomen, thigh, arm).
///
/// Whether an area is enabled lives in [`crate::Preferences`], not here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Area {
    pub region: String,
    pub name: String,
}

/// Availability classification for a point.
///
/// Cooldown is a hard threshold: a point is either past it or not, there
/// is no partial-availability state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointStatus {
    Available,
    Recent,
}

/// One recorded injection.
///
/// `region` and `side` are denormalized snapshots of the point at the
/// time of recording, so history stays meaningful if the catalog changes
/// in a later revision. `ts` is epoch milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub point_id: String,
    pub region: String,
    pub side: Side,
    pub ts: i64,
    #[serde(default)]
    pub note: String,
}

/// Region sentinel for entries whose point cannot be resolved.
pub const UNKNOWN_REGION: &str = "unknown";
