//! Tabular export of the injection history.
//!
//! JSON remains the lossless round-trip format; the CSV export is a
//! one-way convenience for spreadsheets.

use crate::types::HistoryEntry;
use crate::Result;
use chrono::{TimeZone, Utc};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    point_id: String,
    region: String,
    side: String,
    ts: i64,
    recorded_at: String,
    note: String,
}

impl From<&HistoryEntry> for CsvRow {
    fn from(entry: &HistoryEntry) -> Self {
        let recorded_at = Utc
            .timestamp_millis_opt(entry.ts)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        CsvRow {
            id: entry.id.clone(),
            point_id: entry.point_id.clone(),
            region: entry.region.clone(),
            side: entry.side.to_string(),
            ts: entry.ts,
            recorded_at,
            note: entry.note.clone(),
        }
    }
}

/// Write the history to a CSV file with headers, in the given order.
///
/// Returns the number of rows written.
pub fn write_history_csv(entries: &[HistoryEntry], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(CsvRow::from(entry))?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} history rows to {:?}", entries.len(), path);
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn test_writes_headers_and_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("history.csv");

        let entries = [HistoryEntry {
            id: "e1".into(),
            point_id: "abd_r1".into(),
            region: "abdomen".into(),
            side: Side::Right,
            ts: 1_709_251_200_000,
            note: "after lunch".into(),
        }];

        let count = write_history_csv(&entries, &csv_path).unwrap();
        assert_eq!(count, 1);

        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,point_id,region,side,ts,recorded_at,note"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("abd_r1"));
        assert!(row.contains("right"));
        assert!(row.contains("2024-03-01"));
        assert!(row.contains("after lunch"));
    }

    #[test]
    fn test_empty_history_creates_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("empty.csv");

        let count = write_history_csv(&[], &csv_path).unwrap();
        assert_eq!(count, 0);
        assert!(csv_path.exists());
    }
}
