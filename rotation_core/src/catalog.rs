//! The body-map catalog of injection points.
//!
//! The catalog is static reference data: areas, points and their plane
//! coordinates. Enabled/disabled state lives in preferences.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// The complete catalog of areas and injection points.
///
/// Points are kept in declaration order; that order is the deterministic
/// tie-break for recommendation scoring.
#[derive(Clone, Debug)]
pub struct Catalog {
    areas: Vec<Area>,
    points: Vec<Point>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from areas and points. Points keep the given order.
    pub fn new(areas: Vec<Area>, points: Vec<Point>) -> Self {
        let index = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Self {
            areas,
            points,
            index,
        }
    }

    /// All points in declaration order.
    pub fn all_points(&self) -> &[Point] {
        &self.points
    }

    /// All areas in declaration order.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Look up a point by id.
    ///
    /// `None` means the id is unknown or orphaned (e.g. history referencing
    /// a point removed in a later catalog revision); callers degrade to
    /// sentinels rather than treating this as fatal.
    pub fn lookup(&self, point_id: &str) -> Option<&Point> {
        self.index.get(point_id).map(|&i| &self.points[i])
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for point in &self.points {
            if point.id.is_empty() {
                errors.push("Point has empty ID".to_string());
            }
            if !seen.insert(point.id.as_str()) {
                errors.push(format!("Duplicate point ID '{}'", point.id));
            }
            if point.name.is_empty() {
                errors.push(format!("Point '{}' has empty name", point.id));
            }
            if !self.areas.iter().any(|a| a.region == point.region) {
                errors.push(format!(
                    "Point '{}' references undeclared region '{}'",
                    point.id, point.region
                ));
            }
            let pos = &point.position;
            if !(0.0..=100.0).contains(&pos.x) || !(0.0..=100.0).contains(&pos.y) {
                errors.push(format!(
                    "Point '{}' position ({}, {}) is outside the 0-100 plane",
                    point.id, pos.x, pos.y
                ));
            }
        }

        for area in &self.areas {
            if area.region.is_empty() {
                errors.push("Area has empty region key".to_string());
            }
            if area.name.is_empty() {
                errors.push(format!("Area '{}' has empty name", area.region));
            }
            if !self.points.iter().any(|p| p.region == area.region) {
                errors.push(format!("Area '{}' has no points", area.region));
            }
        }

        errors
    }
}

/// Builds the default catalog: 12 points over abdomen, thigh and arm.
///
/// **Note**: Prefer `get_default_catalog()` which returns a cached
/// reference. This function is retained for testing and custom catalog
/// creation.
pub fn build_default_catalog() -> Catalog {
    let areas = vec![
        Area {
            region: "abdomen".into(),
            name: "Abdomen".into(),
        },
        Area {
            region: "thigh".into(),
            name: "Thigh".into(),
        },
        Area {
            region: "arm".into(),
            name: "Arm".into(),
        },
    ];

    let pt = |id: &str, name: &str, side: Side, region: &str, area: &str, x: f64, y: f64| Point {
        id: id.into(),
        name: name.into(),
        side,
        region: region.into(),
        area_name: area.into(),
        position: Position { x, y },
    };

    let points = vec![
        // Abdomen
        pt("abd_r1", "Right 1", Side::Right, "abdomen", "Abdomen", 45.0, 35.0),
        pt("abd_r2", "Right 2", Side::Right, "abdomen", "Abdomen", 45.0, 45.0),
        pt("abd_r3", "Right 3", Side::Right, "abdomen", "Abdomen", 45.0, 55.0),
        pt("abd_l1", "Left 1", Side::Left, "abdomen", "Abdomen", 55.0, 35.0),
        pt("abd_l2", "Left 2", Side::Left, "abdomen", "Abdomen", 55.0, 45.0),
        pt("abd_l3", "Left 3", Side::Left, "abdomen", "Abdomen", 55.0, 55.0),
        // Thigh
        pt("th_r1", "Right 1", Side::Right, "thigh", "Thigh", 45.0, 75.0),
        pt("th_r2", "Right 2", Side::Right, "thigh", "Thigh", 45.0, 85.0),
        pt("th_l1", "Left 1", Side::Left, "thigh", "Thigh", 55.0, 75.0),
        pt("th_l2", "Left 2", Side::Left, "thigh", "Thigh", 55.0, 85.0),
        // Arm
        pt("arm_r1", "Right 1", Side::Right, "arm", "Arm", 35.0, 40.0),
        pt("arm_l1", "Left 1", Side::Left, "arm", "Arm", 65.0, 40.0),
    ];

    Catalog::new(areas, points)
}
