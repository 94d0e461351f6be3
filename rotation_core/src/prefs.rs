//! User preferences: cooldown, alternation, enabled regions.
//!
//! Preferences are persisted as a single JSON document in the key-value
//! store. Missing fields fall back to defaults via per-field serde
//! defaults; a document that fails to parse falls back to defaults
//! entirely. The nested `enabledRegions` map is additionally deep-merged
//! against the catalog so regions added in a later catalog revision start
//! out enabled.

use crate::catalog::Catalog;
use crate::kv::{KeyValueStore, KEY_PREFS};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User preferences consumed by the status evaluator and recommender.
///
/// `daily_slots` and `language` are informational for the core;
/// the PIN fields are opaque data for a UI gate and are never validated
/// here (they are not a security boundary).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,

    #[serde(default = "default_true")]
    pub alternate_side: bool,

    #[serde(default = "default_true")]
    pub alternate_region: bool,

    #[serde(default = "default_daily_slots")]
    pub daily_slots: u32,

    #[serde(default)]
    pub enabled_regions: HashMap<String, bool>,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub pin_enabled: bool,

    #[serde(default)]
    pub pin_code: String,
}

fn default_cooldown_days() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

fn default_daily_slots() -> u32 {
    2
}

fn default_language() -> String {
    "pt".into()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            cooldown_days: default_cooldown_days(),
            alternate_side: true,
            alternate_region: true,
            daily_slots: default_daily_slots(),
            enabled_regions: HashMap::new(),
            language: default_language(),
            pin_enabled: false,
            pin_code: String::new(),
        }
    }
}

impl Preferences {
    /// Load preferences from the store, merged over defaults.
    ///
    /// Corrupt or absent documents degrade to defaults with a warning,
    /// never an error.
    pub fn load(store: &dyn KeyValueStore, catalog: &Catalog) -> Self {
        let mut prefs = match store.get(KEY_PREFS) {
            Ok(Some(raw)) => match serde_json::from_str::<Preferences>(&raw) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!("Failed to parse stored preferences: {}. Using defaults.", e);
                    Self::default()
                }
            },
            Ok(None) => {
                tracing::info!("No stored preferences, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read stored preferences: {}. Using defaults.", e);
                Self::default()
            }
        };

        prefs.normalize(catalog);
        prefs
    }

    /// Persist the preferences document.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        store.set(KEY_PREFS, &raw)?;
        tracing::debug!("Saved preferences");
        Ok(())
    }

    /// Clamp invalid values and fill region enablement gaps.
    ///
    /// Regions the catalog declares but the stored map omits become
    /// enabled; region keys the catalog no longer declares are kept as-is
    /// (harmless, and preserved on round-trip).
    pub fn normalize(&mut self, catalog: &Catalog) {
        if self.cooldown_days < 1 {
            tracing::warn!("cooldownDays < 1 in stored preferences, clamping to 1");
            self.cooldown_days = 1;
        }
        if self.daily_slots < 1 {
            self.daily_slots = 1;
        }
        for area in catalog.areas() {
            self.enabled_regions
                .entry(area.region.clone())
                .or_insert(true);
        }
    }

    /// Whether a region is enabled. Unknown regions count as disabled.
    pub fn region_enabled(&self, region: &str) -> bool {
        self.enabled_regions.get(region).copied().unwrap_or(false)
    }

    /// Cooldown expressed in milliseconds.
    pub fn cooldown_ms(&self) -> i64 {
        i64::from(self.cooldown_days) * crate::DAY_MS
    }
}
