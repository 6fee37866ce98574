//! YAML configuration with environment overrides.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inventory::{InventoryObjectKind, LedgerConfig, UnknownObjectPolicy};
use crate::tracker::TrackerConfig;
use crate::zone::{OccupancyConfig, Zone};

pub const ENV_STORAGE_PATH: &str = "INV_STORAGE_PATH";
pub const ENV_PENDING_TIMEOUT: &str = "INV_PENDING_TIMEOUT_SECONDS";

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfidence {
    pub transfer: f32,
    pub enter: f32,
    pub exit: f32,
    pub residual: f32,
}

impl Default for SignalConfidence {
    fn default() -> Self {
        Self {
            transfer: 0.7,
            enter: 0.6,
            exit: 0.6,
            residual: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detections below this confidence are dropped before zone assignment
    pub min_confidence: f32,
    /// Labels never tracked
    pub ignored_labels: Vec<String>,
    /// When non-empty, only these labels are tracked
    pub allowed_labels: Vec<String>,
    /// Run detection on every N-th frame only
    pub process_every_n_frames: u64,
    /// Object type stamped on outgoing vision signals
    pub object_type: InventoryObjectKind,
    /// Also publish debounced appearance/disappearance signals
    pub publish_residual: bool,
    pub confidence: SignalConfidence,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.35,
            ignored_labels: vec!["person".to_string()],
            allowed_labels: Vec::new(),
            process_every_n_frames: 1,
            object_type: InventoryObjectKind::GenericObject,
            publish_residual: true,
            confidence: SignalConfidence::default(),
        }
    }
}

impl PipelineConfig {
    pub fn accepts_label(&self, label: &str) -> bool {
        if self.ignored_labels.iter().any(|l| l == label) {
            return false;
        }
        self.allowed_labels.is_empty() || self.allowed_labels.iter().any(|l| l == label)
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot file
    pub path: PathBuf,
    pub unknown_objects: UnknownObjectPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("inventory_state.json"),
            unknown_objects: UnknownObjectPolicy::CreateIfMissing,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub occupancy: OccupancyConfig,
    pub pipeline: PipelineConfig,
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    pub zones: Vec<Zone>,
}

impl Config {
    /// Read, apply environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_yaml_str(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(ENV_STORAGE_PATH).filter(|p| !p.is_empty()) {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_PENDING_TIMEOUT) {
            self.ledger.pending_timeout_seconds = raw.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{ENV_PENDING_TIMEOUT}='{raw}' is not a number"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for zone in &self.zones {
            if zone.zone_id.trim().is_empty() {
                return Err(Error::InvalidConfig("zone with empty zone_id".to_string()));
            }
            if !seen.insert(zone.zone_id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate zone_id '{}'",
                    zone.zone_id
                )));
            }
            if zone.geometry.is_some_and(|r| !r.is_valid()) {
                return Err(Error::InvalidConfig(format!(
                    "zone '{}' has a degenerate rectangle",
                    zone.zone_id
                )));
            }
        }
        if self.pipeline.process_every_n_frames == 0 {
            return Err(Error::InvalidConfig(
                "pipeline.process_every_n_frames must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pipeline.min_confidence) {
            return Err(Error::InvalidConfig(
                "pipeline.min_confidence must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::MatcherKind;

    const SAMPLE: &str = r#"
tracker:
  max_age_frames: 60
  match_distance_px: 250.0
  max_zone_gap_frames: 20
  enforce_same_label: false
  matcher: optimal
occupancy:
  min_stable_frames: 4
pipeline:
  object_type: filament_spool
  ignored_labels: [person, hand]
zones:
  - zone_id: Rack_A_Slot_1
    zone_type: rack_slot
    geometry: [0, 0, 200, 150]
  - zone_id: Printer_P3_Mount
    zone_type: printer_mount
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(cfg.tracker.max_age_frames, 60);
        assert_eq!(cfg.tracker.matcher, MatcherKind::Optimal);
        assert_eq!(cfg.occupancy.min_stable_frames, 4);
        assert_eq!(cfg.pipeline.object_type, InventoryObjectKind::FilamentSpool);
        assert_eq!(cfg.pipeline.min_confidence, 0.35);
        assert_eq!(cfg.ledger.pending_timeout_seconds, 20);
        assert_eq!(cfg.zones.len(), 2);
        assert!(cfg.zones[1].geometry.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|key| match key {
            ENV_STORAGE_PATH => Some("/tmp/inv.json".to_string()),
            ENV_PENDING_TIMEOUT => Some("45".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.storage.path, PathBuf::from("/tmp/inv.json"));
        assert_eq!(cfg.ledger.pending_timeout_seconds, 45);

        let err = cfg
            .apply_overrides(|key| (key == ENV_PENDING_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicate_zone_rejected() {
        let mut cfg = Config::default();
        cfg.zones = vec![Zone::new("A"), Zone::new("A")];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_label_filter() {
        let mut p = PipelineConfig::default();
        assert!(!p.accepts_label("person"));
        assert!(p.accepts_label("spool"));
        p.allowed_labels = vec!["printer".to_string()];
        assert!(!p.accepts_label("spool"));
        assert!(p.accepts_label("printer"));
    }
}
