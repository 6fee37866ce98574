//! Inbound signals.
//!
//! A [`VisionSignal`] is weak: something moved, identity unverified. A
//! [`ScanSignal`] is strong: an operator or scanner confirmed which object
//! it is and, optionally, where.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::inventory::model::InventoryObjectKind;

fn default_confidence() -> f32 {
    0.6
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSignal {
    pub object_type: InventoryObjectKind,
    #[serde(default)]
    pub from_zone: Option<String>,
    #[serde(default)]
    pub to_zone: Option<String>,
    /// Soft identity hint, e.g. a code read from the video
    #[serde(default)]
    pub hinted_object_id: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl VisionSignal {
    pub fn new(
        object_type: InventoryObjectKind,
        from_zone: Option<&str>,
        to_zone: Option<&str>,
    ) -> Self {
        Self {
            object_type,
            from_zone: from_zone.map(str::to_string),
            to_zone: to_zone.map(str::to_string),
            hinted_object_id: None,
            confidence: default_confidence(),
            meta: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_hint(mut self, object_id: impl Into<String>) -> Self {
        self.hinted_object_id = Some(object_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidSignal(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSignal {
    pub scanned_id: String,
    pub scanned_type: InventoryObjectKind,
    #[serde(default)]
    pub context_zone: Option<String>,
    /// Printer the object was scanned against, if any
    #[serde(default)]
    pub context_printer_id: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ScanSignal {
    pub fn new(scanned_id: impl Into<String>, scanned_type: InventoryObjectKind) -> Self {
        Self {
            scanned_id: scanned_id.into(),
            scanned_type,
            context_zone: None,
            context_printer_id: None,
            meta: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn at_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.context_zone = Some(zone_id.into());
        self
    }

    pub fn on_printer(mut self, printer_id: impl Into<String>) -> Self {
        self.context_printer_id = Some(printer_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scanned_id.trim().is_empty() {
            return Err(Error::InvalidSignal("scanned_id is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_signal_defaults() {
        let sig: VisionSignal =
            serde_json::from_str(r#"{"object_type": "filament_spool", "to_zone": "B"}"#).unwrap();
        assert_eq!(sig.confidence, 0.6);
        assert!(sig.meta.is_empty());
        assert!(sig.validate().is_ok());
    }

    #[test]
    fn test_vision_signal_rejects_bad_confidence() {
        let sig = VisionSignal::new(InventoryObjectKind::GenericObject, Some("A"), None)
            .with_confidence(1.5);
        assert!(matches!(sig.validate(), Err(Error::InvalidSignal(_))));
    }

    #[test]
    fn test_scan_signal_requires_id() {
        let sig = ScanSignal::new("  ", InventoryObjectKind::Printer);
        assert!(sig.validate().is_err());
    }
}
