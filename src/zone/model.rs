use serde::{Deserialize, Serialize};

use crate::tracker::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    RackSlot,
    PrinterMount,
    PrinterArea,
    #[default]
    Other,
}

/// A named region of the monitored area.
///
/// Zones are reference data loaded from configuration. A zone without
/// geometry exists for inventory bookkeeping but never claims a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: String,
    #[serde(default)]
    pub zone_type: ZoneType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rectangle in frame pixels, TLBR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Rect>,
}

impl Zone {
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            zone_type: ZoneType::Other,
            description: None,
            geometry: None,
        }
    }

    pub fn with_type(mut self, zone_type: ZoneType) -> Self {
        self.zone_type = zone_type;
        self
    }

    pub fn with_rect(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.geometry = Some(Rect::from_tlbr(x1, y1, x2, y2));
        self
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        self.geometry.is_some_and(|rect| rect.contains(px, py))
    }
}
