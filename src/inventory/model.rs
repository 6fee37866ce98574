use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::zone::Zone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryObjectKind {
    FilamentSpool,
    Printer,
    GenericObject,
}

impl InventoryObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryObjectKind::FilamentSpool => "filament_spool",
            InventoryObjectKind::Printer => "printer",
            InventoryObjectKind::GenericObject => "generic_object",
        }
    }

    /// Kinds that can be mounted onto a printer.
    pub fn is_mountable(&self) -> bool {
        match self {
            InventoryObjectKind::FilamentSpool => true,
            InventoryObjectKind::Printer | InventoryObjectKind::GenericObject => false,
        }
    }
}

impl fmt::Display for InventoryObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InventoryObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filament_spool" | "spool" | "filament" => Ok(Self::FilamentSpool),
            "printer" => Ok(Self::Printer),
            "generic_object" | "generic" => Ok(Self::GenericObject),
            other => Err(format!("unknown object kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentSpool {
    pub spool_id: String,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    /// Current location; `None` when unknown or outside every zone
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub mounted_printer_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl FilamentSpool {
    pub fn new(spool_id: impl Into<String>) -> Self {
        Self {
            spool_id: spool_id.into(),
            material: None,
            color: None,
            brand: None,
            zone_id: None,
            mounted_printer_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn in_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub printer_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub mounted_spool_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Printer {
    pub fn new(printer_id: impl Into<String>) -> Self {
        Self {
            printer_id: printer_id.into(),
            model: None,
            zone_id: None,
            mounted_spool_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn in_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }
}

/// Anything tracked by location only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericItem {
    pub object_id: String,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl GenericItem {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            zone_id: None,
            updated_at: Utc::now(),
        }
    }
}

/// Borrowed view of any stored object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InventoryObject<'a> {
    Spool(&'a FilamentSpool),
    Printer(&'a Printer),
    Generic(&'a GenericItem),
}

impl<'a> InventoryObject<'a> {
    pub fn zone_id(&self) -> Option<&'a str> {
        match *self {
            InventoryObject::Spool(s) => s.zone_id.as_deref(),
            InventoryObject::Printer(p) => p.zone_id.as_deref(),
            InventoryObject::Generic(g) => g.zone_id.as_deref(),
        }
    }
}

/// Serializable image of the whole inventory, as written to the blob store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub spools: Vec<FilamentSpool>,
    #[serde(default)]
    pub printers: Vec<Printer>,
    #[serde(default)]
    pub items: Vec<GenericItem>,
}
