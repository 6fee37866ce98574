//! Zone-aware object tracking reconciled into an inventory of record.
//!
//! Video detections flow through [`integration::FramePipeline`] (zone
//! assignment, [`tracker::ZoneTracker`], occupancy debouncing) and come out
//! as weak [`inventory::VisionSignal`]s. The [`inventory::EventReconciler`]
//! holds those for human confirmation while strong scan signals commit to
//! the [`inventory::InventoryStore`] directly.

pub mod config;
pub mod error;
pub mod integration;
pub mod inventory;
pub mod tracker;
pub mod zone;

pub use config::Config;
pub use error::{Error, Result};
