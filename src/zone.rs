//! Zones, zone assignment and debounced zone occupancy.

mod assigner;
mod model;
mod occupancy;

pub use assigner::{ZoneAssigner, count_by_zone};
pub use model::{Zone, ZoneType};
pub use occupancy::{
    ChangeDirection, InferredTransfer, OccupancyConfig, OccupancyDebouncer, ZoneChange,
    infer_transfers,
};
