//! Inventory reconciliation: confirmation ledger, authoritative store and
//! the policy that connects them.

mod clock;
mod ledger;
mod model;
mod persistence;
mod reconciler;
mod service;
mod signal;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{
    AUTO_EXPIRED_NOTE, ConfirmationLedger, ConfirmationStatus, LedgerConfig, PendingConfirmation,
};
pub use model::{
    FilamentSpool, GenericItem, InventoryObject, InventoryObjectKind, InventorySnapshot, Printer,
};
pub use persistence::{JsonFileStore, MemoryBlobStore, StateBlobStore};
pub use reconciler::{EventReconciler, Resolution, ResolutionRequest, ScanOutcome};
pub use service::{ScanAck, ServiceContext};
pub use signal::{ScanSignal, VisionSignal};
pub use store::{InventoryStore, LocationCommit, MountCommit, UnknownObjectPolicy};
