//! Reconciliation policy between weak signals, strong signals and the store.
//!
//! - Vision signals never touch the store; they become pending confirmations.
//! - Scan signals commit at once.
//! - Confirming a pending record commits its move when an identity is known,
//!   either the record's hint or one supplied by the operator.
//! - Rejections leave the store alone.
//!
//! The ledger and the store each sit behind their own mutex. When both are
//! needed the ledger is locked first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::inventory::ledger::{ConfirmationLedger, ConfirmationStatus, PendingConfirmation};
use crate::inventory::signal::{ScanSignal, VisionSignal};
use crate::inventory::store::{InventoryStore, LocationCommit, MountCommit};

/// Operator request to confirm or reject a pending record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub resolved_by: String,
    /// Needed only when the pending record carries no hint
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ResolutionRequest {
    pub fn by(resolved_by: impl Into<String>) -> Self {
        Self {
            resolved_by: resolved_by.into(),
            object_id: None,
            note: None,
        }
    }

    pub fn with_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.resolved_by.trim().is_empty() {
            return Err(Error::InvalidRequest("resolved_by is required".to_string()));
        }
        Ok(())
    }
}

/// Result of confirming a pending record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub record: PendingConfirmation,
    /// `None` when nothing was committed: the record was not confirmed, or
    /// it was confirmed without any identity to commit against.
    pub committed: Option<LocationCommit>,
}

impl Resolution {
    /// Confirmed, but neither a hint nor an operator-supplied id was available.
    pub fn missing_identity(&self) -> bool {
        self.record.status == ConfirmationStatus::Confirmed && self.committed.is_none()
    }
}

/// What a scan signal changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "commit", rename_all = "snake_case")]
pub enum ScanOutcome {
    Mounted(MountCommit),
    Relocated(LocationCommit),
}

#[derive(Debug)]
pub struct EventReconciler {
    ledger: Mutex<ConfirmationLedger>,
    store: Mutex<InventoryStore>,
}

impl EventReconciler {
    pub fn new(ledger: ConfirmationLedger, store: InventoryStore) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            store: Mutex::new(store),
        }
    }

    /// Exclusive access to the store, for CRUD and reads.
    pub fn store(&self) -> MutexGuard<'_, InventoryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledger(&self) -> MutexGuard<'_, ConfirmationLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold a vision signal for confirmation. Never commits.
    pub fn ingest_vision(&self, signal: &VisionSignal) -> Result<PendingConfirmation> {
        signal.validate()?;
        Ok(self.ledger().create(
            signal.object_type,
            signal.from_zone.clone(),
            signal.to_zone.clone(),
            signal.hinted_object_id.clone(),
        ))
    }

    /// Commit a scan signal immediately.
    pub fn ingest_scan(&self, signal: &ScanSignal) -> Result<ScanOutcome> {
        signal.validate()?;
        let mut store = self.store();
        let id = signal.scanned_id.as_str();
        let zone = signal.context_zone.as_deref();

        let kind = signal.scanned_type;
        let outcome = match signal.context_printer_id.as_deref() {
            Some(printer_id) if kind.is_mountable() => {
                ScanOutcome::Mounted(store.commit_mount(id, printer_id, zone)?)
            }
            // A scan without zone context places the object outside every zone.
            _ => ScanOutcome::Relocated(store.commit_location_change(kind, id, zone, None)?),
        };
        info!(scanned_id = id, %kind, "scan committed");
        Ok(outcome)
    }

    /// Sweep expiries and return every record, optionally filtered by status.
    pub fn list_pending(&self, status: Option<ConfirmationStatus>) -> Vec<PendingConfirmation> {
        self.ledger()
            .list_pending()
            .iter()
            .filter(|pc| status.is_none_or(|s| pc.status == s))
            .cloned()
            .collect()
    }

    pub fn confirm(&self, pending_id: &str, request: &ResolutionRequest) -> Result<Resolution> {
        request.validate()?;
        let mut ledger = self.ledger();
        let record = ledger.confirm(pending_id, &request.resolved_by, request.note.as_deref())?;
        if record.status != ConfirmationStatus::Confirmed {
            return Ok(Resolution {
                record,
                committed: None,
            });
        }

        let Some(object_id) = record
            .hinted_object_id
            .as_deref()
            .or(request.object_id.as_deref())
        else {
            info!(pending_id, "confirmed without identity, nothing committed");
            return Ok(Resolution {
                record,
                committed: None,
            });
        };

        let committed = self.store().commit_location_change(
            record.object_type,
            object_id,
            record.to_zone.as_deref(),
            record.from_zone.as_deref(),
        )?;
        drop(ledger);
        Ok(Resolution {
            record,
            committed: Some(committed),
        })
    }

    pub fn reject(
        &self,
        pending_id: &str,
        request: &ResolutionRequest,
    ) -> Result<PendingConfirmation> {
        request.validate()?;
        self.ledger()
            .reject(pending_id, &request.resolved_by, request.note.as_deref())
    }
}
