//! Service context handed to whatever transport fronts the core.
//!
//! Owns the reconciler (and through it the ledger and store) plus the blob
//! store used for snapshots. Every method takes `&self`; share the context
//! behind an `Arc` between request handlers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::integration::SignalSink;
use crate::inventory::clock::{Clock, SystemClock};
use crate::inventory::ledger::{ConfirmationLedger, ConfirmationStatus, PendingConfirmation};
use crate::inventory::model::{FilamentSpool, InventoryObjectKind, InventorySnapshot, Printer};
use crate::inventory::persistence::StateBlobStore;
use crate::inventory::reconciler::{EventReconciler, Resolution, ResolutionRequest, ScanOutcome};
use crate::inventory::signal::{ScanSignal, VisionSignal};
use crate::inventory::store::InventoryStore;
use crate::zone::Zone;

/// Acknowledgement returned for a scan signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanAck {
    pub ok: bool,
    pub outcome: ScanOutcome,
}

#[derive(Debug)]
pub struct ServiceContext {
    reconciler: EventReconciler,
    blobs: Box<dyn StateBlobStore>,
}

impl ServiceContext {
    pub fn new(reconciler: EventReconciler, blobs: Box<dyn StateBlobStore>) -> Self {
        Self { reconciler, blobs }
    }

    /// Build the context from configuration and restore the last snapshot.
    ///
    /// Zones listed in the configuration are upserted over the restored ones.
    pub fn open(config: &Config, blobs: Box<dyn StateBlobStore>) -> Result<Self> {
        Self::open_with_clock(config, blobs, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        config: &Config,
        blobs: Box<dyn StateBlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let ledger = ConfirmationLedger::with_clock(&config.ledger, clock.clone());
        let mut store = InventoryStore::with_clock(config.storage.unknown_objects, clock);

        if let Some(state) = blobs.load()? {
            let snapshot: InventorySnapshot = serde_json::from_value(state)?;
            info!(
                zones = snapshot.zones.len(),
                spools = snapshot.spools.len(),
                printers = snapshot.printers.len(),
                items = snapshot.items.len(),
                "inventory restored"
            );
            store.restore(snapshot);
        }
        for zone in &config.zones {
            store.upsert_zone(zone.clone());
        }

        Ok(Self::new(EventReconciler::new(ledger, store), blobs))
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    // ---------- Signals ----------

    pub fn submit_vision(&self, signal: &VisionSignal) -> Result<PendingConfirmation> {
        self.reconciler.ingest_vision(signal)
    }

    pub fn submit_scan(&self, signal: &ScanSignal) -> Result<ScanAck> {
        let outcome = self.reconciler.ingest_scan(signal)?;
        self.persist()?;
        Ok(ScanAck { ok: true, outcome })
    }

    // ---------- Confirmations ----------

    pub fn list_pending(&self, status: Option<ConfirmationStatus>) -> Vec<PendingConfirmation> {
        self.reconciler.list_pending(status)
    }

    pub fn confirm(&self, pending_id: &str, request: &ResolutionRequest) -> Result<Resolution> {
        let resolution = self.reconciler.confirm(pending_id, request)?;
        if resolution.committed.is_some() {
            self.persist()?;
        }
        Ok(resolution)
    }

    pub fn reject(
        &self,
        pending_id: &str,
        request: &ResolutionRequest,
    ) -> Result<PendingConfirmation> {
        self.reconciler.reject(pending_id, request)
    }

    // ---------- Zones ----------

    pub fn zones(&self) -> Vec<Zone> {
        self.reconciler.store().zones().cloned().collect()
    }

    pub fn upsert_zone(&self, zone: Zone) -> Result<Zone> {
        let zone = self.reconciler.store().upsert_zone(zone);
        self.persist()?;
        Ok(zone)
    }

    pub fn delete_zone(&self, zone_id: &str) -> Result<Option<Zone>> {
        let removed = self.reconciler.store().delete_zone(zone_id);
        self.persist()?;
        Ok(removed)
    }

    // ---------- Spools ----------

    pub fn spools(&self) -> Vec<FilamentSpool> {
        self.reconciler.store().spools().cloned().collect()
    }

    pub fn upsert_spool(&self, spool: FilamentSpool) -> Result<FilamentSpool> {
        let spool = {
            let mut store = self.reconciler.store();
            check_zone(
                &store,
                InventoryObjectKind::FilamentSpool,
                &spool.spool_id,
                spool.zone_id.as_deref(),
            )?;
            store.upsert_spool(spool)
        };
        self.persist()?;
        Ok(spool)
    }

    pub fn delete_spool(&self, spool_id: &str) -> Result<Option<FilamentSpool>> {
        let removed = self.reconciler.store().delete_spool(spool_id);
        self.persist()?;
        Ok(removed)
    }

    // ---------- Printers ----------

    pub fn printers(&self) -> Vec<Printer> {
        self.reconciler.store().printers().cloned().collect()
    }

    pub fn upsert_printer(&self, printer: Printer) -> Result<Printer> {
        let printer = {
            let mut store = self.reconciler.store();
            check_zone(
                &store,
                InventoryObjectKind::Printer,
                &printer.printer_id,
                printer.zone_id.as_deref(),
            )?;
            store.upsert_printer(printer)
        };
        self.persist()?;
        Ok(printer)
    }

    pub fn delete_printer(&self, printer_id: &str) -> Result<Option<Printer>> {
        let removed = self.reconciler.store().delete_printer(printer_id);
        self.persist()?;
        Ok(removed)
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.reconciler.store().snapshot()
    }

    /// Write the current inventory to the blob store.
    ///
    /// The in-memory state is already committed when this runs; a failed
    /// write is reported but not rolled back.
    fn persist(&self) -> Result<()> {
        let store = self.reconciler.store();
        let state = serde_json::to_value(store.snapshot())?;
        self.blobs.save(&state).inspect_err(|e| {
            warn!(error = %e, "failed to persist inventory snapshot");
        })
    }
}

fn check_zone(
    store: &InventoryStore,
    kind: InventoryObjectKind,
    id: &str,
    zone_id: Option<&str>,
) -> Result<()> {
    match zone_id {
        Some(zone) if !store.has_zone(zone) => Err(Error::InvalidReference {
            kind,
            id: id.to_string(),
            zone_id: zone.to_string(),
        }),
        _ => Ok(()),
    }
}

impl SignalSink for ServiceContext {
    type Error = Error;

    fn publish(&mut self, signal: &VisionSignal) -> Result<()> {
        self.submit_vision(signal).map(|_| ())
    }
}
