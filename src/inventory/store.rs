//! Authoritative inventory state.
//!
//! Holds zones and the current location of every known object. The two
//! commit primitives are the only way the rest of the crate changes an
//! object's location.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::inventory::clock::{Clock, SystemClock};
use crate::inventory::model::{
    FilamentSpool, GenericItem, InventoryObject, InventoryObjectKind, InventorySnapshot, Printer,
};
use crate::zone::Zone;

/// What a commit does when it names an object the store has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownObjectPolicy {
    /// Create a minimal record with no prior zone, then apply the commit
    #[default]
    CreateIfMissing,
    /// Refuse the commit with `Error::UnknownObject`
    Reject,
}

/// Outcome of `commit_location_change`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCommit {
    pub kind: InventoryObjectKind,
    pub object_id: String,
    pub previous_zone: Option<String>,
    pub zone_id: Option<String>,
    /// The record did not exist and was created by this commit
    pub created: bool,
    /// The caller's `from_zone` disagreed with the stored zone
    pub from_zone_mismatch: bool,
}

/// Outcome of `commit_mount`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountCommit {
    pub spool_id: String,
    pub printer_id: String,
    pub zone_id: Option<String>,
    pub created_spool: bool,
    pub created_printer: bool,
}

#[derive(Debug)]
pub struct InventoryStore {
    zones: BTreeMap<String, Zone>,
    spools: BTreeMap<String, FilamentSpool>,
    printers: BTreeMap<String, Printer>,
    items: BTreeMap<String, GenericItem>,
    policy: UnknownObjectPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new(UnknownObjectPolicy::default())
    }
}

impl InventoryStore {
    pub fn new(policy: UnknownObjectPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: UnknownObjectPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            zones: BTreeMap::new(),
            spools: BTreeMap::new(),
            printers: BTreeMap::new(),
            items: BTreeMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> UnknownObjectPolicy {
        self.policy
    }

    // ---------- Zones ----------

    pub fn upsert_zone(&mut self, zone: Zone) -> Zone {
        self.zones.insert(zone.zone_id.clone(), zone.clone());
        zone
    }

    pub fn delete_zone(&mut self, zone_id: &str) -> Option<Zone> {
        self.zones.remove(zone_id)
    }

    pub fn zone(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.get(zone_id)
    }

    pub fn has_zone(&self, zone_id: &str) -> bool {
        self.zones.contains_key(zone_id)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    // ---------- Spools ----------

    pub fn upsert_spool(&mut self, mut spool: FilamentSpool) -> FilamentSpool {
        spool.updated_at = self.clock.now();
        self.spools.insert(spool.spool_id.clone(), spool.clone());
        spool
    }

    pub fn delete_spool(&mut self, spool_id: &str) -> Option<FilamentSpool> {
        self.spools.remove(spool_id)
    }

    pub fn spool(&self, spool_id: &str) -> Option<&FilamentSpool> {
        self.spools.get(spool_id)
    }

    pub fn spools(&self) -> impl Iterator<Item = &FilamentSpool> {
        self.spools.values()
    }

    // ---------- Printers ----------

    pub fn upsert_printer(&mut self, mut printer: Printer) -> Printer {
        printer.updated_at = self.clock.now();
        self.printers.insert(printer.printer_id.clone(), printer.clone());
        printer
    }

    pub fn delete_printer(&mut self, printer_id: &str) -> Option<Printer> {
        self.printers.remove(printer_id)
    }

    pub fn printer(&self, printer_id: &str) -> Option<&Printer> {
        self.printers.get(printer_id)
    }

    pub fn printers(&self) -> impl Iterator<Item = &Printer> {
        self.printers.values()
    }

    // ---------- Generic items ----------

    pub fn upsert_item(&mut self, mut item: GenericItem) -> GenericItem {
        item.updated_at = self.clock.now();
        self.items.insert(item.object_id.clone(), item.clone());
        item
    }

    pub fn delete_item(&mut self, object_id: &str) -> Option<GenericItem> {
        self.items.remove(object_id)
    }

    pub fn items(&self) -> impl Iterator<Item = &GenericItem> {
        self.items.values()
    }

    pub fn object(
        &self,
        kind: InventoryObjectKind,
        object_id: &str,
    ) -> Option<InventoryObject<'_>> {
        match kind {
            InventoryObjectKind::FilamentSpool => {
                self.spools.get(object_id).map(InventoryObject::Spool)
            }
            InventoryObjectKind::Printer => {
                self.printers.get(object_id).map(InventoryObject::Printer)
            }
            InventoryObjectKind::GenericObject => {
                self.items.get(object_id).map(InventoryObject::Generic)
            }
        }
    }

    /// Current zone of an object; `None` if unknown or outside.
    pub fn zone_of(&self, kind: InventoryObjectKind, object_id: &str) -> Option<&str> {
        self.object(kind, object_id).and_then(|o| o.zone_id())
    }

    // ---------- Commits ----------

    /// Move an object to `to_zone`.
    ///
    /// `from_zone` is informational: a disagreement with the stored zone is
    /// logged and reported in the result, and the move is applied anyway.
    pub fn commit_location_change(
        &mut self,
        kind: InventoryObjectKind,
        object_id: &str,
        to_zone: Option<&str>,
        from_zone: Option<&str>,
    ) -> Result<LocationCommit> {
        let now = self.clock.now();
        let policy = self.policy;
        let (slot, created) = match kind {
            InventoryObjectKind::FilamentSpool => {
                let (spool, created) =
                    entry(&mut self.spools, object_id, policy, kind, |id| FilamentSpool::new(id))?;
                spool.updated_at = now;
                (&mut spool.zone_id, created)
            }
            InventoryObjectKind::Printer => {
                let (printer, created) =
                    entry(&mut self.printers, object_id, policy, kind, |id| Printer::new(id))?;
                printer.updated_at = now;
                (&mut printer.zone_id, created)
            }
            InventoryObjectKind::GenericObject => {
                let (item, created) =
                    entry(&mut self.items, object_id, policy, kind, |id| GenericItem::new(id))?;
                item.updated_at = now;
                (&mut item.zone_id, created)
            }
        };

        let previous_zone = std::mem::replace(slot, to_zone.map(str::to_string));
        let from_zone_mismatch =
            !created && from_zone.is_some_and(|from| previous_zone.as_deref() != Some(from));
        if from_zone_mismatch {
            warn!(
                %kind,
                object_id,
                stored = ?previous_zone,
                claimed = ?from_zone,
                "from_zone disagrees with stored location, applying anyway"
            );
        }
        info!(
            %kind,
            object_id,
            from = ?previous_zone,
            to = ?to_zone,
            created,
            "location committed"
        );

        Ok(LocationCommit {
            kind,
            object_id: object_id.to_string(),
            previous_zone,
            zone_id: to_zone.map(str::to_string),
            created,
            from_zone_mismatch,
        })
    }

    /// Mount a spool on a printer, linking both sides.
    ///
    /// Any previous partner of either side is unlinked first. When `zone_id`
    /// is given the spool also moves there.
    pub fn commit_mount(
        &mut self,
        spool_id: &str,
        printer_id: &str,
        zone_id: Option<&str>,
    ) -> Result<MountCommit> {
        let now = self.clock.now();
        let policy = self.policy;

        if policy == UnknownObjectPolicy::Reject {
            if !self.spools.contains_key(spool_id) {
                return Err(Error::UnknownObject {
                    kind: InventoryObjectKind::FilamentSpool,
                    id: spool_id.to_string(),
                });
            }
            if !self.printers.contains_key(printer_id) {
                return Err(Error::UnknownObject {
                    kind: InventoryObjectKind::Printer,
                    id: printer_id.to_string(),
                });
            }
        }

        let created_spool = !self.spools.contains_key(spool_id);
        let created_printer = !self.printers.contains_key(printer_id);

        let old_printer = self
            .spools
            .get(spool_id)
            .and_then(|s| s.mounted_printer_id.clone())
            .filter(|p| p != printer_id);
        if let Some(p) = old_printer.and_then(|old| self.printers.get_mut(&old)) {
            if p.mounted_spool_id.as_deref() == Some(spool_id) {
                p.mounted_spool_id = None;
                p.updated_at = now;
            }
        }
        let old_spool = self
            .printers
            .get(printer_id)
            .and_then(|p| p.mounted_spool_id.clone())
            .filter(|s| s != spool_id);
        if let Some(s) = old_spool.and_then(|old| self.spools.get_mut(&old)) {
            if s.mounted_printer_id.as_deref() == Some(printer_id) {
                s.mounted_printer_id = None;
                s.updated_at = now;
            }
        }

        let spool = self
            .spools
            .entry(spool_id.to_string())
            .or_insert_with(|| FilamentSpool {
                zone_id: zone_id.map(str::to_string),
                ..FilamentSpool::new(spool_id)
            });
        spool.mounted_printer_id = Some(printer_id.to_string());
        if let Some(zone) = zone_id {
            spool.zone_id = Some(zone.to_string());
        }
        spool.updated_at = now;

        let printer = self
            .printers
            .entry(printer_id.to_string())
            .or_insert_with(|| Printer::new(printer_id));
        printer.mounted_spool_id = Some(spool_id.to_string());
        printer.updated_at = now;

        info!(spool_id, printer_id, zone = ?zone_id, "mount committed");
        Ok(MountCommit {
            spool_id: spool_id.to_string(),
            printer_id: printer_id.to_string(),
            zone_id: zone_id.map(str::to_string),
            created_spool,
            created_printer,
        })
    }

    // ---------- Snapshots ----------

    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            zones: self.zones.values().cloned().collect(),
            spools: self.spools.values().cloned().collect(),
            printers: self.printers.values().cloned().collect(),
            items: self.items.values().cloned().collect(),
        }
    }

    /// Replace the whole state with `snapshot`, keeping stored timestamps.
    pub fn restore(&mut self, snapshot: InventorySnapshot) {
        self.zones = snapshot.zones.into_iter().map(|z| (z.zone_id.clone(), z)).collect();
        self.spools = snapshot.spools.into_iter().map(|s| (s.spool_id.clone(), s)).collect();
        self.printers = snapshot.printers.into_iter().map(|p| (p.printer_id.clone(), p)).collect();
        self.items = snapshot.items.into_iter().map(|i| (i.object_id.clone(), i)).collect();
    }
}

fn entry<'a, T>(
    map: &'a mut BTreeMap<String, T>,
    object_id: &str,
    policy: UnknownObjectPolicy,
    kind: InventoryObjectKind,
    create: impl FnOnce(&str) -> T,
) -> Result<(&'a mut T, bool)> {
    let created = !map.contains_key(object_id);
    if created && policy == UnknownObjectPolicy::Reject {
        return Err(Error::UnknownObject {
            kind,
            id: object_id.to_string(),
        });
    }
    let value = map
        .entry(object_id.to_string())
        .or_insert_with(|| create(object_id));
    Ok((value, created))
}
