//! Confirmation ledger for weak signals awaiting adjudication.
//!
//! Expiry is pull-based: every read and every mutation first sweeps records
//! whose deadline has passed. Nothing runs in the background, so a record
//! can sit past its TTL in storage until the next access, and callers that
//! need to react to expiry must poll `list_pending`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::inventory::clock::{Clock, SystemClock};
use crate::inventory::model::InventoryObjectKind;

pub const AUTO_EXPIRED_NOTE: &str = "auto-expired";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How long a weak signal waits for a strong signal or an operator
    pub pending_timeout_seconds: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pending_timeout_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Rejected,
    Expired,
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfirmationStatus::Pending => "pending",
            ConfirmationStatus::Confirmed => "confirmed",
            ConfirmationStatus::Rejected => "rejected",
            ConfirmationStatus::Expired => "expired",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub pending_id: String,
    pub object_type: InventoryObjectKind,
    pub from_zone: Option<String>,
    pub to_zone: Option<String>,
    pub hinted_object_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ConfirmationStatus,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl PendingConfirmation {
    pub fn is_pending(&self) -> bool {
        self.status == ConfirmationStatus::Pending
    }
}

#[derive(Debug)]
pub struct ConfirmationLedger {
    records: Vec<PendingConfirmation>,
    index: HashMap<String, usize>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ConfirmationLedger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let seconds = i64::try_from(config.pending_timeout_seconds).unwrap_or(i64::MAX);
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            ttl: Duration::try_seconds(seconds).unwrap_or(Duration::MAX),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn create(
        &mut self,
        object_type: InventoryObjectKind,
        from_zone: Option<String>,
        to_zone: Option<String>,
        hinted_object_id: Option<String>,
    ) -> PendingConfirmation {
        let now = self.clock.now();
        self.expire_due(now);

        let record = PendingConfirmation {
            pending_id: Uuid::new_v4().to_string(),
            object_type,
            from_zone,
            to_zone,
            hinted_object_id,
            created_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            status: ConfirmationStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            resolution_note: None,
        };
        info!(
            pending_id = %record.pending_id,
            object_type = %record.object_type,
            from = ?record.from_zone,
            to = ?record.to_zone,
            hint = ?record.hinted_object_id,
            "pending confirmation created"
        );
        self.index.insert(record.pending_id.clone(), self.records.len());
        self.records.push(record.clone());
        record
    }

    /// Sweep expired records, then return the whole table in creation order.
    pub fn list_pending(&mut self) -> &[PendingConfirmation] {
        let now = self.clock.now();
        self.expire_due(now);
        &self.records
    }

    pub fn get(&mut self, pending_id: &str) -> Option<&PendingConfirmation> {
        let now = self.clock.now();
        self.expire_due(now);
        self.index.get(pending_id).map(|&i| &self.records[i])
    }

    pub fn confirm(
        &mut self,
        pending_id: &str,
        resolved_by: &str,
        note: Option<&str>,
    ) -> Result<PendingConfirmation> {
        self.resolve(pending_id, ConfirmationStatus::Confirmed, resolved_by, note)
    }

    pub fn reject(
        &mut self,
        pending_id: &str,
        resolved_by: &str,
        note: Option<&str>,
    ) -> Result<PendingConfirmation> {
        self.resolve(pending_id, ConfirmationStatus::Rejected, resolved_by, note)
    }

    /// Move a pending record to `outcome`. Records already out of `Pending`
    /// are returned untouched.
    fn resolve(
        &mut self,
        pending_id: &str,
        outcome: ConfirmationStatus,
        resolved_by: &str,
        note: Option<&str>,
    ) -> Result<PendingConfirmation> {
        let now = self.clock.now();
        self.expire_due(now);

        let idx = *self
            .index
            .get(pending_id)
            .ok_or_else(|| Error::PendingNotFound(pending_id.to_string()))?;
        let record = &mut self.records[idx];
        if !record.is_pending() {
            return Ok(record.clone());
        }

        record.status = outcome;
        record.resolved_by = Some(resolved_by.to_string());
        record.resolved_at = Some(now);
        record.resolution_note = note.map(str::to_string);
        info!(pending_id, status = %outcome, resolved_by, "pending confirmation resolved");
        Ok(record.clone())
    }

    fn expire_due(&mut self, now: DateTime<Utc>) {
        for record in self.records.iter_mut() {
            if record.is_pending() && record.expires_at <= now {
                record.status = ConfirmationStatus::Expired;
                record.resolved_at = Some(now);
                record.resolution_note = Some(AUTO_EXPIRED_NOTE.to_string());
                info!(pending_id = %record.pending_id, "pending confirmation expired");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::clock::ManualClock;

    fn ledger() -> (ConfirmationLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let ledger = ConfirmationLedger::with_clock(&LedgerConfig::default(), clock.clone());
        (ledger, clock)
    }

    fn create(ledger: &mut ConfirmationLedger) -> PendingConfirmation {
        ledger.create(
            InventoryObjectKind::FilamentSpool,
            Some("A".into()),
            Some("B".into()),
            None,
        )
    }

    #[test]
    fn test_create_sets_deadline() {
        let (mut ledger, _) = ledger();
        let pc = create(&mut ledger);
        assert_eq!(pc.status, ConfirmationStatus::Pending);
        assert_eq!(pc.expires_at - pc.created_at, Duration::seconds(20));
        assert_ne!(pc.pending_id, create(&mut ledger).pending_id);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let (mut ledger, _) = ledger();
        let pc = create(&mut ledger);
        let first = ledger.confirm(&pc.pending_id, "w1", Some("ok")).unwrap();
        assert_eq!(first.status, ConfirmationStatus::Confirmed);
        assert_eq!(first.resolved_by.as_deref(), Some("w1"));

        let second = ledger.reject(&pc.pending_id, "w2", None).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let (mut ledger, _) = ledger();
        let err = ledger.confirm("nope", "w1", None).unwrap_err();
        assert!(matches!(err, Error::PendingNotFound(_)));
    }

    #[test]
    fn test_expired_on_read_after_ttl() {
        let (mut ledger, clock) = ledger();
        let pc = create(&mut ledger);
        clock.advance(Duration::seconds(19));
        assert!(ledger.list_pending()[0].is_pending());

        clock.advance(Duration::seconds(1));
        let rows = ledger.list_pending();
        assert_eq!(rows[0].status, ConfirmationStatus::Expired);
        assert_eq!(rows[0].resolution_note.as_deref(), Some(AUTO_EXPIRED_NOTE));

        let after = ledger.confirm(&pc.pending_id, "w1", None).unwrap();
        assert_eq!(after.status, ConfirmationStatus::Expired);
        assert_eq!(after.resolved_by, None);
    }
}
