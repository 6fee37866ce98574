use std::sync::Arc;

use chrono::Duration;

use zonetrack_rs::config::Config;
use zonetrack_rs::integration::{FramePipeline, publish_signals};
use zonetrack_rs::inventory::{
    ConfirmationStatus, FilamentSpool, InventoryObjectKind, JsonFileStore, ManualClock,
    MemoryBlobStore, Printer, ResolutionRequest, ScanOutcome, ScanSignal, ServiceContext,
    StateBlobStore, VisionSignal,
};
use zonetrack_rs::tracker::Detection;
use zonetrack_rs::zone::Zone;
use zonetrack_rs::Error;

const SPOOL: InventoryObjectKind = InventoryObjectKind::FilamentSpool;

fn config() -> Config {
    Config {
        zones: vec![
            Zone::new("A").with_rect(0.0, 0.0, 100.0, 100.0),
            Zone::new("B").with_rect(300.0, 0.0, 400.0, 100.0),
        ],
        ..Config::default()
    }
}

/// Service with zones A and B and spool S1 stored at A.
fn service() -> (ServiceContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let service =
        ServiceContext::open_with_clock(&config(), Box::new(MemoryBlobStore::new()), clock.clone())
            .unwrap();
    service.upsert_spool(FilamentSpool::new("S1").in_zone("A")).unwrap();
    (service, clock)
}

fn zone_of(service: &ServiceContext, spool_id: &str) -> Option<String> {
    service
        .spools()
        .into_iter()
        .find(|s| s.spool_id == spool_id)
        .and_then(|s| s.zone_id)
}

#[test]
fn test_weak_signal_without_hint_needs_identity() {
    let (service, _) = service();

    let pc = service
        .submit_vision(&VisionSignal::new(SPOOL, Some("A"), Some("B")))
        .unwrap();
    assert_eq!(pc.status, ConfirmationStatus::Pending);
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("A"));

    let res = service
        .confirm(&pc.pending_id, &ResolutionRequest::by("w1"))
        .unwrap();
    assert_eq!(res.record.status, ConfirmationStatus::Confirmed);
    assert!(res.missing_identity());
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("A"));
}

#[test]
fn test_weak_signal_with_hint_commits_on_confirm() {
    let (service, _) = service();

    let pc = service
        .submit_vision(&VisionSignal::new(SPOOL, Some("A"), Some("B")).with_hint("S1"))
        .unwrap();
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("A"));

    let res = service
        .confirm(&pc.pending_id, &ResolutionRequest::by("w1").with_note("seen on camera"))
        .unwrap();
    assert_eq!(res.record.resolution_note.as_deref(), Some("seen on camera"));
    let commit = res.committed.unwrap();
    assert_eq!(commit.previous_zone.as_deref(), Some("A"));
    assert!(!commit.from_zone_mismatch);
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("B"));
}

#[test]
fn test_operator_supplied_id_commits_without_hint() {
    let (service, _) = service();
    let pc = service
        .submit_vision(&VisionSignal::new(SPOOL, Some("A"), Some("B")))
        .unwrap();
    let res = service
        .confirm(&pc.pending_id, &ResolutionRequest::by("w1").with_object("S1"))
        .unwrap();
    assert!(res.committed.is_some());
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("B"));
}

#[test]
fn test_reject_never_mutates_store() {
    let (service, _) = service();
    let before = service.snapshot();

    for hint in [None, Some("S1")] {
        let mut signal = VisionSignal::new(SPOOL, Some("A"), Some("B"));
        if let Some(hint) = hint {
            signal = signal.with_hint(hint);
        }
        let pc = service.submit_vision(&signal).unwrap();
        let rejected = service
            .reject(&pc.pending_id, &ResolutionRequest::by("w1").with_note("wrong spool"))
            .unwrap();
        assert_eq!(rejected.status, ConfirmationStatus::Rejected);
    }
    assert_eq!(service.snapshot(), before);
}

#[test]
fn test_pending_expires_after_ttl() {
    let (service, clock) = service();
    let pc = service
        .submit_vision(&VisionSignal::new(SPOOL, Some("A"), Some("B")).with_hint("S1"))
        .unwrap();

    clock.advance(Duration::seconds(21));
    assert!(service.list_pending(Some(ConfirmationStatus::Pending)).is_empty());
    let expired = service.list_pending(Some(ConfirmationStatus::Expired));
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].pending_id, pc.pending_id);

    let res = service
        .confirm(&pc.pending_id, &ResolutionRequest::by("w1"))
        .unwrap();
    assert_eq!(res.record.status, ConfirmationStatus::Expired);
    assert!(res.committed.is_none());
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("A"));
}

#[test]
fn test_unknown_pending_id() {
    let (service, _) = service();
    let err = service
        .confirm("does-not-exist", &ResolutionRequest::by("w1"))
        .unwrap_err();
    assert!(matches!(err, Error::PendingNotFound(_)));
    assert!(err.is_client_error());
}

#[test]
fn test_scan_commits_immediately() {
    let (service, _) = service();

    let ack = service
        .submit_scan(&ScanSignal::new("S1", SPOOL).at_zone("B"))
        .unwrap();
    assert!(ack.ok);
    assert!(matches!(ack.outcome, ScanOutcome::Relocated(_)));
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("B"));
}

#[test]
fn test_scan_onto_printer_mounts() {
    let (service, _) = service();
    service
        .upsert_zone(Zone::new("P1_Mount"))
        .unwrap();

    let ack = service
        .submit_scan(&ScanSignal::new("S1", SPOOL).at_zone("P1_Mount").on_printer("P1"))
        .unwrap();
    let ScanOutcome::Mounted(mount) = ack.outcome else {
        panic!("expected a mount, got {:?}", ack.outcome);
    };
    assert!(mount.created_printer);

    let printer = service
        .printers()
        .into_iter()
        .find(|p| p.printer_id == "P1")
        .unwrap();
    assert_eq!(printer.mounted_spool_id.as_deref(), Some("S1"));
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("P1_Mount"));
}

#[test]
fn test_crud_rejects_unknown_zone() {
    let (service, _) = service();
    let err = service
        .upsert_printer(Printer::new("P9").in_zone("Nowhere"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReference { .. }));
    assert!(service.printers().is_empty());
}

#[test]
fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory_state.json");
    let cfg = config();

    {
        let service = ServiceContext::open(&cfg, Box::new(JsonFileStore::new(&path))).unwrap();
        service.submit_scan(&ScanSignal::new("S7", SPOOL).at_zone("B")).unwrap();
        // Weak signals are not persisted.
        service
            .submit_vision(&VisionSignal::new(SPOOL, Some("B"), Some("A")).with_hint("S7"))
            .unwrap();
    }

    let stored = JsonFileStore::new(&path).load().unwrap().unwrap();
    assert_eq!(stored["spools"][0]["spool_id"], "S7");

    let reopened = ServiceContext::open(&cfg, Box::new(JsonFileStore::new(&path))).unwrap();
    assert_eq!(zone_of(&reopened, "S7").as_deref(), Some("B"));
    assert!(reopened.list_pending(None).is_empty());
    assert_eq!(reopened.zones().len(), 2);
}

#[test]
fn test_pipeline_output_flows_into_ledger() {
    let (mut service, _) = service();
    let cfg = config();
    let mut pipeline = FramePipeline::from_config(&cfg);

    let path = [50.0, 150.0, 250.0, 350.0];
    for cx in path {
        let det = Detection::new("spool", cx - 10.0, 40.0, cx + 10.0, 60.0, 0.9);
        let report = pipeline.process_detections(vec![det], None).unwrap();
        publish_signals(&report.signals, &mut service);
    }

    let pending = service.list_pending(Some(ConfirmationStatus::Pending));
    assert!(
        pending
            .iter()
            .any(|pc| pc.from_zone.as_deref() == Some("A") && pc.to_zone.as_deref() == Some("B"))
    );
    assert_eq!(zone_of(&service, "S1").as_deref(), Some("A"));
}
