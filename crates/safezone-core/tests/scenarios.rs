//! End-to-end monitoring scenarios over in-memory collaborators.
//!
//! Covers baseline, crossing, no-op and stale samples on one zone, failure
//! isolation inside a sweep, and cross-path deduplication between the
//! periodic sweep, the passive bridge and the live tracker.

use std::sync::Arc;

use safezone_core::geo::offset_north;
use safezone_core::{
    ContainmentState, Coordinate, GeofenceTransition, LocationSample, MonitorConfig,
    MonitoringOutcome, RawGeofenceEvent, RunConstraints, SafeZone, SafeZoneMonitor, Subject,
    SubjectId, ZoneId, ZoneRegistry,
};
use safezone_state::fakes::{
    InjectedFailure, MemoryGeofenceService, MemoryHistoryStore, MemoryLocationSource,
    MemoryNotificationSink,
};
use safezone_state::{HistoryKind, NotificationPriority};
use tokio::sync::{mpsc, watch};

const HOME: Coordinate = Coordinate::new(4.6097, -74.0817);

struct Harness {
    location: Arc<MemoryLocationSource>,
    sink: Arc<MemoryNotificationSink>,
    history: Arc<MemoryHistoryStore>,
    geofence: Arc<MemoryGeofenceService>,
    monitor: SafeZoneMonitor,
}

fn harness_with(zones: Vec<SafeZone>) -> Harness {
    let location = Arc::new(MemoryLocationSource::new());
    let sink = Arc::new(MemoryNotificationSink::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let geofence = Arc::new(MemoryGeofenceService::new());
    let monitor = SafeZoneMonitor::builder()
        .config(MonitorConfig::default().with_constraints(RunConstraints::none()))
        .zones(Arc::new(ZoneRegistry::new(zones).unwrap()))
        .location(location.clone())
        .notifications(sink.clone())
        .history(history.clone())
        .geofence(geofence.clone())
        .build()
        .unwrap();
    Harness {
        location,
        sink,
        history,
        geofence,
        monitor,
    }
}

fn harness() -> Harness {
    harness_with(vec![SafeZone::new("home", HOME, 500.0).with_name("Home")])
}

fn at(subject: &str, meters: f64, ts: i64) -> LocationSample {
    LocationSample::new(subject, offset_north(&HOME, meters).unwrap(), ts)
}

fn p1() -> SubjectId {
    SubjectId::from("p1")
}

fn home() -> ZoneId {
    ZoneId::from("home")
}

// ===========================================================================
// Single-zone scenarios
// ===========================================================================

#[tokio::test]
async fn scenario_a_baseline_then_exit() {
    let h = harness();
    h.location.add_subject(Subject::new("p1", "Luna"));

    h.location.push_sample(at("p1", 100.0, 0));
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);
    assert_eq!(h.monitor.current_state(&p1(), &home()), Some(ContainmentState::Inside));
    assert!(h.sink.sent().is_empty(), "baseline never alerts");

    h.location.push_sample(at("p1", 600.0, 1_000));
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);

    let sent = h.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].priority, NotificationPriority::High);
    assert_eq!(sent[0].dedupe_key, "p1/home/outside");
    assert_eq!(sent[0].title, "⚠️ Luna left the safe zone");

    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, HistoryKind::ZoneExit);
    assert_eq!(records[0].state, Some(ContainmentState::Outside));
    assert_eq!(records[0].timestamp_millis, 1_000);
}

#[tokio::test]
async fn scenario_b_still_outside_is_silent() {
    let h = harness();
    for (meters, ts) in [(100.0, 0), (600.0, 1_000), (610.0, 2_000)] {
        h.location.push_sample(at("p1", meters, ts));
        h.monitor.sweep_once().await;
    }
    assert_eq!(h.sink.sent().len(), 1);
    assert_eq!(h.monitor.current_state(&p1(), &home()), Some(ContainmentState::Outside));
}

#[tokio::test]
async fn scenario_c_late_sample_is_stale() {
    let h = harness();
    for (meters, ts) in [(100.0, 0), (600.0, 1_000), (610.0, 2_000)] {
        h.location.push_sample(at("p1", meters, ts));
        h.monitor.sweep_once().await;
    }

    // t=1.5 s arrives over the realtime path after t=2 s was processed.
    let (tx, rx) = mpsc::channel(4);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tx.send(at("p1", 100.0, 1_500)).await.unwrap();
    drop(tx);
    let summary = h.monitor.live_tracker().run(rx, shutdown_rx).await;

    assert_eq!(summary.samples, 1);
    assert_eq!(summary.transitions, 0);
    assert_eq!(h.monitor.current_state(&p1(), &home()), Some(ContainmentState::Outside));
    assert_eq!(h.sink.sent().len(), 1);
}

#[tokio::test]
async fn return_home_is_default_priority() {
    let h = harness();
    for (meters, ts) in [(100.0, 0), (600.0, 1_000), (50.0, 2_000)] {
        h.location.push_sample(at("p1", meters, ts));
        h.monitor.sweep_once().await;
    }
    let sent = h.sink.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].priority, NotificationPriority::Default);
    assert_eq!(sent[1].dedupe_key, "p1/home/inside");

    let recent = h.monitor.recent_events(&p1(), 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].kind, HistoryKind::ZoneEnter, "newest first");
}

#[tokio::test]
async fn every_genuine_crossing_alerts_again() {
    let h = harness();
    for (meters, ts) in [(100.0, 0), (700.0, 1_000), (80.0, 2_000), (900.0, 3_000)] {
        h.location.push_sample(at("p1", meters, ts));
        h.monitor.sweep_once().await;
    }

    let keys: Vec<_> = h.sink.sent().into_iter().map(|n| n.dedupe_key).collect();
    assert_eq!(keys, ["p1/home/outside", "p1/home/inside", "p1/home/outside"]);
    assert_eq!(h.history.records().len(), 3);
    // Same slot twice: the second exit replaced the first on screen.
    assert_eq!(h.sink.displayed_count(), 2);
}

/// A second monitor over the same location source and history, as a new
/// process would build it.
fn restarted(h: &Harness) -> (SafeZoneMonitor, Arc<MemoryNotificationSink>) {
    let sink = Arc::new(MemoryNotificationSink::new());
    let monitor = SafeZoneMonitor::builder()
        .config(MonitorConfig::default().with_constraints(RunConstraints::none()))
        .zones(Arc::new(
            ZoneRegistry::new(vec![SafeZone::new("home", HOME, 500.0).with_name("Home")]).unwrap(),
        ))
        .location(h.location.clone())
        .notifications(sink.clone())
        .history(h.history.clone())
        .build()
        .unwrap();
    (monitor, sink)
}

#[tokio::test]
async fn restart_resumes_from_persisted_exit() {
    let h = harness();
    h.location.add_subject(Subject::new("p1", "Luna"));
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;
    h.location.push_sample(at("p1", 700.0, 1_000));
    h.monitor.sweep_once().await;
    assert_eq!(h.sink.sent().len(), 1);

    let (monitor, sink) = restarted(&h);
    assert_eq!(monitor.restore_from_history().await.unwrap(), 1);
    assert_eq!(monitor.current_state(&p1(), &home()), Some(ContainmentState::Outside));

    // Still outside: neither the replayed sample nor a newer one re-alerts.
    monitor.sweep_once().await;
    h.location.push_sample(at("p1", 800.0, 2_000));
    monitor.sweep_once().await;
    assert!(sink.sent().is_empty());

    // Back home: the return is a real transition for the new process.
    h.location.push_sample(at("p1", 50.0, 3_000));
    monitor.sweep_once().await;
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dedupe_key, "p1/home/inside");
    assert_eq!(h.history.records().len(), 2);
}

#[tokio::test]
async fn restore_keeps_states_already_observed() {
    let h = harness();
    h.location.add_subject(Subject::new("p1", "Luna"));
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;
    h.location.push_sample(at("p1", 700.0, 1_000));
    h.monitor.sweep_once().await;

    // Only the newest record per zone counts, and live state wins over it.
    h.location.push_sample(at("p1", 50.0, 2_000));
    h.monitor.sweep_once().await;
    assert_eq!(h.monitor.restore_from_history().await.unwrap(), 0);
    assert_eq!(h.monitor.current_state(&p1(), &home()), Some(ContainmentState::Inside));

    let (monitor, _sink) = restarted(&h);
    assert_eq!(monitor.restore_from_history().await.unwrap(), 1);
    assert_eq!(monitor.current_state(&p1(), &home()), Some(ContainmentState::Inside));
}

#[tokio::test]
async fn restore_without_history_starts_from_baseline() {
    let h = harness();
    h.location.add_subject(Subject::new("p1", "Luna"));
    assert_eq!(h.monitor.restore_from_history().await.unwrap(), 0);
    assert_eq!(h.monitor.current_state(&p1(), &home()), None);
}

#[tokio::test]
async fn repeated_sweeps_over_same_sample_do_not_realert() {
    let h = harness();
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;
    h.location.push_sample(at("p1", 700.0, 1_000));
    for _ in 0..5 {
        assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);
    }
    assert_eq!(h.sink.sent().len(), 1);
    assert_eq!(h.history.records().len(), 1);
}

// ===========================================================================
// Sweep failure isolation
// ===========================================================================

fn three_subjects_crossing(h: &Harness) {
    for subject in ["p1", "p2", "p3"] {
        h.location.push_sample(at(subject, 100.0, 0));
    }
}

#[tokio::test]
async fn scenario_d_transient_failure_for_one_of_three() {
    let h = harness();
    three_subjects_crossing(&h);
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);

    for subject in ["p1", "p2", "p3"] {
        h.location.push_sample(at(subject, 900.0, 1_000));
    }
    h.location.fail_subject(&SubjectId::from("p2"), InjectedFailure::Transient);

    let outcome = h.monitor.sweep_once().await;
    assert_eq!(outcome, MonitoringOutcome::RetryRequested(1));

    let mut alerted: Vec<_> = h.sink.sent().into_iter().map(|n| n.subject_id.0).collect();
    alerted.sort();
    assert_eq!(alerted, vec!["p1", "p3"]);
    assert_eq!(
        h.monitor.current_state(&SubjectId::from("p2"), &home()),
        Some(ContainmentState::Inside)
    );
}

#[tokio::test]
async fn permanent_failure_outranks_retry() {
    let h = harness();
    three_subjects_crossing(&h);
    h.location.fail_subject(&SubjectId::from("p1"), InjectedFailure::Transient);
    h.location.fail_subject(&SubjectId::from("p2"), InjectedFailure::Permanent);

    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::PermanentFailure);
    assert_eq!(
        h.monitor.current_state(&SubjectId::from("p3"), &home()),
        Some(ContainmentState::Inside),
        "healthy subject still evaluated"
    );
}

#[tokio::test]
async fn listing_failures_classify() {
    let h = harness();
    h.location.fail_listing(Some(InjectedFailure::Transient));
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::RetryRequested(1));

    h.location.fail_listing(Some(InjectedFailure::Permanent));
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::PermanentFailure);

    h.location.fail_listing(None);
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);
}

#[tokio::test(start_paused = true)]
async fn hanging_fetch_times_out_as_transient() {
    let h = harness();
    three_subjects_crossing(&h);
    h.location.fail_subject(&SubjectId::from("p3"), InjectedFailure::Hang);

    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::RetryRequested(1));
    assert!(h.monitor.current_state(&p1(), &home()).is_some());
}

#[tokio::test]
async fn subject_without_sample_is_skipped() {
    let h = harness();
    h.location.add_subject(Subject::new("ghost", "Ghost"));
    h.location.push_sample(at("p1", 100.0, 0));
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);
    assert!(h.monitor.current_state(&SubjectId::from("ghost"), &home()).is_none());
}

#[tokio::test]
async fn malformed_sample_is_permanent_but_isolated() {
    let h = harness();
    h.location.push_sample(LocationSample::new("p1", Coordinate::new(f64::NAN, 0.0), 0));
    h.location.push_sample(at("p2", 100.0, 0));

    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::PermanentFailure);
    assert!(h.monitor.current_state(&p1(), &home()).is_none());
    assert!(h.monitor.current_state(&SubjectId::from("p2"), &home()).is_some());
}

#[tokio::test]
async fn side_effect_failures_do_not_fail_the_sweep() {
    let h = harness();
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;

    h.sink.set_failing(true);
    h.history.set_failing(true);
    h.location.push_sample(at("p1", 900.0, 1_000));
    assert_eq!(h.monitor.sweep_once().await, MonitoringOutcome::Success);
    assert_eq!(h.monitor.current_state(&p1(), &home()), Some(ContainmentState::Outside));
}

#[tokio::test]
async fn low_battery_alert_from_sweep() {
    let h = harness();
    h.location.push_sample(at("p1", 100.0, 0).with_battery(55));
    h.monitor.sweep_once().await;
    h.location.push_sample(at("p1", 110.0, 1_000).with_battery(12));
    h.monitor.sweep_once().await;
    h.location.push_sample(at("p1", 120.0, 2_000).with_battery(11));
    h.monitor.sweep_once().await;

    let sent = h.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dedupe_key, "p1/battery/low");
    assert_eq!(h.history.records()[0].kind, HistoryKind::BatteryLow);
}

// ===========================================================================
// Cross-path deduplication
// ===========================================================================

#[tokio::test]
async fn periodic_then_passive_same_crossing_alerts_once() {
    let h = harness();
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;

    h.location.push_sample(at("p1", 700.0, 5_000));
    h.monitor.sweep_once().await;

    let events = h
        .monitor
        .passive_bridge()
        .on_transition(RawGeofenceEvent::new("p1", "home", GeofenceTransition::Exit, 5_000))
        .await;
    assert!(events.is_empty());

    let events = h
        .monitor
        .passive_bridge()
        .on_transition(RawGeofenceEvent::new("p1", "home", GeofenceTransition::Exit, 5_020))
        .await;
    assert!(events.is_empty());
    assert_eq!(h.sink.sent().len(), 1);
}

#[tokio::test]
async fn passive_then_periodic_same_crossing_alerts_once() {
    let h = harness();
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;

    let events = h
        .monitor
        .passive_bridge()
        .on_transition(RawGeofenceEvent::new("p1", "home", GeofenceTransition::Exit, 4_990))
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].to, ContainmentState::Outside);

    h.location.push_sample(at("p1", 650.0, 5_000));
    h.monitor.sweep_once().await;

    assert_eq!(h.sink.sent().len(), 1);
    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].trigger, safezone_core::TriggerSource::Passive);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_paths_on_one_key_emit_one_event() {
    let h = Arc::new(harness());
    h.location.push_sample(at("p1", 100.0, 0));
    h.monitor.sweep_once().await;

    let mut tasks = Vec::new();
    for i in 0..32 {
        let h = Arc::clone(&h);
        tasks.push(tokio::spawn(async move {
            let raw = RawGeofenceEvent::new("p1", "home", GeofenceTransition::Exit, 1_000 + i);
            h.monitor.passive_bridge().on_transition(raw).await.len()
        }));
    }
    h.location.push_sample(at("p1", 800.0, 1_016));
    let sweep = h.monitor.sweep_once().await;
    assert_eq!(sweep, MonitoringOutcome::Success);

    let mut events = 0;
    for task in tasks {
        events += task.await.unwrap();
    }
    assert!(events <= 1);
    assert_eq!(h.sink.sent().len(), 1);
    assert_eq!(h.monitor.current_state(&p1(), &home()), Some(ContainmentState::Outside));
}

// ===========================================================================
// Geofence registration
// ===========================================================================

#[tokio::test]
async fn register_and_unregister_passive_zones() {
    let h = harness_with(vec![
        SafeZone::new("home", HOME, 500.0),
        SafeZone::new("park", offset_north(&HOME, 2_000.0).unwrap(), 150.0),
    ]);
    let results = h.monitor.register_passive_zones().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(h.geofence.registered_count(), 2);

    h.monitor.unregister_passive_zones().await.unwrap();
    assert_eq!(h.geofence.registered_count(), 0);
}

#[tokio::test]
async fn geofence_failures_are_reported_per_zone() {
    let h = harness();
    h.geofence.set_failing(true);
    let results = h.monitor.register_passive_zones().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, home());
    assert!(results[0].1.is_err());
    assert!(h.monitor.unregister_passive_zones().await.is_err());
}
