//! Reconciliation engine tests against a scripted backend
//!
//! Time is paused, so debounce and backend delays run deterministically.

mod common;

use common::{ScriptedBackend, APPLY_ORDER};
use micgate::config::{AppConfig, GateMode};
use micgate::error::ReconcileError;
use micgate::poller::StatusPoller;
use micgate::reconcile::{Activity, Reconciler, ReconcilerOptions};
use micgate::status::StatusBoard;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

async fn loaded(backend: &Arc<ScriptedBackend>, options: ReconcilerOptions) -> Reconciler {
    let mut reconciler = Reconciler::new(backend.clone(), StatusBoard::new(), options);
    reconciler.load().await.unwrap();
    backend.clear_calls();
    reconciler
}

/// Drive one full pass and return how it settled
async fn pass(reconciler: &mut Reconciler) -> Activity {
    assert_eq!(reconciler.next_activity().await, Activity::PassStarted);
    reconciler.next_activity().await
}

fn with_restart() -> Vec<&'static str> {
    let mut ops = APPLY_ORDER.to_vec();
    ops.extend(["stop_engine", "start_engine"]);
    ops
}

// ============================================================================
// Initial load
// ============================================================================

#[tokio::test]
async fn load_reads_config_devices_and_status() {
    let backend = Arc::new(ScriptedBackend::new());
    let board = StatusBoard::new();
    let mut reconciler = Reconciler::new(backend.clone(), board.clone(), ReconcilerOptions::default());
    reconciler.load().await.unwrap();

    assert_eq!(backend.count("get_app_config"), 1);
    assert_eq!(backend.count("list_audio_devices"), 1);
    assert!(backend.writes().is_empty());

    let devices = board.devices().unwrap();
    assert!(devices.has_input("mic"));
    assert!(devices.has_output("bridge"));
    assert!(board.runtime().is_some());
}

#[tokio::test]
async fn device_listing_failure_does_not_block_load() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail("list_audio_devices");
    let board = StatusBoard::new();
    let mut reconciler = Reconciler::new(backend.clone(), board.clone(), ReconcilerOptions::default());

    reconciler.load().await.unwrap();
    assert!(reconciler.store().is_loaded());
    assert!(board.devices().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_load_disables_reconciliation_until_retried() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail("get_app_config");
    let mut reconciler = Reconciler::new(backend.clone(), StatusBoard::new(), ReconcilerOptions::default());

    assert!(matches!(reconciler.load().await, Err(ReconcileError::Backend(_))));
    reconciler.edit(|c| c.launch_on_startup = true);
    assert!(!reconciler.has_pending());
    assert_eq!(reconciler.request_reinitialize(), Err(ReconcileError::NotLoaded));

    backend.recover("get_app_config");
    reconciler.load().await.unwrap();
    backend.clear_calls();

    reconciler.edit(|c| c.launch_on_startup = true);
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);
    assert_eq!(backend.writes(), APPLY_ORDER.to_vec());
    assert!(backend.stored().launch_on_startup);
}

// ============================================================================
// Debounce
// ============================================================================

#[tokio::test(start_paused = true)]
async fn rapid_edits_collapse_into_one_pass() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;
    let start = Instant::now();

    for (i, id) in ["mic-a", "mic-b", "mic-c"].into_iter().enumerate() {
        if i > 0 {
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        reconciler.edit(|c| c.route.input_device_id = id.to_string());
    }
    assert!(backend.calls().is_empty());

    assert_eq!(reconciler.next_activity().await, Activity::PassStarted);
    // Last edit at 200ms plus the 450ms quiet period
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(650), "pass started at {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(700), "pass started at {:?}", elapsed);
    assert_eq!(reconciler.next_activity().await, Activity::Saved);

    assert_eq!(backend.writes(), with_restart());
    assert_eq!(backend.stored().route.input_device_id, "mic-c");
    assert!(!reconciler.store().is_dirty());
}

#[tokio::test(start_paused = true)]
async fn nothing_happens_before_quiet_period() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.launch_on_startup = true);
    let early = tokio::time::timeout(Duration::from_millis(449), reconciler.next_activity()).await;
    assert!(early.is_err());
    assert!(backend.calls().is_empty());
    assert!(reconciler.has_pending());

    assert_eq!(pass(&mut reconciler).await, Activity::Saved);
}

#[tokio::test(start_paused = true)]
async fn reverting_an_edit_cancels_the_pass() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.hotkey.mode = GateMode::Hybrid);
    reconciler.edit(|c| c.hotkey.mode = GateMode::PushToTalk);
    assert!(!reconciler.has_pending());

    let idle = tokio::time::timeout(Duration::from_secs(5), reconciler.next_activity()).await;
    assert!(idle.is_err());
    assert!(backend.calls().is_empty());
}

// ============================================================================
// Apply order and engine restart
// ============================================================================

#[tokio::test(start_paused = true)]
async fn mode_change_applies_without_restart() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.hotkey.mode = GateMode::Toggle);
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);

    assert_eq!(backend.writes(), APPLY_ORDER.to_vec());
    assert_eq!(backend.stored().hotkey.mode, GateMode::Toggle);
}

#[tokio::test(start_paused = true)]
async fn tray_only_edit_runs_a_single_full_pass() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.minimize_to_tray = false);
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);

    for op in APPLY_ORDER {
        assert_eq!(backend.count(op), 1, "{} should run exactly once", op);
    }
    assert_eq!(backend.count("stop_engine"), 0);
    assert_eq!(backend.count("get_runtime_status"), 1);
    assert_eq!(backend.count("get_virtual_device_status"), 1);
}

#[tokio::test(start_paused = true)]
async fn bridge_change_restarts_engine() {
    let mut initial = AppConfig::default();
    initial.route.input_device_id = "mic".into();
    initial.route.bridge_output_device_id = "bridge-a".into();
    let backend = Arc::new(ScriptedBackend::with_config(initial));
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.route.bridge_output_device_id = "bridge-b".into());
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);
    assert_eq!(backend.writes(), with_restart());
}

#[tokio::test(start_paused = true)]
async fn successful_pass_publishes_status() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;
    let before = reconciler.board().runtime().unwrap().xruns;

    reconciler.edit(|c| c.launch_on_startup = true);
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);

    assert!(reconciler.board().runtime().unwrap().xruns > before);
    assert_eq!(reconciler.board().virtual_device().unwrap().backend, "scripted");
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn failure_keeps_baseline_and_edits() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;
    backend.fail("set_hotkey");

    reconciler.edit(|c| {
        c.route.input_device_id = "mic".into();
        c.hotkey.mode = GateMode::Toggle;
    });
    let edited = reconciler.store().local().clone();

    match pass(&mut reconciler).await {
        Activity::SaveFailed(e) => assert!(e.contains("set_hotkey failed")),
        other => panic!("expected failure, got {:?}", other),
    }

    // Later sub-resources never ran and nothing was committed
    assert_eq!(backend.writes(), vec!["save_audio_route", "set_hotkey"]);
    assert_eq!(reconciler.store().remote(), &AppConfig::default());
    assert_eq!(reconciler.store().local(), &edited);
    assert!(reconciler.store().is_dirty());
    assert!(!reconciler.is_busy());
}

#[tokio::test(start_paused = true)]
async fn next_edit_retries_every_sub_resource() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;
    backend.fail("set_minimize_to_tray");

    reconciler.edit(|c| c.route.input_device_id = "mic".into());
    assert!(matches!(pass(&mut reconciler).await, Activity::SaveFailed(_)));

    backend.recover("set_minimize_to_tray");
    backend.clear_calls();
    reconciler.edit(|c| c.launch_on_startup = true);
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);

    // Route is still new relative to the baseline, so the engine restarts too
    assert_eq!(backend.writes(), with_restart());
    assert_eq!(reconciler.store().remote().route.input_device_id, "mic");
}

#[tokio::test(start_paused = true)]
async fn failed_status_refresh_fails_the_pass() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;
    backend.fail("get_virtual_device_status");

    reconciler.edit(|c| c.launch_on_startup = true);
    assert!(matches!(pass(&mut reconciler).await, Activity::SaveFailed(_)));
    assert!(!reconciler.store().remote().launch_on_startup);
}

#[tokio::test(start_paused = true)]
async fn hung_backend_times_out_when_bounded() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.hang("set_hotkey");
    let options = ReconcilerOptions {
        call_timeout: Some(Duration::from_secs(2)),
        ..Default::default()
    };
    let mut reconciler = loaded(&backend, options).await;

    reconciler.edit(|c| c.launch_on_startup = true);
    match pass(&mut reconciler).await {
        Activity::SaveFailed(e) => assert!(e.contains("timed out after 2000 ms")),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(!reconciler.is_busy());
}

#[tokio::test(start_paused = true)]
async fn hung_backend_stays_busy_without_timeout() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.hang("set_hotkey");
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.launch_on_startup = true);
    assert_eq!(reconciler.next_activity().await, Activity::PassStarted);

    let waited = tokio::time::timeout(Duration::from_secs(60), reconciler.next_activity()).await;
    assert!(waited.is_err());
    assert!(reconciler.is_busy());
    assert_eq!(reconciler.request_reinitialize(), Err(ReconcileError::Busy));
}

// ============================================================================
// Concurrency with in-flight work
// ============================================================================

#[tokio::test(start_paused = true)]
async fn edits_during_pass_queue_next_cycle() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.delay("set_hotkey", Duration::from_millis(300));
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.launch_on_startup = true);
    assert_eq!(reconciler.next_activity().await, Activity::PassStarted);

    // Lands while set_hotkey is still waiting
    reconciler.edit(|c| c.minimize_to_tray = false);
    assert!(reconciler.has_pending());

    assert_eq!(reconciler.next_activity().await, Activity::Saved);
    // The pass committed its snapshot, not the later edit
    assert!(reconciler.store().remote().launch_on_startup);
    assert!(reconciler.store().remote().minimize_to_tray);
    assert!(reconciler.store().is_dirty());

    assert_eq!(pass(&mut reconciler).await, Activity::Saved);
    assert!(!reconciler.store().remote().minimize_to_tray);
    assert!(!reconciler.store().is_dirty());
}

#[tokio::test(start_paused = true)]
async fn reinitialize_rejected_while_pass_in_flight() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.delay("save_audio_route", Duration::from_millis(200));
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.edit(|c| c.hotkey.mode = GateMode::Hybrid);
    assert_eq!(reconciler.next_activity().await, Activity::PassStarted);
    assert_eq!(reconciler.request_reinitialize(), Err(ReconcileError::Busy));
    assert_eq!(reconciler.next_activity().await, Activity::Saved);

    backend.clear_calls();
    reconciler.request_reinitialize().unwrap();
    assert_eq!(reconciler.next_activity().await, Activity::Reinitialized);
    assert_eq!(backend.writes(), vec!["stop_engine", "start_engine"]);
    assert_eq!(backend.count("get_runtime_status"), 1);
}

#[tokio::test(start_paused = true)]
async fn pass_waits_for_reinitialize() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.delay("start_engine", Duration::from_secs(1));
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.request_reinitialize().unwrap();
    reconciler.edit(|c| c.launch_on_startup = true);

    // The debounce expires mid-restart but the pass holds off
    assert_eq!(reconciler.next_activity().await, Activity::Reinitialized);
    assert_eq!(backend.count("save_audio_route"), 0);
    assert_eq!(pass(&mut reconciler).await, Activity::Saved);
}

#[tokio::test(start_paused = true)]
async fn failed_reinitialize_reports_error() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.fail("start_engine");
    let mut reconciler = loaded(&backend, ReconcilerOptions::default()).await;

    reconciler.request_reinitialize().unwrap();
    match reconciler.next_activity().await {
        Activity::ReinitializeFailed(e) => assert!(e.contains("start_engine failed")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!reconciler.is_busy());
}

// ============================================================================
// Poller alongside the reconciler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn poll_failures_keep_last_snapshot() {
    let backend = Arc::new(ScriptedBackend::new());
    let board = StatusBoard::new();
    let poller = StatusPoller::new(backend.clone(), board.clone(), Duration::from_millis(1000));

    assert!(poller.poll_once().await);
    let good = board.runtime().unwrap();

    backend.fail("get_runtime_status");
    assert!(!poller.poll_once().await);
    assert_eq!(board.runtime().unwrap(), good);

    backend.recover("get_runtime_status");
    assert!(poller.poll_once().await);
    assert!(board.runtime().unwrap().xruns > good.xruns);
}
