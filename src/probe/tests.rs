//! Engine tests against the mock host

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::mock::{MockProbeHost, MALFORMED_WEBSOCKET_MESSAGE, UNDEFINED_REFERENCE_MESSAGE};
use super::*;

fn orchestrator(host: MockProbeHost) -> (FingerprintOrchestrator, Arc<MockProbeHost>) {
    let host = Arc::new(host);
    let orchestrator = FingerprintOrchestrator::builder(host.clone())
        .settle_delay(Duration::from_millis(5))
        .build();
    (orchestrator, host)
}

fn key_set(record: &FingerprintRecord) -> HashSet<String> {
    record.names().map(str::to_string).collect()
}

#[tokio::test]
async fn test_record_has_one_entry_per_snapshot_probe() {
    let (orchestrator, _) = orchestrator(MockProbeHost::chromium());

    let record = orchestrator.generate().await;

    let expected: HashSet<String> = orchestrator.catalog().names().into_iter().collect();
    assert_eq!(key_set(&record), expected);
    assert_eq!(record.len(), builtin::BUILTIN_PROBES.len());
}

#[tokio::test]
async fn test_always_throws_scenario() {
    let (orchestrator, _) = orchestrator(MockProbeHost::chromium());
    orchestrator.register(
        "alwaysThrows",
        ProbeKind::Sync,
        Executor::native(|| Err(Fault::from("boom"))),
    );

    let record = orchestrator.generate().await;
    let json = record.to_json();

    assert_eq!(json["alwaysThrows"], json!({"error": true, "message": "boom"}));
    for name in builtin::BUILTIN_PROBES.keys() {
        assert!(json.get(*name).is_some(), "missing default probe {}", name);
    }
}

#[tokio::test]
async fn test_never_throws_scenario() {
    let (orchestrator, _) = orchestrator(MockProbeHost::chromium());
    orchestrator.register(
        "neverThrows",
        ProbeKind::Async,
        Executor::deferred(|| async { Ok(json!(42)) }),
    );

    let record = orchestrator.generate().await;
    assert_eq!(record.to_json()["neverThrows"], json!(42));
}

#[tokio::test]
async fn test_async_rejection_has_sync_shape() {
    let (orchestrator, _) = orchestrator(
        MockProbeHost::new().with_script("return new Promise(() => { throw 'exception'; });", Err(Fault::from("exception"))),
    );
    orchestrator.register(
        "scriptRejects",
        ProbeKind::Async,
        Executor::script("return new Promise(() => { throw 'exception'; });"),
    );
    orchestrator.register(
        "deferredRejects",
        ProbeKind::Async,
        Executor::deferred(|| async { Err(Fault::error("TypeError", "exception")) }),
    );
    orchestrator.register(
        "syncThrows",
        ProbeKind::Sync,
        Executor::native(|| Err(Fault::from("exception"))),
    );

    let record = orchestrator.generate().await;
    let expected = ProbeOutcome::error("exception");
    assert_eq!(record.outcome("scriptRejects"), Some(&expected));
    assert_eq!(record.outcome("deferredRejects"), Some(&expected));
    assert_eq!(record.outcome("syncThrows"), Some(&expected));
}

#[tokio::test]
async fn test_reregistration_replaces_definition() {
    let (orchestrator, _) = orchestrator(MockProbeHost::new());
    orchestrator.register("version", ProbeKind::Sync, Executor::native(|| Ok(json!(1))));
    orchestrator.register("version", ProbeKind::Async, Executor::deferred(|| async { Ok(json!(2)) }));

    let record = orchestrator.generate().await;
    assert_eq!(record.outcome("version"), Some(&ProbeOutcome::Value(json!(2))));
    assert_eq!(record.names().filter(|n| *n == "version").count(), 1);
}

#[tokio::test]
async fn test_fault_sequence_slots() {
    let (orchestrator, _) = orchestrator(MockProbeHost::chromium());

    let record = orchestrator.generate().await;

    assert_eq!(record.faults().len(), orchestrator.fault_sequence().len());
    assert_eq!(
        record.to_json()[FAULT_SEQUENCE_KEY],
        json!([
            UNDEFINED_REFERENCE_MESSAGE,
            null,
            null,
            null,
            null,
            null,
            null,
            "Failed to construct 'WebSocket': The URL 'itsgonnafail' is invalid.",
        ])
    );
    assert!(record
        .faults()
        .iter()
        .any(|slot| slot.as_deref() == Some(MALFORMED_WEBSOCKET_MESSAGE)));
}

#[tokio::test]
async fn test_out_of_band_faults_fill_ordinal_slots() {
    let (orchestrator, _) = orchestrator(
        MockProbeHost::chromium()
            .with_logged_fault("permissionsRejection", "Permission 'notifications' is not supported")
            .with_logged_fault("animationFrameTimer", "frame callback failed"),
    );

    let record = orchestrator.generate().await;
    let faults = record.faults();

    let out_of_band: Vec<usize> = orchestrator
        .fault_sequence()
        .operations()
        .iter()
        .enumerate()
        .filter(|(_, op)| op.delivery == FaultDelivery::OutOfBand)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(out_of_band.len(), 2);
    assert_eq!(faults[out_of_band[0]].as_deref(), Some("Permission 'notifications' is not supported"));
    assert_eq!(faults[out_of_band[1]].as_deref(), Some("frame callback failed"));
}

#[tokio::test]
async fn test_observer_is_uninstalled_after_each_run() {
    let (orchestrator, host) = orchestrator(MockProbeHost::chromium());

    orchestrator.generate().await;
    orchestrator.generate().await;

    assert!(host.active_observers().is_empty());
    let installs = host.calls().iter().filter(|c| c.starts_with("install:")).count();
    let drains = host.calls().iter().filter(|c| c.starts_with("drain:")).count();
    assert_eq!((installs, drains), (2, 2));
}

#[tokio::test]
async fn test_repeated_runs_have_identical_key_sets() {
    let (orchestrator, _) = orchestrator(MockProbeHost::chromium());
    let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let ticks = counter.clone();
    orchestrator.register(
        "timing",
        ProbeKind::Sync,
        Executor::native(move || Ok(json!(ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst)))),
    );

    let first = orchestrator.generate().await;
    let second = orchestrator.generate().await;

    assert_eq!(key_set(&first), key_set(&second));
    assert_ne!(first.outcome("timing"), second.outcome("timing"));
    assert_ne!(first.run_id(), second.run_id());
}

#[tokio::test]
async fn test_probe_registered_during_run_is_excluded() {
    let (orchestrator, _) = orchestrator(MockProbeHost::new());
    let catalog = orchestrator.catalog().clone();
    orchestrator.register(
        "registersLate",
        ProbeKind::Async,
        Executor::deferred(move || {
            let catalog = catalog.clone();
            async move {
                catalog.register("late", ProbeKind::Sync, Executor::native(|| Ok(json!("late"))));
                Ok(json!(true))
            }
        }),
    );

    let first = orchestrator.generate().await;
    assert!(first.outcome("late").is_none());
    assert_eq!(first.outcome("registersLate"), Some(&ProbeOutcome::Value(json!(true))));

    let second = orchestrator.generate().await;
    assert_eq!(second.outcome("late"), Some(&ProbeOutcome::Value(json!("late"))));
}

#[tokio::test]
async fn test_panicking_probe_does_not_abort_collection() {
    let (orchestrator, _) = orchestrator(MockProbeHost::chromium());
    orchestrator.register("panics", ProbeKind::Sync, Executor::native(|| panic!("probe bug")));

    let record = orchestrator.generate().await;
    assert_eq!(record.outcome("panics"), Some(&ProbeOutcome::error("probe bug")));
    assert_eq!(record.len(), builtin::BUILTIN_PROBES.len() + 1);
}

#[tokio::test(start_paused = true)]
async fn test_async_probes_run_concurrently() {
    let catalog = ProbeCatalog::empty();
    for i in 0..5 {
        catalog.register(
            format!("slow{}", i),
            ProbeKind::Async,
            Executor::deferred(move || async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!(i))
            }),
        );
    }
    let orchestrator = FingerprintOrchestrator::builder(Arc::new(MockProbeHost::new()))
        .catalog(Arc::new(catalog))
        .settle_delay(Duration::ZERO)
        .build();

    let start = tokio::time::Instant::now();
    let record = orchestrator.generate().await;
    let elapsed = start.elapsed();

    assert_eq!(record.len(), 5);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(200), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let host = Arc::new(
        MockProbeHost::chromium()
            .with_logged_fault("permissionsRejection", "Permission 'notifications' is not supported")
            .with_latency(Duration::from_millis(5)),
    );
    let orchestrator = Arc::new(
        FingerprintOrchestrator::builder(host.clone())
            .settle_delay(Duration::from_millis(5))
            .build(),
    );

    let (a, b) = tokio::join!(orchestrator.generate(), orchestrator.generate());

    assert_ne!(a.run_id(), b.run_id());
    assert_eq!(a.faults(), b.faults());
    assert_eq!(a.faults()[5].as_deref(), Some("Permission 'notifications' is not supported"));
    assert_eq!(a.faults()[6], None);
    assert!(host.active_observers().is_empty());
}

#[tokio::test]
async fn test_overlapping_runs_keep_their_own_out_of_band_faults() {
    let host = Arc::new(
        MockProbeHost::new()
            .with_logged_fault("loudRejection", "rejected by the loud run")
            .with_latency(Duration::from_millis(5)),
    );
    let quiet = FingerprintOrchestrator::builder(host.clone())
        .catalog(Arc::new(ProbeCatalog::empty()))
        .fault_sequence(FaultProbeSequence::new(vec![FaultOperation::out_of_band(
            "quietTimer",
            "setTimeout(() => {}, 0);",
        )]))
        .settle_delay(Duration::from_millis(20))
        .build();
    let loud = FingerprintOrchestrator::builder(host.clone())
        .catalog(Arc::new(ProbeCatalog::empty()))
        .fault_sequence(FaultProbeSequence::new(vec![FaultOperation::out_of_band(
            "loudRejection",
            "Promise.reject('rejected by the loud run');",
        )]))
        .settle_delay(Duration::from_millis(20))
        .build();

    let (quiet_record, loud_record) = tokio::join!(quiet.generate(), loud.generate());

    assert_eq!(quiet_record.faults().to_vec(), vec![None]);
    assert_eq!(loud_record.faults().to_vec(), vec![Some("rejected by the loud run".to_string())]);

    let windows: Vec<String> = host
        .calls()
        .into_iter()
        .filter(|call| !call.starts_with("batch") && call != "async")
        .map(|call| call.split(':').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(windows, vec!["install", "battery", "drain", "install", "battery", "drain"]);
}

#[tokio::test]
async fn test_host_failure_is_embedded() {
    let (orchestrator, host) = orchestrator(MockProbeHost::new());
    host.set_failing(true);
    orchestrator.register("native", ProbeKind::Sync, Executor::native(|| Ok(Value::Bool(true))));

    let record = orchestrator.generate().await;

    assert_eq!(record.outcome("native"), Some(&ProbeOutcome::Value(json!(true))));
    assert!(record.outcome("userAgent").unwrap().is_error());
    assert!(record.outcome("canvas").unwrap().is_error());
    assert_eq!(record.faults().len(), 8);
    assert!(record.faults().iter().all(Option::is_none));
}

#[tokio::test]
async fn test_record_json_is_flat() {
    let (orchestrator, _) = orchestrator(MockProbeHost::new().with_script("return navigator.product;", Ok(json!("Gecko"))));

    let record = orchestrator.generate().await;
    let json = serde_json::to_value(&record).unwrap();
    let object = json.as_object().unwrap();

    assert_eq!(object.len(), record.len() + 1);
    assert_eq!(object["product"], "Gecko");
    assert!(object[FAULT_SEQUENCE_KEY].is_array());
    tokio_test::assert_ok!(serde_json::to_string_pretty(&record));
}
