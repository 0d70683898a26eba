mod common;

use std::time::Duration;

use bundle_cache::prelude::*;
use bundle_cache::Record;
use common::*;
use crossbeam::channel;

#[test]
fn test_shared_async_asset_load() {
    let Harness {
        mut module, bytes, ..
    } = harness();
    let (sink, completions) = channel::unbounded();

    // 1. Two callers ask for the same asset before anything ran
    let first = module
        .request_asset_into("a.png", "Texture", LoadKind::Normal, LoadMethod::Async, sink.clone())
        .unwrap();
    let second = module
        .request_asset_into("a.png", "Texture", LoadKind::Normal, LoadMethod::Async, sink)
        .unwrap();
    assert!(first < second);
    assert_eq!(module.registry().task_count(), 1);
    assert_eq!(module.registry().waiting_len(), 1);

    // 2. First tick starts the asset, its bundle and the dependency
    module.run_tick(FRAME, 0.0);
    assert_eq!(module.registry().task_count(), 3);
    assert_eq!(
        module.task_state(ResourceKind::Bundle, "b1"),
        Some(TaskState::Loading)
    );
    assert_eq!(
        module.task_state(ResourceKind::Bundle, "b2"),
        Some(TaskState::Loading)
    );

    // 3. Run to completion
    settle(&mut module);
    let delivered: Vec<Completion> = completions.try_iter().collect();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].request_id, first);
    assert_eq!(delivered[1].request_id, second);
    for completion in &delivered {
        assert_eq!(completion.state, TaskState::Complete);
        assert_eq!(
            completion.payload().unwrap().downcast_ref::<String>().unwrap(),
            "asset:a"
        );
    }
    assert!(delivered[0]
        .payload()
        .unwrap()
        .ptr_eq(delivered[1].payload().unwrap()));

    assert_eq!(bytes.bundle_loads("b1"), 1);
    assert_eq!(bytes.bundle_loads("b2"), 1);
    assert_eq!(bytes.asset_loads("a"), 1);
    assert!(module.bundle_payload("b1").is_some());
    assert!(module.bundle_payload("b2").is_some());
}

#[test]
fn test_released_bundle_is_swept() {
    let mut module = harness().module;
    module
        .request_bundle("b1", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();
    let b1 = module.bundle_id("b1").unwrap();

    module.retain(RecordId::Bundle(b1));
    module.retain(RecordId::Bundle(b1));
    assert_eq!(module.records().bundle(b1).unwrap().ref_count(), 2);
    assert!(module.release(RecordId::Bundle(b1)));
    assert!(module.release(RecordId::Bundle(b1)));
    assert_eq!(module.records().bundle(b1).unwrap().ref_count(), 0);

    // idle for longer than the minimum lifetime, queues empty, fast frame
    let report = module.run_tick(Duration::from_secs(60), 60.0);
    assert!(report.swept);
    assert_eq!(report.evicted, 1);
    assert!(module.bundle_id("b1").is_none());
    // b2 was still held by b1 when the pass picked its candidates
    assert!(module.bundle_id("b2").is_some());
}

#[test]
fn test_live_owner_blocks_sweep() {
    let Harness {
        mut module, owners, ..
    } = harness();
    module
        .request_bundle("b1", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();

    let panel = owners.spawn();
    assert!(module.bind_bundle("b1", panel.handle()).unwrap().is_some());

    let report = module.run_tick(Duration::from_secs(60), 60.0);
    assert!(report.swept);
    assert_eq!(report.evicted, 0);
    assert!(module.bundle_id("b1").is_some());

    // the dead owner is pruned by the next sweep
    drop(panel);
    let report = module.run_tick(Duration::from_secs(11), 60.0);
    assert!(report.swept);
    assert_eq!(report.evicted, 1);
    assert!(module.bundle_id("b1").is_none());
}

#[test]
fn test_cancelled_load_still_populates_record() {
    let mut config = ResourceConfig::default();
    config.min_bundle_lifetime_secs = 0.0;
    let Harness {
        mut module, bytes, ..
    } = harness_with(config, scene_manifest());
    bytes.hold(true);

    let ticket = module
        .request_bundle("b4", LoadKind::Normal, LoadMethod::Async)
        .unwrap();
    module.run_tick(FRAME, 0.0);
    assert_eq!(
        module.task_state(ResourceKind::Bundle, "b4"),
        Some(TaskState::Loading)
    );

    assert!(module.cancel_request(ticket.id()));
    assert_eq!(
        module.task_state(ResourceKind::Bundle, "b4"),
        Some(TaskState::Cancelled)
    );
    assert!(!module.cancel_request(ticket.id()));

    // the physical load was never aborted
    assert_eq!(bytes.release("b4"), 1);
    let report = module.run_tick(FRAME, 0.0);
    assert_eq!(report.resolved, 1);
    assert!(module.is_idle());
    assert!(module.bundle_payload("b4").is_some());
    assert!(ticket.try_take().is_none());

    let report = module.run_tick(Duration::from_secs(10), 60.0);
    assert!(report.swept);
    assert_eq!(report.evicted, 1);
    assert_eq!(bytes.unloads(), vec!["b4".to_string()]);
}

#[test]
fn test_failed_load_notifies_every_caller_once() {
    let Harness {
        mut module, bytes, ..
    } = harness();
    bytes.fail("b4");
    let (sink, completions) = channel::unbounded();

    let requests: Vec<RequestId> = (0..3)
        .map(|_| {
            module
                .request_bundle_into("b4", LoadKind::Normal, LoadMethod::Async, sink.clone())
                .unwrap()
        })
        .collect();
    settle(&mut module);

    let delivered: Vec<Completion> = completions.try_iter().collect();
    assert_eq!(delivered.len(), 3);
    for (completion, request) in delivered.iter().zip(&requests) {
        assert_eq!(completion.request_id, *request);
        assert_eq!(completion.state, TaskState::Error);
        assert!(matches!(
            completion.result,
            Err(ResourceError::LoadFailure { .. })
        ));
    }
    assert!(completions.try_recv().is_err());

    assert_eq!(bytes.bundle_loads("b4"), 1);
    assert_eq!(module.stats().snapshot().failures, 1);
    let summary = module.describe(ResourceKind::Bundle, "b4").unwrap();
    assert!(summary.ready);
    assert!(!summary.loaded);
}
