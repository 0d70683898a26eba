mod common;

use std::time::Duration;

use bundle_cache::prelude::*;
use common::*;

#[test]
fn test_one_byte_load_per_path() {
    let Harness {
        mut module, bytes, ..
    } = harness();

    let tickets: Vec<Ticket> = (0..10)
        .map(|_| {
            module
                .request_bundle("b3", LoadKind::Normal, LoadMethod::Async)
                .unwrap()
        })
        .collect();
    let assets: Vec<Ticket> = ["a.png", "c.png", "a.png"]
        .iter()
        .map(|path| {
            module
                .request_asset(path, "Texture", LoadKind::Normal, LoadMethod::Async)
                .unwrap()
        })
        .collect();
    settle(&mut module);

    assert!(tickets.iter().all(|t| t.try_take().unwrap().is_success()));
    assert!(assets.iter().all(|t| t.try_take().unwrap().is_success()));

    // b2 is shared by b1 and b3
    for bundle in ["b1", "b2", "b3", "b4"] {
        assert_eq!(bytes.bundle_loads(bundle), 1, "{bundle}");
    }
    assert_eq!(bytes.asset_loads("a"), 1);
    assert_eq!(bytes.asset_loads("c"), 1);
    assert_eq!(module.records().bundle_count(), 4);
    assert_eq!(module.records().asset_count(), 2);
}

#[test]
fn test_ref_count_floor() {
    let mut module = harness().module;
    module
        .request_bundle("b4", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();
    let b4 = RecordId::Bundle(module.bundle_id("b4").unwrap());

    module.retain(b4);
    assert!(module.release(b4));
    for _ in 0..5 {
        assert!(!module.release(b4));
    }
    let summary = module.describe(ResourceKind::Bundle, "b4").unwrap();
    assert_eq!(summary.ref_count, 0);

    // still usable afterwards
    module.retain(b4);
    assert_eq!(module.describe(ResourceKind::Bundle, "b4").unwrap().ref_count, 1);
}

#[test]
fn test_sweep_only_removes_unused_normal_bundles() {
    let Harness {
        mut module, owners, ..
    } = harness();
    module
        .request_bundle("b4", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();
    module
        .request_bundle("ui", LoadKind::Preload, LoadMethod::Sync)
        .unwrap();
    module
        .request_bundle("b3", LoadKind::Permanent, LoadMethod::Sync)
        .unwrap();
    module
        .request_asset("a.png", "Texture", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();
    let holder = owners.spawn();
    module.bind_asset("a.png", holder.handle()).unwrap();

    for _ in 0..10 {
        module.run_tick(Duration::from_secs(30), 60.0);
    }
    module.force_full_sweep();

    // b4 and b2 are held by the permanent b3, b1 by a.png's live owner
    for bundle in ["b1", "b2", "b3", "b4", "ui"] {
        assert!(module.bundle_id(bundle).is_some(), "{bundle}");
    }
    assert_eq!(module.stats().snapshot().evictions, 0);

    drop(holder);
    assert_eq!(module.force_full_sweep(), 1);
    assert!(module.bundle_id("b1").is_none());
    assert!(module.bundle_id("b3").is_some());
    assert!(module.bundle_id("ui").is_some());
}

#[test]
fn test_asset_retain_cascades_to_bundle() {
    let mut module = harness().module;
    module
        .request_asset("a.png", "Texture", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();
    let asset = RecordId::Asset(module.asset_id("a.png").unwrap());
    let bundle_ref = |module: &mut ResourceModule| {
        module
            .describe(ResourceKind::Bundle, "b1")
            .map(|s| s.ref_count)
            .unwrap_or_default()
    };
    assert_eq!(bundle_ref(&mut module), 0);

    module.retain(asset);
    assert_eq!(bundle_ref(&mut module), 1);
    module.retain(asset);
    assert_eq!(bundle_ref(&mut module), 2);

    module.release(asset);
    module.release(asset);
    assert_eq!(bundle_ref(&mut module), 0);

    // a release that did not lower the asset does not reach the bundle
    let b1 = RecordId::Bundle(module.bundle_id("b1").unwrap());
    module.retain(b1);
    assert!(!module.release(asset));
    assert_eq!(bundle_ref(&mut module), 1);
}

#[test]
fn test_bundle_waits_for_every_signal() {
    let Harness {
        mut module, bytes, ..
    } = harness();
    bytes.hold(true);

    let ticket = module
        .request_bundle("b3", LoadKind::Normal, LoadMethod::Async)
        .unwrap();
    module.run_tick(FRAME, 0.0);
    assert_eq!(bytes.held(), 3);

    // own payload first, then the dependencies in reverse manifest order
    for path in ["b3", "b4"] {
        assert_eq!(bytes.release(path), 1);
        module.run_tick(FRAME, 0.0);
        assert_eq!(
            module.task_state(ResourceKind::Bundle, "b3"),
            Some(TaskState::Loading),
            "after {path}"
        );
        assert!(ticket.try_peek().is_none());
    }

    assert_eq!(bytes.release("b2"), 1);
    module.run_tick(FRAME, 0.0);
    let completion = ticket.try_take().unwrap();
    assert_eq!(completion.state, TaskState::Complete);
    assert!(module.is_idle());
}

#[test]
fn test_dependencies_first_then_own_payload() {
    let Harness {
        mut module, bytes, ..
    } = harness();
    bytes.hold(true);

    let ticket = module
        .request_bundle("b3", LoadKind::Normal, LoadMethod::Async)
        .unwrap();
    module.run_tick(FRAME, 0.0);
    bytes.release("b2");
    bytes.release("b4");
    module.run_tick(FRAME, 0.0);
    assert!(module.bundle_payload("b2").is_some());
    assert!(module.bundle_payload("b4").is_some());
    assert!(ticket.try_peek().is_none());

    bytes.release("b3");
    module.run_tick(FRAME, 0.0);
    assert!(ticket.try_take().unwrap().is_success());
}

#[test]
fn test_own_failure_is_not_masked_by_dependencies() {
    let Harness {
        mut module, bytes, ..
    } = harness();
    bytes.fail("b3");

    let ticket = module
        .request_bundle("b3", LoadKind::Normal, LoadMethod::Sync)
        .unwrap();
    let completion = ticket.try_take().unwrap();
    assert_eq!(completion.state, TaskState::Error);
    assert!(module.bundle_payload("b2").is_some());
    assert!(module.bundle_payload("b4").is_some());
    assert!(module.bundle_payload("b3").is_none());
}

#[test]
fn test_request_ids_are_unique_and_increasing() {
    let mut module = harness().module;
    let mut last = None;
    for path in ["b4", "b4", "ui", "b4"] {
        let id = module
            .request_bundle(path, LoadKind::Normal, LoadMethod::Sync)
            .unwrap()
            .id();
        if let Some(previous) = last {
            assert!(id > previous);
        }
        last = Some(id);
    }
}
