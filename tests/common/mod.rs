#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use bundle_cache::prelude::*;

pub const FRAME: Duration = Duration::from_millis(16);

#[derive(Default)]
struct MockState {
    bundle_loads: AHashMap<String, usize>,
    asset_loads: AHashMap<String, usize>,
    unloads: Vec<String>,
    failing: AHashSet<String>,
    hold_async: bool,
    held: Vec<(String, LoadPublisher, Result<Payload>)>,
}

/// Byte loader double. Counts calls, fails chosen paths and, when holding,
/// parks async loads until the test releases them.
#[derive(Clone, Default)]
pub struct MockBytes {
    state: Arc<Mutex<MockState>>,
}

impl MockBytes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every load of `path` (bundle path or asset name) fail
    pub fn fail(&self, path: &str) {
        self.state.lock().failing.insert(path.to_string());
    }

    pub fn heal(&self, path: &str) {
        self.state.lock().failing.remove(path);
    }

    /// Park async loads until [`MockBytes::release`]
    pub fn hold(&self, hold: bool) {
        self.state.lock().hold_async = hold;
    }

    /// Publish every parked load of `path`; returns how many were released
    pub fn release(&self, path: &str) -> usize {
        let parked: Vec<_> = {
            let mut state = self.state.lock();
            let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.held)
                .into_iter()
                .partition(|(held, _, _)| held == path);
            state.held = rest;
            matching
        };
        let count = parked.len();
        for (_, publisher, result) in parked {
            publisher.publish(result);
        }
        count
    }

    pub fn release_all(&self) -> usize {
        let parked = std::mem::take(&mut self.state.lock().held);
        let count = parked.len();
        for (_, publisher, result) in parked {
            publisher.publish(result);
        }
        count
    }

    pub fn held(&self) -> usize {
        self.state.lock().held.len()
    }

    pub fn bundle_loads(&self, path: &str) -> usize {
        self.state.lock().bundle_loads.get(path).copied().unwrap_or(0)
    }

    pub fn asset_loads(&self, name: &str) -> usize {
        self.state.lock().asset_loads.get(name).copied().unwrap_or(0)
    }

    pub fn unloads(&self) -> Vec<String> {
        self.state.lock().unloads.clone()
    }

    fn respond(&self, key: &str, result: Result<Payload>, method: LoadMethod) -> Box<dyn PendingLoad> {
        let mut state = self.state.lock();
        if method == LoadMethod::Async && state.hold_async {
            let (publisher, load) = ChannelLoad::new(key);
            state.held.push((key.to_string(), publisher, result));
            Box::new(load)
        } else {
            Box::new(ReadyLoad::new(result))
        }
    }

    fn outcome(&self, key: &str, payload: String) -> Result<Payload> {
        if self.state.lock().failing.contains(key) {
            Err(ResourceError::load_failure(key, "mock failure"))
        } else {
            Ok(Payload::new(payload))
        }
    }
}

impl ByteLoader for MockBytes {
    fn load_bundle(&mut self, path: &str, method: LoadMethod) -> Box<dyn PendingLoad> {
        *self
            .state
            .lock()
            .bundle_loads
            .entry(path.to_string())
            .or_default() += 1;
        let result = self.outcome(path, format!("bundle:{path}"));
        self.respond(path, result, method)
    }

    fn load_asset(
        &mut self,
        _bundle: &Payload,
        asset_name: &str,
        _asset_type: &str,
        method: LoadMethod,
    ) -> Box<dyn PendingLoad> {
        *self
            .state
            .lock()
            .asset_loads
            .entry(asset_name.to_string())
            .or_default() += 1;
        let result = self.outcome(asset_name, format!("asset:{asset_name}"));
        self.respond(asset_name, result, method)
    }

    fn unload_bundle(&mut self, path: &str, _payload: Payload) {
        self.state.lock().unloads.push(path.to_string());
    }
}

/// Manifest the test can rewrite after the module took ownership of it
#[derive(Clone, Default)]
pub struct SharedManifest {
    inner: Arc<Mutex<StaticManifest>>,
}

impl SharedManifest {
    pub fn new(manifest: StaticManifest) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manifest)),
        }
    }

    pub fn insert_asset(&self, asset: &str, bundle: &str) {
        self.inner.lock().insert_asset(asset, bundle);
    }
}

impl DependencyManifest for SharedManifest {
    fn resolve_owning_bundle(&self, asset_path: &str) -> Option<String> {
        self.inner.lock().resolve_owning_bundle(asset_path)
    }

    fn resolve_dependencies(&self, bundle_path: &str) -> Vec<String> {
        self.inner.lock().resolve_dependencies(bundle_path)
    }
}

/// `a.png` lives in `b1`, which depends on `b2`. `b3` depends on `b2` and
/// `b4`. `ui/icon.png` lives in the standalone `ui` bundle.
pub fn scene_manifest() -> StaticManifest {
    StaticManifest::new()
        .with_asset("a.png", "b1")
        .with_asset("c.png", "b1")
        .with_asset("ui/icon.png", "ui")
        .with_bundle("b1", &["b2"])
        .with_bundle("b2", &[])
        .with_bundle("b3", &["b2", "b4"])
        .with_bundle("b4", &[])
        .with_bundle("ui", &[])
}

pub struct Harness {
    pub module: ResourceModule,
    pub bytes: MockBytes,
    pub owners: OwnerRegistry,
}

pub fn harness() -> Harness {
    harness_with(ResourceConfig::default(), scene_manifest())
}

pub fn harness_with<M>(config: ResourceConfig, manifest: M) -> Harness
where
    M: DependencyManifest + 'static,
{
    let bytes = MockBytes::new();
    let owners = OwnerRegistry::new();
    let module = ResourceModule::new(config, manifest, bytes.clone(), owners.clone())
        .expect("valid config");
    Harness {
        module,
        bytes,
        owners,
    }
}

/// Tick (below the sweep FPS floor) until the loader is idle
pub fn settle(module: &mut ResourceModule) -> usize {
    let mut ticks = 0;
    while !module.is_idle() {
        module.run_tick(FRAME, 0.0);
        ticks += 1;
        assert!(ticks < 1_000, "loader never settled");
    }
    ticks
}
