//! Example: level streaming with a background byte loader
//!
//! Bundles are "read" on worker threads and published back through
//! `ChannelLoad`; the cache itself only runs on the main loop. A HUD
//! sprite stays bound to a live owner while zone bundles come and go.

use std::thread;
use std::time::Duration;

use bundle_cache::prelude::*;

struct DiskBytes;

impl ByteLoader for DiskBytes {
    fn load_bundle(&mut self, path: &str, method: LoadMethod) -> Box<dyn PendingLoad> {
        let owned = path.to_string();
        let read = move || {
            thread::sleep(Duration::from_millis(5));
            Ok(Payload::new(format!("<bytes of {owned}>")))
        };
        match method {
            LoadMethod::Sync => Box::new(ReadyLoad::new(read())),
            LoadMethod::Async => Box::new(ChannelLoad::spawn(path, read)),
        }
    }

    fn load_asset(
        &mut self,
        _bundle: &Payload,
        asset_name: &str,
        asset_type: &str,
        _method: LoadMethod,
    ) -> Box<dyn PendingLoad> {
        Box::new(ReadyLoad::ok(Payload::new(format!("{asset_type}:{asset_name}"))))
    }

    fn unload_bundle(&mut self, path: &str, _payload: Payload) {
        println!("  unloaded {path}");
    }
}

const MANIFEST: &str = r#"{
    "assets": {
        "hud/health.png": "hud",
        "zones/forest/tree.prefab": "zones/forest",
        "zones/forest/rock.prefab": "zones/forest",
        "zones/cave/bat.prefab": "zones/cave"
    },
    "bundles": {
        "hud": ["shared/fonts"],
        "shared/fonts": [],
        "shared/nature": [],
        "zones/forest": ["shared/nature"],
        "zones/cave": ["shared/nature"]
    }
}"#;

fn pump(module: &mut ResourceModule, frame: Duration) {
    while !module.is_idle() {
        module.run_frame(frame);
        thread::sleep(Duration::from_millis(1));
    }
}

fn main() -> bundle_cache::Result<()> {
    let manifest = StaticManifest::from_json(MANIFEST)?;
    let mut config = ResourceConfig::default();
    config.min_bundle_lifetime_secs = 5.0;
    config.sweep_interval_secs = 1.0;

    let owners = OwnerRegistry::new();
    let mut module = ResourceModule::new(config, manifest, DiskBytes, owners.clone())?;
    let frame = Duration::from_millis(16);

    // HUD is needed right now
    println!("Loading HUD synchronously...");
    module.request_asset("hud/health.png", "Sprite", LoadKind::Permanent, LoadMethod::Sync)?;
    let hud = owners.spawn();
    module.bind_asset("hud/health.png", hud.handle())?;

    println!("Streaming in the forest...");
    let tree = module.request_asset(
        "zones/forest/tree.prefab",
        "Prefab",
        LoadKind::Normal,
        LoadMethod::Async,
    )?;
    let rock = module.request_asset(
        "zones/forest/rock.prefab",
        "Prefab",
        LoadKind::Normal,
        LoadMethod::Async,
    )?;
    pump(&mut module, frame);
    for ticket in [&tree, &rock] {
        if let Some(done) = ticket.try_take() {
            println!("  {} -> {}", done.path, done.state);
        }
    }

    println!("Walking into the cave...");
    let bat = module.request_asset(
        "zones/cave/bat.prefab",
        "Prefab",
        LoadKind::Normal,
        LoadMethod::Async,
    )?;
    pump(&mut module, frame);
    let bat_prefab = module.acquire_asset("zones/cave/bat.prefab");
    println!("  bat ready: {}", bat_prefab.is_some());
    drop(bat);

    // ten seconds in the cave; the forest goes stale and gets swept
    println!("Spending time in the cave...");
    for _ in 0..600 {
        module.run_frame(frame);
    }

    for path in ["zones/forest", "zones/cave", "shared/nature", "hud"] {
        let resident = module.bundle_id(path).is_some();
        println!("  {path:<14} resident: {resident}");
    }

    module.release_asset("zones/cave/bat.prefab");
    println!("Scene change, full sweep...");
    let reclaimed = module.force_full_sweep();
    println!("  reclaimed {reclaimed} bundles");

    println!("{}", module.report_json()?);
    Ok(())
}
