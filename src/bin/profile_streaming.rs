#[cfg(feature = "profiling")]
use std::time::{Duration, Instant};

#[cfg(feature = "profiling")]
use bundle_cache::prelude::*;

#[cfg(feature = "profiling")]
struct SyntheticBytes;

#[cfg(feature = "profiling")]
impl ByteLoader for SyntheticBytes {
    fn load_bundle(&mut self, path: &str, _method: LoadMethod) -> Box<dyn PendingLoad> {
        let path = path.to_string();
        Box::new(ChannelLoad::spawn(path.clone(), move || {
            Ok(Payload::new(vec![0u8; 4096 + path.len()]))
        }))
    }

    fn load_asset(
        &mut self,
        _bundle: &Payload,
        asset_name: &str,
        _asset_type: &str,
        _method: LoadMethod,
    ) -> Box<dyn PendingLoad> {
        Box::new(ReadyLoad::ok(Payload::new(asset_name.to_string())))
    }
}

#[cfg(feature = "profiling")]
fn manifest(zones: usize) -> StaticManifest {
    let mut manifest = StaticManifest::new().with_bundle("shared", &[]);
    for zone in 0..zones {
        let bundle = format!("zone{zone}");
        manifest.insert_bundle(&bundle, vec!["shared".to_string()]);
        for prop in 0..8 {
            manifest.insert_asset(&format!("{bundle}/prop{prop}.prefab"), &bundle);
        }
    }
    manifest
}

#[cfg(feature = "profiling")]
fn main() {
    let _guard = match bundle_cache::profiling::init_file_tracing("trace.json") {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("could not start tracing: {err}");
            return;
        }
    };

    let zones = 64;
    let mut config = ResourceConfig::default();
    config.min_bundle_lifetime_secs = 2.0;
    config.sweep_interval_secs = 1.0;
    let mut module =
        match ResourceModule::new(config, manifest(zones), SyntheticBytes, OwnerRegistry::new()) {
            Ok(module) => module,
            Err(err) => {
                eprintln!("bad config: {err}");
                return;
            }
        };

    println!("Streaming {zones} zones...");
    let start = Instant::now();
    let frame = Duration::from_millis(16);
    let mut tickets = Vec::new();
    for zone in 0..zones {
        let _span = tracing::info_span!("zone", zone).entered();
        for prop in 0..8 {
            let path = format!("zone{zone}/prop{prop}.prefab");
            if let Ok(ticket) =
                module.request_asset(&path, "Prefab", LoadKind::Normal, LoadMethod::Async)
            {
                tickets.push(ticket);
            }
        }
        module.run_frame(frame);
    }
    while !module.is_idle() {
        module.run_frame(frame);
    }
    let loaded = tickets.iter().filter(|t| t.try_peek().is_some()).count();
    println!("{loaded} assets settled in {:?}", start.elapsed());

    let mut evicted = 0;
    for _ in 0..600 {
        evicted += module.run_frame(frame).evicted;
    }
    println!("{evicted} bundles evicted by the periodic sweep");
    println!("byte loads: {}", module.stats().snapshot().byte_loads);
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_streaming binary requires --features profiling");
}
