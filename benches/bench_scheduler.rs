use std::time::Duration;

use bundle_cache::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const FRAME: Duration = Duration::from_millis(16);

struct InstantBytes;

impl ByteLoader for InstantBytes {
    fn load_bundle(&mut self, path: &str, _method: LoadMethod) -> Box<dyn PendingLoad> {
        Box::new(ReadyLoad::ok(Payload::new(path.len())))
    }

    fn load_asset(
        &mut self,
        _bundle: &Payload,
        asset_name: &str,
        _asset_type: &str,
        _method: LoadMethod,
    ) -> Box<dyn PendingLoad> {
        Box::new(ReadyLoad::ok(Payload::new(asset_name.len())))
    }
}

/// `bundles` bundles, each depending on the previous one, with 4 assets each
fn chain_manifest(bundles: usize) -> StaticManifest {
    let mut manifest = StaticManifest::new();
    for i in 0..bundles {
        let bundle = format!("bundle_{i}");
        let dependencies = if i == 0 {
            Vec::new()
        } else {
            vec![format!("bundle_{}", i - 1)]
        };
        manifest.insert_bundle(&bundle, dependencies);
        for a in 0..4 {
            manifest.insert_asset(&format!("{bundle}/asset_{a}.bin"), &bundle);
        }
    }
    manifest
}

fn module(bundles: usize, config: ResourceConfig) -> ResourceModule {
    ResourceModule::new(config, chain_manifest(bundles), InstantBytes, OwnerRegistry::new())
        .unwrap()
}

fn bench_async_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_burst");
    for bundles in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(bundles), &bundles, |b, &n| {
            b.iter(|| {
                let mut config = ResourceConfig::default();
                config.max_tasks_per_tick = 32;
                let mut module = module(n, config);
                let mut tickets = Vec::with_capacity(n * 4);
                for i in 0..n {
                    for a in 0..4 {
                        let path = format!("bundle_{i}/asset_{a}.bin");
                        tickets.push(
                            module
                                .request_asset(&path, "Blob", LoadKind::Normal, LoadMethod::Async)
                                .unwrap(),
                        );
                    }
                }
                while !module.is_idle() {
                    module.run_tick(FRAME, 0.0);
                }
                black_box(tickets);
            })
        });
    }
    group.finish();
}

fn bench_sync_dependency_chain(c: &mut Criterion) {
    c.bench_function("sync_chain_64", |b| {
        b.iter(|| {
            let mut module = module(64, ResourceConfig::default());
            let ticket = module
                .request_bundle("bundle_63", LoadKind::Normal, LoadMethod::Sync)
                .unwrap();
            black_box(ticket.try_take());
        })
    });
}

fn bench_cache_hits(c: &mut Criterion) {
    let mut module = module(64, ResourceConfig::default());
    for i in 0..64 {
        module
            .request_asset(
                &format!("bundle_{i}/asset_0.bin"),
                "Blob",
                LoadKind::Normal,
                LoadMethod::Sync,
            )
            .unwrap();
    }

    c.bench_function("cache_hit_request", |b| {
        b.iter(|| {
            let ticket = module
                .request_asset(
                    "bundle_32/asset_0.bin",
                    "Blob",
                    LoadKind::Normal,
                    LoadMethod::Async,
                )
                .unwrap();
            black_box(ticket.try_take());
        })
    });
}

fn bench_full_sweep(c: &mut Criterion) {
    c.bench_function("full_sweep_256", |b| {
        b.iter(|| {
            let mut module = module(256, ResourceConfig::default());
            for i in 0..256 {
                module
                    .request_bundle(&format!("bundle_{i}"), LoadKind::Normal, LoadMethod::Sync)
                    .unwrap();
            }
            black_box(module.force_full_sweep());
        })
    });
}

criterion_group!(
    benches,
    bench_async_burst,
    bench_sync_dependency_chain,
    bench_cache_hits,
    bench_full_sweep
);
criterion_main!(benches);
