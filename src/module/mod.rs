//! Resource module façade.
//!
//! [`ResourceModule`] owns the record store, the loader registry and the
//! host's collaborators (manifest, byte loader, owner liveness). All of its
//! methods run on the host's single logical thread:
//!
//! - [`request`] - asset/bundle requests, cancellation, caller-side accounting
//! - [`sweep`] - per-tick scheduling and the eviction sweeps
//! - [`stats`] - counters and per-path load analysis
//!
//! ```
//! use bundle_cache::prelude::*;
//! use std::time::Duration;
//!
//! struct Bytes;
//! impl ByteLoader for Bytes {
//!     fn load_bundle(&mut self, path: &str, _: LoadMethod) -> Box<dyn PendingLoad> {
//!         Box::new(ReadyLoad::ok(Payload::new(path.to_string())))
//!     }
//!     fn load_asset(&mut self, _: &Payload, name: &str, _: &str, _: LoadMethod) -> Box<dyn PendingLoad> {
//!         Box::new(ReadyLoad::ok(Payload::new(name.to_string())))
//!     }
//! }
//!
//! let manifest = StaticManifest::new()
//!     .with_asset("ui/icon.png", "ui")
//!     .with_bundle("ui", &["fonts"]);
//! let owners = OwnerRegistry::new();
//! let mut module =
//!     ResourceModule::new(ResourceConfig::default(), manifest, Bytes, owners).unwrap();
//!
//! let ticket = module
//!     .request_asset("ui/icon.png", "Texture", LoadKind::Normal, LoadMethod::Async)
//!     .unwrap();
//! while ticket.try_peek().is_none() {
//!     module.run_tick(Duration::from_millis(16), 60.0);
//! }
//! let icon = module.acquire_asset("ui/icon.png").unwrap();
//! assert_eq!(icon.downcast_ref::<String>().unwrap(), "icon");
//! ```

pub mod request;
pub mod stats;
pub mod sweep;

use std::borrow::Cow;
use std::time::Duration;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ResourceConfig;
use crate::error::Result;
use crate::io::ByteLoader;
use crate::loader::{Completion, LoadContext, LoaderRegistry, ResourceKind, TaskState};
use crate::manifest::DependencyManifest;
use crate::resources::{LoadKind, OwnerLiveness, Record, RecordCore, RecordStore, RequestId};
use crate::time::{FpsSampler, FrameClock, Timestamp};

pub use stats::{LoadStats, PathAnalysis, StatsSnapshot};
pub use sweep::TickReport;

/// Handle to one request's completion
pub struct Ticket {
    id: RequestId,
    receiver: Receiver<Completion>,
    taken: Mutex<Option<Completion>>,
}

impl Ticket {
    fn new(id: RequestId, receiver: Receiver<Completion>) -> Self {
        Self {
            id,
            receiver,
            taken: Mutex::new(None),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Has the completion arrived? Does not consume it.
    pub fn try_peek(&self) -> Option<Completion> {
        let mut slot = self.taken.lock();
        if slot.is_none() {
            *slot = self.receiver.try_recv().ok();
        }
        slot.clone()
    }

    /// Take the completion if it has arrived
    pub fn try_take(&self) -> Option<Completion> {
        let mut slot = self.taken.lock();
        slot.take().or_else(|| self.receiver.try_recv().ok())
    }
}

/// Point-in-time view of one record
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordSummary {
    pub path: String,
    pub kind: ResourceKind,
    pub load_kind: LoadKind,
    pub ready: bool,
    pub loaded: bool,
    pub ref_count: u32,
    pub live_owners: usize,
    pub last_used_at: Timestamp,
    pub idle: Duration,
}

/// The cache façade
pub struct ResourceModule {
    config: ResourceConfig,
    records: RecordStore,
    registry: LoaderRegistry,
    io: Box<dyn ByteLoader>,
    manifest: Box<dyn DependencyManifest>,
    liveness: Box<dyn OwnerLiveness>,
    stats: LoadStats,
    clock: FrameClock,
    fps: FpsSampler,
    last_sweep_at: Timestamp,
}

impl ResourceModule {
    /// Build a module around the host's collaborators. The config is
    /// validated first.
    pub fn new<M, L, O>(config: ResourceConfig, manifest: M, io: L, liveness: O) -> Result<Self>
    where
        M: DependencyManifest + 'static,
        L: ByteLoader + 'static,
        O: OwnerLiveness + 'static,
    {
        config.validate()?;
        tracing::debug!(
            max_tasks_per_tick = config.max_tasks_per_tick,
            sweep_interval_secs = config.sweep_interval_secs,
            "resource module created"
        );
        Ok(Self {
            stats: LoadStats::new(config.analysis_enabled),
            fps: FpsSampler::new(config.fps_sample_interval()),
            config,
            records: RecordStore::new(),
            registry: LoaderRegistry::new(),
            io: Box::new(io),
            manifest: Box::new(manifest),
            liveness: Box::new(liveness),
            clock: FrameClock::new(),
            last_sweep_at: Timestamp::ZERO,
        })
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn set_analysis_enabled(&mut self, enabled: bool) {
        self.config.analysis_enabled = enabled;
        self.stats.set_analysis_enabled(enabled);
    }

    /// JSON report of load statistics
    pub fn report_json(&self) -> Result<String> {
        self.stats.report_json()
    }

    /// Current logical time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn frame_count(&self) -> u64 {
        self.clock.frame_count()
    }

    /// Last FPS estimate computed by `run_frame`
    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    /// Nothing waiting or loading
    pub fn is_idle(&self) -> bool {
        self.registry.is_idle()
    }

    /// State of the live task for a path, if any
    pub fn task_state(&self, kind: ResourceKind, path: &str) -> Option<TaskState> {
        self.registry.state_of(kind, &self.normalize(path))
    }

    /// Normal bundles that would pass the eviction check (ignoring age)
    pub fn unused_bundle_count(&mut self) -> usize {
        self.records.unused_bundle_count(self.liveness.as_ref())
    }

    /// Normal assets with no refs and no live owners
    pub fn unused_asset_count(&mut self) -> usize {
        self.records.unused_asset_count(self.liveness.as_ref())
    }

    /// Snapshot of one record. Prunes dead owners as a side effect.
    pub fn describe(&mut self, kind: ResourceKind, path: &str) -> Option<RecordSummary> {
        let path = self.normalize(path).into_owned();
        let now = self.clock.now();
        let liveness = self.liveness.as_ref();
        let core: &mut RecordCore = match kind {
            ResourceKind::Asset => {
                let id = self.records.asset_id(&path)?;
                self.records.asset_mut(id)?.core_mut()
            }
            ResourceKind::Bundle => {
                let id = self.records.bundle_id(&path)?;
                self.records.bundle_mut(id)?.core_mut()
            }
        };
        Some(RecordSummary {
            live_owners: core.live_owner_count(liveness),
            path,
            kind,
            load_kind: core.load_kind(),
            ready: core.is_ready(),
            loaded: core.is_loaded(),
            ref_count: core.ref_count(),
            last_used_at: core.last_used_at(),
            idle: now.saturating_sub(core.last_used_at()),
        })
    }

    /// Apply the configured path normalization
    pub fn normalize<'p>(&self, path: &'p str) -> Cow<'p, str> {
        if self.config.normalize_paths && path.chars().any(char::is_uppercase) {
            Cow::Owned(path.to_lowercase())
        } else {
            Cow::Borrowed(path)
        }
    }

    fn context(&mut self) -> LoadContext<'_> {
        LoadContext::new(
            &mut self.records,
            &mut self.registry,
            self.io.as_mut(),
            self.manifest.as_ref(),
            &mut self.stats,
            self.clock.now(),
            self.config.verbose_logging,
        )
    }
}
