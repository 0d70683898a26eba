//! Per-tick driving and eviction.
//!
//! `run_tick` first applies whatever async loads resolved, then starts
//! queued tasks within the tick budget. The periodic sweep only runs once
//! the loader is completely idle, and is throttled by an interval and a
//! frame-rate floor.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};

use crate::loader::TickBudget;
use crate::module::ResourceModule;
use crate::resources::{BundleId, LoadKind, Record};

/// What one call to [`ResourceModule::run_tick`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Async ops that resolved this tick
    pub resolved: usize,
    /// Queued tasks started this tick
    pub started: usize,
    /// Bundles evicted by the sweep
    pub evicted: usize,
    /// Whether the periodic sweep ran
    pub swept: bool,
}

impl ResourceModule {
    /// Advance the logical clock by `elapsed` and drive the loader. When the
    /// loader is idle, the periodic sweep may evict unused Normal bundles.
    pub fn run_tick(&mut self, elapsed: Duration, current_fps: f32) -> TickReport {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("resources.run_tick").entered();

        self.clock.advance(elapsed);
        let mut report = TickReport::default();

        let mut budget = TickBudget::new(self.config.max_tasks_per_tick, self.config.tick_budget());
        {
            let mut ctx = self.context();
            report.resolved = ctx.poll_in_flight();
            report.started = ctx.schedule(&mut budget);
        }

        if self.sweep_due(current_fps) {
            #[cfg(feature = "profiling")]
            let _span = tracing::info_span!("resources.sweep").entered();

            report.evicted = self.evict_pass(
                LoadKind::Normal,
                Some(self.config.max_evictions_per_sweep),
                Some(self.config.min_bundle_lifetime()),
            );
            report.swept = true;
            self.last_sweep_at = self.clock.now();
        }

        if report.resolved + report.started + report.evicted > 0 {
            trace!(
                frame = self.clock.frame_count(),
                resolved = report.resolved,
                started = report.started,
                evicted = report.evicted,
                "tick"
            );
        }
        report
    }

    /// [`ResourceModule::run_tick`] with the frame rate sampled internally
    pub fn run_frame(&mut self, elapsed: Duration) -> TickReport {
        let fps = self.fps.record(elapsed);
        self.run_tick(elapsed, fps)
    }

    /// Evict every unused Normal bundle regardless of age or cap, repeating
    /// until nothing else becomes reclaimable (released dependency holds can
    /// free further bundles). Meant for scene boundaries.
    pub fn force_full_sweep(&mut self) -> usize {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("resources.full_sweep").entered();

        let mut total = 0;
        loop {
            let evicted = self.evict_pass(LoadKind::Normal, None, None);
            if evicted == 0 {
                break;
            }
            total += evicted;
        }
        debug!(evicted = total, "full sweep");
        total
    }

    /// Evict every unused Preload bundle. Permanent bundles are never
    /// reclaimed.
    pub fn unload_unused_preloaded(&mut self) -> usize {
        let mut total = 0;
        loop {
            let evicted = self.evict_pass(LoadKind::Preload, None, None);
            if evicted == 0 {
                break;
            }
            total += evicted;
        }
        debug!(evicted = total, "preloaded bundles reclaimed");
        total
    }

    fn sweep_due(&self, current_fps: f32) -> bool {
        self.config.sweep_enabled
            && self.registry.is_idle()
            && self.clock.since(self.last_sweep_at) >= self.config.sweep_interval()
            && current_fps >= self.config.sweep_fps_threshold
    }

    /// One pass over the bundles of `kind`: oldest first, up to `cap`,
    /// skipping anything used more recently than `min_idle`.
    fn evict_pass(
        &mut self,
        kind: LoadKind,
        cap: Option<usize>,
        min_idle: Option<Duration>,
    ) -> usize {
        let now = self.clock.now();
        let ids: Vec<BundleId> = self.records.bundles().map(|(id, _)| id).collect();

        let mut candidates = Vec::new();
        for id in ids {
            if !self
                .records
                .bundle_is_reclaimable(id, kind, self.liveness.as_ref())
            {
                continue;
            }
            let Some(last_used_at) = self.records.bundle(id).map(|b| b.last_used_at()) else {
                continue;
            };
            if let Some(min_idle) = min_idle {
                if now.saturating_sub(last_used_at) < min_idle {
                    continue;
                }
            }
            candidates.push((last_used_at, id));
        }

        candidates.sort_by_key(|(last_used_at, _)| *last_used_at);
        if let Some(cap) = cap {
            candidates.truncate(cap);
        }

        let count = candidates.len();
        for (_, id) in candidates {
            self.evict_bundle(id);
        }
        count
    }

    fn evict_bundle(&mut self, id: BundleId) {
        let now = self.clock.now();
        let Some(mut bundle) = self.records.remove_bundle(id) else {
            return;
        };
        let idle = now.saturating_sub(bundle.last_used_at());
        let path = bundle.path().to_string();
        if let Some(payload) = bundle.core_mut().take_payload() {
            self.io.unload_bundle(&path, payload);
        }
        self.stats.record_unload(&path, now);
        debug!(
            path = %path,
            idle_secs = idle.as_secs_f32(),
            owned_assets = bundle.owned_assets().len(),
            "bundle evicted"
        );
    }
}
