//! Explicit context that drives load tasks.
//!
//! A [`LoadContext`] borrows every collaborator a task needs (record store,
//! registry, byte loader, manifest, statistics) for the duration of one
//! public call. Completion signals between tasks go through a FIFO queue
//! rather than nested calls; [`LoadContext::drain`] runs the queue to empty
//! before the call returns, so no signal is ever carried across ticks.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::error::{ResourceError, Result};
use crate::io::{ByteLoader, LoadMethod};
use crate::loader::{
    Completion, LoaderRegistry, ResourceKind, Subscriber, TaskDetail, TaskId, TaskState,
    TickBudget,
};
use crate::manifest::DependencyManifest;
use crate::module::stats::LoadStats;
use crate::resources::{LoadKind, Payload, Record, RecordId, RecordStore, RequestId};
use crate::time::Timestamp;

pub(crate) struct LoadContext<'a> {
    pub(crate) records: &'a mut RecordStore,
    pub(crate) registry: &'a mut LoaderRegistry,
    pub(crate) io: &'a mut dyn ByteLoader,
    pub(crate) manifest: &'a dyn DependencyManifest,
    pub(crate) stats: &'a mut LoadStats,
    pub(crate) now: Timestamp,
    pub(crate) verbose: bool,
    /// Tasks that received one completion signal
    signals: VecDeque<TaskId>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(
        records: &'a mut RecordStore,
        registry: &'a mut LoaderRegistry,
        io: &'a mut dyn ByteLoader,
        manifest: &'a dyn DependencyManifest,
        stats: &'a mut LoadStats,
        now: Timestamp,
        verbose: bool,
    ) -> Self {
        Self {
            records,
            registry,
            io,
            manifest,
            stats,
            now,
            verbose,
            signals: VecDeque::new(),
        }
    }

    /// Request a bundle on behalf of `subscriber`
    pub(crate) fn request_bundle(
        &mut self,
        path: &str,
        kind: LoadKind,
        method: LoadMethod,
        subscriber: Subscriber,
    ) -> Result<RequestId> {
        let external = subscriber.is_external();
        if external {
            self.stats.record_request();
            if let Some(existing) = self.records.bundle_by_path(path) {
                warn_kind_mismatch(path, existing.load_kind(), kind);
            }
        }

        if let Some(task) = self.registry.find(ResourceKind::Bundle, path) {
            return self.attach_existing(task, method, subscriber);
        }

        let loaded = self
            .records
            .bundle_id(path)
            .and_then(|id| self.records.bundle(id).map(|b| (id, b.payload().cloned())));
        if let Some((id, Some(payload))) = loaded {
            self.records.touch(RecordId::Bundle(id), self.now);
            return Ok(self.deliver_now(ResourceKind::Bundle, path, payload, subscriber));
        }

        let task = self.create_bundle_task(path, kind, method);
        let request = self.registry.attach(task, subscriber)?;
        if self.verbose {
            debug!(path, %request, %method, "bundle request");
        }
        self.load(task);
        Ok(request)
    }

    /// Request an asset on behalf of `subscriber`.
    ///
    /// Manifest and ownership problems are reported before anything is
    /// created or retained.
    pub(crate) fn request_asset(
        &mut self,
        path: &str,
        asset_type: &str,
        kind: LoadKind,
        method: LoadMethod,
        subscriber: Subscriber,
    ) -> Result<RequestId> {
        let Some(bundle_path) = self.manifest.resolve_owning_bundle(path) else {
            warn!(path, "asset has no owning bundle in the manifest");
            return Err(ResourceError::UnresolvedAsset(path.to_string()));
        };
        if let Some(existing) = self.records.asset_by_path(path) {
            let owner = self
                .records
                .bundle(existing.owner_bundle())
                .map(|b| b.path().to_string());
            if owner.as_deref() != Some(bundle_path.as_str()) {
                tracing::error!(path, bundle = %bundle_path, ?owner, "asset owner mismatch");
                return Err(ResourceError::DuplicateRegistration(format!(
                    "asset {path} is registered under {} but the manifest says {bundle_path}",
                    owner.unwrap_or_default()
                )));
            }
            warn_kind_mismatch(path, existing.load_kind(), kind);
        }
        self.stats.record_request();

        if let Some(task) = self.registry.find(ResourceKind::Asset, path) {
            return self.attach_existing(task, method, subscriber);
        }

        let loaded = self
            .records
            .asset_id(path)
            .and_then(|id| self.records.asset(id).map(|a| (id, a.payload().cloned())));
        if let Some((id, Some(payload))) = loaded {
            self.records.touch(RecordId::Asset(id), self.now);
            return Ok(self.deliver_now(ResourceKind::Asset, path, payload, subscriber));
        }

        let task = self.create_asset_task(path, asset_type, kind, method, &bundle_path)?;
        let request = self.registry.attach(task, subscriber)?;
        if self.verbose {
            debug!(path, bundle = %bundle_path, %request, %method, "asset request");
        }
        self.load(task);
        Ok(request)
    }

    fn attach_existing(
        &mut self,
        task: TaskId,
        method: LoadMethod,
        subscriber: Subscriber,
    ) -> Result<RequestId> {
        let request = self.registry.attach(task, subscriber)?;
        if self.verbose {
            if let Some(t) = self.registry.task(task) {
                debug!(path = %t.path, %request, state = %t.state, "attached to in-flight task");
            }
        }
        if method == LoadMethod::Sync {
            self.load_immediately(task);
        }
        Ok(request)
    }

    /// Already-loaded fast path: answer without touching the byte loader
    fn deliver_now(
        &mut self,
        kind: ResourceKind,
        path: &str,
        payload: Payload,
        subscriber: Subscriber,
    ) -> RequestId {
        let request = self.registry.next_request_id();
        match subscriber {
            Subscriber::External(sender) => {
                self.stats.record_cache_hit();
                if self.verbose {
                    debug!(path, %request, "served from cache");
                }
                let _ = sender.send(Completion {
                    request_id: request,
                    kind,
                    path: path.to_string(),
                    state: TaskState::Complete,
                    result: Ok(payload),
                });
            }
            Subscriber::Task(task) => self.signals.push_back(task),
        }
        request
    }

    /// `None -> Waiting`, then start inline (sync) or queue (async)
    pub(crate) fn load(&mut self, id: TaskId) {
        let Some(task) = self.registry.task_mut(id) else {
            return;
        };
        task.transition(TaskState::Waiting);
        let method = task.method;
        match method {
            LoadMethod::Sync => self.do_load(id),
            LoadMethod::Async => self.registry.enqueue(id),
        }
    }

    /// `Waiting -> Loading`
    pub(crate) fn do_load(&mut self, id: TaskId) {
        let Some(task) = self.registry.task_mut(id) else {
            return;
        };
        if task.started {
            return;
        }
        task.begin();
        if matches!(task.detail, TaskDetail::Bundle(_)) {
            self.start_bundle(id);
        } else {
            self.start_asset(id);
        }
    }

    /// Upgrade an async task (and whatever it waits on) to sync and finish
    /// it inline.
    pub(crate) fn load_immediately(&mut self, id: TaskId) {
        let Some(task) = self.registry.task_mut(id) else {
            return;
        };
        if task.method == LoadMethod::Sync {
            return;
        }
        task.method = LoadMethod::Sync;
        trace!(path = %task.path, "switching to immediate load");

        if !task.started {
            self.registry.dequeue(id);
            self.do_load(id);
            return;
        }

        if let Some(op) = task.op.take() {
            let result = op.wait();
            self.apply_result(id, result);
        }

        let upstream: Vec<String> = match self.registry.task(id).map(|t| &t.detail) {
            Some(TaskDetail::Bundle(bundle)) => bundle.dependencies.to_vec(),
            Some(TaskDetail::Asset(asset)) if !asset.bundle_settled => {
                vec![asset.bundle_path.clone()]
            }
            _ => Vec::new(),
        };
        for path in upstream {
            if let Some(dep) = self.registry.find(ResourceKind::Bundle, &path) {
                self.load_immediately(dep);
            }
        }
    }

    /// Route the result of a physical op to its task
    pub(crate) fn apply_result(&mut self, id: TaskId, result: Result<Payload>) {
        let is_bundle = match self.registry.task(id) {
            Some(task) => matches!(task.detail, TaskDetail::Bundle(_)),
            None => return,
        };
        if is_bundle {
            self.bundle_loaded(id, result);
        } else {
            self.finish_asset(id, result);
        }
    }

    /// Withdraw one caller's interest. The physical load is never aborted.
    pub(crate) fn cancel(&mut self, request: RequestId) -> Result<bool> {
        let (id, orphaned) = self.registry.withdraw(request)?;
        self.stats.record_cancel();
        if let Some(task) = self.registry.task(id) {
            debug!(path = %task.path, %request, orphaned, "request cancelled");
        }
        Ok(orphaned)
    }

    /// Poll pending physical ops and apply whatever resolved
    pub(crate) fn poll_in_flight(&mut self) -> usize {
        let resolved = self.registry.poll_in_flight();
        let count = resolved.len();
        for (id, result) in resolved {
            self.apply_result(id, result);
        }
        self.drain();
        count
    }

    /// Start queued async tasks until the budget runs out
    pub(crate) fn schedule(&mut self, budget: &mut TickBudget) -> usize {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!("loader.schedule", waiting = self.registry.waiting_len())
            .entered();

        while let Some(id) = self.registry.next_scheduled(budget) {
            self.do_load(id);
            self.drain();
        }
        budget.advanced()
    }

    /// Queue one completion signal for `id`
    pub(crate) fn signal(&mut self, id: TaskId) {
        self.signals.push_back(id);
    }

    /// Deliver queued completion signals until none remain
    pub(crate) fn drain(&mut self) {
        while let Some(id) = self.signals.pop_front() {
            let is_bundle = match self.registry.task(id) {
                Some(task) => matches!(task.detail, TaskDetail::Bundle(_)),
                None => continue,
            };
            if is_bundle {
                self.bundle_progress(id);
            } else {
                self.owning_bundle_settled(id);
            }
        }
    }

    /// Retire a settled task and notify its subscribers in registration order
    pub(crate) fn fan_out(&mut self, id: TaskId, result: Result<Payload>) {
        let Some(task) = self.registry.retire(id) else {
            return;
        };
        let kind = task.kind();
        if self.verbose {
            debug!(
                path = %task.path,
                state = %task.state,
                subscribers = task.pending.len(),
                "task settled"
            );
        }
        for (request, subscriber) in task.pending {
            match subscriber {
                Subscriber::External(sender) => {
                    let _ = sender.send(Completion {
                        request_id: request,
                        kind,
                        path: task.path.clone(),
                        state: task.state,
                        result: result.clone(),
                    });
                }
                Subscriber::Task(waiter) => self.signals.push_back(waiter),
            }
        }
    }
}

fn warn_kind_mismatch(path: &str, existing: LoadKind, requested: LoadKind) {
    if existing != requested {
        warn!(
            path,
            ?existing,
            ?requested,
            "load kind differs from first load; keeping the original"
        );
    }
}
