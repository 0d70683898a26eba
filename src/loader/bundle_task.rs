use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use crate::error::{ResourceError, Result};
use crate::io::LoadMethod;
use crate::loader::context::LoadContext;
use crate::loader::{LoadTask, ResourceKind, Subscriber, TaskDetail, TaskId};
use crate::resources::{BundleId, LoadKind, Payload, Record, RecordId};

/// Bundle-specific task state: the bundle's own bytes plus one completion
/// signal per dependency.
pub(crate) struct BundleTask {
    pub(crate) bundle: BundleId,
    pub(crate) dependencies: SmallVec<[String; 4]>,
    /// `1 + dependencies.len()`
    pub(crate) required: usize,
    pub(crate) completed: usize,
    pub(crate) own_result: Option<Result<Payload>>,
}

impl BundleTask {
    pub(crate) fn new(bundle: BundleId, dependencies: Vec<String>) -> Self {
        Self {
            bundle,
            required: 1 + dependencies.len(),
            dependencies: dependencies.into(),
            completed: 0,
            own_result: None,
        }
    }

    /// Every signal arrived and the bundle's own load reported back
    pub(crate) fn is_settled(&self) -> bool {
        self.completed >= self.required && self.own_result.is_some()
    }
}

impl LoadContext<'_> {
    /// Create (but do not start) the task for `path`.
    ///
    /// The bundle record is pre-retained until the task settles. The first
    /// load of a bundle also takes one hold on each dependency, kept until
    /// the bundle is evicted.
    pub(crate) fn create_bundle_task(
        &mut self,
        path: &str,
        kind: LoadKind,
        method: LoadMethod,
    ) -> TaskId {
        let bundle = self.records.get_or_create_bundle(path, kind, self.now);
        let resolved = self.manifest.resolve_dependencies(path);

        let (dependencies, take_holds) = match self.records.bundle_mut(bundle) {
            Some(record) => {
                record.resolve_dependencies(resolved);
                if record.is_ready() {
                    // settled without payload last time; retry
                    record.core_mut().reset_for_reload();
                }
                let take_holds = !record.holds_dependencies();
                if take_holds {
                    record.set_holds_dependencies(true);
                }
                (record.dependencies().to_vec(), take_holds)
            }
            None => (resolved, false),
        };

        self.records.retain(RecordId::Bundle(bundle));
        if take_holds {
            for dependency in &dependencies {
                let dep = self
                    .records
                    .get_or_create_bundle(dependency, LoadKind::Normal, self.now);
                self.records.retain(RecordId::Bundle(dep));
            }
        }

        trace!(path, dependencies = dependencies.len(), "bundle task created");
        self.registry.insert(LoadTask::new(
            path,
            method,
            kind,
            TaskDetail::Bundle(BundleTask::new(bundle, dependencies)),
        ))
    }

    /// Start the bundle's own byte load and request every dependency
    pub(crate) fn start_bundle(&mut self, id: TaskId) {
        let (path, method, dependencies) = match self.registry.task(id) {
            Some(LoadTask {
                path,
                method,
                detail: TaskDetail::Bundle(bundle),
                ..
            }) => (path.clone(), *method, bundle.dependencies.to_vec()),
            _ => return,
        };

        let op = self.io.load_bundle(&path, method);
        self.stats.record_byte_load(ResourceKind::Bundle, &path);
        match method {
            LoadMethod::Sync => {
                let result = op.wait();
                self.bundle_loaded(id, result);
            }
            LoadMethod::Async => {
                if let Some(task) = self.registry.task_mut(id) {
                    task.op = Some(op);
                }
                self.registry.track_in_flight(id);
            }
        }

        // dependencies always load as Normal
        for dependency in dependencies {
            if let Err(err) =
                self.request_bundle(&dependency, LoadKind::Normal, method, Subscriber::Task(id))
            {
                error!(path = %path, dependency = %dependency, %err, "dependency request rejected");
                self.signal(id);
            }
        }
    }

    /// The bundle's own byte load reported back
    pub(crate) fn bundle_loaded(&mut self, id: TaskId, result: Result<Payload>) {
        let Some(task) = self.registry.task_mut(id) else {
            return;
        };
        let TaskDetail::Bundle(bundle) = &mut task.detail else {
            return;
        };
        if bundle.own_result.is_some() {
            warn!(path = %task.path, "bundle reported its own load twice");
            return;
        }
        if let Err(err) = &result {
            warn!(path = %task.path, %err, "bundle byte load failed");
        }
        bundle.own_result = Some(result);
        self.signal(id);
    }

    /// One of the `required` completion signals arrived
    pub(crate) fn bundle_progress(&mut self, id: TaskId) {
        let settled = match self.registry.task_mut(id) {
            Some(LoadTask {
                path,
                detail: TaskDetail::Bundle(bundle),
                ..
            }) => {
                bundle.completed += 1;
                trace!(
                    path = %path,
                    completed = bundle.completed,
                    required = bundle.required,
                    "bundle progress"
                );
                bundle.is_settled()
            }
            _ => false,
        };
        if settled {
            self.finish_bundle(id);
        }
    }

    /// Publish the bundle's own result to its record and fan out.
    ///
    /// A failed own load ends in `Error` even if every dependency succeeded.
    fn finish_bundle(&mut self, id: TaskId) {
        let Some(task) = self.registry.task_mut(id) else {
            return;
        };
        let TaskDetail::Bundle(bundle) = &mut task.detail else {
            return;
        };
        let record = bundle.bundle;
        let path = task.path.clone();
        let result = bundle.own_result.take().unwrap_or_else(|| {
            Err(ResourceError::load_failure(&path, "settled without a result"))
        });
        let success = result.is_ok();
        task.conclude(success);

        if let Some(entry) = self.records.bundle_mut(record) {
            let core = entry.core_mut();
            core.settle(result.as_ref().ok().cloned());
            core.touch(self.now);
        }
        self.records.release(RecordId::Bundle(record));
        self.stats
            .record_load(ResourceKind::Bundle, &path, success, self.now);

        if success {
            debug!(path = %path, "bundle ready");
        } else {
            warn!(path = %path, "bundle settled without payload");
        }
        self.fan_out(id, result);
    }
}
