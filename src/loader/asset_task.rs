use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::{ResourceError, Result};
use crate::io::LoadMethod;
use crate::loader::context::LoadContext;
use crate::loader::{LoadTask, ResourceKind, Subscriber, TaskDetail, TaskId};
use crate::resources::{AssetId, BundleId, LoadKind, Payload, Record, RecordId};

/// Asset-specific task state. The asset waits on exactly one bundle task
/// (its owning bundle), which in turn waits on the bundle's dependencies.
pub(crate) struct AssetTask {
    pub(crate) asset: AssetId,
    pub(crate) bundle_path: String,
    pub(crate) asset_type: String,
    pub(crate) asset_name: String,
    /// Dependency bundles pre-retained at creation
    pub(crate) retained_dependencies: SmallVec<[BundleId; 4]>,
    pub(crate) bundle_settled: bool,
}

impl LoadContext<'_> {
    /// Create (but do not start) the task for `path`.
    ///
    /// Pre-retains the asset (and through the cascade its owning bundle) plus
    /// every dependency bundle, so nothing on the load path can be evicted
    /// mid-load. Exactly these references are returned in
    /// [`LoadContext::finish_asset`].
    pub(crate) fn create_asset_task(
        &mut self,
        path: &str,
        asset_type: &str,
        kind: LoadKind,
        method: LoadMethod,
        bundle_path: &str,
    ) -> Result<TaskId> {
        // the owning bundle follows the asset's load kind
        let bundle = self.records.get_or_create_bundle(bundle_path, kind, self.now);
        let asset = self
            .records
            .get_or_create_asset(path, asset_type, kind, bundle, self.now)?;

        let asset_name = match self.records.asset_mut(asset) {
            Some(record) => {
                if record.is_ready() {
                    record.core_mut().reset_for_reload();
                }
                record.asset_name().to_string()
            }
            None => return Err(ResourceError::UnresolvedAsset(path.to_string())),
        };

        self.records.retain(RecordId::Asset(asset));
        let mut retained_dependencies = SmallVec::new();
        for dependency in self.manifest.resolve_dependencies(bundle_path) {
            let dep = self
                .records
                .get_or_create_bundle(&dependency, LoadKind::Normal, self.now);
            self.records.retain(RecordId::Bundle(dep));
            retained_dependencies.push(dep);
        }

        trace!(path, bundle = bundle_path, "asset task created");
        Ok(self.registry.insert(LoadTask::new(
            path,
            method,
            kind,
            TaskDetail::Asset(AssetTask {
                asset,
                bundle_path: bundle_path.to_string(),
                asset_type: asset_type.to_string(),
                asset_name,
                retained_dependencies,
                bundle_settled: false,
            }),
        )))
    }

    /// Request the owning bundle; the asset itself loads once it settles
    pub(crate) fn start_asset(&mut self, id: TaskId) {
        let (bundle_path, kind, method) = match self.registry.task(id) {
            Some(LoadTask {
                load_kind,
                method,
                detail: TaskDetail::Asset(asset),
                ..
            }) => (asset.bundle_path.clone(), *load_kind, *method),
            _ => return,
        };

        if let Err(err) = self.request_bundle(&bundle_path, kind, method, Subscriber::Task(id)) {
            self.finish_asset(id, Err(err));
        }
    }

    /// Owning bundle settled (successfully or not): extract the asset
    pub(crate) fn owning_bundle_settled(&mut self, id: TaskId) {
        let (path, bundle_path, asset_name, asset_type, method) = match self.registry.task_mut(id) {
            Some(LoadTask {
                path,
                method,
                detail: TaskDetail::Asset(asset),
                ..
            }) => {
                if asset.bundle_settled {
                    return;
                }
                asset.bundle_settled = true;
                (
                    path.clone(),
                    asset.bundle_path.clone(),
                    asset.asset_name.clone(),
                    asset.asset_type.clone(),
                    *method,
                )
            }
            _ => return,
        };

        let bundle_payload = self
            .records
            .bundle_by_path(&bundle_path)
            .and_then(|bundle| bundle.payload().cloned());
        let Some(bundle_payload) = bundle_payload else {
            let reason = format!("owning bundle {bundle_path} failed to load");
            self.finish_asset(id, Err(ResourceError::load_failure(&path, reason)));
            return;
        };

        let op = self
            .io
            .load_asset(&bundle_payload, &asset_name, &asset_type, method);
        self.stats.record_byte_load(ResourceKind::Asset, &path);
        match method {
            LoadMethod::Sync => {
                let result = op.wait();
                self.finish_asset(id, result);
            }
            LoadMethod::Async => {
                if let Some(task) = self.registry.task_mut(id) {
                    task.op = Some(op);
                }
                self.registry.track_in_flight(id);
            }
        }
    }

    /// Publish the asset's result, return the pre-retains and fan out
    pub(crate) fn finish_asset(&mut self, id: TaskId, result: Result<Payload>) {
        let Some(task) = self.registry.task_mut(id) else {
            return;
        };
        let TaskDetail::Asset(asset) = &mut task.detail else {
            return;
        };
        let record = asset.asset;
        let dependencies = std::mem::take(&mut asset.retained_dependencies);
        let path = task.path.clone();
        let success = result.is_ok();
        task.conclude(success);

        if let Some(entry) = self.records.asset_mut(record) {
            let core = entry.core_mut();
            core.settle(result.as_ref().ok().cloned());
            core.touch(self.now);
        }
        self.records.release(RecordId::Asset(record));
        for dependency in dependencies {
            self.records.release(RecordId::Bundle(dependency));
        }
        self.stats
            .record_load(ResourceKind::Asset, &path, success, self.now);

        match &result {
            Ok(_) => debug!(path = %path, "asset ready"),
            Err(err) => warn!(path = %path, %err, "asset failed"),
        }
        self.fan_out(id, result);
    }
}
