use smallvec::SmallVec;

use crate::error::{ResourceError, Result};
use crate::resources::{AssetId, AssetRecord, BundleId, LoadKind, Record, RecordCore};
use crate::time::Timestamp;

/// A packaged group of assets loaded and unloaded as one unit
#[derive(Clone, Debug)]
pub struct BundleRecord {
    core: RecordCore,
    owned_assets: SmallVec<[AssetId; 8]>,
    dependencies: SmallVec<[String; 4]>,
    dependencies_resolved: bool,
    holds_dependencies: bool,
}

impl BundleRecord {
    pub(crate) fn new(path: impl Into<String>, load_kind: LoadKind, now: Timestamp) -> Self {
        Self {
            core: RecordCore::new(path, load_kind, now),
            owned_assets: SmallVec::new(),
            dependencies: SmallVec::new(),
            dependencies_resolved: false,
            holds_dependencies: false,
        }
    }

    pub fn owned_assets(&self) -> &[AssetId] {
        &self.owned_assets
    }

    /// Bundles this one depends on, as resolved at first load
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Does this bundle currently hold a reference on each dependency?
    pub fn holds_dependencies(&self) -> bool {
        self.holds_dependencies
    }

    /// Register an asset created from this bundle.
    ///
    /// Rejects (without mutating) an asset whose back-reference points at a
    /// different bundle.
    pub(crate) fn add_owned_asset(
        &mut self,
        self_id: BundleId,
        asset_id: AssetId,
        asset: &AssetRecord,
    ) -> Result<()> {
        if asset.owner_bundle() != self_id {
            return Err(ResourceError::DuplicateRegistration(format!(
                "asset {} does not belong to bundle {}",
                asset.path(),
                self.core.path()
            )));
        }
        if !self.owned_assets.contains(&asset_id) {
            self.owned_assets.push(asset_id);
        }
        Ok(())
    }

    /// Set the dependency list. Only the first resolution sticks.
    pub(crate) fn resolve_dependencies(&mut self, dependencies: impl IntoIterator<Item = String>) {
        if self.dependencies_resolved {
            return;
        }
        self.dependencies = dependencies.into_iter().collect();
        self.dependencies_resolved = true;
    }

    pub(crate) fn set_holds_dependencies(&mut self, holds: bool) {
        self.holds_dependencies = holds;
    }
}

impl Record for BundleRecord {
    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }
}
