//! Path-keyed record storage.
//!
//! The store is the single owner of every [`AssetRecord`] and
//! [`BundleRecord`]. It resolves paths to generational ids and implements the
//! counter cascade: retaining an asset retains its owning bundle, releasing an
//! asset releases the bundle only if the asset's own count actually dropped.
//! None of these calls load or unload anything.

use ahash::AHashMap;
use slotmap::SlotMap;

use crate::error::{ResourceError, Result};
use crate::resources::{
    AssetId, AssetRecord, BundleId, BundleRecord, LoadKind, OwnerHandle, OwnerLiveness, Record,
    RecordCore, RecordId,
};
use crate::time::Timestamp;

/// All resident records, addressable by path or id
#[derive(Default)]
pub struct RecordStore {
    assets: SlotMap<AssetId, AssetRecord>,
    bundles: SlotMap<BundleId, BundleRecord>,
    asset_paths: AHashMap<String, AssetId>,
    bundle_paths: AHashMap<String, BundleId>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_id(&self, path: &str) -> Option<AssetId> {
        self.asset_paths.get(path).copied()
    }

    pub fn bundle_id(&self, path: &str) -> Option<BundleId> {
        self.bundle_paths.get(path).copied()
    }

    pub fn asset(&self, id: AssetId) -> Option<&AssetRecord> {
        self.assets.get(id)
    }

    pub fn asset_mut(&mut self, id: AssetId) -> Option<&mut AssetRecord> {
        self.assets.get_mut(id)
    }

    pub fn bundle(&self, id: BundleId) -> Option<&BundleRecord> {
        self.bundles.get(id)
    }

    pub fn bundle_mut(&mut self, id: BundleId) -> Option<&mut BundleRecord> {
        self.bundles.get_mut(id)
    }

    pub fn asset_by_path(&self, path: &str) -> Option<&AssetRecord> {
        self.asset_id(path).and_then(|id| self.assets.get(id))
    }

    pub fn bundle_by_path(&self, path: &str) -> Option<&BundleRecord> {
        self.bundle_id(path).and_then(|id| self.bundles.get(id))
    }

    pub fn core(&self, id: RecordId) -> Option<&RecordCore> {
        match id {
            RecordId::Asset(id) => self.assets.get(id).map(|r| r.core()),
            RecordId::Bundle(id) => self.bundles.get(id).map(|r| r.core()),
        }
    }

    pub fn core_mut(&mut self, id: RecordId) -> Option<&mut RecordCore> {
        match id {
            RecordId::Asset(id) => self.assets.get_mut(id).map(|r| r.core_mut()),
            RecordId::Bundle(id) => self.bundles.get_mut(id).map(|r| r.core_mut()),
        }
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    pub fn bundles(&self) -> impl Iterator<Item = (BundleId, &BundleRecord)> {
        self.bundles.iter()
    }

    pub fn assets(&self) -> impl Iterator<Item = (AssetId, &AssetRecord)> {
        self.assets.iter()
    }

    /// Look up a bundle record, creating an unloaded one on first sight.
    ///
    /// The load kind of an existing record is never changed.
    pub fn get_or_create_bundle(&mut self, path: &str, kind: LoadKind, now: Timestamp) -> BundleId {
        if let Some(id) = self.bundle_paths.get(path) {
            return *id;
        }
        let id = self.bundles.insert(BundleRecord::new(path, kind, now));
        self.bundle_paths.insert(path.to_string(), id);
        id
    }

    /// Look up an asset record, creating it inside `owner` on first sight.
    ///
    /// An existing asset must already belong to `owner`; otherwise the call is
    /// rejected with [`ResourceError::DuplicateRegistration`] and nothing changes.
    pub fn get_or_create_asset(
        &mut self,
        path: &str,
        asset_type: &str,
        kind: LoadKind,
        owner: BundleId,
        now: Timestamp,
    ) -> Result<AssetId> {
        if let Some(id) = self.asset_paths.get(path).copied() {
            let existing = self.assets[id].owner_bundle();
            if existing != owner {
                let expected = self.bundles.get(existing).map(|b| b.path()).unwrap_or("?");
                return Err(ResourceError::DuplicateRegistration(format!(
                    "asset {path} already belongs to bundle {expected}"
                )));
            }
            return Ok(id);
        }

        if !self.bundles.contains_key(owner) {
            return Err(ResourceError::UnresolvedAsset(path.to_string()));
        }
        let id = self
            .assets
            .insert(AssetRecord::new(path, asset_type, kind, owner, now));
        self.asset_paths.insert(path.to_string(), id);
        self.bundles[owner].add_owned_asset(owner, id, &self.assets[id])?;
        Ok(id)
    }

    /// `retain()` with the asset-to-bundle cascade. Returns false if the
    /// record is gone.
    pub fn retain(&mut self, id: RecordId) -> bool {
        match id {
            RecordId::Asset(asset_id) => {
                let Some(asset) = self.assets.get_mut(asset_id) else {
                    return false;
                };
                asset.core_mut().retain();
                let owner = asset.owner_bundle();
                if let Some(bundle) = self.bundles.get_mut(owner) {
                    bundle.core_mut().retain();
                }
                true
            }
            RecordId::Bundle(bundle_id) => match self.bundles.get_mut(bundle_id) {
                Some(bundle) => {
                    bundle.core_mut().retain();
                    true
                }
                None => false,
            },
        }
    }

    /// `release()` with the cascade, clamped at zero at every level.
    /// Returns whether the record's own count dropped.
    pub fn release(&mut self, id: RecordId) -> bool {
        match id {
            RecordId::Asset(asset_id) => {
                let Some(asset) = self.assets.get_mut(asset_id) else {
                    return false;
                };
                if !asset.core_mut().release() {
                    return false;
                }
                let owner = asset.owner_bundle();
                if let Some(bundle) = self.bundles.get_mut(owner) {
                    bundle.core_mut().release();
                }
                true
            }
            RecordId::Bundle(bundle_id) => self
                .bundles
                .get_mut(bundle_id)
                .map(|bundle| bundle.core_mut().release())
                .unwrap_or(false),
        }
    }

    pub fn retain_owner(&mut self, id: RecordId, owner: OwnerHandle) -> Result<bool> {
        match self.core_mut(id) {
            Some(core) => core.retain_owner(owner),
            None => Err(ResourceError::InvalidOwner(format!(
                "{owner:?} bound to a record that is no longer resident"
            ))),
        }
    }

    pub fn release_owner(&mut self, id: RecordId, owner: OwnerHandle) -> bool {
        self.core_mut(id)
            .map(|core| core.release_owner(owner))
            .unwrap_or(false)
    }

    pub fn touch(&mut self, id: RecordId, now: Timestamp) {
        if let Some(core) = self.core_mut(id) {
            core.touch(now);
        }
    }

    /// Asset with no refs and no live owners (readiness not required)
    fn asset_is_idle(&mut self, id: AssetId, liveness: &dyn OwnerLiveness) -> bool {
        match self.assets.get_mut(id) {
            Some(asset) => {
                let core = asset.core_mut();
                core.ref_count() == 0 && core.live_owner_count(liveness) == 0
            }
            None => true,
        }
    }

    /// Bundle of the given kind that is unused and whose owned assets are all
    /// idle.
    pub fn bundle_is_reclaimable(
        &mut self,
        id: BundleId,
        kind: LoadKind,
        liveness: &dyn OwnerLiveness,
    ) -> bool {
        let owned: Vec<AssetId> = match self.bundles.get_mut(id) {
            Some(bundle) if bundle.load_kind() == kind => {
                if !bundle.core_mut().is_unused(liveness) {
                    return false;
                }
                bundle.owned_assets().to_vec()
            }
            _ => return false,
        };
        owned
            .into_iter()
            .all(|asset| self.asset_is_idle(asset, liveness))
    }

    /// Remove a bundle together with the asset records it owns.
    ///
    /// Dependency holds are released (not force-evicted); dependencies become
    /// reclaimable on their own schedule.
    pub fn remove_bundle(&mut self, id: BundleId) -> Option<BundleRecord> {
        let mut bundle = self.bundles.remove(id)?;
        self.bundle_paths.remove(bundle.path());

        for asset_id in bundle.owned_assets() {
            if let Some(asset) = self.assets.remove(*asset_id) {
                self.asset_paths.remove(asset.path());
            }
        }

        if bundle.holds_dependencies() {
            for dependency in bundle.dependencies() {
                if let Some(dep_id) = self.bundle_paths.get(dependency).copied() {
                    self.release(RecordId::Bundle(dep_id));
                }
            }
            bundle.set_holds_dependencies(false);
        }
        Some(bundle)
    }

    /// Normal bundles that are settled and unused
    pub fn unused_bundle_count(&mut self, liveness: &dyn OwnerLiveness) -> usize {
        let ids: Vec<BundleId> = self.bundles.keys().collect();
        ids.into_iter()
            .filter(|id| self.bundle_is_reclaimable(*id, LoadKind::Normal, liveness))
            .count()
    }

    /// Normal assets that are settled and unused
    pub fn unused_asset_count(&mut self, liveness: &dyn OwnerLiveness) -> usize {
        let mut count = 0;
        for asset in self.assets.values_mut() {
            if asset.load_kind() == LoadKind::Normal && asset.core_mut().is_unused(liveness) {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{OwnerRegistry, Payload};

    const T0: Timestamp = Timestamp::ZERO;

    fn loaded_bundle(store: &mut RecordStore, path: &str) -> BundleId {
        let id = store.get_or_create_bundle(path, LoadKind::Normal, T0);
        store
            .bundle_mut(id)
            .unwrap()
            .core_mut()
            .settle(Some(Payload::new(path.to_string())));
        id
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut store = RecordStore::new();
        let a = store.get_or_create_bundle("b1", LoadKind::Normal, T0);
        let b = store.get_or_create_bundle("b1", LoadKind::Preload, T0);
        assert_eq!(a, b);
        assert_eq!(store.bundle_count(), 1);
        // first kind sticks
        assert_eq!(store.bundle(a).unwrap().load_kind(), LoadKind::Normal);
    }

    #[test]
    fn test_asset_in_wrong_bundle_rejected() {
        let mut store = RecordStore::new();
        let b1 = store.get_or_create_bundle("b1", LoadKind::Normal, T0);
        let b2 = store.get_or_create_bundle("b2", LoadKind::Normal, T0);
        store
            .get_or_create_asset("a.png", "Texture", LoadKind::Normal, b1, T0)
            .unwrap();

        let err = store
            .get_or_create_asset("a.png", "Texture", LoadKind::Normal, b2, T0)
            .unwrap_err();
        assert!(matches!(err, ResourceError::DuplicateRegistration(_)));
        assert!(store.bundle(b2).unwrap().owned_assets().is_empty());
    }

    #[test]
    fn test_cascade_retain_release() {
        let mut store = RecordStore::new();
        let b1 = store.get_or_create_bundle("b1", LoadKind::Normal, T0);
        let a = store
            .get_or_create_asset("a.png", "Texture", LoadKind::Normal, b1, T0)
            .unwrap();

        store.retain(a.into());
        assert_eq!(store.asset(a).unwrap().ref_count(), 1);
        assert_eq!(store.bundle(b1).unwrap().ref_count(), 1);

        assert!(store.release(a.into()));
        assert_eq!(store.bundle(b1).unwrap().ref_count(), 0);

        // bundle retained directly; extra asset release must not leak into it
        store.retain(b1.into());
        assert!(!store.release(a.into()));
        assert_eq!(store.bundle(b1).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_owned_asset_blocks_reclaim() {
        let registry = OwnerRegistry::new();
        let mut store = RecordStore::new();
        let b1 = loaded_bundle(&mut store, "b1");
        let a = store
            .get_or_create_asset("a.png", "Texture", LoadKind::Normal, b1, T0)
            .unwrap();
        assert!(store.bundle_is_reclaimable(b1, LoadKind::Normal, &registry));

        let owner = registry.spawn();
        store.retain_owner(a.into(), owner.handle()).unwrap();
        assert!(!store.bundle_is_reclaimable(b1, LoadKind::Normal, &registry));

        drop(owner);
        assert!(store.bundle_is_reclaimable(b1, LoadKind::Normal, &registry));
        assert!(!store.bundle_is_reclaimable(b1, LoadKind::Preload, &registry));
    }

    #[test]
    fn test_remove_bundle_drops_assets_and_releases_holds() {
        let mut store = RecordStore::new();
        let b2 = loaded_bundle(&mut store, "b2");
        let b1 = loaded_bundle(&mut store, "b1");
        store
            .bundle_mut(b1)
            .unwrap()
            .resolve_dependencies(vec!["b2".to_string()]);
        store.bundle_mut(b1).unwrap().set_holds_dependencies(true);
        store.retain(b2.into());
        store
            .get_or_create_asset("a.png", "Texture", LoadKind::Normal, b1, T0)
            .unwrap();

        let removed = store.remove_bundle(b1).unwrap();
        assert_eq!(removed.path(), "b1");
        assert!(!removed.holds_dependencies());
        assert!(store.bundle_id("b1").is_none());
        assert!(store.asset_id("a.png").is_none());
        assert_eq!(store.asset_count(), 0);
        assert_eq!(store.bundle(b2).unwrap().ref_count(), 0);
        // b2 itself stays resident
        assert!(store.bundle_id("b2").is_some());
    }

    #[test]
    fn test_owner_on_missing_record() {
        let mut store = RecordStore::new();
        let b1 = store.get_or_create_bundle("b1", LoadKind::Normal, T0);
        store.remove_bundle(b1);
        assert!(store
            .retain_owner(b1.into(), OwnerHandle::from_raw(3))
            .is_err());
        assert!(!store.release_owner(b1.into(), OwnerHandle::from_raw(3)));
    }
}
