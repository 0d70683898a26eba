use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ResourceError, Result};
use crate::resources::{OwnerHandle, OwnerLiveness, Payload};
use crate::time::Timestamp;

/// Eviction policy of a record, fixed at first load
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadKind {
    /// Reclaimed by the periodic sweep once unused
    #[default]
    Normal,
    /// Only reclaimed by an explicit scene-boundary unload
    Preload,
    /// Never reclaimed
    Permanent,
}

/// State shared by asset and bundle records
#[derive(Clone, Debug)]
pub struct RecordCore {
    path: String,
    load_kind: LoadKind,
    ready: bool,
    ref_count: u32,
    owners: SmallVec<[OwnerHandle; 2]>,
    last_used_at: Timestamp,
    payload: Option<Payload>,
}

impl RecordCore {
    pub fn new(path: impl Into<String>, load_kind: LoadKind, now: Timestamp) -> Self {
        Self {
            path: path.into(),
            load_kind,
            ready: false,
            ref_count: 0,
            owners: SmallVec::new(),
            last_used_at: now,
            payload: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn load_kind(&self) -> LoadKind {
        self.load_kind
    }

    /// Load has settled (successfully or not)
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Settled with a usable payload
    pub fn is_loaded(&self) -> bool {
        self.ready && self.payload.is_some()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn last_used_at(&self) -> Timestamp {
        self.last_used_at
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Owner entries, including ones not yet pruned
    pub fn owners(&self) -> &[OwnerHandle] {
        &self.owners
    }

    pub fn retain(&mut self) {
        self.ref_count += 1;
    }

    /// Decrement, clamped at zero. Returns whether the count actually dropped.
    pub fn release(&mut self) -> bool {
        if self.ref_count == 0 {
            return false;
        }
        self.ref_count -= 1;
        true
    }

    /// Add a liveness entry. Duplicate owners are a no-op (returns `false`).
    pub fn retain_owner(&mut self, owner: OwnerHandle) -> Result<bool> {
        if owner.is_null() {
            return Err(ResourceError::InvalidOwner(format!(
                "null owner bound to {}",
                self.path
            )));
        }
        if self.owners.contains(&owner) {
            return Ok(false);
        }
        self.owners.push(owner);
        Ok(true)
    }

    /// Remove a liveness entry; `false` if the owner was not bound
    pub fn release_owner(&mut self, owner: OwnerHandle) -> bool {
        match self.owners.iter().position(|o| *o == owner) {
            Some(index) => {
                self.owners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Prune dead owners in place and return the survivors.
    ///
    /// This is the only place liveness is re-checked.
    pub fn live_owner_count(&mut self, liveness: &dyn OwnerLiveness) -> usize {
        self.owners.retain(|owner| liveness.is_alive(*owner));
        self.owners.len()
    }

    /// `ready ∧ ref_count == 0 ∧ no live owners`
    pub fn is_unused(&mut self, liveness: &dyn OwnerLiveness) -> bool {
        self.ready && self.ref_count == 0 && self.live_owner_count(liveness) == 0
    }

    /// Unused and `Normal`
    pub fn is_evictable(&mut self, liveness: &dyn OwnerLiveness) -> bool {
        self.load_kind == LoadKind::Normal && self.is_unused(liveness)
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_used_at = now;
    }

    /// Publish the outcome of a load. A `None` payload is a failed load that
    /// is still reclaimable.
    pub(crate) fn settle(&mut self, payload: Option<Payload>) {
        self.payload = payload;
        self.ready = true;
    }

    /// Back to "not loaded" ahead of a retry; counts and owners survive
    pub(crate) fn reset_for_reload(&mut self) {
        self.ready = false;
        self.payload = None;
    }

    pub(crate) fn take_payload(&mut self) -> Option<Payload> {
        self.ready = false;
        self.payload.take()
    }
}

/// Common read access to asset and bundle records
pub trait Record {
    fn core(&self) -> &RecordCore;

    fn core_mut(&mut self) -> &mut RecordCore;

    fn path(&self) -> &str {
        self.core().path()
    }

    fn load_kind(&self) -> LoadKind {
        self.core().load_kind()
    }

    fn is_ready(&self) -> bool {
        self.core().is_ready()
    }

    fn ref_count(&self) -> u32 {
        self.core().ref_count()
    }

    fn last_used_at(&self) -> Timestamp {
        self.core().last_used_at()
    }

    fn payload(&self) -> Option<&Payload> {
        self.core().payload()
    }

    fn live_owner_count(&mut self, liveness: &dyn OwnerLiveness) -> usize {
        self.core_mut().live_owner_count(liveness)
    }
}
