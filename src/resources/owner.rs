//! Owner liveness tracking.
//!
//! An owner is an external object (a UI widget bound to a sprite, a spawned
//! model) whose continued existence keeps a resource alive without going
//! through explicit retain/release. Records only store [`OwnerHandle`]s; a
//! host-provided [`OwnerLiveness`] answers whether a handle is still alive.

use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::Mutex;

/// Stable identity of an external owner. Zero is the null handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerHandle(u64);

impl OwnerHandle {
    pub const NULL: OwnerHandle = OwnerHandle(0);

    /// Wrap a host-side identity (entity id, widget id, ...)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Liveness oracle queried lazily by the sweep
pub trait OwnerLiveness {
    fn is_alive(&self, owner: OwnerHandle) -> bool;
}

impl<F> OwnerLiveness for F
where
    F: Fn(OwnerHandle) -> bool,
{
    fn is_alive(&self, owner: OwnerHandle) -> bool {
        self(owner)
    }
}

#[derive(Default)]
struct OwnerTable {
    next: u64,
    alive: AHashSet<u64>,
}

/// Ready-made liveness registry.
///
/// [`OwnerRegistry::spawn`] hands out an [`OwnerToken`]; the owner counts as
/// alive until the token is dropped or [`OwnerRegistry::kill`] is called. The
/// registry is cheap to clone and may be shared with other threads.
#[derive(Clone, Default)]
pub struct OwnerRegistry {
    inner: Arc<Mutex<OwnerTable>>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live owner
    pub fn spawn(&self) -> OwnerToken {
        let mut table = self.inner.lock();
        table.next += 1;
        let raw = table.next;
        table.alive.insert(raw);
        OwnerToken {
            handle: OwnerHandle(raw),
            registry: self.clone(),
        }
    }

    /// Mark an owner dead; returns false if it was not alive
    pub fn kill(&self, owner: OwnerHandle) -> bool {
        self.inner.lock().alive.remove(&owner.0)
    }

    pub fn alive_count(&self) -> usize {
        self.inner.lock().alive.len()
    }
}

impl OwnerLiveness for OwnerRegistry {
    fn is_alive(&self, owner: OwnerHandle) -> bool {
        self.inner.lock().alive.contains(&owner.0)
    }
}

/// Guard for a registered owner; dropping it kills the owner
pub struct OwnerToken {
    handle: OwnerHandle,
    registry: OwnerRegistry,
}

impl OwnerToken {
    pub fn handle(&self) -> OwnerHandle {
        self.handle
    }
}

impl Drop for OwnerToken {
    fn drop(&mut self) {
        self.registry.kill(self.handle);
    }
}
