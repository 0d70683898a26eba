//! Requests, cancellation and caller-side accounting.
//!
//! A request only guarantees the record gets loaded; it does not keep it
//! alive. Callers that hold on to a payload take a reference with
//! `acquire_*` (counted) or `bind_*` (owner liveness) once the completion
//! arrives, and give it back with `release_*` / `unbind_*`.

use crossbeam::channel::{self, Sender};
use tracing::warn;

use crate::error::Result;
use crate::io::LoadMethod;
use crate::loader::{Completion, Subscriber};
use crate::module::{ResourceModule, Ticket};
use crate::resources::{
    AssetId, BundleId, LoadKind, OwnerHandle, Payload, Record, RecordId, RequestId,
};

impl ResourceModule {
    /// Request an asset. With [`LoadMethod::Sync`] the ticket is already
    /// settled when this returns.
    ///
    /// Fails without side effects if the manifest has no owning bundle for
    /// `path`, or if the asset is registered under a different bundle.
    pub fn request_asset(
        &mut self,
        path: &str,
        asset_type: &str,
        kind: LoadKind,
        method: LoadMethod,
    ) -> Result<Ticket> {
        let (sender, receiver) = channel::unbounded();
        let id = self.request_asset_into(path, asset_type, kind, method, sender)?;
        Ok(Ticket::new(id, receiver))
    }

    /// [`ResourceModule::request_asset`] delivering into a shared sink
    pub fn request_asset_into(
        &mut self,
        path: &str,
        asset_type: &str,
        kind: LoadKind,
        method: LoadMethod,
        sink: Sender<Completion>,
    ) -> Result<RequestId> {
        let path = self.normalize(path).into_owned();
        let mut ctx = self.context();
        let request = ctx.request_asset(&path, asset_type, kind, method, Subscriber::External(sink));
        ctx.drain();
        request
    }

    /// Request a bundle (and, transitively, its dependencies)
    pub fn request_bundle(
        &mut self,
        path: &str,
        kind: LoadKind,
        method: LoadMethod,
    ) -> Result<Ticket> {
        let (sender, receiver) = channel::unbounded();
        let id = self.request_bundle_into(path, kind, method, sender)?;
        Ok(Ticket::new(id, receiver))
    }

    /// [`ResourceModule::request_bundle`] delivering into a shared sink
    pub fn request_bundle_into(
        &mut self,
        path: &str,
        kind: LoadKind,
        method: LoadMethod,
        sink: Sender<Completion>,
    ) -> Result<RequestId> {
        let path = self.normalize(path).into_owned();
        let mut ctx = self.context();
        let request = ctx.request_bundle(&path, kind, method, Subscriber::External(sink));
        ctx.drain();
        request
    }

    /// Withdraw one request. Returns `false` for ids that already completed,
    /// were already cancelled, or were never issued.
    ///
    /// Withdrawing the last request logically cancels the task; the physical
    /// load still runs to completion and populates the record.
    pub fn cancel_request(&mut self, request: RequestId) -> bool {
        match self.context().cancel(request) {
            Ok(_) => true,
            Err(err) => {
                warn!(%request, %err, "cancel rejected");
                false
            }
        }
    }

    pub fn asset_id(&self, path: &str) -> Option<AssetId> {
        self.records.asset_id(&self.normalize(path))
    }

    pub fn bundle_id(&self, path: &str) -> Option<BundleId> {
        self.records.bundle_id(&self.normalize(path))
    }

    /// Loaded payload of an asset, without taking a reference
    pub fn asset_payload(&self, path: &str) -> Option<Payload> {
        self.records
            .asset_by_path(&self.normalize(path))
            .and_then(|asset| asset.payload().cloned())
    }

    /// Loaded payload of a bundle, without taking a reference
    pub fn bundle_payload(&self, path: &str) -> Option<Payload> {
        self.records
            .bundle_by_path(&self.normalize(path))
            .and_then(|bundle| bundle.payload().cloned())
    }

    /// Retain a loaded asset (cascading to its bundle) and return it
    pub fn acquire_asset(&mut self, path: &str) -> Option<Payload> {
        let id = self.asset_id(path)?;
        self.acquire(RecordId::Asset(id))
    }

    /// Retain a loaded bundle and return it
    pub fn acquire_bundle(&mut self, path: &str) -> Option<Payload> {
        let id = self.bundle_id(path)?;
        self.acquire(RecordId::Bundle(id))
    }

    /// Bind `owner` to a loaded asset and return it
    pub fn bind_asset(&mut self, path: &str, owner: OwnerHandle) -> Result<Option<Payload>> {
        match self.asset_id(path) {
            Some(id) => self.bind(RecordId::Asset(id), owner),
            None => Ok(None),
        }
    }

    /// Bind `owner` to a loaded bundle and return it
    pub fn bind_bundle(&mut self, path: &str, owner: OwnerHandle) -> Result<Option<Payload>> {
        match self.bundle_id(path) {
            Some(id) => self.bind(RecordId::Bundle(id), owner),
            None => Ok(None),
        }
    }

    /// Give back one `acquire_asset` reference
    pub fn release_asset(&mut self, path: &str) -> bool {
        self.asset_id(path)
            .map(|id| self.release(RecordId::Asset(id)))
            .unwrap_or(false)
    }

    /// Give back one `acquire_bundle` reference
    pub fn release_bundle(&mut self, path: &str) -> bool {
        self.bundle_id(path)
            .map(|id| self.release(RecordId::Bundle(id)))
            .unwrap_or(false)
    }

    pub fn unbind_asset(&mut self, path: &str, owner: OwnerHandle) -> bool {
        self.asset_id(path)
            .map(|id| self.release_owner(RecordId::Asset(id), owner))
            .unwrap_or(false)
    }

    pub fn unbind_bundle(&mut self, path: &str, owner: OwnerHandle) -> bool {
        self.bundle_id(path)
            .map(|id| self.release_owner(RecordId::Bundle(id), owner))
            .unwrap_or(false)
    }

    /// Explicit `retain()`; asset records cascade to their bundle
    pub fn retain(&mut self, record: RecordId) -> bool {
        self.records.retain(record)
    }

    /// Explicit `release()`, clamped at zero. Returns whether the count
    /// dropped.
    pub fn release(&mut self, record: RecordId) -> bool {
        self.records.release(record)
    }

    /// Add a liveness entry. Duplicate owners are a no-op (`Ok(false)`);
    /// null owners and missing records are rejected.
    pub fn retain_owner(&mut self, record: RecordId, owner: OwnerHandle) -> Result<bool> {
        self.records.retain_owner(record, owner).map_err(|err| {
            warn!(?record, %err, "owner rejected");
            err
        })
    }

    /// Remove a liveness entry. Never touches `ref_count`.
    pub fn release_owner(&mut self, record: RecordId, owner: OwnerHandle) -> bool {
        self.records.release_owner(record, owner)
    }

    fn acquire(&mut self, record: RecordId) -> Option<Payload> {
        let payload = self.records.core(record)?.payload().cloned()?;
        self.records.retain(record);
        self.records.touch(record, self.clock.now());
        Some(payload)
    }

    fn bind(&mut self, record: RecordId, owner: OwnerHandle) -> Result<Option<Payload>> {
        let Some(payload) = self
            .records
            .core(record)
            .and_then(|core| core.payload().cloned())
        else {
            return Ok(None);
        };
        self.retain_owner(record, owner)?;
        self.records.touch(record, self.clock.now());
        Ok(Some(payload))
    }
}
