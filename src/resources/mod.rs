//! Record model: ids, payloads, owner liveness and the record store

pub mod asset;
pub mod bundle;
pub mod handle;
pub mod owner;
pub mod record;
pub mod store;

pub use asset::{asset_name_of, AssetRecord};
pub use bundle::BundleRecord;
pub use handle::{AssetId, BundleId, Payload, RecordId, RequestId};
pub use owner::{OwnerHandle, OwnerLiveness, OwnerRegistry, OwnerToken};
pub use record::{LoadKind, Record, RecordCore};
pub use store::RecordStore;
