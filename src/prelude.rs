//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use bundle_cache::prelude::*;
//! ```

pub use crate::config::ResourceConfig;
pub use crate::error::{ResourceError, Result};
pub use crate::io::{ByteLoader, ChannelLoad, LoadMethod, LoadPublisher, PendingLoad, ReadyLoad};
pub use crate::loader::{Completion, ResourceKind, TaskState};
pub use crate::manifest::{DependencyManifest, StaticManifest};
pub use crate::module::{RecordSummary, ResourceModule, Ticket, TickReport};
pub use crate::resources::{
    LoadKind, OwnerHandle, OwnerLiveness, OwnerRegistry, OwnerToken, Payload, RecordId, RequestId,
};
