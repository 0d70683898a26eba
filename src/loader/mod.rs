//! Load tasks and the registry that multiplexes them.
//!
//! Every path has at most one live [`LoadTask`]; concurrent requesters are
//! attached to it under their own [`RequestId`](crate::resources::RequestId)
//! and notified in registration order when it settles.

mod asset_task;
mod bundle_task;
pub(crate) mod context;
pub mod registry;
pub mod task;

pub(crate) use context::LoadContext;
pub use registry::{LoaderRegistry, TickBudget};
pub(crate) use task::{Subscriber, TaskDetail};
pub use task::{Completion, LoadTask, ResourceKind, TaskId, TaskState};
