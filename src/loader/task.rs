use std::collections::BTreeMap;
use std::fmt;

use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::error::Result;
use crate::io::{LoadMethod, PendingLoad};
use crate::loader::asset_task::AssetTask;
use crate::loader::bundle_task::BundleTask;
use crate::resources::{LoadKind, Payload, RequestId};

new_key_type! {
    /// Key of an in-flight load task
    pub struct TaskId;
}

/// Load task lifecycle.
///
/// `None -> Waiting -> Loading -> Complete | Error`. `Cancelled` is logical:
/// the physical load keeps running and its result still lands in the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    None,
    Waiting,
    Loading,
    Complete,
    Error,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Error)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::None => "none",
            TaskState::Waiting => "waiting",
            TaskState::Loading => "loading",
            TaskState::Complete => "complete",
            TaskState::Error => "error",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Which record family a path names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Asset,
    Bundle,
}

/// Outcome delivered to one request
#[derive(Clone, Debug)]
pub struct Completion {
    pub request_id: RequestId,
    pub kind: ResourceKind,
    pub path: String,
    /// Final state of the task that served the request
    pub state: TaskState,
    /// Payload, or the failure marker (`LoadFailure`)
    pub result: Result<Payload>,
}

impl Completion {
    pub fn payload(&self) -> Option<&Payload> {
        self.result.as_ref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Whoever is waiting on a task
pub(crate) enum Subscriber {
    /// A caller outside the cache
    External(Sender<Completion>),
    /// Another task (asset waiting on its bundle, bundle on a dependency)
    Task(TaskId),
}

impl Subscriber {
    pub(crate) fn is_external(&self) -> bool {
        matches!(self, Subscriber::External(_))
    }
}

pub(crate) enum TaskDetail {
    Asset(AssetTask),
    Bundle(BundleTask),
}

/// One in-flight load shared by every requester of the same path
pub struct LoadTask {
    pub(crate) path: String,
    pub(crate) method: LoadMethod,
    pub(crate) load_kind: LoadKind,
    pub(crate) state: TaskState,
    /// `do_load` has run; survives a logical cancel
    pub(crate) started: bool,
    /// Ordered by request id, i.e. registration order
    pub(crate) pending: BTreeMap<RequestId, Subscriber>,
    /// Physical op awaiting its result (async only)
    pub(crate) op: Option<Box<dyn PendingLoad>>,
    pub(crate) detail: TaskDetail,
}

impl LoadTask {
    pub(crate) fn new(
        path: impl Into<String>,
        method: LoadMethod,
        load_kind: LoadKind,
        detail: TaskDetail,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            load_kind,
            state: TaskState::None,
            started: false,
            pending: BTreeMap::new(),
            op: None,
            detail,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> LoadMethod {
        self.method
    }

    pub fn load_kind(&self) -> LoadKind {
        self.load_kind
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn kind(&self) -> ResourceKind {
        match self.detail {
            TaskDetail::Asset(_) => ResourceKind::Asset,
            TaskDetail::Bundle(_) => ResourceKind::Bundle,
        }
    }

    /// Request ids still attached, in fan-out order
    pub fn pending_requests(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.pending.keys().copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of external callers still attached
    pub fn external_count(&self) -> usize {
        self.pending.values().filter(|s| s.is_external()).count()
    }

    pub(crate) fn transition(&mut self, next: TaskState) {
        tracing::trace!(path = %self.path, from = %self.state, to = %next, "task state");
        self.state = next;
    }

    /// Enter `Loading`; a cancelled task keeps its logical state
    pub(crate) fn begin(&mut self) {
        self.started = true;
        if self.state != TaskState::Cancelled {
            self.transition(TaskState::Loading);
        }
    }

    /// Final state for a settled load. Cancelled tasks stay cancelled.
    pub(crate) fn conclude(&mut self, success: bool) {
        if self.state == TaskState::Cancelled {
            return;
        }
        self.transition(if success {
            TaskState::Complete
        } else {
            TaskState::Error
        });
    }

    /// A new request revives a logically cancelled task
    pub(crate) fn revive(&mut self) {
        if self.state == TaskState::Cancelled {
            let resumed = if self.started {
                TaskState::Loading
            } else {
                TaskState::Waiting
            };
            self.transition(resumed);
        }
    }
}

impl fmt::Debug for LoadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTask")
            .field("path", &self.path)
            .field("kind", &self.kind())
            .field("method", &self.method)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("op", &self.op.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_task() -> LoadTask {
        LoadTask::new(
            "b1",
            LoadMethod::Async,
            LoadKind::Normal,
            TaskDetail::Bundle(BundleTask::new(Default::default(), Vec::new())),
        )
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Complete.is_terminal());
        assert!(TaskState::Error.is_terminal());
        assert!(!TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Loading.is_terminal());
    }

    #[test]
    fn test_cancelled_task_keeps_state_on_conclude() {
        let mut task = bundle_task();
        task.transition(TaskState::Waiting);
        task.begin();
        assert_eq!(task.state(), TaskState::Loading);

        task.transition(TaskState::Cancelled);
        task.conclude(true);
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_revive_resumes_previous_phase() {
        let mut task = bundle_task();
        task.transition(TaskState::Cancelled);
        task.revive();
        assert_eq!(task.state(), TaskState::Waiting);

        task.begin();
        task.transition(TaskState::Cancelled);
        task.revive();
        assert_eq!(task.state(), TaskState::Loading);
        assert_eq!(task.kind(), ResourceKind::Bundle);
    }
}
