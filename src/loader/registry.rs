//! Loader registry and frame scheduler.
//!
//! The registry is the single source of truth for in-flight work:
//! - `(kind, path) -> task`, so concurrent requesters share one task
//! - `request id -> task`, so cancellation can find the subscriber
//! - a FIFO of async tasks waiting to start, drained under a per-tick budget
//! - the tasks whose physical op is still pending
//!
//! A task leaves every map at once in [`LoaderRegistry::retire`].

use std::collections::VecDeque;
use std::task::Poll;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::error::{ResourceError, Result};
use crate::loader::{LoadTask, ResourceKind, Subscriber, TaskId, TaskState};
use crate::resources::{Payload, RequestId};

/// Per-tick scheduling allowance: a task count and a wall-time ceiling
#[derive(Clone, Debug)]
pub struct TickBudget {
    started: Instant,
    advanced: usize,
    max_tasks: usize,
    max_time: Duration,
}

impl TickBudget {
    pub fn new(max_tasks: usize, max_time: Duration) -> Self {
        Self {
            started: Instant::now(),
            advanced: 0,
            max_tasks,
            max_time,
        }
    }

    pub fn advanced(&self) -> usize {
        self.advanced
    }

    pub fn exhausted(&self) -> bool {
        self.advanced >= self.max_tasks || self.started.elapsed() >= self.max_time
    }
}

/// In-flight task bookkeeping
#[derive(Default)]
pub struct LoaderRegistry {
    tasks: SlotMap<TaskId, LoadTask>,
    by_path: AHashMap<(ResourceKind, String), TaskId>,
    requests: FxHashMap<RequestId, TaskId>,
    waiting: VecDeque<TaskId>,
    in_flight: Vec<TaskId>,
    last_request_id: u64,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic, never reused within the registry's lifetime
    pub fn next_request_id(&mut self) -> RequestId {
        self.last_request_id += 1;
        RequestId::new(self.last_request_id)
    }

    pub fn task(&self, id: TaskId) -> Option<&LoadTask> {
        self.tasks.get(id)
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Option<&mut LoadTask> {
        self.tasks.get_mut(id)
    }

    /// Live (non-terminal) task for a path
    pub fn find(&self, kind: ResourceKind, path: &str) -> Option<TaskId> {
        self.by_path
            .get(&(kind, path.to_string()))
            .copied()
            .filter(|id| {
                self.tasks
                    .get(*id)
                    .is_some_and(|task| !task.state().is_terminal())
            })
    }

    pub fn state_of(&self, kind: ResourceKind, path: &str) -> Option<TaskState> {
        self.find(kind, path)
            .and_then(|id| self.tasks.get(id))
            .map(LoadTask::state)
    }

    /// Task owning a request id, if the request is still pending
    pub fn task_for_request(&self, request: RequestId) -> Option<TaskId> {
        self.requests.get(&request).copied()
    }

    pub(crate) fn insert(&mut self, task: LoadTask) -> TaskId {
        let key = (task.kind(), task.path().to_string());
        let id = self.tasks.insert(task);
        if let Some(stale) = self.by_path.insert(key, id) {
            tracing::error!(?stale, "replaced a live task entry");
        }
        id
    }

    /// Attach a subscriber under a fresh request id. Reattaching revives a
    /// logically cancelled task.
    pub(crate) fn attach(&mut self, id: TaskId, subscriber: Subscriber) -> Result<RequestId> {
        let request = self.next_request_id();
        self.attach_with(id, request, subscriber)?;
        Ok(request)
    }

    pub(crate) fn attach_with(
        &mut self,
        id: TaskId,
        request: RequestId,
        subscriber: Subscriber,
    ) -> Result<()> {
        let Some(task) = self.tasks.get_mut(id) else {
            return Err(ResourceError::UnknownRequestId(request));
        };
        if task.pending.contains_key(&request) || self.requests.contains_key(&request) {
            tracing::error!(%request, path = %task.path, "request id registered twice");
            return Err(ResourceError::DuplicateRegistration(format!(
                "request {request} on {}",
                task.path
            )));
        }
        task.pending.insert(request, subscriber);
        task.revive();
        self.requests.insert(request, id);
        Ok(())
    }

    /// Withdraw one request. Returns the task and whether it was left with
    /// no subscribers (logical cancel).
    pub(crate) fn withdraw(&mut self, request: RequestId) -> Result<(TaskId, bool)> {
        let Some(id) = self.requests.remove(&request) else {
            return Err(ResourceError::UnknownRequestId(request));
        };
        let Some(task) = self.tasks.get_mut(id) else {
            return Err(ResourceError::UnknownRequestId(request));
        };
        task.pending.remove(&request);
        let orphaned = task.pending.is_empty() && !task.state().is_terminal();
        if orphaned {
            task.transition(TaskState::Cancelled);
        }
        Ok((id, orphaned))
    }

    /// Remove a finished task from every map
    pub(crate) fn retire(&mut self, id: TaskId) -> Option<LoadTask> {
        let task = self.tasks.remove(id)?;
        let key = (task.kind(), task.path().to_string());
        if self.by_path.get(&key) == Some(&id) {
            self.by_path.remove(&key);
        }
        for request in task.pending.keys() {
            self.requests.remove(request);
        }
        self.waiting.retain(|t| *t != id);
        self.in_flight.retain(|t| *t != id);
        Some(task)
    }

    pub(crate) fn enqueue(&mut self, id: TaskId) {
        self.waiting.push_back(id);
    }

    /// Pull a task out of the waiting queue (immediate-mode upgrade)
    pub(crate) fn dequeue(&mut self, id: TaskId) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|t| *t != id);
        before != self.waiting.len()
    }

    pub(crate) fn track_in_flight(&mut self, id: TaskId) {
        if !self.in_flight.contains(&id) {
            self.in_flight.push(id);
        }
    }

    /// Next waiting task to start, or `None` once the budget is spent.
    ///
    /// Entries for tasks that already started (upgraded to sync) or were
    /// retired are skipped without counting against the budget.
    pub(crate) fn next_scheduled(&mut self, budget: &mut TickBudget) -> Option<TaskId> {
        while !budget.exhausted() {
            let id = self.waiting.pop_front()?;
            match self.tasks.get(id) {
                Some(task) if !task.started => {
                    budget.advanced += 1;
                    return Some(id);
                }
                _ => continue,
            }
        }
        None
    }

    /// Poll every pending physical op once and hand back the resolved ones
    pub(crate) fn poll_in_flight(&mut self) -> Vec<(TaskId, Result<Payload>)> {
        let mut resolved = Vec::new();
        let tasks = &mut self.tasks;
        self.in_flight.retain(|id| {
            let Some(task) = tasks.get_mut(*id) else {
                return false;
            };
            let Some(op) = task.op.as_mut() else {
                return false;
            };
            match op.poll() {
                Poll::Ready(result) => {
                    task.op = None;
                    resolved.push((*id, result));
                    false
                }
                Poll::Pending => true,
            }
        });
        resolved
    }

    /// No task alive, so nothing is waiting or loading
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending_request_count(&self) -> usize {
        self.requests.len()
    }
}
