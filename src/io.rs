//! Byte-load primitive boundary.
//!
//! The cache never touches files itself. A host supplies a [`ByteLoader`]
//! that opens bundles and extracts assets, handing back a [`PendingLoad`] per
//! call. Sync calls are waited on immediately; async ones are polled once per
//! tick until they resolve.
//!
//! Loaders that do real work on background threads publish their result
//! through a [`ChannelLoad`]: the worker sends on a crossbeam channel and the
//! cache picks the value up on its own thread, so record maps are only ever
//! mutated during tick processing.

use std::fmt;
use std::task::Poll;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::error::{ResourceError, Result};
use crate::resources::Payload;

/// How a load is driven
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadMethod {
    /// Blocks the caller until the record is ready or failed
    Sync,
    /// Deferred across ticks by the scheduler
    #[default]
    Async,
}

impl fmt::Display for LoadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMethod::Sync => write!(f, "sync"),
            LoadMethod::Async => write!(f, "async"),
        }
    }
}

/// A physical load in progress. Not preemptible: once started it runs to
/// completion even if every requester has gone away.
pub trait PendingLoad: Send {
    /// Non-blocking check, called once per tick
    fn poll(&mut self) -> Poll<Result<Payload>>;

    /// Block until the result is available (immediate-mode upgrade)
    fn wait(self: Box<Self>) -> Result<Payload>;
}

/// Already-resolved load
pub struct ReadyLoad {
    result: Option<Result<Payload>>,
}

impl ReadyLoad {
    pub fn new(result: Result<Payload>) -> Self {
        Self {
            result: Some(result),
        }
    }

    pub fn ok(payload: Payload) -> Self {
        Self::new(Ok(payload))
    }

    pub fn failed(path: &str, reason: impl Into<String>) -> Self {
        Self::new(Err(ResourceError::load_failure(path, reason)))
    }

    fn take(&mut self) -> Result<Payload> {
        self.result
            .take()
            .unwrap_or_else(|| Err(ResourceError::load_failure("", "result already consumed")))
    }
}

impl PendingLoad for ReadyLoad {
    fn poll(&mut self) -> Poll<Result<Payload>> {
        Poll::Ready(self.take())
    }

    fn wait(mut self: Box<Self>) -> Result<Payload> {
        self.take()
    }
}

/// Receiving half of a cross-thread load
pub struct ChannelLoad {
    path: String,
    receiver: Receiver<Result<Payload>>,
}

/// Sending half handed to the worker
pub struct LoadPublisher {
    sender: Sender<Result<Payload>>,
}

impl LoadPublisher {
    /// Publish the outcome; a dropped receiver is ignored
    pub fn publish(self, result: Result<Payload>) {
        let _ = self.sender.send(result);
    }
}

impl ChannelLoad {
    pub fn new(path: impl Into<String>) -> (LoadPublisher, ChannelLoad) {
        let (sender, receiver) = channel::bounded(1);
        (
            LoadPublisher { sender },
            ChannelLoad {
                path: path.into(),
                receiver,
            },
        )
    }

    /// Run `work` on a fresh thread and publish its result
    pub fn spawn<F>(path: impl Into<String>, work: F) -> ChannelLoad
    where
        F: FnOnce() -> Result<Payload> + Send + 'static,
    {
        let (publisher, load) = ChannelLoad::new(path);
        thread::spawn(move || publisher.publish(work()));
        load
    }

    fn abandoned(&self) -> ResourceError {
        ResourceError::load_failure(&self.path, "worker dropped without publishing")
    }
}

impl PendingLoad for ChannelLoad {
    fn poll(&mut self) -> Poll<Result<Payload>> {
        match self.receiver.try_recv() {
            Ok(result) => Poll::Ready(result),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => Poll::Ready(Err(self.abandoned())),
        }
    }

    fn wait(self: Box<Self>) -> Result<Payload> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(self.abandoned()),
        }
    }
}

/// Host-provided primitive that turns paths into engine objects
pub trait ByteLoader {
    /// Open a bundle's bytes
    fn load_bundle(&mut self, path: &str, method: LoadMethod) -> Box<dyn PendingLoad>;

    /// Extract one asset from an opened bundle
    fn load_asset(
        &mut self,
        bundle: &Payload,
        asset_name: &str,
        asset_type: &str,
        method: LoadMethod,
    ) -> Box<dyn PendingLoad>;

    /// Disposal hook for an evicted bundle
    fn unload_bundle(&mut self, _path: &str, _payload: Payload) {}
}
