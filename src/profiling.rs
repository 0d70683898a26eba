//! # Profiling
//!
//! With the `profiling` feature, `run_tick`, the scheduler pass and the
//! eviction sweeps open `tracing` spans:
//!
//! - `resources.run_tick` - one per tick
//! - `loader.schedule` - starting queued tasks (field: `waiting`)
//! - `resources.sweep` / `resources.full_sweep` - eviction passes
//!
//! Enable it in your Cargo.toml:
//!
//! ```toml
//! [dependencies]
//! bundle_cache = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! Any `tracing` subscriber collects them. [`init_file_tracing`] installs a
//! JSON subscriber writing to a file through a non-blocking appender:
//!
//! ```ignore
//! let _guard = bundle_cache::profiling::init_file_tracing("trace.json")?;
//! // keep `_guard` alive until the end of the run, it flushes on drop
//! ```
//!
//! Without the feature, set `ResourceConfig::verbose_logging` and use
//! `RUST_LOG=bundle_cache=debug` with your own subscriber to see per-request
//! lines.

#[cfg(feature = "profiling")]
pub use tracing_appender::non_blocking::WorkerGuard;

/// Install a global JSON subscriber writing every event at `TRACE` and
/// above to `path`.
#[cfg(feature = "profiling")]
pub fn init_file_tracing(
    path: impl AsRef<std::path::Path>,
) -> crate::error::Result<WorkerGuard> {
    use crate::error::ResourceError;

    let file = std::fs::File::create(path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .try_init()
        .map_err(|err| ResourceError::Config(format!("tracing subscriber: {err}")))?;
    Ok(guard)
}
