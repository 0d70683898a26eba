//! Cache tuning knobs.
//!
//! All throttles of the scheduler and the eviction sweep live here so a host
//! can ship per-device presets as JSON:
//!
//! ```
//! use bundle_cache::config::ResourceConfig;
//!
//! let config = ResourceConfig::from_json(r#"{ "max_tasks_per_tick": 8 }"#).unwrap();
//! assert_eq!(config.max_tasks_per_tick, 8);
//! assert_eq!(config.max_evictions_per_sweep, 5);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};

/// Scheduler and sweep configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Max async tasks started per tick
    pub max_tasks_per_tick: usize,
    /// Wall-time ceiling for one scheduler pass, in milliseconds
    pub max_tick_budget_ms: u64,
    /// Master switch for the periodic sweep
    pub sweep_enabled: bool,
    /// Minimum time between two sweeps
    pub sweep_interval_secs: f32,
    /// Max bundles evicted per periodic sweep
    pub max_evictions_per_sweep: usize,
    /// Idle time a bundle must reach before it can be evicted
    pub min_bundle_lifetime_secs: f32,
    /// Sweeps are skipped while FPS is below this
    pub sweep_fps_threshold: f32,
    /// FPS sampling window used by `run_frame`
    pub fps_sample_interval_secs: f32,
    /// Lower-case request paths
    pub normalize_paths: bool,
    /// Collect per-path load/unload statistics
    pub analysis_enabled: bool,
    /// Emit per-request trace lines
    pub verbose_logging: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_tick: 5,
            max_tick_budget_ms: 50,
            sweep_enabled: true,
            sweep_interval_secs: 10.0,
            max_evictions_per_sweep: 5,
            min_bundle_lifetime_secs: 40.0,
            sweep_fps_threshold: 20.0,
            fps_sample_interval_secs: 1.0,
            normalize_paths: true,
            analysis_enabled: false,
            verbose_logging: false,
        }
    }
}

impl ResourceConfig {
    /// Parse a (possibly partial) JSON document; missing fields keep defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ResourceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file on disk
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject budgets that would stall the scheduler or nonsense durations
    pub fn validate(&self) -> Result<()> {
        if self.max_tasks_per_tick == 0 {
            return Err(ResourceError::Config(
                "max_tasks_per_tick must be at least 1".to_string(),
            ));
        }
        if self.max_tick_budget_ms == 0 {
            return Err(ResourceError::Config(
                "max_tick_budget_ms must be at least 1".to_string(),
            ));
        }
        let durations = [
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("min_bundle_lifetime_secs", self.min_bundle_lifetime_secs),
            ("sweep_fps_threshold", self.sweep_fps_threshold),
            ("fps_sample_interval_secs", self.fps_sample_interval_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ResourceError::Config(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        let spans = [
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("min_bundle_lifetime_secs", self.min_bundle_lifetime_secs),
            ("fps_sample_interval_secs", self.fps_sample_interval_secs),
        ];
        for (name, value) in spans {
            if let Err(err) = Duration::try_from_secs_f32(value) {
                return Err(ResourceError::Config(format!("{name} = {value}: {err}")));
            }
        }
        if self.fps_sample_interval_secs == 0.0 {
            return Err(ResourceError::Config(
                "fps_sample_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.max_tick_budget_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        seconds(self.sweep_interval_secs)
    }

    pub fn min_bundle_lifetime(&self) -> Duration {
        seconds(self.min_bundle_lifetime_secs)
    }

    pub fn fps_sample_interval(&self) -> Duration {
        seconds(self.fps_sample_interval_secs)
    }
}

/// Saturating conversion; fields are public and may be edited after validation
fn seconds(value: f32) -> Duration {
    if value.is_nan() || value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f32(value).unwrap_or(Duration::MAX)
    }
}
