//! Load statistics and per-path load analysis.
//!
//! Aggregate counters are always collected. Per-path analysis (how often a
//! path was loaded and unloaded, and when) is opt-in through
//! `ResourceConfig::analysis_enabled`; it is the tool for spotting thrash,
//! i.e. a bundle that keeps getting evicted and reloaded.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::loader::ResourceKind;
use crate::time::Timestamp;

/// Aggregate counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// External requests issued
    pub requests: u64,
    /// Requests answered from an already-loaded record
    pub cache_hits: u64,
    /// Calls into the byte loader
    pub byte_loads: u64,
    /// Loads that settled without payload
    pub failures: u64,
    /// Bundles reclaimed by any sweep
    pub evictions: u64,
    /// Requests withdrawn
    pub cancellations: u64,
}

/// Load history of one path
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PathAnalysis {
    pub kind: ResourceKind,
    pub byte_loads: u32,
    pub loads: u32,
    pub unloads: u32,
    pub first_loaded_at_secs: Option<f64>,
    pub last_unloaded_at_secs: Option<f64>,
}

impl PathAnalysis {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            byte_loads: 0,
            loads: 0,
            unloads: 0,
            first_loaded_at_secs: None,
            last_unloaded_at_secs: None,
        }
    }
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    totals: &'a StatsSnapshot,
    paths: &'a BTreeMap<String, PathAnalysis>,
}

/// Counters plus optional per-path analysis
#[derive(Clone, Debug, Default)]
pub struct LoadStats {
    totals: StatsSnapshot,
    analysis_enabled: bool,
    paths: BTreeMap<String, PathAnalysis>,
}

impl LoadStats {
    pub fn new(analysis_enabled: bool) -> Self {
        Self {
            analysis_enabled,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.totals
    }

    pub fn analysis_enabled(&self) -> bool {
        self.analysis_enabled
    }

    /// Toggle per-path analysis; turning it off drops collected history
    pub fn set_analysis_enabled(&mut self, enabled: bool) {
        self.analysis_enabled = enabled;
        if !enabled {
            self.paths.clear();
        }
    }

    pub fn analysis(&self, path: &str) -> Option<&PathAnalysis> {
        self.paths.get(path)
    }

    /// Pretty JSON report of totals and per-path history
    pub fn report_json(&self) -> Result<String> {
        let report = AnalysisReport {
            totals: &self.totals,
            paths: &self.paths,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub(crate) fn record_request(&mut self) {
        self.totals.requests += 1;
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.totals.cache_hits += 1;
    }

    pub(crate) fn record_cancel(&mut self) {
        self.totals.cancellations += 1;
    }

    pub(crate) fn record_byte_load(&mut self, kind: ResourceKind, path: &str) {
        self.totals.byte_loads += 1;
        if let Some(entry) = self.entry(kind, path) {
            entry.byte_loads += 1;
        }
    }

    pub(crate) fn record_load(
        &mut self,
        kind: ResourceKind,
        path: &str,
        success: bool,
        now: Timestamp,
    ) {
        if !success {
            self.totals.failures += 1;
            return;
        }
        if let Some(entry) = self.entry(kind, path) {
            entry.loads += 1;
            entry
                .first_loaded_at_secs
                .get_or_insert(now.as_secs_f64());
        }
    }

    pub(crate) fn record_unload(&mut self, path: &str, now: Timestamp) {
        self.totals.evictions += 1;
        if let Some(entry) = self.entry(ResourceKind::Bundle, path) {
            entry.unloads += 1;
            entry.last_unloaded_at_secs = Some(now.as_secs_f64());
        }
    }

    fn entry(&mut self, kind: ResourceKind, path: &str) -> Option<&mut PathAnalysis> {
        if !self.analysis_enabled {
            return None;
        }
        Some(
            self.paths
                .entry(path.to_string())
                .or_insert_with(|| PathAnalysis::new(kind)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counters_without_analysis() {
        let mut stats = LoadStats::new(false);
        stats.record_request();
        stats.record_byte_load(ResourceKind::Bundle, "b1");
        stats.record_load(ResourceKind::Bundle, "b1", false, Duration::ZERO);
        assert_eq!(stats.snapshot().requests, 1);
        assert_eq!(stats.snapshot().byte_loads, 1);
        assert_eq!(stats.snapshot().failures, 1);
        assert!(stats.analysis("b1").is_none());
    }

    #[test]
    fn test_path_analysis_tracks_reloads() {
        let mut stats = LoadStats::new(true);
        stats.record_load(ResourceKind::Bundle, "ui", true, Duration::from_secs(1));
        stats.record_unload("ui", Duration::from_secs(50));
        stats.record_load(ResourceKind::Bundle, "ui", true, Duration::from_secs(51));

        let entry = stats.analysis("ui").unwrap();
        assert_eq!(entry.loads, 2);
        assert_eq!(entry.unloads, 1);
        assert_eq!(entry.first_loaded_at_secs, Some(1.0));
        assert_eq!(entry.last_unloaded_at_secs, Some(50.0));
    }

    #[test]
    fn test_report_json() {
        let mut stats = LoadStats::new(true);
        stats.record_request();
        stats.record_load(ResourceKind::Asset, "a.png", true, Duration::ZERO);
        let report: serde_json::Value = serde_json::from_str(&stats.report_json().unwrap()).unwrap();
        assert_eq!(report["totals"]["requests"], 1);
        assert_eq!(report["paths"]["a.png"]["kind"], "Asset");
    }
}
