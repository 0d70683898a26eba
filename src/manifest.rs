//! Dependency manifest boundary.
//!
//! The packaging pipeline records which bundle each asset lives in and which
//! bundles each bundle depends on. The cache only queries that information;
//! [`StaticManifest`] is an in-memory table for hosts that ship the manifest
//! as JSON (and for tests). Its keys are case-folded, matching the
//! lower-cased request paths the cache produces by default.

use std::borrow::Cow;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};

/// Read-only view of the build manifest
pub trait DependencyManifest {
    /// Bundle containing `asset_path`, if known
    fn resolve_owning_bundle(&self, asset_path: &str) -> Option<String>;

    /// Direct dependencies of `bundle_path` (must be cycle-free)
    fn resolve_dependencies(&self, bundle_path: &str) -> Vec<String>;
}

/// In-memory manifest table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticManifest {
    /// asset path -> owning bundle path
    assets: FxHashMap<String, String>,
    /// bundle path -> dependency bundle paths
    bundles: FxHashMap<String, Vec<String>>,
}

impl StaticManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticManifest::insert_asset`]
    pub fn with_asset(mut self, asset: &str, bundle: &str) -> Self {
        self.insert_asset(asset, bundle);
        self
    }

    /// Builder form of [`StaticManifest::insert_bundle`]
    pub fn with_bundle(mut self, bundle: &str, dependencies: &[&str]) -> Self {
        self.insert_bundle(bundle, dependencies.iter().map(|d| d.to_string()));
        self
    }

    pub fn insert_asset(&mut self, asset: &str, bundle: &str) {
        let bundle = fold(bundle).into_owned();
        self.bundles.entry(bundle.clone()).or_default();
        self.assets.insert(fold(asset).into_owned(), bundle);
    }

    pub fn insert_bundle(&mut self, bundle: &str, dependencies: impl IntoIterator<Item = String>) {
        let dependencies = dependencies
            .into_iter()
            .map(|d| fold(&d).into_owned())
            .collect();
        self.bundles.insert(fold(bundle).into_owned(), dependencies);
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Parse and validate a JSON manifest
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: StaticManifest = serde_json::from_str(json)?;
        let mut manifest = StaticManifest::new();
        for (bundle, dependencies) in parsed.bundles {
            manifest.insert_bundle(&bundle, dependencies);
        }
        for (asset, bundle) in parsed.assets {
            manifest.insert_asset(&asset, &bundle);
        }
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject dependency cycles. The error carries the offending chain,
    /// starting and ending at the same bundle.
    pub fn validate(&self) -> Result<()> {
        let mut finished: FxHashSet<&str> = FxHashSet::default();
        let mut names: Vec<&str> = self.bundles.keys().map(String::as_str).collect();
        names.sort_unstable();

        for root in names {
            if finished.contains(root) {
                continue;
            }
            let mut chain: Vec<&str> = Vec::new();
            self.visit(root, &mut chain, &mut finished)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        bundle: &'a str,
        chain: &mut Vec<&'a str>,
        finished: &mut FxHashSet<&'a str>,
    ) -> Result<()> {
        if let Some(start) = chain.iter().position(|b| *b == bundle) {
            let mut cycle: Vec<String> = chain[start..].iter().map(|b| b.to_string()).collect();
            cycle.push(bundle.to_string());
            return Err(ResourceError::DependencyCycle(cycle));
        }
        if finished.contains(bundle) {
            return Ok(());
        }

        chain.push(bundle);
        if let Some(dependencies) = self.bundles.get(bundle) {
            for dependency in dependencies {
                self.visit(dependency, chain, finished)?;
            }
        }
        chain.pop();
        finished.insert(bundle);
        Ok(())
    }
}

impl DependencyManifest for StaticManifest {
    fn resolve_owning_bundle(&self, asset_path: &str) -> Option<String> {
        self.assets.get(fold(asset_path).as_ref()).cloned()
    }

    fn resolve_dependencies(&self, bundle_path: &str) -> Vec<String> {
        self.bundles
            .get(fold(bundle_path).as_ref())
            .cloned()
            .unwrap_or_default()
    }
}

fn fold(path: &str) -> Cow<'_, str> {
    if path.chars().any(char::is_uppercase) {
        Cow::Owned(path.to_lowercase())
    } else {
        Cow::Borrowed(path)
    }
}
