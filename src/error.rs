// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

use crate::resources::RequestId;

/// Resource cache error type
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The byte-load primitive produced no usable payload
    LoadFailure { path: String, reason: String },

    /// Asset inserted into a bundle it does not belong to, or a request id
    /// registered twice
    DuplicateRegistration(String),

    /// Cancel/release referencing an id that already completed or was never issued
    UnknownRequestId(RequestId),

    /// Bundle dependency graph contains a cycle (manifest build failure)
    DependencyCycle(Vec<String>),

    /// Manifest has no owning bundle for this asset path
    UnresolvedAsset(String),

    /// Owner handle rejected (null/dead owner)
    InvalidOwner(String),

    /// Configuration rejected by validation or parsing
    Config(String),

    /// IO error (manifest/config files, reports)
    Io(String),
}

impl ResourceError {
    /// Shorthand for a load failure on `path`
    pub fn load_failure(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ResourceError::LoadFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Programming errors are never retried; everything else may be.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            ResourceError::DuplicateRegistration(_)
                | ResourceError::InvalidOwner(_)
                | ResourceError::DependencyCycle(_)
        )
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::LoadFailure { path, reason } => {
                write!(f, "Load failure for {path}: {reason}")
            }
            ResourceError::DuplicateRegistration(msg) => {
                write!(f, "Duplicate registration: {msg}")
            }
            ResourceError::UnknownRequestId(id) => write!(f, "Unknown request id: {id}"),
            ResourceError::DependencyCycle(chain) => {
                write!(f, "Bundle dependency cycle: {}", chain.join(" -> "))
            }
            ResourceError::UnresolvedAsset(path) => {
                write!(f, "No owning bundle for asset: {path}")
            }
            ResourceError::InvalidOwner(msg) => write!(f, "Invalid owner: {msg}"),
            ResourceError::Config(msg) => write!(f, "Config error: {msg}"),
            ResourceError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        ResourceError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ResourceError>;
