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

//! Bundle Cache - reference-counted asset/bundle cache
//!
//! Many callers share one in-flight load per path, bundles pull in their
//! dependency graph, a per-frame budget throttles new loads, and an idle,
//! time-gated sweep reclaims bundles nobody uses any more.

pub mod config;
pub mod error;
pub mod io;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod prelude;
pub mod profiling;
pub mod resources;
pub mod time;

pub use config::*;
pub use error::*;
pub use io::*;
pub use loader::{Completion, LoadTask, LoaderRegistry, ResourceKind, TaskId, TaskState, TickBudget};
pub use manifest::*;
pub use module::*;
pub use resources::*;
pub use time::*;
