// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Muster: control plane for a distributed collective-communication runtime
//!
//! Muster establishes a global set of cooperating worker processes, assigns
//! each a stable global rank, and manages named subgroups (process sets) that
//! can be queried and, under dynamic mode, created or destroyed after
//! startup. The data-transfer engine itself is an external collaborator
//! reached through the [`engine::Engine`] capability trait.

pub mod ctx;
pub mod engine;
pub mod error;
pub mod process_sets;
pub mod query;
pub mod resolver;
pub mod util;

// Re-export commonly used types
pub use crate::ctx::MusterContext;
pub use crate::engine::{CommHandle, Controller, Engine};
pub use crate::error::{MusterError, MusterResult};
pub use crate::resolver::{CommItem, CommSpec, ProcessSetsSpec};

/// The main entry point and version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
