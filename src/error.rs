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

//! Error handling for muster operations
//!
//! Every failure the engine reports through its integer sentinel channel is
//! translated into one of these variants at the call boundary. Sentinel
//! integers never propagate past that boundary.

/// Main error type for muster operations
#[derive(thiserror::Error, Debug)]
pub enum MusterError {
    /// Malformed or inconsistent caller input, detected before any engine call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The runtime has not been initialized on this process.
    #[error("muster has not been initialized; call init() first")]
    NotInitialized,

    /// Process sets cannot be added or removed after initialization unless
    /// dynamic process-set mode was enabled before init.
    #[error(
        "dynamic process-set mode is disabled; enable it (e.g. \
         MUSTER_DYNAMIC_PROCESS_SETS=1) before init() to allow adding or \
         removing process sets at runtime"
    )]
    DynamicModeDisabled,

    /// The selected controller backend does not support the requested
    /// operation.
    #[error("unsupported controller: {0}")]
    UnsupportedController(String),

    /// The given process-set id was never assigned or has been removed, or no
    /// registered set matches the given communicator handle.
    #[error("unknown process set: {0}")]
    UnknownProcessSet(String),

    /// The calling process is not a member of the given process set.
    #[error("process is not a member of process set {0}")]
    NotAMember(i32),

    /// Process set id 0 is the global set and can never be removed.
    #[error("attempted to remove the global process set with id 0")]
    GlobalSetImmutable,

    /// The registry was mutated by another process in the middle of a
    /// multi-step read. Partial data is discarded, not returned.
    #[error("consistency error: {0}")]
    Consistency(String),
}

impl MusterError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        MusterError::Configuration(msg.into())
    }

    pub fn unsupported_controller(msg: impl Into<String>) -> Self {
        MusterError::UnsupportedController(msg.into())
    }

    pub fn unknown_set(id: i32) -> Self {
        MusterError::UnknownProcessSet(format!("id {}", id))
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        MusterError::Consistency(msg.into())
    }
}

/// Type alias for Results using MusterError
pub type MusterResult<T> = Result<T, MusterError>;
