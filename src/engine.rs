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

//! Engine capability boundary
//!
//! The communication engine (collective data transfer, wire transport,
//! accelerator integration) is an external collaborator. This crate talks to
//! it exclusively through the [`Engine`] trait, obtained once at context
//! creation. Registry and query methods report failure through negative
//! integer sentinels; [`crate::ctx::MusterContext`] translates every sentinel
//! into a typed [`crate::error::MusterError`] immediately at the boundary.

pub mod local;
pub mod table;

/// Engine has not been initialized on this process.
pub const SENTINEL_NOT_INITIALIZED: i32 = -1;
/// Dynamic process-set mode is disabled (add/remove calls).
pub const SENTINEL_DYNAMIC_DISABLED: i32 = -2;
/// Calling process is not a member of the queried set (rank/size calls).
pub const SENTINEL_NOT_A_MEMBER: i32 = -2;
/// No registered process set matches the given communicator handle.
pub const SENTINEL_NO_MATCHING_SET: i32 = -2;
/// Process-set id was never assigned or has been removed.
pub const SENTINEL_UNKNOWN_SET: i32 = -3;
/// Operation requires a controller backend that is not active.
pub const SENTINEL_UNSUPPORTED_CONTROLLER: i32 = -10;

/// Controller backend driving membership and coordination.
///
/// Several registry operations are documented MPI-only; the gloo-class
/// controller rejects them with [`SENTINEL_UNSUPPORTED_CONTROLLER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Mpi,
    Gloo,
}

/// Opaque reference to a pre-existing communicator object of the host
/// communication library.
///
/// The engine decides whether such handles are accepted at all
/// ([`Engine::mpi_built`]) and how they map to rank memberships
/// ([`Engine::handle_ranks`]); no host-library representation leaks into this
/// crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommHandle(pub u64);

/// Capability interface consumed from the communication engine.
///
/// Methods that mirror foreign calls keep the foreign error convention: a
/// plain `i32` where negative values are sentinels. Callers inside this crate
/// must translate sentinels before returning to users.
pub trait Engine: Send + Sync {
    /// One-time, blocking, job-wide collective handshake.
    ///
    /// `global_ranks` is the explicit global membership (empty means the full
    /// default world). `set_ranks`/`set_sizes` carry the initial process sets
    /// flattened in declaration order. Blocks until every required
    /// participant has called it; there is no timeout.
    fn init(&self, global_ranks: &[i32], set_ranks: &[i32], set_sizes: &[i32]);

    /// Releases engine resources. Safe to call multiple times.
    fn shutdown(&self);

    fn is_initialized(&self) -> bool;

    /// Startup switch permitting process-set creation/removal after init.
    /// Consulted by the engine during [`Engine::init`], so it must be set
    /// before that call.
    fn set_dynamic_process_sets(&self, enabled: bool);

    // Scalar queries. -1 sentinel = not initialized.

    fn size(&self) -> i32;
    fn local_size(&self) -> i32;
    fn cross_size(&self) -> i32;
    fn rank(&self) -> i32;
    fn local_rank(&self) -> i32;
    fn cross_rank(&self) -> i32;

    /// Whether every node runs the same number of workers. Returns an engine
    /// default before initialization rather than failing.
    fn is_homogeneous(&self) -> bool;

    /// Whether the controller supports multi-threaded use. -1 sentinel = not
    /// initialized.
    fn mpi_threads_supported(&self) -> i32;

    // Feature probes. Well-defined at any time, never fail.

    fn controller(&self) -> Controller;
    fn mpi_enabled(&self) -> bool;
    fn mpi_built(&self) -> bool;
    fn gloo_enabled(&self) -> bool;
    fn gloo_built(&self) -> bool;
    /// Version code of the NCCL build, 0 when not built.
    fn nccl_built(&self) -> i32;
    fn cuda_built(&self) -> bool;
    fn rocm_built(&self) -> bool;

    // Process-set registry. Distributed operations: the resulting ids are only
    // consistent across the job if every participating process issues the same
    // sequence of calls in the same order.

    /// Registers a new process set. Returns the new id, or a sentinel:
    /// -1 not initialized, -2 dynamic mode disabled, -10 unsupported
    /// controller.
    fn add_process_set(&self, ranks: &[i32]) -> i32;

    /// Removes a process set. Returns 0 on success, or a sentinel: -1, -2,
    /// -3 unknown id, -10 as above.
    fn remove_process_set(&self, id: i32) -> i32;

    /// Rank of the calling process within the set, or -1, -2 not a member,
    /// -3 unknown id, -10 unsupported controller.
    fn process_set_rank(&self, id: i32) -> i32;

    /// Size of the set, same sentinel convention as [`Engine::process_set_rank`].
    fn process_set_size(&self, id: i32) -> i32;

    // Three-step registry read. The table may be mutated concurrently by
    // other processes between these calls; negative values from the per-id
    // steps signal that the snapshot is no longer consistent.

    fn number_of_process_sets(&self) -> i32;
    fn process_set_ids(&self, out: &mut Vec<i32>);
    /// Size of the set for the snapshot read; negative = inconsistent.
    fn get_process_set_size(&self, id: i32) -> i32;
    /// Membership of the set for the snapshot read; negative = inconsistent.
    fn get_process_set_ranks(&self, id: i32, out: &mut Vec<i32>) -> i32;

    /// Process-set id registered for the given communicator handle, or
    /// -1 not initialized / handles unsupported, -2 no matching set.
    fn comm_process_set(&self, handle: CommHandle) -> i32;

    /// Resolves an external handle to its rank membership, in default-world
    /// numbering. `None` if the handle is unknown to the engine.
    fn handle_ranks(&self, handle: CommHandle) -> Option<Vec<i32>>;
}
