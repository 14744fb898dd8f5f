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

//! Process-set registry and dynamic membership operations
//!
//! Each operation crosses the engine boundary once (or, for
//! [`MusterContext::get_process_sets`], three times) and translates the raw
//! sentinel result into a typed error on the spot. A failed add or remove
//! leaves the local view of the registry unchanged.

use std::collections::BTreeMap;

use crate::ctx::MusterContext;
use crate::engine::{
    CommHandle, SENTINEL_DYNAMIC_DISABLED, SENTINEL_NOT_A_MEMBER, SENTINEL_NOT_INITIALIZED,
    SENTINEL_NO_MATCHING_SET, SENTINEL_UNKNOWN_SET, SENTINEL_UNSUPPORTED_CONTROLLER,
};
use crate::error::{MusterError, MusterResult};

const MULTI_SET_MPI_ONLY: &str =
    "multiple process sets are only supported with the MPI controller";

impl MusterContext {
    /// Adds a new process set over the given global ranks and returns its
    /// freshly assigned id. Ids are monotonically increasing and never
    /// reused.
    ///
    /// The rank list is forwarded as-is; duplicates within it are not
    /// collapsed. Requires dynamic process-set mode to have been enabled
    /// before init. Like every registry mutation this is a distributed
    /// operation: the resulting id is only consistent across the job if every
    /// participating process issues the same sequence of add/remove calls in
    /// the same order.
    pub fn add_process_set(&self, ranks: &[i32]) -> MusterResult<i32> {
        match self.engine().add_process_set(ranks) {
            SENTINEL_NOT_INITIALIZED => Err(MusterError::NotInitialized),
            SENTINEL_DYNAMIC_DISABLED => Err(MusterError::DynamicModeDisabled),
            SENTINEL_UNSUPPORTED_CONTROLLER => {
                Err(MusterError::unsupported_controller(MULTI_SET_MPI_ONLY))
            }
            id => Ok(id),
        }
    }

    /// Removes the process set with the given id. Id 0 is the global set and
    /// is always refused before any engine call is made.
    pub fn remove_process_set(&self, id: i32) -> MusterResult<()> {
        if id == 0 {
            return Err(MusterError::GlobalSetImmutable);
        }
        match self.engine().remove_process_set(id) {
            0 => Ok(()),
            SENTINEL_NOT_INITIALIZED => Err(MusterError::NotInitialized),
            SENTINEL_DYNAMIC_DISABLED => Err(MusterError::DynamicModeDisabled),
            SENTINEL_UNKNOWN_SET => Err(MusterError::unknown_set(id)),
            SENTINEL_UNSUPPORTED_CONTROLLER => {
                Err(MusterError::unsupported_controller(MULTI_SET_MPI_ONLY))
            }
            other => Err(MusterError::consistency(format!(
                "engine returned unexpected code {} while removing process set {}",
                other, id
            ))),
        }
    }

    /// Rank of the calling process relative to the given process set.
    pub fn process_set_rank(&self, id: i32) -> MusterResult<i32> {
        match self.engine().process_set_rank(id) {
            SENTINEL_NOT_INITIALIZED => Err(MusterError::NotInitialized),
            SENTINEL_NOT_A_MEMBER => Err(MusterError::NotAMember(id)),
            SENTINEL_UNKNOWN_SET => Err(MusterError::unknown_set(id)),
            SENTINEL_UNSUPPORTED_CONTROLLER => {
                Err(MusterError::unsupported_controller(MULTI_SET_MPI_ONLY))
            }
            rank => Ok(rank),
        }
    }

    /// Number of members of the given process set.
    pub fn process_set_size(&self, id: i32) -> MusterResult<i32> {
        match self.engine().process_set_size(id) {
            SENTINEL_NOT_INITIALIZED => Err(MusterError::NotInitialized),
            SENTINEL_NOT_A_MEMBER => Err(MusterError::NotAMember(id)),
            SENTINEL_UNKNOWN_SET => Err(MusterError::unknown_set(id)),
            SENTINEL_UNSUPPORTED_CONTROLLER => {
                Err(MusterError::unsupported_controller(MULTI_SET_MPI_ONLY))
            }
            size => Ok(size),
        }
    }

    /// Snapshot of every registered process set: id -> member global ranks.
    ///
    /// This is a three-step read (count, id list, per-id size and
    /// membership). Other processes' add/remove calls can mutate the table
    /// between steps; when a step observes the table shrinking or changing
    /// underneath it, the partial snapshot is discarded and
    /// [`MusterError::Consistency`] is returned instead of partial data.
    pub fn get_process_sets(&self) -> MusterResult<BTreeMap<i32, Vec<i32>>> {
        let engine = self.engine();
        if !engine.is_initialized() {
            return Err(MusterError::NotInitialized);
        }

        let mut ids = Vec::with_capacity(engine.number_of_process_sets().max(0) as usize);
        engine.process_set_ids(&mut ids);

        let mut sets = BTreeMap::new();
        for id in ids {
            let size = engine.get_process_set_size(id);
            if size < 0 {
                return Err(MusterError::consistency(
                    "process set table was modified during get_process_sets()",
                ));
            }
            let mut members = Vec::with_capacity(size as usize);
            if engine.get_process_set_ranks(id, &mut members) < 0 {
                return Err(MusterError::consistency(
                    "process set table was modified during get_process_sets()",
                ));
            }
            sets.insert(id, members);
        }
        Ok(sets)
    }

    /// Process-set id previously registered for the given external
    /// communicator handle.
    pub fn comm_process_set(&self, handle: CommHandle) -> MusterResult<i32> {
        if !self.engine().mpi_built() {
            return Err(MusterError::unsupported_controller(
                "external communicator handles require an engine built with \
                 MPI controller support",
            ));
        }
        match self.engine().comm_process_set(handle) {
            SENTINEL_NOT_INITIALIZED => Err(MusterError::NotInitialized),
            SENTINEL_NO_MATCHING_SET => Err(MusterError::UnknownProcessSet(
                "no registered process set matches the given communicator handle".into(),
            )),
            id => Ok(id),
        }
    }
}
