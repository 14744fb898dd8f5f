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

//! In-process engine
//!
//! Simulates one worker of a configurable multi-node job without any wire
//! transport, so the whole control plane can run and be tested inside a
//! single process. Collective calls return immediately: with one real
//! process there is nobody else to wait for.

use std::sync::Mutex;

use hashbrown::HashMap;
use log::{debug, trace};

use super::table::ProcessSetTable;
use super::{
    CommHandle, Controller, Engine, SENTINEL_DYNAMIC_DISABLED, SENTINEL_NOT_A_MEMBER,
    SENTINEL_NOT_INITIALIZED, SENTINEL_NO_MATCHING_SET, SENTINEL_UNKNOWN_SET,
    SENTINEL_UNSUPPORTED_CONTROLLER,
};

/// Environment switch enabling dynamic process-set mode at process startup.
pub const DYNAMIC_PROCESS_SETS_ENV: &str = "MUSTER_DYNAMIC_PROCESS_SETS";

struct EngineState {
    initialized: bool,
    dynamic: bool,
    // Global membership in default-world numbering; position = global rank.
    world: Vec<i32>,
    table: ProcessSetTable,
    handles: HashMap<u64, Vec<i32>>,
    next_handle: u64,
}

/// Engine backed by an in-process simulated world.
pub struct LocalEngine {
    // This worker's rank in the default (full) world.
    default_rank: i32,
    // Workers per node; nodes are numbered in order, ranks assigned
    // contiguously per node.
    node_sizes: Vec<i32>,
    controller: Controller,
    state: Mutex<EngineState>,
}

/// Builder for [`LocalEngine`].
pub struct LocalEngineBuilder {
    rank: i32,
    node_sizes: Vec<i32>,
    controller: Controller,
    dynamic: bool,
}

impl Default for LocalEngineBuilder {
    fn default() -> Self {
        Self {
            rank: 0,
            node_sizes: vec![1],
            controller: Controller::Mpi,
            dynamic: std::env::var(DYNAMIC_PROCESS_SETS_ENV)
                .map(|v| v == "1")
                .unwrap_or(false),
        }
    }
}

impl LocalEngineBuilder {
    /// Single-node world of `n` workers.
    pub fn world(mut self, n: i32) -> Self {
        self.node_sizes = vec![n];
        self
    }

    /// Multi-node world; `sizes[i]` workers on node `i`, ranks assigned
    /// contiguously per node.
    pub fn node_sizes(mut self, sizes: &[i32]) -> Self {
        self.node_sizes = sizes.to_vec();
        self
    }

    /// Default-world rank of the simulated calling process.
    pub fn rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    /// Overrides the [`DYNAMIC_PROCESS_SETS_ENV`] default.
    pub fn dynamic(mut self, enabled: bool) -> Self {
        self.dynamic = enabled;
        self
    }

    pub fn build(self) -> LocalEngine {
        let total: i32 = self.node_sizes.iter().sum();
        assert!(total > 0, "world must contain at least one worker");
        assert!(
            (0..total).contains(&self.rank),
            "rank {} outside world of size {}",
            self.rank,
            total
        );
        LocalEngine {
            default_rank: self.rank,
            node_sizes: self.node_sizes,
            controller: self.controller,
            state: Mutex::new(EngineState {
                initialized: false,
                dynamic: self.dynamic,
                world: Vec::new(),
                table: ProcessSetTable::new(),
                handles: HashMap::new(),
                next_handle: 1,
            }),
        }
    }
}

impl LocalEngine {
    pub fn builder() -> LocalEngineBuilder {
        LocalEngineBuilder::default()
    }

    /// One worker, one node.
    pub fn single() -> Self {
        Self::builder().build()
    }

    fn default_world_size(&self) -> i32 {
        self.node_sizes.iter().sum()
    }

    fn node_of(&self, default_rank: i32) -> usize {
        let mut remaining = default_rank;
        for (node, &size) in self.node_sizes.iter().enumerate() {
            if remaining < size {
                return node;
            }
            remaining -= size;
        }
        unreachable!("rank outside the configured topology")
    }

    /// Global rank of this worker within the current world, if it is a member.
    fn my_rank(&self, state: &EngineState) -> Option<i32> {
        state
            .world
            .iter()
            .position(|&r| r == self.default_rank)
            .map(|p| p as i32)
    }

    /// Per-node member counts for the current world, and this worker's rank
    /// among the members of its own node.
    fn node_layout(&self, state: &EngineState) -> (Vec<i32>, i32) {
        let mut counts = vec![0i32; self.node_sizes.len()];
        let my_node = self.node_of(self.default_rank);
        let mut my_local_rank = 0;
        for &member in &state.world {
            let node = self.node_of(member);
            if node == my_node && member == self.default_rank {
                my_local_rank = counts[node];
            }
            counts[node] += 1;
        }
        (counts, my_local_rank)
    }

    /// Mints an opaque handle for a pre-existing communicator over `ranks`
    /// (default-world numbering). Host-library interop hook; tests use it to
    /// stand in for foreign communicator objects.
    pub fn register_handle(&self, ranks: Vec<i32>) -> CommHandle {
        let mut state = self.state.lock().unwrap();
        let handle = CommHandle(state.next_handle);
        state.next_handle += 1;
        state.handles.insert(handle.0, ranks);
        handle
    }
}

impl Engine for LocalEngine {
    fn init(&self, global_ranks: &[i32], set_ranks: &[i32], set_sizes: &[i32]) {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return;
        }
        let total = self.default_world_size();
        assert!(
            global_ranks.iter().all(|&r| (0..total).contains(&r)),
            "global membership contains ranks outside the configured world"
        );
        state.world = if global_ranks.is_empty() {
            (0..total).collect()
        } else {
            global_ranks.to_vec()
        };
        debug!(
            "initializing local engine: world size {}, {} declared process sets, dynamic={}",
            state.world.len(),
            set_sizes.len(),
            state.dynamic
        );

        // Global ranks are renumbered by position in the global membership.
        let size = state.world.len() as i32;
        let mut table = ProcessSetTable::new();
        let global_id = table.register((0..size).collect());
        debug_assert_eq!(global_id, 0);

        let mut offset = 0usize;
        for &set_size in set_sizes {
            let members = set_ranks[offset..offset + set_size as usize].to_vec();
            offset += set_size as usize;
            if let Some(id) = table.seed(members) {
                trace!("seeded process set {}", id);
            }
        }
        state.table = table;
        state.initialized = true;
    }

    fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            debug!("shutting down local engine");
        }
        state.initialized = false;
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    fn set_dynamic_process_sets(&self, enabled: bool) {
        self.state.lock().unwrap().dynamic = enabled;
    }

    fn size(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        state.world.len() as i32
    }

    fn local_size(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        let (counts, _) = self.node_layout(&state);
        counts[self.node_of(self.default_rank)]
    }

    fn cross_size(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        let (counts, my_local_rank) = self.node_layout(&state);
        // Nodes carrying a worker with this local rank.
        counts.iter().filter(|&&c| c > my_local_rank).count() as i32
    }

    fn rank(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        self.my_rank(&state).unwrap_or(SENTINEL_NOT_INITIALIZED)
    }

    fn local_rank(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        let (_, my_local_rank) = self.node_layout(&state);
        my_local_rank
    }

    fn cross_rank(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        let (counts, my_local_rank) = self.node_layout(&state);
        let my_node = self.node_of(self.default_rank);
        counts[..my_node]
            .iter()
            .filter(|&&c| c > my_local_rank)
            .count() as i32
    }

    fn is_homogeneous(&self) -> bool {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            // Engine default before init; callers should not rely on it.
            return true;
        }
        let (counts, _) = self.node_layout(&state);
        let mut occupied = counts.iter().filter(|&&c| c > 0);
        match occupied.next() {
            Some(first) => occupied.all(|c| c == first),
            None => true,
        }
    }

    fn mpi_threads_supported(&self) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        1
    }

    fn controller(&self) -> Controller {
        self.controller
    }

    fn mpi_enabled(&self) -> bool {
        self.controller == Controller::Mpi
    }

    fn mpi_built(&self) -> bool {
        self.controller == Controller::Mpi
    }

    fn gloo_enabled(&self) -> bool {
        self.controller == Controller::Gloo
    }

    fn gloo_built(&self) -> bool {
        self.controller == Controller::Gloo
    }

    fn nccl_built(&self) -> i32 {
        0
    }

    fn cuda_built(&self) -> bool {
        false
    }

    fn rocm_built(&self) -> bool {
        false
    }

    fn add_process_set(&self, ranks: &[i32]) -> i32 {
        let mut state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        if !state.dynamic {
            return SENTINEL_DYNAMIC_DISABLED;
        }
        if self.controller == Controller::Gloo {
            return SENTINEL_UNSUPPORTED_CONTROLLER;
        }
        let id = state.table.register(ranks.to_vec());
        trace!("added process set {} with {} members", id, ranks.len());
        id
    }

    fn remove_process_set(&self, id: i32) -> i32 {
        let mut state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        if !state.dynamic {
            return SENTINEL_DYNAMIC_DISABLED;
        }
        if self.controller == Controller::Gloo {
            return SENTINEL_UNSUPPORTED_CONTROLLER;
        }
        if state.table.remove(id) {
            trace!("removed process set {}", id);
            0
        } else {
            SENTINEL_UNKNOWN_SET
        }
    }

    fn process_set_rank(&self, id: i32) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        if id != 0 && self.controller == Controller::Gloo {
            return SENTINEL_UNSUPPORTED_CONTROLLER;
        }
        let Some(set) = state.table.get(id) else {
            return SENTINEL_UNKNOWN_SET;
        };
        let Some(my_rank) = self.my_rank(&state) else {
            return SENTINEL_NOT_A_MEMBER;
        };
        set.rank_of(my_rank).unwrap_or(SENTINEL_NOT_A_MEMBER)
    }

    fn process_set_size(&self, id: i32) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized {
            return SENTINEL_NOT_INITIALIZED;
        }
        if id != 0 && self.controller == Controller::Gloo {
            return SENTINEL_UNSUPPORTED_CONTROLLER;
        }
        match state.table.get(id) {
            Some(set) => set.members.len() as i32,
            None => SENTINEL_UNKNOWN_SET,
        }
    }

    fn number_of_process_sets(&self) -> i32 {
        self.state.lock().unwrap().table.len() as i32
    }

    fn process_set_ids(&self, out: &mut Vec<i32>) {
        let state = self.state.lock().unwrap();
        out.clear();
        out.extend_from_slice(state.table.ids());
    }

    fn get_process_set_size(&self, id: i32) -> i32 {
        let state = self.state.lock().unwrap();
        match state.table.get(id) {
            Some(set) => set.members.len() as i32,
            None => SENTINEL_NOT_INITIALIZED,
        }
    }

    fn get_process_set_ranks(&self, id: i32, out: &mut Vec<i32>) -> i32 {
        let state = self.state.lock().unwrap();
        match state.table.get(id) {
            Some(set) => {
                out.clear();
                out.extend_from_slice(&set.members);
                0
            }
            None => SENTINEL_NOT_INITIALIZED,
        }
    }

    fn comm_process_set(&self, handle: CommHandle) -> i32 {
        let state = self.state.lock().unwrap();
        if !state.initialized || self.controller == Controller::Gloo {
            return SENTINEL_NOT_INITIALIZED;
        }
        let Some(default_ranks) = state.handles.get(&handle.0) else {
            return SENTINEL_NO_MATCHING_SET;
        };
        // Re-base the handle's membership into current global ranks.
        let mut members = Vec::with_capacity(default_ranks.len());
        for &r in default_ranks {
            match state.world.iter().position(|&w| w == r) {
                Some(pos) => members.push(pos as i32),
                None => return SENTINEL_NO_MATCHING_SET,
            }
        }
        state
            .table
            .find_by_membership(&members)
            .unwrap_or(SENTINEL_NO_MATCHING_SET)
    }

    fn handle_ranks(&self, handle: CommHandle) -> Option<Vec<i32>> {
        self.state.lock().unwrap().handles.get(&handle.0).cloned()
    }
}
