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

//! Process-set registry table
//!
//! Maps process-set id to membership. Id 0 is the immutable global set. Ids
//! are assigned monotonically and never reused, even after removal; removed
//! entries stay behind as tombstones.

use hashbrown::HashMap;

/// Lifecycle of a registered process set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSetState {
    Active,
    Removed,
}

/// A named subgroup of global ranks.
///
/// Member order determines each member's set-relative rank.
#[derive(Debug, Clone)]
pub struct ProcessSet {
    pub id: i32,
    pub members: Vec<i32>,
    pub state: ProcessSetState,
}

impl ProcessSet {
    /// Position of `global_rank` within this set, if it is a member.
    pub fn rank_of(&self, global_rank: i32) -> Option<i32> {
        self.members
            .iter()
            .position(|&r| r == global_rank)
            .map(|p| p as i32)
    }
}

/// The id -> ProcessSet table.
#[derive(Debug, Default)]
pub struct ProcessSetTable {
    sets: HashMap<i32, ProcessSet>,
    // Active ids in registration order.
    ids: Vec<i32>,
    next_id: i32,
}

fn same_membership(a: &[i32], b: &[i32]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort_unstable();
    b_sorted.sort_unstable();
    a_sorted == b_sorted
}

impl ProcessSetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new set under a fresh id. The first registration must be
    /// the global membership and receives id 0.
    pub fn register(&mut self, members: Vec<i32>) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        self.sets.insert(
            id,
            ProcessSet {
                id,
                members,
                state: ProcessSetState::Active,
            },
        );
        self.ids.push(id);
        id
    }

    /// Registers an initial set during the handshake, unless its membership
    /// equals an already registered active set as an unordered set (including
    /// the global set). Duplicate declarations are silently dropped.
    pub fn seed(&mut self, members: Vec<i32>) -> Option<i32> {
        let duplicate = self
            .ids
            .iter()
            .any(|id| same_membership(&self.sets[id].members, &members));
        if duplicate {
            return None;
        }
        Some(self.register(members))
    }

    /// Marks `id` removed, keeping a tombstone. Id 0 and unknown or already
    /// removed ids are refused.
    pub fn remove(&mut self, id: i32) -> bool {
        if id == 0 {
            return false;
        }
        match self.sets.get_mut(&id) {
            Some(set) if set.state == ProcessSetState::Active => {
                set.state = ProcessSetState::Removed;
                self.ids.retain(|&other| other != id);
                true
            }
            _ => false,
        }
    }

    /// Active set for `id`, if any. Tombstones are not returned.
    pub fn get(&self, id: i32) -> Option<&ProcessSet> {
        self.sets
            .get(&id)
            .filter(|set| set.state == ProcessSetState::Active)
    }

    /// True if `id` was assigned once and later removed.
    pub fn is_removed(&self, id: i32) -> bool {
        matches!(
            self.sets.get(&id),
            Some(set) if set.state == ProcessSetState::Removed
        )
    }

    /// Active ids in registration order.
    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Active id whose membership equals `members` as an unordered set.
    pub fn find_by_membership(&self, members: &[i32]) -> Option<i32> {
        self.ids
            .iter()
            .copied()
            .find(|id| same_membership(&self.sets[id].members, members))
    }
}
