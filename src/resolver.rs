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

//! Communicator resolver
//!
//! Normalizes the heterogeneous membership specifications accepted by
//! [`crate::ctx::MusterContext::init`] (rank lists, external communicator
//! handles, lists thereof) into one canonical [`InitPlan`] for the engine
//! handshake. All validation happens here, before any engine call.

use crate::engine::{CommHandle, Engine};
use crate::error::{MusterError, MusterResult};

/// One element of a communicator specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommItem {
    Rank(i32),
    Handle(CommHandle),
}

/// Membership specification for the global communicator.
#[derive(Debug, Clone, Default)]
pub enum CommSpec {
    /// Use the full default membership (all workers).
    #[default]
    Default,
    /// Explicit elements: rank integers, external handles, or (invalidly) a
    /// mix of both.
    Items(Vec<CommItem>),
}

impl From<Vec<i32>> for CommSpec {
    fn from(ranks: Vec<i32>) -> Self {
        CommSpec::Items(ranks.into_iter().map(CommItem::Rank).collect())
    }
}

impl From<CommHandle> for CommSpec {
    fn from(handle: CommHandle) -> Self {
        CommSpec::Items(vec![CommItem::Handle(handle)])
    }
}

impl From<Vec<CommHandle>> for CommSpec {
    fn from(handles: Vec<CommHandle>) -> Self {
        CommSpec::Items(handles.into_iter().map(CommItem::Handle).collect())
    }
}

/// Initial process-set specification.
#[derive(Debug, Clone, Default)]
pub enum ProcessSetsSpec {
    /// No initial process sets beyond the global set.
    #[default]
    None,
    /// Initial process sets containing these global ranks.
    Sets(Vec<Vec<i32>>),
    /// No initial sets, but permit creation and removal after initialization.
    Dynamic,
}

/// Canonical membership specification handed to the engine handshake.
///
/// Transient: consumed by [`crate::ctx::MusterContext::init`] and not
/// retained afterwards.
#[derive(Debug, Clone, Default)]
pub(crate) struct InitPlan {
    pub global_ranks: Vec<i32>,
    // Initial process sets flattened in declaration order.
    pub set_ranks: Vec<i32>,
    pub set_sizes: Vec<i32>,
    pub dynamic: bool,
}

impl InitPlan {
    fn push_set(&mut self, members: &[i32]) {
        // Entries whose membership equals an earlier declared entry as an
        // unordered set are silently dropped.
        let mut offset = 0usize;
        for &size in &self.set_sizes {
            let earlier = &self.set_ranks[offset..offset + size as usize];
            offset += size as usize;
            if same_membership(earlier, members) {
                return;
            }
        }
        self.set_sizes.push(members.len() as i32);
        self.set_ranks.extend_from_slice(members);
    }
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

fn split_items(items: &[CommItem]) -> (Vec<i32>, Vec<CommHandle>) {
    let mut ranks = Vec::new();
    let mut handles = Vec::new();
    for item in items {
        match *item {
            CommItem::Rank(r) => ranks.push(r),
            CommItem::Handle(h) => handles.push(h),
        }
    }
    (ranks, handles)
}

fn resolve_handle(engine: &dyn Engine, handle: CommHandle) -> MusterResult<Vec<i32>> {
    engine.handle_ranks(handle).ok_or_else(|| {
        MusterError::configuration("communicator handle is not known to the engine")
    })
}

/// Normalizes `comm` and `process_sets` into an [`InitPlan`].
pub(crate) fn resolve(
    engine: &dyn Engine,
    comm: &CommSpec,
    process_sets: &ProcessSetsSpec,
) -> MusterResult<InitPlan> {
    let mut plan = InitPlan {
        dynamic: matches!(process_sets, ProcessSetsSpec::Dynamic),
        ..InitPlan::default()
    };

    let (ranks, handles) = match comm {
        CommSpec::Default => (Vec::new(), Vec::new()),
        CommSpec::Items(items) => split_items(items),
    };

    if !handles.is_empty() && !ranks.is_empty() {
        return Err(MusterError::configuration(
            "invalid comm argument: expected a list of rank integers, a \
             communicator handle, or a list of communicator handles; got a \
             mix of rank integers and handles",
        ));
    }

    if handles.is_empty() {
        // Explicit global membership; empty means the full default world.
        plan.global_ranks = ranks;
    } else {
        if !engine.mpi_built() {
            return Err(MusterError::unsupported_controller(
                "external communicator handles require an engine built with \
                 MPI controller support",
            ));
        }
        // The first handle is duplicated as the global communicator; each
        // remaining handle seeds an initial process set.
        plan.global_ranks = resolve_handle(engine, handles[0])?;
        for &handle in &handles[1..] {
            let default_ranks = resolve_handle(engine, handle)?;
            let mut members = Vec::with_capacity(default_ranks.len());
            for &r in &default_ranks {
                let pos = plan.global_ranks.iter().position(|&g| g == r).ok_or_else(|| {
                    MusterError::configuration(format!(
                        "communicator handle contains rank {} outside the \
                         global membership",
                        r
                    ))
                })?;
                members.push(pos as i32);
            }
            plan.push_set(&members);
        }
        // Declared rank-list process sets only apply on the rank-list path.
        return Ok(plan);
    }

    if let ProcessSetsSpec::Sets(sets) = process_sets {
        for members in sets {
            plan.push_set(members);
        }
    }
    Ok(plan)
}
