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

//! Integration tests for the process-set registry and dynamic membership.

use std::collections::BTreeMap;
use std::sync::Arc;

use muster::engine::local::LocalEngine;
use muster::{CommSpec, Controller, MusterContext, MusterError, ProcessSetsSpec};

fn three_worker_context(rank: i32, dynamic: bool) -> (Arc<LocalEngine>, MusterContext) {
    let engine = Arc::new(
        LocalEngine::builder()
            .world(3)
            .rank(rank)
            .dynamic(dynamic)
            .build(),
    );
    let ctx = MusterContext::new(engine.clone());
    (engine, ctx)
}

mod static_registry_tests {
    use super::*;

    #[test]
    fn test_global_set_always_covers_full_membership() {
        let (_, ctx) = three_worker_context(0, false);
        ctx.init(
            CommSpec::Default,
            ProcessSetsSpec::Sets(vec![vec![0], vec![1, 2]]),
        )
        .unwrap();

        let sets = ctx.get_process_sets().unwrap();
        assert_eq!(sets[&0], vec![0, 1, 2]);
        assert_eq!(ctx.process_set_size(0).unwrap(), 3);
        assert_eq!(ctx.process_set_rank(0).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_declarations_are_dropped() {
        let (_, ctx) = three_worker_context(0, false);
        // The third entry is a permutation of the global membership, the
        // fourth repeats the first; both are silently dropped.
        ctx.init(
            CommSpec::Default,
            ProcessSetsSpec::Sets(vec![vec![0], vec![1, 2], vec![2, 1, 0], vec![0]]),
        )
        .unwrap();

        let mut expected = BTreeMap::new();
        expected.insert(0, vec![0, 1, 2]);
        expected.insert(1, vec![0]);
        expected.insert(2, vec![1, 2]);
        assert_eq!(ctx.get_process_sets().unwrap(), expected);
    }

    #[test]
    fn test_sizes_and_ranks_match_memberships() {
        let (_, ctx) = three_worker_context(2, false);
        ctx.init(
            CommSpec::Default,
            ProcessSetsSpec::Sets(vec![vec![0], vec![2, 1]]),
        )
        .unwrap();
        let my_rank = ctx.rank().unwrap();

        for (id, members) in ctx.get_process_sets().unwrap() {
            assert_eq!(ctx.process_set_size(id).unwrap(), members.len() as i32);
            match members.iter().position(|&r| r == my_rank) {
                Some(pos) => assert_eq!(ctx.process_set_rank(id).unwrap(), pos as i32),
                None => assert!(matches!(
                    ctx.process_set_rank(id),
                    Err(MusterError::NotAMember(_))
                )),
            }
        }
    }

    #[test]
    fn test_member_order_defines_set_relative_rank() {
        let (_, ctx) = three_worker_context(1, false);
        ctx.init(
            CommSpec::Default,
            ProcessSetsSpec::Sets(vec![vec![2, 1]]),
        )
        .unwrap();

        assert_eq!(ctx.process_set_rank(1).unwrap(), 1);
        assert_eq!(ctx.process_set_size(1).unwrap(), 2);
    }

    #[test]
    fn test_unknown_id_is_reported() {
        let (_, ctx) = three_worker_context(0, false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::None).unwrap();

        assert!(matches!(
            ctx.process_set_rank(42),
            Err(MusterError::UnknownProcessSet(_))
        ));
        assert!(matches!(
            ctx.process_set_size(42),
            Err(MusterError::UnknownProcessSet(_))
        ));
    }
}

mod dynamic_membership_tests {
    use super::*;

    #[test]
    fn test_add_requires_dynamic_mode_and_leaves_registry_unchanged() {
        let (_, ctx) = three_worker_context(0, false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::None).unwrap();
        let before = ctx.get_process_sets().unwrap();

        let err = ctx.add_process_set(&[0, 1]).unwrap_err();
        assert!(matches!(err, MusterError::DynamicModeDisabled));
        assert_eq!(ctx.get_process_sets().unwrap(), before);
    }

    #[test]
    fn test_add_and_remove_roundtrip() {
        let (_, ctx) = three_worker_context(1, false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::Dynamic)
            .unwrap();

        let id = ctx.add_process_set(&[1, 2]).unwrap();
        assert_eq!(id, 1);
        assert_eq!(ctx.process_set_rank(id).unwrap(), 0);
        assert_eq!(ctx.process_set_size(id).unwrap(), 2);

        ctx.remove_process_set(id).unwrap();
        assert!(matches!(
            ctx.process_set_size(id),
            Err(MusterError::UnknownProcessSet(_))
        ));
        // Removing the same id again reports unknown, not removed-twice.
        assert!(matches!(
            ctx.remove_process_set(id),
            Err(MusterError::UnknownProcessSet(_))
        ));
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let (_, ctx) = three_worker_context(0, false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::Dynamic)
            .unwrap();

        let a = ctx.add_process_set(&[0]).unwrap();
        let b = ctx.add_process_set(&[1]).unwrap();
        assert!(b > a);

        ctx.remove_process_set(a).unwrap();
        let c = ctx.add_process_set(&[0, 1]).unwrap();
        assert!(c > b);

        let ids: Vec<i32> = ctx.get_process_sets().unwrap().into_keys().collect();
        assert_eq!(ids, vec![0, b, c]);
    }

    #[test]
    fn test_global_set_is_immutable() {
        let (_, ctx) = three_worker_context(0, false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::Dynamic)
            .unwrap();
        let before = ctx.get_process_sets().unwrap();

        assert!(matches!(
            ctx.remove_process_set(0),
            Err(MusterError::GlobalSetImmutable)
        ));
        assert_eq!(ctx.get_process_sets().unwrap(), before);
    }

    #[test]
    fn test_global_set_immutable_even_before_init() {
        let (_, ctx) = three_worker_context(0, false);
        // The id 0 guard fires before any engine call.
        assert!(matches!(
            ctx.remove_process_set(0),
            Err(MusterError::GlobalSetImmutable)
        ));
    }

    #[test]
    fn test_add_forwards_rank_list_as_is() {
        let (_, ctx) = three_worker_context(0, false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::Dynamic)
            .unwrap();

        // Duplicates within the list are not collapsed.
        let id = ctx.add_process_set(&[0, 0, 1]).unwrap();
        assert_eq!(ctx.process_set_size(id).unwrap(), 3);
    }

    #[test]
    fn test_operations_fail_before_init() {
        let (_, ctx) = three_worker_context(0, true);

        assert!(matches!(
            ctx.add_process_set(&[0]),
            Err(MusterError::NotInitialized)
        ));
        assert!(matches!(
            ctx.remove_process_set(5),
            Err(MusterError::NotInitialized)
        ));
        assert!(matches!(
            ctx.process_set_rank(0),
            Err(MusterError::NotInitialized)
        ));
        assert!(matches!(
            ctx.process_set_size(0),
            Err(MusterError::NotInitialized)
        ));
    }
}

mod controller_gating_tests {
    use super::*;

    fn gloo_context(dynamic: bool) -> MusterContext {
        let engine = Arc::new(
            LocalEngine::builder()
                .world(3)
                .controller(Controller::Gloo)
                .dynamic(dynamic)
                .build(),
        );
        MusterContext::new(engine)
    }

    #[test]
    fn test_multi_set_management_is_mpi_only() {
        let ctx = gloo_context(true);
        ctx.init(CommSpec::Default, ProcessSetsSpec::None).unwrap();

        assert!(matches!(
            ctx.add_process_set(&[0, 1]),
            Err(MusterError::UnsupportedController(_))
        ));
        assert!(matches!(
            ctx.remove_process_set(1),
            Err(MusterError::UnsupportedController(_))
        ));
        assert!(matches!(
            ctx.process_set_rank(1),
            Err(MusterError::UnsupportedController(_))
        ));
    }

    #[test]
    fn test_global_set_queries_work_on_gloo() {
        let ctx = gloo_context(false);
        ctx.init(CommSpec::Default, ProcessSetsSpec::None).unwrap();

        assert_eq!(ctx.process_set_size(0).unwrap(), 3);
        assert_eq!(ctx.process_set_rank(0).unwrap(), 0);
    }

    #[test]
    fn test_comm_process_set_requires_mpi() {
        let engine = Arc::new(
            LocalEngine::builder()
                .world(3)
                .controller(Controller::Gloo)
                .build(),
        );
        let handle = engine.register_handle(vec![0, 1]);
        let ctx = MusterContext::new(engine);
        ctx.init(CommSpec::Default, ProcessSetsSpec::None).unwrap();

        assert!(matches!(
            ctx.comm_process_set(handle),
            Err(MusterError::UnsupportedController(_))
        ));
    }
}

mod comm_handle_tests {
    use super::*;

    #[test]
    fn test_comm_process_set_finds_registered_set() {
        let (engine, ctx) = three_worker_context(0, false);
        let handle = engine.register_handle(vec![1, 2]);
        ctx.init(
            CommSpec::Default,
            ProcessSetsSpec::Sets(vec![vec![1, 2]]),
        )
        .unwrap();

        assert_eq!(ctx.comm_process_set(handle).unwrap(), 1);
    }

    #[test]
    fn test_comm_process_set_without_match() {
        let (engine, ctx) = three_worker_context(0, false);
        let handle = engine.register_handle(vec![0, 2]);
        ctx.init(CommSpec::Default, ProcessSetsSpec::None).unwrap();

        assert!(matches!(
            ctx.comm_process_set(handle),
            Err(MusterError::UnknownProcessSet(_))
        ));
    }

    #[test]
    fn test_comm_process_set_before_init() {
        let (engine, ctx) = three_worker_context(0, false);
        let handle = engine.register_handle(vec![0, 1]);

        assert!(matches!(
            ctx.comm_process_set(handle),
            Err(MusterError::NotInitialized)
        ));
    }

    #[test]
    fn test_init_from_multiple_handles_seeds_sets() {
        let engine = Arc::new(LocalEngine::builder().world(3).rank(2).build());
        let global = engine.register_handle(vec![0, 1, 2]);
        let sub = engine.register_handle(vec![1, 2]);
        let dup = engine.register_handle(vec![2, 1]); // same membership as sub
        let ctx = MusterContext::new(engine);

        ctx.init(
            CommSpec::from(vec![global, sub, dup]),
            ProcessSetsSpec::None,
        )
        .unwrap();

        let mut expected = BTreeMap::new();
        expected.insert(0, vec![0, 1, 2]);
        expected.insert(1, vec![1, 2]);
        assert_eq!(ctx.get_process_sets().unwrap(), expected);
        assert_eq!(ctx.comm_process_set(sub).unwrap(), 1);
        assert_eq!(ctx.process_set_rank(1).unwrap(), 1);
    }

    #[test]
    fn test_init_from_single_handle_defines_global_membership() {
        let engine = Arc::new(LocalEngine::builder().world(4).rank(3).build());
        let handle = engine.register_handle(vec![1, 3]);
        let ctx = MusterContext::new(engine);

        ctx.init(CommSpec::from(handle), ProcessSetsSpec::None)
            .unwrap();

        assert_eq!(ctx.size().unwrap(), 2);
        assert_eq!(ctx.rank().unwrap(), 1);
        assert_eq!(ctx.get_process_sets().unwrap()[&0], vec![0, 1]);
    }
}
