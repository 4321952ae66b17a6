//! Property tests for ordering guarantees
//!
//! - the commit watermark never moves backwards
//! - a request with the wrong sequence leaves its transaction unchanged
//! - nothing at or below the watermark is ever applied again

use crate::common::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Commit(u64),
    Abort(u64),
    Open(u64),
    Confirm,
}

fn action() -> impl Strategy<Value = Action> {
    // Mix small sequences with ones past the signed range
    let seq = prop_oneof![0u64..32, (i64::MAX as u64)..(i64::MAX as u64 + 32)];
    prop_oneof![
        seq.clone().prop_map(Action::Commit),
        seq.clone().prop_map(Action::Abort),
        seq.prop_map(Action::Open),
        Just(Action::Confirm),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_watermark_is_monotonic(actions in prop::collection::vec(action(), 1..40)) {
        let mut shard = TestShard::new();
        let history = new_history();
        let mut watermark: Option<u64> = None;

        for action in actions {
            match action {
                Action::Commit(seq) => {
                    shard.modify(history.transaction(seq), 0, vec![], Finish::SimpleCommit);
                }
                Action::Abort(seq) => {
                    shard.modify(history.transaction(seq), 0, vec![], Finish::Abort);
                }
                Action::Open(seq) => {
                    shard.modify(history.transaction(seq), 0, vec![], Finish::None);
                }
                Action::Confirm => {
                    shard.commit_pending();
                }
            }

            let current = shard.registry.last_committed(&history);
            if let Some(previous) = watermark {
                prop_assert!(current.map_or(false, |c| c >= previous));
            }
            watermark = current;
        }
    }

    #[test]
    fn prop_wrong_request_sequence_changes_nothing(
        accepted in 1u64..6,
        wrong in 0u64..64,
    ) {
        let mut shard = TestShard::with_config(HistoryConfig::default().with_replay_depth(0));
        let txn = new_history().transaction(3);
        for request in 0..accepted {
            shard.modify(txn, request, vec![], Finish::None);
        }
        prop_assume!(wrong != accepted);

        let responses = shard.modify(txn, wrong, vec![write("/stray", 1)], Finish::SimpleCommit);
        prop_assert_eq!(
            single_failure(&responses),
            RequestFailure::OutOfOrderRequest { expected: accepted }
        );

        let responses = shard.read(txn, accepted, "/stray");
        let is_empty_read = matches!(
            single_success(&responses),
            Response::ReadTransactionSuccess { data: None, .. }
        );
        prop_assert!(is_empty_read);
        prop_assert_eq!(shard.pending_commits(), 0);
    }

    #[test]
    fn prop_no_double_apply_below_watermark(
        committed in 10u64..1000,
        older in 0u64..10,
        request in 0u64..4,
        read in any::<bool>(),
    ) {
        let mut shard = TestShard::new();
        let history = new_history();
        shard.modify(history.transaction(committed), 0, vec![write("/n", 1)], Finish::SimpleCommit);
        shard.commit_pending();
        let version = shard.tree.current_version();

        for seq in [older, committed] {
            let txn = history.transaction(seq);
            let responses = if read {
                shard.read(txn, request, "/n")
            } else {
                shard.modify(txn, request, vec![write("/n", 2)], Finish::SimpleCommit)
            };
            prop_assert_eq!(
                single_failure(&responses),
                RequestFailure::CompletedTransaction { last_committed: committed }
            );
        }

        prop_assert_eq!(shard.pending_commits(), 0);
        shard.commit_pending();
        prop_assert_eq!(shard.tree.current_version(), version);
        prop_assert_eq!(shard.tree_value("/n"), Some(Value::Int(1)));
    }
}
