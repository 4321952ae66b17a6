//! End-to-end scenarios of one history
//!
//! Each test walks one of the canonical request sequences and checks both
//! the replies and what reaches the tree.

use crate::common::*;

#[test]
fn commit_then_read_is_completed() {
    let mut shard = TestShard::new();
    let history = new_history();
    let t1 = history.transaction(5);

    let responses = shard.modify(t1, 0, vec![write("/a", 1)], Finish::SimpleCommit);
    assert!(responses.is_empty());
    assert_eq!(shard.pending_commits(), 1);
    assert_eq!(shard.behavior(&history), Some(Behavior::Idle));
    assert_eq!(shard.registry.last_committed(&history), Some(5));

    let responses = shard.read(t1, 1, "/a");
    assert_eq!(
        single_failure(&responses),
        RequestFailure::CompletedTransaction { last_committed: 5 }
    );

    let responses = shard.commit_pending();
    assert!(matches!(
        single_success(&responses),
        Response::TransactionCommitted { .. }
    ));
    assert_eq!(shard.tree_value("/a"), Some(Value::Int(1)));
}

#[test]
fn skipped_request_is_out_of_order() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(5);

    single_success(&shard.modify(t1, 0, vec![write("/a", 1)], Finish::None));
    let responses = shard.modify(t1, 2, vec![write("/b", 2)], Finish::SimpleCommit);
    assert_eq!(
        single_failure(&responses),
        RequestFailure::OutOfOrderRequest { expected: 1 }
    );

    shard.modify(t1, 1, vec![], Finish::SimpleCommit);
    shard.commit_pending();
    assert_eq!(shard.tree_value("/a"), Some(Value::Int(1)));
    assert_eq!(shard.tree_value("/b"), None);
}

#[test]
fn concurrent_open_transactions_do_not_see_each_other() {
    let mut shard = TestShard::new();
    let history = new_history();
    let t1 = history.transaction(5);
    let t2 = history.transaction(7);

    single_success(&shard.modify(t1, 0, vec![write("/t1", 1)], Finish::None));
    single_success(&shard.modify(t2, 0, vec![write("/t2", 2)], Finish::None));
    assert!(matches!(
        shard.behavior(&history),
        Some(Behavior::QueuedTransactions { .. })
    ));

    let responses = shard.read(t2, 1, "/t1");
    assert!(matches!(
        single_success(&responses),
        Response::ReadTransactionSuccess { data: None, .. }
    ));

    single_success(&shard.modify(t1, 1, vec![], Finish::Abort));
    shard.modify(t2, 2, vec![], Finish::SimpleCommit);
    shard.commit_pending();

    assert_eq!(shard.tree_value("/t1"), None);
    assert_eq!(shard.tree_value("/t2"), Some(Value::Int(2)));
    assert_eq!(shard.behavior(&history), Some(Behavior::Idle));
}

#[test]
fn destroy_deferred_until_open_transaction_seals() {
    let mut shard = TestShard::new();
    let history = new_history();
    let t1 = history.transaction(5);

    shard.modify(t1, 0, vec![write("/a", 1)], Finish::None);
    let responses = shard.destroy(history, "owner");
    assert_eq!(
        single_failure(&responses),
        RequestFailure::BusyLocalHistory { transaction: t1 }
    );
    assert!(shard.registry.contains(&history));

    let responses = shard.modify(t1, 1, vec![], Finish::Abort);
    assert_eq!(
        responses,
        vec![
            Response::ModifyTransactionSuccess {
                request: t1.request(1)
            },
            Response::DestroyLocalHistoryResponse { history },
        ]
    );
    assert!(!shard.registry.contains(&history));
    assert!(shard.registry.is_retired(&history));
}

#[test]
fn older_transaction_after_commit_is_completed() {
    let mut shard = TestShard::new();
    let history = new_history();

    shard.modify(history.transaction(5), 0, vec![write("/a", 1)], Finish::SimpleCommit);
    shard.commit_pending();

    let t3 = history.transaction(3);
    let read = shard.read(t3, 0, "/a");
    let modify = shard.modify(t3, 0, vec![write("/a", 9)], Finish::SimpleCommit);
    for responses in [read, modify] {
        assert_eq!(
            single_failure(&responses),
            RequestFailure::CompletedTransaction { last_committed: 5 }
        );
    }
    assert_eq!(shard.pending_commits(), 0);
    assert_eq!(shard.tree_value("/a"), Some(Value::Int(1)));
}

#[test]
fn exists_sees_own_writes() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![write("/a", 1)], Finish::None);
    let responses = shard.exists(t1, 1, "/a");
    assert!(matches!(
        single_success(&responses),
        Response::ExistsTransactionSuccess { exists: true, .. }
    ));
    let responses = shard.exists(t1, 2, "/b");
    assert!(matches!(
        single_success(&responses),
        Response::ExistsTransactionSuccess { exists: false, .. }
    ));
}

#[test]
fn failed_modification_commits_nothing() {
    let mut shard = TestShard::new();
    let history = new_history();
    let t1 = history.transaction(1);

    let responses = shard.modify(
        t1,
        0,
        vec![write("/a", 1), write("/nope/child", 2)],
        Finish::SimpleCommit,
    );
    assert!(matches!(
        single_failure(&responses),
        RequestFailure::ModificationFailed { .. }
    ));
    assert_eq!(shard.pending_commits(), 0);
    assert_eq!(shard.registry.last_committed(&history), None);
    assert_eq!(shard.tree_value("/a"), None);
}
