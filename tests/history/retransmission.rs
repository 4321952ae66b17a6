//! Retried and late requests
//!
//! A client retrying after a timeout must see the identical answer, a
//! definitive `CompletedTransaction`, or a `PendingTransaction` it can
//! resynchronize from. Nothing is ever applied twice.

use crate::common::*;

#[test]
fn retried_read_gets_identical_answer() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![write("/a", 1)], Finish::None);
    let first = shard.read(t1, 1, "/a");
    let retry = shard.read(t1, 1, "/a");
    assert_eq!(first, retry);
}

#[test]
fn retried_modify_is_not_reapplied() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![write("/list", 0)], Finish::None);
    let first = shard.modify(t1, 1, vec![write("/list/x", 1)], Finish::None);
    let retry = shard.modify(t1, 1, vec![write("/list/x", 1)], Finish::None);
    assert_eq!(first, retry);

    let responses = shard.read(t1, 2, "/list/x");
    assert!(matches!(
        single_success(&responses),
        Response::ReadTransactionSuccess { data: Some(Value::Int(1)), .. }
    ));
}

#[test]
fn retry_beyond_replay_depth_is_out_of_order() {
    let mut shard = TestShard::with_config(HistoryConfig::default().with_replay_depth(1));
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![], Finish::None);
    shard.modify(t1, 1, vec![], Finish::None);

    let responses = shard.modify(t1, 0, vec![], Finish::None);
    assert_eq!(
        single_failure(&responses),
        RequestFailure::OutOfOrderRequest { expected: 2 }
    );
}

#[test]
fn request_after_abort_is_pending() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![], Finish::None);
    shard.modify(t1, 1, vec![write("/a", 1)], Finish::Abort);

    let responses = shard.read(t1, 2, "/a");
    assert_eq!(
        single_failure(&responses),
        RequestFailure::PendingTransaction { last_request: 1 }
    );
}

#[test]
fn purge_of_pending_commit_is_pending_then_succeeds() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![write("/a", 1)], Finish::SimpleCommit);
    assert_eq!(
        single_failure(&shard.purge(t1, 1)),
        RequestFailure::PendingTransaction { last_request: 0 }
    );

    shard.commit_pending();
    assert!(matches!(
        single_success(&shard.purge(t1, 1)),
        Response::TransactionPurgeSuccess { .. }
    ));
}

#[test]
fn purge_of_aborted_transaction_is_idempotent() {
    let mut shard = TestShard::new();
    let t1 = new_history().transaction(1);

    shard.modify(t1, 0, vec![], Finish::Abort);
    for _ in 0..2 {
        assert!(matches!(
            single_success(&shard.purge(t1, 1)),
            Response::TransactionPurgeSuccess { .. }
        ));
    }
}

#[test]
fn purge_of_open_transaction_fails_the_history() {
    let mut shard = TestShard::new();
    let history = new_history();
    let t1 = history.transaction(1);

    shard.modify(t1, 0, vec![write("/a", 1)], Finish::None);
    let result = shard
        .registry
        .dispatch(TransactionRequest::purge(t1.request(1), client()).into());
    assert!(result.is_err());
    assert!(shard.registry.contains(&history));

    // The open transaction's private view is gone with the failed actor
    let responses = shard.read(t1, 0, "/a");
    assert_eq!(
        single_failure(&responses),
        RequestFailure::DeadTransaction { transaction: t1 }
    );
}

#[test]
fn committed_request_retried_after_restart_is_not_resubmitted() {
    let mut shard = TestShard::new();
    let history = new_history();
    let t5 = history.transaction(5);
    let t6 = history.transaction(6);

    shard.modify(t5, 0, vec![write("/a", 5)], Finish::SimpleCommit);
    shard.modify(t6, 0, vec![], Finish::None);
    assert_eq!(shard.pending_commits(), 1);
    assert!(shard
        .registry
        .dispatch(TransactionRequest::purge(t6.request(1), client()).into())
        .is_err());

    let responses = shard.modify(t5, 0, vec![write("/a", 5)], Finish::SimpleCommit);
    assert_eq!(
        single_failure(&responses),
        RequestFailure::CompletedTransaction { last_committed: 5 }
    );
    assert_eq!(shard.pending_commits(), 1);

    // Not in the tree yet, but new transactions still chain off it
    assert_eq!(shard.tree_value("/a"), None);
    let responses = shard.read(history.transaction(7), 0, "/a");
    assert!(matches!(
        single_success(&responses),
        Response::ReadTransactionSuccess { data: Some(Value::Int(5)), .. }
    ));

    let responses = shard.commit_pending();
    assert_eq!(
        single_success(&responses),
        &Response::TransactionCommitted {
            request: t5.request(0),
            version: 1,
        }
    );
}

#[test]
fn purged_transaction_is_never_revived() {
    let mut shard = TestShard::new();
    let t5 = new_history().transaction(5);

    shard.modify(t5, 0, vec![write("/a", 1)], Finish::Abort);
    single_success(&shard.purge(t5, 1));

    let responses = shard.modify(t5, 0, vec![write("/a", 1)], Finish::SimpleCommit);
    assert_eq!(
        single_failure(&responses),
        RequestFailure::DeadTransaction { transaction: t5 }
    );
    assert_eq!(shard.pending_commits(), 0);
    assert_eq!(shard.tree_value("/a"), None);
}

#[test]
fn sequences_above_signed_range_order_unsigned() {
    let mut shard = TestShard::new();
    let history = new_history();
    let high = i64::MAX as u64 + 10;

    shard.modify(history.transaction(high), 0, vec![write("/a", 1)], Finish::SimpleCommit);
    shard.commit_pending();
    assert_eq!(shard.registry.last_committed(&history), Some(high));

    let responses = shard.read(history.transaction(5), 0, "/a");
    assert_eq!(
        single_failure(&responses),
        RequestFailure::CompletedTransaction { last_committed: high }
    );

    let responses = shard.read(history.transaction(high + 1), 0, "/a");
    assert!(single_success(&responses).is_success());
}
