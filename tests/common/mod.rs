//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;

pub use strata_concurrency::{
    Behavior, Command, DestroyLocalHistoryRequest, Effect, Finish, HistoryConfig,
    HistoryRegistry, ReplyTo, RequestFailure, Response, SealedTransaction,
    TransactionCommitSuccess, TransactionRequest,
};
pub use strata_core::{ClientId, HistoryId, RequestId, TransactionId, TreeOperation, TreePath, Value};
pub use strata_storage::InMemoryDataTree;

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn path(s: &str) -> TreePath {
    TreePath::parse(s).unwrap()
}

pub fn write(p: &str, value: i64) -> TreeOperation {
    TreeOperation::Write {
        path: path(p),
        data: Value::Int(value),
    }
}

pub fn delete(p: &str) -> TreeOperation {
    TreeOperation::Delete { path: path(p) }
}

pub fn client() -> ReplyTo {
    ReplyTo::new("client")
}

// ============================================================================
// TestShard - registry plus an in-process commit pipeline
// ============================================================================

/// One shard: a tree, its history registry and a commit pipeline.
///
/// Submitted transactions are held until `commit_pending()` applies them to
/// the tree in submission order and feeds the confirmations back.
pub struct TestShard {
    pub tree: Arc<InMemoryDataTree>,
    pub registry: HistoryRegistry,
    submitted: Vec<SealedTransaction>,
}

impl TestShard {
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        init_tracing();
        let tree = Arc::new(InMemoryDataTree::new());
        let registry = HistoryRegistry::new(tree.clone(), config);
        Self {
            tree,
            registry,
            submitted: Vec::new(),
        }
    }

    /// Dispatch `command`, keep submissions, return the replies.
    pub fn send(&mut self, command: impl Into<Command>) -> Vec<Response> {
        let effects = self.registry.dispatch(command.into()).unwrap();
        self.collect(effects)
    }

    pub fn read(&mut self, txn: TransactionId, request: u64, p: &str) -> Vec<Response> {
        self.send(TransactionRequest::read(txn.request(request), client(), path(p)))
    }

    pub fn exists(&mut self, txn: TransactionId, request: u64, p: &str) -> Vec<Response> {
        self.send(TransactionRequest::exists(txn.request(request), client(), path(p)))
    }

    pub fn modify(
        &mut self,
        txn: TransactionId,
        request: u64,
        ops: Vec<TreeOperation>,
        finish: Finish,
    ) -> Vec<Response> {
        self.send(TransactionRequest::modify(txn.request(request), client(), ops, finish))
    }

    pub fn purge(&mut self, txn: TransactionId, request: u64) -> Vec<Response> {
        self.send(TransactionRequest::purge(txn.request(request), client()))
    }

    pub fn destroy(&mut self, history: HistoryId, owner: &str) -> Vec<Response> {
        self.send(DestroyLocalHistoryRequest {
            history,
            reply_to: ReplyTo::new(owner),
        })
    }

    /// Number of sealed transactions awaiting commit
    pub fn pending_commits(&self) -> usize {
        self.submitted.len()
    }

    /// Commit every submitted transaction and deliver the confirmations.
    pub fn commit_pending(&mut self) -> Vec<Response> {
        let submitted = std::mem::take(&mut self.submitted);
        let mut responses = Vec::new();
        for sealed in submitted {
            let version = self.tree.commit(sealed.modification.as_ref()).unwrap();
            responses.extend(self.send(TransactionCommitSuccess {
                transaction: sealed.transaction,
                version,
            }));
        }
        responses
    }

    pub fn behavior(&self, history: &HistoryId) -> Option<Behavior> {
        self.registry.behavior(history)
    }

    pub fn tree_value(&self, p: &str) -> Option<Value> {
        self.tree.read(&path(p))
    }

    fn collect(&mut self, effects: Vec<Effect>) -> Vec<Response> {
        let mut responses = Vec::new();
        for effect in effects {
            match effect {
                Effect::Reply { response, .. } => responses.push(response),
                Effect::Submit(sealed) => self.submitted.push(sealed),
            }
        }
        responses
    }
}

pub fn new_history() -> HistoryId {
    HistoryId::new(ClientId::new(), 1)
}

/// The single failure in `responses`
pub fn single_failure(responses: &[Response]) -> RequestFailure {
    assert_eq!(responses.len(), 1, "expected one response: {:?}", responses);
    responses[0]
        .as_failure()
        .cloned()
        .unwrap_or_else(|| panic!("expected a failure, got {:?}", responses[0]))
}

/// The single successful response in `responses`
pub fn single_success(responses: &[Response]) -> &Response {
    assert_eq!(responses.len(), 1, "expected one response: {:?}", responses);
    assert!(responses[0].is_success(), "unexpected failure: {:?}", responses[0]);
    &responses[0]
}
