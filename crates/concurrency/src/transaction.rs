//! Transaction context for one open transaction of a local history
//!
//! A TransactionContext owns the transaction's private modification of the
//! tree and the request sequencing state. It lives in the history's
//! transaction map while open and is consumed when sealed.
//!
//! # Causal Chaining
//!
//! A new transaction starts either from the history's chain tip (so it
//! sees every commit-sealed transaction before it reaches the tree) or,
//! when nothing is awaiting commit, from a fresh tree snapshot.
//!
//! # Request Sequencing
//!
//! Requests against one transaction carry sequence numbers 0, 1, 2, ...
//! `expected_request` is the next acceptable one; it only advances when a
//! request is accepted.

use strata_core::{StrataResult, TransactionId, TreeModification, TreeOperation, TreePath, Value};

use crate::history::LocalHistoryContext;
use crate::message::Response;
use crate::record::{Fate, RecordedTransaction, ReplayBuffer};

/// One allocated, not-yet-sealed transaction
#[derive(Debug)]
pub struct TransactionContext {
    id: TransactionId,
    modification: Box<dyn TreeModification>,
    expected_request: u64,
    replay: ReplayBuffer,
}

impl TransactionContext {
    /// Create a context over an existing modification
    ///
    /// For normal transactions, use `allocate()`.
    pub fn new(id: TransactionId, modification: Box<dyn TreeModification>, replay_depth: usize) -> Self {
        Self {
            id,
            modification,
            expected_request: 0,
            replay: ReplayBuffer::new(replay_depth),
        }
    }

    /// Allocate a transaction in `context`'s history
    ///
    /// Chains off the history's chain tip when there is one, otherwise
    /// starts from a fresh snapshot of the tree.
    pub fn allocate(context: &LocalHistoryContext, id: TransactionId) -> Self {
        let modification = match context.chain_tip() {
            Some(tip) => tip.chain_next(),
            None => context.tree().take_snapshot().new_modification(),
        };
        Self::new(id, modification, context.config().replay_depth)
    }

    /// Transaction identifier
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Sequence of the next acceptable request
    pub fn expected_request(&self) -> u64 {
        self.expected_request
    }

    /// Last accepted request sequence, None before the first one
    pub fn last_request(&self) -> Option<u64> {
        self.expected_request.checked_sub(1)
    }

    /// Apply one operation to the private view
    ///
    /// # Errors
    /// Returns the tree's rejection; the view is unchanged in that case.
    pub fn apply_operation(&mut self, operation: &TreeOperation) -> StrataResult<()> {
        self.modification.apply(operation)
    }

    /// Read through the private view, including own writes
    pub fn read(&self, path: &TreePath) -> StrataResult<Option<Value>> {
        self.modification.read(path)
    }

    /// Check existence through the private view
    pub fn exists(&self, path: &TreePath) -> StrataResult<bool> {
        Ok(self.modification.read(path)?.is_some())
    }

    /// Response previously sent for request `sequence`
    pub fn replay(&self, sequence: u64) -> Option<&Response> {
        self.replay.lookup(sequence)
    }

    /// Accept request `sequence`, retaining its response if one was sent
    pub fn accept(&mut self, sequence: u64, response: Option<Response>) {
        if let Some(response) = response {
            self.replay.record(sequence, response);
        }
        self.expected_request = sequence.wrapping_add(1);
    }

    /// Seal the transaction with `fate`
    ///
    /// Returns the record that replaces this context and the final
    /// modification, which the caller either submits or drops.
    pub fn seal(self, fate: Fate) -> (RecordedTransaction, Box<dyn TreeModification>) {
        let last_request = self.expected_request.wrapping_sub(1);
        let record = RecordedTransaction::new(self.id, fate, last_request, self.replay);
        (record, self.modification)
    }
}
