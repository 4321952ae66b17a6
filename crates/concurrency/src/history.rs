//! Shared state of one local history
//!
//! `LocalHistoryContext` owns every transaction the history still tracks,
//! keyed by transaction sequence: open transactions as `TransactionContext`
//! and sealed ones as `RecordedTransaction`. Contexts are moved into the map
//! on open and replaced by their record on seal; nothing else holds them.
//!
//! # Watermark
//!
//! `last_committed` is the highest transaction sequence known to have
//! committed. It only ever moves forward under `u64` ordering.
//!
//! # Chaining
//!
//! The chain tip is a modification whose view holds every commit-sealed
//! transaction of this history that the tree has not confirmed yet. Each
//! commit seal replays the sealed operations on top of the previous tip
//! (or a fresh snapshot), so a transaction that was opened early and
//! sealed late never hides a newer commit. Once the last submitted
//! transaction is confirmed the tree holds everything and the tip is
//! dropped.
//!
//! # Dead Transactions
//!
//! Purged transactions and transactions abandoned by an actor restart are
//! remembered until the watermark passes them, so their sequence can never
//! be allocated again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use strata_core::{
    DataTree, HistoryId, RequestId, StrataError, StrataResult, TransactionId, TreeModification,
};
use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::message::{ReplyTo, SealedTransaction};
use crate::record::{Fate, RecordedTransaction};
use crate::transaction::TransactionContext;

#[derive(Debug)]
enum TrackedTransaction {
    Open(TransactionContext),
    Recorded(RecordedTransaction),
}

/// View the next allocation builds on, and the transaction that produced it
#[derive(Debug)]
struct ChainTip {
    seq: u64,
    modification: Box<dyn TreeModification>,
}

/// Outcome of a purge request against a transaction that is not open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// Recorded state released, or nothing was recorded
    Purged,
    /// Commit still pending; nothing released
    Pending {
        /// Last request the transaction accepted
        last_request: u64,
    },
}

/// State shared by all behaviors of one history
pub struct LocalHistoryContext {
    history_id: HistoryId,
    tree: Arc<dyn DataTree>,
    config: HistoryConfig,
    transactions: BTreeMap<u64, TrackedTransaction>,
    chain_tip: Option<ChainTip>,
    last_committed: Option<u64>,
    highest_seen: Option<u64>,
    dead: BTreeSet<u64>,
    deferred_destroy: BTreeSet<ReplyTo>,
}

impl LocalHistoryContext {
    /// Create the context of a fresh history
    pub fn new(history_id: HistoryId, tree: Arc<dyn DataTree>, config: HistoryConfig) -> Self {
        Self {
            history_id,
            tree,
            config,
            transactions: BTreeMap::new(),
            chain_tip: None,
            last_committed: None,
            highest_seen: None,
            dead: BTreeSet::new(),
            deferred_destroy: BTreeSet::new(),
        }
    }

    /// History identifier
    pub fn history_id(&self) -> HistoryId {
        self.history_id
    }

    /// Identifier of transaction `seq` in this history
    pub fn transaction_id(&self, seq: u64) -> TransactionId {
        self.history_id.transaction(seq)
    }

    /// Tree transactions are allocated against
    pub fn tree(&self) -> &Arc<dyn DataTree> {
        &self.tree
    }

    /// History configuration
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Commit watermark
    pub fn last_committed(&self) -> Option<u64> {
        self.last_committed
    }

    /// Highest transaction sequence this history has seen
    pub fn highest_seen(&self) -> Option<u64> {
        self.highest_seen
    }

    /// Most recently commit-sealed transaction awaiting confirmation
    pub fn last_submitted(&self) -> Option<u64> {
        self.chain_tip.as_ref().map(|tip| tip.seq)
    }

    /// View the next allocated transaction chains off, if any
    pub fn chain_tip(&self) -> Option<&dyn TreeModification> {
        self.chain_tip.as_ref().map(|tip| tip.modification.as_ref())
    }

    /// True if `seq` is at or before the commit watermark
    pub fn is_completed(&self, seq: u64) -> bool {
        self.last_committed
            .map_or(false, |watermark| self.transaction_id(seq).is_at_or_before(watermark))
    }

    /// True if transaction `seq` was purged or abandoned
    pub fn is_dead(&self, seq: u64) -> bool {
        self.dead.contains(&seq)
    }

    /// True if transaction `seq` is open
    pub fn is_open(&self, seq: u64) -> bool {
        matches!(self.transactions.get(&seq), Some(TrackedTransaction::Open(_)))
    }

    /// Sequences of all open transactions, ascending
    pub fn open_transactions(&self) -> impl Iterator<Item = u64> + '_ {
        self.transactions.iter().filter_map(|(seq, tracked)| match tracked {
            TrackedTransaction::Open(_) => Some(*seq),
            TrackedTransaction::Recorded(_) => None,
        })
    }

    /// Open transaction `seq`
    pub fn transaction(&self, seq: u64) -> Option<&TransactionContext> {
        match self.transactions.get(&seq) {
            Some(TrackedTransaction::Open(transaction)) => Some(transaction),
            _ => None,
        }
    }

    /// Open transaction `seq`, mutably
    pub fn transaction_mut(&mut self, seq: u64) -> Option<&mut TransactionContext> {
        match self.transactions.get_mut(&seq) {
            Some(TrackedTransaction::Open(transaction)) => Some(transaction),
            _ => None,
        }
    }

    /// Record of sealed transaction `seq`
    pub fn recorded(&self, seq: u64) -> Option<&RecordedTransaction> {
        match self.transactions.get(&seq) {
            Some(TrackedTransaction::Recorded(record)) => Some(record),
            _ => None,
        }
    }

    /// Allocate and track transaction `seq`
    ///
    /// # Errors
    /// Returns a protocol violation if `seq` is already tracked or dead.
    pub fn open_transaction(&mut self, seq: u64) -> StrataResult<&mut TransactionContext> {
        if self.transactions.contains_key(&seq) || self.dead.contains(&seq) {
            return Err(StrataError::protocol_violation(format!(
                "transaction {} cannot be opened again",
                self.transaction_id(seq)
            )));
        }
        let transaction = TransactionContext::allocate(self, self.transaction_id(seq));
        self.highest_seen = Some(self.highest_seen.map_or(seq, |highest| highest.max(seq)));
        debug!(
            target: "strata::history",
            transaction = %transaction.id(),
            chained = self.chain_tip.is_some(),
            "Transaction opened"
        );
        match self
            .transactions
            .entry(seq)
            .or_insert(TrackedTransaction::Open(transaction))
        {
            TrackedTransaction::Open(transaction) => Ok(transaction),
            TrackedTransaction::Recorded(_) => Err(StrataError::protocol_violation(format!(
                "transaction {} is already sealed",
                self.history_id.transaction(seq)
            ))),
        }
    }

    /// Seal open transaction `seq` with `fate`
    ///
    /// A commit fate advances the watermark, extends the chain tip with the
    /// transaction's operations and returns the sealed modification for
    /// submission. An aborted transaction's modification is dropped.
    ///
    /// # Arguments
    /// * `committer` - requester to answer once the commit is confirmed
    ///
    /// # Errors
    /// Returns a protocol violation if `seq` is not open.
    pub fn seal(
        &mut self,
        seq: u64,
        fate: Fate,
        committer: Option<(ReplyTo, RequestId)>,
    ) -> StrataResult<Option<SealedTransaction>> {
        let transaction = match self.transactions.remove(&seq) {
            Some(TrackedTransaction::Open(transaction)) => transaction,
            Some(recorded) => {
                self.transactions.insert(seq, recorded);
                return Err(StrataError::protocol_violation(format!(
                    "transaction {} is already sealed",
                    self.transaction_id(seq)
                )));
            }
            None => {
                return Err(StrataError::protocol_violation(format!(
                    "transaction {} is not open",
                    self.transaction_id(seq)
                )))
            }
        };

        let id = transaction.id();
        let (mut record, modification) = transaction.seal(fate);
        debug!(
            target: "strata::history",
            transaction = %id,
            fate = fate.name(),
            last_request = record.last_request(),
            "Transaction sealed"
        );

        if !fate.is_commit() {
            self.transactions.insert(seq, TrackedTransaction::Recorded(record));
            return Ok(None);
        }

        self.extend_chain_tip(seq, modification.as_ref());
        if let Some((reply_to, request)) = committer {
            record = record.with_committer(reply_to, request);
        }
        self.transactions.insert(seq, TrackedTransaction::Recorded(record));
        self.advance_watermark(seq);

        Ok(Some(SealedTransaction {
            transaction: id,
            fate,
            modification,
        }))
    }

    /// Apply a commit confirmation for transaction `seq`
    ///
    /// Advances the watermark and releases the record. Returns the requester
    /// awaiting the outcome, if one was recorded.
    pub fn commit_success(&mut self, seq: u64) -> Option<(ReplyTo, RequestId)> {
        self.advance_watermark(seq);

        let pending = matches!(
            self.transactions.get(&seq),
            Some(TrackedTransaction::Recorded(record)) if record.is_pending_commit()
        );
        if !pending {
            warn!(
                target: "strata::history",
                transaction = %self.transaction_id(seq),
                "Commit notification for a transaction not awaiting commit"
            );
            return None;
        }

        // Submission order is commit order: the tree now holds the whole tip
        if self.last_submitted() == Some(seq) {
            self.chain_tip = None;
        }
        match self.transactions.remove(&seq) {
            Some(TrackedTransaction::Recorded(mut record)) => {
                debug!(
                    target: "strata::history",
                    transaction = %record.id(),
                    "Transaction commit confirmed"
                );
                record.take_committer()
            }
            _ => None,
        }
    }

    /// Release the recorded state of transaction `seq`
    ///
    /// # Errors
    /// Returns a protocol violation if `seq` is still open.
    pub fn purge(&mut self, seq: u64) -> StrataResult<PurgeOutcome> {
        match self.transactions.get(&seq) {
            Some(TrackedTransaction::Open(_)) => Err(StrataError::protocol_violation(format!(
                "purge of open transaction {}",
                self.transaction_id(seq)
            ))),
            Some(TrackedTransaction::Recorded(record)) if record.is_pending_commit() => {
                Ok(PurgeOutcome::Pending {
                    last_request: record.last_request(),
                })
            }
            Some(TrackedTransaction::Recorded(_)) => {
                self.transactions.remove(&seq);
                self.mark_dead(seq);
                Ok(PurgeOutcome::Purged)
            }
            None => {
                self.mark_dead(seq);
                Ok(PurgeOutcome::Purged)
            }
        }
    }

    /// Drop every open transaction, remembering them as dead
    ///
    /// Their private views are lost with them. Returns their sequences.
    pub fn abandon_open(&mut self) -> Vec<u64> {
        let abandoned: Vec<u64> = self.open_transactions().collect();
        for seq in &abandoned {
            self.transactions.remove(seq);
            self.mark_dead(*seq);
        }
        abandoned
    }

    /// Remember a destroy requester turned away while transactions were open
    pub fn defer_destroy(&mut self, reply_to: ReplyTo) {
        self.deferred_destroy.insert(reply_to);
    }

    /// True if a destroy request is waiting for open transactions to seal
    pub fn has_deferred_destroy(&self) -> bool {
        !self.deferred_destroy.is_empty()
    }

    /// Take all deferred destroy requesters
    pub fn take_deferred_destroy(&mut self) -> BTreeSet<ReplyTo> {
        std::mem::take(&mut self.deferred_destroy)
    }

    /// True when nothing is open and no commit awaits confirmation
    pub fn is_empty(&self) -> bool {
        self.transactions.values().all(|tracked| match tracked {
            TrackedTransaction::Open(_) => false,
            TrackedTransaction::Recorded(record) => !record.is_pending_commit(),
        })
    }

    /// Number of tracked transactions, open and recorded
    pub fn tracked(&self) -> usize {
        self.transactions.len()
    }

    /// Replay `sealed`'s operations on top of the current tip
    fn extend_chain_tip(&mut self, seq: u64, sealed: &dyn TreeModification) {
        let base = match &self.chain_tip {
            Some(tip) => tip.modification.chain_next(),
            None => self.tree.take_snapshot().new_modification(),
        };
        let mut next = base.chain_next();
        let replayed = sealed.operations().iter().try_for_each(|op| next.apply(op));
        let modification = match replayed {
            Ok(()) => next,
            Err(e) => {
                // The tree rejects the same operations at commit
                warn!(
                    target: "strata::history",
                    transaction = %self.transaction_id(seq),
                    error = %e,
                    "Sealed operations do not apply to the chain tip"
                );
                base
            }
        };
        self.chain_tip = Some(ChainTip { seq, modification });
    }

    fn mark_dead(&mut self, seq: u64) {
        if !self.is_completed(seq) {
            self.dead.insert(seq);
        }
    }

    fn advance_watermark(&mut self, seq: u64) {
        let watermark = self.last_committed.map_or(seq, |watermark| watermark.max(seq));
        self.last_committed = Some(watermark);
        self.dead.retain(|dead| *dead > watermark);
    }
}

impl std::fmt::Debug for LocalHistoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHistoryContext")
            .field("history_id", &self.history_id)
            .field("transactions", &self.transactions.len())
            .field("last_submitted", &self.last_submitted())
            .field("last_committed", &self.last_committed)
            .field("highest_seen", &self.highest_seen)
            .field("dead", &self.dead.len())
            .field("deferred_destroy", &self.deferred_destroy.len())
            .finish()
    }
}
