//! Recorded fate of sealed transactions
//!
//! Once a transaction is sealed its live state is gone, but the history
//! must still answer late or duplicate requests for it deterministically.
//! A `RecordedTransaction` keeps just enough for that: the fate, the last
//! accepted request, and the most recent responses.
//!
//! Commit-sealed records additionally keep the requester to notify once
//! the commit is durable.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use strata_core::{RequestId, TransactionId};

use crate::message::{ReplyTo, Response};

/// Terminal outcome of a sealed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fate {
    /// Discarded; effects never reach the tree
    Aborted,
    /// Committed directly
    SimpleCommit,
    /// Committed through the three-phase coordinator
    CoordinatedCommit,
}

impl Fate {
    /// True for either commit fate
    pub fn is_commit(self) -> bool {
        matches!(self, Fate::SimpleCommit | Fate::CoordinatedCommit)
    }

    /// Fate name for logs
    pub fn name(self) -> &'static str {
        match self {
            Fate::Aborted => "aborted",
            Fate::SimpleCommit => "simple-commit",
            Fate::CoordinatedCommit => "coordinated-commit",
        }
    }
}

/// Bounded buffer of the latest responses of one transaction
///
/// Keyed by request sequence. Oldest entries fall out first.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    depth: usize,
    entries: VecDeque<(u64, Response)>,
}

impl ReplayBuffer {
    /// Buffer retaining at most `depth` responses
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            entries: VecDeque::with_capacity(depth.min(64)),
        }
    }

    /// Retain the response sent for request `sequence`
    pub fn record(&mut self, sequence: u64, response: Response) {
        if self.depth == 0 {
            return;
        }
        self.entries.push_back((sequence, response));
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    /// Response previously sent for request `sequence`, if still retained
    pub fn lookup(&self, sequence: u64) -> Option<&Response> {
        self.entries
            .iter()
            .find(|(seq, _)| *seq == sequence)
            .map(|(_, response)| response)
    }

    /// Number of retained responses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable record of a sealed transaction
#[derive(Debug)]
pub struct RecordedTransaction {
    id: TransactionId,
    fate: Fate,
    last_request: u64,
    replay: ReplayBuffer,
    committer: Option<(ReplyTo, RequestId)>,
}

impl RecordedTransaction {
    /// Record a sealed transaction
    pub fn new(id: TransactionId, fate: Fate, last_request: u64, replay: ReplayBuffer) -> Self {
        Self {
            id,
            fate,
            last_request,
            replay,
            committer: None,
        }
    }

    /// Attach the requester awaiting the commit outcome
    pub fn with_committer(mut self, reply_to: ReplyTo, request: RequestId) -> Self {
        self.committer = Some((reply_to, request));
        self
    }

    /// Transaction identifier
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Recorded fate
    pub fn fate(&self) -> Fate {
        self.fate
    }

    /// Last request the transaction accepted
    pub fn last_request(&self) -> u64 {
        self.last_request
    }

    /// True while a commit-sealed transaction waits for its commit notification
    pub fn is_pending_commit(&self) -> bool {
        self.fate.is_commit()
    }

    /// Response previously sent for request `sequence`
    pub fn replay(&self, sequence: u64) -> Option<&Response> {
        self.replay.lookup(sequence)
    }

    /// Requester awaiting the commit outcome, taken at most once
    pub fn take_committer(&mut self) -> Option<(ReplyTo, RequestId)> {
        self.committer.take()
    }
}
