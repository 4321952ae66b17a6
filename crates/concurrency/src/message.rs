//! Commands consumed and responses produced by a local history
//!
//! Every rejection a client can legitimately trigger is a `RequestFailure`
//! carried inside a `Response`; none of them is an error of the history
//! itself. The dispatch loop turns each command into a list of `Effect`s:
//! replies to send and sealed transactions to hand to the commit pipeline.

use crate::record::Fate;
use serde::{Deserialize, Serialize};
use std::fmt;
use strata_core::{
    HistoryId, RequestId, TransactionId, TreeModification, TreeOperation, TreePath, Value,
};
use thiserror::Error;

/// Address a response is delivered to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplyTo(String);

impl ReplyTo {
    /// Create a reply address
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a `ModifyTransactionRequest` finishes its transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Finish {
    /// Keep the transaction open for more requests
    None,
    /// Seal and discard
    Abort,
    /// Seal and commit directly
    SimpleCommit,
    /// Seal and commit through the three-phase coordinator
    CoordinatedCommit,
}

impl Finish {
    /// Fate recorded when this finish seals the transaction
    pub fn fate(self) -> Option<Fate> {
        match self {
            Finish::None => None,
            Finish::Abort => Some(Fate::Aborted),
            Finish::SimpleCommit => Some(Fate::SimpleCommit),
            Finish::CoordinatedCommit => Some(Fate::CoordinatedCommit),
        }
    }
}

/// Payload of a transaction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Read a node through the transaction
    Read {
        /// Node to read
        path: TreePath,
    },
    /// Check whether a node exists through the transaction
    Exists {
        /// Node to check
        path: TreePath,
    },
    /// Apply modifications, then act on `finish`
    Modify {
        /// Operations, applied in order
        modifications: Vec<TreeOperation>,
        /// What to do with the transaction afterwards
        finish: Finish,
    },
    /// Release the recorded state of a sealed transaction
    Purge,
}

impl RequestKind {
    /// Request name for logs
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Read { .. } => "read",
            RequestKind::Exists { .. } => "exists",
            RequestKind::Modify { .. } => "modify",
            RequestKind::Purge => "purge",
        }
    }
}

/// A client request against one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Target transaction and request sequence
    pub id: RequestId,
    /// Where the answer goes
    pub reply_to: ReplyTo,
    /// What is requested
    pub kind: RequestKind,
}

impl TransactionRequest {
    /// `ReadTransactionRequest`
    pub fn read(id: RequestId, reply_to: ReplyTo, path: TreePath) -> Self {
        Self {
            id,
            reply_to,
            kind: RequestKind::Read { path },
        }
    }

    /// `ExistsTransactionRequest`
    pub fn exists(id: RequestId, reply_to: ReplyTo, path: TreePath) -> Self {
        Self {
            id,
            reply_to,
            kind: RequestKind::Exists { path },
        }
    }

    /// `ModifyTransactionRequest`
    pub fn modify(
        id: RequestId,
        reply_to: ReplyTo,
        modifications: Vec<TreeOperation>,
        finish: Finish,
    ) -> Self {
        Self {
            id,
            reply_to,
            kind: RequestKind::Modify {
                modifications,
                finish,
            },
        }
    }

    /// `TransactionPurgeRequest`
    pub fn purge(id: RequestId, reply_to: ReplyTo) -> Self {
        Self {
            id,
            reply_to,
            kind: RequestKind::Purge,
        }
    }

    /// Target transaction
    pub fn transaction(&self) -> TransactionId {
        self.id.transaction
    }
}

/// `DestroyLocalHistoryRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyLocalHistoryRequest {
    /// History to destroy
    pub history: HistoryId,
    /// Where the eventual `DestroyLocalHistoryResponse` goes
    pub reply_to: ReplyTo,
}

/// `TransactionCommitSuccess`, injected by the commit pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCommitSuccess {
    /// Transaction that is now durable in the tree
    pub transaction: TransactionId,
    /// Tree version the commit produced
    pub version: u64,
}

/// Everything a local history consumes, in delivery order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Client transaction request
    Transaction(TransactionRequest),
    /// Client request to destroy the history
    Destroy(DestroyLocalHistoryRequest),
    /// Commit pipeline notification
    CommitSuccess(TransactionCommitSuccess),
}

impl Command {
    /// History this command is addressed to
    pub fn history(&self) -> HistoryId {
        match self {
            Command::Transaction(request) => request.id.transaction.history,
            Command::Destroy(request) => request.history,
            Command::CommitSuccess(notification) => notification.transaction.history,
        }
    }

    /// Command name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Transaction(request) => request.kind.name(),
            Command::Destroy(_) => "destroy",
            Command::CommitSuccess(_) => "commit-success",
        }
    }
}

impl From<TransactionRequest> for Command {
    fn from(request: TransactionRequest) -> Self {
        Command::Transaction(request)
    }
}

impl From<DestroyLocalHistoryRequest> for Command {
    fn from(request: DestroyLocalHistoryRequest) -> Self {
        Command::Destroy(request)
    }
}

impl From<TransactionCommitSuccess> for Command {
    fn from(notification: TransactionCommitSuccess) -> Self {
        Command::CommitSuccess(notification)
    }
}

/// Typed rejection of a request
///
/// A retrying client that sees `CompletedTransaction` can stop retrying;
/// one that sees `PendingTransaction` can resynchronize from `last_request`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RequestFailure {
    /// Transaction is at or before the history's commit watermark
    #[error("transaction already completed, last committed transaction is {last_committed}")]
    CompletedTransaction {
        /// Current watermark
        last_committed: u64,
    },

    /// Transaction is sealed but not yet finalized
    #[error("transaction is sealed, last accepted request is {last_request}")]
    PendingTransaction {
        /// Last request the transaction accepted
        last_request: u64,
    },

    /// Ordering context for the transaction was superseded
    #[error("transaction cannot be reconstructed, last known transaction is {last_known}")]
    AbortedTransaction {
        /// Highest transaction sequence the history has seen
        last_known: u64,
    },

    /// Request sequence is not the next one expected
    #[error("out-of-order request, expected request {expected}")]
    OutOfOrderRequest {
        /// Sequence the transaction expects next
        expected: u64,
    },

    /// Transaction was purged or abandoned; its sequence cannot be reused
    #[error("transaction {transaction} is dead")]
    DeadTransaction {
        /// The dead transaction
        transaction: TransactionId,
    },

    /// The history no longer accepts transactions
    #[error("history {history} is closed")]
    DeadHistory {
        /// The closed history
        history: HistoryId,
    },

    /// Destroy requested while a transaction is still open
    #[error("history is busy with open transaction {transaction}")]
    BusyLocalHistory {
        /// The open transaction
        transaction: TransactionId,
    },

    /// A modification was rejected by the tree; the transaction was aborted
    #[error("modification failed, transaction aborted: {reason}")]
    ModificationFailed {
        /// Tree engine's reason
        reason: String,
    },
}

/// Answer sent to a requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// `ReadTransactionSuccess`
    ReadTransactionSuccess {
        /// Answered request
        request: RequestId,
        /// Node read, if present
        data: Option<Value>,
    },
    /// `ExistsTransactionSuccess`
    ExistsTransactionSuccess {
        /// Answered request
        request: RequestId,
        /// Whether the node exists
        exists: bool,
    },
    /// `ModifyTransactionSuccess`
    ModifyTransactionSuccess {
        /// Answered request
        request: RequestId,
    },
    /// The sealing request of a committed transaction, answered once durable
    TransactionCommitted {
        /// The sealing request
        request: RequestId,
        /// Tree version the commit produced
        version: u64,
    },
    /// `TransactionPurgeSuccess`
    TransactionPurgeSuccess {
        /// Answered request
        request: RequestId,
    },
    /// `DestroyLocalHistoryResponse`
    DestroyLocalHistoryResponse {
        /// The destroyed history
        history: HistoryId,
    },
    /// Rejection of a transaction request
    TransactionFailure {
        /// Rejected request
        request: RequestId,
        /// Why
        failure: RequestFailure,
    },
    /// Rejection of a history-level request
    HistoryFailure {
        /// Target history
        history: HistoryId,
        /// Why
        failure: RequestFailure,
    },
}

impl Response {
    /// Rejection of `request`
    pub fn failure(request: RequestId, failure: RequestFailure) -> Self {
        Response::TransactionFailure { request, failure }
    }

    /// The failure carried by this response, if any
    pub fn as_failure(&self) -> Option<&RequestFailure> {
        match self {
            Response::TransactionFailure { failure, .. }
            | Response::HistoryFailure { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// True unless this is a rejection
    pub fn is_success(&self) -> bool {
        self.as_failure().is_none()
    }
}

/// A transaction sealed for commit, handed to the commit pipeline
///
/// The pipeline applies `modification` to the tree and then delivers
/// `TransactionCommitSuccess` back into the history.
#[derive(Debug)]
pub struct SealedTransaction {
    /// Sealed transaction
    pub transaction: TransactionId,
    /// `SimpleCommit` or `CoordinatedCommit`
    pub fate: Fate,
    /// The transaction's private modification, final
    pub modification: Box<dyn TreeModification>,
}

impl SealedTransaction {
    /// True if the commit goes through the three-phase coordinator
    pub fn is_coordinated(&self) -> bool {
        self.fate == Fate::CoordinatedCommit
    }
}

/// Side effect of handling one command
#[derive(Debug)]
pub enum Effect {
    /// Send `response` to `to`
    Reply {
        /// Destination
        to: ReplyTo,
        /// Payload
        response: Response,
    },
    /// Hand a sealed transaction to the commit pipeline
    Submit(SealedTransaction),
}

impl Effect {
    /// Reply effect
    pub fn reply(to: ReplyTo, response: Response) -> Self {
        Effect::Reply { to, response }
    }

    /// The response, if this is a reply
    pub fn as_reply(&self) -> Option<(&ReplyTo, &Response)> {
        match self {
            Effect::Reply { to, response } => Some((to, response)),
            Effect::Submit(_) => None,
        }
    }

    /// The sealed transaction, if this is a submission
    pub fn into_submit(self) -> Option<SealedTransaction> {
        match self {
            Effect::Submit(sealed) => Some(sealed),
            Effect::Reply { .. } => None,
        }
    }
}
