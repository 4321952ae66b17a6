//! Local transaction history layer
//!
//! This crate implements the per-shard local history frontend:
//! - TransactionContext: one open transaction over a private tree modification
//! - RecordedTransaction: fate of a sealed transaction, kept for late requests
//! - LocalHistoryContext: transactions, commit watermark and modification chain
//! - Behavior: Idle / OpenTransaction / QueuedTransactions / Closed state machine
//! - LocalHistoryActor: single-threaded dispatch loop of one history
//! - HistoryRegistry: routes a shard's commands to its histories
//!
//! Client rejections are data (`RequestFailure` inside a `Response`);
//! `StrataError` only reports failures of the history itself.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actor;
pub mod behavior;
pub mod config;
pub mod history;
pub mod message;
pub mod record;
pub mod registry;
pub mod transaction;

pub use actor::LocalHistoryActor;
pub use behavior::Behavior;
pub use config::{HistoryConfig, CONFIG_FILE_NAME, DEFAULT_REPLAY_DEPTH};
pub use history::{LocalHistoryContext, PurgeOutcome};
pub use message::{
    Command, DestroyLocalHistoryRequest, Effect, Finish, ReplyTo, RequestFailure, RequestKind,
    Response, SealedTransaction, TransactionCommitSuccess, TransactionRequest,
};
pub use record::{Fate, RecordedTransaction, ReplayBuffer};
pub use registry::HistoryRegistry;
pub use transaction::TransactionContext;
