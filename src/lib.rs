//! Strata local history - per-shard transaction history frontend
//!
//! A local history is a client-scoped, causally ordered stream of
//! transactions against one shard's data tree. This crate ties together:
//!
//! - [`strata_core`]: identifiers, tree paths and values, tree-engine traits
//! - [`strata_storage`]: the in-memory reference tree engine
//! - [`strata_concurrency`]: the history state machine, dispatch loop and
//!   shard-level registry
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use strata_history::{
//!     ClientId, Finish, HistoryConfig, HistoryId, HistoryRegistry, InMemoryDataTree,
//!     ReplyTo, TransactionRequest, TreeOperation, TreePath, Value,
//! };
//!
//! let tree = Arc::new(InMemoryDataTree::new());
//! let registry = HistoryRegistry::new(tree.clone(), HistoryConfig::default());
//!
//! let history = HistoryId::new(ClientId::new(), 1);
//! let write = TreeOperation::Write {
//!     path: TreePath::parse("/greeting").unwrap(),
//!     data: Value::from("hello"),
//! };
//! let request = TransactionRequest::modify(
//!     history.transaction(1).request(0),
//!     ReplyTo::new("client"),
//!     vec![write],
//!     Finish::SimpleCommit,
//! );
//!
//! // The sealed transaction comes back as a submission for the commit pipeline
//! let effects = registry.dispatch(request.into()).unwrap();
//! let sealed = effects.into_iter().find_map(|e| e.into_submit()).unwrap();
//! tree.commit(sealed.modification.as_ref()).unwrap();
//! ```

pub use strata_concurrency::*;
pub use strata_core::{
    ClientId, DataTree, HistoryId, RequestId, StrataError, StrataResult, TransactionId,
    TreeModification, TreeOperation, TreePath, TreeSnapshot, Value,
};
pub use strata_storage::{InMemoryDataTree, InMemoryModification, TreeSnapshotView};
