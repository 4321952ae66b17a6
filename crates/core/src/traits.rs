//! Core traits for the tree engine abstraction
//!
//! The history frontend never touches tree internals. It consumes three
//! seams:
//!
//! - `DataTree`: the live, versioned tree; hands out snapshots
//! - `TreeSnapshot`: an immutable point-in-time view; starts modifications
//! - `TreeModification`: a private, mutable view used by one transaction
//!
//! A modification records the operations applied to it so that the commit
//! pipeline can replay them onto the live tree once the transaction is
//! sealed. `chain_next` starts a new modification whose view includes
//! everything applied to this one, which is how a transaction sees the
//! effects of the previously sealed transaction of the same history.

use crate::error::StrataResult;
use crate::types::TreePath;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One modification operation against the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeOperation {
    /// Replace the node at `path`
    Write {
        /// Target path
        path: TreePath,
        /// New node value
        data: Value,
    },
    /// Merge `data` into the node at `path`
    Merge {
        /// Target path
        path: TreePath,
        /// Value to merge
        data: Value,
    },
    /// Remove the node at `path` and its subtree
    Delete {
        /// Target path
        path: TreePath,
    },
}

impl TreeOperation {
    /// Path targeted by this operation
    pub fn path(&self) -> &TreePath {
        match self {
            TreeOperation::Write { path, .. }
            | TreeOperation::Merge { path, .. }
            | TreeOperation::Delete { path } => path,
        }
    }

    /// Short operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            TreeOperation::Write { .. } => "write",
            TreeOperation::Merge { .. } => "merge",
            TreeOperation::Delete { .. } => "delete",
        }
    }
}

/// Live versioned tree
///
/// Thread safety: snapshots may be taken from many histories concurrently.
pub trait DataTree: Send + Sync {
    /// Take an immutable snapshot of the current tree state
    fn take_snapshot(&self) -> Box<dyn TreeSnapshot>;
}

/// Immutable point-in-time view of the tree
pub trait TreeSnapshot: Send + Sync {
    /// Tree version this snapshot was taken at
    fn version(&self) -> u64;

    /// Read the node at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the tree engine fails the read.
    fn read(&self, path: &TreePath) -> StrataResult<Option<Value>>;

    /// Start a new modification on top of this snapshot
    fn new_modification(&self) -> Box<dyn TreeModification>;
}

/// Private mutable view of the tree owned by one transaction
pub trait TreeModification: fmt::Debug + Send {
    /// Apply one operation to this view
    ///
    /// # Errors
    ///
    /// Returns `StrataError::TreeRejected` if the operation is structurally
    /// invalid against the current view. A rejected operation leaves the
    /// view unchanged.
    fn apply(&mut self, operation: &TreeOperation) -> StrataResult<()>;

    /// Read the node at `path`, including this view's own changes
    ///
    /// # Errors
    ///
    /// Returns an error if the tree engine fails the read.
    fn read(&self, path: &TreePath) -> StrataResult<Option<Value>>;

    /// Start a new modification whose base is this view
    fn chain_next(&self) -> Box<dyn TreeModification>;

    /// Operations applied to this modification, in order
    fn operations(&self) -> &[TreeOperation];

    /// Tree version the chain was originally started from
    fn base_version(&self) -> u64;
}
