//! InMemoryDataTree: reference tree engine
//!
//! This module implements the `DataTree` trait using:
//! - `Arc<BTreeMap<TreePath, Value>>` as the current node map
//! - `parking_lot::RwLock` for thread-safe access
//! - a version counter bumped once per commit
//!
//! # Design Notes
//!
//! - **Snapshot by Arc clone**: snapshots never copy nodes
//! - **All-or-nothing commit**: a sealed modification's operations are
//!   replayed onto a private copy, and the copy is swapped in only if every
//!   operation applied

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use strata_core::{
    DataTree, StrataResult, TreeModification, TreeOperation, TreePath, TreeSnapshot, Value,
};

use crate::ops::{apply_operation, NodeMap};
use crate::snapshot::TreeSnapshotView;

#[derive(Debug)]
struct TreeState {
    version: u64,
    nodes: Arc<NodeMap>,
}

/// Versioned in-memory data tree
///
/// Thread-safe through `parking_lot::RwLock`.
#[derive(Debug)]
pub struct InMemoryDataTree {
    state: RwLock<TreeState>,
}

impl InMemoryDataTree {
    /// Create a new empty tree at version 0
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TreeState {
                version: 0,
                nodes: Arc::new(NodeMap::new()),
            }),
        }
    }

    /// Current tree version
    pub fn current_version(&self) -> u64 {
        self.state.read().version
    }

    /// Read the committed node at `path`
    pub fn read(&self, path: &TreePath) -> Option<Value> {
        self.state.read().nodes.get(path).cloned()
    }

    /// Number of committed nodes
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Check if the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.state.read().nodes.is_empty()
    }

    /// Commit a sealed modification
    ///
    /// Replays the modification's operation log onto the live tree.
    ///
    /// # Returns
    /// - Ok(version) with the new tree version
    /// - Err if any operation is rejected; the tree is unchanged
    pub fn commit(&self, modification: &dyn TreeModification) -> StrataResult<u64> {
        self.commit_operations(modification.operations())
    }

    /// Apply a batch of operations atomically
    pub fn commit_operations(&self, operations: &[TreeOperation]) -> StrataResult<u64> {
        let mut state = self.state.write();
        let mut next = NodeMap::clone(&state.nodes);
        for operation in operations {
            apply_operation(&mut next, operation)?;
        }
        state.nodes = Arc::new(next);
        state.version += 1;
        debug!(
            version = state.version,
            operations = operations.len(),
            "committed modification"
        );
        Ok(state.version)
    }
}

impl Default for InMemoryDataTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTree for InMemoryDataTree {
    fn take_snapshot(&self) -> Box<dyn TreeSnapshot> {
        let state = self.state.read();
        Box::new(TreeSnapshotView::new(
            state.version,
            Arc::clone(&state.nodes),
        ))
    }
}
