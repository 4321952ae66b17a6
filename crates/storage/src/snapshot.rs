//! TreeSnapshotView: immutable point-in-time view of the in-memory tree
//!
//! # Design Notes
//!
//! - **Arc share**: Taking a snapshot clones an `Arc`, not the node map
//! - **Immutable**: Once created, the snapshot never changes
//! - **Thread-safe**: Can be safely shared across threads (Arc-wrapped data)
//!
//! Commits build a fresh node map and swap it in, so a snapshot keeps
//! seeing exactly the nodes that existed when it was taken.

use std::sync::Arc;

use strata_core::{StrataResult, TreeModification, TreePath, TreeSnapshot, Value};

use crate::modification::InMemoryModification;
use crate::ops::NodeMap;

/// A snapshot view sharing the tree's node map at snapshot time
///
/// # Example
///
/// ```
/// use strata_core::{TreePath, TreeSnapshot};
/// use strata_storage::TreeSnapshotView;
///
/// let snapshot = TreeSnapshotView::empty(7);
/// assert_eq!(snapshot.version(), 7);
/// assert!(snapshot.read(&TreePath::root()).unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TreeSnapshotView {
    /// Tree version at which this snapshot was taken
    version: u64,
    /// Node map at snapshot time
    nodes: Arc<NodeMap>,
}

impl TreeSnapshotView {
    /// Create a snapshot over an existing node map
    ///
    /// This is typically called by `InMemoryDataTree::take_snapshot()`, not directly.
    pub fn new(version: u64, nodes: Arc<NodeMap>) -> Self {
        Self { version, nodes }
    }

    /// Create an empty snapshot at a given version
    pub fn empty(version: u64) -> Self {
        Self::new(version, Arc::new(NodeMap::new()))
    }

    /// Number of nodes visible in the snapshot
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the snapshot has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TreeSnapshot for TreeSnapshotView {
    fn version(&self) -> u64 {
        self.version
    }

    fn read(&self, path: &TreePath) -> StrataResult<Option<Value>> {
        Ok(self.nodes.get(path).cloned())
    }

    fn new_modification(&self) -> Box<dyn TreeModification> {
        Box::new(InMemoryModification::new(
            self.version,
            Arc::clone(&self.nodes),
        ))
    }
}
