//! Copy-on-write modification of the in-memory tree
//!
//! The view is an `Arc<NodeMap>` shared with the snapshot (or the parent
//! modification) it was started from; the first write clones it. Every
//! accepted operation is appended to the operation log, which is what the
//! live tree replays at commit.

use std::sync::Arc;

use strata_core::{StrataResult, TreeModification, TreeOperation, TreePath, Value};

use crate::ops::{apply_operation, NodeMap};

/// Private mutable view of the in-memory tree
#[derive(Debug, Clone)]
pub struct InMemoryModification {
    base_version: u64,
    view: Arc<NodeMap>,
    operations: Vec<TreeOperation>,
}

impl InMemoryModification {
    /// Start a modification over `view`
    pub fn new(base_version: u64, view: Arc<NodeMap>) -> Self {
        Self {
            base_version,
            view,
            operations: Vec::new(),
        }
    }

    /// True if no operation has been applied
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl TreeModification for InMemoryModification {
    fn apply(&mut self, operation: &TreeOperation) -> StrataResult<()> {
        apply_operation(Arc::make_mut(&mut self.view), operation)?;
        self.operations.push(operation.clone());
        Ok(())
    }

    fn read(&self, path: &TreePath) -> StrataResult<Option<Value>> {
        Ok(self.view.get(path).cloned())
    }

    fn chain_next(&self) -> Box<dyn TreeModification> {
        Box::new(InMemoryModification::new(
            self.base_version,
            Arc::clone(&self.view),
        ))
    }

    fn operations(&self) -> &[TreeOperation] {
        &self.operations
    }

    fn base_version(&self) -> u64 {
        self.base_version
    }
}
