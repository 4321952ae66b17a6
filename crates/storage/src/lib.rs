//! Reference tree engine for the history frontend
//!
//! This crate implements the tree-engine traits from `strata-core`:
//! - InMemoryDataTree: versioned tree with atomic commit of sealed modifications
//! - TreeSnapshotView: immutable point-in-time view (Arc-shared node map)
//! - InMemoryModification: copy-on-write private view with an operation log
//!
//! The history state machine only ever sees the traits; this engine backs
//! tests and single-process deployments.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod modification;
pub mod ops;
pub mod snapshot;
pub mod tree;

pub use modification::InMemoryModification;
pub use ops::{apply_operation, NodeMap};
pub use snapshot::TreeSnapshotView;
pub use tree::InMemoryDataTree;
