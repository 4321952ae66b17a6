//! Core types and traits for the Strata history frontend
//!
//! This crate defines the foundational types used throughout the system:
//! - ClientId / HistoryId / TransactionId / RequestId: identifier hierarchy
//! - TreePath: Hierarchical path into the data tree
//! - Value: Node value enum
//! - TreeOperation: write / merge / delete
//! - Error: Error type hierarchy
//! - Traits: Tree engine seams (DataTree, TreeSnapshot, TreeModification)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{StrataError, StrataResult};
pub use traits::{DataTree, TreeModification, TreeOperation, TreeSnapshot};
pub use types::{ClientId, HistoryId, RequestId, TransactionId, TreePath};
pub use value::Value;
