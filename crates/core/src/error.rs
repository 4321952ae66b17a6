//! Error types for the history frontend
//!
//! `StrataError` covers local failures only: tree-engine rejections, bad
//! input, protocol violations by a caller and configuration problems.
//! Client-visible rejections of transaction requests are not errors at this
//! level; they travel as response data.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{HistoryId, TreePath};
use thiserror::Error;

/// Result type alias for Strata operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Error types for the history frontend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrataError {
    /// The tree engine refused an operation
    #[error("Tree rejected operation at {path}: {reason}")]
    TreeRejected {
        /// Path the operation targeted
        path: TreePath,
        /// Why the tree refused it
        reason: String,
    },

    /// Malformed input (paths, identifiers)
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the problem
        message: String,
    },

    /// A caller sent a request the protocol does not allow in this state
    ///
    /// Fatal for the receiving history actor.
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Description of the violation
        message: String,
    },

    /// Command delivered to a history that already finished or failed
    #[error("History {history} is no longer running")]
    HistoryFinished {
        /// The finished history
        history: HistoryId,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

impl StrataError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StrataError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a tree rejection error
    pub fn tree_rejected(path: &TreePath, reason: impl Into<String>) -> Self {
        StrataError::TreeRejected {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Create a protocol violation error
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        StrataError::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        StrataError::Config {
            message: message.into(),
        }
    }
}
