//! Core identifier types for the history frontend
//!
//! This module defines the foundational types:
//! - ClientId: Unique identifier for a frontend client
//! - HistoryId: Client-scoped local history identifier
//! - TransactionId: History + transaction sequence number
//! - RequestId: Transaction + per-transaction request sequence number
//! - TreePath: Hierarchical path into the data tree
//!
//! ## Sequence Ordering
//!
//! Transaction and request sequence numbers are `u64` and are ordered with
//! the native unsigned ordering. A sequence above `i64::MAX` is newer than
//! every sequence below it; there is no signed interpretation anywhere.

use crate::error::{StrataError, StrataResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a frontend client
///
/// A ClientId is a wrapper around a UUID v4. Each client generation gets a
/// fresh id, so histories of a restarted client never collide with the
/// histories of its previous incarnation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Create a new random ClientId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ClientId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a ClientId from a string representation
    ///
    /// # Errors
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this ClientId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one local history: a client plus a client-assigned cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryId {
    /// Owning client
    pub client: ClientId,
    /// Client-assigned history number
    pub history: u64,
}

impl HistoryId {
    /// Create a new history identifier
    pub fn new(client: ClientId, history: u64) -> Self {
        Self { client, history }
    }

    /// Identifier of transaction `seq` in this history
    pub fn transaction(&self, seq: u64) -> TransactionId {
        TransactionId::new(*self, seq)
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.client, self.history)
    }
}

/// Identifier of one transaction within a history
///
/// Ordering is history first, then the unsigned transaction sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    /// History this transaction belongs to
    pub history: HistoryId,
    /// Transaction sequence number within the history
    pub seq: u64,
}

impl TransactionId {
    /// Create a new transaction identifier
    pub fn new(history: HistoryId, seq: u64) -> Self {
        Self { history, seq }
    }

    /// Identifier of request `sequence` against this transaction
    pub fn request(&self, sequence: u64) -> RequestId {
        RequestId::new(*self, sequence)
    }

    /// True if this transaction is at or before `watermark`
    pub fn is_at_or_before(&self, watermark: u64) -> bool {
        self.seq <= watermark
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-txn-{}", self.history, self.seq)
    }
}

/// Identifier of one request against a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId {
    /// Target transaction
    pub transaction: TransactionId,
    /// Per-transaction request sequence, starting at 0
    pub sequence: u64,
}

impl RequestId {
    /// Create a new request identifier
    pub fn new(transaction: TransactionId, sequence: u64) -> Self {
        Self {
            transaction,
            sequence,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction, self.sequence)
    }
}

/// Path to a node in the hierarchical data tree
///
/// The empty path is the root. Paths are written `/a/b/c`; the root is `/`.
/// Ordering is segment-wise, so every descendant of a path sorts directly
/// after it in a `BTreeMap`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a `/`-separated path
    ///
    /// # Errors
    /// Returns `StrataError::InvalidInput` if the path does not start with `/`
    /// or contains an empty segment.
    pub fn parse(s: &str) -> StrataResult<Self> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| StrataError::invalid_input(format!("path '{}' must start with '/'", s)))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in rest.split('/') {
            if segment.is_empty() {
                return Err(StrataError::invalid_input(format!(
                    "path '{}' contains an empty segment",
                    s
                )));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Child path `self/segment`
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Parent path, or None for the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True if this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True if `self` equals `ancestor` or lies beneath it
    pub fn starts_with(&self, ancestor: &TreePath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
