//! Local History Integration Tests
//!
//! Drives histories through the shard registry with an in-process commit
//! pipeline over the in-memory tree.

#[path = "../common/mod.rs"]
mod common;

mod properties;
mod retransmission;
mod scenarios;
