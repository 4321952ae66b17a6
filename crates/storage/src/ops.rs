//! Structural rules for applying tree operations to a node map
//!
//! Nodes are stored flat, keyed by `TreePath`. Because paths order
//! segment-wise, a node's subtree is the contiguous range that starts at the
//! node itself.
//!
//! Rules:
//! - write / merge require the parent node to exist (the root always exists)
//! - write replaces the node and drops its previous subtree
//! - merge folds the value into the existing node, or creates it
//! - delete removes the node and its subtree; deleting nothing is fine

use std::collections::BTreeMap;

use strata_core::{StrataError, StrataResult, TreeOperation, TreePath, Value};

/// Flat node storage shared by snapshots, modifications and the live tree
pub type NodeMap = BTreeMap<TreePath, Value>;

/// Apply one operation to `nodes`
///
/// On error `nodes` is left untouched.
pub fn apply_operation(nodes: &mut NodeMap, operation: &TreeOperation) -> StrataResult<()> {
    match operation {
        TreeOperation::Write { path, data } => {
            ensure_parent(nodes, path)?;
            remove_subtree(nodes, path);
            nodes.insert(path.clone(), data.clone());
        }
        TreeOperation::Merge { path, data } => {
            ensure_parent(nodes, path)?;
            match nodes.get_mut(path) {
                Some(existing) => existing.merge(data.clone()),
                None => {
                    nodes.insert(path.clone(), data.clone());
                }
            }
        }
        TreeOperation::Delete { path } => remove_subtree(nodes, path),
    }
    Ok(())
}

fn ensure_parent(nodes: &NodeMap, path: &TreePath) -> StrataResult<()> {
    match path.parent() {
        None => Ok(()),
        Some(parent) if parent.is_root() || nodes.contains_key(&parent) => Ok(()),
        Some(parent) => Err(StrataError::tree_rejected(
            path,
            format!("parent {} does not exist", parent),
        )),
    }
}

fn remove_subtree(nodes: &mut NodeMap, path: &TreePath) {
    let doomed: Vec<TreePath> = nodes
        .range(path.clone()..)
        .take_while(|(key, _)| key.starts_with(path))
        .map(|(key, _)| key.clone())
        .collect();
    for key in doomed {
        nodes.remove(&key);
    }
}
