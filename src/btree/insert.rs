//! Key insertion (spec.md §4.4 "Insert").
//!
//! Splits allocate only the new left sibling: the node being split keeps
//! its own node number and shrinks in place to become the right remainder,
//! so a split never needs to rewrite the parent entry that already points
//! at it — only a new separator entry for the freshly allocated left
//! sibling is inserted. Splits are biased high (leave the in-place,
//! highest-keyed remainder mostly empty) so sequential ascending inserts,
//! the common case, keep re-splitting the same tail node instead of
//! fragmenting the whole tree.

use std::cmp::Ordering;

use super::mirror::{Mirror, NodeId};
use super::node::{Entry, NodeImage};
use super::search::bisect;
use crate::alloc::NodeStore;
use crate::dict::{Dictionary, Mode};
use crate::keydesc::KeyDescriptor;
use crate::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// Rejected: an entry with the same key already exists and the index
    /// does not allow duplicates.
    Duplicate,
    /// The row's key was all null-fill and `NULL_KEY` is set: the spec
    /// excludes null keys from the tree entirely.
    Skipped,
}

pub fn insert<S: NodeStore>(
    mirror: &mut Mirror,
    store: &mut S,
    dict: &mut Dictionary,
    desc: &KeyDescriptor,
    mode: Mode,
    node_size: usize,
    root: u64,
    key: &[u8],
    dup: u64,
    ptr: u64,
) -> Result<(u64, InsertOutcome)> {
    if desc.is_null_key(key) {
        return Ok((root, InsertOutcome::Skipped));
    }

    let root_id = mirror.load(store, desc, mode, root)?;
    let mut node_id = root_id;
    let mut path: Vec<(NodeId, usize)> = Vec::new();
    let leaf_id;
    let leaf_slot;
    loop {
        let slot = bisect(mirror, node_id, desc, key, dup as i64)?;
        let node = mirror.get(node_id);
        if node.is_leaf() {
            leaf_id = node_id;
            leaf_slot = slot;
            break;
        }
        path.push((node_id, slot));
        let child_num = node.entries[slot].ptr;
        node_id = mirror.load(store, desc, mode, child_num)?;
    }

    {
        let leaf = mirror.get(leaf_id);
        if leaf_slot < leaf.high_slot()
            && !desc.has_dups()
            && desc.compare_keys(&leaf.entries[leaf_slot].key, key)? == Ordering::Equal
        {
            return Ok((root, InsertOutcome::Duplicate));
        }
    }

    let key_length = desc.key_length();
    {
        let leaf = mirror.get_mut(leaf_id);
        leaf.entries.insert(leaf_slot, Entry::real(key.to_vec(), dup, ptr));
        leaf.dirty = true;
    }

    if fits(mirror.get(leaf_id), node_size, mode, key_length) {
        return Ok((root, InsertOutcome::Inserted));
    }

    let (mut promoted_key, mut promoted_dup, mut promoted_left) =
        split_node(mirror, store, dict, leaf_id, mode, node_size, key_length)?;

    while let Some((parent_id, slot)) = path.pop() {
        {
            let parent = mirror.get_mut(parent_id);
            parent.entries.insert(slot, Entry::real(promoted_key.clone(), promoted_dup, promoted_left));
            parent.dirty = true;
        }
        if fits(mirror.get(parent_id), node_size, mode, key_length) {
            return Ok((root, InsertOutcome::Inserted));
        }
        let (k, d, l) = split_node(mirror, store, dict, parent_id, mode, node_size, key_length)?;
        promoted_key = k;
        promoted_dup = d;
        promoted_left = l;
    }

    // The root itself split: mint a fresh root one level up, pointing at
    // the new left sibling and the (in-place, now-shrunk) old root.
    let old_root_level = mirror.get(root_id).level;
    let new_root_id = mirror.alloc_node(dict, store, old_root_level + 1)?;
    {
        let new_root = mirror.get_mut(new_root_id);
        new_root.entries = vec![Entry::real(promoted_key, promoted_dup, promoted_left), Entry::high(root)];
        new_root.dirty = true;
    }
    let new_root_num = mirror.get(new_root_id).node_num;
    Ok((new_root_num, InsertOutcome::Inserted))
}

fn fits(node: &super::mirror::MirrorNode, node_size: usize, mode: Mode, key_length: usize) -> bool {
    let image = NodeImage {
        level: node.level,
        txn: 0,
        entries: node.entries.clone(),
    };
    image.encode(node_size, mode, key_length).is_ok()
}

/// Split `node_id` in place: it keeps its own node number and becomes the
/// right remainder; a freshly allocated node becomes the left sibling.
/// Returns `(promoted_key, promoted_dup, new_left_node_num)` for the
/// caller to insert into the parent (or to seed a new root).
fn split_node<S: NodeStore>(
    mirror: &mut Mirror,
    store: &mut S,
    dict: &mut Dictionary,
    node_id: NodeId,
    _mode: Mode,
    _node_size: usize,
    _key_length: usize,
) -> Result<(Vec<u8>, u64, u64)> {
    let (level, entries) = {
        let node = mirror.get(node_id);
        (node.level, node.entries.clone())
    };
    let real_count = entries.len() - 1;
    debug_assert!(real_count >= 2, "node_size too small to hold even two entries");
    let split_point = ((real_count * 3) / 4).max(1).min(real_count - 1);

    let left_real = entries[0..split_point].to_vec();
    let left_high_ptr = left_real.last().expect("split_point >= 1").ptr;
    let mut left_entries = left_real;
    left_entries.push(Entry::high(left_high_ptr));

    let right_entries = entries[split_point..].to_vec();
    let promoted_key = entries[split_point - 1].key.clone();
    let promoted_dup = entries[split_point - 1].dup;

    let new_left_id = mirror.alloc_node(dict, store, level)?;
    {
        let left = mirror.get_mut(new_left_id);
        left.entries = left_entries;
        left.dirty = true;
    }
    let new_left_num = mirror.get(new_left_id).node_num;

    {
        let node = mirror.get_mut(node_id);
        node.entries = right_entries;
        node.dirty = true;
    }

    Ok((promoted_key, promoted_dup, new_left_num))
}

#[cfg(test)]
#[path = "insert_test.rs"]
mod insert_test;
