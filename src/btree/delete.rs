//! Key deletion (spec.md §4.4 "Delete").
//!
//! A stale, too-high separator key left behind in a parent after deleting
//! the maximum key of one of its subtrees is harmless: descent only needs
//! separators to be non-decreasing, not exact, so deletion never rewrites
//! parent keys. The only structural work is collapsing a child that drops
//! to zero real entries: its separator (or, for the rightmost child, the
//! second-to-last entry promoted into the high sentinel) is removed from
//! the parent and the emptied node is freed, cascading upward. If the
//! cascade reaches the root and empties it down to a bare high sentinel,
//! the tree shrinks by one level and the sole remaining child becomes the
//! new root.

use std::cmp::Ordering;

use super::mirror::{Mirror, NodeId};
use super::search::bisect;
use crate::alloc::NodeStore;
use crate::dict::{Dictionary, Mode};
use crate::keydesc::KeyDescriptor;
use crate::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

pub fn delete<S: NodeStore>(
    mirror: &mut Mirror,
    store: &mut S,
    dict: &mut Dictionary,
    desc: &KeyDescriptor,
    mode: Mode,
    root: u64,
    key: &[u8],
    dup: u64,
) -> Result<(u64, DeleteOutcome)> {
    let mut node_id = mirror.load(store, desc, mode, root)?;
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
        let matches = leaf_slot < leaf.high_slot()
            && desc.compare_keys(&leaf.entries[leaf_slot].key, key)? == Ordering::Equal
            && leaf.entries[leaf_slot].dup == dup;
        if !matches {
            return Ok((root, DeleteOutcome::NotFound));
        }
    }

    {
        let leaf = mirror.get_mut(leaf_id);
        leaf.entries.remove(leaf_slot);
        leaf.dirty = true;
    }

    let mut emptied: Option<NodeId> = if mirror.get(leaf_id).high_slot() == 0 {
        Some(leaf_id)
    } else {
        None
    };

    while let Some((parent_id, slot)) = path.pop() {
        let child_to_free = match emptied {
            Some(id) => id,
            None => break,
        };

        {
            let parent = mirror.get_mut(parent_id);
            let real_count = parent.high_slot();
            if slot < real_count {
                parent.entries.remove(slot);
            } else {
                let promoted = parent.entries.remove(real_count - 1);
                let new_high_idx = parent.entries.len() - 1;
                parent.entries[new_high_idx].ptr = promoted.ptr;
            }
            parent.dirty = true;
        }

        mirror.free_node(dict, store, child_to_free)?;
        emptied = if mirror.get(parent_id).high_slot() == 0 {
            Some(parent_id)
        } else {
            None
        };
    }

    let mut new_root = root;
    if let Some(root_id) = emptied {
        if mirror.get(root_id).level > 0 {
            let remaining = mirror.get(root_id).entries[0].ptr;
            mirror.free_node(dict, store, root_id)?;
            new_root = remaining;
        }
    }

    Ok((new_root, DeleteOutcome::Deleted))
}

#[cfg(test)]
#[path = "delete_test.rs"]
mod delete_test;
