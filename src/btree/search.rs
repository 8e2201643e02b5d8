//! Key search (spec.md §4.4 "Search").

use std::cmp::Ordering;

use super::mirror::{Mirror, NodeId};
use crate::alloc::NodeStore;
use crate::dict::Mode;
use crate::keydesc::{extremal_key, KeyDescriptor};
use crate::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchMode {
    First,
    Last,
    Equal,
    Gteq,
    Great,
    Curr,
    Next,
    Prev,
}

/// Result codes from spec.md §4.4: "−1 error, 0 located a key strictly
/// less than the target (or no keys), 1 located a key equal to the
/// target, 2 empty tree."
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Less,
    Equal,
    EmptyTree,
}

/// A position within the tree: a leaf node and a slot index into its
/// entries (the slot past the trailing dummy means "end of node").
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    pub leaf: NodeId,
    pub slot: usize,
}

const DUP_MIN: i64 = -1;
const DUP_MAX: i64 = i64::MAX;

/// Walk from `root` down to the leaf entry satisfying `mode`.
pub fn search<S: NodeStore>(
    mirror: &mut Mirror,
    store: &mut S,
    desc: &KeyDescriptor,
    mode: Mode,
    root: u64,
    search_mode: SearchMode,
    key: &[u8],
    dup_number: i64,
) -> Result<(Outcome, Option<Cursor>)> {
    let (target_key, target_dup): (Vec<u8>, i64) = match search_mode {
        SearchMode::First => (extremal_key(desc, false), DUP_MIN),
        SearchMode::Last => (extremal_key(desc, true), DUP_MAX),
        SearchMode::Equal => (key.to_vec(), 0),
        SearchMode::Great => (key.to_vec(), DUP_MAX),
        SearchMode::Gteq | SearchMode::Curr => (key.to_vec(), dup_number),
        SearchMode::Next | SearchMode::Prev => (key.to_vec(), dup_number),
    };

    let mut node_id = mirror.load(store, desc, mode, root)?;
    loop {
        let node = mirror.get(node_id);
        if node.entries.len() <= 1 {
            // only the sentinel: empty tree.
            return Ok((Outcome::EmptyTree, None));
        }
        let slot = bisect(mirror, node_id, desc, &target_key, target_dup)?;
        let node = mirror.get(node_id);
        if node.is_leaf() {
            let equal = slot < node.high_slot()
                && desc.compare_keys(&node.entries[slot].key, &target_key)? == Ordering::Equal
                && node.entries[slot].dup as i64 == target_dup;
            let outcome = if equal { Outcome::Equal } else { Outcome::Less };
            return Ok((outcome, Some(Cursor { leaf: node_id, slot })));
        }
        let child_num = node.entries[slot].ptr;
        node_id = mirror.load(store, desc, mode, child_num)?;
    }
}

/// Binary search within one node for the first entry `>= (key, dup)`,
/// honoring the node's high/dummy sentinel as "greater than everything".
/// `pub(crate)` so insert/delete can reuse it for descent without
/// re-deriving the comparison rule.
pub(crate) fn bisect(
    mirror: &Mirror,
    node_id: NodeId,
    desc: &KeyDescriptor,
    key: &[u8],
    dup: i64,
) -> Result<usize> {
    let node = mirror.get(node_id);
    let real_count = node.high_slot(); // entries[0..real_count) are real
    let mut lo = 0usize;
    let mut hi = real_count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let entry = &node.entries[mid];
        let ord = desc.compare_keys(&entry.key, key)?;
        let cmp = match ord {
            Ordering::Equal => (entry.dup as i64).cmp(&dup),
            other => other,
        };
        if cmp == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Advance the cursor to the next real entry, crossing into the next leaf
/// via the mirror's lazily-loaded sibling chain if the current leaf is
/// exhausted. The caller supplies `parent_path` only implicitly: siblings
/// are found by re-descending from `root` using the leaf's first key,
/// since the arena mirror does not keep explicit parent links (§9 Design
/// Notes keeps the mirror a pure child-indexed arena).
pub fn advance<S: NodeStore>(
    mirror: &mut Mirror,
    store: &mut S,
    desc: &KeyDescriptor,
    mode: Mode,
    root: u64,
    cursor: Cursor,
    forward: bool,
) -> Result<Option<Cursor>> {
    let node = mirror.get(cursor.leaf);
    if forward {
        if cursor.slot + 1 < node.high_slot() {
            return Ok(Some(Cursor {
                leaf: cursor.leaf,
                slot: cursor.slot + 1,
            }));
        }
    } else if cursor.slot > 0 {
        return Ok(Some(Cursor {
            leaf: cursor.leaf,
            slot: cursor.slot - 1,
        }));
    }

    // Crossed a leaf boundary: re-descend using the boundary key to find
    // the neighboring leaf.
    let boundary_key = if forward {
        node.entries[node.high_slot() - 1].key.clone()
    } else {
        node.entries[0].key.clone()
    };
    let search_mode = if forward { SearchMode::Great } else { SearchMode::Gteq };
    let dup = if forward { DUP_MAX } else { DUP_MIN };
    let (outcome, found) = search(mirror, store, desc, mode, root, search_mode, &boundary_key, dup)?;
    if outcome == Outcome::EmptyTree {
        return Ok(None);
    }
    match found {
        Some(c) if !forward => {
            // `Gteq` on the lowest key of the current leaf lands back on
            // it; step back once more to cross into the true predecessor.
            if c.leaf.0 == cursor.leaf.0 {
                return advance_from_edge(mirror, c, false);
            }
            Ok(Some(c))
        }
        other => Ok(other),
    }
}

fn advance_from_edge(mirror: &Mirror, cursor: Cursor, forward: bool) -> Result<Option<Cursor>> {
    let node = mirror.get(cursor.leaf);
    if forward {
        if cursor.slot + 1 < node.high_slot() {
            Ok(Some(Cursor { leaf: cursor.leaf, slot: cursor.slot + 1 }))
        } else {
            Ok(None)
        }
    } else if cursor.slot > 0 {
        Ok(Some(Cursor { leaf: cursor.leaf, slot: cursor.slot - 1 }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod search_test;
