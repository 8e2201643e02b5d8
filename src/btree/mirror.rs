//! Arena-indexed in-memory mirror of a B+tree (spec.md §9 Design Notes:
//! replace the reference implementation's pointer-linked, tombstone-freed
//! node pool with stable `usize` ids and an explicit free list).

use std::collections::HashMap;

use super::node::{Entry, NodeImage};
use crate::alloc::{self, NodeStore};
use crate::dict::Dictionary;
use crate::keydesc::KeyDescriptor;
use crate::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub usize);

pub struct MirrorNode {
    pub node_num: u64,
    pub level: u8,
    pub entries: Vec<Entry>,
    pub dirty: bool,
    pub is_tof: bool,
    pub is_eof: bool,
}

impl MirrorNode {
    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }

    /// Index of the high/end sentinel, always the last entry.
    pub fn high_slot(&self) -> usize {
        self.entries.len() - 1
    }
}

/// Per-handle arena of loaded nodes, keyed by disk node number so repeated
/// access within one enter/exit cycle doesn't re-decode.
pub struct Mirror {
    slots: Vec<Option<MirrorNode>>,
    free: Vec<usize>,
    by_node_num: HashMap<u64, NodeId>,
}

impl Mirror {
    pub fn new() -> Mirror {
        Mirror {
            slots: Vec::new(),
            free: Vec::new(),
            by_node_num: HashMap::new(),
        }
    }

    /// Drop every cached node; called when the dictionary's transaction
    /// number has moved since this handle last looked (spec.md §4.7).
    pub fn invalidate(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_node_num.clear();
    }

    pub fn get(&self, id: NodeId) -> &MirrorNode {
        self.slots[id.0].as_ref().expect("dangling NodeId")
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut MirrorNode {
        self.slots[id.0].as_mut().expect("dangling NodeId")
    }

    fn insert(&mut self, node: MirrorNode) -> NodeId {
        let node_num = node.node_num;
        let id = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                NodeId(idx)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };
        self.by_node_num.insert(node_num, id);
        id
    }

    /// Remove a node from the arena after it has been freed back to the
    /// index-node allocator (tree collapse, §4.4 Deletion).
    pub fn evict(&mut self, id: NodeId) {
        let node_num = self.slots[id.0].as_ref().map(|n| n.node_num);
        self.slots[id.0] = None;
        self.free.push(id.0);
        if let Some(n) = node_num {
            self.by_node_num.remove(&n);
        }
    }

    /// Load node `node_num` from the store, or return the already-cached
    /// copy.
    pub fn load<S: NodeStore>(
        &mut self,
        store: &mut S,
        keydesc: &KeyDescriptor,
        mode: crate::dict::Mode,
        node_num: u64,
    ) -> Result<NodeId> {
        if let Some(&id) = self.by_node_num.get(&node_num) {
            return Ok(id);
        }
        let buf = store.read_node(node_num)?;
        let image = NodeImage::decode(&buf, mode, keydesc.key_length())?;
        let id = self.insert(MirrorNode {
            node_num,
            level: image.level,
            entries: image.entries,
            dirty: false,
            is_tof: false,
            is_eof: false,
        });
        Ok(id)
    }

    /// Register a freshly allocated, still-empty node (split/root-split).
    pub fn new_node(&mut self, node_num: u64, level: u8, entries: Vec<Entry>) -> NodeId {
        self.insert(MirrorNode {
            node_num,
            level,
            entries,
            dirty: true,
            is_tof: false,
            is_eof: false,
        })
    }

    /// Write every dirty node back through `store`, using `key_length` to
    /// re-encode (spec.md §4.2/§4.4).
    pub fn flush<S: NodeStore>(
        &mut self,
        store: &mut S,
        node_size: usize,
        mode: crate::dict::Mode,
        key_length: usize,
    ) -> Result<()> {
        for slot in self.slots.iter_mut() {
            if let Some(node) = slot {
                if node.dirty {
                    let image = NodeImage {
                        level: node.level,
                        txn: 0,
                        entries: node.entries.clone(),
                    };
                    let buf = image.encode(node_size, mode, key_length)?;
                    store.write_node(node.node_num, buf)?;
                    node.dirty = false;
                }
            }
        }
        Ok(())
    }

    /// Allocate a fresh index node number and register it as an empty
    /// mirror node at the given level.
    pub fn alloc_node<S: NodeStore>(
        &mut self,
        dict: &mut Dictionary,
        store: &mut S,
        level: u8,
    ) -> Result<NodeId> {
        let node_num = alloc::alloc_index_node(dict, store)?;
        Ok(self.new_node(node_num, level, Vec::new()))
    }

    pub fn free_node<S: NodeStore>(
        &mut self,
        dict: &mut Dictionary,
        store: &mut S,
        id: NodeId,
    ) -> Result<()> {
        let node_num = self.get(id).node_num;
        alloc::free_index_node(dict, store, node_num)?;
        self.evict(id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod mirror_test;
