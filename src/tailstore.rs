//! Variable-length tail store (spec.md §4.5).
//!
//! A row whose varlen footer doesn't fit inline spills into a chain of
//! "tail nodes": slotted blocks living in the index file's own node-number
//! space (allocated/freed through [`crate::alloc`], same as B+tree nodes,
//! tagged with [`crate::trailer::Trailer::tail`]). Each node packs payload
//! bytes forward from its header and a slot table backward from its
//! trailer, one `(offset, length, continuation)` triple per stored
//! fragment; a value too large for one node chunks across a continuation
//! chain.
//!
//! Free space is tracked per node in [`crate::dict::Dictionary::group_heads`]
//! — `num_groups` singly-linked chains, bucketed by how much contiguous
//! free space a node currently reports. A node is always re-threaded onto
//! the head of whichever bucket matches its free space right after every
//! write or delete, so a node is "self-healing": once a delete frees
//! bytes, the node becomes reachable again from a higher bucket without
//! any separate compaction pass. A node whose last fragment is deleted
//! (`used_slots` drops to zero) is retired outright, back to the index
//! node freelist, rather than re-threaded empty.

use crate::alloc::{self, NodeStore};
use crate::dict::{Dictionary, Mode};
use crate::trailer::Trailer;
use crate::util::codec;
use crate::Result;

const HEADER_LEN: usize = 2 + 2 + 2 + 8; // used_slots, free_offset, free_bytes, bucket_next
const SLOT_LEN: usize = 2 + 2 + 8; // offset, length, continuation

/// Locates one fragment of a (possibly chained) tail value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TailRef {
    pub node: u64,
    pub slot: u16,
}

impl TailRef {
    pub const NONE: TailRef = TailRef { node: 0, slot: 0 };

    pub fn is_none(&self) -> bool {
        self.node == 0
    }
}

struct TailNode {
    used_slots: u16,
    free_offset: u16,
    free_bytes: u16,
    bucket_next: u64,
    body: Vec<u8>,
    slots: Vec<(u16, u16, u64)>,
}

impl TailNode {
    fn fresh(node_size: usize, trailer_size: usize) -> TailNode {
        let capacity = node_size - trailer_size - HEADER_LEN;
        TailNode {
            used_slots: 0,
            free_offset: HEADER_LEN as u16,
            free_bytes: capacity as u16,
            bucket_next: 0,
            body: vec![0u8; node_size - trailer_size],
            slots: Vec::new(),
        }
    }

    fn decode(buf: &[u8], trailer_size: usize) -> Result<TailNode> {
        let used_slots = codec::load_u16(&buf[0..2])?;
        let free_offset = codec::load_u16(&buf[2..4])?;
        let free_bytes = codec::load_u16(&buf[4..6])?;
        let bucket_next = codec::load_u64(&buf[6..14])?;
        let body_end = buf.len() - trailer_size;
        let mut slots = Vec::with_capacity(used_slots as usize);
        for i in 0..used_slots as usize {
            let off = body_end - (i + 1) * SLOT_LEN;
            let offset = codec::load_u16(&buf[off..off + 2])?;
            let length = codec::load_u16(&buf[off + 2..off + 4])?;
            let cont = codec::load_u64(&buf[off + 4..off + 12])?;
            slots.push((offset, length, cont));
        }
        Ok(TailNode {
            used_slots,
            free_offset,
            free_bytes,
            bucket_next,
            body: buf[..body_end].to_vec(),
            slots,
        })
    }

    fn encode_into(&self, buf: &mut [u8], mode: Mode) -> Result<()> {
        let trailer_size = Trailer::size(mode);
        let body_end = buf.len() - trailer_size;
        buf[..body_end].copy_from_slice(&self.body);
        codec::store_u16_into(&mut buf[0..2], self.used_slots)?;
        codec::store_u16_into(&mut buf[2..4], self.free_offset)?;
        codec::store_u16_into(&mut buf[4..6], self.free_bytes)?;
        codec::store_u64_into(&mut buf[6..14], self.bucket_next)?;
        for (i, (offset, length, cont)) in self.slots.iter().enumerate() {
            let off = body_end - (i + 1) * SLOT_LEN;
            codec::store_u16_into(&mut buf[off..off + 2], *offset)?;
            codec::store_u16_into(&mut buf[off + 2..off + 4], *length)?;
            codec::store_u64_into(&mut buf[off + 4..off + 12], *cont)?;
        }
        for b in buf[body_end..].iter_mut() {
            *b = 0;
        }
        Trailer::tail().write_into(buf, mode);
        Ok(())
    }

    /// Room needed to add one more fragment of `len` bytes.
    fn needed(len: usize) -> usize {
        len + SLOT_LEN
    }

    fn append(&mut self, payload: &[u8], continuation: u64) -> u16 {
        let offset = self.free_offset;
        self.body[offset as usize..offset as usize + payload.len()].copy_from_slice(payload);
        self.slots.push((offset, payload.len() as u16, continuation));
        self.free_offset += payload.len() as u16;
        self.free_bytes -= (payload.len() + SLOT_LEN) as u16;
        self.used_slots += 1;
        self.used_slots - 1
    }

    fn fragment(&self, slot: u16) -> (Vec<u8>, u64) {
        let (offset, length, cont) = self.slots[slot as usize];
        (self.body[offset as usize..offset as usize + length as usize].to_vec(), cont)
    }

    /// Tombstone a fragment: its slot-table entry's length drops to zero so
    /// it is never read again, but the entry itself stays put (individual
    /// slot-table entries are never reclaimed — only a fully empty node is).
    fn tombstone(&mut self, slot: u16) {
        let (offset, length, _) = self.slots[slot as usize];
        self.slots[slot as usize] = (offset, 0, 0);
        self.free_bytes += length;
        self.used_slots -= 1;
    }
}

fn bucket_for(free_bytes: usize, capacity: usize, num_groups: usize) -> usize {
    if capacity == 0 {
        return 0;
    }
    ((free_bytes * num_groups) / capacity).min(num_groups - 1)
}

fn capacity(node_size: usize, mode: Mode) -> usize {
    node_size - Trailer::size(mode) - HEADER_LEN
}

/// Unlink and return the head of bucket `b`, if any.
fn pop_bucket<S: NodeStore>(dict: &mut Dictionary, store: &mut S, b: usize) -> Result<Option<(u64, TailNode)>> {
    let head = dict.group_heads[b];
    if head == 0 {
        return Ok(None);
    }
    let trailer_size = Trailer::size(dict.mode);
    let buf = store.read_node(head)?;
    let node = TailNode::decode(&buf, trailer_size)?;
    dict.group_heads[b] = node.bucket_next;
    Ok(Some((head, node)))
}

fn push_bucket(dict: &mut Dictionary, b: usize, node_num: u64, node: &mut TailNode) {
    node.bucket_next = dict.group_heads[b];
    dict.group_heads[b] = node_num;
}

/// Find a node with at least `needed` free bytes, preferring the smallest
/// bucket guaranteed to fit it, and falling back to a fresh node.
fn acquire_node<S: NodeStore>(dict: &mut Dictionary, store: &mut S, needed: usize) -> Result<(u64, TailNode)> {
    let mode = dict.mode;
    let node_size = store.node_size();
    let cap = capacity(node_size, mode);
    let num_groups = mode.num_groups();
    let min_bucket = bucket_for(needed, cap, num_groups);

    for b in min_bucket..num_groups {
        if let Some((node_num, node)) = pop_bucket(dict, store, b)? {
            if node.free_bytes as usize >= needed {
                return Ok((node_num, node));
            }
            // bucketing was too optimistic (rounding); park it back and
            // keep looking rather than corrupt its free-space invariant.
            let actual_bucket = bucket_for(node.free_bytes as usize, cap, num_groups);
            let mut reparked = node;
            push_bucket(dict, actual_bucket, node_num, &mut reparked);
            save_node(store, mode, node_num, &reparked)?;
        }
    }

    let node_num = alloc::alloc_index_node(dict, store)?;
    Ok((node_num, TailNode::fresh(node_size, Trailer::size(mode))))
}

fn save_node<S: NodeStore>(store: &mut S, mode: Mode, node_num: u64, node: &TailNode) -> Result<()> {
    let mut buf = vec![0u8; store.node_size()];
    node.encode_into(&mut buf, mode)?;
    store.write_node(node_num, buf)
}

/// Write `value`, chunking across a continuation chain if it doesn't fit
/// in one node. Returns the head fragment's location.
pub fn write_tail<S: NodeStore>(dict: &mut Dictionary, store: &mut S, value: &[u8]) -> Result<TailRef> {
    let mode = dict.mode;
    let node_size = store.node_size();
    let max_chunk = capacity(node_size, mode).saturating_sub(SLOT_LEN);
    if max_chunk == 0 {
        return err_at!(Fatal, msg: "node_size {} too small for any tail fragment", node_size)?;
    }

    let chunks: Vec<&[u8]> = if value.is_empty() {
        vec![&value[0..0]]
    } else {
        value.chunks(max_chunk).collect()
    };

    let mut next_ref = TailRef::NONE;
    for chunk in chunks.iter().rev() {
        let needed = TailNode::needed(chunk.len());
        let (node_num, mut node) = acquire_node(dict, store, needed)?;
        let continuation = pack(next_ref);
        let slot = node.append(chunk, continuation);
        let cap = capacity(node_size, mode);
        let bucket = bucket_for(node.free_bytes as usize, cap, mode.num_groups());
        push_bucket(dict, bucket, node_num, &mut node);
        save_node(store, mode, node_num, &node)?;
        next_ref = TailRef { node: node_num, slot };
    }
    Ok(next_ref)
}

/// Read the full value starting at `start`, following the continuation
/// chain to completion.
pub fn read_tail<S: NodeStore>(store: &mut S, mode: Mode, start: TailRef) -> Result<Vec<u8>> {
    let trailer_size = Trailer::size(mode);
    let mut out = Vec::new();
    let mut cursor = start;
    while !cursor.is_none() {
        let buf = store.read_node(cursor.node)?;
        let node = TailNode::decode(&buf, trailer_size)?;
        let (chunk, cont) = node.fragment(cursor.slot);
        out.extend_from_slice(&chunk);
        cursor = unpack(cont);
    }
    Ok(out)
}

/// Delete every fragment in the chain starting at `start`. A node whose
/// last fragment is removed is retired to the index node freelist.
pub fn delete_tail<S: NodeStore>(dict: &mut Dictionary, store: &mut S, start: TailRef) -> Result<()> {
    let mode = dict.mode;
    let trailer_size = Trailer::size(mode);
    let cap = capacity(store.node_size(), mode);
    let mut cursor = start;
    while !cursor.is_none() {
        let buf = store.read_node(cursor.node)?;
        let mut node = TailNode::decode(&buf, trailer_size)?;
        let (_, cont) = node.fragment(cursor.slot);
        node.tombstone(cursor.slot);

        if node.used_slots == 0 {
            alloc::free_index_node(dict, store, cursor.node)?;
        } else {
            let bucket = bucket_for(node.free_bytes as usize, cap, mode.num_groups());
            push_bucket(dict, bucket, cursor.node, &mut node);
            save_node(store, mode, cursor.node, &node)?;
        }
        cursor = unpack(cont);
    }
    Ok(())
}

/// Pack a node/slot pair into one integer: node number in the high bits,
/// slot number in the low 16 bits. Shared with `row.rs`'s varlen footer,
/// which stores exactly this composite as its "varlen-node pointer with
/// embedded slot number" (spec.md §4.6).
pub(crate) fn pack(r: TailRef) -> u64 {
    (r.node << 16) | (r.slot as u64)
}

pub(crate) fn unpack(v: u64) -> TailRef {
    if v == 0 {
        TailRef::NONE
    } else {
        TailRef {
            node: v >> 16,
            slot: (v & 0xffff) as u16,
        }
    }
}

#[cfg(test)]
#[path = "tailstore_test.rs"]
mod tailstore_test;
