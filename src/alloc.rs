//! Free-space allocator (spec.md §4.3): two independent freelists, one
//! for data rows and one for index nodes.
//!
//! Every freelist node — whatever it tracks — is physically a block in
//! the index file's own node-number space (the same space `index_node_count`
//! counts), distinguished only by its [`crate::trailer::Trailer::freelist`]
//! tag. That matters for the data-row freelist: a data row number is an
//! address in the *data* file and must never double as an index-file block
//! number, so a fresh data-freelist container is minted through the index
//! node allocator rather than by repurposing the row number itself. The
//! index-node freelist has no such mismatch — a freed index node already
//! is a spare index-file block, so it can serve as its own new container.
//!
//! A freelist node packs a header (`used_len: u16`, `next: u32/u64`)
//! followed by up to `capacity` free node/row numbers. Popping the last
//! entry out of an index-freelist head leaves a zero-entry node installed
//! as the head; the next `alloc_index_node` notices the empty head and
//! reclaims the node itself rather than eagerly unlinking it on the
//! emptying call. `alloc_data_row` does the analogous reclaim but, since
//! the emptied container is an index-file block rather than a row, hands
//! it back to `free_index_node` instead of returning it to the caller.

use crate::dict::{Dictionary, Mode};
use crate::trailer::Trailer;
use crate::util::codec;
use crate::Result;

/// Raw block access the allocator needs: read/write a fixed-size node by
/// number. Implemented over `cache::BlockCache` by the table layer so the
/// allocator stays agnostic of file descriptors and cache eviction.
pub trait NodeStore {
    fn node_size(&self) -> usize;
    fn read_node(&mut self, node_num: u64) -> Result<Vec<u8>>;
    fn write_node(&mut self, node_num: u64, data: Vec<u8>) -> Result<()>;
}

struct FreelistNode {
    entries: Vec<u64>,
    next: u64,
}

impl FreelistNode {
    fn capacity(node_size: usize, trailer_size: usize, mode: Mode) -> usize {
        let ptr = mode.ptr_size();
        (node_size - trailer_size - 2 - ptr) / ptr
    }

    fn decode(buf: &[u8], mode: Mode) -> Result<FreelistNode> {
        let used_len = codec::load_u16(&buf[0..2])? as usize;
        let ptr = mode.ptr_size();
        let next = load_ptr(&buf[2..2 + ptr], mode)?;
        let mut entries = Vec::with_capacity(used_len);
        let mut off = 2 + ptr;
        for _ in 0..used_len {
            entries.push(load_ptr(&buf[off..off + ptr], mode)?);
            off += ptr;
        }
        Ok(FreelistNode { entries, next })
    }

    fn encode_into(&self, buf: &mut [u8], mode: Mode, trailer_size: usize) -> Result<()> {
        let cap = FreelistNode::capacity(buf.len(), trailer_size, mode);
        if self.entries.len() > cap {
            return err_at!(Fatal, msg: "freelist node overflow: {} entries, capacity {}", self.entries.len(), cap)?;
        }
        let body_end = buf.len() - trailer_size;
        for b in buf[..body_end].iter_mut() {
            *b = 0;
        }
        codec::store_u16_into(&mut buf[0..2], self.entries.len() as u16)?;
        let ptr = mode.ptr_size();
        store_ptr(&mut buf[2..2 + ptr], self.next, mode)?;
        let mut off = 2 + ptr;
        for e in &self.entries {
            store_ptr(&mut buf[off..off + ptr], *e, mode)?;
            off += ptr;
        }
        Ok(())
    }
}

fn load_ptr(buf: &[u8], mode: Mode) -> Result<u64> {
    match mode {
        Mode::Bits32 => Ok(codec::load_u32(buf)? as u64),
        Mode::Bits64 => codec::load_u64(buf),
    }
}

fn store_ptr(buf: &mut [u8], v: u64, mode: Mode) -> Result<()> {
    match mode {
        Mode::Bits32 => codec::store_u32_into(buf, v as u32),
        Mode::Bits64 => codec::store_u64_into(buf, v),
    }
}

fn new_freelist_block(
    node_size: usize,
    mode: Mode,
    next: u64,
    is_data: bool,
    entries: Vec<u64>,
) -> Result<Vec<u8>> {
    let trailer_size = Trailer::size(mode);
    let mut buf = vec![0u8; node_size];
    let fl = FreelistNode { entries, next };
    fl.encode_into(&mut buf, mode, trailer_size)?;
    Trailer::freelist(is_data).write_into(&mut buf, mode);
    Ok(buf)
}

/// Allocate an index node number, preferring a reclaimed one from the
/// index freelist over growing the file.
pub fn alloc_index_node<S: NodeStore>(dict: &mut Dictionary, store: &mut S) -> Result<u64> {
    if dict.index_freelist_head == 0 {
        dict.index_node_count += 1;
        return Ok(dict.index_node_count + 1);
    }
    let head = dict.index_freelist_head;
    let trailer_size = Trailer::size(dict.mode);
    let mut buf = store.read_node(head)?;
    let mut fl = FreelistNode::decode(&buf, dict.mode)?;
    if fl.entries.is_empty() {
        dict.index_freelist_head = fl.next;
        return Ok(head);
    }
    let popped = fl.entries.pop().unwrap();
    fl.encode_into(&mut buf, dict.mode, trailer_size)?;
    store.write_node(head, buf)?;
    Ok(popped)
}

/// Return index node `n` to the index freelist. `n` is already a spare
/// index-file block, so it becomes its own new container when the
/// current head has no room.
pub fn free_index_node<S: NodeStore>(dict: &mut Dictionary, store: &mut S, n: u64) -> Result<()> {
    let trailer_size = Trailer::size(dict.mode);
    if dict.index_freelist_head != 0 {
        let head = dict.index_freelist_head;
        let mut buf = store.read_node(head)?;
        let mut fl = FreelistNode::decode(&buf, dict.mode)?;
        let cap = FreelistNode::capacity(buf.len(), trailer_size, dict.mode);
        if fl.entries.len() < cap {
            fl.entries.push(n);
            fl.encode_into(&mut buf, dict.mode, trailer_size)?;
            store.write_node(head, buf)?;
            return Ok(());
        }
    }
    let buf = new_freelist_block(store.node_size(), dict.mode, dict.index_freelist_head, false, Vec::new())?;
    store.write_node(n, buf)?;
    dict.index_freelist_head = n;
    Ok(())
}

/// Allocate a data row number.
pub fn alloc_data_row<S: NodeStore>(dict: &mut Dictionary, store: &mut S) -> Result<u64> {
    let trailer_size = Trailer::size(dict.mode);
    loop {
        if dict.data_freelist_head == 0 {
            dict.data_row_count += 1;
            return Ok(dict.data_row_count);
        }
        let head = dict.data_freelist_head;
        let mut buf = store.read_node(head)?;
        let mut fl = FreelistNode::decode(&buf, dict.mode)?;
        if fl.entries.is_empty() {
            // this container is a spare index-file block, not a row.
            dict.data_freelist_head = fl.next;
            free_index_node(dict, store, head)?;
            continue;
        }
        let popped = fl.entries.pop().unwrap();
        fl.encode_into(&mut buf, dict.mode, trailer_size)?;
        store.write_node(head, buf)?;
        return Ok(popped);
    }
}

/// Return data row `r`. If `r` is the current tail row, shrink the file
/// instead of listing it; otherwise push it onto the data freelist,
/// minting a fresh container block via the index-node allocator if the
/// current head has no room.
pub fn free_data_row<S: NodeStore>(dict: &mut Dictionary, store: &mut S, r: u64) -> Result<()> {
    if r == dict.data_row_count {
        dict.data_row_count -= 1;
        return Ok(());
    }
    let trailer_size = Trailer::size(dict.mode);
    if dict.data_freelist_head != 0 {
        let head = dict.data_freelist_head;
        let mut buf = store.read_node(head)?;
        let mut fl = FreelistNode::decode(&buf, dict.mode)?;
        let cap = FreelistNode::capacity(buf.len(), trailer_size, dict.mode);
        if fl.entries.len() < cap {
            fl.entries.push(r);
            fl.encode_into(&mut buf, dict.mode, trailer_size)?;
            store.write_node(head, buf)?;
            return Ok(());
        }
    }
    let container = alloc_index_node(dict, store)?;
    let buf = new_freelist_block(store.node_size(), dict.mode, dict.data_freelist_head, true, vec![r])?;
    store.write_node(container, buf)?;
    dict.data_freelist_head = container;
    Ok(())
}

/// Remove `target` from the data freelist chain, scanning every container
/// in the chain. Returns whether it was found.
fn unlink_data_row<S: NodeStore>(store: &mut S, mode: Mode, head: &mut u64, target: u64) -> Result<bool> {
    let trailer_size = Trailer::size(mode);
    let mut cursor = *head;
    while cursor != 0 {
        let mut buf = store.read_node(cursor)?;
        let mut fl = FreelistNode::decode(&buf, mode)?;
        if let Some(pos) = fl.entries.iter().position(|&e| e == target) {
            fl.entries.remove(pos);
            fl.encode_into(&mut buf, mode, trailer_size)?;
            store.write_node(cursor, buf)?;
            return Ok(true);
        }
        cursor = fl.next;
    }
    Ok(false)
}

/// Re-assert row `r` as allocated during forward WAL replay. If `r` is
/// past the current tail, extend the tail and push the intermediate rows
/// onto the freelist as free; otherwise `r` is already somewhere on the
/// freelist and must be unlinked from it specifically, since a later undo
/// may need this exact row number back.
pub fn force_data_alloc<S: NodeStore>(dict: &mut Dictionary, store: &mut S, r: u64) -> Result<()> {
    if r > dict.data_row_count {
        for mid in (dict.data_row_count + 1)..r {
            free_data_row(dict, store, mid)?;
        }
        dict.data_row_count = r;
        return Ok(());
    }
    let found = unlink_data_row(store, dict.mode, &mut dict.data_freelist_head, r)?;
    if !found {
        return err_at!(BadFile, msg: "force_data_alloc: row {} not found on freelist", r)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "alloc_test.rs"]
mod alloc_test;
