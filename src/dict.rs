//! The dictionary node: block 1 of the index file, the engine's
//! superblock (spec.md §3 "Dictionary node").
//!
//! Invariant: `txn_number` strictly increases on every modifying `exit`
//! (spec.md §2). `group_heads` are the ten freelist heads for the varlen
//! tail store's size buckets (spec.md §4.5); in 32-bit mode only the first
//! six are meaningful.

use crate::util::codec;
use crate::{Error, Result};

/// Magic bytes identifying an `isam` index file's dictionary block.
pub const MAGIC: [u8; 2] = *b"IS";

/// Ten size buckets for the varlen tail store in 64-bit mode; 32-bit mode
/// uses the first six (spec.md §4.5).
pub const NUM_GROUPS: usize = 10;

/// Whether pointers/varlen encodings use the 32-bit or 64-bit layout
/// (spec.md §6 "documented extensions in 64-bit mode").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Bits32,
    Bits64,
}

impl Mode {
    pub fn ptr_size(&self) -> usize {
        match self {
            Mode::Bits32 => 4,
            Mode::Bits64 => 8,
        }
    }

    pub fn default_node_size(&self) -> usize {
        match self {
            Mode::Bits32 => 1024,
            Mode::Bits64 => 4096,
        }
    }

    pub fn num_groups(&self) -> usize {
        match self {
            Mode::Bits32 => 6,
            Mode::Bits64 => NUM_GROUPS,
        }
    }
}

/// Block 1 of the index file.
#[derive(Clone, Debug)]
pub struct Dictionary {
    pub mode: Mode,
    pub node_size: u16,
    pub key_reserved: u8,
    pub num_indexes: u16,
    pub min_row_length: u32,
    pub max_row_length: u32,
    /// Head of the linked list of key-descriptor nodes.
    pub keydesc_head: u64,
    /// Head of the index-node freelist.
    pub index_freelist_head: u64,
    /// Head of the data-row freelist.
    pub data_freelist_head: u64,
    /// Highest-allocated data row count.
    pub data_row_count: u64,
    /// Highest-allocated index-node count.
    pub index_node_count: u64,
    /// Monotone transaction number; bumped on every modifying `exit`.
    pub txn_number: u64,
    /// Monotone unique-id counter (`set_unique`/`unique_id`).
    pub unique_id: u64,
    /// Ten group-head pointers for the varlen tail store's size buckets.
    pub group_heads: [u64; NUM_GROUPS],
}

impl Dictionary {
    pub fn new(mode: Mode, min_row_length: u32, max_row_length: u32) -> Dictionary {
        Dictionary {
            mode,
            node_size: mode.default_node_size() as u16,
            key_reserved: 0,
            num_indexes: 0,
            min_row_length,
            max_row_length,
            keydesc_head: 0,
            index_freelist_head: 0,
            data_freelist_head: 0,
            data_row_count: 0,
            index_node_count: 0,
            txn_number: 0,
            unique_id: 0,
            group_heads: [0u64; NUM_GROUPS],
        }
    }

    /// Bump the transaction number; called by `Table::exit` on every
    /// modifying operation (spec.md §2, §4.4 "Ordering invariants").
    pub fn bump_txn(&mut self) {
        self.txn_number += 1;
    }

    pub fn next_unique_id(&mut self) -> u64 {
        self.unique_id += 1;
        self.unique_id
    }

    pub fn is_variable_length(&self) -> bool {
        self.max_row_length > self.min_row_length
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.node_size as usize);
        buf.extend_from_slice(&MAGIC);
        buf.push(self.key_reserved);
        buf.push(match self.mode {
            Mode::Bits32 => 0,
            Mode::Bits64 => 1,
        });
        codec::store_u16(&mut buf, self.node_size).unwrap();
        codec::store_u16(&mut buf, self.num_indexes).unwrap();
        codec::store_u32(&mut buf, self.min_row_length).unwrap();
        codec::store_u32(&mut buf, self.max_row_length).unwrap();
        codec::store_u64(&mut buf, self.keydesc_head).unwrap();
        codec::store_u64(&mut buf, self.index_freelist_head).unwrap();
        codec::store_u64(&mut buf, self.data_freelist_head).unwrap();
        codec::store_u64(&mut buf, self.data_row_count).unwrap();
        codec::store_u64(&mut buf, self.index_node_count).unwrap();
        codec::store_u64(&mut buf, self.txn_number).unwrap();
        codec::store_u64(&mut buf, self.unique_id).unwrap();
        for g in self.group_heads.iter() {
            codec::store_u64(&mut buf, *g).unwrap();
        }
        buf.resize(self.node_size as usize, 0);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Dictionary> {
        if buf.len() < 4 || buf[0..2] != MAGIC {
            return err_at!(BadFile, msg: "dictionary magic mismatch")?;
        }
        let key_reserved = buf[2];
        let mode = match buf[3] {
            0 => Mode::Bits32,
            1 => Mode::Bits64,
            v => return err_at!(BadFile, msg: "unknown dictionary mode byte {}", v)?,
        };
        let mut off = 4;
        let node_size = codec::load_u16(&buf[off..off + 2])?;
        off += 2;
        let num_indexes = codec::load_u16(&buf[off..off + 2])?;
        off += 2;
        let min_row_length = codec::load_u32(&buf[off..off + 4])?;
        off += 4;
        let max_row_length = codec::load_u32(&buf[off..off + 4])?;
        off += 4;
        let keydesc_head = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let index_freelist_head = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let data_freelist_head = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let data_row_count = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let index_node_count = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let txn_number = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let unique_id = codec::load_u64(&buf[off..off + 8])?;
        off += 8;
        let mut group_heads = [0u64; NUM_GROUPS];
        for g in group_heads.iter_mut() {
            *g = codec::load_u64(&buf[off..off + 8])?;
            off += 8;
        }

        Ok(Dictionary {
            mode,
            node_size,
            key_reserved,
            num_indexes,
            min_row_length,
            max_row_length,
            keydesc_head,
            index_freelist_head,
            data_freelist_head,
            data_row_count,
            index_node_count,
            txn_number,
            unique_id,
            group_heads,
        })
    }
}

#[cfg(test)]
#[path = "dict_test.rs"]
mod dict_test;
