//! On-disk B+tree node encoding (spec.md §3 "B+tree node", §4.4).
//!
//! In memory, keys are always the full uncompressed bytes (spec.md §4.4:
//! "Keys are stored uncompressed in memory"). On disk, each entry may omit
//! a leading prefix shared with the previous key in the node and a
//! trailing pad shared with the key's fixed length; the final entry in
//! every node is a sentinel (`high = true`) carrying no key, only a
//! pointer — the rightmost child in an internal node, a dummy in a leaf.

use crate::dict::Mode;
use crate::trailer::Trailer;
use crate::util::codec;
use crate::Result;

const FLAG_HIGH: u8 = 0x01;
const FLAG_DUP: u8 = 0x02;

const PAD_BYTE: u8 = b' ';

#[derive(Clone, Debug)]
pub struct Entry {
    pub key: Vec<u8>,
    pub dup: u64,
    /// Child node number (level > 0) or data row number (leaf).
    pub ptr: u64,
    /// True for the node's trailing sentinel: high-water in an internal
    /// node, end-of-node dummy in a leaf.
    pub high: bool,
}

impl Entry {
    pub fn high(ptr: u64) -> Entry {
        Entry {
            key: Vec::new(),
            dup: 0,
            ptr,
            high: true,
        }
    }

    pub fn real(key: Vec<u8>, dup: u64, ptr: u64) -> Entry {
        Entry {
            key,
            dup,
            ptr,
            high: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeImage {
    pub level: u8,
    /// Node-local transaction number, present only in 64-bit mode.
    pub txn: u64,
    pub entries: Vec<Entry>,
}

impl NodeImage {
    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }

    /// Encode into a fresh `node_size`-byte buffer.
    pub fn encode(&self, node_size: usize, mode: Mode, key_length: usize) -> Result<Vec<u8>> {
        let trailer_size = Trailer::size(mode);
        let ptr_size = mode.ptr_size();
        let mut body = Vec::with_capacity(node_size);
        body.extend_from_slice(&[0u8, 0u8]); // used_length placeholder
        if let Mode::Bits64 = mode {
            codec::store_u64(&mut body, self.txn)?;
        }

        let mut prev: Vec<u8> = Vec::new();
        for entry in &self.entries {
            if entry.high {
                body.push(FLAG_HIGH);
                push_ptr(&mut body, entry.ptr, mode)?;
                continue;
            }
            let trailing = trailing_pad_len(&entry.key, key_length);
            let leading = common_prefix_len(&prev, &entry.key).min(key_length - trailing);
            let middle = &entry.key[leading..entry.key.len() - trailing];

            let mut flags = 0u8;
            let has_dup = entry.dup != 0;
            if has_dup {
                flags |= FLAG_DUP;
            }
            body.push(flags);
            body.push(leading as u8);
            body.push(trailing as u8);
            codec::store_u16(&mut body, middle.len() as u16)?;
            body.extend_from_slice(middle);
            if has_dup {
                codec::store_u64(&mut body, entry.dup)?;
            }
            push_ptr(&mut body, entry.ptr, mode)?;
            prev = entry.key.clone();
        }

        if body.len() + trailer_size > node_size {
            return err_at!(Fatal, msg: "node overflow: {} bytes body, {} byte budget", body.len(), node_size - trailer_size)?;
        }
        let used_len = (body.len() - header_len(mode)) as u16;
        codec::store_u16_into(&mut body[0..2], used_len)?;

        let mut buf = vec![0u8; node_size];
        buf[..body.len()].copy_from_slice(&body);
        Trailer::btree(self.level).write_into(&mut buf, mode);
        Ok(buf)
    }

    pub fn decode(buf: &[u8], mode: Mode, key_length: usize) -> Result<NodeImage> {
        let trailer = Trailer::read_from(buf, mode)?;
        let level = trailer.level;
        let used_len = codec::load_u16(&buf[0..2])? as usize;
        let mut off = header_len(mode);
        let txn = if let Mode::Bits64 = mode {
            codec::load_u64(&buf[2..10])?
        } else {
            0
        };
        let end = off + used_len;
        let ptr_size = mode.ptr_size();

        let mut entries = Vec::new();
        let mut prev: Vec<u8> = Vec::new();
        while off < end {
            let flags = buf[off];
            off += 1;
            if flags & FLAG_HIGH != 0 {
                let ptr = load_ptr(&buf[off..off + ptr_size], mode)?;
                off += ptr_size;
                entries.push(Entry::high(ptr));
                continue;
            }
            let leading = buf[off] as usize;
            off += 1;
            let trailing = buf[off] as usize;
            off += 1;
            let middle_len = codec::load_u16(&buf[off..off + 2])? as usize;
            off += 2;
            let middle = &buf[off..off + middle_len];
            off += middle_len;

            let mut key = Vec::with_capacity(key_length);
            key.extend_from_slice(&prev[..leading.min(prev.len())]);
            key.extend_from_slice(middle);
            key.resize(key_length, PAD_BYTE);

            let dup = if flags & FLAG_DUP != 0 {
                let d = codec::load_u64(&buf[off..off + 8])?;
                off += 8;
                d
            } else {
                0
            };
            let ptr = load_ptr(&buf[off..off + ptr_size], mode)?;
            off += ptr_size;

            prev = key.clone();
            entries.push(Entry::real(key, dup, ptr));
        }

        Ok(NodeImage {
            level,
            txn,
            entries,
        })
    }
}

fn header_len(mode: Mode) -> usize {
    2 + if let Mode::Bits64 = mode { 8 } else { 0 }
}

fn push_ptr(buf: &mut Vec<u8>, v: u64, mode: Mode) -> Result<()> {
    match mode {
        Mode::Bits32 => codec::store_u32(buf, v as u32),
        Mode::Bits64 => codec::store_u64(buf, v),
    }
}

fn load_ptr(buf: &[u8], mode: Mode) -> Result<u64> {
    match mode {
        Mode::Bits32 => Ok(codec::load_u32(buf)? as u64),
        Mode::Bits64 => codec::load_u64(buf),
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Number of trailing pad bytes in `key` that can be dropped on encode.
fn trailing_pad_len(key: &[u8], key_length: usize) -> usize {
    debug_assert_eq!(key.len(), key_length);
    key.iter().rev().take_while(|&&b| b == PAD_BYTE).count()
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
