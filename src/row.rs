//! Fixed-stride data row I/O (spec.md §4.6).
//!
//! A row occupies a fixed-size slot ("stride") in the data file at
//! `(row_number - 1) * stride` — row numbers are 1-based, row 0 is never
//! allocated (mirrors the index file reserving block 0/1 for the
//! dictionary). The slot packs `min_row_length` bytes of fixed payload,
//! then a one-byte tombstone, then — only for variable-length tables — a
//! footer of `{2-byte varlen length, composite varlen-node pointer}`
//! pointing at whatever didn't fit in the fixed payload, stored via the
//! [`crate::tailstore`].

use crate::dict::Mode;
use crate::tailstore::{self, TailRef};
use crate::util::codec;
use crate::Result;

/// Tombstone byte values (spec.md §4.6): anything other than `LIVE` is
/// treated as deleted, though `DEAD` is the canonical value written.
const TOMBSTONE_LIVE: u8 = 0x0a;
const TOMBSTONE_DEAD: u8 = 0x00;

/// Raw slot access the row layer needs. Implemented directly over the
/// data file by the table layer; unlike B+tree nodes, rows are not
/// routed through `cache::BlockCache` (spec.md §4.1 caches index blocks
/// only).
pub trait RowIo {
    fn stride(&self) -> usize;
    fn read_slot(&mut self, row_number: u64) -> Result<Vec<u8>>;
    fn write_slot(&mut self, row_number: u64, data: Vec<u8>) -> Result<()>;
}

/// Byte offset of `row_number`'s slot in the data file.
pub fn offset_of(row_number: u64, stride: usize) -> u64 {
    debug_assert!(row_number >= 1, "row numbers are 1-based");
    (row_number - 1) * stride as u64
}

/// Total slot size: `min_row_length` bytes of fixed payload, a one-byte
/// tombstone, and — for variable-length tables — the varlen footer
/// (spec.md §4.6).
pub fn stride(min_row_length: u32, mode: Mode, variable_length: bool) -> usize {
    min_row_length as usize + 1 + if variable_length { 2 + mode.ptr_size() } else { 0 }
}

#[derive(Clone, Debug)]
pub struct Row {
    pub tombstone: bool,
    /// Exactly `min_row_length` bytes: the row's fixed prefix.
    pub fixed: Vec<u8>,
    /// Total length of the varlen tail, 0 if this row has none.
    pub tail_len: u16,
    /// Head of the varlen tail's fragment chain in the tail store.
    pub tail: TailRef,
}

impl Row {
    pub fn live(fixed: Vec<u8>, tail_len: u16, tail: TailRef) -> Row {
        Row {
            tombstone: false,
            fixed,
            tail_len,
            tail,
        }
    }

    pub fn tombstoned(min_row_length: u32) -> Row {
        Row {
            tombstone: true,
            fixed: vec![0u8; min_row_length as usize],
            tail_len: 0,
            tail: TailRef::NONE,
        }
    }
}

pub fn encode(row: &Row, min_row_length: u32, mode: Mode, variable_length: bool) -> Result<Vec<u8>> {
    let min = min_row_length as usize;
    if row.fixed.len() != min {
        return err_at!(
            RowSize, msg: "row fixed payload is {} bytes, table requires exactly {}", row.fixed.len(), min
        )?;
    }
    let mut buf = Vec::with_capacity(stride(min_row_length, mode, variable_length));
    buf.extend_from_slice(&row.fixed);
    buf.push(if row.tombstone { TOMBSTONE_DEAD } else { TOMBSTONE_LIVE });
    if variable_length {
        codec::store_u16(&mut buf, row.tail_len)?;
        let packed = tailstore::pack(row.tail);
        match mode {
            Mode::Bits32 => codec::store_u32(&mut buf, packed as u32)?,
            Mode::Bits64 => codec::store_u64(&mut buf, packed)?,
        }
    }
    Ok(buf)
}

pub fn decode(buf: &[u8], min_row_length: u32, mode: Mode, variable_length: bool) -> Result<Row> {
    let min = min_row_length as usize;
    if buf.len() < stride(min_row_length, mode, variable_length) {
        return err_at!(BadFile, msg: "row slot truncated: {} bytes", buf.len())?;
    }
    let fixed = buf[0..min].to_vec();
    let tombstone = buf[min] != TOMBSTONE_LIVE;
    let (tail_len, tail) = if variable_length {
        let mut off = min + 1;
        let tail_len = codec::load_u16(&buf[off..off + 2])?;
        off += 2;
        let packed = match mode {
            Mode::Bits32 => codec::load_u32(&buf[off..off + 4])? as u64,
            Mode::Bits64 => codec::load_u64(&buf[off..off + 8])?,
        };
        (tail_len, tailstore::unpack(packed))
    } else {
        (0, TailRef::NONE)
    };
    Ok(Row {
        tombstone,
        fixed,
        tail_len,
        tail,
    })
}

pub fn read_row<S: RowIo>(store: &mut S, min_row_length: u32, mode: Mode, variable_length: bool, row_number: u64) -> Result<Row> {
    let buf = store.read_slot(row_number)?;
    decode(&buf, min_row_length, mode, variable_length)
}

pub fn write_row<S: RowIo>(
    store: &mut S,
    min_row_length: u32,
    mode: Mode,
    variable_length: bool,
    row_number: u64,
    row: &Row,
) -> Result<()> {
    let buf = encode(row, min_row_length, mode, variable_length)?;
    store.write_slot(row_number, buf)
}

#[cfg(test)]
#[path = "row_test.rs"]
mod row_test;
