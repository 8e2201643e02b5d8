//! Key descriptors, composite-key construction, and typed comparison
//! (spec.md §3 "Key descriptor", §4.4 "Key codec & compare").
//!
//! A descriptor lists 1..8 parts, each `(start, length, typecode)` with an
//! optional descending flag; the whole composite key is built by
//! concatenating the part slices out of a row image, uncompressed, and
//! compared part-by-part honoring each part's type and direction.

use std::cmp::Ordering;

use crate::dict::Mode;
use crate::trailer::Trailer;
use crate::util::codec;
use crate::{Error, Result};

/// Minimal `bitflags`-shaped macro, avoiding a dependency for five bits.
/// Grounded on the crate's overall preference for small, explicit types
/// over pulling in a crate for a handful of constants (the teacher itself
/// does the same for its `db::compact::Cutoff`-style enums).
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
        pub struct $name(pub $ty);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub fn contains(&self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

/// Maximum number of parts in a compound key.
pub const MAX_PARTS: usize = 8;
/// Maximum uncompressed key length in bytes.
pub const MAX_KEYLEN: usize = 511;
/// Maximum number of indexes per table.
pub const MAX_INDEXES: usize = 32;

/// Type of a single key part. The high byte of the on-disk type code
/// carries the `NULL_KEY` fill byte when that flag is set (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PartType {
    Char,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl PartType {
    pub fn fixed_width(&self, declared_len: usize) -> usize {
        match self {
            PartType::Char => declared_len,
            PartType::Int16 => 2,
            PartType::Int32 => 4,
            PartType::Int64 => 8,
            PartType::Float32 => 4,
            PartType::Float64 => 8,
        }
    }
}

/// One part of a compound key descriptor.
#[derive(Clone, Debug)]
pub struct KeyPart {
    pub start: usize,
    pub length: usize,
    pub typ: PartType,
    pub descending: bool,
    /// Fill byte used to detect an all-null-fill part when `NULL_KEY` is set.
    pub null_fill: u8,
}

impl KeyPart {
    pub fn new(start: usize, length: usize, typ: PartType) -> KeyPart {
        KeyPart {
            start,
            length,
            typ,
            descending: false,
            null_fill: 0,
        }
    }

    pub fn descending(mut self) -> KeyPart {
        self.descending = true;
        self
    }

    pub fn width(&self) -> usize {
        self.typ.fixed_width(self.length)
    }
}

bitflags_lite! {
    /// Descriptor flags (spec.md §3).
    pub struct KeyFlags: u16 {
        const DUPS = 0x01;
        const LEADING_COMPRESS = 0x02;
        const TRAILING_COMPRESS = 0x04;
        const DUP_COMPRESS = 0x08;
        const NULL_KEY = 0x10;
    }
}

/// A key descriptor: 1..8 parts plus flags. Index 0 is always the primary.
#[derive(Clone, Debug)]
pub struct KeyDescriptor {
    pub parts: Vec<KeyPart>,
    pub flags: KeyFlags,
}

impl KeyDescriptor {
    pub fn new(parts: Vec<KeyPart>, flags: KeyFlags) -> Result<KeyDescriptor> {
        if parts.is_empty() || parts.len() > MAX_PARTS {
            return err_at!(BadKey, msg: "key descriptor must have 1..{} parts", MAX_PARTS)?;
        }
        let total: usize = parts.iter().map(|p| p.width()).sum();
        if total > MAX_KEYLEN {
            return err_at!(BadKey, msg: "key length {} exceeds {}", total, MAX_KEYLEN)?;
        }
        Ok(KeyDescriptor { parts, flags })
    }

    pub fn key_length(&self) -> usize {
        self.parts.iter().map(|p| p.width()).sum()
    }

    pub fn has_dups(&self) -> bool {
        self.flags.contains(KeyFlags::DUPS)
    }

    /// Build the uncompressed composite key out of a row image.
    pub fn build_key(&self, row: &[u8]) -> Result<Vec<u8>> {
        let mut key = Vec::with_capacity(self.key_length());
        for part in &self.parts {
            let w = part.width();
            if part.start + w > row.len() {
                return err_at!(
                    BadArg, msg: "row image too short for key part at {}..{}", part.start, part.start + w
                )?;
            }
            key.extend_from_slice(&row[part.start..part.start + w]);
        }
        Ok(key)
    }

    /// True when `NULL_KEY` is set and every part of `key` equals its
    /// declared null-fill byte.
    pub fn is_null_key(&self, key: &[u8]) -> bool {
        if !self.flags.contains(KeyFlags::NULL_KEY) {
            return false;
        }
        let mut off = 0;
        for part in &self.parts {
            let w = part.width();
            if key[off..off + w].iter().any(|&b| b != part.null_fill) {
                return false;
            }
            off += w;
        }
        true
    }

    /// Typed, part-wise comparison honoring descending parts
    /// (spec.md §4.4 "Comparison is `(key, dup)` lexicographic"; each part's
    /// typed ordering is computed independently, then reversed if that part
    /// is descending).
    pub fn compare_keys(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        let mut off = 0;
        for part in &self.parts {
            let w = part.width();
            let (pa, pb) = (&a[off..off + w], &b[off..off + w]);
            let ord = compare_part(part.typ, pa, pb)?;
            let ord = if part.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            off += w;
        }
        Ok(Ordering::Equal)
    }
}

fn compare_part(typ: PartType, a: &[u8], b: &[u8]) -> Result<Ordering> {
    let ord = match typ {
        PartType::Char => a.cmp(b),
        PartType::Int16 => codec::load_i16(a)?.cmp(&codec::load_i16(b)?),
        PartType::Int32 => codec::load_i32(a)?.cmp(&codec::load_i32(b)?),
        PartType::Int64 => codec::load_i64(a)?.cmp(&codec::load_i64(b)?),
        PartType::Float32 => {
            let (fa, fb) = (codec::load_f32(a)?, codec::load_f32(b)?);
            fa.partial_cmp(&fb)
                .ok_or_else(|| Error::BadFile("NaN in float key part".into()))?
        }
        PartType::Float64 => {
            let (fa, fb) = (codec::load_f64(a)?, codec::load_f64(b)?);
            fa.partial_cmp(&fb)
                .ok_or_else(|| Error::BadFile("NaN in float key part".into()))?
        }
    };
    Ok(ord)
}

/// Fabricate the extremal key of this descriptor's type for `FIRST`/`LAST`
/// search modes (spec.md §4.4).
pub fn extremal_key(desc: &KeyDescriptor, high: bool) -> Vec<u8> {
    let mut key = Vec::with_capacity(desc.key_length());
    for part in &desc.parts {
        let w = part.width();
        // "greatest" for a part accounts for descending: if descending,
        // structurally-high bytes still sort first once the comparator
        // reverses the part, so the fabricated extremal key is built
        // independent of direction and only the search descent direction
        // differs.
        let want_high = high;
        match part.typ {
            PartType::Char => {
                let fill = if want_high { 0xff } else { 0x00 };
                key.extend(std::iter::repeat(fill).take(w));
            }
            PartType::Int16 => {
                let v = if want_high { i16::MAX } else { i16::MIN };
                codec::store_i16(&mut key, v).unwrap();
            }
            PartType::Int32 => {
                let v = if want_high { i32::MAX } else { i32::MIN };
                codec::store_i32(&mut key, v).unwrap();
            }
            PartType::Int64 => {
                let v = if want_high { i64::MAX } else { i64::MIN };
                codec::store_i64(&mut key, v).unwrap();
            }
            PartType::Float32 => {
                let v = if want_high {
                    f32::INFINITY
                } else {
                    f32::NEG_INFINITY
                };
                codec::store_f32(&mut key, v).unwrap();
            }
            PartType::Float64 => {
                let v = if want_high {
                    codec::HIGH_WATER_F64
                } else {
                    codec::LOW_WATER_F64
                };
                codec::store_f64(&mut key, v).unwrap();
            }
        }
    }
    key
}

impl PartType {
    fn tag(&self) -> u8 {
        match self {
            PartType::Char => 0,
            PartType::Int16 => 1,
            PartType::Int32 => 2,
            PartType::Int64 => 3,
            PartType::Float32 => 4,
            PartType::Float64 => 5,
        }
    }

    fn from_tag(tag: u8) -> Result<PartType> {
        Ok(match tag {
            0 => PartType::Char,
            1 => PartType::Int16,
            2 => PartType::Int32,
            3 => PartType::Int64,
            4 => PartType::Float32,
            5 => PartType::Float64,
            v => return err_at!(BadKey, msg: "unknown key part typecode {}", v)?,
        })
    }
}

/// A persisted key descriptor: one node in the dictionary's linked list of
/// indexes (spec.md §3 "Key descriptor"), carrying the index's B+tree root
/// alongside its descriptor so `table.rs` can walk the list on open without
/// a separate lookup.
pub struct KeyDescNode {
    /// Next node in `Dictionary::keydesc_head`'s list, 0 if this is the last.
    pub next: u64,
    pub root: u64,
    pub desc: KeyDescriptor,
}

const NODE_HEADER_LEN: usize = 8 + 8 + 1 + 2; // next, root, part_count, flags
const PART_LEN: usize = 2 + 2 + 1 + 1 + 1; // start, length, typecode, descending, null_fill

impl KeyDescNode {
    pub fn encode_into(&self, buf: &mut [u8], mode: Mode) -> Result<()> {
        let trailer_size = Trailer::size(mode);
        let body_end = buf.len() - trailer_size;
        let needed = NODE_HEADER_LEN + self.desc.parts.len() * PART_LEN;
        if needed > body_end {
            return err_at!(Fatal, msg: "key descriptor needs {} bytes, node budget is {}", needed, body_end)?;
        }
        for b in buf[..body_end].iter_mut() {
            *b = 0;
        }
        codec::store_u64_into(&mut buf[0..8], self.next)?;
        codec::store_u64_into(&mut buf[8..16], self.root)?;
        buf[16] = self.desc.parts.len() as u8;
        codec::store_u16_into(&mut buf[17..19], self.desc.flags.0)?;

        let mut off = NODE_HEADER_LEN;
        for part in &self.desc.parts {
            codec::store_u16_into(&mut buf[off..off + 2], part.start as u16)?;
            codec::store_u16_into(&mut buf[off + 2..off + 4], part.length as u16)?;
            buf[off + 4] = part.typ.tag();
            buf[off + 5] = part.descending as u8;
            buf[off + 6] = part.null_fill;
            off += PART_LEN;
        }
        Trailer::keydesc().write_into(buf, mode);
        Ok(())
    }

    pub fn decode(buf: &[u8], mode: Mode) -> Result<KeyDescNode> {
        let next = codec::load_u64(&buf[0..8])?;
        let root = codec::load_u64(&buf[8..16])?;
        let part_count = buf[16] as usize;
        let flags = KeyFlags(codec::load_u16(&buf[17..19])?);

        let mut off = NODE_HEADER_LEN;
        let mut parts = Vec::with_capacity(part_count);
        for _ in 0..part_count {
            let start = codec::load_u16(&buf[off..off + 2])? as usize;
            let length = codec::load_u16(&buf[off + 2..off + 4])? as usize;
            let typ = PartType::from_tag(buf[off + 4])?;
            let descending = buf[off + 5] != 0;
            let null_fill = buf[off + 6];
            parts.push(KeyPart {
                start,
                length,
                typ,
                descending,
                null_fill,
            });
            off += PART_LEN;
        }
        let _ = mode;
        let desc = KeyDescriptor::new(parts, flags)?;
        Ok(KeyDescNode { next, root, desc })
    }
}

#[cfg(test)]
#[path = "keydesc_test.rs"]
mod keydesc_test;
