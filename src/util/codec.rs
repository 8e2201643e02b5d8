//! Big-endian scalar codec (spec.md §4.2).
//!
//! All on-disk scalars are big-endian regardless of host byte order. This
//! wraps the `byteorder` crate's `BigEndian` cursor helpers rather than
//! hand-rolled shifts, matching the ecosystem's usual approach to
//! byte-exact wire/disk formats.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::{Error, Result};

/// Bit pattern used for the "high water" sentinel on signed doubles
/// (spec.md §4.2: "+∞ equivalent bit pattern").
pub const HIGH_WATER_F64: f64 = f64::INFINITY;
/// Bit pattern used for the "low water" sentinel on signed doubles.
pub const LOW_WATER_F64: f64 = f64::NEG_INFINITY;

pub fn load_i16(buf: &[u8]) -> Result<i16> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_i16::<BigEndian>(), "load_i16")
}

pub fn store_i16(buf: &mut Vec<u8>, v: i16) -> Result<()> {
    err_at!(Fatal, buf.write_i16::<BigEndian>(v), "store_i16")
}

pub fn load_i32(buf: &[u8]) -> Result<i32> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_i32::<BigEndian>(), "load_i32")
}

pub fn store_i32(buf: &mut Vec<u8>, v: i32) -> Result<()> {
    err_at!(Fatal, buf.write_i32::<BigEndian>(v), "store_i32")
}

pub fn load_i64(buf: &[u8]) -> Result<i64> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_i64::<BigEndian>(), "load_i64")
}

pub fn store_i64(buf: &mut Vec<u8>, v: i64) -> Result<()> {
    err_at!(Fatal, buf.write_i64::<BigEndian>(v), "store_i64")
}

pub fn load_u16(buf: &[u8]) -> Result<u16> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_u16::<BigEndian>(), "load_u16")
}

pub fn store_u16(buf: &mut Vec<u8>, v: u16) -> Result<()> {
    err_at!(Fatal, buf.write_u16::<BigEndian>(v), "store_u16")
}

pub fn load_u32(buf: &[u8]) -> Result<u32> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_u32::<BigEndian>(), "load_u32")
}

pub fn store_u32(buf: &mut Vec<u8>, v: u32) -> Result<()> {
    err_at!(Fatal, buf.write_u32::<BigEndian>(v), "store_u32")
}

pub fn load_u64(buf: &[u8]) -> Result<u64> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_u64::<BigEndian>(), "load_u64")
}

pub fn store_u64(buf: &mut Vec<u8>, v: u64) -> Result<()> {
    err_at!(Fatal, buf.write_u64::<BigEndian>(v), "store_u64")
}

pub fn load_f32(buf: &[u8]) -> Result<f32> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_f32::<BigEndian>(), "load_f32")
}

pub fn store_f32(buf: &mut Vec<u8>, v: f32) -> Result<()> {
    err_at!(Fatal, buf.write_f32::<BigEndian>(v), "store_f32")
}

pub fn load_f64(buf: &[u8]) -> Result<f64> {
    let mut c = Cursor::new(buf);
    err_at!(BadFile, c.read_f64::<BigEndian>(), "load_f64")
}

pub fn store_f64(buf: &mut Vec<u8>, v: f64) -> Result<()> {
    err_at!(Fatal, buf.write_f64::<BigEndian>(v), "store_f64")
}

/// In-place counterparts of the `store_*` family, writing at the front of
/// an existing fixed-size slice instead of appending to a `Vec`. Used when
/// filling a preallocated node buffer at a fixed offset.
pub fn store_u16_into(buf: &mut [u8], v: u16) -> Result<()> {
    err_at!(Fatal, (&mut buf[..2]).write_u16::<BigEndian>(v), "store_u16_into")
}

pub fn store_u32_into(buf: &mut [u8], v: u32) -> Result<()> {
    err_at!(Fatal, (&mut buf[..4]).write_u32::<BigEndian>(v), "store_u32_into")
}

pub fn store_u64_into(buf: &mut [u8], v: u64) -> Result<()> {
    err_at!(Fatal, (&mut buf[..8]).write_u64::<BigEndian>(v), "store_u64_into")
}

pub fn store_i16_into(buf: &mut [u8], v: i16) -> Result<()> {
    err_at!(Fatal, (&mut buf[..2]).write_i16::<BigEndian>(v), "store_i16_into")
}

pub fn store_i32_into(buf: &mut [u8], v: i32) -> Result<()> {
    err_at!(Fatal, (&mut buf[..4]).write_i32::<BigEndian>(v), "store_i32_into")
}

pub fn store_i64_into(buf: &mut [u8], v: i64) -> Result<()> {
    err_at!(Fatal, (&mut buf[..8]).write_i64::<BigEndian>(v), "store_i64_into")
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
