//! Log record header and opcode set (spec.md §4.8).
//!
//! Every record is framed `{length, header, payload, length}`; the two
//! length fields bracket everything between them (header + payload) so a
//! reverse scan starting from the tail can locate one record without
//! having walked any of the records before it. Within the header,
//! `prev_offset`/`prev_length` point directly at this PID's previous
//! record, which is what actually makes backward rollback O(1) per
//! record — the trailing length field is only needed once, to find the
//! very last record in the file.

use crate::util::codec;
use crate::Result;

/// Two-letter operation codes, matching spec.md §4.8 exactly.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Opcode {
    Begin,
    Commit,
    Rollback,
    Insert,
    Update,
    Delete,
    FileOpen,
    FileClose,
    Erase,
    Rename,
    Build,
    CreateIndex,
    DeleteIndex,
    SetUnique,
    UniqueId,
    Cluster,
}

impl Opcode {
    fn code(&self) -> [u8; 2] {
        match self {
            Opcode::Begin => *b"BW",
            Opcode::Commit => *b"CW",
            Opcode::Rollback => *b"RW",
            Opcode::Insert => *b"IN",
            Opcode::Update => *b"UP",
            Opcode::Delete => *b"DE",
            Opcode::FileOpen => *b"FO",
            Opcode::FileClose => *b"FC",
            Opcode::Erase => *b"ER",
            Opcode::Rename => *b"RE",
            Opcode::Build => *b"BU",
            Opcode::CreateIndex => *b"CI",
            Opcode::DeleteIndex => *b"DI",
            Opcode::SetUnique => *b"SU",
            Opcode::UniqueId => *b"UN",
            Opcode::Cluster => *b"CL",
        }
    }

    fn from_code(code: [u8; 2]) -> Result<Opcode> {
        Ok(match &code {
            b"BW" => Opcode::Begin,
            b"CW" => Opcode::Commit,
            b"RW" => Opcode::Rollback,
            b"IN" => Opcode::Insert,
            b"UP" => Opcode::Update,
            b"DE" => Opcode::Delete,
            b"FO" => Opcode::FileOpen,
            b"FC" => Opcode::FileClose,
            b"ER" => Opcode::Erase,
            b"RE" => Opcode::Rename,
            b"BU" => Opcode::Build,
            b"CI" => Opcode::CreateIndex,
            b"DI" => Opcode::DeleteIndex,
            b"SU" => Opcode::SetUnique,
            b"UN" => Opcode::UniqueId,
            b"CL" => Opcode::Cluster,
            _ => return err_at!(BadLog, msg: "unknown log opcode {:?}", code)?,
        })
    }
}

pub const HEADER_LEN: usize = 2 + 4 + 4 + 8 + 4 + 8 + 4;
pub const LEN_FIELD: usize = 2;

#[derive(Clone, Debug)]
pub struct RecordHeader {
    pub opcode: Opcode,
    pub pid: u32,
    pub uid: u32,
    pub time: i64,
    /// Reserved for future use; always zero on write.
    pub reserved: u32,
    /// Byte offset of this PID's previous record's header (0 if none).
    pub prev_offset: u64,
    /// Total on-disk span of that previous record (0 if none).
    pub prev_length: u32,
}

impl RecordHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&self.opcode.code());
        // unwraps: fixed-width writes into a freshly allocated Vec never fail
        codec::store_u32(&mut buf, self.pid).unwrap();
        codec::store_u32(&mut buf, self.uid).unwrap();
        codec::store_i64(&mut buf, self.time).unwrap();
        codec::store_u32(&mut buf, self.reserved).unwrap();
        codec::store_u64(&mut buf, self.prev_offset).unwrap();
        codec::store_u32(&mut buf, self.prev_length).unwrap();
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<RecordHeader> {
        if buf.len() < HEADER_LEN {
            return err_at!(BadLog, msg: "log header truncated: {} bytes", buf.len())?;
        }
        let opcode = Opcode::from_code([buf[0], buf[1]])?;
        Ok(RecordHeader {
            opcode,
            pid: codec::load_u32(&buf[2..6])?,
            uid: codec::load_u32(&buf[6..10])?,
            time: codec::load_i64(&buf[10..18])?,
            reserved: codec::load_u32(&buf[18..22])?,
            prev_offset: codec::load_u64(&buf[22..30])?,
            prev_length: codec::load_u32(&buf[30..34])?,
        })
    }
}

/// A full record: header plus opcode-specific payload bytes.
#[derive(Clone, Debug)]
pub struct Record {
    pub header: RecordHeader,
    pub payload: Vec<u8>,
}

/// Frame a record for on-disk append. Returns the bytes to write and the
/// "length" value (header + payload) recorded at both ends, which is
/// exactly `prev_length` for whatever gets appended after it.
///
/// The length fields are 2 bytes wide (spec.md §4.8), so a single
/// record's header+payload is capped at 65535 bytes; a row (or other
/// payload) too large for that is the same limitation the reference
/// implementation's own log writer carries.
pub fn encode(header: &RecordHeader, payload: &[u8]) -> Result<(Vec<u8>, u32)> {
    let core_len = HEADER_LEN + payload.len();
    if core_len > u16::MAX as usize {
        return err_at!(LogWrit, msg: "log record of {} bytes exceeds the 65535-byte frame limit", core_len)?;
    }
    let core_len = core_len as u32;
    let mut buf = Vec::with_capacity(LEN_FIELD * 2 + HEADER_LEN + payload.len());
    codec::store_u16(&mut buf, core_len as u16).unwrap();
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    codec::store_u16(&mut buf, core_len as u16).unwrap();
    Ok((buf, core_len))
}

/// Decode a record whose `core_len`-byte body (header+payload, as framed
/// by [`encode`]) has already been read, sans both length fields.
pub fn decode_core(core: &[u8]) -> Result<Record> {
    if core.len() < HEADER_LEN {
        return err_at!(BadLog, msg: "log record shorter than header: {} bytes", core.len())?;
    }
    let header = RecordHeader::decode(&core[..HEADER_LEN])?;
    let payload = core[HEADER_LEN..].to_vec();
    Ok(Record { header, payload })
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
