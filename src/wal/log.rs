//! The log file itself: append, backward rollback scan, and forward
//! crash recovery (spec.md §4.8, grounded on `istrans.c`'s
//! `isbegin`/`iscommit`/`isrollback`/`iVBRollMeBack`/`iVBRollMeForward`).
//!
//! Records chain through one global, PID-agnostic list — each record's
//! header carries the offset/length of whatever record preceded it in
//! the file, regardless of which process wrote it (mirrors the
//! reference implementation's single `tOffset`/`iPrevLen` append
//! cursor). Walking backward for a particular PID means following that
//! chain hop by hop and skipping records that belong to other PIDs;
//! each hop itself is O(1) since the predecessor's position is already
//! in hand.

use std::io::{Read, Seek, SeekFrom, Write};
use std::{collections::HashMap, fs};

use super::record::{self, Opcode, RecordHeader};
use crate::util::codec;
use crate::Result;

/// An open append-only log file, tracking the tail of the global record
/// chain so the next append can link back to it.
pub struct WalFile {
    file: fs::File,
    /// Core offset (just past the leading length field) of the most
    /// recently appended record, 0 if the log is empty.
    tail_offset: u64,
    /// That record's core length (header+payload), 0 if the log is empty.
    tail_length: u32,
}

impl WalFile {
    pub fn create(file: fs::File) -> WalFile {
        WalFile {
            file,
            tail_offset: 0,
            tail_length: 0,
        }
    }

    /// Reopen an existing log, scanning forward once to find its current
    /// tail so subsequent appends link correctly.
    pub fn open(mut file: fs::File) -> Result<WalFile> {
        let len = err_at!(IOError, file.metadata(), "log metadata")?.len();
        let mut tail = (0u64, 0u32);
        let mut off = 0u64;
        while off < len {
            let (header_pos, core_len) = read_framed_at(&mut file, off)?;
            tail = (header_pos, core_len);
            off = header_pos + core_len as u64 + record::LEN_FIELD as u64;
        }
        Ok(WalFile {
            file,
            tail_offset: tail.0,
            tail_length: tail.1,
        })
    }

    fn now() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
    }

    /// Append one record, linking it to the current tail, and advance
    /// the tail to it. Returns `(core_offset, core_length)` for this
    /// record, which a caller building a `Transaction` uses to remember
    /// its own `BW`'s position.
    pub fn append(&mut self, opcode: Opcode, pid: u32, uid: u32, payload: &[u8]) -> Result<(u64, u32)> {
        let header = RecordHeader {
            opcode,
            pid,
            uid,
            time: Self::now(),
            reserved: 0,
            prev_offset: self.tail_offset,
            prev_length: self.tail_length,
        };
        let (framed, core_len) = record::encode(&header, payload)?;

        let write_offset = err_at!(IOError, self.file.seek(SeekFrom::End(0)), "seek log end")?;
        match err_at!(LogWrit, self.file.write(&framed), "append log record")? {
            n if n == framed.len() => {}
            n => return err_at!(LogWrit, msg: "short log write {}/{}", n, framed.len())?,
        }
        err_at!(LogWrit, self.file.sync_data(), "fsync log")?;

        let core_offset = write_offset + record::LEN_FIELD as u64;
        self.tail_offset = core_offset;
        self.tail_length = core_len;
        Ok((core_offset, core_len))
    }

    pub fn tail(&self) -> (u64, u32) {
        (self.tail_offset, self.tail_length)
    }
}

fn read_exact_at(file: &mut fs::File, offset: u64, len: usize) -> Result<Vec<u8>> {
    err_at!(IOError, file.seek(SeekFrom::Start(offset)), "seek log offset {}", offset)?;
    let mut buf = vec![0u8; len];
    match err_at!(LogRead, file.read(&mut buf), "read log at {}", offset)? {
        n if n == len => Ok(buf),
        n => err_at!(BadFile, msg: "short log read at {}: {}/{}", offset, n, len),
    }
}

/// Read the record whose leading length field starts at `offset`.
/// Returns `(core_offset, core_length)`.
fn read_framed_at(file: &mut fs::File, offset: u64) -> Result<(u64, u32)> {
    let lead = read_exact_at(file, offset, record::LEN_FIELD)?;
    let core_len = codec::load_u16(&lead)? as u32;
    if core_len == 0 {
        return err_at!(BadLog, msg: "zero-length log record at {}", offset)?;
    }
    Ok((offset + record::LEN_FIELD as u64, core_len))
}

fn read_record_core(file: &mut fs::File, core_offset: u64, core_len: u32) -> Result<record::Record> {
    let core = read_exact_at(file, core_offset, core_len as usize)?;
    record::decode_core(&core)
}

/// Callbacks a rollback (live or during crash recovery) drives to undo
/// one already-applied operation.
pub trait Undo {
    fn undo_insert(&mut self, handle: u32, row: u64) -> Result<()>;
    fn undo_update(&mut self, handle: u32, row: u64, old_image: &[u8]) -> Result<()>;
    fn undo_delete(&mut self, handle: u32, row: u64, old_image: &[u8]) -> Result<()>;
    fn undo_file_open(&mut self, handle: u32) -> Result<()>;
    fn undo_file_close(&mut self, handle: u32, filename: &str) -> Result<()>;
}

/// Extra hook only `recover()` needs: a `DE` record's row can only be
/// freed for reuse once its transaction is known to have committed.
pub trait Recover: Undo {
    fn on_commit_row_free(&mut self, handle: u32, row: u64) -> Result<()>;
}

fn encode_row_payload(handle: u32, row: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(12);
    codec::store_u32(&mut buf, handle).unwrap();
    codec::store_u64(&mut buf, row).unwrap();
    buf
}

fn decode_row_payload(buf: &[u8]) -> Result<(u32, u64)> {
    if buf.len() < 12 {
        return err_at!(BadLog, msg: "truncated row payload: {} bytes", buf.len())?;
    }
    Ok((codec::load_u32(&buf[0..4])?, codec::load_u64(&buf[4..12])?))
}

fn encode_image_payload(handle: u32, row: u64, image: &[u8]) -> Vec<u8> {
    let mut buf = encode_row_payload(handle, row);
    buf.extend_from_slice(image);
    buf
}

fn decode_image_payload(buf: &[u8]) -> Result<(u32, u64, Vec<u8>)> {
    let (handle, row) = decode_row_payload(buf)?;
    Ok((handle, row, buf[12..].to_vec()))
}

fn encode_file_payload(handle: u32, filename: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + filename.len());
    codec::store_u32(&mut buf, handle).unwrap();
    buf.extend_from_slice(filename.as_bytes());
    buf
}

fn decode_file_payload(buf: &[u8]) -> Result<(u32, String)> {
    if buf.len() < 4 {
        return err_at!(BadLog, msg: "truncated file payload: {} bytes", buf.len())?;
    }
    let handle = codec::load_u32(&buf[0..4])?;
    let name = err_at!(BadLog, String::from_utf8(buf[4..].to_vec()), "log filename")?;
    Ok((handle, name))
}

/// Per-handle transaction state: lazy `BW` emission on the first
/// modifying write, then `commit`/`rollback`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TxnState {
    None,
    Begun,
    NeedFlush,
}

pub struct Transaction {
    state: TxnState,
    pid: u32,
    uid: u32,
}

impl Transaction {
    pub fn begin(pid: u32, uid: u32) -> Transaction {
        Transaction {
            state: TxnState::Begun,
            pid,
            uid,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != TxnState::None
    }

    fn ensure_began(&mut self, log: &mut WalFile) -> Result<()> {
        if self.state == TxnState::Begun {
            log.append(Opcode::Begin, self.pid, self.uid, &[])?;
            self.state = TxnState::NeedFlush;
        }
        Ok(())
    }

    pub fn log_insert(&mut self, log: &mut WalFile, handle: u32, row: u64) -> Result<()> {
        self.ensure_began(log)?;
        log.append(Opcode::Insert, self.pid, self.uid, &encode_row_payload(handle, row))?;
        Ok(())
    }

    pub fn log_update(&mut self, log: &mut WalFile, handle: u32, row: u64, old_image: &[u8]) -> Result<()> {
        self.ensure_began(log)?;
        log.append(Opcode::Update, self.pid, self.uid, &encode_image_payload(handle, row, old_image))?;
        Ok(())
    }

    pub fn log_delete(&mut self, log: &mut WalFile, handle: u32, row: u64, old_image: &[u8]) -> Result<()> {
        self.ensure_began(log)?;
        log.append(Opcode::Delete, self.pid, self.uid, &encode_image_payload(handle, row, old_image))?;
        Ok(())
    }

    pub fn log_file_open(&mut self, log: &mut WalFile, handle: u32, filename: &str) -> Result<()> {
        self.ensure_began(log)?;
        log.append(Opcode::FileOpen, self.pid, self.uid, &encode_file_payload(handle, filename))?;
        Ok(())
    }

    pub fn log_file_close(&mut self, log: &mut WalFile, handle: u32, filename: &str) -> Result<()> {
        self.ensure_began(log)?;
        log.append(Opcode::FileClose, self.pid, self.uid, &encode_file_payload(handle, filename))?;
        Ok(())
    }

    /// Opcodes with no rollback/recovery semantics of their own (`ER`,
    /// `RE`, `BU`, `CI`, `DI`, `SU`, `UN`, `CL`) — logged verbatim for
    /// the record, payload format is the caller's concern.
    pub fn log_misc(&mut self, log: &mut WalFile, opcode: Opcode, payload: &[u8]) -> Result<()> {
        self.ensure_began(log)?;
        log.append(opcode, self.pid, self.uid, payload)?;
        Ok(())
    }

    pub fn commit(&mut self, log: &mut WalFile) -> Result<()> {
        if self.state == TxnState::NeedFlush {
            log.append(Opcode::Commit, self.pid, self.uid, &[])?;
        }
        self.state = TxnState::None;
        Ok(())
    }

    pub fn rollback<U: Undo>(&mut self, log: &mut WalFile, sink: &mut U) -> Result<()> {
        if self.state != TxnState::NeedFlush {
            self.state = TxnState::None;
            return Ok(());
        }
        let before_rw = log.tail();
        log.append(Opcode::Rollback, self.pid, self.uid, &[])?;
        rollback_scan(&mut log.file, before_rw, self.pid, sink)?;
        self.state = TxnState::None;
        Ok(())
    }
}

/// Walk the global chain backward from `cursor`, applying undo actions
/// for every record belonging to `pid`, stopping at (and consuming)
/// that PID's `BW`.
fn rollback_scan<U: Undo>(file: &mut fs::File, mut cursor: (u64, u32), pid: u32, sink: &mut U) -> Result<()> {
    loop {
        let (offset, length) = cursor;
        if length == 0 {
            return err_at!(BadLog, msg: "rollback scan ran off the start of the log without a BW for pid {}", pid)?;
        }
        let rec = read_record_core(file, offset, length)?;
        let next = (rec.header.prev_offset, rec.header.prev_length);

        if rec.header.pid != pid {
            cursor = next;
            continue;
        }
        match rec.header.opcode {
            Opcode::Begin => return Ok(()),
            Opcode::Insert => {
                let (handle, row) = decode_row_payload(&rec.payload)?;
                sink.undo_insert(handle, row)?;
            }
            Opcode::Update => {
                let (handle, row, old) = decode_image_payload(&rec.payload)?;
                sink.undo_update(handle, row, &old)?;
            }
            Opcode::Delete => {
                let (handle, row, old) = decode_image_payload(&rec.payload)?;
                sink.undo_delete(handle, row, &old)?;
            }
            Opcode::FileOpen => {
                let (handle, _name) = decode_file_payload(&rec.payload)?;
                sink.undo_file_open(handle)?;
            }
            Opcode::FileClose => {
                let (handle, name) = decode_file_payload(&rec.payload)?;
                sink.undo_file_close(handle, &name)?;
            }
            _ => {}
        }
        cursor = next;
    }
}

#[derive(Default)]
struct OpenTxn {
    deferred_deletes: Vec<(u32, u64)>,
}

/// Forward crash recovery: replay the log from the start, tracking open
/// transactions per PID, rolling back anything orphaned, and applying
/// deferred `DE` frees only once their transaction is confirmed
/// committed (spec.md §4.8).
pub fn recover<U: Recover>(file: &mut fs::File, sink: &mut U) -> Result<()> {
    let len = err_at!(IOError, file.metadata(), "log metadata")?.len();
    let mut open: HashMap<u32, OpenTxn> = HashMap::new();
    let mut global_tail = (0u64, 0u32);
    let mut off = 0u64;

    while off < len {
        let (core_offset, core_len) = read_framed_at(file, off)?;
        let rec = read_record_core(file, core_offset, core_len)?;
        let pid = rec.header.pid;

        match rec.header.opcode {
            Opcode::Begin => {
                if open.contains_key(&pid) {
                    open.remove(&pid);
                    rollback_scan(file, (rec.header.prev_offset, rec.header.prev_length), pid, sink)?;
                }
                open.insert(pid, OpenTxn::default());
            }
            Opcode::Commit => {
                if let Some(txn) = open.remove(&pid) {
                    for (handle, row) in txn.deferred_deletes {
                        sink.on_commit_row_free(handle, row)?;
                    }
                } else {
                    return err_at!(BadLog, msg: "CW for pid {} with no open BW", pid)?;
                }
            }
            Opcode::Rollback => {
                // The undo already ran synchronously when this RW was
                // first written; recovery only needs to close the slot.
                open.remove(&pid);
            }
            Opcode::Delete => {
                if let Some(txn) = open.get_mut(&pid) {
                    let (handle, row, _old) = decode_image_payload(&rec.payload)?;
                    txn.deferred_deletes.push((handle, row));
                }
            }
            _ => {}
        }

        global_tail = (core_offset, core_len);
        off = core_offset + core_len as u64 + record::LEN_FIELD as u64;
    }

    for pid in open.keys().copied().collect::<Vec<_>>() {
        rollback_scan(file, global_tail, pid, sink)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "log_test.rs"]
mod log_test;
