//! Byte-range file/row locking over a fixed offset map on the index file
//! (spec.md §4.7).
//!
//! Three lock ranges share the index file's address space, scaled by
//! `dict::Mode` exactly like node pointers are: a header guard at offset
//! 0 covering everything below the row-lock base, per-row exclusive
//! locks (or one table-wide lock) starting at the row-lock base, and a
//! single file-open byte at the very top. All locking goes through
//! `fcntl(2)` `F_SETLK`/`F_SETLKW` rather than `flock(2)`, since only
//! `fcntl` supports the byte ranges this scheme depends on.

use std::fs;
use std::os::unix::io::AsRawFd;

use crate::dict::Mode;
use crate::Result;

fn quad(first_byte: u8, fill: u8, width: usize) -> i64 {
    let mut v: u64 = 0;
    for i in 0..width {
        let byte = if i == 0 { first_byte } else { fill };
        v = (v << 8) | byte as u64;
    }
    v as i64
}

/// Length of the header-guard range, and of the table-wide all-rows range.
fn guard_len(mode: Mode) -> i64 {
    quad(0x3f, 0xff, mode.ptr_size())
}

/// Start of the row-lock address space.
fn row_base(mode: Mode) -> i64 {
    quad(0x40, 0x00, mode.ptr_size())
}

/// Offset of the single file-open lock byte.
fn file_open_offset(mode: Mode) -> i64 {
    quad(0x7f, 0xff, mode.ptr_size())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LockKind {
    Read,
    Write,
    Unlock,
}

fn raw_lock(file: &fs::File, kind: LockKind, start: i64, len: i64, wait: bool) -> Result<()> {
    let l_type = match kind {
        LockKind::Read => libc::F_RDLCK,
        LockKind::Write => libc::F_WRLCK,
        LockKind::Unlock => libc::F_UNLCK,
    };
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = l_type as i16;
    fl.l_whence = libc::SEEK_SET as i16;
    fl.l_start = start as libc::off_t;
    fl.l_len = len as libc::off_t;

    let cmd = if wait || kind == LockKind::Unlock {
        libc::F_SETLKW
    } else {
        libc::F_SETLK
    };

    loop {
        let ret = unsafe { libc::fcntl(file.as_raw_fd(), cmd, &fl) };
        if ret == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EACCES) | Some(libc::EAGAIN) => {
                return err_at!(Locked, msg: "byte range [{}, {}) held by another process", start, start + len)?;
            }
            _ => return err_at!(IOError, Err::<(), _>(err))?,
        }
    }
}

/// `enter(modifying)`'s lock acquisition: shared for reads, exclusive for
/// writers. Always blocking — this is the one suspension point every
/// operation passes through (spec.md §5 "Suspension points").
pub fn header_guard(file: &fs::File, mode: Mode, modifying: bool) -> Result<()> {
    let kind = if modifying { LockKind::Write } else { LockKind::Read };
    raw_lock(file, kind, 0, guard_len(mode), true)
}

pub fn header_guard_unlock(file: &fs::File, mode: Mode) -> Result<()> {
    raw_lock(file, LockKind::Unlock, 0, guard_len(mode), true)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileOpenKind {
    Shared,
    Exclusive,
    Unlock,
}

/// `ISEXCLLOCK`/normal-open's file-open byte (spec.md §4.7 "File-open").
pub fn file_open(file: &fs::File, mode: Mode, kind: FileOpenKind) -> Result<()> {
    let lk = match kind {
        FileOpenKind::Shared => LockKind::Read,
        FileOpenKind::Exclusive => LockKind::Write,
        FileOpenKind::Unlock => LockKind::Unlock,
    };
    match raw_lock(file, lk, file_open_offset(mode), 1, false) {
        Err(_) if lk != LockKind::Unlock => err_at!(FLocked, msg: "file-open lock already held")?,
        other => other,
    }
}

/// A single row's exclusive byte range, starting at the row-lock base.
pub fn row_lock(file: &fs::File, mode: Mode, row: u64, wait: bool) -> Result<()> {
    raw_lock(file, LockKind::Write, row_base(mode) + row as i64, 1, wait)
}

pub fn row_unlock(file: &fs::File, mode: Mode, row: u64) -> Result<()> {
    raw_lock(file, LockKind::Unlock, row_base(mode) + row as i64, 1, true)
}

/// Table-wide row lock (`islock`): one write lock spanning the entire
/// row-lock address space.
pub fn all_rows_lock(file: &fs::File, mode: Mode, wait: bool) -> Result<()> {
    raw_lock(file, LockKind::Write, row_base(mode), guard_len(mode), wait)
}

pub fn all_rows_unlock(file: &fs::File, mode: Mode) -> Result<()> {
    raw_lock(file, LockKind::Unlock, row_base(mode), guard_len(mode), true)
}

/// In-memory per-index-file-descriptor record of which handle holds
/// which row, sorted by row number (spec.md §4.7 "Lock list"). This
/// coordinates handles sharing one process — the OS-level byte-range
/// lock is what coordinates across processes.
#[derive(Default)]
pub struct LockList {
    entries: Vec<(u64, u64)>, // (row, handle), sorted by row
}

impl LockList {
    pub fn new() -> LockList {
        LockList::default()
    }

    /// Record `handle` as holding `row`. A no-op if `handle` already
    /// holds it; fails with `Locked` if a different handle does.
    pub fn insert(&mut self, row: u64, handle: u64) -> Result<()> {
        match self.entries.binary_search_by_key(&row, |&(r, _)| r) {
            Ok(idx) => {
                if self.entries[idx].1 == handle {
                    Ok(())
                } else {
                    err_at!(Locked, msg: "row {} already held by another handle", row)?
                }
            }
            Err(idx) => {
                self.entries.insert(idx, (row, handle));
                Ok(())
            }
        }
    }

    /// Drop `handle`'s hold on `row`. A no-op if nobody holds it; fails
    /// with `Locked` if a different handle holds it.
    pub fn remove(&mut self, row: u64, handle: u64) -> Result<()> {
        match self.entries.binary_search_by_key(&row, |&(r, _)| r) {
            Ok(idx) => {
                if self.entries[idx].1 != handle {
                    return err_at!(Locked, msg: "row {} held by another handle", row)?;
                }
                self.entries.remove(idx);
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    pub fn holder(&self, row: u64) -> Option<u64> {
        self.entries
            .binary_search_by_key(&row, |&(r, _)| r)
            .ok()
            .map(|idx| self.entries[idx].1)
    }

    /// Rows currently held by `handle`, released on commit/rollback
    /// (spec.md §4.7: "Commit or rollback releases all row locks held by
    /// this handle except file-wide locks").
    pub fn rows_of(&self, handle: u64) -> Vec<u64> {
        self.entries.iter().filter(|&&(_, h)| h == handle).map(|&(r, _)| r).collect()
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod lock_test;
