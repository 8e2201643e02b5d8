//! Common utility functions shared across the engine.
//!
//! Mirrors the teacher crate's `util` module: small file helpers and
//! `read_file!`/`write_file!` macros that check for short reads/writes
//! instead of silently tolerating them (spec.md §4.1: "short counts or
//! seek errors return a hard I/O error").

pub mod codec;

use std::{fs, path::Path};

use crate::{Error, Result};

/// Open (or create) a file for synchronous random-access read+write.
pub fn open_rw(path: &Path, create: bool) -> Result<fs::File> {
    let mut opts = fs::OpenOptions::new();
    opts.read(true).write(true);
    if create {
        opts.create(true);
    }
    err_at!(IOError, opts.open(path), "open_rw {:?}", path)
}

/// Create a new file, failing if it already exists (used by `build()`,
/// which must return `EEXIST` semantics via `Error::BadArg`/`Error::BadFile`
/// at the call site).
pub fn create_new(path: &Path) -> Result<fs::File> {
    let mut opts = fs::OpenOptions::new();
    opts.read(true).write(true).create_new(true);
    err_at!(IOError, opts.open(path), "create_new {:?}", path)
}

/// Open an existing file read-only.
pub fn open_r(path: &Path) -> Result<fs::File> {
    err_at!(
        IOError,
        fs::OpenOptions::new().read(true).open(path),
        "open_r {:?}",
        path
    )
}

/// Read exactly `n` bytes at the given seek position. A short read is a
/// hard error (`Error::BadFile`), matching spec.md §4.1.
#[macro_export]
macro_rules! read_file {
    ($fd:expr, $seek:expr, $n:expr, $msg:expr) => {{
        use std::io::{Read, Seek};
        match $fd.seek($seek) {
            Ok(_) => {
                let mut buf = vec![0u8; $n];
                match $fd.read(&mut buf) {
                    Ok(n) if n == buf.len() => Ok(buf),
                    Ok(n) => err_at!(
                        BadFile,
                        msg: "{}: short read {}/{} at {:?}", $msg, n, buf.len(), $seek
                    ),
                    Err(err) => err_at!(IOError, Err(err)),
                }
            }
            Err(err) => err_at!(IOError, Err(err)),
        }
    }};
}

/// Write a buffer at the given seek position, failing hard on a short
/// write.
#[macro_export]
macro_rules! write_file {
    ($fd:expr, $seek:expr, $buf:expr, $msg:expr) => {{
        use std::io::{Seek, Write};
        match $fd.seek($seek) {
            Ok(_) => match $fd.write($buf) {
                Ok(n) if n == $buf.len() => Ok(n),
                Ok(n) => err_at!(
                    BadFile,
                    msg: "{}: short write {}/{} at {:?}", $msg, n, $buf.len(), $seek
                ),
                Err(err) => err_at!(IOError, Err(err)),
            },
            Err(err) => err_at!(IOError, Err(err)),
        }
    }};
}

pub fn sync_all(fd: &fs::File) -> Result<()> {
    err_at!(IOError, fd.sync_all(), "fsync")
}
