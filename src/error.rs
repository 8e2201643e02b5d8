//! Error taxonomy for the `isam` engine.
//!
//! Every fallible call site uses the [`err_at!`] macro, which tags the
//! resulting error with the `file:line` where it was raised. This mirrors
//! the teacher crate's `err_at!`/`Error`/`Result` idiom: a single closed
//! enum instead of out-parameters, with a `Fatal` catch-all for invariant
//! violations that should never happen in a correct engine.

use std::{fmt, io, result};

/// Result alias used throughout the crate.
pub type Result<T> = result::Result<T, Error>;

/// Closed error taxonomy. Variant names read like the condition that
/// produced them; `to_code()` maps each to the legacy numeric taxonomy
/// (100..171) from the reference implementation, for any ABI shim built
/// on top of this crate later.
#[derive(Debug)]
pub enum Error {
    /// Duplicate key inserted into a `NODUPS` index.
    Dupl(String),
    /// Handle used without a prior successful `open`/`build`.
    NotOpen(String),
    /// Bad argument to a public API call.
    BadArg(String),
    /// Malformed key descriptor.
    BadKey(String),
    /// Too many tables open in this `Engine`.
    TooMany(String),
    /// On-disk format is corrupt or internally inconsistent.
    BadFile(String),
    /// Operation requires `EXCLLOCK` and the handle does not hold it.
    NotExcl(String),
    /// Row or range is locked by another handle.
    Locked(String),
    /// Key already exists in a unique index (`add_index` collision).
    KeyExists(String),
    /// Operation not valid against the primary index.
    PrimKey(String),
    /// Cursor walked past the first/last entry.
    EndFile(String),
    /// No record found for the requested key/position.
    NoRec(String),
    /// No current row is positioned on the cursor.
    NoCurr(String),
    /// Whole-file or whole-table lock held by another handle.
    FLocked(String),
    /// Table/file name exceeds the platform limit.
    FName(String),
    /// Allocation failure in this process.
    BadMem(String),
    /// Failed to read a transaction-log record.
    LogRead(String),
    /// Transaction-log record failed its framing/checksum check.
    BadLog(String),
    /// Failed to open the transaction-log file.
    LogOpen(String),
    /// Failed to write a transaction-log record.
    LogWrit(String),
    /// No transaction is active on this handle.
    NoTrans(String),
    /// `commit`/`rollback` called without a matching `begin`.
    NoBegin(String),
    /// Table has no primary index.
    NoPrim(String),
    /// Table opened with `ISNOLOG`/no log attached.
    NoLog(String),
    /// Backing filesystem/volume is out of space.
    NoFree(String),
    /// Row image does not fit `min_row_length..max_row_length`.
    RowSize(String),
    /// Audit-trail operation (unimplemented, see Open Questions).
    Audit(String),
    /// Row-lock table exhausted.
    NoLocks(String),
    /// Deadlock would result from a blocking lock wait (never raised: see
    /// `§5 Concurrency` — the engine does not perform detection, kept for
    /// numeric-taxonomy completeness).
    Deadlock(String),
    /// Row lock requested in automatic-lock mode.
    NoManual(String),
    /// Blocking lock wait interrupted by a signal and not retried.
    Interrupt(String),
    /// `NODESIZE`/locking mode mismatch against an on-disk file.
    BadFormat(String),
    /// Declared-but-unimplemented operation (`iscluster`, audit trail).
    NotImplemented(String),
    /// Underlying I/O failure.
    IOError(String),
    /// Invariant violation: a bug in the engine, not a user error.
    Fatal(String),
}

impl Error {
    /// Map to the legacy C-ISAM/VBISAM numeric error taxonomy.
    pub fn to_code(&self) -> i32 {
        match self {
            Error::Dupl(_) => 100,
            Error::NotOpen(_) => 101,
            Error::BadArg(_) => 102,
            Error::BadKey(_) => 103,
            Error::TooMany(_) => 104,
            Error::BadFile(_) => 105,
            Error::NotExcl(_) => 106,
            Error::Locked(_) => 107,
            Error::KeyExists(_) => 108,
            Error::PrimKey(_) => 109,
            Error::EndFile(_) => 110,
            Error::NoRec(_) => 111,
            Error::NoCurr(_) => 112,
            Error::FLocked(_) => 113,
            Error::FName(_) => 114,
            Error::BadMem(_) => 116,
            Error::LogRead(_) => 118,
            Error::BadLog(_) => 119,
            Error::LogOpen(_) => 120,
            Error::LogWrit(_) => 121,
            Error::NoTrans(_) => 122,
            Error::NoBegin(_) => 124,
            Error::NoPrim(_) => 127,
            Error::NoLog(_) => 128,
            Error::NoFree(_) => 131,
            Error::RowSize(_) => 132,
            Error::Audit(_) => 133,
            Error::NoLocks(_) => 134,
            Error::Deadlock(_) => 143,
            Error::NoManual(_) => 153,
            Error::Interrupt(_) => 157,
            Error::BadFormat(_) => 171,
            // Not part of the legacy taxonomy; map to the closest bucket.
            Error::NotImplemented(_) => 171,
            Error::IOError(_) => 105,
            Error::Fatal(_) => 105,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Dupl(s) => write!(f, "Dupl: {}", s),
            Error::NotOpen(s) => write!(f, "NotOpen: {}", s),
            Error::BadArg(s) => write!(f, "BadArg: {}", s),
            Error::BadKey(s) => write!(f, "BadKey: {}", s),
            Error::TooMany(s) => write!(f, "TooMany: {}", s),
            Error::BadFile(s) => write!(f, "BadFile: {}", s),
            Error::NotExcl(s) => write!(f, "NotExcl: {}", s),
            Error::Locked(s) => write!(f, "Locked: {}", s),
            Error::KeyExists(s) => write!(f, "KeyExists: {}", s),
            Error::PrimKey(s) => write!(f, "PrimKey: {}", s),
            Error::EndFile(s) => write!(f, "EndFile: {}", s),
            Error::NoRec(s) => write!(f, "NoRec: {}", s),
            Error::NoCurr(s) => write!(f, "NoCurr: {}", s),
            Error::FLocked(s) => write!(f, "FLocked: {}", s),
            Error::FName(s) => write!(f, "FName: {}", s),
            Error::BadMem(s) => write!(f, "BadMem: {}", s),
            Error::LogRead(s) => write!(f, "LogRead: {}", s),
            Error::BadLog(s) => write!(f, "BadLog: {}", s),
            Error::LogOpen(s) => write!(f, "LogOpen: {}", s),
            Error::LogWrit(s) => write!(f, "LogWrit: {}", s),
            Error::NoTrans(s) => write!(f, "NoTrans: {}", s),
            Error::NoBegin(s) => write!(f, "NoBegin: {}", s),
            Error::NoPrim(s) => write!(f, "NoPrim: {}", s),
            Error::NoLog(s) => write!(f, "NoLog: {}", s),
            Error::NoFree(s) => write!(f, "NoFree: {}", s),
            Error::RowSize(s) => write!(f, "RowSize: {}", s),
            Error::Audit(s) => write!(f, "Audit: {}", s),
            Error::NoLocks(s) => write!(f, "NoLocks: {}", s),
            Error::Deadlock(s) => write!(f, "Deadlock: {}", s),
            Error::NoManual(s) => write!(f, "NoManual: {}", s),
            Error::Interrupt(s) => write!(f, "Interrupt: {}", s),
            Error::BadFormat(s) => write!(f, "BadFormat: {}", s),
            Error::NotImplemented(s) => write!(f, "NotImplemented: {}", s),
            Error::IOError(s) => write!(f, "IOError: {}", s),
            Error::Fatal(s) => write!(f, "Fatal: {}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IOError(err.to_string())
    }
}

/// Tag a `Result`/value with file:line context and convert it into
/// `crate::Result`.
///
/// ```ignore
/// err_at!(IOError, fs::metadata(loc))?;
/// err_at!(Fatal, msg: "node {} missing trailer", node_num)?;
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let msg = format!($($arg),+);
        Err::<_, $crate::Error>($crate::Error::$v(format!("{}:{} {}", file!(), line!(), msg)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let msg = format!("{}:{} {}", file!(), line!(), err);
                Err::<_, $crate::Error>($crate::Error::$v(msg))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let msg = format!("{}:{} {} ({})", file!(), line!(), format!($($arg),+), err);
                Err::<_, $crate::Error>($crate::Error::$v(msg))
            }
        }
    }};
}
