//! Small public types shared across the API surface (spec.md §4 "Handle
//! API"): open-mode flags, read-mode flags, and the search-mode enum
//! re-exported from `btree::search` for callers who only need the public
//! surface and not the tree internals.

pub use crate::btree::search::SearchMode;

/// Flags passed to [`crate::table::Table::open`]/`build` (spec.md §4.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OpenMode {
    pub read_only: bool,
    /// Hold the whole-file lock for the duration of the handle (`EXCLLOCK`).
    pub exclusive: bool,
    /// Open with no transaction log attached (`ISNOLOG`).
    pub no_log: bool,
}

impl OpenMode {
    pub fn read_write() -> OpenMode {
        OpenMode {
            read_only: false,
            exclusive: false,
            no_log: false,
        }
    }

    pub fn read_only() -> OpenMode {
        OpenMode {
            read_only: true,
            exclusive: false,
            no_log: false,
        }
    }

    pub fn exclusive(mut self) -> OpenMode {
        self.exclusive = true;
        self
    }

    pub fn no_log(mut self) -> OpenMode {
        self.no_log = true;
        self
    }
}

/// Flags controlling how a read positions and locks a row (spec.md §4.7
/// "Read-mode flags").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadMode {
    /// Take a row lock on the located row (`LOCKED`).
    pub lock: bool,
    /// Don't wait if the row is already locked; fail with `Error::Locked`
    /// instead (`ISSKIPLOCK`'s negation is the default blocking wait).
    pub skip_lock: bool,
    /// Block until the lock is available instead of failing immediately
    /// (`ISWAIT`).
    pub wait: bool,
}

impl ReadMode {
    pub fn none() -> ReadMode {
        ReadMode {
            lock: false,
            skip_lock: false,
            wait: false,
        }
    }

    pub fn locked() -> ReadMode {
        ReadMode {
            lock: true,
            skip_lock: false,
            wait: false,
        }
    }

    pub fn locked_wait() -> ReadMode {
        ReadMode {
            lock: true,
            skip_lock: false,
            wait: true,
        }
    }

    pub fn locked_skip() -> ReadMode {
        ReadMode {
            lock: true,
            skip_lock: true,
            wait: false,
        }
    }
}
