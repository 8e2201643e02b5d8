//! `isam`: an embedded indexed-sequential access method storage engine.
//!
//! A table is a fixed/variable-length row store (spec.md §4.6) addressed
//! by up to [`keydesc::MAX_INDEXES`] B+tree indexes (spec.md §4.4), backed
//! by a single index file (dictionary + key descriptors + B+tree nodes +
//! freelists, spec.md §3/§4.3) and a single data file (fixed rows plus an
//! optional variable-length tail store, spec.md §4.5/§4.6), with
//! byte-range advisory locking (spec.md §4.7) and an optional
//! write-ahead log for crash recovery (spec.md §4.8).
//!
//! [`error::Error`]/[`error::Result`]/[`err_at!`] are exported at the
//! crate root since every module uses them.

mod error;

pub mod util;

pub mod alloc;
pub mod btree;
pub mod cache;
pub mod config;
pub mod dict;
pub mod engine;
pub mod keydesc;
pub mod lock;
pub mod row;
pub mod table;
pub mod tailstore;
pub mod trailer;
pub mod types;
pub mod wal;

pub use config::{Config, Stats};
pub use engine::Engine;
pub use error::{Error, Result};
pub use table::Table;
pub use types::{OpenMode, ReadMode, SearchMode};
