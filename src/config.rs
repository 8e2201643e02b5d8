//! Table configuration and a runtime statistics snapshot, modeled on
//! `rdms`'s `robt::config::Config`/`Stats` builder-plus-snapshot split:
//! `Config` is for building/opening a table, `Stats` is a read-only
//! point-in-time view handed back afterwards.

use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::types::OpenMode;

/// Default node/block size for freshly built tables (spec.md §3, 64-bit
/// mode is the only mode this crate builds) — matches
/// `Mode::Bits64.default_node_size()`.
pub const DEFAULT_NODE_SIZE: usize = 4096;

/// Configuration for building or opening a table. `dir`/`name` compose the
/// base path the same way `robt::config::Config::new` composes an index
/// location; the `set_*` methods are chainable the same way.
#[derive(Clone, Debug)]
pub struct Config {
    pub dir: PathBuf,
    pub name: String,
    /// Node size for a freshly built table's index file. Ignored by `open`,
    /// which always takes the node size recorded in the on-disk dictionary.
    ///
    /// Default: [DEFAULT_NODE_SIZE]
    pub node_size: usize,
    /// Block cache capacity, in nodes.
    ///
    /// Default: [`crate::cache::DEFAULT_CACHE_SIZE`]
    pub cache_capacity: usize,
    /// Block on a conflicting row lock instead of failing immediately when
    /// no explicit `ReadMode` is given to `read`/`lock`.
    ///
    /// Default: false
    pub lock_wait: bool,
    /// Open without attaching a transaction log (`OpenMode::no_log`).
    ///
    /// Default: false
    pub no_log: bool,
}

impl Config {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Config {
        Config {
            dir: dir.as_ref().to_path_buf(),
            name: name.to_string(),
            node_size: DEFAULT_NODE_SIZE,
            cache_capacity: DEFAULT_CACHE_SIZE,
            lock_wait: false,
            no_log: false,
        }
    }

    pub fn set_node_size(&mut self, node_size: usize) -> &mut Self {
        self.node_size = node_size;
        self
    }

    pub fn set_cache_capacity(&mut self, capacity: usize) -> &mut Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn set_lock_wait(&mut self, wait: bool) -> &mut Self {
        self.lock_wait = wait;
        self
    }

    pub fn set_no_log(&mut self, no_log: bool) -> &mut Self {
        self.no_log = no_log;
        self
    }

    /// The base path the table's `.idx`/`.dat`/`.log` files are derived from.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn open_mode(&self) -> OpenMode {
        let mode = OpenMode::read_write();
        if self.no_log {
            mode.no_log()
        } else {
            mode
        }
    }
}

/// Point-in-time snapshot of a table's runtime counters, modeled on
/// `robt::config::Stats`. Returned by [`crate::table::Table::stats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub name: String,
    pub node_size: usize,
    pub num_indexes: usize,
    pub min_row_length: u32,
    pub max_row_length: u32,
    pub data_row_count: u64,
    pub index_node_count: u64,
    pub txn_number: u64,
    pub unique_id: u64,
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
