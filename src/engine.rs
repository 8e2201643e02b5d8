//! The multi-table handle registry (spec.md §4 "Handle API" scoped to a
//! process): the reference library hands callers a small integer "isam
//! file number" for every `isbuild`/`isopen` and expects every other call
//! to carry that number back in. `Engine` is that registry, typed instead
//! of `errno`-style: it owns every open [`Table`] behind a `u64` handle
//! and dispatches each operation to the table that owns it.

use std::collections::HashMap;
use std::path::Path;

use crate::config::{Config, Stats};
use crate::keydesc::KeyDescriptor;
use crate::table::Table;
use crate::types::{OpenMode, ReadMode, SearchMode};
use crate::{Error, Result};

/// Owns every table this process has open, addressed by an opaque handle
/// returned from `build`/`open`.
#[derive(Default)]
pub struct Engine {
    tables: HashMap<u64, Table>,
    next_handle: u64,
}

impl Engine {
    pub fn new() -> Engine {
        Engine {
            tables: HashMap::new(),
            next_handle: 1,
        }
    }

    fn table_mut(&mut self, handle: u64) -> Result<&mut Table> {
        self.tables.get_mut(&handle).ok_or_else(|| Error::NotOpen(format!("no table open under handle {}", handle)))
    }

    fn insert(&mut self, table: Table) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.tables.insert(handle, table);
        handle
    }

    /// Build a new table and register it, returning its handle.
    pub fn build(&mut self, path: impl AsRef<Path>, min_row_length: u32, max_row_length: u32, primary_key: KeyDescriptor, open_mode: OpenMode) -> Result<u64> {
        let table = Table::build(path, min_row_length, max_row_length, primary_key, open_mode)?;
        Ok(self.insert(table))
    }

    /// Open an existing table and register it, returning its handle.
    pub fn open(&mut self, path: impl AsRef<Path>, open_mode: OpenMode) -> Result<u64> {
        let table = Table::open(path, open_mode)?;
        Ok(self.insert(table))
    }

    /// Same as [`Engine::build`], but sourced from a [`Config`] (spec.md
    /// §2 ambient "Configuration").
    pub fn build_with_config(&mut self, config: &Config, min_row_length: u32, max_row_length: u32, primary_key: KeyDescriptor) -> Result<u64> {
        let table = Table::build_with_config(config, min_row_length, max_row_length, primary_key)?;
        Ok(self.insert(table))
    }

    /// Same as [`Engine::open`], but sourced from a [`Config`].
    pub fn open_with_config(&mut self, config: &Config) -> Result<u64> {
        let table = Table::open_with_config(config)?;
        Ok(self.insert(table))
    }

    /// Snapshot a table's runtime counters (see [`Table::stats`]).
    pub fn stats(&self, handle: u64) -> Result<Stats> {
        self.tables.get(&handle).map(Table::stats).ok_or_else(|| Error::NotOpen(format!("no table open under handle {}", handle)))
    }

    /// Close and deregister a handle.
    pub fn close(&mut self, handle: u64) -> Result<()> {
        let table = self
            .tables
            .remove(&handle)
            .ok_or_else(|| Error::NotOpen(format!("no table open under handle {}", handle)))?;
        table.close()
    }

    /// Delete a table's files. Does not require the table to be open.
    pub fn erase(&mut self, path: impl AsRef<Path>) -> Result<()> {
        Table::erase(path)
    }

    /// Rename a table's files. Does not require the table to be open.
    pub fn rename(&mut self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<()> {
        Table::rename(old, new)
    }

    /// Close every registered handle, collecting the first error (if any)
    /// while still attempting to close the rest (spec.md §4.2 "Close" at
    /// process-exit granularity).
    pub fn close_all(&mut self) -> Result<()> {
        let handles: Vec<u64> = self.tables.keys().copied().collect();
        let mut first_err = None;
        for handle in handles {
            if let Err(e) = self.close(handle) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn add_index(&mut self, handle: u64, desc: KeyDescriptor) -> Result<usize> {
        self.table_mut(handle)?.add_index(desc)
    }

    pub fn del_index(&mut self, handle: u64, index: usize) -> Result<()> {
        self.table_mut(handle)?.del_index(index)
    }

    pub fn start(&mut self, handle: u64, index: usize, mode: SearchMode, key_template: Option<&[u8]>) -> Result<()> {
        self.table_mut(handle)?.start(index, mode, key_template)
    }

    pub fn read(&mut self, handle: u64, mode: SearchMode, key_template: Option<&[u8]>, read_mode: ReadMode) -> Result<Vec<u8>> {
        self.table_mut(handle)?.read(mode, key_template, read_mode)
    }

    pub fn write(&mut self, handle: u64, image: &[u8]) -> Result<u64> {
        self.table_mut(handle)?.write(image)
    }

    pub fn rewrite_current(&mut self, handle: u64, image: &[u8]) -> Result<()> {
        self.table_mut(handle)?.rewrite_current(image)
    }

    pub fn rewrite_by_row(&mut self, handle: u64, row_number: u64, image: &[u8]) -> Result<()> {
        self.table_mut(handle)?.rewrite_by_row(row_number, image)
    }

    pub fn delete(&mut self, handle: u64, key_template: &[u8]) -> Result<()> {
        self.table_mut(handle)?.delete(key_template)
    }

    pub fn delete_current(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.delete_current()
    }

    pub fn delete_by_row(&mut self, handle: u64, row_number: u64) -> Result<()> {
        self.table_mut(handle)?.delete_by_row(row_number)
    }

    pub fn lock(&mut self, handle: u64, wait: bool) -> Result<()> {
        self.table_mut(handle)?.lock(wait)
    }

    pub fn unlock(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.unlock()
    }

    pub fn release_row(&mut self, handle: u64, row_number: u64) -> Result<()> {
        self.table_mut(handle)?.release_row(row_number)
    }

    pub fn release_current(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.release_current()
    }

    pub fn release(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.release()
    }

    pub fn set_unique(&mut self, handle: u64, seed: u64) -> Result<()> {
        self.table_mut(handle)?.set_unique(seed)
    }

    pub fn unique_id(&mut self, handle: u64) -> Result<u64> {
        self.table_mut(handle)?.unique_id()
    }

    pub fn begin(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.begin()
    }

    pub fn commit(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.commit()
    }

    pub fn rollback(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.rollback()
    }

    pub fn recover(&mut self, handle: u64) -> Result<()> {
        self.table_mut(handle)?.recover()
    }

    pub fn cluster(&mut self, handle: u64, index: usize) -> Result<()> {
        self.table_mut(handle)?.cluster(index)
    }

    pub fn set_audit_trail(&mut self, handle: u64, enabled: bool) -> Result<()> {
        self.table_mut(handle)?.set_audit_trail(enabled)
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
