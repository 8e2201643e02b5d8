//! Block I/O & cache (spec.md §4.1).
//!
//! Fixed-size node read/write with a small LRU write-back cache. Block 1
//! (the dictionary) always bypasses the cache — "another process may have
//! changed it" — so the dictionary is read/written straight through to the
//! backing file by the caller (see `table.rs`'s `enter`/`exit`), never via
//! this cache.

use std::{
    collections::HashMap,
    fs,
    io::{Read, Seek, SeekFrom, Write},
};

use crate::{Error, Result};

/// Default cache size in node buffers (spec.md §4.1).
pub const DEFAULT_CACHE_SIZE: usize = 16;

struct Entry {
    data: Vec<u8>,
    dirty: bool,
}

/// LRU cache of fixed-size node buffers for one open index file.
pub struct BlockCache {
    node_size: usize,
    capacity: usize,
    entries: HashMap<u64, Entry>,
    /// Most-recently-used at the back.
    order: Vec<u64>,
}

impl BlockCache {
    pub fn new(node_size: usize, capacity: usize) -> BlockCache {
        BlockCache {
            node_size,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn touch(&mut self, node_num: u64) {
        if let Some(pos) = self.order.iter().position(|&n| n == node_num) {
            self.order.remove(pos);
        }
        self.order.push(node_num);
    }

    /// Read a node, consulting the cache first. `node_num` is the absolute
    /// block number (block 1 is the dictionary and must never be routed
    /// through here).
    pub fn read(&mut self, fd: &mut fs::File, node_num: u64) -> Result<Vec<u8>> {
        debug_assert!(node_num != 1, "dictionary block must bypass the cache");
        if let Some(entry) = self.entries.get(&node_num) {
            self.touch(node_num);
            return Ok(entry.data.clone());
        }

        let data = read_block(fd, node_num, self.node_size)?;
        self.insert(node_num, data.clone(), false)?;
        Ok(data)
    }

    /// Write a node into the cache (write-back; not flushed to disk until
    /// `evict`/`flush_all`).
    pub fn write(&mut self, fd: &mut fs::File, node_num: u64, data: Vec<u8>) -> Result<()> {
        debug_assert!(node_num != 1, "dictionary block must bypass the cache");
        debug_assert_eq!(data.len(), self.node_size);
        self.insert(node_num, data, true)?;
        self.flush_if_over_capacity(fd)
    }

    fn insert(&mut self, node_num: u64, data: Vec<u8>, dirty: bool) -> Result<()> {
        match self.entries.get_mut(&node_num) {
            Some(entry) => {
                entry.data = data;
                entry.dirty = entry.dirty || dirty;
            }
            None => {
                self.entries.insert(node_num, Entry { data, dirty });
            }
        }
        self.touch(node_num);
        Ok(())
    }

    fn flush_if_over_capacity(&mut self, fd: &mut fs::File) -> Result<()> {
        while self.order.len() > self.capacity {
            let victim = self.order.remove(0);
            self.evict(fd, victim)?;
        }
        Ok(())
    }

    fn evict(&mut self, fd: &mut fs::File, node_num: u64) -> Result<()> {
        if let Some(entry) = self.entries.remove(&node_num) {
            if entry.dirty {
                write_block(fd, node_num, &entry.data, self.node_size)?;
            }
        }
        Ok(())
    }

    /// Write-through every dirty entry for this handle (called on `exit`
    /// and `close`); cache contents are retained.
    pub fn flush_all(&mut self, fd: &mut fs::File) -> Result<()> {
        for (node_num, entry) in self.entries.iter_mut() {
            if entry.dirty {
                write_block(fd, *node_num, &entry.data, self.node_size)?;
                entry.dirty = false;
            }
        }
        Ok(())
    }

    /// Drop all cached entries without flushing — used when another
    /// participant's transaction number advance is detected (spec.md
    /// §4.1, §4.7).
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

fn read_block(fd: &mut fs::File, node_num: u64, node_size: usize) -> Result<Vec<u8>> {
    let off = node_num * (node_size as u64);
    let mut buf = vec![0u8; node_size];
    err_at!(IOError, fd.seek(SeekFrom::Start(off)), "seek block {}", node_num)?;
    match err_at!(IOError, fd.read(&mut buf), "read block {}", node_num)? {
        n if n == node_size => Ok(buf),
        n => err_at!(BadFile, msg: "short read of block {}: {}/{}", node_num, n, node_size),
    }
}

fn write_block(fd: &mut fs::File, node_num: u64, data: &[u8], node_size: usize) -> Result<()> {
    let off = node_num * (node_size as u64);
    err_at!(IOError, fd.seek(SeekFrom::Start(off)), "seek block {}", node_num)?;
    match err_at!(IOError, fd.write(data), "write block {}", node_num)? {
        n if n == node_size => Ok(()),
        n => err_at!(BadFile, msg: "short write of block {}: {}/{}", node_num, n, node_size),
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
