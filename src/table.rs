//! The handle API (spec.md §4 "Handle API", §2 "enter/exit").
//!
//! A `Table` owns one index file and one data file (plus, unless opened
//! with `ISNOLOG`, a write-ahead log) and exposes the full read/write/
//! locate/transaction surface. Every public operation funnels through
//! [`Table::enter`], which takes the header-guard byte-range lock, always
//! re-reads the dictionary block (bypassing `cache::BlockCache`, which
//! never sees block 1), invalidates the cache/mirror if another
//! participant's `txn_number` has moved, and — for modifying operations —
//! bumps `txn_number` and writes the dictionary back out before releasing
//! the guard.

use std::cmp::Ordering;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::alloc::{self, NodeStore};
use crate::btree::{self, Entry, InsertOutcome, NodeImage};
use crate::cache::BlockCache;
use crate::dict::{Dictionary, Mode};
use crate::keydesc::{self, KeyDescNode, KeyDescriptor};
use crate::row::{self, RowIo};
use crate::tailstore::{self, TailRef};
use crate::types::{OpenMode, ReadMode, SearchMode};
use crate::wal::{self, Recover, Transaction, Undo, WalFile};
use crate::{Error, Result};

/// One entry in the dictionary's key-descriptor list (spec.md §3 "Key
/// descriptor"), kept in primary-first order matching the on-disk list:
/// `add_index` always appends to the tail of the chain rather than
/// prepending, so `indexes[0]` is always the primary both in memory and
/// on disk.
#[derive(Clone)]
struct IndexSlot {
    node_num: u64,
    next: u64,
    root: u64,
    desc: KeyDescriptor,
}

/// The cursor's current position: which index it was located through,
/// the key/dup pair found there, and the row it points at. Re-deriving
/// `NEXT`/`PREV`/`CURR` always goes back through the index rather than
/// trusting `row` alone, since a secondary index's ordering is what
/// defines "current" (spec.md §4.7 "Cursor").
#[derive(Clone)]
struct Position {
    index: usize,
    key: Vec<u8>,
    dup: u64,
    row: u64,
}

/// A split-borrow view of the index file routed through the handle's
/// cache. `NodeStore` needs `&mut self`; wrapping disjoint `&mut` field
/// references (rather than handing out `&mut Table` and implementing the
/// trait on `Table` itself) is what lets callers hold a `Store` alongside
/// a direct borrow of `self.dict` or `self.mirror` at the same time.
struct Store<'a> {
    cache: &'a mut BlockCache,
    file: &'a mut fs::File,
    node_size: usize,
}

fn store<'a>(cache: &'a mut BlockCache, file: &'a mut fs::File, node_size: usize) -> Store<'a> {
    Store { cache, file, node_size }
}

impl<'a> NodeStore for Store<'a> {
    fn node_size(&self) -> usize {
        self.node_size
    }
    fn read_node(&mut self, node_num: u64) -> Result<Vec<u8>> {
        self.cache.read(self.file, node_num)
    }
    fn write_node(&mut self, node_num: u64, data: Vec<u8>) -> Result<()> {
        self.cache.write(self.file, node_num, data)
    }
}

/// Raw row-slot access over the data file, bypassing the block cache
/// entirely (spec.md §4.1 caches index blocks only, not data rows).
struct DataIo<'a> {
    file: &'a mut fs::File,
    stride: usize,
}

fn data_io<'a>(file: &'a mut fs::File, stride: usize) -> DataIo<'a> {
    DataIo { file, stride }
}

impl<'a> RowIo for DataIo<'a> {
    fn stride(&self) -> usize {
        self.stride
    }
    fn read_slot(&mut self, row_number: u64) -> Result<Vec<u8>> {
        let off = row::offset_of(row_number, self.stride);
        err_at!(IOError, self.file.seek(SeekFrom::Start(off)), "seek row {}", row_number)?;
        let mut buf = vec![0u8; self.stride];
        let n = err_at!(IOError, self.file.read(&mut buf), "read row {}", row_number)?;
        if n < self.stride {
            // row not yet extended on disk (just allocated, about to be
            // written); treat as an all-zero tombstoned slot.
            return Ok(vec![0u8; self.stride]);
        }
        Ok(buf)
    }
    fn write_slot(&mut self, row_number: u64, data: Vec<u8>) -> Result<()> {
        let off = row::offset_of(row_number, self.stride);
        err_at!(IOError, self.file.seek(SeekFrom::Start(off)), "seek row {}", row_number)?;
        match err_at!(IOError, self.file.write(&data), "write row {}", row_number)? {
            n if n == data.len() => Ok(()),
            n => err_at!(BadFile, msg: "short row write {}/{}", n, data.len()),
        }
    }
}

fn row_stride(dict: &Dictionary, mode: Mode) -> usize {
    row::stride(dict.min_row_length, mode, dict.is_variable_length())
}

fn with_ext(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

fn persist_index_slot(cache: &mut BlockCache, file: &mut fs::File, node_size: usize, mode: Mode, slot: &IndexSlot) -> Result<()> {
    let kd = KeyDescNode {
        next: slot.next,
        root: slot.root,
        desc: slot.desc.clone(),
    };
    let mut buf = vec![0u8; node_size];
    kd.encode_into(&mut buf, mode)?;
    cache.write(file, slot.node_num, buf)
}

fn read_dict(file: &mut fs::File, node_size: usize) -> Result<Vec<u8>> {
    let off = node_size as u64; // block 1
    err_at!(IOError, file.seek(SeekFrom::Start(off)), "seek dictionary block")?;
    let mut buf = vec![0u8; node_size];
    match err_at!(IOError, file.read(&mut buf), "read dictionary block")? {
        n if n == node_size => Ok(buf),
        n => err_at!(BadFile, msg: "short dictionary read: {}/{}", n, node_size),
    }
}

fn write_dict(file: &mut fs::File, node_size: usize, buf: &[u8]) -> Result<()> {
    let off = node_size as u64;
    err_at!(IOError, file.seek(SeekFrom::Start(off)), "seek dictionary block")?;
    match err_at!(IOError, file.write(buf), "write dictionary block")? {
        n if n == node_size => Ok(()),
        n => err_at!(BadFile, msg: "short dictionary write: {}/{}", n, node_size),
    }
}

/// Find the first real entry in `key`'s duplicate run whose `ptr` is
/// `row_number`, walking forward from `Gteq(key, 0)`. Used to locate the
/// exact `(key, dup)` pair a secondary index entry for a given row was
/// inserted under, since the caller only ever has the row, not the dup
/// ordinal it landed on.
fn find_dup_for_row<S: NodeStore>(
    mirror: &mut btree::Mirror,
    store: &mut S,
    desc: &KeyDescriptor,
    mode: Mode,
    root: u64,
    key: &[u8],
    row_number: u64,
) -> Result<Option<u64>> {
    let (outcome, cursor) = btree::search_tree(mirror, store, desc, mode, root, SearchMode::Gteq, key, 0)?;
    if outcome == btree::Outcome::EmptyTree {
        return Ok(None);
    }
    let mut cursor = match cursor {
        Some(c) => c,
        None => return Ok(None),
    };
    loop {
        let (slot, high_slot) = {
            let node = mirror.get(cursor.leaf);
            (cursor.slot, node.high_slot())
        };
        if slot >= high_slot {
            return Ok(None);
        }
        let (entry_key, entry_dup, entry_ptr) = {
            let node = mirror.get(cursor.leaf);
            let e = &node.entries[slot];
            (e.key.clone(), e.dup, e.ptr)
        };
        if desc.compare_keys(&entry_key, key)? != Ordering::Equal {
            return Ok(None);
        }
        if entry_ptr == row_number {
            return Ok(Some(entry_dup));
        }
        match btree::advance(mirror, store, desc, mode, root, cursor, true)? {
            Some(c) => cursor = c,
            None => return Ok(None),
        }
    }
}

/// The duplicate ordinal one past the highest already used by `key`'s
/// run, or 0 if `key` has no entries yet.
fn next_dup<S: NodeStore>(
    mirror: &mut btree::Mirror,
    store: &mut S,
    desc: &KeyDescriptor,
    mode: Mode,
    root: u64,
    key: &[u8],
) -> Result<u64> {
    let (outcome, cursor) = btree::search_tree(mirror, store, desc, mode, root, SearchMode::Great, key, 0)?;
    if outcome == btree::Outcome::EmptyTree {
        return Ok(0);
    }
    let cursor = match cursor {
        Some(c) => c,
        None => return Ok(0),
    };
    let stepped = btree::advance(mirror, store, desc, mode, root, cursor, false)?;
    let cursor = match stepped {
        Some(c) => c,
        None => return Ok(0),
    };
    let (slot, high_slot) = {
        let node = mirror.get(cursor.leaf);
        (cursor.slot, node.high_slot())
    };
    if slot >= high_slot {
        return Ok(0);
    }
    let node = mirror.get(cursor.leaf);
    let entry = &node.entries[slot];
    if desc.compare_keys(&entry.key, key)? == Ordering::Equal {
        Ok(entry.dup + 1)
    } else {
        Ok(0)
    }
}

/// Free every node of a B+tree, leaves first (`del_index`, spec.md §4.4
/// "Deletion" extended to whole-tree teardown).
fn free_tree<S: NodeStore>(mirror: &mut btree::Mirror, store: &mut S, dict: &mut Dictionary, desc: &KeyDescriptor, mode: Mode, root: u64) -> Result<()> {
    let id = mirror.load(store, desc, mode, root)?;
    let (level, children): (u8, Vec<u64>) = {
        let node = mirror.get(id);
        (node.level, node.entries.iter().map(|e| e.ptr).collect())
    };
    if level > 0 {
        for child in children {
            free_tree(mirror, store, dict, desc, mode, child)?;
        }
    }
    mirror.free_node(dict, store, id)
}

/// An open table handle (spec.md §4 "Handle API").
pub struct Table {
    mode: Mode,
    open_mode: OpenMode,
    base: PathBuf,
    index_file: fs::File,
    data_file: fs::File,
    dict: Dictionary,
    cache: BlockCache,
    mirror: btree::Mirror,
    indexes: Vec<IndexSlot>,
    active: usize,
    locks: crate::lock::LockList,
    handle_id: u32,
    current: Option<Position>,
    wal: Option<WalFile>,
    txn: Option<Transaction>,
    seen_txn: u64,
    poisoned: bool,
}

impl Table {
    /// Create a fresh table: index file (dictionary at block 1, the
    /// primary key descriptor at block 2, its empty root at block 3) and
    /// data file, plus a log file unless `open_mode.no_log` (spec.md §4.2
    /// "Build").
    pub fn build(path: impl AsRef<Path>, min_row_length: u32, max_row_length: u32, primary_key: KeyDescriptor, open_mode: OpenMode) -> Result<Table> {
        let mode = Mode::Bits64;
        Table::build_inner(path.as_ref().to_path_buf(), min_row_length, max_row_length, primary_key, open_mode, mode.default_node_size(), crate::cache::DEFAULT_CACHE_SIZE)
    }

    /// Same as [`Table::build`], but the node size and block cache
    /// capacity come from a [`crate::config::Config`] instead of the
    /// built-in defaults (`Config::node_size`/`Config::cache_capacity`).
    /// `config.dir`/`config.name` supply the path; `open_mode` is derived
    /// from `config.no_log` via [`crate::config::Config::open_mode`].
    pub fn build_with_config(config: &crate::config::Config, min_row_length: u32, max_row_length: u32, primary_key: KeyDescriptor) -> Result<Table> {
        Table::build_inner(config.path(), min_row_length, max_row_length, primary_key, config.open_mode(), config.node_size, config.cache_capacity)
    }

    fn build_inner(base: PathBuf, min_row_length: u32, max_row_length: u32, primary_key: KeyDescriptor, open_mode: OpenMode, node_size: usize, cache_capacity: usize) -> Result<Table> {
        let mode = Mode::Bits64;

        let idx_path = with_ext(&base, "idx");
        let dat_path = with_ext(&base, "dat");

        let mut index_file = match fs::OpenOptions::new().read(true).write(true).create_new(true).open(&idx_path) {
            Ok(f) => f,
            Err(e) => return Err(Error::from(e)),
        };
        let mut data_file = match fs::OpenOptions::new().read(true).write(true).create_new(true).open(&dat_path) {
            Ok(f) => f,
            Err(e) => {
                let _ = fs::remove_file(&idx_path);
                return Err(Error::from(e));
            }
        };

        let mut dict = Dictionary::new(mode, min_row_length, max_row_length);
        let mut cache = BlockCache::new(node_size, cache_capacity);

        let keydesc_node_num = alloc::alloc_index_node(&mut dict, &mut store(&mut cache, &mut index_file, node_size))?;
        let root_node_num = alloc::alloc_index_node(&mut dict, &mut store(&mut cache, &mut index_file, node_size))?;

        let kd_node = KeyDescNode {
            next: 0,
            root: root_node_num,
            desc: primary_key.clone(),
        };
        let mut kd_buf = vec![0u8; node_size];
        kd_node.encode_into(&mut kd_buf, mode)?;
        cache.write(&mut index_file, keydesc_node_num, kd_buf)?;

        let root_image = NodeImage {
            level: 0,
            txn: 0,
            entries: vec![Entry::high(0)],
        };
        let root_buf = root_image.encode(node_size, mode, primary_key.key_length())?;
        cache.write(&mut index_file, root_node_num, root_buf)?;

        dict.keydesc_head = keydesc_node_num;
        dict.num_indexes = 1;

        cache.flush_all(&mut index_file)?;
        let dict_buf = dict.encode();
        write_dict(&mut index_file, node_size, &dict_buf)?;
        err_at!(IOError, index_file.sync_all(), "fsync index file")?;
        err_at!(IOError, data_file.sync_all(), "fsync data file")?;

        let wal = if open_mode.no_log {
            None
        } else {
            let log_path = with_ext(&base, "log");
            let log_file = err_at!(IOError, fs::OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&log_path), "create log file")?;
            Some(WalFile::create(log_file))
        };

        crate::lock::file_open(&index_file, mode, if open_mode.exclusive { crate::lock::FileOpenKind::Exclusive } else { crate::lock::FileOpenKind::Shared })?;

        log::debug!("isam: built table at {} ({} index(es), node_size={})", base.display(), dict.num_indexes, node_size);

        Ok(Table {
            mode,
            open_mode,
            base,
            index_file,
            data_file,
            seen_txn: dict.txn_number,
            dict,
            cache: BlockCache::new(node_size, cache_capacity),
            mirror: btree::Mirror::new(),
            indexes: vec![IndexSlot {
                node_num: keydesc_node_num,
                next: 0,
                root: root_node_num,
                desc: primary_key,
            }],
            active: 0,
            locks: crate::lock::LockList::new(),
            handle_id: 1,
            current: None,
            wal,
            txn: None,
            poisoned: false,
        })
    }

    /// Open an existing table, rebuilding the in-memory index list by
    /// walking the dictionary's key-descriptor chain (spec.md §4.2
    /// "Open").
    pub fn open(path: impl AsRef<Path>, open_mode: OpenMode) -> Result<Table> {
        Table::open_inner(path.as_ref().to_path_buf(), open_mode, crate::cache::DEFAULT_CACHE_SIZE)
    }

    /// Same as [`Table::open`], but the block cache capacity comes from a
    /// [`crate::config::Config`] (`config.dir`/`config.name` supply the
    /// path, `config.no_log` derives `open_mode`). The node size itself is
    /// always taken from the on-disk dictionary, never from the config.
    pub fn open_with_config(config: &crate::config::Config) -> Result<Table> {
        Table::open_inner(config.path(), config.open_mode(), config.cache_capacity)
    }

    fn open_inner(base: PathBuf, open_mode: OpenMode, cache_capacity: usize) -> Result<Table> {
        let mode = Mode::Bits64;

        let idx_path = with_ext(&base, "idx");
        let dat_path = with_ext(&base, "dat");

        let mut index_file = err_at!(IOError, fs::OpenOptions::new().read(true).write(!open_mode.read_only).open(&idx_path), "open index file")?;
        let data_file = err_at!(IOError, fs::OpenOptions::new().read(true).write(!open_mode.read_only).open(&dat_path), "open data file")?;

        crate::lock::file_open(&index_file, mode, if open_mode.exclusive { crate::lock::FileOpenKind::Exclusive } else { crate::lock::FileOpenKind::Shared })?;

        let node_size_guess = mode.default_node_size();
        let dict_buf = read_dict(&mut index_file, node_size_guess)?;
        let dict = Dictionary::decode(&dict_buf)?;
        if dict.mode != mode {
            return err_at!(BadFormat, msg: "index file {} is not in 64-bit mode", idx_path.display())?;
        }
        let node_size = dict.node_size as usize;

        let mut cache = BlockCache::new(node_size, cache_capacity);
        let mut indexes = Vec::new();
        let mut cursor = dict.keydesc_head;
        while cursor != 0 {
            let buf = cache.read(&mut index_file, cursor)?;
            let kd = KeyDescNode::decode(&buf, mode)?;
            indexes.push(IndexSlot {
                node_num: cursor,
                next: kd.next,
                root: kd.root,
                desc: kd.desc,
            });
            cursor = kd.next;
        }
        if indexes.is_empty() {
            return err_at!(BadFile, msg: "index file {} has no key descriptors", idx_path.display())?;
        }

        let wal = if open_mode.no_log {
            None
        } else {
            let log_path = with_ext(&base, "log");
            let log_file = err_at!(IOError, fs::OpenOptions::new().read(true).write(true).create(true).open(&log_path), "open log file")?;
            Some(WalFile::open(log_file)?)
        };

        let seen_txn = dict.txn_number;
        log::debug!("isam: opened table at {} ({} index(es))", base.display(), indexes.len());

        Ok(Table {
            mode,
            open_mode,
            base,
            index_file,
            data_file,
            dict,
            cache,
            mirror: btree::Mirror::new(),
            indexes,
            active: 0,
            locks: crate::lock::LockList::new(),
            handle_id: 1,
            current: None,
            wal,
            txn: None,
            seen_txn,
            poisoned: false,
        })
    }

    /// Release every lock this handle holds and drop the file-open byte
    /// (spec.md §4.2 "Close").
    pub fn close(mut self) -> Result<()> {
        self.release_locks()?;
        self.cache.flush_all(&mut self.index_file)?;
        err_at!(IOError, self.index_file.sync_all(), "fsync index file on close")?;
        err_at!(IOError, self.data_file.sync_all(), "fsync data file on close")?;
        crate::lock::file_open(&self.index_file, self.mode, crate::lock::FileOpenKind::Unlock)?;
        Ok(())
    }

    /// Delete a table's `.idx`/`.dat`/`.log` files (spec.md §4.2 "Erase").
    /// Tolerant of a missing `.log` file (`ISNOLOG` tables never had one).
    pub fn erase(path: impl AsRef<Path>) -> Result<()> {
        let base = path.as_ref().to_path_buf();
        for ext in ["idx", "dat", "log"] {
            let p = with_ext(&base, ext);
            match fs::remove_file(&p) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::from(e)),
            }
        }
        Ok(())
    }

    /// Rename a table's files (spec.md §4.2 "Rename"). Skips a missing
    /// `.log`.
    pub fn rename(old: impl AsRef<Path>, new: impl AsRef<Path>) -> Result<()> {
        let old_base = old.as_ref().to_path_buf();
        let new_base = new.as_ref().to_path_buf();
        for ext in ["idx", "dat", "log"] {
            let op = with_ext(&old_base, ext);
            let np = with_ext(&new_base, ext);
            if op.exists() {
                err_at!(IOError, fs::rename(&op, &np), "rename {} to {}", op.display(), np.display())?;
            }
        }
        Ok(())
    }

    /// Acquire the header guard, re-read the dictionary, run `f`, and —
    /// for a modifying operation — bump `txn_number` and write the
    /// dictionary back before releasing the guard (spec.md §2
    /// "enter/exit").
    fn enter<F, R>(&mut self, modifying: bool, f: F) -> Result<R>
    where
        F: FnOnce(&mut Table) -> Result<R>,
    {
        if self.poisoned {
            return err_at!(BadFile, msg: "handle poisoned by a prior failed compensating rollback")?;
        }
        crate::lock::header_guard(&self.index_file, self.mode, modifying)?;

        let node_size = self.dict.node_size as usize;
        let run = (|| -> Result<R> {
            let buf = read_dict(&mut self.index_file, node_size)?;
            let fresh = Dictionary::decode(&buf)?;
            if fresh.txn_number != self.seen_txn {
                self.cache.invalidate_all();
                self.mirror.invalidate();
            }
            self.dict = fresh;
            f(self)
        })();

        match run {
            Ok(result) => {
                if modifying {
                    self.dict.bump_txn();
                    let buf = self.dict.encode();
                    write_dict(&mut self.index_file, node_size, &buf)?;
                    self.cache.flush_all(&mut self.index_file)?;
                }
                self.seen_txn = self.dict.txn_number;
                crate::lock::header_guard_unlock(&self.index_file, self.mode)?;
                Ok(result)
            }
            Err(e) => {
                let _ = crate::lock::header_guard_unlock(&self.index_file, self.mode);
                Err(e)
            }
        }
    }

    fn release_locks(&mut self) -> Result<()> {
        for row in self.locks.rows_of(self.handle_id as u64) {
            crate::lock::row_unlock(&self.index_file, self.mode, row)?;
            self.locks.remove(row, self.handle_id as u64)?;
        }
        Ok(())
    }

    fn check_row_length(&self, image: &[u8]) -> Result<()> {
        let len = image.len() as u32;
        if len < self.dict.min_row_length || len > self.dict.max_row_length {
            return err_at!(RowSize, msg: "row image is {} bytes, table requires {}..{}", len, self.dict.min_row_length, self.dict.max_row_length)?;
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.open_mode.read_only {
            return err_at!(NotExcl, msg: "table was opened read-only")?;
        }
        Ok(())
    }

    /// Read the physical row plus its full logical image (fixed prefix
    /// plus, for a variable-length table, the tail store's contribution).
    fn read_physical(&mut self, row_number: u64) -> Result<(row::Row, Vec<u8>)> {
        let node_size = self.dict.node_size as usize;
        let stride = row_stride(&self.dict, self.mode);
        let min = self.dict.min_row_length;
        let mode = self.mode;
        let variable = self.dict.is_variable_length();
        let mut io = data_io(&mut self.data_file, stride);
        let r = row::read_row(&mut io, min, mode, variable, row_number)?;

        let mut image = r.fixed.clone();
        if variable && !r.tail.is_none() {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            let tail = tailstore::read_tail(&mut st, mode, r.tail)?;
            image.extend_from_slice(&tail);
        }
        Ok((r, image))
    }

    /// Write `image` into `row_number`'s physical slot, splitting the
    /// overflow into the tail store for a variable-length table.
    /// `old_tail`, if given, is deleted first (the row already held a
    /// tail that this write replaces or removes).
    fn write_physical(&mut self, row_number: u64, image: &[u8], old_tail: Option<TailRef>) -> Result<()> {
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;
        if let Some(old) = old_tail {
            if !old.is_none() {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                tailstore::delete_tail(&mut self.dict, &mut st, old)?;
            }
        }

        let min = self.dict.min_row_length as usize;
        let variable = self.dict.is_variable_length();
        let (fixed, tail_len, tail_ref) = if variable {
            if image.len() <= min {
                let mut fixed = image.to_vec();
                fixed.resize(min, 0);
                (fixed, 0u16, TailRef::NONE)
            } else {
                let fixed = image[..min].to_vec();
                let overflow = &image[min..];
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                let tref = tailstore::write_tail(&mut self.dict, &mut st, overflow)?;
                (fixed, overflow.len() as u16, tref)
            }
        } else {
            (image.to_vec(), 0u16, TailRef::NONE)
        };

        let row = row::Row::live(fixed, tail_len, tail_ref);
        let stride = row_stride(&self.dict, mode);
        let min32 = self.dict.min_row_length;
        let mut io = data_io(&mut self.data_file, stride);
        row::write_row(&mut io, min32, mode, variable, row_number, &row)
    }

    /// Overwrite `row_number`'s physical slot with a tombstone, retiring
    /// its tail chain.
    fn tombstone_physical(&mut self, row_number: u64, old_tail: TailRef) -> Result<()> {
        let node_size = self.dict.node_size as usize;
        if !old_tail.is_none() {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            tailstore::delete_tail(&mut self.dict, &mut st, old_tail)?;
        }
        let row = row::Row::tombstoned(self.dict.min_row_length);
        let stride = row_stride(&self.dict, self.mode);
        let min = self.dict.min_row_length;
        let mode = self.mode;
        let variable = self.dict.is_variable_length();
        let mut io = data_io(&mut self.data_file, stride);
        row::write_row(&mut io, min, mode, variable, row_number, &row)
    }

    /// Insert `row_number`'s projected key into every index, compensating
    /// (removing) whichever indexes already succeeded if a later one
    /// collides (spec.md §4.4/§4.6 "Write").
    fn insert_into_indexes(&mut self, row_number: u64, image: &[u8]) -> Result<()> {
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;

        for i in 0..self.indexes.len() {
            let desc = self.indexes[i].desc.clone();
            let key = desc.build_key(image)?;
            if desc.is_null_key(&key) || desc.has_dups() {
                continue;
            }
            let root = self.indexes[i].root;
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            let (outcome, _) = btree::search_tree(&mut self.mirror, &mut st, &desc, mode, root, SearchMode::Equal, &key, 0)?;
            if outcome == btree::Outcome::Equal {
                return err_at!(Dupl, msg: "row {} collides with an existing key in index {}", row_number, i)?;
            }
        }

        let mut done: Vec<(usize, Vec<u8>, u64)> = Vec::new();
        for i in 0..self.indexes.len() {
            let desc = self.indexes[i].desc.clone();
            let key = desc.build_key(image)?;
            if desc.is_null_key(&key) {
                continue;
            }
            let root = self.indexes[i].root;
            let dup = if desc.has_dups() {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                next_dup(&mut self.mirror, &mut st, &desc, mode, root, &key)?
            } else {
                0
            };

            let (new_root, outcome) = {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                btree::insert(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, node_size, root, &key, dup, row_number)?
            };
            match outcome {
                InsertOutcome::Inserted => {
                    self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
                    self.indexes[i].root = new_root;
                    persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
                    done.push((i, key, dup));
                }
                InsertOutcome::Duplicate => {
                    self.compensate(&done)?;
                    return err_at!(Dupl, msg: "row {} collides with an existing key in index {}", row_number, i)?;
                }
                InsertOutcome::Skipped => {}
            }
        }
        Ok(())
    }

    /// Undo a partial `insert_into_indexes`: remove every entry already
    /// inserted, in reverse order.
    fn compensate(&mut self, done: &[(usize, Vec<u8>, u64)]) -> Result<()> {
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;
        for &(i, ref key, dup) in done.iter().rev() {
            let desc = self.indexes[i].desc.clone();
            let root = self.indexes[i].root;
            let (new_root, _) = {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                btree::delete(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, root, key, dup)?
            };
            self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
            self.indexes[i].root = new_root;
            persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
        }
        Ok(())
    }

    /// Remove `row_number`'s key from every index it appears in.
    fn remove_from_indexes(&mut self, row_number: u64, image: &[u8]) -> Result<()> {
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;
        for i in 0..self.indexes.len() {
            let desc = self.indexes[i].desc.clone();
            let key = desc.build_key(image)?;
            if desc.is_null_key(&key) {
                continue;
            }
            let root = self.indexes[i].root;
            let dup = {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                find_dup_for_row(&mut self.mirror, &mut st, &desc, mode, root, &key, row_number)?
            };
            let dup = match dup {
                Some(d) => d,
                None => continue,
            };
            let (new_root, _) = {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                btree::delete(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, root, &key, dup)?
            };
            self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
            self.indexes[i].root = new_root;
            persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
        }
        Ok(())
    }

    /// Append a key descriptor and backfill it from every live row
    /// (spec.md §4.4 "Add index").
    pub fn add_index(&mut self, desc: KeyDescriptor) -> Result<usize> {
        self.enter(true, |t| t.do_add_index(desc))
    }

    fn do_add_index(&mut self, desc: KeyDescriptor) -> Result<usize> {
        self.check_writable()?;
        if self.indexes.len() >= keydesc::MAX_INDEXES {
            return err_at!(TooMany, msg: "already at {} indexes", keydesc::MAX_INDEXES)?;
        }
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;

        let kd_node_num = {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            alloc::alloc_index_node(&mut self.dict, &mut st)?
        };
        let root_node_num = {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            alloc::alloc_index_node(&mut self.dict, &mut st)?
        };
        let root_image = NodeImage {
            level: 0,
            txn: 0,
            entries: vec![Entry::high(0)],
        };
        let root_buf = root_image.encode(node_size, mode, desc.key_length())?;
        self.cache.write(&mut self.index_file, root_node_num, root_buf)?;

        let slot = IndexSlot {
            node_num: kd_node_num,
            next: 0,
            root: root_node_num,
            desc: desc.clone(),
        };

        let last_idx = self.indexes.len() - 1;
        self.indexes[last_idx].next = kd_node_num;
        persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[last_idx])?;
        persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &slot)?;

        let new_index = self.indexes.len();
        self.indexes.push(slot);
        self.dict.num_indexes += 1;

        for row_number in 1..=self.dict.data_row_count {
            let (row, image) = self.read_physical(row_number)?;
            if row.tombstone {
                continue;
            }
            let desc = self.indexes[new_index].desc.clone();
            let key = desc.build_key(&image)?;
            if desc.is_null_key(&key) {
                continue;
            }
            let root = self.indexes[new_index].root;
            let dup = if desc.has_dups() {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                next_dup(&mut self.mirror, &mut st, &desc, mode, root, &key)?
            } else {
                0
            };
            let (new_root, outcome) = {
                let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                btree::insert(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, node_size, root, &key, dup, row_number)?
            };
            if outcome == InsertOutcome::Duplicate {
                return err_at!(KeyExists, msg: "row {} collides while backfilling new index", row_number)?;
            }
            self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
            self.indexes[new_index].root = new_root;
            persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[new_index])?;
        }

        Ok(new_index)
    }

    /// Drop a secondary index and free its whole tree (spec.md §4.4 "Del
    /// index"). The primary index (0) can never be dropped.
    pub fn del_index(&mut self, index: usize) -> Result<()> {
        self.enter(true, |t| t.do_del_index(index))
    }

    fn do_del_index(&mut self, index: usize) -> Result<()> {
        self.check_writable()?;
        if index == 0 {
            return err_at!(PrimKey, msg: "cannot delete the primary index")?;
        }
        if index >= self.indexes.len() {
            return err_at!(BadArg, msg: "index {} out of range", index)?;
        }
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;

        let removed_node_num = self.indexes[index].node_num;
        let removed_next = self.indexes[index].next;
        let removed_root = self.indexes[index].root;
        let desc = self.indexes[index].desc.clone();

        {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            free_tree(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, removed_root)?;
            alloc::free_index_node(&mut self.dict, &mut st, removed_node_num)?;
        }

        self.indexes[index - 1].next = removed_next;
        persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[index - 1])?;

        self.indexes.remove(index);
        self.dict.num_indexes -= 1;
        if self.active >= self.indexes.len() {
            self.active = 0;
        }
        self.current = None;
        Ok(())
    }

    /// Position the cursor on `index` at `mode`/`key_template` without
    /// reading the row (spec.md §4.4 "Start").
    pub fn start(&mut self, index: usize, mode: SearchMode, key_template: Option<&[u8]>) -> Result<()> {
        if index >= self.indexes.len() {
            return err_at!(BadArg, msg: "index {} out of range", index)?;
        }
        self.enter(false, |t| {
            t.active = index;
            t.current = None;
            t.locate(mode, key_template)?;
            Ok(())
        })
    }

    /// Locate and read one row through the active index (spec.md §4.6
    /// "Read").
    pub fn read(&mut self, mode: SearchMode, key_template: Option<&[u8]>, read_mode: ReadMode) -> Result<Vec<u8>> {
        let (row_number, image) = self.enter(false, |t| {
            let row_number = t.locate(mode, key_template)?;
            let (_, image) = t.read_physical(row_number)?;
            Ok((row_number, image))
        })?;

        if read_mode.lock {
            match self.acquire_row_lock(row_number, read_mode) {
                Ok(()) => {}
                Err(e) => {
                    if !read_mode.skip_lock {
                        return Err(e);
                    }
                }
            }
        }
        Ok(image)
    }

    fn acquire_row_lock(&mut self, row_number: u64, read_mode: ReadMode) -> Result<()> {
        crate::lock::row_lock(&self.index_file, self.mode, row_number, read_mode.wait)?;
        self.locks.insert(row_number, self.handle_id as u64)
    }

    /// Resolve `mode`/`key_template` against the active index into a row
    /// number, updating `self.current` (spec.md §4.4 "Search").
    fn locate(&mut self, mode: SearchMode, key_template: Option<&[u8]>) -> Result<u64> {
        let node_size = self.dict.node_size as usize;
        let tmode = self.mode;
        let idx = self.active;
        let desc = self.indexes[idx].desc.clone();
        let root = self.indexes[idx].root;

        if mode == SearchMode::Curr {
            let pos = self.current.clone().ok_or_else(|| Error::NoCurr("no current row".into()))?;
            return Ok(pos.row);
        }

        if mode == SearchMode::Next || mode == SearchMode::Prev {
            let pos = self.current.clone().ok_or_else(|| Error::NoCurr("no current row".into()))?;
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            let (outcome, cursor) = btree::search_tree(&mut self.mirror, &mut st, &desc, tmode, root, SearchMode::Curr, &pos.key, pos.dup as i64)?;
            if outcome != btree::Outcome::Equal {
                return err_at!(BadFile, msg: "current row vanished from its index")?;
            }
            let cursor = cursor.expect("Equal outcome always carries a cursor");
            let forward = mode == SearchMode::Next;
            let next = btree::advance(&mut self.mirror, &mut st, &desc, tmode, root, cursor, forward)?;
            let next = match next {
                Some(c) => c,
                None => return err_at!(EndFile, msg: "no more rows in this direction")?,
            };
            let (slot, high_slot) = {
                let node = self.mirror.get(next.leaf);
                (next.slot, node.high_slot())
            };
            if slot >= high_slot {
                return err_at!(EndFile, msg: "no more rows in this direction")?;
            }
            let node = self.mirror.get(next.leaf);
            let entry = &node.entries[slot];
            let (key, dup, row) = (entry.key.clone(), entry.dup, entry.ptr);
            self.current = Some(Position { index: idx, key, dup, row });
            return Ok(row);
        }

        let (key, dup_hint): (Vec<u8>, i64) = match mode {
            SearchMode::First | SearchMode::Last => (Vec::new(), 0),
            SearchMode::Equal | SearchMode::Gteq | SearchMode::Great => {
                let tmpl = key_template.ok_or_else(|| Error::BadArg("key template required for this search mode".into()))?;
                (desc.build_key(tmpl)?, 0)
            }
            SearchMode::Curr | SearchMode::Next | SearchMode::Prev => unreachable!("handled above"),
        };

        let mut st = store(&mut self.cache, &mut self.index_file, node_size);
        let (outcome, cursor) = btree::search_tree(&mut self.mirror, &mut st, &desc, tmode, root, mode, &key, dup_hint)?;
        if outcome == btree::Outcome::EmptyTree {
            return err_at!(NoRec, msg: "index is empty")?;
        }
        let cursor = cursor.ok_or_else(|| Error::NoRec("no matching record".into()))?;
        let (slot, high_slot) = {
            let node = self.mirror.get(cursor.leaf);
            (cursor.slot, node.high_slot())
        };
        if slot >= high_slot {
            return err_at!(NoRec, msg: "no matching record")?;
        }
        if mode == SearchMode::Equal && outcome != btree::Outcome::Equal {
            return err_at!(NoRec, msg: "no exact match")?;
        }
        let node = self.mirror.get(cursor.leaf);
        let entry = &node.entries[slot];
        let (key_out, dup_out, row) = (entry.key.clone(), entry.dup, entry.ptr);
        self.current = Some(Position { index: idx, key: key_out, dup: dup_out, row });
        Ok(row)
    }

    /// Insert a new row, indexing it through every index (spec.md §4.6
    /// "Write").
    pub fn write(&mut self, image: &[u8]) -> Result<u64> {
        self.enter(true, |t| t.do_write(image))
    }

    fn do_write(&mut self, image: &[u8]) -> Result<u64> {
        if self.poisoned {
            return err_at!(BadFile, msg: "handle poisoned")?;
        }
        self.check_writable()?;
        self.check_row_length(image)?;

        let node_size = self.dict.node_size as usize;
        let row_number = {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            alloc::alloc_data_row(&mut self.dict, &mut st)?
        };

        if let Err(e) = self.insert_into_indexes(row_number, image) {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            let _ = alloc::free_data_row(&mut self.dict, &mut st, row_number);
            return Err(e);
        }

        if let Err(e) = self.write_physical(row_number, image, None) {
            let _ = self.remove_from_indexes(row_number, image);
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            let _ = alloc::free_data_row(&mut self.dict, &mut st, row_number);
            return Err(e);
        }

        if self.txn.is_some() {
            let handle_id = self.handle_id;
            let txn = self.txn.as_mut().unwrap();
            let wal = self.wal.as_mut().ok_or_else(|| Error::NoLog("transaction active but no log attached".into()))?;
            txn.log_insert(wal, handle_id, row_number)?;
        }

        let primary_desc = self.indexes[0].desc.clone();
        let key = primary_desc.build_key(image)?;
        if !primary_desc.is_null_key(&key) {
            self.current = Some(Position { index: 0, key, dup: 0, row: row_number });
        }

        Ok(row_number)
    }

    /// Overwrite the row the cursor currently points at (spec.md §4.6
    /// "Rewrite").
    pub fn rewrite(&mut self, image: &[u8]) -> Result<()> {
        self.rewrite_current(image)
    }

    pub fn rewrite_current(&mut self, image: &[u8]) -> Result<()> {
        self.enter(true, |t| {
            let row_number = t.current.as_ref().ok_or_else(|| Error::NoCurr("no current row".into()))?.row;
            t.do_rewrite(row_number, image)
        })
    }

    pub fn rewrite_by_row(&mut self, row_number: u64, image: &[u8]) -> Result<()> {
        self.enter(true, |t| t.do_rewrite(row_number, image))
    }

    fn do_rewrite(&mut self, row_number: u64, new_image: &[u8]) -> Result<()> {
        if self.poisoned {
            return err_at!(BadFile, msg: "handle poisoned")?;
        }
        self.check_writable()?;
        self.check_row_length(new_image)?;
        let (old_row, old_image) = self.read_physical(row_number)?;
        if old_row.tombstone {
            return err_at!(NoRec, msg: "row {} is deleted", row_number)?;
        }

        let node_size = self.dict.node_size as usize;
        let mode = self.mode;

        for i in 0..self.indexes.len() {
            let desc = self.indexes[i].desc.clone();
            if desc.has_dups() {
                continue;
            }
            let new_key = desc.build_key(new_image)?;
            if desc.is_null_key(&new_key) {
                continue;
            }
            let old_key = desc.build_key(&old_image)?;
            if desc.compare_keys(&old_key, &new_key)? == Ordering::Equal {
                continue;
            }
            let root = self.indexes[i].root;
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            let (outcome, _) = btree::search_tree(&mut self.mirror, &mut st, &desc, mode, root, SearchMode::Equal, &new_key, 0)?;
            if outcome == btree::Outcome::Equal {
                return err_at!(Dupl, msg: "rewrite of row {} collides with an existing key in index {}", row_number, i)?;
            }
        }

        if self.txn.is_some() {
            let handle_id = self.handle_id;
            let txn = self.txn.as_mut().unwrap();
            let wal = self.wal.as_mut().ok_or_else(|| Error::NoLog("transaction active but no log attached".into()))?;
            txn.log_update(wal, handle_id, row_number, &old_image)?;
        }

        for i in 0..self.indexes.len() {
            let desc = self.indexes[i].desc.clone();
            let old_key = desc.build_key(&old_image)?;
            let new_key = desc.build_key(new_image)?;
            if desc.compare_keys(&old_key, &new_key)? == Ordering::Equal {
                continue;
            }

            if !desc.is_null_key(&old_key) {
                let root = self.indexes[i].root;
                let dup = {
                    let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                    find_dup_for_row(&mut self.mirror, &mut st, &desc, mode, root, &old_key, row_number)?
                };
                if let Some(dup) = dup {
                    let (new_root, _) = {
                        let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                        btree::delete(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, root, &old_key, dup)?
                    };
                    self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
                    self.indexes[i].root = new_root;
                    persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
                }
            }

            if !desc.is_null_key(&new_key) {
                let root = self.indexes[i].root;
                let dup = if desc.has_dups() {
                    let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                    next_dup(&mut self.mirror, &mut st, &desc, mode, root, &new_key)?
                } else {
                    0
                };
                let (new_root, _) = {
                    let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                    btree::insert(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, node_size, root, &new_key, dup, row_number)?
                };
                self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
                self.indexes[i].root = new_root;
                persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
            }
        }

        self.write_physical(row_number, new_image, Some(old_row.tail))?;

        if matches!(&self.current, Some(pos) if pos.row == row_number) {
            self.current = None;
        }
        Ok(())
    }

    /// Delete the row located by `key_template` on the active index
    /// (spec.md §4.6 "Delete").
    pub fn delete(&mut self, key_template: &[u8]) -> Result<()> {
        self.enter(true, |t| {
            let row_number = t.locate(SearchMode::Equal, Some(key_template))?;
            t.do_delete(row_number)
        })
    }

    pub fn delete_current(&mut self) -> Result<()> {
        self.enter(true, |t| {
            let row_number = t.current.as_ref().ok_or_else(|| Error::NoCurr("no current row".into()))?.row;
            t.do_delete(row_number)
        })
    }

    pub fn delete_by_row(&mut self, row_number: u64) -> Result<()> {
        self.enter(true, |t| t.do_delete(row_number))
    }

    fn do_delete(&mut self, row_number: u64) -> Result<()> {
        if self.poisoned {
            return err_at!(BadFile, msg: "handle poisoned")?;
        }
        self.check_writable()?;
        let (old_row, image) = self.read_physical(row_number)?;
        if old_row.tombstone {
            return err_at!(NoRec, msg: "row {} already deleted", row_number)?;
        }

        if self.txn.is_some() {
            let handle_id = self.handle_id;
            let txn = self.txn.as_mut().unwrap();
            let wal = self.wal.as_mut().ok_or_else(|| Error::NoLog("transaction active but no log attached".into()))?;
            txn.log_delete(wal, handle_id, row_number, &image)?;
        }

        self.remove_from_indexes(row_number, &image)?;
        self.tombstone_physical(row_number, old_row.tail)?;

        let node_size = self.dict.node_size as usize;
        let mut st = store(&mut self.cache, &mut self.index_file, node_size);
        alloc::free_data_row(&mut self.dict, &mut st, row_number)?;

        if matches!(&self.current, Some(pos) if pos.row == row_number) {
            self.current = None;
        }
        Ok(())
    }

    /// Hold a write lock over every row (spec.md §4.7 "Table-wide lock").
    pub fn lock(&mut self, wait: bool) -> Result<()> {
        self.enter(false, |t| crate::lock::all_rows_lock(&t.index_file, t.mode, wait))
    }

    pub fn unlock(&mut self) -> Result<()> {
        self.enter(false, |t| crate::lock::all_rows_unlock(&t.index_file, t.mode))
    }

    pub fn release_row(&mut self, row_number: u64) -> Result<()> {
        self.enter(false, |t| {
            crate::lock::row_unlock(&t.index_file, t.mode, row_number)?;
            t.locks.remove(row_number, t.handle_id as u64)
        })
    }

    pub fn release_current(&mut self) -> Result<()> {
        let row_number = self.current.as_ref().ok_or_else(|| Error::NoCurr("no current row".into()))?.row;
        self.release_row(row_number)
    }

    /// Release every row lock this handle holds (spec.md §4.7 "Release").
    pub fn release(&mut self) -> Result<()> {
        self.enter(false, |t| t.release_locks())
    }

    pub fn set_unique(&mut self, seed: u64) -> Result<()> {
        self.enter(true, |t| {
            t.dict.unique_id = seed;
            Ok(())
        })
    }

    pub fn unique_id(&mut self) -> Result<u64> {
        self.enter(true, |t| Ok(t.dict.next_unique_id()))
    }

    /// Physically reorder the data file into index order (`iscluster` in
    /// the reference implementation). Declared but unimplemented there too
    /// (spec.md §9 Open Questions) — kept as a typed stub rather than a
    /// missing symbol, so a caller gets `Error::NotImplemented` instead of
    /// a link error if a future version adds clustering.
    pub fn cluster(&mut self, _index: usize) -> Result<()> {
        err_at!(NotImplemented, msg: "cluster is not implemented")?
    }

    /// Enable or disable the audit trail (`isaudit` in the reference
    /// implementation). Declared but unimplemented there too (spec.md §9
    /// Open Questions) — same typed-stub treatment as `cluster`.
    pub fn set_audit_trail(&mut self, _enabled: bool) -> Result<()> {
        err_at!(NotImplemented, msg: "audit trail is not implemented")?
    }

    /// A point-in-time snapshot of this table's dictionary counters
    /// (spec.md §2 ambient "Configuration", modeled on `robt::config::Stats`).
    pub fn stats(&self) -> crate::config::Stats {
        crate::config::Stats {
            name: self.base.display().to_string(),
            node_size: self.dict.node_size as usize,
            num_indexes: self.indexes.len(),
            min_row_length: self.dict.min_row_length,
            max_row_length: self.dict.max_row_length,
            data_row_count: self.dict.data_row_count,
            index_node_count: self.dict.index_node_count,
            txn_number: self.dict.txn_number,
            unique_id: self.dict.unique_id,
        }
    }

    /// Begin a transaction on this handle (spec.md §4.8 "Begin").
    pub fn begin(&mut self) -> Result<()> {
        self.enter(false, |t| {
            if t.wal.is_none() {
                return err_at!(NoLog, msg: "table has no log attached")?;
            }
            if let Some(txn) = &t.txn {
                if txn.is_active() {
                    return err_at!(NoBegin, msg: "a transaction is already active on this handle")?;
                }
            }
            t.txn = Some(Transaction::begin(std::process::id(), t.handle_id));
            Ok(())
        })
    }

    /// Commit the active transaction (spec.md §4.8 "Commit").
    pub fn commit(&mut self) -> Result<()> {
        self.enter(true, |t| {
            let mut txn = t.txn.take().ok_or_else(|| Error::NoBegin("commit without begin".into()))?;
            let mut wal = t.wal.take().ok_or_else(|| Error::NoLog("table has no log attached".into()))?;
            let result = txn.commit(&mut wal);
            t.wal = Some(wal);
            result?;
            t.release_locks()
        })
    }

    /// Roll back the active transaction, undoing every logged operation
    /// (spec.md §4.8 "Rollback"). `Table` implements `wal::Undo` and is
    /// passed as the rollback sink, which is why `txn`/`wal` are taken
    /// out of `self` first: the sink needs `&mut self` free of any
    /// existing borrow of those two fields.
    pub fn rollback(&mut self) -> Result<()> {
        self.enter(true, |t| {
            let mut txn = t.txn.take().ok_or_else(|| Error::NoBegin("rollback without begin".into()))?;
            let mut wal = t.wal.take().ok_or_else(|| Error::NoLog("table has no log attached".into()))?;
            let result = txn.rollback(&mut wal, t);
            t.wal = Some(wal);
            result?;
            t.release_locks()
        })
    }

    /// Replay the log for crash recovery (spec.md §4.8 "Recover"),
    /// rolling back any transaction left open by a prior crash.
    pub fn recover(&mut self) -> Result<()> {
        self.enter(true, |t| {
            let log_path = with_ext(&t.base, "log");
            let mut file = err_at!(IOError, fs::OpenOptions::new().read(true).write(true).open(&log_path), "open log for recovery")?;
            log::info!("isam: replaying log {}", log_path.display());
            wal::recover(&mut file, t)?;
            t.wal = Some(WalFile::open(file)?);
            Ok(())
        })
    }

    fn purge_row(&mut self, row_number: u64) -> Result<()> {
        let (old_row, image) = self.read_physical(row_number)?;
        if old_row.tombstone {
            return Ok(());
        }
        self.remove_from_indexes(row_number, &image)?;
        self.tombstone_physical(row_number, old_row.tail)?;
        let node_size = self.dict.node_size as usize;
        let mut st = store(&mut self.cache, &mut self.index_file, node_size);
        alloc::free_data_row(&mut self.dict, &mut st, row_number)
    }

    fn restore_row(&mut self, row_number: u64, old_image: &[u8]) -> Result<()> {
        let (current_row, current_image) = self.read_physical(row_number)?;
        let node_size = self.dict.node_size as usize;
        let mode = self.mode;

        for i in 0..self.indexes.len() {
            let desc = self.indexes[i].desc.clone();
            let cur_key = desc.build_key(&current_image)?;
            let old_key = desc.build_key(old_image)?;
            if desc.compare_keys(&cur_key, &old_key)? == Ordering::Equal {
                continue;
            }

            if !desc.is_null_key(&cur_key) {
                let root = self.indexes[i].root;
                let dup = {
                    let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                    find_dup_for_row(&mut self.mirror, &mut st, &desc, mode, root, &cur_key, row_number)?
                };
                if let Some(dup) = dup {
                    let (new_root, _) = {
                        let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                        btree::delete(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, root, &cur_key, dup)?
                    };
                    self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
                    self.indexes[i].root = new_root;
                    persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
                }
            }

            if !desc.is_null_key(&old_key) {
                let root = self.indexes[i].root;
                let dup = if desc.has_dups() {
                    let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                    next_dup(&mut self.mirror, &mut st, &desc, mode, root, &old_key)?
                } else {
                    0
                };
                let (new_root, _) = {
                    let mut st = store(&mut self.cache, &mut self.index_file, node_size);
                    btree::insert(&mut self.mirror, &mut st, &mut self.dict, &desc, mode, node_size, root, &old_key, dup, row_number)?
                };
                self.mirror.flush(&mut store(&mut self.cache, &mut self.index_file, node_size), node_size, mode, desc.key_length())?;
                self.indexes[i].root = new_root;
                persist_index_slot(&mut self.cache, &mut self.index_file, node_size, mode, &self.indexes[i])?;
            }
        }

        self.write_physical(row_number, old_image, Some(current_row.tail))?;
        if matches!(&self.current, Some(pos) if pos.row == row_number) {
            self.current = None;
        }
        Ok(())
    }

    fn resurrect_row(&mut self, row_number: u64, old_image: &[u8]) -> Result<()> {
        let node_size = self.dict.node_size as usize;
        {
            let mut st = store(&mut self.cache, &mut self.index_file, node_size);
            alloc::force_data_alloc(&mut self.dict, &mut st, row_number)?;
        }
        self.write_physical(row_number, old_image, None)?;
        self.insert_into_indexes(row_number, old_image)
    }
}

impl Undo for Table {
    fn undo_insert(&mut self, _handle: u32, row: u64) -> Result<()> {
        self.purge_row(row)
    }

    fn undo_update(&mut self, _handle: u32, row: u64, old_image: &[u8]) -> Result<()> {
        self.restore_row(row, old_image)
    }

    fn undo_delete(&mut self, _handle: u32, row: u64, old_image: &[u8]) -> Result<()> {
        self.resurrect_row(row, old_image)
    }

    fn undo_file_open(&mut self, _handle: u32) -> Result<()> {
        Ok(())
    }

    fn undo_file_close(&mut self, _handle: u32, _filename: &str) -> Result<()> {
        Ok(())
    }
}

impl Recover for Table {
    fn on_commit_row_free(&mut self, _handle: u32, _row: u64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod table_test;

#[cfg(test)]
#[path = "table_prop_test.rs"]
mod table_prop_test;
