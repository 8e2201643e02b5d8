use super::*;
use crate::btree::mirror::Mirror;
use crate::btree::search::{search, Outcome, SearchMode};
use crate::dict::Dictionary;
use crate::keydesc::{KeyDescriptor, KeyFlags, KeyPart, PartType};
use std::collections::HashMap;

struct MemStore {
    node_size: usize,
    blocks: HashMap<u64, Vec<u8>>,
}

impl MemStore {
    fn new(node_size: usize) -> MemStore {
        MemStore {
            node_size,
            blocks: HashMap::new(),
        }
    }
}

impl NodeStore for MemStore {
    fn node_size(&self) -> usize {
        self.node_size
    }
    fn read_node(&mut self, node_num: u64) -> Result<Vec<u8>> {
        Ok(self.blocks.get(&node_num).cloned().unwrap_or_else(|| vec![0u8; self.node_size]))
    }
    fn write_node(&mut self, node_num: u64, data: Vec<u8>) -> Result<()> {
        self.blocks.insert(node_num, data);
        Ok(())
    }
}

fn int_desc() -> KeyDescriptor {
    KeyDescriptor::new(vec![KeyPart::new(0, 4, PartType::Int32)], KeyFlags(0)).unwrap()
}

fn dup_desc() -> KeyDescriptor {
    KeyDescriptor::new(vec![KeyPart::new(0, 4, PartType::Int32)], KeyFlags::DUPS).unwrap()
}

fn key(n: i32) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

fn empty_root(mirror: &mut Mirror, store: &mut MemStore, mode: Mode) -> u64 {
    let id = mirror.new_node(1, 0, vec![Entry::high(0)]);
    mirror.flush(store, store.node_size, mode, 4).unwrap();
    mirror.get(id).node_num
}

#[test]
fn test_insert_single_then_search() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    let mut store = MemStore::new(128);
    let mut mirror = Mirror::new();
    let desc = int_desc();
    let root = empty_root(&mut mirror, &mut store, mode);

    let (root2, outcome) =
        insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root, &key(5), 0, 900).unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);

    let (found, cursor) = search(&mut mirror, &mut store, &desc, mode, root2, SearchMode::Equal, &key(5), 0).unwrap();
    assert_eq!(found, Outcome::Equal);
    let c = cursor.unwrap();
    assert_eq!(mirror.get(c.leaf).entries[c.slot].ptr, 900);
}

#[test]
fn test_insert_duplicate_rejected_without_dups_flag() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    let mut store = MemStore::new(128);
    let mut mirror = Mirror::new();
    let desc = int_desc();
    let root = empty_root(&mut mirror, &mut store, mode);

    let (root2, _) = insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root, &key(5), 0, 1).unwrap();
    let (_, outcome) = insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root2, &key(5), 0, 2).unwrap();
    assert_eq!(outcome, InsertOutcome::Duplicate);
}

#[test]
fn test_insert_duplicate_allowed_with_dups_flag() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    let mut store = MemStore::new(128);
    let mut mirror = Mirror::new();
    let desc = dup_desc();
    let root = empty_root(&mut mirror, &mut store, mode);

    let (root2, _) = insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root, &key(5), 0, 1).unwrap();
    let (_, outcome) = insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root2, &key(5), 1, 2).unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);
}

#[test]
fn test_insert_many_sequential_triggers_split_and_root_grows() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    // small node size forces splits quickly.
    let node_size = 96;
    let mut store = MemStore::new(node_size);
    let mut mirror = Mirror::new();
    let desc = int_desc();
    let mut root = empty_root(&mut mirror, &mut store, mode);

    for i in 0..40i32 {
        let (new_root, outcome) =
            insert(&mut mirror, &mut store, &mut dict, &desc, mode, node_size, root, &key(i), 0, 1000 + i as u64)
                .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        root = new_root;
    }

    for i in 0..40i32 {
        let (found, cursor) = search(&mut mirror, &mut store, &desc, mode, root, SearchMode::Equal, &key(i), 0).unwrap();
        assert_eq!(found, Outcome::Equal, "key {} not found", i);
        let c = cursor.unwrap();
        assert_eq!(mirror.get(c.leaf).entries[c.slot].ptr, 1000 + i as u64);
    }
}
