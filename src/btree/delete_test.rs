use super::*;
use crate::btree::insert::{insert, InsertOutcome};
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

fn key(n: i32) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

fn empty_root(mirror: &mut Mirror, store: &mut MemStore, mode: Mode) -> u64 {
    let id = mirror.new_node(1, 0, vec![crate::btree::node::Entry::high(0)]);
    mirror.flush(store, store.node_size, mode, 4).unwrap();
    mirror.get(id).node_num
}

#[test]
fn test_delete_only_entry_leaves_empty_tree() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    let mut store = MemStore::new(128);
    let mut mirror = Mirror::new();
    let desc = int_desc();
    let root = empty_root(&mut mirror, &mut store, mode);

    let (root, outcome) = insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root, &key(5), 0, 900).unwrap();
    assert_eq!(outcome, InsertOutcome::Inserted);

    let (root, outcome) = delete(&mut mirror, &mut store, &mut dict, &desc, mode, root, &key(5), 0).unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);

    let (found, _) = search(&mut mirror, &mut store, &desc, mode, root, SearchMode::Equal, &key(5), 0).unwrap();
    assert_eq!(found, Outcome::EmptyTree);
}

#[test]
fn test_delete_missing_key_not_found() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    let mut store = MemStore::new(128);
    let mut mirror = Mirror::new();
    let desc = int_desc();
    let root = empty_root(&mut mirror, &mut store, mode);

    let (root, _) = insert(&mut mirror, &mut store, &mut dict, &desc, mode, 128, root, &key(5), 0, 900).unwrap();
    let (_, outcome) = delete(&mut mirror, &mut store, &mut dict, &desc, mode, root, &key(6), 0).unwrap();
    assert_eq!(outcome, DeleteOutcome::NotFound);
}

#[test]
fn test_delete_after_split_collapses_root_back() {
    let mode = Mode::Bits64;
    let mut dict = Dictionary::new(mode, 16, 16);
    let node_size = 96;
    let mut store = MemStore::new(node_size);
    let mut mirror = Mirror::new();
    let desc = int_desc();
    let mut root = empty_root(&mut mirror, &mut store, mode);

    for i in 0..40i32 {
        let (new_root, _) =
            insert(&mut mirror, &mut store, &mut dict, &desc, mode, node_size, root, &key(i), 0, 1000 + i as u64)
                .unwrap();
        root = new_root;
    }

    for i in 0..40i32 {
        let (new_root, outcome) = delete(&mut mirror, &mut store, &mut dict, &desc, mode, root, &key(i), 0).unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted, "key {} should have been found", i);
        root = new_root;
    }

    let (found, _) = search(&mut mirror, &mut store, &desc, mode, root, SearchMode::First, &[], -1).unwrap();
    assert_eq!(found, Outcome::EmptyTree);
}
