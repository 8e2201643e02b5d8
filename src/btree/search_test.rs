use super::*;
use crate::btree::mirror::Mirror;
use crate::btree::node::Entry;
use crate::dict::Mode;
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

fn char_desc() -> KeyDescriptor {
    KeyDescriptor::new(vec![KeyPart::new(0, 4, PartType::Char)], KeyFlags(0)).unwrap()
}

fn pad(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.resize(4, b' ');
    v
}

/// Build a single-leaf tree with a handful of sorted keys and a trailing
/// high sentinel, flushed to `store` at node number 1.
fn one_leaf_tree(store: &mut MemStore, mode: Mode, desc: &KeyDescriptor) -> (Mirror, u64) {
    let mut mirror = Mirror::new();
    let id = mirror.new_node(1, 0, Vec::new());
    for (i, k) in ["aaaa", "bbbb", "cccc"].iter().enumerate() {
        mirror.get_mut(id).entries.push(Entry::real(pad(k), 0, 100 + i as u64));
    }
    mirror.get_mut(id).entries.push(Entry::high(0));
    mirror.flush(store, 128, mode, desc.key_length()).unwrap();
    (mirror, 1)
}

#[test]
fn test_search_equal_hit() {
    let mode = Mode::Bits64;
    let desc = char_desc();
    let mut store = MemStore::new(128);
    let (mut mirror, root) = one_leaf_tree(&mut store, mode, &desc);

    let (outcome, cursor) =
        search(&mut mirror, &mut store, &desc, mode, root, SearchMode::Equal, &pad("bbbb"), 0).unwrap();
    assert_eq!(outcome, Outcome::Equal);
    let c = cursor.unwrap();
    assert_eq!(mirror.get(c.leaf).entries[c.slot].ptr, 101);
}

#[test]
fn test_search_miss_returns_less() {
    let mode = Mode::Bits64;
    let desc = char_desc();
    let mut store = MemStore::new(128);
    let (mut mirror, root) = one_leaf_tree(&mut store, mode, &desc);

    let (outcome, cursor) =
        search(&mut mirror, &mut store, &desc, mode, root, SearchMode::Equal, &pad("bbbc"), 0).unwrap();
    assert_eq!(outcome, Outcome::Less);
    assert!(cursor.is_some());
}

#[test]
fn test_search_empty_tree() {
    let mode = Mode::Bits64;
    let desc = char_desc();
    let mut store = MemStore::new(128);
    let mut mirror = Mirror::new();
    let id = mirror.new_node(1, 0, Vec::new());
    mirror.get_mut(id).entries.push(Entry::high(0));
    mirror.flush(&mut store, 128, mode, desc.key_length()).unwrap();

    let (outcome, cursor) =
        search(&mut mirror, &mut store, &desc, mode, 1, SearchMode::First, &[], -1).unwrap();
    assert_eq!(outcome, Outcome::EmptyTree);
    assert!(cursor.is_none());
}

#[test]
fn test_search_first_and_last() {
    let mode = Mode::Bits64;
    let desc = char_desc();
    let mut store = MemStore::new(128);
    let (mut mirror, root) = one_leaf_tree(&mut store, mode, &desc);

    let (_, first) = search(&mut mirror, &mut store, &desc, mode, root, SearchMode::First, &[], -1).unwrap();
    let c = first.unwrap();
    assert_eq!(mirror.get(c.leaf).entries[c.slot].key, pad("aaaa"));

    let (_, last) = search(&mut mirror, &mut store, &desc, mode, root, SearchMode::Last, &[], -1).unwrap();
    let c = last.unwrap();
    assert_eq!(mirror.get(c.leaf).entries[c.slot].key, pad("cccc"));
}

#[test]
fn test_advance_forward_within_leaf() {
    let mode = Mode::Bits64;
    let desc = char_desc();
    let mut store = MemStore::new(128);
    let (mut mirror, root) = one_leaf_tree(&mut store, mode, &desc);

    let (_, first) = search(&mut mirror, &mut store, &desc, mode, root, SearchMode::First, &[], -1).unwrap();
    let c = first.unwrap();
    let next = advance(&mut mirror, &mut store, &desc, mode, root, c, true).unwrap().unwrap();
    assert_eq!(mirror.get(next.leaf).entries[next.slot].key, pad("bbbb"));
}
