use super::*;
use crate::dict::Mode;

fn pad(s: &str, len: usize) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.resize(len, PAD_BYTE);
    v
}

#[test]
fn test_leaf_roundtrip_64bit() {
    let entries = vec![
        Entry::real(pad("aaaa", 8), 0, 10),
        Entry::real(pad("aabb", 8), 0, 11),
        Entry::real(pad("aabb", 8), 1, 12),
        Entry::high(0),
    ];
    let image = NodeImage { level: 0, txn: 5, entries };
    let buf = image.encode(256, Mode::Bits64, 8).unwrap();
    let decoded = NodeImage::decode(&buf, Mode::Bits64, 8).unwrap();
    assert_eq!(decoded.level, 0);
    assert_eq!(decoded.entries.len(), 4);
    assert_eq!(decoded.entries[0].key, pad("aaaa", 8));
    assert_eq!(decoded.entries[1].key, pad("aabb", 8));
    assert_eq!(decoded.entries[2].dup, 1);
    assert!(decoded.entries[3].high);
}

#[test]
fn test_internal_roundtrip_32bit() {
    let entries = vec![
        Entry::real(pad("mmmm", 4), 0, 2),
        Entry::high(3),
    ];
    let image = NodeImage { level: 1, txn: 0, entries };
    let buf = image.encode(128, Mode::Bits32, 4).unwrap();
    let decoded = NodeImage::decode(&buf, Mode::Bits32, 4).unwrap();
    assert_eq!(decoded.level, 1);
    assert_eq!(decoded.entries[0].ptr, 2);
    assert_eq!(decoded.entries[1].ptr, 3);
}

#[test]
fn test_trailing_space_compression() {
    let entries = vec![Entry::real(pad("ab", 8), 0, 1), Entry::high(0)];
    let image = NodeImage { level: 0, txn: 0, entries };
    let buf = image.encode(64, Mode::Bits64, 8).unwrap();
    let decoded = NodeImage::decode(&buf, Mode::Bits64, 8).unwrap();
    assert_eq!(decoded.entries[0].key, pad("ab", 8));
}

#[test]
fn test_overflow_rejected() {
    let mut entries = Vec::new();
    for i in 0..50u64 {
        entries.push(Entry::real(format!("{:08}", i).into_bytes(), 0, i));
    }
    entries.push(Entry::high(0));
    let image = NodeImage { level: 0, txn: 0, entries };
    assert!(image.encode(64, Mode::Bits64, 8).is_err());
}
