use super::*;

#[test]
fn test_btree_trailer_roundtrip_64bit() {
    let mut node = vec![0u8; 32];
    Trailer::btree(2).write_into(&mut node, Mode::Bits64);
    let t = Trailer::read_from(&node, Mode::Bits64).unwrap();
    assert_eq!(t.kind, KIND_BTREE);
    assert_eq!(t.level, 2);
    assert!(!t.is_leaf());
}

#[test]
fn test_leaf_trailer_32bit() {
    let mut node = vec![0u8; 16];
    Trailer::btree(0).write_into(&mut node, Mode::Bits32);
    let t = Trailer::read_from(&node, Mode::Bits32).unwrap();
    assert!(t.is_leaf());
}

#[test]
fn test_freelist_trailer_kinds() {
    let mut node = vec![0u8; 16];
    Trailer::freelist(true).write_into(&mut node, Mode::Bits64);
    let t = Trailer::read_from(&node, Mode::Bits64).unwrap();
    assert_eq!(t.kind, KIND_DATA_FREELIST);

    Trailer::freelist(false).write_into(&mut node, Mode::Bits64);
    let t = Trailer::read_from(&node, Mode::Bits64).unwrap();
    assert_eq!(t.kind, KIND_INDEX_FREELIST);
}

#[test]
fn test_tail_trailer_kind() {
    let mut node = vec![0u8; 16];
    Trailer::tail().write_into(&mut node, Mode::Bits64);
    let t = Trailer::read_from(&node, Mode::Bits64).unwrap();
    assert_eq!(t.kind, KIND_TAIL);
    assert!(!t.is_leaf());
}

#[test]
fn test_missing_marker_rejected_in_64bit_mode() {
    let node = vec![0u8; 16];
    assert!(Trailer::read_from(&node, Mode::Bits64).is_err());
}
