use super::*;

#[test]
fn test_roundtrip_64bit() {
    let mut d = Dictionary::new(Mode::Bits64, 16, 16);
    d.num_indexes = 2;
    d.bump_txn();
    d.next_unique_id();
    d.group_heads[3] = 77;
    let buf = d.encode();
    assert_eq!(buf.len(), d.node_size as usize);
    let d2 = Dictionary::decode(&buf).unwrap();
    assert_eq!(d2.num_indexes, 2);
    assert_eq!(d2.txn_number, 1);
    assert_eq!(d2.unique_id, 1);
    assert_eq!(d2.group_heads[3], 77);
    assert_eq!(d2.mode, Mode::Bits64);
}

#[test]
fn test_roundtrip_32bit() {
    let d = Dictionary::new(Mode::Bits32, 8, 64);
    let buf = d.encode();
    let d2 = Dictionary::decode(&buf).unwrap();
    assert_eq!(d2.mode, Mode::Bits32);
    assert!(d2.is_variable_length());
}

#[test]
fn test_bad_magic_rejected() {
    let buf = vec![0u8; 64];
    assert!(Dictionary::decode(&buf).is_err());
}

#[test]
fn test_txn_number_monotone() {
    let mut d = Dictionary::new(Mode::Bits64, 16, 16);
    let t0 = d.txn_number;
    d.bump_txn();
    d.bump_txn();
    assert_eq!(d.txn_number, t0 + 2);
}
