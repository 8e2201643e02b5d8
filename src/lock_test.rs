use super::*;
use tempfile::tempfile;

#[test]
fn test_lock_list_insert_remove_sorted() {
    let mut locks = LockList::new();
    locks.insert(5, 1).unwrap();
    locks.insert(2, 1).unwrap();
    locks.insert(8, 1).unwrap();
    assert_eq!(locks.holder(2), Some(1));
    assert_eq!(locks.holder(5), Some(1));
    assert_eq!(locks.rows_of(1), vec![2, 5, 8]);

    locks.remove(5, 1).unwrap();
    assert_eq!(locks.holder(5), None);
    assert_eq!(locks.rows_of(1), vec![2, 8]);
}

#[test]
fn test_lock_list_same_handle_relock_is_noop() {
    let mut locks = LockList::new();
    locks.insert(3, 1).unwrap();
    locks.insert(3, 1).unwrap();
    assert_eq!(locks.rows_of(1), vec![3]);
}

#[test]
fn test_lock_list_other_handle_rejected() {
    let mut locks = LockList::new();
    locks.insert(3, 1).unwrap();
    assert!(locks.insert(3, 2).is_err());
    assert!(locks.remove(3, 2).is_err());
}

#[test]
fn test_lock_list_remove_unheld_row_is_noop() {
    let mut locks = LockList::new();
    assert!(locks.remove(9, 1).is_ok());
}

#[test]
fn test_header_guard_lock_unlock_roundtrip() {
    let file = tempfile().unwrap();
    header_guard(&file, Mode::Bits64, true).unwrap();
    header_guard_unlock(&file, Mode::Bits64).unwrap();
}

#[test]
fn test_row_lock_unlock_roundtrip() {
    let file = tempfile().unwrap();
    row_lock(&file, Mode::Bits64, 42, false).unwrap();
    row_unlock(&file, Mode::Bits64, 42).unwrap();
}

#[test]
fn test_offsets_scale_with_mode() {
    assert!(row_base(Mode::Bits64) > row_base(Mode::Bits32));
    assert!(file_open_offset(Mode::Bits64) > file_open_offset(Mode::Bits32));
    assert_eq!(row_base(Mode::Bits32), 0x4000_0000);
    assert_eq!(file_open_offset(Mode::Bits32), 0x7fff_ffff);
}
