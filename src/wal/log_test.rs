use super::*;
use tempfile::tempfile;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Call {
    Insert(u32, u64),
    Update(u32, u64, Vec<u8>),
    Delete(u32, u64, Vec<u8>),
    FileOpen(u32),
    FileClose(u32, String),
    Free(u32, u64),
}

#[derive(Default)]
struct MockSink {
    calls: Vec<Call>,
}

impl Undo for MockSink {
    fn undo_insert(&mut self, handle: u32, row: u64) -> Result<()> {
        self.calls.push(Call::Insert(handle, row));
        Ok(())
    }
    fn undo_update(&mut self, handle: u32, row: u64, old_image: &[u8]) -> Result<()> {
        self.calls.push(Call::Update(handle, row, old_image.to_vec()));
        Ok(())
    }
    fn undo_delete(&mut self, handle: u32, row: u64, old_image: &[u8]) -> Result<()> {
        self.calls.push(Call::Delete(handle, row, old_image.to_vec()));
        Ok(())
    }
    fn undo_file_open(&mut self, handle: u32) -> Result<()> {
        self.calls.push(Call::FileOpen(handle));
        Ok(())
    }
    fn undo_file_close(&mut self, handle: u32, filename: &str) -> Result<()> {
        self.calls.push(Call::FileClose(handle, filename.to_string()));
        Ok(())
    }
}

impl Recover for MockSink {
    fn on_commit_row_free(&mut self, handle: u32, row: u64) -> Result<()> {
        self.calls.push(Call::Free(handle, row));
        Ok(())
    }
}

#[test]
fn test_append_chains_records() {
    let raw = tempfile().unwrap();
    let mut wal = WalFile::create(raw.try_clone().unwrap());
    assert_eq!(wal.tail(), (0, 0));

    let (off1, len1) = wal.append(Opcode::FileOpen, 1, 1, b"a.dat").unwrap();
    let (off2, len2) = wal.append(Opcode::Insert, 1, 1, &encode_row_payload(1, 5)).unwrap();
    assert_eq!(wal.tail(), (off2, len2));

    let mut raw2 = raw.try_clone().unwrap();
    let rec2 = read_record_core(&mut raw2, off2, len2).unwrap();
    assert_eq!(rec2.header.opcode, Opcode::Insert);
    assert_eq!(rec2.header.prev_offset, off1);
    assert_eq!(rec2.header.prev_length, len1);
}

#[test]
fn test_transaction_lazy_begin_then_insert() {
    let raw = tempfile().unwrap();
    let mut wal = WalFile::create(raw.try_clone().unwrap());
    let mut txn = Transaction::begin(10, 1);
    assert!(txn.is_active());
    assert_eq!(wal.tail(), (0, 0));

    txn.log_insert(&mut wal, 1, 7).unwrap();
    let (off, len) = wal.tail();
    let mut raw2 = raw.try_clone().unwrap();
    let rec = read_record_core(&mut raw2, off, len).unwrap();
    assert_eq!(rec.header.opcode, Opcode::Insert);

    let begin = read_record_core(&mut raw2, rec.header.prev_offset, rec.header.prev_length).unwrap();
    assert_eq!(begin.header.opcode, Opcode::Begin);
}

#[test]
fn test_transaction_commit_writes_commit_record() {
    let raw = tempfile().unwrap();
    let mut wal = WalFile::create(raw.try_clone().unwrap());
    let mut txn = Transaction::begin(11, 1);
    txn.log_insert(&mut wal, 1, 7).unwrap();
    txn.commit(&mut wal).unwrap();

    let (off, len) = wal.tail();
    let mut raw2 = raw.try_clone().unwrap();
    let rec = read_record_core(&mut raw2, off, len).unwrap();
    assert_eq!(rec.header.opcode, Opcode::Commit);
    assert!(!txn.is_active());
}

#[test]
fn test_transaction_rollback_invokes_undo_in_reverse_order() {
    let raw = tempfile().unwrap();
    let mut wal = WalFile::create(raw.try_clone().unwrap());
    let mut txn = Transaction::begin(12, 1);
    txn.log_insert(&mut wal, 1, 10).unwrap();
    txn.log_update(&mut wal, 1, 10, b"old-image").unwrap();

    let mut sink = MockSink::default();
    txn.rollback(&mut wal, &mut sink).unwrap();

    assert_eq!(
        sink.calls,
        vec![Call::Update(1, 10, b"old-image".to_vec()), Call::Insert(1, 10)]
    );
    assert!(!txn.is_active());

    let (off, len) = wal.tail();
    let mut raw2 = raw.try_clone().unwrap();
    let rec = read_record_core(&mut raw2, off, len).unwrap();
    assert_eq!(rec.header.opcode, Opcode::Rollback);
}

#[test]
fn test_recover_rolls_back_orphaned_transaction() {
    let raw = tempfile().unwrap();
    {
        let mut wal = WalFile::create(raw.try_clone().unwrap());
        let mut txn = Transaction::begin(20, 1);
        txn.log_insert(&mut wal, 2, 55).unwrap();
        // no commit: orphaned
    }

    let mut sink = MockSink::default();
    let mut recover_file = raw.try_clone().unwrap();
    recover(&mut recover_file, &mut sink).unwrap();
    assert_eq!(sink.calls, vec![Call::Insert(2, 55)]);
}

#[test]
fn test_recover_defers_delete_free_until_commit() {
    let raw = tempfile().unwrap();
    {
        let mut wal = WalFile::create(raw.try_clone().unwrap());
        let mut txn = Transaction::begin(21, 1);
        txn.log_delete(&mut wal, 9, 99, b"old").unwrap();
        txn.commit(&mut wal).unwrap();
    }

    let mut sink = MockSink::default();
    let mut recover_file = raw.try_clone().unwrap();
    recover(&mut recover_file, &mut sink).unwrap();
    assert_eq!(sink.calls, vec![Call::Free(9, 99)]);
}

#[test]
fn test_walfile_open_recovers_tail() {
    let raw = tempfile().unwrap();
    let (off2, len2) = {
        let mut wal = WalFile::create(raw.try_clone().unwrap());
        wal.append(Opcode::FileOpen, 1, 1, b"a.dat").unwrap();
        wal.append(Opcode::FileClose, 1, 1, b"a.dat").unwrap()
    };

    let reopened = WalFile::open(raw.try_clone().unwrap()).unwrap();
    assert_eq!(reopened.tail(), (off2, len2));
}
