//! Write-ahead transaction log (spec.md §4.8): record framing in
//! [`record`], append/rollback/recovery in [`log`].

pub mod log;
pub mod record;

pub use log::{recover, Recover, Transaction, Undo, WalFile};
pub use record::{Opcode, Record, RecordHeader};
