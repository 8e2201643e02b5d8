//! B+tree index implementation (spec.md §4.4).
//!
//! `node` encodes/decodes the on-disk entry format; `mirror` is the
//! per-handle in-memory arena that `search`, `insert`, and `delete` all
//! operate on.

pub mod delete;
pub mod insert;
pub mod mirror;
pub mod node;
pub mod search;

pub use delete::{delete, DeleteOutcome};
pub use insert::{insert, InsertOutcome};
pub use mirror::{Mirror, MirrorNode, NodeId};
pub use node::{Entry, NodeImage};
pub use search::{advance, search as search_tree, Cursor, Outcome, SearchMode};
