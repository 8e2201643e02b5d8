//! Shared node trailer, written at the tail of every fixed-size block in
//! the index file (spec.md §3 "B+tree node").
//!
//! Layout: `{marker=0x7f (64-bit mode only), kind, level}`. `kind` is
//! `-1` for a data-row freelist node, `-2` for an index-node freelist
//! node, `0x7e` for a key-descriptor node, and `0` for an ordinary
//! B+tree node (in which case `level` disambiguates leaf vs internal:
//! `0` is a leaf, `>0` is internal).

use crate::dict::Mode;
use crate::{Error, Result};

pub const MARKER: u8 = 0x7f;

pub const KIND_DATA_FREELIST: i8 = -1;
pub const KIND_INDEX_FREELIST: i8 = -2;
pub const KIND_KEYDESC: i8 = 0x7e;
pub const KIND_TAIL: i8 = 0x7c;
pub const KIND_BTREE: i8 = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Trailer {
    pub kind: i8,
    pub level: u8,
}

impl Trailer {
    pub fn btree(level: u8) -> Trailer {
        Trailer {
            kind: KIND_BTREE,
            level,
        }
    }

    pub fn freelist(is_data: bool) -> Trailer {
        Trailer {
            kind: if is_data {
                KIND_DATA_FREELIST
            } else {
                KIND_INDEX_FREELIST
            },
            level: 0,
        }
    }

    pub fn keydesc() -> Trailer {
        Trailer {
            kind: KIND_KEYDESC,
            level: 0,
        }
    }

    pub fn tail() -> Trailer {
        Trailer {
            kind: KIND_TAIL,
            level: 0,
        }
    }

    pub fn size(mode: Mode) -> usize {
        match mode {
            Mode::Bits64 => 3,
            Mode::Bits32 => 2,
        }
    }

    /// Write the trailer into the last bytes of `node`, sized to `node.len()`.
    pub fn write_into(&self, node: &mut [u8], mode: Mode) {
        let n = node.len();
        match mode {
            Mode::Bits64 => {
                node[n - 3] = MARKER;
                node[n - 2] = self.kind as u8;
                node[n - 1] = self.level;
            }
            Mode::Bits32 => {
                node[n - 2] = self.kind as u8;
                node[n - 1] = self.level;
            }
        }
    }

    pub fn read_from(node: &[u8], mode: Mode) -> Result<Trailer> {
        let n = node.len();
        match mode {
            Mode::Bits64 => {
                if node[n - 3] != MARKER {
                    return err_at!(BadFile, msg: "missing 0x7f marker in 64-bit trailer")?;
                }
                Ok(Trailer {
                    kind: node[n - 2] as i8,
                    level: node[n - 1],
                })
            }
            Mode::Bits32 => Ok(Trailer {
                kind: node[n - 2] as i8,
                level: node[n - 1],
            }),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == KIND_BTREE && self.level == 0
    }
}

#[cfg(test)]
#[path = "trailer_test.rs"]
mod trailer_test;
