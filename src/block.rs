//! The data block payload: a tagged variant instead of the duck-typed
//! `bytes | dict | list` the original system relied on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payload stored at a single block id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataBlock {
    /// Raw file data.
    Bytes(Vec<u8>),
    /// A directory's `name -> inode id` mapping. Must contain `"."` and `".."`.
    Directory(HashMap<String, u32>),
    /// A grouped free-list chain block: `[count, blk1, .., blk_count]`.
    FreeListGroup(Vec<u32>),
}

impl DataBlock {
    /// Creates a new directory block for `self_inode` inside `parent_inode`.
    pub fn new_directory(self_inode: u32, parent_inode: u32) -> Self {
        let mut map = HashMap::new();
        map.insert(".".to_string(), self_inode);
        map.insert("..".to_string(), parent_inode);
        Self::Directory(map)
    }

    /// Borrows this block as a directory map, or `None` if it isn't one.
    pub fn as_directory(&self) -> Option<&HashMap<String, u32>> {
        match self {
            Self::Directory(m) => Some(m),
            _ => None,
        }
    }

    /// Mutably borrows this block as a directory map, or `None` if it isn't one.
    pub fn as_directory_mut(&mut self) -> Option<&mut HashMap<String, u32>> {
        match self {
            Self::Directory(m) => Some(m),
            _ => None,
        }
    }

    /// Borrows this block as raw bytes, or `None` if it isn't one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Mutably borrows this block as raw bytes, or `None` if it isn't one.
    pub fn as_bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Parses this block as a free-list group descriptor `[count, blk1, ..]`.
    ///
    /// Returns `None` if the payload isn't a well-formed group (wrong shape,
    /// or the declared count exceeds `NICFREE`); the allocator treats that as
    /// chain corruption.
    pub fn as_free_list_group(&self, nicfree: usize) -> Option<&[u32]> {
        match self {
            Self::FreeListGroup(v) if !v.is_empty() => {
                let count = v[0] as usize;
                if count > nicfree || v.len() < count + 1 {
                    None
                } else {
                    Some(&v[1..=count])
                }
            }
            _ => None,
        }
    }
}
