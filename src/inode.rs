//! Inode records.

use serde::{Deserialize, Serialize};

/// Metadata record for a file or directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inode {
    pub id: u32,
    pub is_dir: bool,
    pub owner: u32,
    /// 9-bit octal `rwxrwxrwx`. The middle (group) triad is stored but never
    /// tested distinctly; non-owners are checked against the low (other)
    /// triad.
    pub perms: u16,
    /// Size in bytes. Undefined (reported blank) for directories.
    pub size: u64,
    /// Ordered block ids holding this inode's contents. For directories,
    /// `blocks[0]` is the canonical directory block.
    pub blocks: Vec<u32>,
    /// Number of directory entries referencing this inode. Reaching zero
    /// releases the inode and its blocks.
    pub link_count: u32,
    /// Set while any open descriptor references this inode.
    pub lock: bool,
}

impl Inode {
    /// Creates a new file inode: `link_count` starts at 1, no blocks.
    pub fn new_file(id: u32, owner: u32, perms: u16) -> Self {
        Self {
            id,
            is_dir: false,
            owner,
            perms,
            size: 0,
            blocks: Vec::new(),
            link_count: 1,
            lock: false,
        }
    }

    /// Creates a new directory inode: `link_count` starts at 2 (self + parent entry).
    pub fn new_dir(id: u32, owner: u32, perms: u16) -> Self {
        Self {
            id,
            is_dir: true,
            owner,
            perms,
            size: 0,
            blocks: Vec::new(),
            link_count: 2,
            lock: false,
        }
    }

    /// Returns the owner or other permission octet for the given uid.
    pub fn perm_octet_for(&self, uid: u32) -> u16 {
        if uid == self.owner {
            (self.perms >> 6) & 0o7
        } else {
            self.perms & 0o7
        }
    }

    /// Renders the `drwxrwxrwx`-style permission string for `ls`.
    pub fn perm_string(&self) -> String {
        let mut s = String::with_capacity(10);
        s.push(if self.is_dir { 'd' } else { '-' });
        for shift in [6, 3, 0] {
            let triad = (self.perms >> shift) & 0o7;
            s.push(if triad & 0o4 != 0 { 'r' } else { '-' });
            s.push(if triad & 0o2 != 0 { 'w' } else { '-' });
            s.push(if triad & 0o1 != 0 { 'x' } else { '-' });
        }
        s
    }
}
