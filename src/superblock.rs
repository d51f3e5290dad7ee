//! Superblock: inode free list and the grouped free-block allocator.
//!
//! The block allocator keeps an in-memory cache of up to [`NICFREE`] free
//! block ids. Popping the last cached id empties the cache; that id's stored
//! payload (if any) is read back as a [`DataBlock::FreeListGroup`] describing
//! the next batch, refilling the cache. Pushing past `NICFREE` entries
//! flushes the current cache into the releasing block as a group descriptor,
//! so the chain is rebuilt one link at a time. Block id 0 is a sentinel and
//! is never handed out.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::DataBlock;
use crate::config::NICFREE;
use crate::error::{Error, FsResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Superblock {
    /// Identifies one formatted image, independent of its on-disk path.
    pub filesystem_id: Uuid,
    pub total_blocks: u32,
    pub inode_count: u32,
    free_blocks: Vec<u32>,
    free_inodes: Vec<u32>,
}

impl Superblock {
    pub fn new(total_blocks: u32, inode_count: u32) -> Self {
        Self {
            filesystem_id: Uuid::new_v4(),
            total_blocks,
            inode_count,
            free_blocks: Vec::new(),
            free_inodes: Vec::new(),
        }
    }

    /// Builds the free lists at format time: every inode from `reserved_inodes`
    /// up, and every block from `total_blocks - 1` down to `reserved_blocks`,
    /// pushed through the ordinary release path so the on-disk chain comes
    /// out exactly as it would from ordinary use.
    pub fn format(
        &mut self,
        reserved_blocks: u32,
        reserved_inodes: u32,
        data_blocks: &mut HashMap<u32, DataBlock>,
    ) {
        self.free_inodes.clear();
        for inode in (reserved_inodes..self.inode_count).rev() {
            self.free_inodes.push(inode);
        }
        self.free_blocks.clear();
        for blk in (reserved_blocks..self.total_blocks).rev() {
            self.free_block(blk, data_blocks);
        }
    }

    pub fn allocate_inode(&mut self) -> FsResult<u32> {
        self.free_inodes.pop().ok_or(Error::NoFreeInodes)
    }

    pub fn free_inode(&mut self, id: u32) {
        self.free_inodes.push(id);
    }

    pub fn allocate_block(&mut self, data_blocks: &mut HashMap<u32, DataBlock>) -> FsResult<u32> {
        let blk = self.free_blocks.pop().ok_or(Error::DiskFull)?;
        if blk == 0 {
            return Err(Error::CorruptFreeList);
        }
        if self.free_blocks.is_empty() {
            if let Some(group) = data_blocks.remove(&blk) {
                let refill = group
                    .as_free_list_group(NICFREE)
                    .ok_or(Error::CorruptFreeList)?
                    .to_vec();
                self.free_blocks = refill;
            }
            // No stored group descriptor at `blk` means this was the last
            // link in the chain: the list is now genuinely exhausted.
        }
        Ok(blk)
    }

    pub fn free_block(&mut self, id: u32, data_blocks: &mut HashMap<u32, DataBlock>) {
        if self.free_blocks.len() >= NICFREE {
            let mut group = Vec::with_capacity(NICFREE + 1);
            group.push(self.free_blocks.len() as u32);
            group.extend_from_slice(&self.free_blocks);
            data_blocks.insert(id, DataBlock::FreeListGroup(group));
            self.free_blocks.clear();
        }
        self.free_blocks.push(id);
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }

    pub fn free_inode_count(&self) -> usize {
        self.free_inodes.len()
    }
}
