//! Whole-image load/save. The image is a `(Superblock, InodeTable,
//! DataBlocks)` triple serialized as JSON; any structured format that
//! round-trips the in-memory model satisfies the contract, and this pairing
//! mirrors the rest of the Maestro family's own `serde`/`serde_json` use.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::block::DataBlock;
use crate::error::FsResult;
use crate::inode::Inode;
use crate::superblock::Superblock;

#[derive(Serialize, Deserialize)]
struct Image {
    superblock: Superblock,
    inodes: HashMap<u32, Inode>,
    data_blocks: HashMap<u32, DataBlock>,
}

/// Loads the image at `path`. Returns `Ok(None)` if no image exists yet.
pub fn load(path: &Path) -> FsResult<Option<(Superblock, HashMap<u32, Inode>, HashMap<u32, DataBlock>)>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read(path)?;
    let image: Image = serde_json::from_slice(&raw)?;
    Ok(Some((image.superblock, image.inodes, image.data_blocks)))
}

/// Writes the whole image to `path`, creating its parent directory on first
/// use.
pub fn save(
    superblock: &Superblock,
    inodes: &HashMap<u32, Inode>,
    data_blocks: &HashMap<u32, DataBlock>,
    path: &Path,
) -> FsResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let image = Image {
        superblock: superblock.clone(),
        inodes: inodes.clone(),
        data_blocks: data_blocks.clone(),
    };
    let raw = serde_json::to_vec(&image)?;
    fs::write(path, raw)?;
    Ok(())
}
