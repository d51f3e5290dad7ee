//! A simulated single-user Unix-like filesystem engine: a grouped free-list
//! block allocator, inode/data-block model, path resolution, permission
//! enforcement, and open-file descriptor state, all persisted as a single
//! on-disk image.

pub mod block;
pub mod config;
pub mod error;
pub mod fs;
pub mod inode;
pub mod path;
pub mod perm;
pub mod persistence;
pub mod prompt;
pub mod superblock;
pub mod user;

pub use error::{Error, FsResult};
pub use fs::FileSystem;
