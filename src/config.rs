//! Filesystem constants and the compiled-in user table.

use serde::{Deserialize, Serialize};

/// Size of a data block in bytes.
pub const BLOCK_SIZE: usize = 1024;
/// Total number of blocks on the simulated disk.
pub const TOTAL_BLOCKS: u32 = 10240;
/// Total number of inodes.
pub const INODE_COUNT: u32 = 1024;
/// Size of a grouped free-list cache/group, a la the Unix V7 allocator.
pub const NICFREE: usize = 50;
/// Inode and block ids below this are reserved: 0 is root, 1 is `/home`.
pub const RESERVED: u32 = 10;

/// Default path to the on-disk image.
pub const DEFAULT_DISK_PATH: &str = "./disk/disk.img";

/// The uid of the administrator account.
pub const ADMIN_UID: u32 = 0;

/// An entry in the compiled-in user table.
///
/// Unlike `utils::user::User`, the password here is stored pre-hashed
/// (Argon2, see [`crate::user`]) rather than plaintext, since the table is
/// baked into the binary rather than read from `/etc/passwd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: u32,
    pub username: String,
    /// Argon2 PHC-format password hash.
    pub password_hash: String,
}

impl UserRecord {
    /// Returns this user's home directory path.
    pub fn home(&self) -> String {
        format!("/home/{}", self.username)
    }
}

/// Returns the compiled-in user table, matching the eight accounts used by
/// the original system (`admin`, `ming`, `lugod`, `xman`, `mamba`, `neu`,
/// `cse`, `2203`), each with a password equal to its username.
pub fn default_users() -> Vec<UserRecord> {
    [
        (0, "admin"),
        (1, "ming"),
        (2, "lugod"),
        (3, "xman"),
        (4, "mamba"),
        (5, "neu"),
        (6, "cse"),
        (7, "2203"),
    ]
    .into_iter()
    .map(|(uid, name)| UserRecord {
        uid,
        username: name.to_string(),
        password_hash: crate::user::hash_password(name).expect("hashing a built-in password"),
    })
    .collect()
}
