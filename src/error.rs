//! Error taxonomy for the filesystem engine.

use std::fmt;

/// Every failure mode the engine can report, one variant per distinct user message.
#[derive(Debug)]
pub enum Error {
    /// An operation that needs a principal was attempted with none logged in.
    NotLoggedIn,
    /// A path segment could not be found.
    PathNotFound(String),
    /// A path segment that should have been a directory wasn't.
    NotADirectory(String),
    /// An entry already exists where one was about to be created.
    AlreadyExists(String),
    /// The current principal lacks the required permission bit.
    PermissionDenied,
    /// The target inode is locked by an open descriptor.
    InUse(String),
    /// Recursive delete was required but not requested.
    DirNotEmpty(String),
    /// No open-file entry exists for the given descriptor.
    InvalidFd(i64),
    /// An open mode string was not one of `r`, `w`, `rw`, `a`, `ra`.
    InvalidMode(String),
    /// The descriptor's open mode doesn't permit the attempted operation.
    WrongModeForOp,
    /// `seek` computed a negative offset, or a pure-read seek went past EOF.
    InvalidOffset,
    /// `chmod` argument didn't parse as an octal in `[0, 0o777]`.
    InvalidPerms(String),
    /// `chown` target username isn't in the user table.
    UserNotFound(String),
    /// Reserved for block-allocator exhaustion reported outside the normal
    /// allocate path; the allocator itself reports exhaustion as `DiskFull`,
    /// so this variant is currently never constructed.
    NoFreeBlocks,
    /// No free inodes remain.
    NoFreeInodes,
    /// `allocate_block` found the free-block cache empty (`s_nfree == 0`).
    DiskFull,
    /// A free-list group-descriptor block held malformed data.
    CorruptFreeList,
    /// Reading, writing, or (de)serializing the image file failed.
    Io(String),
    /// Aggregated errors from a recursive operation that partially failed.
    Multiple(Vec<Error>),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoggedIn => write!(f, "not logged in"),
            Self::PathNotFound(p) => write!(f, "path not found: {p}"),
            Self::NotADirectory(p) => write!(f, "not a directory: {p}"),
            Self::AlreadyExists(p) => write!(f, "already exists: {p}"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::InUse(p) => write!(f, "{p} is in use. Close it and try again"),
            Self::DirNotEmpty(p) => {
                write!(f, "directory {p} is not empty; use -r to delete recursively")
            }
            Self::InvalidFd(fd) => write!(f, "invalid file descriptor {fd}"),
            Self::InvalidMode(m) => write!(f, "{m} is not a valid open mode"),
            Self::WrongModeForOp => write!(f, "file descriptor opened in incompatible mode"),
            Self::InvalidOffset => write!(f, "invalid seek offset"),
            Self::InvalidPerms(p) => {
                write!(f, "invalid permission format '{p}'. Use octal (e.g., '755')")
            }
            Self::UserNotFound(u) => write!(f, "user not found: {u}"),
            Self::NoFreeBlocks => write!(f, "no free blocks available"),
            Self::NoFreeInodes => write!(f, "no free inodes available"),
            Self::DiskFull => write!(f, "disk full"),
            Self::CorruptFreeList => write!(f, "free block list is corrupt"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Multiple(errs) => {
                let msgs: Vec<String> = errs.iter().map(ToString::to_string).collect();
                write!(f, "{}", msgs.join("\n"))
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used throughout the engine.
pub type FsResult<T> = Result<T, Error>;
