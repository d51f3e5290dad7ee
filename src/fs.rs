//! The `FileSystem` handle: session state (principal, current directory,
//! sudo flag, open descriptors) plus every directory and file-I/O operation.
//! Each mutating call ends by persisting the whole image.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, info};

use crate::block::DataBlock;
use crate::config::{default_users, ADMIN_UID, BLOCK_SIZE, INODE_COUNT, RESERVED, TOTAL_BLOCKS};
use crate::error::{Error, FsResult};
use crate::inode::Inode;
use crate::path;
use crate::perm::{self, Access};
use crate::superblock::Superblock;
use crate::user::{self, Principal};

/// An open file's mode, parsed from `r`/`w`/`rw`/`a`/`ra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    R,
    W,
    RW,
    A,
    RA,
}

impl OpenMode {
    pub fn parse(s: &str) -> FsResult<Self> {
        match s {
            "r" => Ok(Self::R),
            "w" => Ok(Self::W),
            "rw" => Ok(Self::RW),
            "a" => Ok(Self::A),
            "ra" => Ok(Self::RA),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }

    fn can_read(self) -> bool {
        matches!(self, Self::R | Self::RW | Self::RA)
    }

    fn can_write(self) -> bool {
        matches!(self, Self::W | Self::RW | Self::A | Self::RA)
    }

    fn is_append(self) -> bool {
        matches!(self, Self::A | Self::RA)
    }
}

/// Reference point for [`FileSystem::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    pub fn parse(s: &str) -> FsResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SET" => Ok(Self::Set),
            "CUR" => Ok(Self::Cur),
            "END" => Ok(Self::End),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenFile {
    inode: u32,
    mode: OpenMode,
    offset: u64,
}

/// One rendered row of an `ls` listing.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub perms: String,
    pub link_count: u32,
    pub owner: String,
    pub size: Option<u64>,
    pub name: String,
}

/// Formats a listing the way `ls` presents it: a header line, then one line
/// per entry.
pub fn render_listing(entries: &[ListingEntry]) -> String {
    let mut out = String::from("perms      links owner      size  name\n");
    for e in entries {
        let size = e.size.map(|s| s.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{:<10} {:<5} {:<10} {:>6}  {}\n",
            e.perms, e.link_count, e.owner, size, e.name
        ));
    }
    out
}

pub struct FileSystem {
    superblock: Superblock,
    inodes: HashMap<u32, Inode>,
    data_blocks: HashMap<u32, DataBlock>,
    users: Vec<crate::config::UserRecord>,
    principal: Option<Principal>,
    cwd: u32,
    is_sudo: bool,
    open_files: HashMap<i64, OpenFile>,
    disk_path: PathBuf,
}

impl FileSystem {
    /// Loads `disk_path` if it exists, otherwise formats a fresh image there.
    pub fn open_or_format(disk_path: impl Into<PathBuf>) -> FsResult<Self> {
        let disk_path = disk_path.into();
        let users = default_users();
        let mut fs = Self {
            superblock: Superblock::new(TOTAL_BLOCKS, INODE_COUNT),
            inodes: HashMap::new(),
            data_blocks: HashMap::new(),
            users,
            principal: None,
            cwd: 0,
            is_sudo: false,
            open_files: HashMap::new(),
            disk_path,
        };
        match crate::persistence::load(&fs.disk_path)? {
            Some((superblock, inodes, data_blocks)) => {
                fs.superblock = superblock;
                fs.inodes = inodes;
                fs.data_blocks = data_blocks;
                info!("loaded image from {}", fs.disk_path.display());
            }
            None => {
                fs.format()?;
            }
        }
        Ok(fs)
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_sudo(&self) -> bool {
        self.is_sudo
    }

    fn persist(&self) -> FsResult<()> {
        crate::persistence::save(&self.superblock, &self.inodes, &self.data_blocks, &self.disk_path)
    }

    fn require_principal(&self) -> FsResult<&Principal> {
        self.principal.as_ref().ok_or(Error::NotLoggedIn)
    }

    // ---- path resolution -------------------------------------------------

    fn resolve(&self, path: &str) -> FsResult<u32> {
        let principal = self.require_principal()?;
        let (absolute, segments) = path::split(path, &principal.username);
        let mut current = if absolute { 0 } else { self.cwd };
        for seg in &segments {
            match seg.as_str() {
                "." => {}
                ".." => {
                    let dir = self.dir_block(current, path)?;
                    current = *dir.get("..").unwrap_or(&current);
                }
                name => {
                    let dir = self.dir_block(current, path)?;
                    current = *dir
                        .get(name)
                        .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
                }
            }
        }
        Ok(current)
    }

    fn resolve_parent_and_name(&self, path: &str) -> FsResult<(u32, String)> {
        let (parent_path, name) = path::split_parent_name(path);
        let parent_path = if parent_path.is_empty() { "." } else { parent_path };
        let parent_id = self.resolve(parent_path)?;
        Ok((parent_id, name.to_string()))
    }

    fn dir_block_id(&self, inode_id: u32, ctx: &str) -> FsResult<u32> {
        let inode = self
            .inodes
            .get(&inode_id)
            .ok_or_else(|| Error::PathNotFound(ctx.to_string()))?;
        if !inode.is_dir {
            return Err(Error::NotADirectory(ctx.to_string()));
        }
        inode.blocks.first().copied().ok_or(Error::CorruptFreeList)
    }

    fn dir_block(&self, inode_id: u32, ctx: &str) -> FsResult<&HashMap<String, u32>> {
        let block_id = self.dir_block_id(inode_id, ctx)?;
        self.data_blocks
            .get(&block_id)
            .and_then(DataBlock::as_directory)
            .ok_or(Error::CorruptFreeList)
    }

    fn dir_block_mut(&mut self, inode_id: u32, ctx: &str) -> FsResult<&mut HashMap<String, u32>> {
        let block_id = self.dir_block_id(inode_id, ctx)?;
        self.data_blocks
            .get_mut(&block_id)
            .and_then(DataBlock::as_directory_mut)
            .ok_or(Error::CorruptFreeList)
    }

    fn check_access(&self, inode_id: u32, access: Access) -> FsResult<()> {
        let inode = self.inodes.get(&inode_id).ok_or(Error::CorruptFreeList)?;
        if perm::check(self.principal.as_ref(), self.is_sudo, inode, access) {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    fn username_for(&self, uid: u32) -> String {
        self.users
            .iter()
            .find(|u| u.uid == uid)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| uid.to_string())
    }

    // ---- session -----------------------------------------------------

    pub fn login(&mut self, username: &str, password: &str) -> FsResult<()> {
        let user = user::authenticate(&self.users, username, password).ok_or(Error::PermissionDenied)?;
        self.principal = Some(Principal::from(user));
        self.cwd = 0;
        self.cwd = self.resolve(&format!("/home/{username}"))?;
        info!("login {username}");
        Ok(())
    }

    pub fn logout(&mut self) {
        if let Some(p) = &self.principal {
            info!("logout {}", p.username);
        }
        self.principal = None;
        self.cwd = 0;
        self.is_sudo = false;
        self.open_files.clear();
    }

    /// Elevates privileges for the duration of `f`, verifying `admin_password`
    /// first. Clears the elevation unconditionally afterward, even on error.
    pub fn with_sudo<F, T>(&mut self, admin_password: &str, f: F) -> FsResult<T>
    where
        F: FnOnce(&mut Self) -> FsResult<T>,
    {
        let admin_hash = self
            .users
            .iter()
            .find(|u| u.uid == ADMIN_UID)
            .map(|u| u.password_hash.clone())
            .ok_or_else(|| Error::UserNotFound("admin".to_string()))?;
        if !user::check_password(&admin_hash, admin_password) {
            return Err(Error::PermissionDenied);
        }
        self.is_sudo = true;
        let result = f(self);
        self.is_sudo = false;
        result
    }

    /// Rebuilds the image from scratch: root (inode 0, block 0), `/home`
    /// (inode 1, block 1), the free lists over `[RESERVED, TOTAL_BLOCKS)`,
    /// and a home directory per compiled-in user, owned by that user.
    pub fn format(&mut self) -> FsResult<()> {
        self.superblock = Superblock::new(TOTAL_BLOCKS, INODE_COUNT);
        self.inodes.clear();
        self.data_blocks.clear();
        self.open_files.clear();
        self.principal = None;
        self.is_sudo = false;
        self.cwd = 0;

        let mut root = Inode::new_dir(0, ADMIN_UID, 0o755);
        root.blocks.push(0);
        self.inodes.insert(0, root);
        self.data_blocks.insert(0, DataBlock::new_directory(0, 0));

        let mut home = Inode::new_dir(1, ADMIN_UID, 0o755);
        home.blocks.push(1);
        self.inodes.insert(1, home);
        self.data_blocks.insert(1, DataBlock::new_directory(1, 0));
        self.dir_block_mut(0, "/")?.insert("home".to_string(), 1);

        self.superblock.format(RESERVED, RESERVED, &mut self.data_blocks);

        for user in self.users.clone() {
            let inode_id = self.superblock.allocate_inode()?;
            let block_id = self.superblock.allocate_block(&mut self.data_blocks)?;
            let mut inode = Inode::new_dir(inode_id, user.uid, 0o755);
            inode.blocks.push(block_id);
            self.data_blocks.insert(block_id, DataBlock::new_directory(inode_id, 1));
            self.inodes.insert(inode_id, inode);
            self.dir_block_mut(1, "/home")?.insert(user.username.clone(), inode_id);
        }

        info!("format complete");
        self.persist()
    }

    // ---- directory operations -----------------------------------------

    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        let (parent_id, name) = self.resolve_parent_and_name(path)?;
        self.check_access(parent_id, Access::Write)?;
        if self.dir_block(parent_id, path)?.contains_key(&name) {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        let owner = self.require_principal()?.uid;
        let inode_id = self.superblock.allocate_inode()?;
        let block_id = self.superblock.allocate_block(&mut self.data_blocks)?;
        let mut inode = Inode::new_dir(inode_id, owner, 0o755);
        inode.blocks.push(block_id);
        self.data_blocks.insert(block_id, DataBlock::new_directory(inode_id, parent_id));
        self.inodes.insert(inode_id, inode);
        self.dir_block_mut(parent_id, path)?.insert(name, inode_id);
        debug!("mkdir {path} -> inode {inode_id}");
        self.persist()
    }

    pub fn create(&mut self, path: &str) -> FsResult<()> {
        let (parent_id, name) = self.resolve_parent_and_name(path)?;
        self.check_access(parent_id, Access::Write)?;
        if self.dir_block(parent_id, path)?.contains_key(&name) {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        let owner = self.require_principal()?.uid;
        let inode_id = self.superblock.allocate_inode()?;
        self.inodes.insert(inode_id, Inode::new_file(inode_id, owner, 0o644));
        self.dir_block_mut(parent_id, path)?.insert(name, inode_id);
        debug!("create {path} -> inode {inode_id}");
        self.persist()
    }

    pub fn chdir(&mut self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        self.check_access(target, Access::Execute)?;
        if !self.inodes.get(&target).ok_or(Error::CorruptFreeList)?.is_dir {
            return Err(Error::NotADirectory(path.to_string()));
        }
        self.cwd = target;
        Ok(())
    }

    pub fn ls(&self, path: &str) -> FsResult<Vec<ListingEntry>> {
        let ctx = if path.is_empty() { "." } else { path };
        let target = if ctx == "." { self.cwd } else { self.resolve(path)? };
        self.check_access(target, Access::Read)?;
        let dir = self.dir_block(target, ctx)?;
        let mut entries: Vec<ListingEntry> = dir
            .iter()
            .filter(|(name, _)| name.as_str() != "." && name.as_str() != "..")
            .map(|(name, &inode_id)| {
                let inode = &self.inodes[&inode_id];
                ListingEntry {
                    perms: inode.perm_string(),
                    link_count: inode.link_count,
                    owner: self.username_for(inode.owner),
                    size: (!inode.is_dir).then_some(inode.size),
                    name: name.clone(),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn chmod(&mut self, path: &str, octal_str: &str) -> FsResult<()> {
        let perms = u16::from_str_radix(octal_str, 8)
            .ok()
            .filter(|&p| p <= 0o777)
            .ok_or_else(|| Error::InvalidPerms(octal_str.to_string()))?;
        let target = self.resolve(path)?;
        let uid = self.require_principal()?.uid;
        let owner = self.inodes.get(&target).ok_or(Error::CorruptFreeList)?.owner;
        if !(uid == owner || uid == ADMIN_UID || self.is_sudo) {
            return Err(Error::PermissionDenied);
        }
        self.inodes.get_mut(&target).ok_or(Error::CorruptFreeList)?.perms = perms;
        debug!("chmod {path} {octal_str}");
        self.persist()
    }

    pub fn chown(&mut self, path: &str, username: &str) -> FsResult<()> {
        let uid = self.require_principal()?.uid;
        if !(uid == ADMIN_UID || self.is_sudo) {
            return Err(Error::PermissionDenied);
        }
        let new_owner = self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.uid)
            .ok_or_else(|| Error::UserNotFound(username.to_string()))?;
        let target = self.resolve(path)?;
        self.inodes.get_mut(&target).ok_or(Error::CorruptFreeList)?.owner = new_owner;
        debug!("chown {path} {username}");
        self.persist()
    }

    /// Hard link only; refuses directories.
    pub fn ln(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let src_id = self.resolve(src)?;
        if self.inodes.get(&src_id).ok_or(Error::CorruptFreeList)?.is_dir {
            return Err(Error::PermissionDenied);
        }
        self.check_access(src_id, Access::Read)?;
        let (parent_id, name) = self.resolve_parent_and_name(dst)?;
        self.check_access(parent_id, Access::Write)?;
        if self.dir_block(parent_id, dst)?.contains_key(&name) {
            return Err(Error::AlreadyExists(dst.to_string()));
        }
        self.dir_block_mut(parent_id, dst)?.insert(name, src_id);
        self.inodes.get_mut(&src_id).ok_or(Error::CorruptFreeList)?.link_count += 1;
        debug!("ln {src} -> {dst}");
        self.persist()
    }

    pub fn find(&self, name: &str) -> Vec<String> {
        let mut results = Vec::new();
        self.find_rec(self.cwd, ".", name, &mut results);
        results
    }

    fn find_rec(&self, dir_id: u32, path_so_far: &str, name: &str, results: &mut Vec<String>) {
        if self.check_access(dir_id, Access::Read).is_err() {
            return;
        }
        let Ok(dir) = self.dir_block(dir_id, path_so_far) else {
            return;
        };
        for (entry_name, &entry_id) in dir {
            if entry_name == "." || entry_name == ".." {
                continue;
            }
            let entry_path = format!("{}/{}", path_so_far.trim_end_matches('/'), entry_name);
            if entry_name == name {
                results.push(entry_path.clone());
            }
            if self.inodes.get(&entry_id).map(|i| i.is_dir).unwrap_or(false) {
                self.find_rec(entry_id, &entry_path, name, results);
            }
        }
    }

    pub fn mv(&mut self, src: &str, dst: &str) -> FsResult<()> {
        let src_id = self.resolve(src)?;
        self.check_access(src_id, Access::Read)?;

        if let Ok(dst_id) = self.resolve(dst) {
            let is_dir = self.inodes.get(&dst_id).ok_or(Error::CorruptFreeList)?.is_dir;
            if is_dir {
                let (_, src_name) = self.resolve_parent_and_name(src)?;
                let dst_path = format!("{}/{}", dst.trim_end_matches('/'), src_name);
                return self.mv(src, &dst_path);
            }
            self.delete(dst, false)?;
        }

        let (src_parent_id, src_name) = self.resolve_parent_and_name(src)?;
        let (dst_parent_id, dst_name) = self.resolve_parent_and_name(dst)?;
        self.check_access(dst_parent_id, Access::Write)?;
        if self.dir_block(dst_parent_id, dst)?.contains_key(&dst_name) {
            return Err(Error::AlreadyExists(dst.to_string()));
        }

        self.dir_block_mut(src_parent_id, src)?.remove(&src_name);
        self.dir_block_mut(dst_parent_id, dst)?.insert(dst_name, src_id);

        if self.inodes.get(&src_id).map(|i| i.is_dir).unwrap_or(false) {
            if let Ok(block_id) = self.dir_block_id(src_id, src) {
                if let Some(map) = self.data_blocks.get_mut(&block_id).and_then(DataBlock::as_directory_mut) {
                    map.insert("..".to_string(), dst_parent_id);
                }
            }
        }
        debug!("mv {src} -> {dst}");
        self.persist()
    }

    pub fn cp(&mut self, src: &str, dst: &str, recursive: bool) -> FsResult<()> {
        let src_id = self.resolve(src)?;
        self.check_access(src_id, Access::Read)?;

        if let Ok(dst_id) = self.resolve(dst) {
            let is_dir = self.inodes.get(&dst_id).ok_or(Error::CorruptFreeList)?.is_dir;
            if is_dir {
                let (_, src_name) = self.resolve_parent_and_name(src)?;
                let dst_path = format!("{}/{}", dst.trim_end_matches('/'), src_name);
                return self.cp(src, &dst_path, recursive);
            }
            self.delete(dst, false)?;
        }

        let (dst_parent_id, dst_name) = self.resolve_parent_and_name(dst)?;
        self.check_access(dst_parent_id, Access::Write)?;
        if self.dir_block(dst_parent_id, dst)?.contains_key(&dst_name) {
            return Err(Error::AlreadyExists(dst.to_string()));
        }

        let owner = self.require_principal()?.uid;
        let src_inode = self.inodes.get(&src_id).ok_or(Error::CorruptFreeList)?.clone();
        if src_inode.is_dir && !recursive {
            return Err(Error::DirNotEmpty(src.to_string()));
        }

        let new_id = self.superblock.allocate_inode()?;
        let new_inode = if src_inode.is_dir {
            let new_block = self.superblock.allocate_block(&mut self.data_blocks)?;
            self.data_blocks.insert(new_block, DataBlock::new_directory(new_id, dst_parent_id));
            let mut inode = Inode::new_dir(new_id, owner, src_inode.perms);
            inode.blocks.push(new_block);
            inode
        } else {
            let mut inode = Inode::new_file(new_id, owner, src_inode.perms);
            for &block_id in &src_inode.blocks {
                let data = self
                    .data_blocks
                    .get(&block_id)
                    .and_then(DataBlock::as_bytes)
                    .ok_or(Error::CorruptFreeList)?
                    .to_vec();
                let new_block = self.superblock.allocate_block(&mut self.data_blocks)?;
                self.data_blocks.insert(new_block, DataBlock::Bytes(data));
                inode.blocks.push(new_block);
            }
            inode.size = src_inode.size;
            inode
        };
        self.inodes.insert(new_id, new_inode);
        self.dir_block_mut(dst_parent_id, dst)?.insert(dst_name, new_id);
        debug!("cp {src} -> {dst}");
        self.persist()?;

        if src_inode.is_dir {
            let children: Vec<String> = self
                .dir_block(src_id, src)?
                .keys()
                .filter(|n| n.as_str() != "." && n.as_str() != "..")
                .cloned()
                .collect();
            for name in children {
                let child_src = format!("{}/{}", src.trim_end_matches('/'), name);
                let child_dst = format!("{}/{}", dst.trim_end_matches('/'), name);
                self.cp(&child_src, &child_dst, recursive)?;
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, path: &str, recursive: bool) -> FsResult<()> {
        let (parent_id, name) = self.resolve_parent_and_name(path)?;
        self.check_access(parent_id, Access::Write)?;
        let target_id = *self
            .dir_block(parent_id, path)?
            .get(&name)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;

        let (is_dir, locked) = {
            let inode = self.inodes.get(&target_id).ok_or(Error::CorruptFreeList)?;
            (inode.is_dir, inode.lock)
        };
        if locked {
            return Err(Error::InUse(path.to_string()));
        }

        if is_dir {
            let children: Vec<String> = self
                .dir_block(target_id, path)?
                .keys()
                .filter(|n| n.as_str() != "." && n.as_str() != "..")
                .cloned()
                .collect();
            if !children.is_empty() {
                if !recursive {
                    return Err(Error::DirNotEmpty(path.to_string()));
                }
                let mut errors = Vec::new();
                for child in &children {
                    let child_path = format!("{}/{}", path.trim_end_matches('/'), child);
                    if let Err(e) = self.delete(&child_path, true) {
                        errors.push(e);
                    }
                }
                if !errors.is_empty() {
                    return Err(Error::Multiple(errors));
                }
            }
        }

        self.release_inode(target_id)?;
        self.dir_block_mut(parent_id, path)?.remove(&name);
        debug!("delete {path}");
        self.persist()
    }

    fn release_inode(&mut self, inode_id: u32) -> FsResult<()> {
        let reached_zero = {
            let inode = self.inodes.get_mut(&inode_id).ok_or(Error::CorruptFreeList)?;
            inode.link_count = inode.link_count.saturating_sub(1);
            inode.link_count == 0
        };
        if reached_zero {
            let blocks = self.inodes.get(&inode_id).ok_or(Error::CorruptFreeList)?.blocks.clone();
            for block_id in blocks {
                self.data_blocks.remove(&block_id);
                self.superblock.free_block(block_id, &mut self.data_blocks);
            }
            self.inodes.remove(&inode_id);
            self.superblock.free_inode(inode_id);
        }
        Ok(())
    }

    // ---- file I/O -------------------------------------------------------

    fn next_free_fd(&self) -> i64 {
        let mut fd = 0;
        while self.open_files.contains_key(&fd) {
            fd += 1;
        }
        fd
    }

    pub fn open(&mut self, path: &str, mode: &str) -> FsResult<i64> {
        let mode = OpenMode::parse(mode)?;
        let target = self.resolve(path)?;
        if self.inodes.get(&target).ok_or(Error::CorruptFreeList)?.is_dir {
            return Err(Error::NotADirectory(path.to_string()));
        }
        if mode.can_read() {
            self.check_access(target, Access::Read)?;
        }
        if mode.can_write() {
            self.check_access(target, Access::Write)?;
        }
        let fd = self.next_free_fd();
        self.open_files.insert(fd, OpenFile { inode: target, mode, offset: 0 });
        self.inodes.get_mut(&target).ok_or(Error::CorruptFreeList)?.lock = true;
        debug!("open {path} ({mode:?}) -> fd {fd}");
        self.persist()?;
        Ok(fd)
    }

    pub fn close(&mut self, fd: i64) -> FsResult<()> {
        let entry = self.open_files.remove(&fd).ok_or(Error::InvalidFd(fd))?;
        if let Some(inode) = self.inodes.get_mut(&entry.inode) {
            inode.lock = false;
        }
        debug!("close fd {fd}");
        self.persist()
    }

    pub fn seek(&mut self, fd: i64, offset: i64, whence: Whence) -> FsResult<u64> {
        let entry = self.open_files.get(&fd).ok_or(Error::InvalidFd(fd))?.clone();
        let size = self.inodes.get(&entry.inode).ok_or(Error::CorruptFreeList)?.size as i64;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => entry.offset as i64,
            Whence::End => size,
        };
        let new_offset = base + offset;
        if new_offset < 0 {
            return Err(Error::InvalidOffset);
        }
        if !entry.mode.can_write() && new_offset > size {
            return Err(Error::InvalidOffset);
        }
        self.open_files.get_mut(&fd).unwrap().offset = new_offset as u64;
        Ok(new_offset as u64)
    }

    pub fn read(&self, fd: i64, length: Option<u64>) -> FsResult<Vec<u8>> {
        let entry = self.open_files.get(&fd).ok_or(Error::InvalidFd(fd))?;
        if !entry.mode.can_read() {
            return Err(Error::WrongModeForOp);
        }
        let inode = self.inodes.get(&entry.inode).ok_or(Error::CorruptFreeList)?;
        let size = inode.size;
        let offset = entry.offset;
        if inode.blocks.is_empty() || offset >= size {
            return Ok(Vec::new());
        }
        let remaining = size - offset;
        let want = length.map_or(remaining, |l| l.min(remaining));

        let mut out = Vec::with_capacity(want as usize);
        let mut pos: u64 = 0;
        for &block_id in &inode.blocks {
            if out.len() as u64 >= want {
                break;
            }
            let data = self
                .data_blocks
                .get(&block_id)
                .and_then(DataBlock::as_bytes)
                .ok_or(Error::CorruptFreeList)?;
            let block_len = data.len() as u64;
            if pos + block_len <= offset {
                pos += block_len;
                continue;
            }
            let start = offset.saturating_sub(pos) as usize;
            let take = (want - out.len() as u64).min(block_len - start as u64) as usize;
            out.extend_from_slice(&data[start..start + take]);
            pos += block_len;
        }
        Ok(out)
    }

    pub fn write(&mut self, fd: i64, data: &[u8]) -> FsResult<()> {
        let entry = self.open_files.get(&fd).ok_or(Error::InvalidFd(fd))?.clone();
        if !entry.mode.can_write() {
            return Err(Error::WrongModeForOp);
        }
        if entry.mode.is_append() {
            let block_id = self.superblock.allocate_block(&mut self.data_blocks)?;
            self.data_blocks.insert(block_id, DataBlock::Bytes(data.to_vec()));
            let inode = self.inodes.get_mut(&entry.inode).ok_or(Error::CorruptFreeList)?;
            inode.blocks.push(block_id);
            inode.size += data.len() as u64;
        } else {
            self.overwrite(entry.inode, entry.offset, data)?;
        }
        debug!("write fd {fd} ({} bytes)", data.len());
        self.persist()
    }

    fn block_len(&self, block_id: u32) -> FsResult<u64> {
        Ok(self
            .data_blocks
            .get(&block_id)
            .and_then(DataBlock::as_bytes)
            .ok_or(Error::CorruptFreeList)?
            .len() as u64)
    }

    /// Splices `data` into `inode_id`'s blocks starting at `offset`. Existing
    /// blocks are filled only up to their current length; once data would
    /// exceed that, writing moves on to the next existing block, and only
    /// once those run out are new trailing blocks allocated, each capped at
    /// `BLOCK_SIZE`. Trailing blocks beyond the write region are released.
    fn overwrite(&mut self, inode_id: u32, offset: u64, data: &[u8]) -> FsResult<()> {
        let mut blocks = self.inodes.get(&inode_id).ok_or(Error::CorruptFreeList)?.blocks.clone();

        let mut pos: u64 = 0;
        let mut idx = 0usize;
        while idx < blocks.len() {
            let len = self.block_len(blocks[idx])?;
            if pos + len > offset {
                break;
            }
            pos += len;
            idx += 1;
        }

        // `offset` may land past all existing content (but sparse files are
        // out of scope): pad with zero-filled blocks up to `offset` so the
        // gap is materialized rather than left unmapped.
        while idx >= blocks.len() && pos < offset {
            let new_block = self.superblock.allocate_block(&mut self.data_blocks)?;
            let pad_len = ((offset - pos) as usize).min(BLOCK_SIZE);
            self.data_blocks.insert(new_block, DataBlock::Bytes(vec![0u8; pad_len]));
            blocks.push(new_block);
            idx = blocks.len();
            pos += pad_len as u64;
        }

        let mut written = 0usize;
        let mut in_block_offset = (offset - pos) as usize;

        while written < data.len() {
            if idx < blocks.len() {
                let block_id = blocks[idx];
                let existing_len = self.block_len(block_id)? as usize;
                let available = existing_len.saturating_sub(in_block_offset);
                if available == 0 {
                    // Position already sits at or past this block's content;
                    // nothing to splice here, so advance to the next one.
                    idx += 1;
                    in_block_offset = 0;
                    continue;
                }
                let chunk_len = available.min(data.len() - written);
                let chunk = data[written..written + chunk_len].to_vec();
                let buf = self
                    .data_blocks
                    .get_mut(&block_id)
                    .and_then(DataBlock::as_bytes_mut)
                    .ok_or(Error::CorruptFreeList)?;
                buf[in_block_offset..in_block_offset + chunk_len].copy_from_slice(&chunk);
                written += chunk_len;
                idx += 1;
                in_block_offset = 0;
            } else {
                let chunk_len = BLOCK_SIZE.min(data.len() - written);
                let chunk = data[written..written + chunk_len].to_vec();
                let new_block = self.superblock.allocate_block(&mut self.data_blocks)?;
                self.data_blocks.insert(new_block, DataBlock::Bytes(chunk));
                blocks.push(new_block);
                written += chunk_len;
                idx += 1;
            }
        }

        if idx < blocks.len() {
            for block_id in blocks.split_off(idx) {
                self.data_blocks.remove(&block_id);
                self.superblock.free_block(block_id, &mut self.data_blocks);
            }
        }

        let inode = self.inodes.get_mut(&inode_id).ok_or(Error::CorruptFreeList)?;
        inode.size = inode.size.max(offset + data.len() as u64);
        inode.blocks = blocks;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fs() -> (tempfile::TempDir, FileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img");
        let fs = FileSystem::open_or_format(&path).unwrap();
        (dir, fs)
    }

    #[test]
    fn mkdir_create_and_ls() {
        let (_dir, mut fs) = test_fs();
        fs.login("admin", "admin").unwrap();
        fs.mkdir("~/a").unwrap();
        fs.create("~/a/f").unwrap();
        let entries = fs.ls("~/a").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["f"]);
    }

    #[test]
    fn fresh_format_has_eight_homes() {
        let (_dir, mut fs) = test_fs();
        fs.login("admin", "admin").unwrap();
        let entries = fs.ls("/home").unwrap();
        assert_eq!(entries.len(), 8);
    }

    #[test]
    fn permission_denied_then_allowed() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.mkdir("~/a").unwrap();
        fs.chmod("~/a", "700").unwrap();
        fs.logout();

        fs.login("lugod", "lugod").unwrap();
        assert!(matches!(fs.chdir("/home/ming/a"), Err(Error::PermissionDenied)));
        fs.logout();

        fs.login("ming", "ming").unwrap();
        assert!(fs.chdir("/home/ming/a").is_ok());
    }

    #[test]
    fn write_read_roundtrip() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "w").unwrap();
        fs.write(fd, b"hello").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "r").unwrap();
        assert_eq!(fs.read(fd, None).unwrap(), b"hello");
        fs.close(fd).unwrap();
    }

    #[test]
    fn overwrite_does_not_extend() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "w").unwrap();
        fs.write(fd, b"hello").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "w").unwrap();
        fs.seek(fd, 0, Whence::Set).unwrap();
        fs.write(fd, b"HI").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "r").unwrap();
        assert_eq!(fs.read(fd, None).unwrap(), b"HIllo");
    }

    #[test]
    fn append_creates_one_block_per_write() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "a").unwrap();
        fs.write(fd, b"abc").unwrap();
        fs.write(fd, b"de").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "r").unwrap();
        assert_eq!(fs.read(fd, None).unwrap(), b"abcde");
        let inode_id = fs.resolve("~/f").unwrap();
        assert_eq!(fs.inodes[&inode_id].blocks.len(), 2);
    }

    #[test]
    fn hard_link_then_delete() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "w").unwrap();
        fs.write(fd, b"xyz").unwrap();
        fs.close(fd).unwrap();

        fs.ln("~/f", "~/g").unwrap();
        fs.delete("~/f", false).unwrap();

        let fd = fs.open("~/g", "r").unwrap();
        assert_eq!(fs.read(fd, None).unwrap(), b"xyz");
        fs.close(fd).unwrap();
        fs.delete("~/g", false).unwrap();
        assert!(fs.resolve("~/g").is_err());
    }

    #[test]
    fn seek_then_read_returns_clamped_slice() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "w").unwrap();
        fs.write(fd, b"0123456789").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "r").unwrap();
        fs.seek(fd, 3, Whence::Set).unwrap();
        assert_eq!(fs.read(fd, Some(4)).unwrap(), b"3456");

        // A length past EOF clamps to the remaining bytes.
        fs.seek(fd, 8, Whence::Set).unwrap();
        assert_eq!(fs.read(fd, Some(10)).unwrap(), b"89");
    }

    #[test]
    fn overwrite_spanning_existing_block_boundary() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();

        // Two blocks via append: "abc" then "de", matching scenario 5.
        let fd = fs.open("~/f", "a").unwrap();
        fs.write(fd, b"abc").unwrap();
        fs.write(fd, b"de").unwrap();
        fs.close(fd).unwrap();

        // Overwriting from offset 0 with 4 bytes must only fill block 0 up
        // to its own length ("abc", 3 bytes), then spill the remainder into
        // block 1 without touching block 1's trailing byte.
        let fd = fs.open("~/f", "w").unwrap();
        fs.seek(fd, 0, Whence::Set).unwrap();
        fs.write(fd, b"WXYZ").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "r").unwrap();
        let data = fs.read(fd, None).unwrap();
        assert_eq!(data, b"WXYZe");
        assert_eq!(data.len(), 5);
        let inode_id = fs.resolve("~/f").unwrap();
        assert_eq!(fs.inodes[&inode_id].blocks.len(), 2);
    }

    #[test]
    fn overwrite_extends_past_all_blocks_allocates_new_ones() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "w").unwrap();
        fs.write(fd, b"hi").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "w").unwrap();
        fs.seek(fd, 2, Whence::Set).unwrap();
        fs.write(fd, b" there").unwrap();
        fs.close(fd).unwrap();

        let fd = fs.open("~/f", "r").unwrap();
        let data = fs.read(fd, None).unwrap();
        assert_eq!(data, b"hi there");
        assert_eq!(data.len(), 8);
    }

    #[test]
    fn open_file_cannot_be_deleted() {
        let (_dir, mut fs) = test_fs();
        fs.login("ming", "ming").unwrap();
        fs.create("~/f").unwrap();
        let fd = fs.open("~/f", "w").unwrap();
        assert!(matches!(fs.delete("~/f", false), Err(Error::InUse(_))));
        fs.close(fd).unwrap();
        assert!(fs.delete("~/f", false).is_ok());
    }
}
