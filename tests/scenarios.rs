//! End-to-end scenarios driving a `FileSystem` over a temporary image.

use simvfs::fs::{FileSystem, Whence};
use simvfs::Error;

fn fresh() -> (tempfile::TempDir, FileSystem) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let fs = FileSystem::open_or_format(&path).unwrap();
    (dir, fs)
}

#[test]
fn scenario_1_fresh_format_lists_eight_homes() {
    let (_dir, mut fs) = fresh();
    fs.login("admin", "admin").unwrap();
    let entries = fs.ls("/home").unwrap();
    assert_eq!(entries.len(), 8);
}

#[test]
fn scenario_2_permission_denied_then_allowed() {
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.mkdir("/home/ming/a").unwrap();
    fs.chmod("/home/ming/a", "700").unwrap();
    fs.logout();

    fs.login("lugod", "lugod").unwrap();
    assert!(matches!(fs.chdir("/home/ming/a"), Err(Error::PermissionDenied)));
    fs.logout();

    fs.login("ming", "ming").unwrap();
    assert!(fs.chdir("/home/ming/a").is_ok());
}

#[test]
fn scenario_3_write_then_read_back() {
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.create("~/f").unwrap();

    let fd = fs.open("~/f", "w").unwrap();
    assert_eq!(fd, 0);
    fs.write(fd, b"hello").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("~/f", "r").unwrap();
    assert_eq!(fs.read(fd, None).unwrap(), b"hello");
}

#[test]
fn scenario_4_overwrite_without_extension() {
    let (_dir, mut fs) = fresh();
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
    let data = fs.read(fd, None).unwrap();
    assert_eq!(data, b"HIllo");
    assert_eq!(data.len(), 5);
}

#[test]
fn scenario_5_append_twice_makes_two_blocks() {
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.create("~/f").unwrap();

    let fd = fs.open("~/f", "a").unwrap();
    fs.write(fd, b"abc").unwrap();
    fs.write(fd, b"de").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("~/f", "r").unwrap();
    assert_eq!(fs.read(fd, None).unwrap(), b"abcde");
}

#[test]
fn scenario_6_hard_link_then_delete() {
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.create("~/f").unwrap();
    let fd = fs.open("~/f", "w").unwrap();
    fs.write(fd, b"original").unwrap();
    fs.close(fd).unwrap();

    fs.ln("~/f", "~/g").unwrap();
    fs.delete("~/f", false).unwrap();

    let fd = fs.open("~/g", "r").unwrap();
    assert_eq!(fs.read(fd, None).unwrap(), b"original");
    fs.close(fd).unwrap();

    fs.delete("~/g", false).unwrap();
    assert!(fs.ls("~").unwrap().iter().all(|e| e.name != "g" && e.name != "f"));
}

#[test]
fn scenario_7_disk_full_then_recovers() {
    // A single file, grown one block at a time, exhausts the block pool
    // without ever touching the (much smaller) inode pool, so this drives
    // the allocator's own DiskFull path specifically rather than racing it
    // against inode exhaustion.
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.create("~/f").unwrap();

    let fd = fs.open("~/f", "a").unwrap();
    let chunk = vec![b'x'; simvfs::config::BLOCK_SIZE];
    let err = loop {
        if let Err(e) = fs.write(fd, &chunk) {
            break e;
        }
    };
    fs.close(fd).unwrap();
    assert!(matches!(err, Error::DiskFull));

    fs.delete("~/f", false).unwrap();
    fs.create("~/recovered").unwrap();
    let fd = fs.open("~/recovered", "w").unwrap();
    assert!(fs.write(fd, b"y").is_ok());
}

#[test]
fn seek_read_clamped_to_file_length() {
    // Testable property 7: seek(fd, k, SET); read(fd, n) returns B[k:k+n]
    // clamped to the file's length.
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.create("~/f").unwrap();
    let fd = fs.open("~/f", "w").unwrap();
    fs.write(fd, b"0123456789").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("~/f", "r").unwrap();
    fs.seek(fd, 4, Whence::Set).unwrap();
    assert_eq!(fs.read(fd, Some(3)).unwrap(), b"456");
    fs.seek(fd, 7, Whence::Set).unwrap();
    assert_eq!(fs.read(fd, Some(100)).unwrap(), b"789");
}

#[test]
fn overwrite_spans_existing_block_boundary() {
    // Testable property 8, first clause: overwriting across an existing
    // block boundary splices each block up to its own length, not BLOCK_SIZE,
    // so a later block's untouched tail survives.
    let (_dir, mut fs) = fresh();
    fs.login("ming", "ming").unwrap();
    fs.create("~/f").unwrap();

    let fd = fs.open("~/f", "a").unwrap();
    fs.write(fd, b"abc").unwrap();
    fs.write(fd, b"de").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("~/f", "w").unwrap();
    fs.seek(fd, 0, Whence::Set).unwrap();
    fs.write(fd, b"WXYZ").unwrap();
    fs.close(fd).unwrap();

    let fd = fs.open("~/f", "r").unwrap();
    assert_eq!(fs.read(fd, None).unwrap(), b"WXYZe");
}

#[test]
fn overwrite_past_all_blocks_extends_file() {
    // Testable property 8, second clause: writing m bytes past all existing
    // blocks extends the file to exactly offset + m.
    let (_dir, mut fs) = fresh();
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
fn persistence_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    {
        let mut fs = FileSystem::open_or_format(&path).unwrap();
        fs.login("ming", "ming").unwrap();
        fs.mkdir("~/keepsake").unwrap();
    }
    let mut fs = FileSystem::open_or_format(&path).unwrap();
    fs.login("ming", "ming").unwrap();
    let entries = fs.ls("~").unwrap();
    assert!(entries.iter().any(|e| e.name == "keepsake"));
}
