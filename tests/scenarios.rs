//! End-to-end scenarios against the reference file-backed block device.

use bootfs::{FileBlockDevice, FileSystem, OpenMode, BLOCK_SIZE, DIR_CAPACITY, MAX_FD};
use tempfile::TempDir;

const PARTITION_BLOCKS: u32 = 390;

fn open_fs(dir: &TempDir) -> FileSystem<FileBlockDevice> {
    let _ = env_logger::try_init();
    let device = FileBlockDevice::new(dir.path()).unwrap();
    FileSystem::initialize(device, PARTITION_BLOCKS).unwrap()
}

#[test]
fn create_write_read_single_file() {
    let dir = TempDir::new().unwrap();
    let mut fs = open_fs(&dir);

    let fd = fs.open("hello", OpenMode::Create);
    assert_ne!(fd, 0);
    let text = b"This is text in hello";
    assert_eq!(fs.write(fd, text, 0) as usize, text.len());
    assert_eq!(fs.close(fd), 0);

    let fd = fs.open("hello", OpenMode::Open);
    assert_ne!(fd, 0);
    let mut buf = vec![0u8; text.len()];
    assert_eq!(fs.read(fd, &mut buf, 0) as usize, text.len());
    assert_eq!(&buf, text);
    assert_eq!(fs.close(fd), 0);
}

#[test]
fn four_file_sequence_survives_restart() {
    let dir = TempDir::new().unwrap();
    let files: &[(&str, &[u8])] = &[
        ("hello", b"This is text in hello"),
        ("random", b"aljksdjfalskdfja;slkdfja;s"),
        ("testing", b"TESTING TESTING"),
        ("not_testing", b"No testing"),
    ];

    {
        let mut fs = open_fs(&dir);
        for (name, text) in files {
            let fd = fs.open(name, OpenMode::Create);
            assert_ne!(fd, 0, "creating {name}");
            assert_eq!(fs.write(fd, text, 0) as usize, text.len());
            assert_eq!(fs.close(fd), 0);
        }
        fs.shutdown().unwrap();
    }

    let mut fs = open_fs(&dir);
    for (name, text) in files {
        let fd = fs.open(name, OpenMode::Open);
        assert_ne!(fd, 0, "reopening {name}");
        let mut buf = vec![0u8; text.len()];
        assert_eq!(fs.read(fd, &mut buf, 0) as usize, text.len());
        assert_eq!(&buf, text, "contents of {name}");
        assert_eq!(fs.close(fd), 0);
    }
}

#[test]
fn expand_blocked_by_neighbor_leaves_file_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut fs = open_fs(&dir);

    let fd_a = fs.open("a", OpenMode::Create);
    let full_block = vec![0xAAu8; BLOCK_SIZE];
    assert_eq!(fs.write(fd_a, &full_block, 0) as usize, BLOCK_SIZE);

    let fd_b = fs.open("b", OpenMode::Create);
    assert_eq!(fs.write(fd_b, b"x", 0) as usize, 1);

    // "a" now owns exactly one block, immediately followed by "b"'s block:
    // growing "a" into that block must fail rather than relocate it.
    let extra = vec![0xBBu8; BLOCK_SIZE];
    let n = fs.write(fd_a, &extra, BLOCK_SIZE as u32);
    assert_eq!(n, 0);

    let mut buf = vec![0u8; BLOCK_SIZE];
    assert_eq!(fs.read(fd_a, &mut buf, 0) as usize, BLOCK_SIZE);
    assert_eq!(buf, full_block);
}

#[test]
fn partial_block_write_then_oversized_read() {
    let dir = TempDir::new().unwrap();
    let mut fs = open_fs(&dir);

    let fd = fs.open("x", OpenMode::Create);
    assert_eq!(fs.write(fd, b"ABC", 0), 3);

    let mut buf = vec![0u8; BLOCK_SIZE];
    let n = fs.read(fd, &mut buf, 0);
    assert_eq!(n, 3);
    assert_eq!(&buf[..3], b"ABC");
}

#[test]
fn descriptor_reuse_never_exhausts_across_n_plus_one_cycles() {
    let dir = TempDir::new().unwrap();
    let mut fs = open_fs(&dir);

    fs.open("hello", OpenMode::Create);
    let n = MAX_FD - 1;
    for _ in 0..=n {
        let fd = fs.open("hello", OpenMode::Open);
        assert_ne!(fd, 0);
        assert_eq!(fs.close(fd), 0);
    }
}

#[test]
fn directory_capacity_caps_new_files_but_keeps_existing_ones() {
    let dir = TempDir::new().unwrap();
    let mut fs = open_fs(&dir);

    // Every 1-byte-named file consumes 2 (len) + 1 (name) + 1 (NUL) + 12
    // (start/num/size) = 16 bytes of directory space.
    let per_record = 16;
    let max_files = DIR_CAPACITY / per_record;

    // Printable ASCII starting at '!' (33), one unique single-byte filename
    // per file so directory usage grows by exactly `per_record` bytes each.
    let mut created = Vec::new();
    for i in 0..(max_files + 5) {
        let name = char::from_u32(33 + i as u32).unwrap().to_string();
        assert_eq!(name.len(), 1);
        let fd = fs.open(&name, OpenMode::Create);
        if fd == 0 {
            break;
        }
        fs.close(fd);
        created.push(name);
    }

    assert!(created.len() <= max_files);
    assert!(!created.is_empty());

    fs.shutdown().unwrap();
    drop(fs);

    let mut fs = open_fs(&dir);
    for name in &created {
        let fd = fs.open(name, OpenMode::Open);
        assert_ne!(fd, 0, "file {name} should have survived restart");
        fs.close(fd);
    }
}
