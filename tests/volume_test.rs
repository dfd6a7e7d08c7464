use fatvol::{
    mount, FatType, FsError, MountOptions, RamDisk, ShortName, SuperFloppyFormatter,
};

const MIB: usize = 1024 * 1024;

#[test]
fn fat12_format_and_read_only_mount() {
    let dev = RamDisk::new(8 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev)
        .unwrap()
        .volume_label("TEST")
        .format()
        .unwrap();
    fs.close().unwrap();
    let dev = fs.into_device().unwrap();

    let fs = mount(dev, MountOptions::read_only()).unwrap();
    assert_eq!(fs.fat_type(), FatType::Fat12);
    assert_eq!(fs.volume_label().unwrap().as_deref(), Some("TEST"));
    assert!(fs.list_dir(fs.root()).unwrap().is_empty());
}

#[test]
fn fat16_file_survives_a_remount() {
    let dev = RamDisk::new(100 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    assert_eq!(fs.fat_type(), FatType::Fat16);

    let root = fs.root();
    let file = fs.add_file(root, "a.txt").unwrap();
    fs.write(file, 0, &[0x41, 0x42, 0x43]).unwrap();
    fs.flush().unwrap();
    let dev = fs.into_device().unwrap();

    let mut fs = mount(dev, MountOptions::default()).unwrap();
    let root = fs.root();
    let info = fs.lookup(root, "a.txt").unwrap().unwrap();
    assert_eq!(info.size, 3);

    let file = fs.open_file(root, "a.txt").unwrap();
    assert_eq!(fs.file_len(file).unwrap(), 3);
    let mut buf = [0u8; 8];
    assert_eq!(fs.read(file, 0, &mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], &[0x41, 0x42, 0x43]);
}

#[test]
fn fat32_thousand_empty_files_and_free_count() {
    let dev = RamDisk::new(1024 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    assert_eq!(fs.fat_type(), FatType::Fat32);

    let root = fs.root();
    for i in 0..1000 {
        fs.add_file(root, &format!("f{:03}", i)).unwrap();
    }
    fs.flush().unwrap();
    let dev = fs.into_device().unwrap();

    let fs = mount(dev, MountOptions::default()).unwrap();
    let root = fs.root();
    let entries = fs.list_dir(root).unwrap();
    assert_eq!(entries.len(), 1000);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.name, format!("f{:03}", i));
        assert_eq!(entry.size, 0);
        assert_eq!(entry.first_cluster, 0);
    }

    // Empty files own no clusters; only the root chain occupies space.
    // 1000 lowercase names serialize to one LFN slot plus one short entry
    // each, so the root needs 2000 slots.
    let bytes_per_cluster = fs.boot_sector().bytes_per_cluster() as u64;
    let total_clusters = fs.usable_space() / bytes_per_cluster;
    let root_clusters = (2000 * 32 + bytes_per_cluster - 1) / bytes_per_cluster;
    assert_eq!(
        fs.free_cluster_count() as u64,
        total_clusters - root_clusters
    );
}

#[test]
fn lfn_chain_layout_on_disk_is_bit_exact() {
    let dev = RamDisk::new(100 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let root = fs.root();
    fs.add_file(root, "ThisIsALongName.TXT").unwrap();
    fs.flush().unwrap();

    let root_dir_offset = fs.boot_sector().root_dir_offset();
    let dev = fs.into_device().unwrap();
    let image = dev.as_bytes();
    let dir = &image[root_dir_offset as usize..root_dir_offset as usize + 3 * 32];

    let checksum = ShortName::parse("THISIS~1.TXT").unwrap().checksum();

    // Two LFN slots, logically-last first, then the short entry.
    assert_eq!(dir[0], 0x42);
    assert_eq!(dir[11], 0x0F);
    assert_eq!(dir[13], checksum);
    assert_eq!(dir[32], 0x01);
    assert_eq!(dir[32 + 11], 0x0F);
    assert_eq!(dir[32 + 13], checksum);
    assert_eq!(&dir[64..64 + 11], b"THISIS~1TXT");
}

#[test]
fn stale_fsinfo_free_count_fails_the_mount() {
    let dev = RamDisk::new(1024 * MIB);
    let fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let mut dev = fs.into_device().unwrap();

    // Understate the cached free count: FSInfo lives in sector 1, the
    // free-cluster counter at byte 488.
    let mut patch = [0u8; 512];
    fatvol::BlockDevice::read_at(&mut dev, 512, &mut patch).unwrap();
    patch[488..492].copy_from_slice(&42u32.to_le_bytes());
    fatvol::BlockDevice::write_at(&mut dev, 512, &patch).unwrap();

    assert!(matches!(
        mount(dev, MountOptions::default()),
        Err(FsError::FsInfoStale { .. })
    ));
}

#[test]
fn diverging_fat_copy_fails_the_mount_unless_tolerated() {
    let dev = RamDisk::new(100 * MIB);
    let fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let fat1_offset = fs.boot_sector().fat_offset(1);
    let mut dev = fs.into_device().unwrap();

    // Flip one entry in FAT #1 only.
    let mut patch = [0u8; 512];
    fatvol::BlockDevice::read_at(&mut dev, fat1_offset, &mut patch).unwrap();
    patch[100] ^= 0xFF;
    fatvol::BlockDevice::write_at(&mut dev, fat1_offset, &patch).unwrap();

    let err = mount(dev, MountOptions::default()).unwrap_err();
    assert!(matches!(err, FsError::FatMismatch { copy: 1 }));

    // The same image mounts when differences are explicitly ignored.
    let dev = RamDisk::new(100 * MIB);
    let fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let fat1_offset = fs.boot_sector().fat_offset(1);
    let mut dev = fs.into_device().unwrap();
    fatvol::BlockDevice::read_at(&mut dev, fat1_offset, &mut patch).unwrap();
    patch[100] ^= 0xFF;
    fatvol::BlockDevice::write_at(&mut dev, fat1_offset, &patch).unwrap();

    let options = MountOptions {
        ignore_fat_differences: true,
        ..MountOptions::default()
    };
    assert!(mount(dev, options).is_ok());
}

#[test]
fn terminator_follows_the_last_live_entry() {
    let dev = RamDisk::new(100 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let root = fs.root();

    fs.add_file(root, "one.txt").unwrap();
    fs.add_file(root, "two.txt").unwrap();
    fs.add_file(root, "three.txt").unwrap();
    fs.remove(root, "two.txt").unwrap();
    fs.flush().unwrap();

    let root_dir_offset = fs.boot_sector().root_dir_offset() as usize;
    let dev = fs.into_device().unwrap();
    let image = dev.as_bytes();

    let mut live = 0;
    let mut slot = 0;
    loop {
        let first = image[root_dir_offset + slot * 32];
        if first == 0x00 {
            break;
        }
        assert_ne!(first, 0xE5, "flush compacts, no tombstones expected");
        live += 1;
        slot += 1;
    }
    // Two files left, each a single LFN slot plus the short entry.
    assert_eq!(live, 4);
    // Everything after the terminator stays zero.
    assert!(image[root_dir_offset + slot * 32..root_dir_offset + (slot + 8) * 32]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn truncation_returns_clusters_to_the_free_pool() {
    let dev = RamDisk::new(100 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let root = fs.root();
    let bytes_per_cluster = fs.boot_sector().bytes_per_cluster();

    let file = fs.add_file(root, "big.bin").unwrap();
    let payload = vec![0x5Au8; bytes_per_cluster as usize * 5];
    fs.write(file, 0, &payload).unwrap();

    let free_before = fs.free_cluster_count();
    fs.set_file_len(file, bytes_per_cluster * 2 + 1).unwrap();
    assert_eq!(fs.free_cluster_count(), free_before + 2);
    assert_eq!(fs.file_len(file).unwrap(), bytes_per_cluster as u64 * 2 + 1);

    fs.set_file_len(file, 0).unwrap();
    assert_eq!(fs.free_cluster_count(), free_before + 5);
    assert_eq!(fs.lookup(root, "big.bin").unwrap().unwrap().first_cluster, 0);
}

#[test]
fn read_only_mount_rejects_every_mutation_and_leaves_bytes_alone() {
    let dev = RamDisk::new(8 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev)
        .unwrap()
        .volume_label("KEEP")
        .format()
        .unwrap();
    let root = fs.root();
    let file = fs.add_file(root, "readme.txt").unwrap();
    fs.write(file, 0, b"do not touch").unwrap();
    fs.add_directory(root, "subdir").unwrap();
    fs.flush().unwrap();
    let dev = fs.into_device().unwrap();
    let snapshot = dev.as_bytes().to_vec();

    let mut fs = mount(dev, MountOptions::read_only()).unwrap();
    let root = fs.root();

    assert!(matches!(fs.add_file(root, "x"), Err(FsError::ReadOnly)));
    assert!(matches!(fs.add_directory(root, "y"), Err(FsError::ReadOnly)));
    assert!(matches!(fs.remove(root, "readme.txt"), Err(FsError::ReadOnly)));
    assert!(matches!(
        fs.set_volume_label(Some("NOPE")),
        Err(FsError::ReadOnly)
    ));
    let file = fs.open_file(root, "readme.txt").unwrap();
    assert!(matches!(fs.write(file, 0, b"z"), Err(FsError::ReadOnly)));
    assert!(matches!(fs.set_file_len(file, 0), Err(FsError::ReadOnly)));
    let sub = fs.open_dir(root, "subdir").unwrap();
    assert!(matches!(
        fs.rename(root, "readme.txt", sub, "moved.txt"),
        Err(FsError::ReadOnly)
    ));

    // Reading still works.
    let mut buf = [0u8; 16];
    assert_eq!(fs.read(file, 0, &mut buf).unwrap(), 12);
    assert_eq!(&buf[..12], b"do not touch");

    fs.close().unwrap();
    let dev = fs.into_device().unwrap();
    assert_eq!(dev.as_bytes(), &snapshot[..]);
}

#[test]
fn subdirectories_nest_and_survive_remounts() {
    let dev = RamDisk::new(100 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    let root = fs.root();

    let docs = fs.add_directory(root, "Documents").unwrap();
    let inner = fs.add_directory(docs, "Reports 2022").unwrap();
    let file = fs.add_file(inner, "summary with a long name.md").unwrap();
    fs.write(file, 0, b"# Summary\n").unwrap();
    fs.flush().unwrap();
    let dev = fs.into_device().unwrap();

    let mut fs = mount(dev, MountOptions::default()).unwrap();
    let root = fs.root();
    let docs = fs.open_dir(root, "documents").unwrap();
    let inner = fs.open_dir(docs, "reports 2022").unwrap();
    let info = fs.lookup(inner, "Summary With A Long Name.MD").unwrap().unwrap();
    assert_eq!(info.size, 10);

    let file = fs.open_file(inner, "summary with a long name.md").unwrap();
    let mut buf = [0u8; 32];
    assert_eq!(fs.read(file, 0, &mut buf).unwrap(), 10);
    assert_eq!(&buf[..10], b"# Summary\n");
}

#[test]
fn volume_label_lives_in_the_root_directory_and_boot_sector() {
    let dev = RamDisk::new(100 * MIB);
    let mut fs = SuperFloppyFormatter::new(dev).unwrap().format().unwrap();
    fs.set_volume_label(Some("ARCHIVE")).unwrap();
    fs.flush().unwrap();
    let dev = fs.into_device().unwrap();

    let fs = mount(dev, MountOptions::default()).unwrap();
    assert_eq!(fs.volume_label().unwrap().as_deref(), Some("ARCHIVE"));
    // FAT12/16 carries a second copy in the boot sector.
    assert_eq!(
        fs.boot_sector().volume_label().as_deref(),
        Some("ARCHIVE")
    );
}
