use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::boot::{BootSector, Dialect, Geometry, Variant};
use crate::chain::ClusterChain;
use crate::device::BlockDevice;
use crate::dir::lfn::{DirRecord, LfnDirectory};
use crate::dir::raw::{Attributes, RawDirEntry};
use crate::dir::store::DirStore;
use crate::error::FsError;
use crate::fat::{Fat, FatType, MIN_CLUSTER};
use crate::file::FatFile;
use crate::fsinfo::FsInfoSector;
use crate::names::{self, ShortName};
use crate::time::{Clock, SystemClock};

/// How to mount a volume.
pub struct MountOptions {
    pub read_only: bool,
    /// Accept volumes whose FAT copies disagree instead of failing with
    /// `FatMismatch`.
    pub ignore_fat_differences: bool,
    /// Timestamp source for directory entries.
    pub clock: Box<dyn Clock>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            ignore_fat_differences: false,
            clock: Box::new(SystemClock),
        }
    }
}

impl MountOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

/// A handle to an open directory. Handles are stable for the life of the
/// mount: opening the same entry twice yields the same handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DirHandle(usize);

/// A handle to an open file, with the same identity guarantee.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FileHandle(usize);

/// A snapshot of one directory entry.
#[derive(Clone, Debug)]
pub struct EntryInfo {
    pub name: String,
    pub short_name: String,
    pub attributes: Attributes,
    pub is_directory: bool,
    pub size: u32,
    pub first_cluster: u32,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub accessed: Option<NaiveDate>,
}

struct DirNode {
    dir: LfnDirectory,
    /// `(parent handle, record id in the parent)`; `None` for the root.
    /// A back-reference only, ownership always runs parent to child.
    parent: Option<(DirHandle, u64)>,
}

struct FileNode {
    file: FatFile,
    parent: DirHandle,
    record_id: u64,
}

/// A mounted FAT volume. All operations go through this object; the
/// device, the in-memory FAT and every loaded directory are exclusively
/// owned here.
pub struct FatFileSystem<D: BlockDevice> {
    dev: D,
    read_only: bool,
    closed: bool,
    clock: Box<dyn Clock>,
    bs: BootSector,
    geo: Geometry,
    fat_type: FatType,
    fat: Fat,
    fsinfo: Option<FsInfoSector>,
    dirs: Vec<DirNode>,
    files: Vec<FileNode>,
    dir_cache: HashMap<u64, DirHandle>,
    file_cache: HashMap<u64, FileHandle>,
    next_id: u64,
}

impl<D: BlockDevice> std::fmt::Debug for FatFileSystem<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatFileSystem")
            .field("read_only", &self.read_only)
            .field("closed", &self.closed)
            .field("fat_type", &self.fat_type)
            .finish()
    }
}

impl<D: BlockDevice> FatFileSystem<D> {
    /// Mounts a volume: dialect detection, FAT load and mirror check, root
    /// directory, FSInfo consistency.
    pub fn mount(mut dev: D, options: MountOptions) -> Result<Self, FsError> {
        let read_only = options.read_only || dev.is_read_only();

        let bs = BootSector::detect(&mut dev)?;
        if bs.nr_fats() == 0 {
            return Err(FsError::UnrecognizedFormat);
        }
        let fat_type = bs.fat_type()?;
        let geo = bs.geometry()?;

        let fat = Fat::read(
            &mut dev,
            fat_type,
            bs.fat_offset(0),
            bs.fat_region_len(),
            geo.cluster_count,
        )?;

        if !options.ignore_fat_differences {
            for copy in 1..bs.nr_fats() {
                let other = Fat::read(
                    &mut dev,
                    fat_type,
                    bs.fat_offset(copy),
                    bs.fat_region_len(),
                    geo.cluster_count,
                )?;
                if !fat.mirrors(&other) {
                    return Err(FsError::FatMismatch {
                        copy: copy as usize,
                    });
                }
            }
        }

        let root_store = match bs.variant() {
            Variant::Fat32 => DirStore::Chain(ClusterChain::new(
                bs.root_dir_first_cluster()?,
                read_only,
            )),
            Variant::Fat16 => DirStore::FixedRoot {
                offset: bs.root_dir_offset(),
                capacity: bs.root_dir_entry_count() as usize,
            },
        };

        let mut next_id = 1;
        let root = LfnDirectory::read(&mut dev, &geo, &fat, root_store, &mut next_id)?;

        let fsinfo = match bs.variant() {
            Variant::Fat32 => {
                let info = FsInfoSector::read(
                    &mut dev,
                    bs.fs_info_sector_nr()?,
                    geo.bytes_per_sector,
                )?;
                // An understated free count means the FSInfo sector went
                // stale; treat the volume as corrupt rather than guess.
                if info.free_cluster_count() < fat.free_cluster_count() {
                    return Err(FsError::FsInfoStale {
                        fat_free: fat.free_cluster_count(),
                        fsinfo_free: info.free_cluster_count(),
                    });
                }
                Some(info)
            }
            Variant::Fat16 => None,
        };

        Ok(Self {
            dev,
            read_only,
            closed: false,
            clock: options.clock,
            bs,
            geo,
            fat_type,
            fat,
            fsinfo,
            dirs: vec![DirNode {
                dir: root,
                parent: None,
            }],
            files: Vec::new(),
            dir_cache: HashMap::new(),
            file_cache: HashMap::new(),
            next_id,
        })
    }

    fn check_open(&self) -> Result<(), FsError> {
        if self.closed {
            Err(FsError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<(), FsError> {
        self.check_open()?;
        if self.read_only {
            Err(FsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    pub fn dialect(&self) -> Dialect {
        self.bs.dialect()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.bs
    }

    pub fn root(&self) -> DirHandle {
        DirHandle(0)
    }

    /// The parent of an open directory; `None` for the root (and for a
    /// directory whose entry has been removed).
    pub fn parent_dir(&self, dir: DirHandle) -> Result<Option<DirHandle>, FsError> {
        self.check_open()?;
        Ok(self.dir_node(dir)?.parent.map(|(handle, _)| handle))
    }

    pub fn free_cluster_count(&self) -> u32 {
        self.fat.free_cluster_count()
    }

    pub fn free_space(&self) -> u64 {
        self.fat.free_cluster_count() as u64 * self.geo.bytes_per_cluster as u64
    }

    /// The full device span claimed by the file system; only FAT32 tracks
    /// this reliably.
    pub fn total_space(&self) -> Option<u64> {
        match self.fat_type {
            FatType::Fat32 => Some(self.bs.sector_count() * self.geo.bytes_per_sector as u64),
            _ => None,
        }
    }

    pub fn usable_space(&self) -> u64 {
        self.geo.cluster_count as u64 * self.geo.bytes_per_cluster as u64
    }

    /// The volume label. The root directory entry wins; FAT12/16 volumes
    /// fall back to the boot sector copy.
    pub fn volume_label(&self) -> Result<Option<String>, FsError> {
        self.check_open()?;
        let from_dir = self.dirs[0].dir.label();
        if from_dir.is_none() && self.fat_type != FatType::Fat32 {
            Ok(self.bs.volume_label().filter(|label| !label.is_empty()))
        } else {
            Ok(from_dir)
        }
    }

    /// Updates the label in the root directory and, on FAT12/16, the boot
    /// sector copy of it as well.
    pub fn set_volume_label(&mut self, label: Option<&str>) -> Result<(), FsError> {
        self.check_writable()?;
        self.dirs[0].dir.set_label(label, &mut self.next_id)?;
        if self.fat_type != FatType::Fat32 {
            self.bs.set_volume_label(label)?;
        }
        Ok(())
    }

    fn dir_node(&self, handle: DirHandle) -> Result<&DirNode, FsError> {
        self.dirs
            .get(handle.0)
            .ok_or(FsError::InvalidArgument("stale directory handle"))
    }

    fn entry_info(&self, record: &DirRecord) -> EntryInfo {
        EntryInfo {
            name: record.display_name(),
            short_name: record.raw.short_name().display(),
            attributes: record.raw.attributes(),
            is_directory: record.raw.is_directory(),
            size: record.raw.size(),
            first_cluster: record.raw.first_cluster(self.fat_type),
            created: record.raw.created(),
            modified: record.raw.modified(),
            accessed: record.raw.accessed(),
        }
    }

    /// The visible entries of a directory, in on-disk order. The dot pair
    /// and the volume label stay hidden.
    pub fn list_dir(&self, dir: DirHandle) -> Result<Vec<EntryInfo>, FsError> {
        self.check_open()?;
        let node = self.dir_node(dir)?;
        Ok(node
            .dir
            .records
            .iter()
            .filter(|r| !r.is_internal())
            .map(|r| self.entry_info(r))
            .collect())
    }

    /// Case-insensitive lookup by long name, falling back to the short
    /// name.
    pub fn lookup(&self, dir: DirHandle, name: &str) -> Result<Option<EntryInfo>, FsError> {
        self.check_open()?;
        let node = self.dir_node(dir)?;
        Ok(node.dir.find(name).map(|r| self.entry_info(r)))
    }

    /// Opens a subdirectory, returning the cached handle when this entry
    /// was opened before.
    pub fn open_dir(&mut self, parent: DirHandle, name: &str) -> Result<DirHandle, FsError> {
        self.check_open()?;
        let (record_id, first_cluster) = {
            let record = self
                .dir_node(parent)?
                .dir
                .find(name)
                .ok_or(FsError::NotFound)?;
            if !record.raw.is_directory() {
                return Err(FsError::NotDirectory);
            }
            (record.id, record.raw.first_cluster(self.fat_type))
        };

        if let Some(&handle) = self.dir_cache.get(&record_id) {
            return Ok(handle);
        }

        let store = DirStore::Chain(ClusterChain::new(first_cluster, self.read_only));
        let dir = LfnDirectory::read(
            &mut self.dev,
            &self.geo,
            &self.fat,
            store,
            &mut self.next_id,
        )?;

        let handle = DirHandle(self.dirs.len());
        self.dirs.push(DirNode {
            dir,
            parent: Some((parent, record_id)),
        });
        self.dir_cache.insert(record_id, handle);
        Ok(handle)
    }

    /// Opens a file, returning the cached handle when this entry was
    /// opened before.
    pub fn open_file(&mut self, dir: DirHandle, name: &str) -> Result<FileHandle, FsError> {
        self.check_open()?;
        let (record_id, first_cluster, size) = {
            let record = self
                .dir_node(dir)?
                .dir
                .find(name)
                .ok_or(FsError::NotFound)?;
            if record.raw.is_directory() {
                return Err(FsError::NotFile);
            }
            (
                record.id,
                record.raw.first_cluster(self.fat_type),
                record.raw.size(),
            )
        };

        if let Some(&handle) = self.file_cache.get(&record_id) {
            return Ok(handle);
        }

        let handle = FileHandle(self.files.len());
        self.files.push(FileNode {
            file: FatFile::new(first_cluster, size, self.read_only),
            parent: dir,
            record_id,
        });
        self.file_cache.insert(record_id, handle);
        Ok(handle)
    }

    fn new_record(
        &mut self,
        dir: DirHandle,
        name: &str,
        attributes: Attributes,
    ) -> Result<u64, FsError> {
        names::utf16_units(name)?;
        let node = self.dir_node(dir)?;
        if node.dir.find(name).is_some() {
            return Err(FsError::DuplicateName);
        }

        let short = ShortName::generate(name, |candidate| {
            node.dir.short_name_exists(candidate)
        })?;
        let long_name = if short.display() == name {
            None
        } else {
            Some(name.to_string())
        };

        let now = self.clock.now();
        let mut raw = RawDirEntry::zeroed();
        raw.set_short_name(&short);
        raw.set_attributes(attributes);
        raw.set_created(now);
        raw.set_modified(now);
        raw.set_accessed(now.date());

        let id = self.next_id;
        self.next_id += 1;
        let node = &mut self.dirs[dir.0];
        node.dir.records.push(DirRecord {
            id,
            long_name,
            raw,
        });
        node.dir.dirty = true;
        Ok(id)
    }

    /// Creates an empty file. No cluster is allocated until data arrives.
    pub fn add_file(&mut self, dir: DirHandle, name: &str) -> Result<FileHandle, FsError> {
        self.check_writable()?;
        let record_id = self.new_record(dir, name, Attributes::ARCHIVE)?;

        let handle = FileHandle(self.files.len());
        self.files.push(FileNode {
            file: FatFile::new(0, 0, false),
            parent: dir,
            record_id,
        });
        self.file_cache.insert(record_id, handle);
        Ok(handle)
    }

    /// Creates a subdirectory with its `.` / `..` pair on a freshly
    /// allocated cluster.
    pub fn add_directory(&mut self, parent: DirHandle, name: &str) -> Result<DirHandle, FsError> {
        self.check_writable()?;
        let record_id = self.new_record(parent, name, Attributes::DIRECTORY)?;

        let cluster = match self.fat.alloc_new() {
            Ok(cluster) => cluster,
            Err(err) => {
                // Roll the record back so the directory is not left
                // pointing at nothing.
                let node = &mut self.dirs[parent.0];
                node.dir.records.retain(|r| r.id != record_id);
                return Err(err);
            }
        };

        {
            let node = &mut self.dirs[parent.0];
            let record = node.dir.record_by_id_mut(record_id).expect("fresh record");
            record.raw.set_first_cluster(cluster, self.fat_type);
        }

        let parent_head = if parent == self.root() {
            0
        } else {
            self.dirs[parent.0].dir.store.start_cluster()
        };

        let now = self.clock.now();
        let mut dot = RawDirEntry::zeroed();
        dot.set_name_bytes(b".          ");
        dot.set_attributes(Attributes::DIRECTORY);
        dot.set_first_cluster(cluster, self.fat_type);
        dot.set_created(now);
        dot.set_modified(now);

        let mut dotdot = RawDirEntry::zeroed();
        dotdot.set_name_bytes(b"..         ");
        dotdot.set_attributes(Attributes::DIRECTORY);
        dotdot.set_first_cluster(parent_head, self.fat_type);
        dotdot.set_created(now);
        dotdot.set_modified(now);

        let mut dir = LfnDirectory::create(DirStore::Chain(ClusterChain::new(cluster, false)));
        dir.records.push(DirRecord {
            id: self.next_id,
            long_name: None,
            raw: dot,
        });
        dir.records.push(DirRecord {
            id: self.next_id + 1,
            long_name: None,
            raw: dotdot,
        });
        self.next_id += 2;

        let handle = DirHandle(self.dirs.len());
        self.dirs.push(DirNode {
            dir,
            parent: Some((parent, record_id)),
        });
        self.dir_cache.insert(record_id, handle);
        Ok(handle)
    }

    /// Removes a file or an empty directory and frees its chain.
    pub fn remove(&mut self, dir: DirHandle, name: &str) -> Result<(), FsError> {
        self.check_writable()?;
        let (record_id, is_directory, first_cluster) = {
            let record = self
                .dir_node(dir)?
                .dir
                .find(name)
                .ok_or(FsError::NotFound)?;
            (
                record.id,
                record.raw.is_directory(),
                record.raw.first_cluster(self.fat_type),
            )
        };

        if is_directory {
            let child = self.open_dir(dir, name)?;
            let occupied = self.dirs[child.0]
                .dir
                .records
                .iter()
                .any(|r| !r.is_internal());
            if occupied {
                return Err(FsError::DirectoryNotEmpty);
            }
            self.dir_cache.remove(&record_id);

            // Detach the loaded node so a later flush cannot write into
            // the clusters being freed below.
            let node = &mut self.dirs[child.0];
            node.dir.records.clear();
            node.dir.dirty = false;
            node.dir.store = DirStore::Chain(ClusterChain::new(0, true));
            node.parent = None;
        } else {
            self.file_cache.remove(&record_id);
        }

        if first_cluster >= MIN_CLUSTER {
            self.fat.free_chain(first_cluster)?;
        }

        let node = &mut self.dirs[dir.0];
        node.dir.records.retain(|r| r.id != record_id);
        node.dir.dirty = true;
        Ok(())
    }

    /// Renames an entry, possibly across directories. A moved directory
    /// gets its `..` entry repointed at the new parent.
    pub fn rename(
        &mut self,
        src_dir: DirHandle,
        old_name: &str,
        dst_dir: DirHandle,
        new_name: &str,
    ) -> Result<(), FsError> {
        self.check_writable()?;
        names::utf16_units(new_name)?;

        let src_pos = self
            .dir_node(src_dir)?
            .dir
            .find_position(old_name)
            .ok_or(FsError::NotFound)?;
        let moving_id = self.dirs[src_dir.0].dir.records[src_pos].id;

        if let Some(existing) = self.dir_node(dst_dir)?.dir.find(new_name) {
            if existing.id != moving_id {
                return Err(FsError::DuplicateName);
            }
        }

        let mut record = self.dirs[src_dir.0].dir.records.remove(src_pos);
        self.dirs[src_dir.0].dir.dirty = true;

        let short = {
            let dst = &self.dirs[dst_dir.0].dir;
            ShortName::generate(new_name, |candidate| dst.short_name_exists(candidate))
        };
        let short = match short {
            Ok(short) => short,
            Err(err) => {
                // Put the record back where it was.
                self.dirs[src_dir.0].dir.records.insert(src_pos, record);
                return Err(err);
            }
        };

        record.raw.set_short_name(&short);
        record.long_name = if short.display() == new_name {
            None
        } else {
            Some(new_name.to_string())
        };
        record.raw.set_modified(self.clock.now());
        let is_directory = record.raw.is_directory();

        let dst = &mut self.dirs[dst_dir.0];
        dst.dir.records.push(record);
        dst.dir.dirty = true;

        if let Some(&handle) = self.file_cache.get(&moving_id) {
            self.files[handle.0].parent = dst_dir;
        }

        if is_directory && src_dir != dst_dir {
            let child = self.open_dir(dst_dir, new_name)?;
            let parent_head = if dst_dir == self.root() {
                0
            } else {
                self.dirs[dst_dir.0].dir.store.start_cluster()
            };
            let fat_type = self.fat_type;
            let node = &mut self.dirs[child.0];
            node.parent = Some((dst_dir, moving_id));
            if let Some(dotdot) = node
                .dir
                .records
                .iter_mut()
                .find(|r| r.raw.name_bytes().starts_with(b".."))
            {
                dotdot.raw.set_first_cluster(parent_head, fat_type);
                node.dir.dirty = true;
            }
        }

        Ok(())
    }

    pub fn file_len(&self, file: FileHandle) -> Result<u64, FsError> {
        self.check_open()?;
        let node = self
            .files
            .get(file.0)
            .ok_or(FsError::InvalidArgument("stale file handle"))?;
        Ok(node.file.len())
    }

    pub fn read(
        &mut self,
        file: FileHandle,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, FsError> {
        self.check_open()?;
        let node = self
            .files
            .get(file.0)
            .ok_or(FsError::InvalidArgument("stale file handle"))?;
        node.file.read(&mut self.dev, &self.geo, &self.fat, offset, buf)
    }

    pub fn write(&mut self, file: FileHandle, offset: u64, buf: &[u8]) -> Result<(), FsError> {
        self.check_writable()?;
        if file.0 >= self.files.len() {
            return Err(FsError::InvalidArgument("stale file handle"));
        }
        self.files[file.0]
            .file
            .write(&mut self.dev, &self.geo, &mut self.fat, offset, buf)?;
        self.sync_file_record(file);
        Ok(())
    }

    /// Grows (zero-filling) or truncates (freeing clusters) a file.
    pub fn set_file_len(&mut self, file: FileHandle, new_len: u32) -> Result<(), FsError> {
        self.check_writable()?;
        if file.0 >= self.files.len() {
            return Err(FsError::InvalidArgument("stale file handle"));
        }
        self.files[file.0]
            .file
            .set_len(&mut self.dev, &self.geo, &mut self.fat, new_len)?;
        self.sync_file_record(file);
        Ok(())
    }

    /// Re-stamps a file's directory entry from its in-memory state. The
    /// write paths already do this eagerly; the entry reaches the device
    /// on the next `flush`.
    pub fn sync_file(&mut self, file: FileHandle) -> Result<(), FsError> {
        self.check_writable()?;
        if file.0 >= self.files.len() {
            return Err(FsError::InvalidArgument("stale file handle"));
        }
        self.sync_file_record(file);
        Ok(())
    }

    /// Pushes a file's size, chain head and mtime into its short entry.
    /// Write paths do this eagerly; the entry itself reaches the device on
    /// the next `flush`.
    fn sync_file_record(&mut self, file: FileHandle) {
        let now = self.clock.now();
        let (parent, record_id, size, start) = {
            let node = &self.files[file.0];
            (
                node.parent,
                node.record_id,
                node.file.len() as u32,
                node.file.start_cluster(),
            )
        };

        let fat_type = self.fat_type;
        let node = &mut self.dirs[parent.0];
        if let Some(record) = node.dir.record_by_id_mut(record_id) {
            record.raw.set_size(size);
            record.raw.set_first_cluster(start, fat_type);
            record.raw.set_modified(now);
            record.raw.set_accessed(now.date());
            node.dir.dirty = true;
        }
    }

    /// Flushes every changed structure in the fixed order: boot sector
    /// (and its FAT32 copy), each FAT copy, directories, FSInfo, then the
    /// device itself.
    pub fn flush(&mut self) -> Result<(), FsError> {
        self.check_open()?;
        if self.read_only {
            self.dev.flush()?;
            return Ok(());
        }

        if self.bs.is_dirty() {
            self.bs.write(&mut self.dev)?;
            self.bs.write_copy(&mut self.dev)?;
        }

        // Directory extents are resized first so every cluster they gain
        // or lose is already reflected in the FAT copies written below.
        for index in 0..self.dirs.len() {
            if !self.dirs[index].dir.dirty {
                continue;
            }
            let slot_count = self.dirs[index].dir.serialize().len();
            let node = &mut self.dirs[index];
            node.dir
                .store
                .reserve(&mut self.dev, &self.geo, &mut self.fat, slot_count)?;
        }

        for copy in 0..self.bs.nr_fats() {
            self.fat.write_copy(
                &mut self.dev,
                self.bs.fat_offset(copy),
                self.bs.fat_region_len(),
            )?;
        }

        for index in 0..self.dirs.len() {
            let node = &mut self.dirs[index];
            node.dir.flush(&mut self.dev, &self.geo, &mut self.fat)?;
        }

        if let Some(fsinfo) = &mut self.fsinfo {
            fsinfo.set_free_cluster_count(self.fat.free_cluster_count());
            fsinfo.set_last_allocated_cluster(self.fat.last_allocated_cluster());
            fsinfo.write(&mut self.dev)?;
        }

        self.dev.flush()?;
        Ok(())
    }

    /// Flushes everything and invalidates the instance; every later
    /// operation fails with `Closed`. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), FsError> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.dir_cache.clear();
        self.file_cache.clear();
        self.closed = true;
        Ok(())
    }

    /// Closes the file system and hands the device back, e.g. for a
    /// remount.
    pub fn into_device(mut self) -> Result<D, FsError> {
        self.close()?;
        let Self { dev, .. } = self;
        Ok(dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDisk;
    use crate::format::SuperFloppyFormatter;

    fn small_volume() -> FatFileSystem<RamDisk> {
        let dev = RamDisk::new(8 * 1024 * 1024);
        SuperFloppyFormatter::new(dev).unwrap().format().unwrap()
    }

    #[test]
    fn handles_are_identity_stable() {
        let mut fs = small_volume();
        let root = fs.root();
        let file = fs.add_file(root, "stable.bin").unwrap();
        assert_eq!(fs.open_file(root, "stable.bin").unwrap(), file);
        assert_eq!(fs.open_file(root, "STABLE.BIN").unwrap(), file);

        let dir = fs.add_directory(root, "nested").unwrap();
        assert_eq!(fs.open_dir(root, "nested").unwrap(), dir);
    }

    #[test]
    fn closed_file_system_rejects_operations() {
        let mut fs = small_volume();
        let root = fs.root();
        fs.close().unwrap();

        assert!(matches!(fs.add_file(root, "late.txt"), Err(FsError::Closed)));
        assert!(matches!(fs.lookup(root, "late.txt"), Err(FsError::Closed)));
        assert!(fs.close().is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let mut fs = small_volume();
        let root = fs.root();
        fs.add_file(root, "Notes.txt").unwrap();
        assert!(matches!(
            fs.add_file(root, "notes.TXT"),
            Err(FsError::DuplicateName)
        ));
    }

    #[test]
    fn remove_refuses_populated_directories() {
        let mut fs = small_volume();
        let root = fs.root();
        let sub = fs.add_directory(root, "busy").unwrap();
        fs.add_file(sub, "inner.txt").unwrap();

        assert!(matches!(
            fs.remove(root, "busy"),
            Err(FsError::DirectoryNotEmpty)
        ));

        fs.remove(sub, "inner.txt").unwrap();
        fs.remove(root, "busy").unwrap();
        assert!(fs.lookup(root, "busy").unwrap().is_none());
    }

    #[test]
    fn rename_moves_directories_and_rewrites_dotdot() {
        let mut fs = small_volume();
        let root = fs.root();
        let a = fs.add_directory(root, "alpha").unwrap();
        let _b = fs.add_directory(root, "beta").unwrap();
        fs.add_directory(a, "inner").unwrap();

        let beta = fs.open_dir(root, "beta").unwrap();
        fs.rename(a, "inner", beta, "inner").unwrap();

        assert!(fs.lookup(a, "inner").unwrap().is_none());
        let moved = fs.lookup(beta, "inner").unwrap().unwrap();
        assert!(moved.is_directory);

        let inner = fs.open_dir(beta, "inner").unwrap();
        let beta_head = fs.dirs[beta.0].dir.store.start_cluster();
        let dotdot = fs.dirs[inner.0]
            .dir
            .records
            .iter()
            .find(|r| r.raw.name_bytes().starts_with(b".."))
            .unwrap();
        assert_eq!(dotdot.raw.first_cluster(fs.fat_type), beta_head);
    }
}
