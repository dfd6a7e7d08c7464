//! Userspace access to FAT12/16/32 volumes on arbitrary block devices:
//! mounting, the VFAT long-name directory layer, and a super-floppy
//! formatter. No partition table handling; the whole device is one
//! volume.

pub mod boot;
pub mod chain;
pub mod device;
pub mod dir;
pub mod error;
pub mod fat;
pub mod file;
pub mod format;
pub mod fs;
pub mod fsinfo;
pub mod names;
pub mod sector;
pub mod time;

pub use boot::{BootSector, Dialect};
pub use device::{BlockDevice, FileDisk, RamDisk};
pub use dir::raw::Attributes;
pub use error::FsError;
pub use fat::FatType;
pub use format::SuperFloppyFormatter;
pub use fs::{DirHandle, EntryInfo, FatFileSystem, FileHandle, MountOptions};
pub use names::ShortName;
pub use time::{Clock, FixedClock, SystemClock};

/// Mounts the FAT volume on `dev`, trying the known boot sector dialects
/// in order.
pub fn mount<D: BlockDevice>(
    dev: D,
    options: MountOptions,
) -> Result<FatFileSystem<D>, FsError> {
    FatFileSystem::mount(dev, options)
}
