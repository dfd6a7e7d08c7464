use std::fmt;
use std::io;

/// Everything that can go wrong when operating on a FAT volume.
#[derive(Debug)]
pub enum FsError {
    /// The underlying block device failed.
    Device(io::Error),
    /// No known boot sector dialect accepted the first sector.
    UnrecognizedFormat,
    /// A mirrored FAT copy differs from FAT #0.
    FatMismatch { copy: usize },
    /// A cluster chain walk visited more clusters than the volume holds.
    FatChainCycle { head: u32 },
    /// A chain walk hit a reserved or bad-cluster marker.
    BadClusterInChain { cluster: u32, value: u32 },
    /// The FSInfo sector claims fewer free clusters than the FAT itself.
    FsInfoStale { fat_free: u32, fsinfo_free: u32 },
    /// The FSInfo sector signatures are wrong.
    FsInfoInvalid,
    /// A directory extent ended without a terminator entry.
    DirTerminatorMissing,
    NotFound,
    NotDirectory,
    NotFile,
    DirectoryNotEmpty,
    NameTooLong,
    IllegalShortName,
    DuplicateName,
    NoFreeCluster,
    /// The fixed FAT12/16 root directory has no free slot left.
    RootDirFull,
    DeviceTooSmall { sectors: u64 },
    DeviceTooLarge { sectors: u64 },
    /// Write-side support for this boot sector dialect does not exist.
    UnsupportedDialect,
    /// A caller-supplied value does not fit the on-disk field.
    InvalidArgument(&'static str),
    ReadOnly,
    Closed,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Device(err) => write!(f, "device I/O error: {}", err),
            FsError::UnrecognizedFormat => write!(f, "disk format not recognized"),
            FsError::FatMismatch { copy } => {
                write!(f, "FAT {} differs from FAT 0", copy)
            }
            FsError::FatChainCycle { head } => {
                write!(f, "cluster chain starting at {} contains a cycle", head)
            }
            FsError::BadClusterInChain { cluster, value } => {
                write!(f, "entry for cluster {} is unusable ({:#x})", cluster, value)
            }
            FsError::FsInfoStale { fat_free, fsinfo_free } => write!(
                f,
                "free cluster count mismatch - fat: {} - fsinfo: {}",
                fat_free, fsinfo_free
            ),
            FsError::FsInfoInvalid => write!(f, "invalid FSInfo sector signatures"),
            FsError::DirTerminatorMissing => write!(f, "directory lacks a terminator entry"),
            FsError::NotFound => write!(f, "no entry with that name"),
            FsError::NotDirectory => write!(f, "entry is not a directory"),
            FsError::NotFile => write!(f, "entry is not a file"),
            FsError::DirectoryNotEmpty => write!(f, "directory is not empty"),
            FsError::NameTooLong => write!(f, "name exceeds 255 UCS-2 units"),
            FsError::IllegalShortName => write!(f, "not a legal 8.3 name"),
            FsError::DuplicateName => write!(f, "an entry with that name already exists"),
            FsError::NoFreeCluster => write!(f, "no free cluster available"),
            FsError::RootDirFull => write!(f, "the fixed root directory is full"),
            FsError::DeviceTooSmall { sectors } => {
                write!(f, "device too small for this FAT type ({} sectors)", sectors)
            }
            FsError::DeviceTooLarge { sectors } => {
                write!(f, "device too large for this FAT type ({} sectors)", sectors)
            }
            FsError::UnsupportedDialect => write!(f, "dialect has no write support"),
            FsError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            FsError::ReadOnly => write!(f, "file system is read-only"),
            FsError::Closed => write!(f, "file system is closed"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        FsError::Device(err)
    }
}
