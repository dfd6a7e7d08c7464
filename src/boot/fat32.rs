use crate::boot::dialect;
use crate::boot::{offsets, SIGNATURE_VALUE};
use crate::error::FsError;
use crate::fat::MIN_CLUSTER;
use crate::sector::Sector;

/// Offsets specific to the FAT32 boot sector layout.
pub const SECTORS_PER_FAT_OFFSET: usize = 0x24;
pub const VERSION_OFFSET: usize = 0x2A;
pub const ROOT_DIR_FIRST_CLUSTER_OFFSET: usize = 0x2C;
pub const FS_INFO_SECTOR_OFFSET: usize = 0x30;
pub const BOOT_SECTOR_COPY_OFFSET: usize = 0x32;
pub const EXTENDED_BOOT_SIGNATURE_OFFSET: usize = 0x42;
pub const FILE_SYSTEM_ID_OFFSET: usize = 0x43;
pub const VOLUME_LABEL_OFFSET: usize = 0x47;
pub const FILE_SYSTEM_TYPE_OFFSET: usize = 0x52;

pub const VERSION: u16 = 0;
pub const DEFAULT_BOOT_SECTOR_COPY: u16 = 6;

/// A FAT32 boot sector keeps the 16-bit sector total and FAT size at zero
/// and uses the 32-bit fields instead; anything else is one of the older
/// layouts.
pub fn check_pc(sector: &Sector, _sector_size: u32) -> Result<(), FsError> {
    if !dialect::has_pc_jump(sector.as_slice()) {
        return Err(FsError::UnrecognizedFormat);
    }
    if sector.get16(offsets::SIGNATURE) != SIGNATURE_VALUE {
        return Err(FsError::UnrecognizedFormat);
    }

    let sectors_per_cluster = sector.get8(offsets::SECTORS_PER_CLUSTER) as u32;
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(FsError::UnrecognizedFormat);
    }

    if sector.get16(offsets::TOTAL_SECTORS_16) != 0 {
        return Err(FsError::UnrecognizedFormat);
    }
    if sector.get32(offsets::TOTAL_SECTORS_32) == 0 {
        return Err(FsError::UnrecognizedFormat);
    }
    if sector.get16(super::fat16::SECTORS_PER_FAT_OFFSET) != 0 {
        return Err(FsError::UnrecognizedFormat);
    }
    if sector.get32(SECTORS_PER_FAT_OFFSET) == 0 {
        return Err(FsError::UnrecognizedFormat);
    }
    if sector.get32(ROOT_DIR_FIRST_CLUSTER_OFFSET) < MIN_CLUSTER {
        return Err(FsError::UnrecognizedFormat);
    }

    Ok(())
}
