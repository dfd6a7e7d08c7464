use crate::boot::dialect::{self, TOS_BOOTABLE_MAGIC};
use crate::boot::{DIR_ENTRY_BYTES, offsets, SIGNATURE_VALUE};
use crate::error::FsError;
use crate::fat::MAX_FAT16_CLUSTERS;
use crate::sector::Sector;

/// Offsets specific to the FAT12/16 boot sector layout.
pub const SECTORS_PER_FAT_OFFSET: usize = 0x16;
pub const EXTENDED_BOOT_SIGNATURE_OFFSET: usize = 0x26;
pub const VOLUME_LABEL_OFFSET: usize = 0x2B;
pub const FILE_SYSTEM_TYPE_OFFSET: usize = 0x36;

pub const DEFAULT_ROOT_DIR_ENTRY_COUNT: u32 = 512;
pub const DEFAULT_VOLUME_LABEL: &str = "NO NAME";
pub const MAX_VOLUME_LABEL_LENGTH: usize = 11;

/// Field-level sanity shared by every FAT12/16 dialect: plausible cluster
/// geometry, a nonzero 16-bit sector total and FAT size, and a cluster
/// count that still fits FAT16.
fn check_fields(sector: &Sector, sector_size: u32) -> Result<(), FsError> {
    let sectors_per_cluster = sector.get8(offsets::SECTORS_PER_CLUSTER) as u32;
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(FsError::UnrecognizedFormat);
    }

    let total_sectors = sector.get16(offsets::TOTAL_SECTORS_16) as u32;
    if total_sectors == 0 {
        return Err(FsError::UnrecognizedFormat);
    }

    let fat_sectors = sector.get16(SECTORS_PER_FAT_OFFSET) as u32;
    if fat_sectors == 0 {
        return Err(FsError::UnrecognizedFormat);
    }

    let root_dir_entries = sector.get16(offsets::ROOT_DIR_ENTRIES) as u32;
    let root_dir_sectors = (root_dir_entries * DIR_ENTRY_BYTES + (sector_size - 1)) / sector_size;
    let reserved = sector.get16(offsets::RESERVED_SECTORS) as u32;
    let fat_count = sector.get8(offsets::NR_FATS) as u32;

    let used = reserved + fat_count * fat_sectors + root_dir_sectors;
    if total_sectors <= used {
        return Err(FsError::UnrecognizedFormat);
    }
    let cluster_count = (total_sectors - used) / sectors_per_cluster;
    if cluster_count > MAX_FAT16_CLUSTERS {
        return Err(FsError::UnrecognizedFormat);
    }

    Ok(())
}

pub fn check_pc(sector: &Sector, sector_size: u32) -> Result<(), FsError> {
    if !dialect::has_pc_jump(sector.as_slice()) {
        return Err(FsError::UnrecognizedFormat);
    }
    if sector.get16(offsets::SIGNATURE) != SIGNATURE_VALUE {
        return Err(FsError::UnrecognizedFormat);
    }
    check_fields(sector, sector_size)
}

/// MSX-DOS floppies carry the PC jump bytes but routinely lack the 0x55AA
/// signature.
pub fn check_msx(sector: &Sector, sector_size: u32) -> Result<(), FsError> {
    if !dialect::has_pc_jump(sector.as_slice()) {
        return Err(FsError::UnrecognizedFormat);
    }
    check_fields(sector, sector_size)
}

/// Atari TOS disks open with a 68000 branch. Returns whether the word-XOR
/// checksum marks the disk bootable; a non-bootable disk still mounts.
pub fn check_tos(sector: &Sector, sector_size: u32) -> Result<bool, FsError> {
    if !dialect::has_tos_branch(sector.as_slice()) {
        return Err(FsError::UnrecognizedFormat);
    }
    check_fields(sector, sector_size)?;
    Ok(dialect::tos_checksum(sector.as_slice()) == TOS_BOOTABLE_MAGIC)
}
