pub mod dialect;
pub mod fat16;
pub mod fat32;

use log::debug;

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::fat::{FatType, MAX_FAT16_CLUSTERS};
use crate::sector::Sector;

pub use dialect::Dialect;

/// A boot sector is always 512 bytes, independent of the device sector
/// size.
pub const BOOT_SECTOR_SIZE: usize = 512;
pub const SIGNATURE_VALUE: u16 = 0xAA55;
pub const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;
pub const DIR_ENTRY_BYTES: u32 = 32;

pub const DEFAULT_OEM_NAME: &str = "fatvolib";

/// Byte offsets shared by all boot sector variants.
pub mod offsets {
    pub const JUMP: usize = 0x00;
    pub const OEM_NAME: usize = 0x03;
    pub const BYTES_PER_SECTOR: usize = 0x0B;
    pub const SECTORS_PER_CLUSTER: usize = 0x0D;
    pub const RESERVED_SECTORS: usize = 0x0E;
    pub const NR_FATS: usize = 0x10;
    pub const ROOT_DIR_ENTRIES: usize = 0x11;
    pub const TOTAL_SECTORS_16: usize = 0x13;
    pub const MEDIUM_DESCRIPTOR: usize = 0x15;
    pub const SECTORS_PER_TRACK: usize = 0x18;
    pub const NR_HEADS: usize = 0x1A;
    pub const HIDDEN_SECTORS: usize = 0x1C;
    pub const TOTAL_SECTORS_32: usize = 0x20;
    pub const SIGNATURE: usize = 0x1FE;
}

/// Which of the two on-disk layouts the sector uses beyond offset 0x24.
/// `Fat16` covers both FAT12 and FAT16; the split between those is decided
/// by the cluster count.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Variant {
    Fat16,
    Fat32,
}

/// The parsed boot sector plus the dialect that accepted it.
pub struct BootSector {
    sector: Sector,
    variant: Variant,
    dialect: Dialect,
    bootable: bool,
}

/// Derived placement numbers used by cluster and directory I/O.
#[derive(Clone, Copy, Debug)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,
    pub files_offset: u64,
    pub cluster_count: u32,
}

impl BootSector {
    /// Reads sector 0 and tries the known dialects in order: PC FAT16, PC
    /// FAT32, MSX, Atari TOS. The first one whose checks pass wins.
    pub fn detect<D: BlockDevice>(dev: &mut D) -> Result<Self, FsError> {
        let sector = Sector::read(dev, 0, BOOT_SECTOR_SIZE)?;
        let sector_size = dev.sector_size();

        match fat16::check_pc(&sector, sector_size) {
            Ok(()) => {
                return Ok(Self {
                    sector,
                    variant: Variant::Fat16,
                    dialect: Dialect::Pc,
                    bootable: true,
                })
            }
            Err(err) => debug!("not a PC FAT12/16 boot sector: {}", err),
        }

        match fat32::check_pc(&sector, sector_size) {
            Ok(()) => {
                return Ok(Self {
                    sector,
                    variant: Variant::Fat32,
                    dialect: Dialect::Pc,
                    bootable: true,
                })
            }
            Err(err) => debug!("not a PC FAT32 boot sector: {}", err),
        }

        match fat16::check_msx(&sector, sector_size) {
            Ok(()) => {
                return Ok(Self {
                    sector,
                    variant: Variant::Fat16,
                    dialect: Dialect::Msx,
                    bootable: true,
                })
            }
            Err(err) => debug!("not an MSX boot sector: {}", err),
        }

        match fat16::check_tos(&sector, sector_size) {
            Ok(bootable) => {
                return Ok(Self {
                    sector,
                    variant: Variant::Fat16,
                    dialect: Dialect::AtariTos,
                    bootable,
                })
            }
            Err(err) => debug!("not an Atari TOS boot sector: {}", err),
        }

        Err(FsError::UnrecognizedFormat)
    }

    /// A blank, dirty boot sector for the formatter.
    pub fn create(variant: Variant) -> Self {
        Self {
            sector: Sector::new(0, BOOT_SECTOR_SIZE),
            variant,
            dialect: Dialect::Pc,
            bootable: true,
        }
    }

    /// Writes the invariant scaffolding of a fresh boot sector: jump bytes,
    /// OEM name, geometry skeleton, extended boot signature and the 0x55AA
    /// trailer, plus the variant defaults.
    pub fn init(&mut self, sector_size: u32, sector_count: u64) -> Result<(), FsError> {
        self.sector.set8(offsets::JUMP, 0xEB);
        self.sector.set8(offsets::JUMP + 1, 0x3C);
        self.sector.set8(offsets::JUMP + 2, 0x90);

        self.set_bytes_per_sector(sector_size)?;
        self.set_sector_count(sector_count)?;
        self.set_oem_name(DEFAULT_OEM_NAME)?;
        self.sector
            .set8(self.extended_boot_signature_offset(), EXTENDED_BOOT_SIGNATURE);
        self.sector.set16(offsets::SIGNATURE, SIGNATURE_VALUE);

        match self.variant {
            Variant::Fat16 => {
                self.set_root_dir_entry_count(fat16::DEFAULT_ROOT_DIR_ENTRY_COUNT)?;
                self.set_volume_label(Some(fat16::DEFAULT_VOLUME_LABEL))?;
            }
            Variant::Fat32 => {
                self.sector.set16(fat32::VERSION_OFFSET, fat32::VERSION);
                self.set_boot_sector_copy_sector(fat32::DEFAULT_BOOT_SECTOR_COPY)?;
            }
        }
        Ok(())
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Only meaningful for Atari TOS disks, where the boot sector checksum
    /// decides bootability.
    pub fn is_bootable(&self) -> bool {
        self.bootable
    }

    pub fn is_dirty(&self) -> bool {
        self.sector.is_dirty()
    }

    pub fn write<D: BlockDevice>(&mut self, dev: &mut D) -> Result<(), FsError> {
        self.sector.write(dev)
    }

    /// Writes the FAT32 boot sector copy when one is configured.
    pub fn write_copy<D: BlockDevice>(&self, dev: &mut D) -> Result<(), FsError> {
        if self.variant != Variant::Fat32 {
            return Ok(());
        }
        let copy_sector = self.boot_sector_copy_sector();
        if copy_sector > 0 {
            let offset = copy_sector as u64 * self.bytes_per_sector() as u64;
            self.sector.write_to(dev, offset)?;
        }
        Ok(())
    }

    pub fn fat_type(&self) -> Result<FatType, FsError> {
        match self.variant {
            Variant::Fat32 => Ok(FatType::Fat32),
            Variant::Fat16 => {
                let count = self.data_cluster_count()?;
                if count > MAX_FAT16_CLUSTERS {
                    return Err(FsError::UnrecognizedFormat);
                }
                Ok(FatType::from_cluster_count(count))
            }
        }
    }

    pub fn oem_name(&self) -> String {
        self.sector
            .bytes(offsets::OEM_NAME, 8)
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as char)
            .collect()
    }

    pub fn set_oem_name(&mut self, name: &str) -> Result<(), FsError> {
        if name.len() > 8 || !name.is_ascii() {
            return Err(FsError::InvalidArgument("OEM name"));
        }
        let mut bytes = [0u8; 8];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        self.sector.set_bytes(offsets::OEM_NAME, &bytes);
        Ok(())
    }

    pub fn bytes_per_sector(&self) -> u32 {
        self.sector.get16(offsets::BYTES_PER_SECTOR) as u32
    }

    pub fn set_bytes_per_sector(&mut self, value: u32) -> Result<(), FsError> {
        match value {
            512 | 1024 | 2048 | 4096 => {
                self.sector.set16(offsets::BYTES_PER_SECTOR, value as u16);
                Ok(())
            }
            _ => Err(FsError::InvalidArgument("bytes per sector")),
        }
    }

    pub fn sectors_per_cluster(&self) -> u32 {
        self.sector.get8(offsets::SECTORS_PER_CLUSTER) as u32
    }

    pub fn set_sectors_per_cluster(&mut self, value: u32) -> Result<(), FsError> {
        if value == 0 || value > 128 || !value.is_power_of_two() {
            return Err(FsError::InvalidArgument("sectors per cluster"));
        }
        self.sector.set8(offsets::SECTORS_PER_CLUSTER, value as u8);
        Ok(())
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector() * self.sectors_per_cluster()
    }

    pub fn nr_reserved_sectors(&self) -> u32 {
        self.sector.get16(offsets::RESERVED_SECTORS) as u32
    }

    pub fn set_nr_reserved_sectors(&mut self, value: u32) -> Result<(), FsError> {
        if value < 1 || value > u16::MAX as u32 {
            return Err(FsError::InvalidArgument("reserved sectors"));
        }
        self.sector.set16(offsets::RESERVED_SECTORS, value as u16);
        Ok(())
    }

    pub fn nr_fats(&self) -> u32 {
        self.sector.get8(offsets::NR_FATS) as u32
    }

    pub fn set_nr_fats(&mut self, value: u32) -> Result<(), FsError> {
        if value == 0 || value > u8::MAX as u32 {
            return Err(FsError::InvalidArgument("FAT count"));
        }
        self.sector.set8(offsets::NR_FATS, value as u8);
        Ok(())
    }

    /// Always 0 on FAT32, where the root directory is a cluster chain.
    pub fn root_dir_entry_count(&self) -> u32 {
        match self.variant {
            Variant::Fat32 => 0,
            Variant::Fat16 => self.sector.get16(offsets::ROOT_DIR_ENTRIES) as u32,
        }
    }

    pub fn set_root_dir_entry_count(&mut self, value: u32) -> Result<(), FsError> {
        if self.variant != Variant::Fat16 || value > u16::MAX as u32 {
            return Err(FsError::InvalidArgument("root directory entry count"));
        }
        self.sector.set16(offsets::ROOT_DIR_ENTRIES, value as u16);
        Ok(())
    }

    pub fn sector_count(&self) -> u64 {
        match self.variant {
            Variant::Fat16 => {
                let small = self.sector.get16(offsets::TOTAL_SECTORS_16) as u64;
                if small != 0 {
                    small
                } else {
                    self.sector.get32(offsets::TOTAL_SECTORS_32) as u64
                }
            }
            Variant::Fat32 => self.sector.get32(offsets::TOTAL_SECTORS_32) as u64,
        }
    }

    pub fn set_sector_count(&mut self, count: u64) -> Result<(), FsError> {
        if count > u32::MAX as u64 {
            return Err(FsError::InvalidArgument("sector count"));
        }
        match self.variant {
            Variant::Fat16 if count <= u16::MAX as u64 => {
                self.sector.set16(offsets::TOTAL_SECTORS_16, count as u16);
                self.sector.set32(offsets::TOTAL_SECTORS_32, 0);
            }
            _ => {
                self.sector.set16(offsets::TOTAL_SECTORS_16, 0);
                self.sector.set32(offsets::TOTAL_SECTORS_32, count as u32);
            }
        }
        Ok(())
    }

    pub fn medium_descriptor(&self) -> u8 {
        self.sector.get8(offsets::MEDIUM_DESCRIPTOR)
    }

    pub fn set_medium_descriptor(&mut self, value: u8) {
        self.sector.set8(offsets::MEDIUM_DESCRIPTOR, value);
    }

    pub fn sectors_per_track(&self) -> u32 {
        self.sector.get16(offsets::SECTORS_PER_TRACK) as u32
    }

    pub fn set_sectors_per_track(&mut self, value: u16) {
        self.sector.set16(offsets::SECTORS_PER_TRACK, value);
    }

    pub fn nr_heads(&self) -> u32 {
        self.sector.get16(offsets::NR_HEADS) as u32
    }

    pub fn set_nr_heads(&mut self, value: u16) {
        self.sector.set16(offsets::NR_HEADS, value);
    }

    pub fn nr_hidden_sectors(&self) -> u32 {
        self.sector.get32(offsets::HIDDEN_SECTORS)
    }

    pub fn set_nr_hidden_sectors(&mut self, value: u32) {
        self.sector.set32(offsets::HIDDEN_SECTORS, value);
    }

    pub fn sectors_per_fat(&self) -> u32 {
        match self.variant {
            Variant::Fat16 => self.sector.get16(fat16::SECTORS_PER_FAT_OFFSET) as u32,
            Variant::Fat32 => self.sector.get32(fat32::SECTORS_PER_FAT_OFFSET),
        }
    }

    pub fn set_sectors_per_fat(&mut self, value: u32) -> Result<(), FsError> {
        match self.variant {
            Variant::Fat16 => {
                if value > 0x7FFF {
                    return Err(FsError::InvalidArgument("too many sectors for a FAT12/16"));
                }
                self.sector.set16(fat16::SECTORS_PER_FAT_OFFSET, value as u16);
            }
            Variant::Fat32 => self.sector.set32(fat32::SECTORS_PER_FAT_OFFSET, value),
        }
        Ok(())
    }

    /// The boot-sector copy of the volume label. FAT32 keeps the label in
    /// the root directory only; reading it here yields `None`.
    pub fn volume_label(&self) -> Option<String> {
        match self.variant {
            Variant::Fat32 => None,
            Variant::Fat16 => {
                let label: String = self
                    .sector
                    .bytes(fat16::VOLUME_LABEL_OFFSET, fat16::MAX_VOLUME_LABEL_LENGTH)
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as char)
                    .collect();
                Some(label.trim_end().to_string())
            }
        }
    }

    pub fn set_volume_label(&mut self, label: Option<&str>) -> Result<(), FsError> {
        let label_bytes = label.unwrap_or("").as_bytes();
        if label_bytes.len() > fat16::MAX_VOLUME_LABEL_LENGTH {
            return Err(FsError::InvalidArgument("volume label too long"));
        }

        match self.variant {
            Variant::Fat16 => {
                let mut bytes = [0u8; fat16::MAX_VOLUME_LABEL_LENGTH];
                bytes[..label_bytes.len()].copy_from_slice(label_bytes);
                self.sector.set_bytes(fat16::VOLUME_LABEL_OFFSET, &bytes);
            }
            Variant::Fat32 => {
                let mut bytes = [0x20u8; fat16::MAX_VOLUME_LABEL_LENGTH];
                bytes[..label_bytes.len()].copy_from_slice(label_bytes);
                if label.is_none() {
                    bytes = [0u8; fat16::MAX_VOLUME_LABEL_LENGTH];
                }
                self.sector.set_bytes(fat32::VOLUME_LABEL_OFFSET, &bytes);
            }
        }
        Ok(())
    }

    pub fn root_dir_first_cluster(&self) -> Result<u32, FsError> {
        match self.variant {
            Variant::Fat32 => Ok(self.sector.get32(fat32::ROOT_DIR_FIRST_CLUSTER_OFFSET)),
            Variant::Fat16 => Err(FsError::InvalidArgument(
                "root directory cluster exists on FAT32 only",
            )),
        }
    }

    pub fn set_root_dir_first_cluster(&mut self, cluster: u32) -> Result<(), FsError> {
        match self.variant {
            Variant::Fat32 => {
                self.sector
                    .set32(fat32::ROOT_DIR_FIRST_CLUSTER_OFFSET, cluster);
                Ok(())
            }
            Variant::Fat16 => Err(FsError::InvalidArgument(
                "root directory cluster exists on FAT32 only",
            )),
        }
    }

    pub fn fs_info_sector_nr(&self) -> Result<u32, FsError> {
        match self.variant {
            Variant::Fat32 => Ok(self.sector.get16(fat32::FS_INFO_SECTOR_OFFSET) as u32),
            Variant::Fat16 => Err(FsError::InvalidArgument("FSInfo exists on FAT32 only")),
        }
    }

    pub fn set_fs_info_sector_nr(&mut self, sector_nr: u16) -> Result<(), FsError> {
        match self.variant {
            Variant::Fat32 => {
                self.sector.set16(fat32::FS_INFO_SECTOR_OFFSET, sector_nr);
                Ok(())
            }
            Variant::Fat16 => Err(FsError::InvalidArgument("FSInfo exists on FAT32 only")),
        }
    }

    pub fn boot_sector_copy_sector(&self) -> u32 {
        match self.variant {
            Variant::Fat32 => self.sector.get16(fat32::BOOT_SECTOR_COPY_OFFSET) as u32,
            Variant::Fat16 => 0,
        }
    }

    pub fn set_boot_sector_copy_sector(&mut self, sector_nr: u16) -> Result<(), FsError> {
        match self.variant {
            Variant::Fat32 => {
                self.sector.set16(fat32::BOOT_SECTOR_COPY_OFFSET, sector_nr);
                Ok(())
            }
            Variant::Fat16 => Err(FsError::InvalidArgument(
                "boot sector copy exists on FAT32 only",
            )),
        }
    }

    pub fn file_system_id(&self) -> Result<u32, FsError> {
        match self.variant {
            Variant::Fat32 => Ok(self.sector.get32(fat32::FILE_SYSTEM_ID_OFFSET)),
            Variant::Fat16 => Err(FsError::InvalidArgument(
                "file system id exists on FAT32 only",
            )),
        }
    }

    pub fn set_file_system_id(&mut self, id: u32) -> Result<(), FsError> {
        match self.variant {
            Variant::Fat32 => {
                self.sector.set32(fat32::FILE_SYSTEM_ID_OFFSET, id);
                Ok(())
            }
            Variant::Fat16 => Err(FsError::InvalidArgument(
                "file system id exists on FAT32 only",
            )),
        }
    }

    fn file_system_type_offset(&self) -> usize {
        match self.variant {
            Variant::Fat16 => fat16::FILE_SYSTEM_TYPE_OFFSET,
            Variant::Fat32 => fat32::FILE_SYSTEM_TYPE_OFFSET,
        }
    }

    fn extended_boot_signature_offset(&self) -> usize {
        match self.variant {
            Variant::Fat16 => fat16::EXTENDED_BOOT_SIGNATURE_OFFSET,
            Variant::Fat32 => fat32::EXTENDED_BOOT_SIGNATURE_OFFSET,
        }
    }

    /// The informational type string, e.g. `"FAT16   "`. Never used for
    /// the type decision.
    pub fn file_system_type_label(&self) -> String {
        self.sector
            .bytes(self.file_system_type_offset(), 8)
            .iter()
            .map(|&c| c as char)
            .collect()
    }

    pub fn set_file_system_type_label(&mut self, label: &str) -> Result<(), FsError> {
        if label.len() != 8 || !label.is_ascii() {
            return Err(FsError::InvalidArgument("type label must be 8 characters"));
        }
        let offset = self.file_system_type_offset();
        self.sector.set_bytes(offset, label.as_bytes());
        Ok(())
    }

    pub fn fat_offset(&self, fat_nr: u32) -> u64 {
        let sector_size = self.bytes_per_sector() as u64;
        let fat_size = self.sectors_per_fat() as u64 * sector_size;
        self.nr_reserved_sectors() as u64 * sector_size + fat_nr as u64 * fat_size
    }

    /// The byte length of one FAT copy on disk.
    pub fn fat_region_len(&self) -> usize {
        (self.sectors_per_fat() as u64 * self.bytes_per_sector() as u64) as usize
    }

    /// Start of the fixed root directory area (meaningful for FAT12/16).
    pub fn root_dir_offset(&self) -> u64 {
        self.fat_offset(self.nr_fats())
    }

    /// Start of the data area holding cluster 2.
    pub fn files_offset(&self) -> u64 {
        self.root_dir_offset() + self.root_dir_entry_count() as u64 * DIR_ENTRY_BYTES as u64
    }

    pub fn data_cluster_count(&self) -> Result<u32, FsError> {
        let bytes_per_cluster = self.bytes_per_cluster() as u64;
        if bytes_per_cluster == 0 {
            return Err(FsError::UnrecognizedFormat);
        }
        let total = self.sector_count() * self.bytes_per_sector() as u64;
        let files_offset = self.files_offset();
        if total <= files_offset {
            return Err(FsError::UnrecognizedFormat);
        }
        Ok(((total - files_offset) / bytes_per_cluster) as u32)
    }

    pub fn geometry(&self) -> Result<Geometry, FsError> {
        Ok(Geometry {
            bytes_per_sector: self.bytes_per_sector(),
            sectors_per_cluster: self.sectors_per_cluster(),
            bytes_per_cluster: self.bytes_per_cluster(),
            files_offset: self.files_offset(),
            cluster_count: self.data_cluster_count()?,
        })
    }
}

impl Geometry {
    /// Device byte offset of a position inside a data cluster.
    pub fn cluster_offset(&self, cluster: u32, within: u32) -> u64 {
        self.files_offset
            + (cluster as u64 - crate::fat::MIN_CLUSTER as u64) * self.bytes_per_cluster as u64
            + within as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDisk;

    fn synth_fat16(dev: &mut RamDisk) {
        let mut bs = BootSector::create(Variant::Fat16);
        bs.init(512, 40960).unwrap();
        bs.set_nr_reserved_sectors(1).unwrap();
        bs.set_nr_fats(2).unwrap();
        bs.set_sectors_per_cluster(4).unwrap();
        bs.set_sectors_per_fat(40).unwrap();
        bs.set_medium_descriptor(0xF8);
        bs.write(dev).unwrap();
    }

    #[test]
    fn detect_accepts_a_pc_fat16_volume() {
        let mut dev = RamDisk::new(64 * 1024);
        synth_fat16(&mut dev);

        let bs = BootSector::detect(&mut dev).unwrap();
        assert_eq!(bs.variant(), Variant::Fat16);
        assert_eq!(bs.dialect(), Dialect::Pc);
        assert_eq!(bs.bytes_per_sector(), 512);
        assert_eq!(bs.sectors_per_cluster(), 4);
        assert_eq!(bs.volume_label().as_deref(), Some("NO NAME"));
    }

    #[test]
    fn detect_rejects_an_empty_device() {
        let mut dev = RamDisk::new(64 * 1024);
        assert!(matches!(
            BootSector::detect(&mut dev),
            Err(FsError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn msx_volume_without_signature_falls_through_to_msx() {
        let mut dev = RamDisk::new(64 * 1024);
        synth_fat16(&mut dev);

        // Clear the 0x55AA signature; the PC probes must now fail while the
        // MSX probe still accepts the jump bytes.
        let mut first = [0u8; 512];
        dev.read_at(0, &mut first).unwrap();
        first[0x1FE] = 0;
        first[0x1FF] = 0;
        dev.write_at(0, &first).unwrap();

        let bs = BootSector::detect(&mut dev).unwrap();
        assert_eq!(bs.dialect(), Dialect::Msx);
    }

    #[test]
    fn tos_volume_is_detected_with_bootable_flag() {
        let mut dev = RamDisk::new(64 * 1024);
        synth_fat16(&mut dev);

        let mut first = [0u8; 512];
        dev.read_at(0, &mut first).unwrap();
        first[0] = 0x60;
        first[0x1FE] = 0;
        first[0x1FF] = 0;
        // Balance the checksum to the bootable magic using a free word in
        // the boot code area.
        first[0x100] = 0;
        first[0x101] = 0;
        let sum = dialect::tos_checksum(&first);
        let fix = (sum ^ dialect::TOS_BOOTABLE_MAGIC).to_be_bytes();
        first[0x100] = fix[0];
        first[0x101] = fix[1];
        dev.write_at(0, &first).unwrap();

        let bs = BootSector::detect(&mut dev).unwrap();
        assert_eq!(bs.dialect(), Dialect::AtariTos);
        assert!(bs.is_bootable());
    }

    #[test]
    fn geometry_places_the_data_area_after_the_root_directory() {
        let mut dev = RamDisk::new(64 * 1024);
        synth_fat16(&mut dev);
        let bs = BootSector::detect(&mut dev).unwrap();

        assert_eq!(bs.fat_offset(0), 512);
        assert_eq!(bs.fat_offset(1), 512 + 40 * 512);
        assert_eq!(bs.root_dir_offset(), 512 + 2 * 40 * 512);
        assert_eq!(bs.files_offset(), bs.root_dir_offset() + 512 * 32);

        let geo = bs.geometry().unwrap();
        assert_eq!(geo.bytes_per_cluster, 2048);
        assert_eq!(
            geo.cluster_offset(2, 0),
            bs.files_offset()
        );
        assert_eq!(geo.cluster_offset(3, 10), bs.files_offset() + 2048 + 10);
    }

    #[test]
    fn sector_count_switches_to_the_32_bit_field() {
        let mut bs = BootSector::create(Variant::Fat16);
        bs.set_sector_count(40_000).unwrap();
        assert_eq!(bs.sector_count(), 40_000);

        bs.set_sector_count(100_000).unwrap();
        assert_eq!(bs.sector_count(), 100_000);
    }
}
