use std::time::{SystemTime, UNIX_EPOCH};

use crate::boot::{BootSector, Dialect, Variant, DIR_ENTRY_BYTES};
use crate::chain::ClusterChain;
use crate::device::BlockDevice;
use crate::dir::lfn::LfnDirectory;
use crate::dir::store::DirStore;
use crate::error::FsError;
use crate::fat::{Fat, FatType, MAX_FAT12_CLUSTERS};
use crate::fs::{FatFileSystem, MountOptions};
use crate::fsinfo::FsInfoSector;

pub const MEDIUM_DESCRIPTOR_HD: u8 = 0xF8;
pub const DEFAULT_FAT_COUNT: u32 = 2;
pub const DEFAULT_SECTORS_PER_TRACK: u16 = 32;
pub const DEFAULT_HEADS: u16 = 64;

const MAX_DIRECTORY: u32 = 512;

/// Creates a FAT file system covering a whole block device, without a
/// partition table. Builder-style: configure, then `format()`.
///
/// The FAT type defaults to the largest one the device size suggests;
/// geometry follows the standard tables. Only the PC dialect has a write
/// path; MSX and Atari TOS volumes can be read but not created.
pub struct SuperFloppyFormatter<D: BlockDevice> {
    dev: D,
    dialect: Dialect,
    fat_type: FatType,
    sectors_per_cluster: u32,
    reserved_sectors: u32,
    fat_count: u32,
    label: Option<String>,
    oem_name: String,
    volume_id: Option<u32>,
}

impl<D: BlockDevice> SuperFloppyFormatter<D> {
    pub fn new(dev: D) -> Result<Self, FsError> {
        let fat_type = fat_type_from_size(dev.size());
        let mut formatter = Self {
            dev,
            dialect: Dialect::Pc,
            fat_type,
            sectors_per_cluster: 0,
            reserved_sectors: 0,
            fat_count: DEFAULT_FAT_COUNT,
            label: None,
            oem_name: crate::boot::DEFAULT_OEM_NAME.to_string(),
            volume_id: None,
        };
        formatter.apply_fat_type(fat_type)?;
        Ok(formatter)
    }

    /// Overrides the FAT type chosen from the device size. Fails when the
    /// device is out of range for the requested type.
    pub fn fat_type(mut self, fat_type: FatType) -> Result<Self, FsError> {
        if self.dialect == Dialect::AtariTos && fat_type == FatType::Fat32 {
            return Err(FsError::UnsupportedDialect);
        }
        self.apply_fat_type(fat_type)?;
        Ok(self)
    }

    /// Selects the boot sector flavor. TOS rejects FAT32 outright; the
    /// non-PC write paths themselves are rejected later, by `format()`.
    pub fn dialect(mut self, dialect: Dialect) -> Result<Self, FsError> {
        if dialect == Dialect::AtariTos && self.fat_type == FatType::Fat32 {
            return Err(FsError::UnsupportedDialect);
        }
        self.dialect = dialect;
        Ok(self)
    }

    pub fn volume_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn oem_name(mut self, name: &str) -> Self {
        self.oem_name = name.to_string();
        self
    }

    /// Fixes the FAT32 file system id instead of deriving one from the
    /// clock.
    pub fn volume_id(mut self, id: u32) -> Self {
        self.volume_id = Some(id);
        self
    }

    fn apply_fat_type(&mut self, fat_type: FatType) -> Result<(), FsError> {
        self.reserved_sectors = match fat_type {
            FatType::Fat32 => 32,
            _ => 1,
        };
        self.sectors_per_cluster = self.default_sectors_per_cluster(fat_type)?;
        self.fat_type = fat_type;
        Ok(())
    }

    fn total_sectors(&self) -> u64 {
        self.dev.size() / self.dev.sector_size() as u64
    }

    fn default_sectors_per_cluster(&self, fat_type: FatType) -> Result<u32, FsError> {
        let sectors = self.total_sectors();
        match fat_type {
            FatType::Fat32 => {
                if sectors <= 66_600 {
                    return Err(FsError::DeviceTooSmall { sectors });
                }
                Ok(if sectors > 67_108_864 {
                    64
                } else if sectors > 33_554_432 {
                    32
                } else if sectors > 16_777_216 {
                    16
                } else if sectors > 532_480 {
                    8
                } else {
                    1
                })
            }
            FatType::Fat16 => {
                if sectors <= 8_400 {
                    return Err(FsError::DeviceTooSmall { sectors });
                }
                if sectors > 4_194_304 {
                    return Err(FsError::DeviceTooLarge { sectors });
                }
                Ok(if sectors > 2_097_152 {
                    64
                } else if sectors > 1_048_576 {
                    32
                } else if sectors > 524_288 {
                    16
                } else if sectors > 262_144 {
                    8
                } else if sectors > 32_680 {
                    4
                } else {
                    2
                })
            }
            FatType::Fat12 => {
                let mut result = 1u32;
                while sectors / result as u64 > MAX_FAT12_CLUSTERS as u64 {
                    result *= 2;
                    if result * self.dev.sector_size() > 4096 {
                        return Err(FsError::DeviceTooLarge { sectors });
                    }
                }
                Ok(result)
            }
        }
    }

    fn sectors_per_fat(&self, root_dir_entries: u32, total_sectors: u64) -> u32 {
        let bps = self.dev.sector_size();
        let root_dir_sectors = (root_dir_entries * DIR_ENTRY_BYTES + (bps - 1)) / bps;
        let tmp1 = total_sectors - (self.reserved_sectors as u64 + root_dir_sectors as u64);
        let mut tmp2 = (256 * self.sectors_per_cluster + self.fat_count) as u64;
        if self.fat_type == FatType::Fat32 {
            tmp2 /= 2;
        }
        ((tmp1 + tmp2 - 1) / tmp2) as u32
    }

    fn root_directory_size(&self, total_sectors: u64) -> u32 {
        let total_bytes = total_sectors * self.dev.sector_size() as u64;
        let per_entry = 5 * DIR_ENTRY_BYTES as u64;
        if total_bytes >= MAX_DIRECTORY as u64 * per_entry {
            MAX_DIRECTORY
        } else {
            (total_bytes / per_entry) as u32
        }
    }

    /// Writes the new file system and re-mounts it through the normal
    /// read path.
    pub fn format(self) -> Result<FatFileSystem<D>, FsError> {
        if self.dialect != Dialect::Pc {
            return Err(FsError::UnsupportedDialect);
        }

        let sector_size = self.dev.sector_size();
        let total_sectors = self.total_sectors();
        let root_entries = match self.fat_type {
            FatType::Fat32 => 0,
            _ => self.root_directory_size(total_sectors),
        };
        let spf = self.sectors_per_fat(root_entries, total_sectors);

        let Self {
            mut dev,
            fat_type,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            label,
            oem_name,
            volume_id,
            ..
        } = self;

        let variant = match fat_type {
            FatType::Fat32 => Variant::Fat32,
            _ => Variant::Fat16,
        };
        let mut bs = BootSector::create(variant);
        bs.init(sector_size, total_sectors)?;
        bs.set_file_system_type_label(fat_type.label())?;
        bs.set_nr_reserved_sectors(reserved_sectors)?;
        bs.set_nr_fats(fat_count)?;
        bs.set_sectors_per_cluster(sectors_per_cluster)?;
        bs.set_medium_descriptor(MEDIUM_DESCRIPTOR_HD);
        bs.set_sectors_per_track(DEFAULT_SECTORS_PER_TRACK);
        bs.set_nr_heads(DEFAULT_HEADS);
        bs.set_oem_name(&oem_name)?;
        bs.set_sectors_per_fat(spf)?;

        match variant {
            Variant::Fat32 => {
                bs.set_fs_info_sector_nr(1)?;
                bs.set_file_system_id(volume_id.unwrap_or_else(time_seeded_id))?;
                bs.set_volume_label(label.as_deref())?;
            }
            Variant::Fat16 => {
                bs.set_root_dir_entry_count(root_entries)?;
                if let Some(label) = label.as_deref() {
                    bs.set_volume_label(Some(label))?;
                }
            }
        }

        let geo = bs.geometry()?;
        let mut fat = Fat::create(fat_type, geo.cluster_count, MEDIUM_DESCRIPTOR_HD);

        let mut fsinfo = match variant {
            Variant::Fat32 => Some(FsInfoSector::create(1, sector_size)),
            Variant::Fat16 => None,
        };

        let root_store = match variant {
            Variant::Fat32 => {
                let cluster = fat.alloc_new()?;
                bs.set_root_dir_first_cluster(cluster)?;
                DirStore::Chain(ClusterChain::new(cluster, false))
            }
            Variant::Fat16 => DirStore::FixedRoot {
                offset: bs.root_dir_offset(),
                capacity: root_entries as usize,
            },
        };

        if let Some(fsinfo) = &mut fsinfo {
            fsinfo.set_free_cluster_count(fat.free_cluster_count());
            fsinfo.set_last_allocated_cluster(fat.last_allocated_cluster());
            fsinfo.write(&mut dev)?;
        }

        let mut root = LfnDirectory::create(root_store);
        root.flush(&mut dev, &geo, &mut fat)?;

        for copy in 0..fat_count {
            fat.write_copy(&mut dev, bs.fat_offset(copy), bs.fat_region_len())?;
        }

        bs.write(&mut dev)?;
        bs.write_copy(&mut dev)?;

        // Everything is on disk; pick it up again through the regular
        // mount path, then give the volume its label.
        let mut fs = FatFileSystem::mount(dev, MountOptions::default())?;
        if let Some(label) = label.as_deref() {
            fs.set_volume_label(Some(label))?;
        }
        fs.flush()?;
        Ok(fs)
    }
}

fn fat_type_from_size(size: u64) -> FatType {
    let mib = size / (1024 * 1024);
    if mib < 5 {
        FatType::Fat12
    } else if mib < 512 {
        FatType::Fat16
    } else {
        FatType::Fat32
    }
}

/// Derives a serial number from the clock; callers wanting reproducible
/// images inject one through `volume_id`.
fn time_seeded_id() -> u32 {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32 ^ d.subsec_nanos())
        .unwrap_or(0);
    mix32(seed)
}

fn mix32(mut v: u32) -> u32 {
    v ^= v >> 16;
    v = v.wrapping_mul(0x85EB_CA6B);
    v ^= v >> 13;
    v = v.wrapping_mul(0xC2B2_AE35);
    v ^= v >> 16;
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDisk;

    #[test]
    fn fat_type_tracks_device_size() {
        assert_eq!(fat_type_from_size(4 * 1024 * 1024), FatType::Fat12);
        assert_eq!(fat_type_from_size(5 * 1024 * 1024), FatType::Fat16);
        assert_eq!(fat_type_from_size(511 * 1024 * 1024), FatType::Fat16);
        assert_eq!(fat_type_from_size(512 * 1024 * 1024), FatType::Fat32);
    }

    #[test]
    fn cluster_size_tables_match_the_reference_points() {
        let fmt = SuperFloppyFormatter::new(RamDisk::new(100 * 1024 * 1024)).unwrap();
        assert_eq!(fmt.fat_type, FatType::Fat16);
        assert_eq!(fmt.sectors_per_cluster, 4);
        assert_eq!(fmt.reserved_sectors, 1);

        let fmt = SuperFloppyFormatter::new(RamDisk::new(1024 * 1024 * 1024)).unwrap();
        assert_eq!(fmt.fat_type, FatType::Fat32);
        assert_eq!(fmt.sectors_per_cluster, 8);
        assert_eq!(fmt.reserved_sectors, 32);
    }

    #[test]
    fn undersized_devices_are_rejected_per_type() {
        let dev = RamDisk::new(4 * 1024 * 1024);
        assert!(matches!(
            SuperFloppyFormatter::new(dev)
                .unwrap()
                .fat_type(FatType::Fat32),
            Err(FsError::DeviceTooSmall { .. })
        ));

        let dev = RamDisk::new(2 * 1024 * 1024);
        assert!(matches!(
            SuperFloppyFormatter::new(dev)
                .unwrap()
                .fat_type(FatType::Fat16),
            Err(FsError::DeviceTooSmall { .. })
        ));
    }

    #[test]
    fn non_pc_dialects_have_no_write_path() {
        let dev = RamDisk::new(8 * 1024 * 1024);
        let result = SuperFloppyFormatter::new(dev)
            .unwrap()
            .dialect(Dialect::Msx)
            .unwrap()
            .format();
        assert!(matches!(result, Err(FsError::UnsupportedDialect)));

        let dev = RamDisk::new(1024 * 1024 * 1024);
        assert!(matches!(
            SuperFloppyFormatter::new(dev).unwrap().dialect(Dialect::AtariTos),
            Err(FsError::UnsupportedDialect)
        ));
    }

    #[test]
    fn formatted_fat12_volume_mounts_cleanly() {
        let dev = RamDisk::new(8 * 1024 * 1024);
        let fs = SuperFloppyFormatter::new(dev)
            .unwrap()
            .volume_label("TEST")
            .format()
            .unwrap();

        assert_eq!(fs.fat_type(), FatType::Fat12);
        assert_eq!(fs.volume_label().unwrap().as_deref(), Some("TEST"));
        assert!(fs.list_dir(fs.root()).unwrap().is_empty());
    }

    #[test]
    fn formatter_math_helpers_are_consistent() {
        let fmt = SuperFloppyFormatter::new(RamDisk::new(100 * 1024 * 1024)).unwrap();
        let total = fmt.total_sectors();
        assert_eq!(total, 204_800);
        assert_eq!(fmt.root_directory_size(total), 512);
        assert_eq!(fmt.sectors_per_fat(512, total), 200);
    }
}
