use crate::boot::Geometry;
use crate::chain::ClusterChain;
use crate::device::BlockDevice;
use crate::dir::raw::{RawDirEntry, DIR_ENTRY_SIZE};
use crate::error::FsError;
use crate::fat::Fat;

/// The backing storage of a directory: either the fixed FAT12/16 root
/// area, which can never grow, or a cluster chain.
pub enum DirStore {
    FixedRoot { offset: u64, capacity: usize },
    Chain(ClusterChain),
}

impl DirStore {
    pub fn is_fixed(&self) -> bool {
        matches!(self, DirStore::FixedRoot { .. })
    }

    /// The chain head backing this directory; 0 for the fixed root. This
    /// is the value a child's `..` entry points at.
    pub fn start_cluster(&self) -> u32 {
        match self {
            DirStore::FixedRoot { .. } => 0,
            DirStore::Chain(chain) => chain.start_cluster(),
        }
    }

    pub fn capacity(&self, geo: &Geometry, fat: &Fat) -> Result<usize, FsError> {
        match self {
            DirStore::FixedRoot { capacity, .. } => Ok(*capacity),
            DirStore::Chain(chain) => {
                Ok((chain.len_bytes(fat, geo)? / DIR_ENTRY_SIZE as u64) as usize)
            }
        }
    }

    /// Reads the raw slot sequence covering the whole extent.
    pub fn load<D: BlockDevice>(
        &self,
        dev: &mut D,
        geo: &Geometry,
        fat: &Fat,
    ) -> Result<Vec<RawDirEntry>, FsError> {
        let bytes = match self {
            DirStore::FixedRoot { offset, capacity } => {
                let mut buf = vec![0u8; capacity * DIR_ENTRY_SIZE];
                dev.read_at(*offset, &mut buf)?;
                buf
            }
            DirStore::Chain(chain) => {
                let len = chain.len_bytes(fat, geo)? as usize;
                let mut buf = vec![0u8; len];
                chain.read_at(dev, geo, fat, 0, &mut buf)?;
                buf
            }
        };

        Ok(bytes
            .chunks_exact(DIR_ENTRY_SIZE)
            .map(RawDirEntry::from_slice)
            .collect())
    }

    /// Resizes the extent to hold exactly `slot_count` slots, so that any
    /// cluster allocation happens before the FAT copies are persisted. The
    /// fixed root cannot grow and fails early instead.
    pub fn reserve<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geo: &Geometry,
        fat: &mut Fat,
        slot_count: usize,
    ) -> Result<(), FsError> {
        match self {
            DirStore::FixedRoot { capacity, .. } => {
                if slot_count > *capacity {
                    Err(FsError::RootDirFull)
                } else {
                    Ok(())
                }
            }
            DirStore::Chain(chain) => {
                let needed = ((slot_count * DIR_ENTRY_SIZE) as u64).max(1);
                chain.resize(dev, geo, fat, needed)
            }
        }
    }

    /// Writes the slot sequence back, zero-filling the unused tail so the
    /// terminator lands right after the last live slot. The chain variant
    /// is resized to fit; the fixed root fails with `RootDirFull` instead.
    pub fn save<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geo: &Geometry,
        fat: &mut Fat,
        slots: &[RawDirEntry],
    ) -> Result<(), FsError> {
        match self {
            DirStore::FixedRoot { offset, capacity } => {
                if slots.len() > *capacity {
                    return Err(FsError::RootDirFull);
                }
                let mut buf = vec![0u8; *capacity * DIR_ENTRY_SIZE];
                for (i, slot) in slots.iter().enumerate() {
                    buf[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE].copy_from_slice(&slot.0);
                }
                dev.write_at(*offset, &buf)?;
                Ok(())
            }
            DirStore::Chain(chain) => {
                // A directory always owns at least one cluster, even when
                // it holds nothing but the terminator.
                let needed = ((slots.len() * DIR_ENTRY_SIZE) as u64).max(1);
                chain.resize(dev, geo, fat, needed)?;

                let extent = chain.len_bytes(fat, geo)? as usize;
                let mut buf = vec![0u8; extent];
                for (i, slot) in slots.iter().enumerate() {
                    buf[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE].copy_from_slice(&slot.0);
                }
                chain.write_at(dev, geo, fat, 0, &buf)
            }
        }
    }
}
