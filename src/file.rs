use crate::boot::Geometry;
use crate::chain::ClusterChain;
use crate::device::BlockDevice;
use crate::error::FsError;
use crate::fat::Fat;

/// A cluster-chain-backed file. The logical size lives here (and in the
/// short directory entry), distinct from the cluster-aligned chain length.
pub struct FatFile {
    chain: ClusterChain,
    size: u32,
}

impl FatFile {
    pub fn new(start_cluster: u32, size: u32, read_only: bool) -> Self {
        Self {
            chain: ClusterChain::new(start_cluster, read_only),
            size,
        }
    }

    pub fn len(&self) -> u64 {
        self.size as u64
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn start_cluster(&self) -> u32 {
        self.chain.start_cluster()
    }

    /// Reads `min(buf.len(), len() - offset)` bytes; reads past the end
    /// are short, not zero-padded.
    pub fn read<D: BlockDevice>(
        &self,
        dev: &mut D,
        geo: &Geometry,
        fat: &Fat,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, FsError> {
        if offset >= self.size as u64 {
            return Ok(0);
        }
        let want = buf.len().min((self.size as u64 - offset) as usize);
        self.chain.read_at(dev, geo, fat, offset, &mut buf[..want])
    }

    /// Writes at `offset`, growing the chain and the logical size as
    /// needed. Never shrinks.
    pub fn write<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geo: &Geometry,
        fat: &mut Fat,
        offset: u64,
        buf: &[u8],
    ) -> Result<(), FsError> {
        let end = offset + buf.len() as u64;
        if end > u32::MAX as u64 {
            return Err(FsError::InvalidArgument("file size limit is 4 GiB"));
        }

        self.chain.write_at(dev, geo, fat, offset, buf)?;
        if end as u32 > self.size {
            self.size = end as u32;
        }
        Ok(())
    }

    /// Truncates or extends to exactly `new_len` bytes. Extension
    /// zero-fills; truncation frees the cut-off clusters.
    pub fn set_len<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geo: &Geometry,
        fat: &mut Fat,
        new_len: u32,
    ) -> Result<(), FsError> {
        self.chain.resize(dev, geo, fat, new_len as u64)?;
        self.size = new_len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDisk;
    use crate::fat::FatType;

    fn setup() -> (RamDisk, Geometry, Fat) {
        let geo = Geometry {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            bytes_per_cluster: 512,
            files_offset: 1024,
            cluster_count: 64,
        };
        (RamDisk::new(64 * 1024), geo, Fat::create(FatType::Fat16, 64, 0xF8))
    }

    #[test]
    fn logical_size_bounds_reads() {
        let (mut dev, geo, mut fat) = setup();
        let mut file = FatFile::new(0, 0, false);
        file.write(&mut dev, &geo, &mut fat, 0, b"ABC").unwrap();
        assert_eq!(file.len(), 3);

        // The chain holds a whole cluster, the file only three bytes.
        let mut buf = [0u8; 512];
        assert_eq!(file.read(&mut dev, &geo, &fat, 0, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"ABC");
        assert_eq!(file.read(&mut dev, &geo, &fat, 3, &mut buf).unwrap(), 0);
    }

    #[test]
    fn empty_file_owns_no_cluster() {
        let file = FatFile::new(0, 0, false);
        assert_eq!(file.start_cluster(), 0);
        assert!(file.is_empty());
    }

    #[test]
    fn truncation_releases_clusters() {
        let (mut dev, geo, mut fat) = setup();
        let mut file = FatFile::new(0, 0, false);
        file.write(&mut dev, &geo, &mut fat, 0, &[9u8; 2048]).unwrap();
        assert_eq!(fat.free_cluster_count(), 60);

        file.set_len(&mut dev, &geo, &mut fat, 700).unwrap();
        assert_eq!(file.len(), 700);
        assert_eq!(fat.free_cluster_count(), 62);

        file.set_len(&mut dev, &geo, &mut fat, 0).unwrap();
        assert_eq!(file.start_cluster(), 0);
        assert_eq!(fat.free_cluster_count(), 64);
    }

    #[test]
    fn sparse_extension_zero_fills() {
        let (mut dev, geo, mut fat) = setup();
        let mut file = FatFile::new(0, 0, false);
        file.write(&mut dev, &geo, &mut fat, 0, b"head").unwrap();
        file.write(&mut dev, &geo, &mut fat, 1000, b"tail").unwrap();
        assert_eq!(file.len(), 1004);

        let mut buf = vec![0xFFu8; 1004];
        assert_eq!(file.read(&mut dev, &geo, &fat, 0, &mut buf).unwrap(), 1004);
        assert_eq!(&buf[..4], b"head");
        assert!(buf[4..1000].iter().all(|&b| b == 0));
        assert_eq!(&buf[1000..], b"tail");
    }
}
