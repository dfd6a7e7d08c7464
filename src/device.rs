use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Byte-addressable random-access storage a FAT volume lives on.
///
/// Offsets passed to `read_at` and `write_at` are always aligned to
/// `sector_size()` by this library, and lengths are multiples of it.
pub trait BlockDevice {
    /// Total capacity in bytes.
    fn size(&self) -> u64;

    /// The storage unit in bytes, usually 512.
    fn sector_size(&self) -> u32;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Pushes buffered writes down to durable storage.
    fn flush(&mut self) -> io::Result<()>;

    fn is_read_only(&self) -> bool {
        false
    }
}

/// An in-memory block device.
pub struct RamDisk {
    data: Vec<u8>,
    sector_size: u32,
    read_only: bool,
}

impl RamDisk {
    pub fn new(size: usize) -> Self {
        Self::with_sector_size(size, DEFAULT_SECTOR_SIZE)
    }

    pub fn with_sector_size(size: usize, sector_size: u32) -> Self {
        Self {
            data: vec![0; size],
            sector_size,
            read_only: false,
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn check_range(&self, offset: u64, len: usize) -> io::Result<usize> {
        let offset = offset as usize;
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.data.len() => Ok(offset),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "access beyond end of ram disk",
            )),
        }
    }
}

impl BlockDevice for RamDisk {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = self.check_range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "ram disk is read-only",
            ));
        }
        let start = self.check_range(offset, buf.len())?;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// A block device backed by a regular file, as used by the host tools.
pub struct FileDisk {
    file: File,
    size: u64,
    sector_size: u32,
    read_only: bool,
}

impl FileDisk {
    pub fn open(path: &Path, read_only: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            sector_size: DEFAULT_SECTOR_SIZE,
            read_only,
        })
    }

    /// Creates (or truncates) an image file of the given size.
    pub fn create(path: &Path, size: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(Self {
            file,
            size,
            sector_size: DEFAULT_SECTOR_SIZE,
            read_only: false,
        })
    }
}

impl BlockDevice for FileDisk {
    fn size(&self) -> u64 {
        self.size
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "image opened read-only",
            ));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_disk_round_trips_sector_writes() {
        let mut disk = RamDisk::new(4096);
        let payload = [0xA5u8; 512];
        disk.write_at(512, &payload).unwrap();

        let mut back = [0u8; 512];
        disk.read_at(512, &mut back).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn ram_disk_rejects_out_of_range_access() {
        let mut disk = RamDisk::new(1024);
        let mut buf = [0u8; 512];
        assert!(disk.read_at(1024, &mut buf).is_err());
        assert!(disk.write_at(768, &buf).is_err());
    }

    #[test]
    fn read_only_ram_disk_rejects_writes() {
        let mut disk = RamDisk::new(1024);
        disk.set_read_only(true);
        assert!(disk.write_at(0, &[0u8; 512]).is_err());
    }
}
