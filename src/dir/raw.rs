use bitflags::bitflags;
use chrono::{NaiveDate, NaiveDateTime};

use crate::fat::FatType;
use crate::names::{ShortName, UNITS_PER_SLOT};
use crate::time;

pub const DIR_ENTRY_SIZE: usize = 32;

/// A deleted slot starts with this byte.
pub const DELETED_MARK: u8 = 0xE5;

/// The attribute combination marking a long-name slot.
pub const ATTR_LONG_NAME: u8 = 0x0F;
const ATTR_LONG_NAME_MASK: u8 = 0x3F;

/// Ordinal flag on the physically first (logically last) LFN slot.
pub const LFN_LAST_FLAG: u8 = 0x40;

const NAME_OFFSET: usize = 0;
const ATTR_OFFSET: usize = 11;
const NT_RESERVED_OFFSET: usize = 12;
const CREATE_TENTHS_OFFSET: usize = 13;
const CREATE_TIME_OFFSET: usize = 14;
const CREATE_DATE_OFFSET: usize = 16;
const ACCESS_DATE_OFFSET: usize = 18;
const CLUSTER_HIGH_OFFSET: usize = 20;
const WRITE_TIME_OFFSET: usize = 22;
const WRITE_DATE_OFFSET: usize = 24;
const CLUSTER_LOW_OFFSET: usize = 26;
const SIZE_OFFSET: usize = 28;

const LFN_CHECKSUM_OFFSET: usize = 13;
const LFN_UNIT_OFFSETS: [usize; UNITS_PER_SLOT] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

/// One 32-byte directory slot, short entry or LFN slot alike.
#[derive(Clone, Copy)]
pub struct RawDirEntry(pub [u8; DIR_ENTRY_SIZE]);

impl RawDirEntry {
    pub fn zeroed() -> Self {
        Self([0; DIR_ENTRY_SIZE])
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut entry = [0u8; DIR_ENTRY_SIZE];
        entry.copy_from_slice(&bytes[..DIR_ENTRY_SIZE]);
        Self(entry)
    }

    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// The 0x00 first byte says: this slot and everything after it is
    /// unused.
    pub fn is_terminator(&self) -> bool {
        self.0[0] == 0x00
    }

    pub fn is_deleted(&self) -> bool {
        self.0[0] == DELETED_MARK
    }

    pub fn mark_deleted(&mut self) {
        self.0[0] = DELETED_MARK;
    }

    pub fn attr_byte(&self) -> u8 {
        self.0[ATTR_OFFSET]
    }

    pub fn is_long_name(&self) -> bool {
        !self.is_terminator() && (self.attr_byte() & ATTR_LONG_NAME_MASK) == ATTR_LONG_NAME
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_truncate(self.attr_byte())
    }

    pub fn set_attributes(&mut self, attrs: Attributes) {
        self.0[ATTR_OFFSET] = attrs.bits();
    }

    pub fn is_volume_label(&self) -> bool {
        !self.is_long_name() && self.attributes().contains(Attributes::VOLUME_ID)
    }

    pub fn is_directory(&self) -> bool {
        !self.is_long_name() && self.attributes().contains(Attributes::DIRECTORY)
    }

    /// The `.` / `..` bookkeeping entries of a subdirectory.
    pub fn is_dot_entry(&self) -> bool {
        self.0[0] == b'.'
    }

    pub fn short_name(&self) -> ShortName {
        let mut raw = [0u8; 11];
        raw.copy_from_slice(&self.0[NAME_OFFSET..NAME_OFFSET + 11]);
        ShortName::from_disk_bytes(&raw)
    }

    pub fn set_short_name(&mut self, name: &ShortName) {
        self.0[NAME_OFFSET..NAME_OFFSET + 11].copy_from_slice(&name.disk_bytes());
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.0[NAME_OFFSET..NAME_OFFSET + 11]
    }

    pub fn set_name_bytes(&mut self, bytes: &[u8; 11]) {
        self.0[NAME_OFFSET..NAME_OFFSET + 11].copy_from_slice(bytes);
    }

    pub fn nt_reserved(&self) -> u8 {
        self.0[NT_RESERVED_OFFSET]
    }

    fn get16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.0[offset], self.0[offset + 1]])
    }

    fn set16(&mut self, offset: usize, value: u16) {
        self.0[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn get32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.0[offset],
            self.0[offset + 1],
            self.0[offset + 2],
            self.0[offset + 3],
        ])
    }

    fn set32(&mut self, offset: usize, value: u32) {
        self.0[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// The head of the entry's cluster chain, or 0 when nothing is
    /// allocated. The high word only exists on FAT32.
    pub fn first_cluster(&self, fat_type: FatType) -> u32 {
        let low = self.get16(CLUSTER_LOW_OFFSET) as u32;
        match fat_type {
            FatType::Fat32 => ((self.get16(CLUSTER_HIGH_OFFSET) as u32) << 16) | low,
            _ => low,
        }
    }

    pub fn set_first_cluster(&mut self, cluster: u32, fat_type: FatType) {
        self.set16(CLUSTER_LOW_OFFSET, cluster as u16);
        match fat_type {
            FatType::Fat32 => self.set16(CLUSTER_HIGH_OFFSET, (cluster >> 16) as u16),
            _ => self.set16(CLUSTER_HIGH_OFFSET, 0),
        }
    }

    pub fn size(&self) -> u32 {
        self.get32(SIZE_OFFSET)
    }

    pub fn set_size(&mut self, size: u32) {
        self.set32(SIZE_OFFSET, size);
    }

    pub fn created(&self) -> Option<NaiveDateTime> {
        time::decode_datetime(self.get16(CREATE_DATE_OFFSET), self.get16(CREATE_TIME_OFFSET))
    }

    pub fn set_created(&mut self, at: NaiveDateTime) {
        self.0[CREATE_TENTHS_OFFSET] = time::encode_tenths(at);
        self.set16(CREATE_TIME_OFFSET, time::encode_time(at));
        self.set16(CREATE_DATE_OFFSET, time::encode_date(at.date()));
    }

    pub fn modified(&self) -> Option<NaiveDateTime> {
        time::decode_datetime(self.get16(WRITE_DATE_OFFSET), self.get16(WRITE_TIME_OFFSET))
    }

    pub fn set_modified(&mut self, at: NaiveDateTime) {
        self.set16(WRITE_TIME_OFFSET, time::encode_time(at));
        self.set16(WRITE_DATE_OFFSET, time::encode_date(at.date()));
    }

    pub fn accessed(&self) -> Option<NaiveDate> {
        time::decode_date(self.get16(ACCESS_DATE_OFFSET))
    }

    pub fn set_accessed(&mut self, on: NaiveDate) {
        self.set16(ACCESS_DATE_OFFSET, time::encode_date(on));
    }

    // --- long-name slots ---

    /// Builds one LFN slot. `units` holds at most 13 UCS-2 units; a short
    /// final slot gets a 0x0000 terminator and 0xFFFF padding.
    pub fn lfn_slot(sequence: u8, last: bool, checksum: u8, units: &[u16]) -> Self {
        let mut entry = Self::zeroed();
        entry.0[0] = if last {
            sequence | LFN_LAST_FLAG
        } else {
            sequence
        };
        entry.0[ATTR_OFFSET] = ATTR_LONG_NAME;
        entry.0[NT_RESERVED_OFFSET] = 0;
        entry.0[LFN_CHECKSUM_OFFSET] = checksum;
        entry.set16(CLUSTER_LOW_OFFSET, 0);

        for (idx, &offset) in LFN_UNIT_OFFSETS.iter().enumerate() {
            let value = if idx < units.len() {
                units[idx]
            } else if idx == units.len() {
                0x0000
            } else {
                0xFFFF
            };
            entry.set16(offset, value);
        }
        entry
    }

    pub fn lfn_ordinal(&self) -> u8 {
        self.0[0]
    }

    pub fn lfn_checksum(&self) -> u8 {
        self.0[LFN_CHECKSUM_OFFSET]
    }

    pub fn lfn_units(&self) -> [u16; UNITS_PER_SLOT] {
        let mut units = [0u16; UNITS_PER_SLOT];
        for (idx, &offset) in LFN_UNIT_OFFSETS.iter().enumerate() {
            units[idx] = self.get16(offset);
        }
        units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn lfn_slot_terminates_and_pads() {
        let units: Vec<u16> = "abc".encode_utf16().collect();
        let slot = RawDirEntry::lfn_slot(1, true, 0x42, &units);

        assert_eq!(slot.lfn_ordinal(), 0x41);
        assert!(slot.is_long_name());
        assert_eq!(slot.lfn_checksum(), 0x42);

        let packed = slot.lfn_units();
        assert_eq!(&packed[..3], &units[..]);
        assert_eq!(packed[3], 0x0000);
        assert!(packed[4..].iter().all(|&u| u == 0xFFFF));
    }

    #[test]
    fn first_cluster_high_word_is_fat32_only() {
        let mut entry = RawDirEntry::zeroed();
        entry.set_first_cluster(0x0012_3456, FatType::Fat32);
        assert_eq!(entry.first_cluster(FatType::Fat32), 0x0012_3456);

        entry.set_first_cluster(0xBEEF, FatType::Fat16);
        assert_eq!(entry.first_cluster(FatType::Fat16), 0xBEEF);
        assert_eq!(entry.get16(CLUSTER_HIGH_OFFSET), 0);
    }

    #[test]
    fn timestamps_round_trip_through_the_entry() {
        let at = NaiveDate::from_ymd_opt(2021, 12, 24)
            .unwrap()
            .and_hms_opt(18, 30, 44)
            .unwrap();

        let mut entry = RawDirEntry::zeroed();
        entry.set_created(at);
        entry.set_modified(at);
        entry.set_accessed(at.date());

        assert_eq!(entry.created(), Some(at));
        assert_eq!(entry.modified(), Some(at));
        assert_eq!(entry.accessed(), Some(at.date()));
    }

    #[test]
    fn deleted_and_terminator_classification() {
        let mut entry = RawDirEntry::zeroed();
        assert!(entry.is_terminator());

        entry.0[0] = b'A';
        assert!(!entry.is_terminator());

        entry.mark_deleted();
        assert!(entry.is_deleted());
    }
}
