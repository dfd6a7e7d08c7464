use log::warn;

use crate::boot::Geometry;
use crate::device::BlockDevice;
use crate::dir::raw::{Attributes, RawDirEntry, LFN_LAST_FLAG};
use crate::dir::store::DirStore;
use crate::error::FsError;
use crate::fat::Fat;
use crate::names::{self, ShortName, MAX_LFN_SLOTS, UNITS_PER_SLOT};

/// One live directory entry: the short entry plus its decoded long name,
/// when an intact LFN chain preceded it on disk.
pub struct DirRecord {
    pub id: u64,
    pub long_name: Option<String>,
    pub raw: RawDirEntry,
}

impl DirRecord {
    pub fn display_name(&self) -> String {
        match &self.long_name {
            Some(name) => name.clone(),
            None => self.raw.short_name().display(),
        }
    }

    /// Hidden bookkeeping rows: the `.` / `..` pair and the volume label.
    pub fn is_internal(&self) -> bool {
        self.raw.is_dot_entry() || self.raw.is_volume_label()
    }

    pub fn matches(&self, name: &str) -> bool {
        if let Some(long) = &self.long_name {
            if long.to_lowercase() == name.to_lowercase() {
                return true;
            }
        }
        self.raw.short_name().display().eq_ignore_ascii_case(name)
    }
}

struct LfnAssembly {
    expected: u8,
    checksum: u8,
    seen_mask: u32,
    units: [[u16; UNITS_PER_SLOT]; MAX_LFN_SLOTS],
}

impl LfnAssembly {
    fn new() -> Self {
        Self {
            expected: 0,
            checksum: 0,
            seen_mask: 0,
            units: [[0xFFFF; UNITS_PER_SLOT]; MAX_LFN_SLOTS],
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn is_pending(&self) -> bool {
        self.expected != 0
    }

    fn consume(&mut self, slot: &RawDirEntry) {
        let ordinal = slot.lfn_ordinal();
        let sequence = ordinal & 0x1F;
        if sequence == 0 || sequence as usize > MAX_LFN_SLOTS {
            self.clear();
            return;
        }

        if ordinal & LFN_LAST_FLAG != 0 {
            self.clear();
            self.expected = sequence;
            self.checksum = slot.lfn_checksum();
        } else if self.expected == 0
            || sequence >= self.expected
            || slot.lfn_checksum() != self.checksum
        {
            self.clear();
            return;
        }

        let index = (sequence - 1) as usize;
        self.units[index] = slot.lfn_units();
        self.seen_mask |= 1 << index;
    }

    /// The assembled name, if every slot from N down to 1 arrived and the
    /// chain's checksum matches the short name that follows it.
    fn take_name(&mut self, short: &ShortName) -> Option<String> {
        if self.expected == 0 {
            return None;
        }
        let complete = self.seen_mask == (1u32 << self.expected) - 1;
        if !complete || self.checksum != short.checksum() {
            self.clear();
            return None;
        }

        let mut units = Vec::with_capacity(self.expected as usize * UNITS_PER_SLOT);
        'outer: for slot in 0..self.expected as usize {
            for &unit in &self.units[slot] {
                if unit == 0x0000 || unit == 0xFFFF {
                    break 'outer;
                }
                units.push(unit);
            }
        }
        self.clear();
        if units.is_empty() {
            None
        } else {
            Some(String::from_utf16_lossy(&units))
        }
    }
}

/// A directory decoded into records, backed by either root store variant.
/// Mutations only touch the in-memory records until `flush` reserializes
/// the slot sequence.
pub struct LfnDirectory {
    pub store: DirStore,
    pub records: Vec<DirRecord>,
    pub dirty: bool,
}

impl LfnDirectory {
    pub fn read<D: BlockDevice>(
        dev: &mut D,
        geo: &Geometry,
        fat: &Fat,
        store: DirStore,
        next_id: &mut u64,
    ) -> Result<Self, FsError> {
        let slots = store.load(dev, geo, fat)?;
        let mut records = Vec::new();
        let mut lfn = LfnAssembly::new();
        let mut terminated = false;

        for slot in &slots {
            if slot.is_terminator() {
                terminated = true;
                break;
            }
            if slot.is_deleted() {
                lfn.clear();
                continue;
            }
            if slot.is_long_name() {
                lfn.consume(slot);
                continue;
            }

            let short = slot.short_name();
            let had_chain = lfn.is_pending();
            let long_name = if slot.is_volume_label() || slot.is_dot_entry() {
                lfn.clear();
                None
            } else {
                lfn.take_name(&short)
            };
            if had_chain && long_name.is_none() && !slot.is_volume_label() && !slot.is_dot_entry() {
                warn!(
                    "broken long name chain before {}, falling back to the short name",
                    short.display()
                );
            }

            records.push(DirRecord {
                id: *next_id,
                long_name,
                raw: *slot,
            });
            *next_id += 1;
        }

        if !terminated && lfn.is_pending() {
            return Err(FsError::DirTerminatorMissing);
        }

        Ok(Self {
            store,
            records,
            dirty: false,
        })
    }

    /// An empty in-memory directory over a fresh store.
    pub fn create(store: DirStore) -> Self {
        Self {
            store,
            records: Vec::new(),
            dirty: true,
        }
    }

    pub fn find(&self, name: &str) -> Option<&DirRecord> {
        self.records
            .iter()
            .find(|r| !r.is_internal() && r.matches(name))
    }

    pub fn find_position(&self, name: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| !r.is_internal() && r.matches(name))
    }

    pub fn record_by_id(&self, id: u64) -> Option<&DirRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn record_by_id_mut(&mut self, id: u64) -> Option<&mut DirRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn short_name_exists(&self, name: &ShortName) -> bool {
        self.records
            .iter()
            .any(|r| !r.raw.is_volume_label() && &r.raw.short_name() == name)
    }

    /// The volume label pseudo-entry, meaningful in the root directory.
    pub fn label(&self) -> Option<String> {
        self.records.iter().find(|r| r.raw.is_volume_label()).map(|r| {
            r.raw
                .name_bytes()
                .iter()
                .take_while(|&&c| c != 0)
                .map(|&c| c as char)
                .collect::<String>()
                .trim_end()
                .to_string()
        })
    }

    pub fn set_label(&mut self, label: Option<&str>, next_id: &mut u64) -> Result<(), FsError> {
        let position = self.records.iter().position(|r| r.raw.is_volume_label());

        match label {
            None => {
                if let Some(pos) = position {
                    self.records.remove(pos);
                    self.dirty = true;
                }
            }
            Some(label) => {
                if label.len() > 11 || !label.is_ascii() {
                    return Err(FsError::InvalidArgument("volume label too long"));
                }
                let mut bytes = [0x20u8; 11];
                bytes[..label.len()].copy_from_slice(label.as_bytes());

                match position {
                    Some(pos) => {
                        self.records[pos].raw.set_name_bytes(&bytes);
                        self.dirty = true;
                    }
                    None => {
                        let mut raw = RawDirEntry::zeroed();
                        raw.set_name_bytes(&bytes);
                        raw.set_attributes(Attributes::VOLUME_ID);
                        self.records.push(DirRecord {
                            id: *next_id,
                            long_name: None,
                            raw,
                        });
                        *next_id += 1;
                        self.dirty = true;
                    }
                }
            }
        }
        Ok(())
    }

    /// Serializes the live records in order: LFN slots high-to-low in
    /// front of each short entry, then implicitly the 0x00 terminator via
    /// the zero-filled tail of the extent.
    pub fn serialize(&self) -> Vec<RawDirEntry> {
        let mut slots = Vec::new();
        for record in &self.records {
            if let Some(name) = &record.long_name {
                let units: Vec<u16> = name.encode_utf16().collect();
                let count = names::slots_for_units(units.len());
                let checksum = record.raw.short_name().checksum();
                for sequence in (1..=count).rev() {
                    let start = (sequence - 1) * UNITS_PER_SLOT;
                    let end = (start + UNITS_PER_SLOT).min(units.len());
                    slots.push(RawDirEntry::lfn_slot(
                        sequence as u8,
                        sequence == count,
                        checksum,
                        &units[start..end],
                    ));
                }
            }
            slots.push(record.raw);
        }
        slots
    }

    pub fn flush<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        geo: &Geometry,
        fat: &mut Fat,
    ) -> Result<(), FsError> {
        if !self.dirty {
            return Ok(());
        }
        let slots = self.serialize();
        self.store.save(dev, geo, fat, &slots)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDisk;
    use crate::fat::FatType;

    fn parse(slots: &[RawDirEntry]) -> LfnDirectory {
        // A fixed extent is the simplest way to feed raw slots through the
        // normal read path.
        let mut dev = RamDisk::new(8192);
        let mut bytes = Vec::new();
        for slot in slots {
            bytes.extend_from_slice(&slot.0);
        }
        dev.write_at(0, &{
            let mut buf = vec![0u8; 4096];
            buf[..bytes.len()].copy_from_slice(&bytes);
            buf
        })
        .unwrap();

        let geo = Geometry {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            bytes_per_cluster: 512,
            files_offset: 4096,
            cluster_count: 8,
        };
        let fat = Fat::create(FatType::Fat16, 8, 0xF8);
        let store = DirStore::FixedRoot {
            offset: 0,
            capacity: 128,
        };
        let mut next_id = 1;
        LfnDirectory::read(&mut dev, &geo, &fat, store, &mut next_id).unwrap()
    }

    fn short_entry(name: &str) -> RawDirEntry {
        let mut raw = RawDirEntry::zeroed();
        raw.set_short_name(&ShortName::parse(name).unwrap());
        raw.set_attributes(Attributes::ARCHIVE);
        raw
    }

    fn lfn_chain(name: &str, short: &ShortName) -> Vec<RawDirEntry> {
        let units: Vec<u16> = name.encode_utf16().collect();
        let count = names::slots_for_units(units.len());
        let mut slots = Vec::new();
        for sequence in (1..=count).rev() {
            let start = (sequence - 1) * UNITS_PER_SLOT;
            let end = (start + UNITS_PER_SLOT).min(units.len());
            slots.push(RawDirEntry::lfn_slot(
                sequence as u8,
                sequence == count,
                short.checksum(),
                &units[start..end],
            ));
        }
        slots
    }

    #[test]
    fn intact_lfn_chain_yields_the_long_name() {
        let short = ShortName::parse("THISIS~1.TXT").unwrap();
        let mut slots = lfn_chain("ThisIsALongName.TXT", &short);
        let mut entry = RawDirEntry::zeroed();
        entry.set_short_name(&short);
        entry.set_attributes(Attributes::ARCHIVE);
        slots.push(entry);

        let dir = parse(&slots);
        assert_eq!(dir.records.len(), 1);
        assert_eq!(
            dir.records[0].long_name.as_deref(),
            Some("ThisIsALongName.TXT")
        );
        assert!(dir.find("thisisalongname.txt").is_some());
        assert!(dir.find("THISIS~1.TXT").is_some());
    }

    #[test]
    fn checksum_mismatch_degrades_to_the_short_name() {
        let short = ShortName::parse("THISIS~1.TXT").unwrap();
        let mut slots = lfn_chain("ThisIsALongName.TXT", &short);
        for slot in &mut slots {
            slot.0[13] ^= 0xFF;
        }
        let mut entry = RawDirEntry::zeroed();
        entry.set_short_name(&short);
        entry.set_attributes(Attributes::ARCHIVE);
        slots.push(entry);

        let dir = parse(&slots);
        assert_eq!(dir.records.len(), 1);
        assert_eq!(dir.records[0].long_name, None);
        assert_eq!(dir.records[0].display_name(), "THISIS~1.TXT");
    }

    #[test]
    fn gap_in_the_sequence_invalidates_the_chain() {
        let short = ShortName::parse("LONGNA~1.TXT").unwrap();
        let mut slots = lfn_chain("a name long enough for two slots.txt", &short);
        assert!(slots.len() >= 3);
        slots.remove(1);
        let mut entry = RawDirEntry::zeroed();
        entry.set_short_name(&short);
        entry.set_attributes(Attributes::ARCHIVE);
        slots.push(entry);

        let dir = parse(&slots);
        assert_eq!(dir.records[0].long_name, None);
    }

    #[test]
    fn serialize_read_round_trip_preserves_order_and_names() {
        let mut dir = LfnDirectory::create(DirStore::FixedRoot {
            offset: 0,
            capacity: 128,
        });
        let mut next_id = 1u64;

        dir.set_label(Some("TEST"), &mut next_id).unwrap();
        dir.records.push(DirRecord {
            id: next_id,
            long_name: Some("lowercase.txt".to_string()),
            raw: short_entry("LOWERC~1.TXT"),
        });
        next_id += 1;
        dir.records.push(DirRecord {
            id: next_id,
            long_name: None,
            raw: short_entry("PLAIN.BIN"),
        });

        let slots = dir.serialize();
        let back = parse(&slots);

        assert_eq!(back.label().as_deref(), Some("TEST"));
        assert_eq!(back.records.len(), 3);
        assert_eq!(
            back.find("LOWERCASE.TXT").unwrap().long_name.as_deref(),
            Some("lowercase.txt")
        );
        assert!(back.find("plain.bin").is_some());
    }

    #[test]
    fn deleted_entries_break_pending_chains_and_vanish() {
        let short = ShortName::parse("GONE.TXT").unwrap();
        let mut slots = lfn_chain("gone forever.txt", &short);
        let mut entry = RawDirEntry::zeroed();
        entry.set_short_name(&short);
        entry.set_attributes(Attributes::ARCHIVE);
        entry.mark_deleted();
        slots.push(entry);
        slots.push(short_entry("KEPT.TXT"));

        let dir = parse(&slots);
        assert_eq!(dir.records.len(), 1);
        assert_eq!(dir.records[0].display_name(), "KEPT.TXT");
    }
}
