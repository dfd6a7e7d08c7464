use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

/// Source of wall-clock time for directory entry timestamps.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// The local system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock pinned to a single instant, for deterministic tests and images.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

const EPOCH_YEAR: i32 = 1980;

/// Packs a calendar date into the on-disk u16: day in bits 0-4, month in
/// bits 5-8, years since 1980 in bits 9-15.
pub fn encode_date(date: NaiveDate) -> u16 {
    let year = date.year().clamp(EPOCH_YEAR, EPOCH_YEAR + 127) - EPOCH_YEAR;
    ((year as u16) << 9) | ((date.month() as u16) << 5) | date.day() as u16
}

pub fn decode_date(raw: u16) -> Option<NaiveDate> {
    let day = (raw & 0x1F) as u32;
    let month = ((raw >> 5) & 0x0F) as u32;
    let year = EPOCH_YEAR + ((raw >> 9) & 0x7F) as i32;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Packs a time of day into the on-disk u16: two-second units in bits 0-4,
/// minutes in bits 5-10, hours in bits 11-15.
pub fn encode_time(time: NaiveDateTime) -> u16 {
    ((time.hour() as u16) << 11) | ((time.minute() as u16) << 5) | (time.second() / 2) as u16
}

pub fn decode_time(raw: u16) -> Option<(u32, u32, u32)> {
    let hour = (raw >> 11) as u32;
    let minute = ((raw >> 5) & 0x3F) as u32;
    let second = ((raw & 0x1F) * 2) as u32;
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    Some((hour, minute, second))
}

/// The 10 ms refinement of the creation time: 0..=199 counting from the
/// even second stored in the packed time.
pub fn encode_tenths(time: NaiveDateTime) -> u8 {
    let within = (time.second() % 2) * 100 + time.nanosecond() / 10_000_000;
    within.min(199) as u8
}

pub fn decode_datetime(date_raw: u16, time_raw: u16) -> Option<NaiveDateTime> {
    let date = decode_date(date_raw)?;
    let (h, m, s) = decode_time(time_raw)?;
    date.and_hms_opt(h, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2022, 4, 30).unwrap();
        assert_eq!(decode_date(encode_date(date)), Some(date));
    }

    #[test]
    fn epoch_date_is_all_low_bits() {
        let date = NaiveDate::from_ymd_opt(1980, 1, 1).unwrap();
        assert_eq!(encode_date(date), (1 << 5) | 1);
    }

    #[test]
    fn time_truncates_to_two_second_units() {
        let dt = NaiveDate::from_ymd_opt(2022, 4, 30)
            .unwrap()
            .and_hms_opt(13, 37, 21)
            .unwrap();
        let raw = encode_time(dt);
        assert_eq!(decode_time(raw), Some((13, 37, 20)));
        assert_eq!(encode_tenths(dt), 100);
    }

    #[test]
    fn nonsense_fields_decode_to_none() {
        assert_eq!(decode_date(0), None);
        assert_eq!(decode_time(0xFFFF), None);
    }
}
