//! Subcode packs.
//!
//! Each frame carries 7 packs of 8 bytes. The high nibble of byte 0 selects
//! the pack type, bytes 1-6 hold BCD fields and byte 7 is the XOR parity of
//! bytes 0-6.

use std::fmt::{Display, Formatter};

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

use crate::structs::frame::{FrameBuf, FrameLayout, PACK_SIZE};
use crate::utils::errors::SubcodeWarning;

/// Hour correction applied to date packs.
///
/// Recordings made on a Sony TCD-D8 store the hour one too high.
pub const DEFAULT_HOUR_OFFSET: i8 = -1;

/// Converts a BCD-encoded byte to decimal.
///
/// Nibbles above 9 are not rejected; callers validate ranges on the result.
#[inline(always)]
pub const fn unbcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

#[inline(always)]
pub const fn xor_parity(bytes: &[u8]) -> u8 {
    let mut parity = 0;
    let mut i = 0;
    while i < bytes.len() {
        parity ^= bytes[i];
        i += 1;
    }

    parity
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackKind {
    Unused,
    ProgramTime,
    AbsoluteTime,
    RunningTime,
    TableOfContents,
    Date,
    Catalog,
    CatalogNumber,
    Isrc,
    ProBinary,
    Reserved(u8),
}

impl From<u8> for PackKind {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unused,
            1 => Self::ProgramTime,
            2 => Self::AbsoluteTime,
            3 => Self::RunningTime,
            4 => Self::TableOfContents,
            5 => Self::Date,
            6 => Self::Catalog,
            7 => Self::CatalogNumber,
            8 => Self::Isrc,
            9 => Self::ProBinary,
            _ => Self::Reserved(value),
        }
    }
}

impl Display for PackKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PackKind::Unused => "Unused",
            PackKind::ProgramTime => "Program time",
            PackKind::AbsoluteTime => "Absolute time",
            PackKind::RunningTime => "Running time",
            PackKind::TableOfContents => "Table of Contents",
            PackKind::Date => "Date",
            PackKind::Catalog => "Catalog",
            PackKind::CatalogNumber => "Catalog Number",
            PackKind::Isrc => "International Standard Recording Code",
            PackKind::ProBinary => "Pro Binary",
            PackKind::Reserved(v) => return write!(f, "Reserved({v:X})"),
        };

        f.write_str(name)
    }
}

/// One parity-checked subcode pack.
#[derive(Debug, Clone, Copy)]
pub struct SubcodePack<'a> {
    pub index: usize,
    pub kind: PackKind,
    pub data: &'a [u8; PACK_SIZE],
}

impl<'a> SubcodePack<'a> {
    pub fn read(frame: &'a FrameBuf, index: usize) -> Self {
        let data = frame.pack(index);
        Self {
            index,
            kind: (data[0] >> 4).into(),
            data,
        }
    }

    pub fn parity(&self) -> u8 {
        xor_parity(&self.data[..PACK_SIZE - 1])
    }

    pub fn parity_ok(&self) -> bool {
        self.parity() == self.data[PACK_SIZE - 1]
    }
}

/// Elapsed-time counter from a program, absolute or running time pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackTime {
    pub index: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frame: u8,
}

impl PackTime {
    pub fn read(pack: &[u8; PACK_SIZE]) -> Self {
        Self {
            index: unbcd(pack[2]),
            hours: unbcd(pack[3]),
            minutes: unbcd(pack[4]),
            seconds: unbcd(pack[5]),
            frame: unbcd(pack[6]),
        }
    }
}

impl Display for PackTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "indexnr={} {}:{:02}:{:02} frame={}",
            self.index, self.hours, self.minutes, self.seconds, self.frame
        )
    }
}

/// Recording date as stored in a date pack, before calendar validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePack {
    /// 1 = Sunday ... 7 = Saturday.
    pub weekday: u8,
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DatePack {
    /// Returns `None` when the weekday nibble is out of range.
    pub fn read(pack: &[u8; PACK_SIZE]) -> Option<Self> {
        let weekday = pack[0] & 0x0F;
        if weekday > 7 {
            return None;
        }

        let year = unbcd(pack[1]) as i32;
        Some(Self {
            weekday,
            year: if year < 50 { 2000 + year } else { 1900 + year },
            month: unbcd(pack[2]),
            day: unbcd(pack[3]),
            hour: unbcd(pack[4]),
            minute: unbcd(pack[5]),
            second: unbcd(pack[6]),
        })
    }

    /// Builds the calendar timestamp, shifting the stored hour by `hour_offset`.
    ///
    /// An hour that lands outside the day rolls over into the adjacent day.
    pub fn to_date_time(&self, hour_offset: i8) -> Result<NaiveDateTime, SubcodeWarning> {
        if self.hour > 24 || self.minute > 59 || self.second > 59 {
            return Err(SubcodeWarning::InvalidDate);
        }

        NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
            .and_then(|date| date.and_hms_opt(0, self.minute as u32, self.second as u32))
            .and_then(|midnight| {
                midnight
                    .checked_add_signed(TimeDelta::hours(self.hour as i64 + hour_offset as i64))
            })
            .ok_or(SubcodeWarning::InvalidDate)
    }

    pub fn weekday_matches(&self, date_time: &NaiveDateTime) -> bool {
        self.weekday as i32 - 1 == date_time.weekday().num_days_from_sunday() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn with_parity(mut pack: [u8; PACK_SIZE]) -> [u8; PACK_SIZE] {
        pack[7] = xor_parity(&pack[..7]);
        pack
    }

    #[test]
    fn bcd_and_parity() {
        assert_eq!(unbcd(0x59), 59);
        assert_eq!(unbcd(0x00), 0);
        assert_eq!(xor_parity(&[0x51, 0x01, 0x10]), 0x40);
    }

    #[test]
    fn pack_kind_names() {
        assert_eq!(PackKind::from(5), PackKind::Date);
        assert_eq!(format!("{}", PackKind::from(2)), "Absolute time");
        assert_eq!(format!("{}", PackKind::from(0xC)), "Reserved(C)");
    }

    #[test]
    fn decode_date_pack() {
        // Wednesday 2001-02-14, stored hour 11
        let pack = with_parity([0x54, 0x01, 0x02, 0x14, 0x11, 0x30, 0x45, 0]);
        let date = DatePack::read(&pack).unwrap();
        let date_time = date.to_date_time(DEFAULT_HOUR_OFFSET).unwrap();

        assert_eq!(date_time.date(), NaiveDate::from_ymd_opt(2001, 2, 14).unwrap());
        assert_eq!(date_time.hour(), 10);
        assert_eq!(date_time.minute(), 30);
        assert_eq!(date_time.second(), 45);
        assert!(date.weekday_matches(&date_time));

        let date_time = date.to_date_time(0).unwrap();
        assert_eq!(date_time.hour(), 11);
    }

    #[test]
    fn hour_zero_rolls_back_a_day() {
        let pack = with_parity([0x51, 0x99, 0x12, 0x31, 0x00, 0x00, 0x00, 0]);
        let date = DatePack::read(&pack).unwrap();
        assert_eq!(date.year, 1999);

        let date_time = date.to_date_time(DEFAULT_HOUR_OFFSET).unwrap();
        assert_eq!(date_time.date(), NaiveDate::from_ymd_opt(1999, 12, 30).unwrap());
        assert_eq!(date_time.hour(), 23);
    }

    #[test]
    fn invalid_dates() {
        let pack = [0x59, 0x01, 0x02, 0x14, 0x11, 0x30, 0x45, 0];
        assert!(DatePack::read(&pack).is_none());

        let pack = [0x54, 0x01, 0x02, 0x30, 0x11, 0x30, 0x45, 0];
        let date = DatePack::read(&pack).unwrap();
        assert_eq!(date.to_date_time(-1), Err(SubcodeWarning::InvalidDate));

        let pack = [0x54, 0x01, 0x13, 0x01, 0x11, 0x30, 0x45, 0];
        let date = DatePack::read(&pack).unwrap();
        assert_eq!(date.to_date_time(-1), Err(SubcodeWarning::InvalidDate));
    }

    #[test]
    fn wrong_weekday_is_detected() {
        // 2001-02-14 is a Wednesday, pack claims Monday
        let pack = [0x52, 0x01, 0x02, 0x14, 0x11, 0x30, 0x45, 0];
        let date = DatePack::read(&pack).unwrap();
        let date_time = date.to_date_time(-1).unwrap();
        assert!(!date.weekday_matches(&date_time));
    }

    #[test]
    fn pack_time_counters() {
        let pack = [0x20, 0x00, 0x01, 0x01, 0x02, 0x03, 0x29, 0];
        let time = PackTime::read(&pack);
        assert_eq!(time.index, 1);
        assert_eq!((time.hours, time.minutes, time.seconds), (1, 2, 3));
        assert_eq!(format!("{time}"), "indexnr=1 1:02:03 frame=29");
    }
}
