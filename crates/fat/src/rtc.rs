// TEAM_477: Wall-clock source for FAT directory entries.
// Readings outside 2000..=2100 or with impossible calendar fields are
// replaced by the FAT epoch (1980-01-01 00:00:00).

use embedded_sdmmc::{TimeSource, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub fn is_valid(&self) -> bool {
        (2000..=2100).contains(&self.year)
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
    }

    /// Packed DOS date and time, 0 when the reading is not valid.
    pub fn fat_time(&self) -> u32 {
        if !self.is_valid() {
            return 0;
        }
        (u32::from(self.year - 1980) << 25)
            | (u32::from(self.month) << 21)
            | (u32::from(self.day) << 16)
            | (u32::from(self.hour) << 11)
            | (u32::from(self.minute) << 5)
            | (u32::from(self.second) >> 1)
    }
}

/// Board real-time clock.
pub trait Rtc: Send {
    /// `None` while the clock is not running.
    fn now(&self) -> Option<DateTime>;
}

/// For boards without a real-time clock.
pub struct NoRtc;

impl Rtc for NoRtc {
    fn now(&self) -> Option<DateTime> {
        None
    }
}

pub struct RtcTimeSource<R> {
    rtc: R,
}

impl<R: Rtc> RtcTimeSource<R> {
    pub fn new(rtc: R) -> Self {
        Self { rtc }
    }
}

fn fat_epoch() -> Timestamp {
    Timestamp {
        year_since_1970: 10,
        zero_indexed_month: 0,
        zero_indexed_day: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    }
}

impl<R: Rtc> TimeSource for RtcTimeSource<R> {
    fn get_timestamp(&self) -> Timestamp {
        match self.rtc.now().filter(DateTime::is_valid) {
            Some(dt) => Timestamp {
                year_since_1970: (dt.year - 1970) as u8,
                zero_indexed_month: dt.month - 1,
                zero_indexed_day: dt.day - 1,
                hours: dt.hour,
                minutes: dt.minute,
                seconds: dt.second,
            },
            None => fat_epoch(),
        }
    }
}
