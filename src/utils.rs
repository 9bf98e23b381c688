use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};

pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

static CLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?-u)^(\d{1,2}):(\d{1,2})$").ok());

static SHORT_DATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?-u)^(\d{1,2})-(\d{1,2})-(\d{1,2})$").ok());

static MERIDIEM_CLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?-u)^(\d{1,2}):(\d{1,2})\s*([AaPp])[Mm]$").ok());

/// Broken-down UTC time whose fields may be out of range, normalised when
/// converted the way `mktime` does (month 12 is January of the next year).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tm {
    pub year: i64,
    /// Zero based
    pub mon: i64,
    pub mday: i64,
    pub hour: i64,
    pub min: i64,
}

impl Tm {
    /// Today's date at midnight
    pub fn midnight(now: DateTime<Utc>) -> Self {
        Self {
            year: i64::from(now.year()),
            mon: i64::from(now.month0()),
            mday: i64::from(now.day()),
            hour: 0,
            min: 0,
        }
    }

    /// Seconds since the epoch, 0 when out of representable range
    pub fn timestamp(&self) -> i64 {
        let year = self.year + self.mon.div_euclid(12);
        let mon = self.mon.rem_euclid(12);

        i32::try_from(year)
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, u32::try_from(mon + 1).ok()?, 1))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .and_then(|dt| dt.checked_add_signed(TimeDelta::try_days(self.mday - 1)?))
            .and_then(|dt| dt.checked_add_signed(TimeDelta::try_hours(self.hour)?))
            .and_then(|dt| dt.checked_add_signed(TimeDelta::try_minutes(self.min)?))
            .map_or(0, |dt| dt.and_utc().timestamp())
    }
}

/// Bytes of capture group `i`
pub fn group<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t [u8]> {
    caps.get(i).map(|m| m.as_bytes())
}

/// Decimal integer with an optional sign
pub fn number(text: &[u8]) -> Option<i64> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

fn ranged(text: &[u8], min: i64, max: i64) -> Option<i64> {
    number(text).filter(|v| (min..=max).contains(v))
}

/// Index of an English month abbreviation, any case
pub fn month_index(name: &[u8]) -> Option<i64> {
    MONTHS
        .iter()
        .position(|m| m.as_bytes().eq_ignore_ascii_case(name))
        .and_then(|i| i64::try_from(i).ok())
}

/// `HH:MM` into `tm`
pub fn apply_clock(tm: &mut Tm, clock: &[u8]) -> Option<()> {
    let caps = CLOCK.as_ref()?.captures(clock)?;
    let hour = ranged(group(&caps, 1)?, 0, 23)?;
    let min = ranged(group(&caps, 2)?, 0, 59)?;

    tm.hour = hour;
    tm.min = min;
    Some(())
}

/// `Mon` and `DD` into `tm`
pub fn apply_month_day(tm: &mut Tm, month: &[u8], day: &[u8]) -> Option<()> {
    let mon = month_index(month)?;
    let mday = ranged(day, 1, 31)?;

    tm.mon = mon;
    tm.mday = mday;
    Some(())
}

/// A full year into `tm`
pub fn apply_year(tm: &mut Tm, year: &[u8]) -> Option<()> {
    tm.year = number(year)?;
    Some(())
}

/// `MM-DD-YY` into `tm`, two digit years below 69 are in the 2000s
pub fn apply_short_date(tm: &mut Tm, date: &[u8]) -> Option<()> {
    let caps = SHORT_DATE.as_ref()?.captures(date)?;
    let mon = ranged(group(&caps, 1)?, 1, 12)? - 1;
    let mday = ranged(group(&caps, 2)?, 1, 31)?;
    let year = ranged(group(&caps, 3)?, 0, 99)?;

    tm.mon = mon;
    tm.mday = mday;
    tm.year = if year < 69 { 2000 + year } else { 1900 + year };
    Some(())
}

/// `HH:MMAM` or `HH:MMPM` into `tm`
pub fn apply_meridiem_clock(tm: &mut Tm, clock: &[u8]) -> Option<()> {
    let caps = MERIDIEM_CLOCK.as_ref()?.captures(clock)?;
    let hour = ranged(group(&caps, 1)?, 1, 12)? % 12;
    let min = ranged(group(&caps, 2)?, 0, 59)?;
    let pm = group(&caps, 3)?.eq_ignore_ascii_case(b"P");

    tm.hour = if pm { hour + 12 } else { hour };
    tm.min = min;
    Some(())
}

/// Size rounded up to whole blocks, counted in 512-byte units.
/// A zero block size allocates nothing.
pub fn blocks(size: u64, blksize: u32) -> u64 {
    if blksize == 0 {
        return 0;
    }

    let blksize = u64::from(blksize);
    size.div_ceil(blksize).saturating_mul(blksize) >> 9
}

/// Unsigned number with C radix prefixes: `0x` hex, leading `0` octal.
/// Parses the longest valid prefix, 0 when there is none.
pub fn parse_c_unsigned(text: &[u8]) -> u64 {
    let text = text.trim_ascii_start();
    let (negative, text) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = text
        .strip_prefix(b"0x")
        .or_else(|| text.strip_prefix(b"0X"))
        .filter(|h| h.first().is_some_and(u8::is_ascii_hexdigit))
    {
        (16, hex)
    } else if text.starts_with(b"0") {
        (8, text)
    } else {
        (10, text)
    };

    let value = digits
        .iter()
        .map_while(|&b| char::from(b).to_digit(radix))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(u64::from(radix))
                .saturating_add(u64::from(d))
        });

    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}
