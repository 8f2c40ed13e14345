//! Raw date, time and interval values.
//!
//! These carry exactly what the wire carries, including leap seconds and
//! explicit zone information that `chrono` types either normalize or drop.
//! Constructors validate their fields; conversions to and from `chrono`
//! are provided where the two models overlap.
//!
//! ## Format
//!
//! ```text
//! date:                year month day
//! time:                hour minute second fraction zone-type [hour-offset minute-offset]
//! datetime:            date time
//! year-month interval: years months
//! time interval:       hours minutes seconds nanos
//! day-time interval:   days hours minutes seconds nanos
//! ```
//!
//! Every field is a packed int32. A time fraction is milliseconds when the
//! nanos are a whole number of milliseconds, otherwise the negated nanos.
//! Zone type is 0 (local), 1 (UTC) or 2 (offset follows).

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use gridwire_core::{Error, Result};
use gridwire_io::{BufferInput, BufferOutput};
use std::fmt;

const MAX_DAYS_PER_MONTH: [i32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const NANOS_PER_MILLI: i32 = 1_000_000;

// ============================================================================
// Validation
// ============================================================================

/// Validate a calendar date.
///
/// # Errors
///
/// Returns `IllegalArgument` if the month or day is out of range, or the
/// date is February 29 of a non-leap year.
pub fn check_date(year: i32, month: i32, day: i32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(Error::illegal_argument(format!("month is out of range: {}", month)));
    }
    if day < 1 || day > MAX_DAYS_PER_MONTH[(month - 1) as usize] {
        return Err(Error::illegal_argument(format!("day is out of range: {}", day)));
    }
    if month == 2 && day == 29 && (year % 4 != 0 || (year % 100 == 0 && year % 400 != 0)) {
        return Err(Error::illegal_argument(format!("not a leap year: {}", year)));
    }
    Ok(())
}

/// Validate a time of day. Second 60 is accepted as a leap second with
/// zero nanos.
pub fn check_time(hour: i32, minute: i32, second: i32, nanos: i32) -> Result<()> {
    if !(0..=23).contains(&hour) {
        if hour == 24 && minute == 0 && second == 0 && nanos == 0 {
            return Err(Error::illegal_argument(
                "end-of-day midnight (24:00:00.0) is supported by ISO8601, but use 00:00:00.0 instead",
            ));
        }
        return Err(Error::illegal_argument(format!("hour is out of range: {}", hour)));
    }
    if !(0..=59).contains(&minute) {
        return Err(Error::illegal_argument(format!("minute is out of range: {}", minute)));
    }
    if !(0..=60).contains(&second) || (second == 60 && nanos > 0) {
        return Err(Error::illegal_argument(format!("second is out of range: {}", second)));
    }
    if !(0..=999_999_999).contains(&nanos) {
        return Err(Error::illegal_argument(format!("nanosecond is out of range: {}", nanos)));
    }
    Ok(())
}

/// Validate a zone offset.
pub fn check_time_zone(hour_offset: i32, minute_offset: i32) -> Result<()> {
    if !(-23..=23).contains(&hour_offset) {
        return Err(Error::illegal_argument(format!("invalid hour offset: {}", hour_offset)));
    }
    if !(0..=59).contains(&minute_offset) {
        return Err(Error::illegal_argument(format!(
            "invalid minute offset: {}",
            minute_offset
        )));
    }
    Ok(())
}

/// Validate a time interval; only the leading non-zero field may be negative.
pub fn check_time_interval(hours: i32, minutes: i32, seconds: i32, nanos: i32) -> Result<()> {
    let (mut h, mut m, mut s, mut n) = (hours, minutes, seconds, nanos);
    if h != 0 {
        h = h.saturating_abs();
    } else if m != 0 {
        m = m.saturating_abs();
    } else if s != 0 {
        s = s.saturating_abs();
    } else {
        n = n.saturating_abs();
    }
    check_time(h, m, s, n)
}

/// Validate a day-time interval. The day count may be any value; with zero
/// days the time part follows [`check_time_interval`].
pub fn check_day_time_interval(
    days: i32,
    hours: i32,
    minutes: i32,
    seconds: i32,
    nanos: i32,
) -> Result<()> {
    if days == 0 {
        check_time_interval(hours, minutes, seconds, nanos)
    } else {
        check_time(hours, minutes, seconds, nanos)
    }
}

/// Validate a year-month interval.
///
/// # Errors
///
/// Returns `IllegalState` when there are no years and the months exceed ±11.
pub fn check_year_month_interval(years: i32, months: i32) -> Result<()> {
    if years == 0 && !(-11..=11).contains(&months) {
        return Err(Error::illegal_state(format!(
            "month interval is out of range: {}",
            months
        )));
    }
    Ok(())
}

/// Re-tag a validation failure found while decoding as a stream format error.
fn decoded<T>(offset: usize, r: Result<T>) -> Result<T> {
    r.map_err(|e| match e {
        Error::IllegalArgument(detail) | Error::IllegalState(detail) => {
            Error::format(offset, detail)
        }
        other => other,
    })
}

// ============================================================================
// RawDate
// ============================================================================

/// A calendar date with no zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawDate {
    year: i32,
    month: i32,
    day: i32,
}

impl RawDate {
    /// Create a validated date.
    pub fn new(year: i32, month: i32, day: i32) -> Result<Self> {
        check_date(year, month, day)?;
        Ok(RawDate { year, month, day })
    }

    /// Year
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month, 1-12
    pub fn month(&self) -> i32 {
        self.month
    }

    /// Day of month, 1-31
    pub fn day(&self) -> i32 {
        self.day
    }

    pub(crate) fn write_to(&self, out: &mut BufferOutput<'_>) -> Result<()> {
        out.write_i32(self.year)?;
        out.write_i32(self.month)?;
        out.write_i32(self.day)
    }

    pub(crate) fn read_from(input: &mut BufferInput) -> Result<Self> {
        let offset = input.offset();
        let year = input.read_i32()?;
        let month = input.read_i32()?;
        let day = input.read_i32()?;
        decoded(offset, RawDate::new(year, month, day))
    }

    /// Convert to a `chrono` date.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)
    }
}

impl From<NaiveDate> for RawDate {
    fn from(d: NaiveDate) -> Self {
        RawDate {
            year: d.year(),
            month: d.month() as i32,
            day: d.day() as i32,
        }
    }
}

impl fmt::Display for RawDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

// ============================================================================
// RawTime
// ============================================================================

/// Zone information attached to a [`RawTime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeZone {
    /// No zone; local time
    Local,
    /// Coordinated universal time
    Utc,
    /// Fixed offset from UTC
    Offset {
        /// Hours, -23..=23
        hours: i32,
        /// Minutes, 0..=59
        minutes: i32,
    },
}

impl TimeZone {
    fn zone_type(&self) -> i32 {
        match self {
            TimeZone::Local => 0,
            TimeZone::Utc => 1,
            TimeZone::Offset { .. } => 2,
        }
    }
}

/// A time of day with optional zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawTime {
    hour: i32,
    minute: i32,
    second: i32,
    nanos: i32,
    zone: TimeZone,
}

impl RawTime {
    /// Create a validated local time.
    pub fn new(hour: i32, minute: i32, second: i32, nanos: i32) -> Result<Self> {
        Self::with_zone(hour, minute, second, nanos, TimeZone::Local)
    }

    /// Create a validated UTC time.
    pub fn utc(hour: i32, minute: i32, second: i32, nanos: i32) -> Result<Self> {
        Self::with_zone(hour, minute, second, nanos, TimeZone::Utc)
    }

    /// Create a validated time in the given zone.
    pub fn with_zone(
        hour: i32,
        minute: i32,
        second: i32,
        nanos: i32,
        zone: TimeZone,
    ) -> Result<Self> {
        check_time(hour, minute, second, nanos)?;
        if let TimeZone::Offset { hours, minutes } = zone {
            check_time_zone(hours, minutes)?;
        }
        Ok(RawTime {
            hour,
            minute,
            second,
            nanos,
            zone,
        })
    }

    /// Hour, 0-23
    pub fn hour(&self) -> i32 {
        self.hour
    }

    /// Minute, 0-59
    pub fn minute(&self) -> i32 {
        self.minute
    }

    /// Second, 0-60
    pub fn second(&self) -> i32 {
        self.second
    }

    /// Nanoseconds
    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Zone
    pub fn zone(&self) -> TimeZone {
        self.zone
    }

    pub(crate) fn write_to(&self, out: &mut BufferOutput<'_>) -> Result<()> {
        let fraction = if self.nanos % NANOS_PER_MILLI == 0 {
            self.nanos / NANOS_PER_MILLI
        } else {
            -self.nanos
        };
        out.write_i32(self.hour)?;
        out.write_i32(self.minute)?;
        out.write_i32(self.second)?;
        out.write_i32(fraction)?;
        out.write_i32(self.zone.zone_type())?;
        if let TimeZone::Offset { hours, minutes } = self.zone {
            out.write_i32(hours)?;
            out.write_i32(minutes)?;
        }
        Ok(())
    }

    pub(crate) fn read_from(input: &mut BufferInput) -> Result<Self> {
        let offset = input.offset();
        let hour = input.read_i32()?;
        let minute = input.read_i32()?;
        let second = input.read_i32()?;
        let fraction = input.read_i32()?;
        let nanos = if fraction <= 0 {
            fraction.saturating_neg()
        } else {
            fraction.saturating_mul(NANOS_PER_MILLI)
        };
        let zone = match input.read_i32()? {
            0 => TimeZone::Local,
            1 => TimeZone::Utc,
            2 => TimeZone::Offset {
                hours: input.read_i32()?,
                minutes: input.read_i32()?,
            },
            z => return Err(Error::format(offset, format!("illegal time zone type: {}", z))),
        };
        decoded(offset, RawTime::with_zone(hour, minute, second, nanos, zone))
    }

    /// Convert to a `chrono` time, dropping the zone. A leap second maps to
    /// chrono's leap-second representation.
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        let (second, nanos) = if self.second == 60 {
            (59, self.nanos as u32 + 1_000_000_000)
        } else {
            (self.second, self.nanos as u32)
        };
        NaiveTime::from_hms_nano_opt(self.hour as u32, self.minute as u32, second as u32, nanos)
    }

    /// The zone as a `chrono` offset; `None` for local time.
    pub fn offset(&self) -> Option<FixedOffset> {
        match self.zone {
            TimeZone::Local => None,
            TimeZone::Utc => FixedOffset::east_opt(0),
            TimeZone::Offset { hours, minutes } => {
                let sign = if hours < 0 { -1 } else { 1 };
                let secs = hours * 3600 + sign * minutes * 60;
                FixedOffset::east_opt(secs)
            }
        }
    }
}

impl From<NaiveTime> for RawTime {
    fn from(t: NaiveTime) -> Self {
        let (second, nanos) = if t.nanosecond() >= 1_000_000_000 {
            (60, 0)
        } else {
            (t.second() as i32, t.nanosecond() as i32)
        };
        RawTime {
            hour: t.hour() as i32,
            minute: t.minute() as i32,
            second,
            nanos,
            zone: TimeZone::Local,
        }
    }
}

impl fmt::Display for RawTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)?;
        if self.nanos != 0 {
            write!(f, ".{:09}", self.nanos)?;
        }
        match self.zone {
            TimeZone::Local => Ok(()),
            TimeZone::Utc => write!(f, "Z"),
            TimeZone::Offset { hours, minutes } => {
                let sign = if hours < 0 { '-' } else { '+' };
                write!(f, "{}{:02}:{:02}", sign, hours.abs(), minutes)
            }
        }
    }
}

// ============================================================================
// RawDateTime
// ============================================================================

/// A date and a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawDateTime {
    date: RawDate,
    time: RawTime,
}

impl RawDateTime {
    /// Combine a date and a time.
    pub fn new(date: RawDate, time: RawTime) -> Self {
        RawDateTime { date, time }
    }

    /// Date part
    pub fn date(&self) -> RawDate {
        self.date
    }

    /// Time part
    pub fn time(&self) -> RawTime {
        self.time
    }

    pub(crate) fn write_to(&self, out: &mut BufferOutput<'_>) -> Result<()> {
        self.date.write_to(out)?;
        self.time.write_to(out)
    }

    pub(crate) fn read_from(input: &mut BufferInput) -> Result<Self> {
        let date = RawDate::read_from(input)?;
        let time = RawTime::read_from(input)?;
        Ok(RawDateTime { date, time })
    }

    /// Convert to a `chrono` date-time, dropping the zone.
    pub fn to_naive_date_time(&self) -> Option<NaiveDateTime> {
        Some(NaiveDateTime::new(self.date.to_naive_date()?, self.time.to_naive_time()?))
    }
}

impl From<NaiveDateTime> for RawDateTime {
    fn from(dt: NaiveDateTime) -> Self {
        RawDateTime {
            date: dt.date().into(),
            time: dt.time().into(),
        }
    }
}

impl From<chrono::DateTime<FixedOffset>> for RawDateTime {
    fn from(dt: chrono::DateTime<FixedOffset>) -> Self {
        let secs = dt.offset().local_minus_utc();
        let zone = if secs == 0 {
            TimeZone::Utc
        } else {
            TimeZone::Offset {
                hours: secs / 3600,
                minutes: (secs.abs() % 3600) / 60,
            }
        };
        let local = dt.naive_local();
        let mut time = RawTime::from(local.time());
        time.zone = zone;
        RawDateTime {
            date: local.date().into(),
            time,
        }
    }
}

impl fmt::Display for RawDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

// ============================================================================
// Intervals
// ============================================================================

/// A span of years and months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawYearMonthInterval {
    years: i32,
    months: i32,
}

impl RawYearMonthInterval {
    /// Create a validated interval.
    pub fn new(years: i32, months: i32) -> Result<Self> {
        check_year_month_interval(years, months)?;
        Ok(RawYearMonthInterval { years, months })
    }

    /// Years
    pub fn years(&self) -> i32 {
        self.years
    }

    /// Months
    pub fn months(&self) -> i32 {
        self.months
    }

    pub(crate) fn write_to(&self, out: &mut BufferOutput<'_>) -> Result<()> {
        out.write_i32(self.years)?;
        out.write_i32(self.months)
    }

    pub(crate) fn read_from(input: &mut BufferInput) -> Result<Self> {
        let offset = input.offset();
        let years = input.read_i32()?;
        let months = input.read_i32()?;
        decoded(offset, RawYearMonthInterval::new(years, months))
    }
}

/// A span of hours, minutes, seconds and nanos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawTimeInterval {
    hours: i32,
    minutes: i32,
    seconds: i32,
    nanos: i32,
}

impl RawTimeInterval {
    /// Create a validated interval.
    pub fn new(hours: i32, minutes: i32, seconds: i32, nanos: i32) -> Result<Self> {
        check_time_interval(hours, minutes, seconds, nanos)?;
        Ok(RawTimeInterval {
            hours,
            minutes,
            seconds,
            nanos,
        })
    }

    /// Hours
    pub fn hours(&self) -> i32 {
        self.hours
    }

    /// Minutes
    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    /// Seconds
    pub fn seconds(&self) -> i32 {
        self.seconds
    }

    /// Nanoseconds
    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    pub(crate) fn write_to(&self, out: &mut BufferOutput<'_>) -> Result<()> {
        out.write_i32(self.hours)?;
        out.write_i32(self.minutes)?;
        out.write_i32(self.seconds)?;
        out.write_i32(self.nanos)
    }

    pub(crate) fn read_from(input: &mut BufferInput) -> Result<Self> {
        let offset = input.offset();
        let h = input.read_i32()?;
        let m = input.read_i32()?;
        let s = input.read_i32()?;
        let n = input.read_i32()?;
        decoded(offset, RawTimeInterval::new(h, m, s, n))
    }
}

/// A span of days plus a time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawDayTimeInterval {
    days: i32,
    hours: i32,
    minutes: i32,
    seconds: i32,
    nanos: i32,
}

impl RawDayTimeInterval {
    /// Create a validated interval.
    pub fn new(days: i32, hours: i32, minutes: i32, seconds: i32, nanos: i32) -> Result<Self> {
        check_day_time_interval(days, hours, minutes, seconds, nanos)?;
        Ok(RawDayTimeInterval {
            days,
            hours,
            minutes,
            seconds,
            nanos,
        })
    }

    /// Days
    pub fn days(&self) -> i32 {
        self.days
    }

    /// Hours
    pub fn hours(&self) -> i32 {
        self.hours
    }

    /// Minutes
    pub fn minutes(&self) -> i32 {
        self.minutes
    }

    /// Seconds
    pub fn seconds(&self) -> i32 {
        self.seconds
    }

    /// Nanoseconds
    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    pub(crate) fn write_to(&self, out: &mut BufferOutput<'_>) -> Result<()> {
        out.write_i32(self.days)?;
        out.write_i32(self.hours)?;
        out.write_i32(self.minutes)?;
        out.write_i32(self.seconds)?;
        out.write_i32(self.nanos)
    }

    pub(crate) fn read_from(input: &mut BufferInput) -> Result<Self> {
        let offset = input.offset();
        let d = input.read_i32()?;
        let h = input.read_i32()?;
        let m = input.read_i32()?;
        let s = input.read_i32()?;
        let n = input.read_i32()?;
        decoded(offset, RawDayTimeInterval::new(d, h, m, s, n))
    }

    /// Total length as a `chrono` duration.
    pub fn to_duration(&self) -> chrono::Duration {
        let secs = self.days as i64 * 86_400
            + self.hours as i64 * 3_600
            + self.minutes as i64 * 60
            + self.seconds as i64;
        chrono::Duration::seconds(secs) + chrono::Duration::nanoseconds(self.nanos as i64)
    }
}
