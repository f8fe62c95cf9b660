pub type CapPlanDateTime = hifitime::Epoch;

use hifitime::{UNIX_REF_EPOCH, Unit};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Largest magnitude of Unix seconds read as an instant: the span of an
/// `i64` count of nanoseconds, roughly the years 1677 to 2262.
pub const MAX_UNIX_SECONDS: f64 = i64::MAX as f64 / 1e9;

/// Calendar fields of an instant, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub hour: u8,
    /// Monday is 0, Sunday is 6
    pub day_of_week: u8,
    pub day: u8,
    pub month: u8,
}

pub trait CapPlanDateTimeExt {
    fn from_unix_nanoseconds_i64(timestamp: i64) -> Self;
    fn from_unix_seconds_i64(timestamp: i64) -> Self;
    fn checked_from_unix_seconds(seconds: f64) -> Option<Self>
    where
        Self: std::marker::Sized;
    fn parse_timestamp(text: &str) -> Option<Self>
    where
        Self: std::marker::Sized;
    fn calendar_fields(&self) -> CalendarFields;
    fn sort_key(&self) -> i128;
}

impl CapPlanDateTimeExt for CapPlanDateTime {
    fn from_unix_nanoseconds_i64(timestamp: i64) -> Self {
        Self::from_unix_duration(hifitime::Duration::from_truncated_nanoseconds(timestamp))
    }
    fn from_unix_seconds_i64(timestamp: i64) -> Self {
        Self::from_utc_duration(UNIX_REF_EPOCH.to_utc_duration() + timestamp * Unit::Second)
    }

    /// Unix seconds as an instant, or `None` when not finite or beyond
    /// [`MAX_UNIX_SECONDS`].
    fn checked_from_unix_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds.abs() > MAX_UNIX_SECONDS {
            return None;
        }
        Some(Self::from_unix_seconds(seconds))
    }

    /// Parses ISO 8601 / RFC 3339 text, or a plain number of Unix seconds.
    ///
    /// Offsets are folded into UTC. A space is accepted in place of the `T`
    /// separator, as databases tend to render timestamps that way. A date
    /// without a time is midnight UTC.
    fn parse_timestamp(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(seconds) = text.parse::<f64>() {
            return Self::checked_from_unix_seconds(seconds);
        }

        let normalised = match (text.get(..10), text.get(10..11), text.get(11..)) {
            (Some(date), Some(" "), Some(time)) => format!("{}T{}", date, time),
            _ => text.to_string(),
        };
        match iso8601::datetime(&normalised) {
            Ok(datetime) => convert_iso8601_datetime(datetime),
            Err(_) => iso8601::date(&normalised).ok().and_then(midnight_utc),
        }
    }

    fn calendar_fields(&self) -> CalendarFields {
        let (_year, month, day, hour, _minute, _second, _nanos) = self.to_gregorian_utc();
        // 1970-01-01 was a Thursday
        let days_since_unix_epoch = (self.to_unix_seconds() / SECONDS_PER_DAY).floor() as i64;
        let day_of_week = (days_since_unix_epoch + 3).rem_euclid(7) as u8;
        CalendarFields {
            hour,
            day_of_week,
            day,
            month,
        }
    }

    fn sort_key(&self) -> i128 {
        self.to_tai_duration().total_nanoseconds()
    }
}

fn midnight_utc(date: iso8601::Date) -> Option<CapPlanDateTime> {
    let first_day = |month: u8, day: u8| {
        let year = match date {
            iso8601::Date::YMD { year, .. }
            | iso8601::Date::Week { year, .. }
            | iso8601::Date::Ordinal { year, .. } => year,
        };
        CapPlanDateTime::maybe_from_gregorian_utc(year, month, day, 0, 0, 0, 0).ok()
    };

    match date {
        iso8601::Date::YMD { month, day, .. } => {
            let month = u8::try_from(month).ok()?;
            let day = u8::try_from(day).ok()?;
            first_day(month, day)
        }
        iso8601::Date::Week { ww, d, .. } => {
            if !(1..=53).contains(&ww) || !(1..=7).contains(&d) {
                return None;
            }
            // Week 1 is the week holding January 4
            let january_4 = first_day(1, 4)?;
            let week_1_monday =
                january_4 - Unit::Day * january_4.calendar_fields().day_of_week as i64;
            Some(week_1_monday + Unit::Day * (7 * (ww as i64 - 1) + (d as i64 - 1)))
        }
        iso8601::Date::Ordinal { ddd, .. } => {
            if !(1..=366).contains(&ddd) {
                return None;
            }
            Some(first_day(1, 1)? + Unit::Day * (ddd as i64 - 1))
        }
    }
}

fn convert_iso8601_datetime(dt: iso8601::DateTime) -> Option<CapPlanDateTime> {
    let time = dt.time;
    if time.hour > 23 || time.minute > 59 || time.second > 60 || time.millisecond > 999 {
        return None;
    }
    let mut epoch = midnight_utc(dt.date)?
        + Unit::Hour * time.hour as i64
        + Unit::Minute * time.minute as i64
        + Unit::Second * time.second as i64
        + Unit::Millisecond * time.millisecond as i64;

    // Local time minus its offset gives UTC
    let offset_minutes = time.tz_offset_hours as i64 * 60
        + if time.tz_offset_hours < 0 {
            -(time.tz_offset_minutes as i64).abs()
        } else {
            time.tz_offset_minutes as i64
        };
    if offset_minutes != 0 {
        epoch -= Unit::Minute * offset_minutes;
    }

    Some(epoch)
}
