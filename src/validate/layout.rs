//! Reference-time layouts such as `2006-01-02 at 3:04PM MST`.
//!
//! A layout is written by showing how the reference instant `Mon Jan 2 15:04:05 MST 2006`
//! would be rendered; every recognised chunk (`2006`, `Jan`, `15`, `PM`, `MST`, …) is a field
//! and everything else is literal text.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

use crate::database::models::account_preference::PreferenceName;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("cannot parse {value:?} as {element}")]
    Mismatch { element: &'static str, value: String },

    #[error("{0} out of range")]
    OutOfRange(&'static str),

    #[error("extra text after layout: {0:?}")]
    ExtraText(String),
}

const LONG_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const SHORT_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const LONG_DAYS: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];
const SHORT_DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Std {
    LongMonth,
    Month,
    NumMonth,
    ZeroMonth,
    LongWeekDay,
    WeekDay,
    Day,
    UnderDay,
    ZeroDay,
    Hour,
    Hour12,
    ZeroHour12,
    Minute,
    ZeroMinute,
    Second,
    ZeroSecond,
    LongYear,
    Year,
    PM,
    Pm,
    Tz,
    Iso8601Tz,
    Iso8601ColonTz,
    Iso8601ShortTz,
    NumTz,
    NumColonTz,
    NumShortTz,
    FracSecond0(usize),
    FracSecond9(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Literal(&'a str),
    Std(Std),
}

/// Wall-clock time with its UTC offset and, when known, a zone abbreviation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedTime {
    pub local: NaiveDateTime,
    pub offset_secs: i32,
    pub zone: Option<String>,
}

impl ZonedTime {
    pub fn new(local: NaiveDateTime, offset_secs: i32, zone: Option<String>) -> Self {
        Self { local, offset_secs, zone }
    }

    pub fn from_utc(instant: chrono::DateTime<chrono::Utc>) -> Self {
        Self::new(instant.naive_utc(), 0, Some("UTC".to_string()))
    }

    /// `2006-01-02T15:04:05Z` seen from MST (UTC-7)
    pub fn reference_mst() -> Self {
        Self::new(reference_wall(8), -7 * 3600, Some("MST".to_string()))
    }

    /// `2006-01-02T15:04:05Z` in UTC
    pub fn reference_utc() -> Self {
        Self::new(reference_wall(15), 0, Some("UTC".to_string()))
    }

    pub fn utc(&self) -> NaiveDateTime {
        self.local - chrono::Duration::seconds(self.offset_secs as i64)
    }

    /// January 1, year 1, 00:00:00 UTC
    pub fn is_zero(&self) -> bool {
        NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(false, |zero| self.utc() == zero)
    }
}

fn reference_wall(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2006, 1, 2)
        .and_then(|d| d.and_hms_opt(hour, 4, 5))
        .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::default().naive_utc())
}

fn starts_with_lower(s: &str) -> bool {
    s.as_bytes().first().map_or(false, |c| c.is_ascii_lowercase())
}

/// Recognise a field at the start of `s`, returning it and its length
fn std_at(s: &str) -> Option<(Std, usize)> {
    let b = s.as_bytes();
    match *b.first()? {
        b'J' if s.starts_with("January") => Some((Std::LongMonth, 7)),
        b'J' if s.starts_with("Jan") && !starts_with_lower(&s[3..]) => Some((Std::Month, 3)),
        b'M' if s.starts_with("Monday") => Some((Std::LongWeekDay, 6)),
        b'M' if s.starts_with("Mon") && !starts_with_lower(&s[3..]) => Some((Std::WeekDay, 3)),
        b'M' if s.starts_with("MST") => Some((Std::Tz, 3)),
        b'0' => match b.get(1).copied() {
            Some(c @ b'1'..=b'6') => {
                let std = [
                    Std::ZeroMonth,
                    Std::ZeroDay,
                    Std::ZeroHour12,
                    Std::ZeroMinute,
                    Std::ZeroSecond,
                    Std::Year,
                ][(c - b'1') as usize];
                Some((std, 2))
            }
            _ => None,
        },
        b'1' if b.get(1) == Some(&b'5') => Some((Std::Hour, 2)),
        b'1' => Some((Std::NumMonth, 1)),
        b'2' if s.starts_with("2006") => Some((Std::LongYear, 4)),
        b'2' => Some((Std::Day, 1)),
        // "_2006" is a literal underscore followed by the year
        b'_' if b.get(1) == Some(&b'2') && !s[1..].starts_with("2006") => Some((Std::UnderDay, 2)),
        b'3' => Some((Std::Hour12, 1)),
        b'4' => Some((Std::Minute, 1)),
        b'5' => Some((Std::Second, 1)),
        b'P' if b.get(1) == Some(&b'M') => Some((Std::PM, 2)),
        b'p' if b.get(1) == Some(&b'm') => Some((Std::Pm, 2)),
        b'-' if s.starts_with("-07:00") => Some((Std::NumColonTz, 6)),
        b'-' if s.starts_with("-0700") => Some((Std::NumTz, 5)),
        b'-' if s.starts_with("-07") => Some((Std::NumShortTz, 3)),
        b'Z' if s.starts_with("Z07:00") => Some((Std::Iso8601ColonTz, 6)),
        b'Z' if s.starts_with("Z0700") => Some((Std::Iso8601Tz, 5)),
        b'Z' if s.starts_with("Z07") => Some((Std::Iso8601ShortTz, 3)),
        b'.' => {
            let ch = *b.get(1)?;
            if ch != b'0' && ch != b'9' {
                return None;
            }
            let mut j = 1;
            while j < b.len() && b[j] == ch {
                j += 1;
            }
            if b.get(j).map_or(false, |c| c.is_ascii_digit()) {
                return None;
            }
            let digits = (j - 1).min(9);
            let std = if ch == b'0' {
                Std::FracSecond0(digits)
            } else {
                Std::FracSecond9(digits)
            };
            Some((std, j))
        }
        _ => None,
    }
}

fn tokenize(layout: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i < layout.len() {
        if let Some((std, len)) = std_at(&layout[i..]) {
            if literal_start < i {
                chunks.push(Chunk::Literal(&layout[literal_start..i]));
            }
            chunks.push(Chunk::Std(std));
            i += len;
            literal_start = i;
        } else {
            i += layout[i..].chars().next().map_or(1, char::len_utf8);
        }
    }
    if literal_start < layout.len() {
        chunks.push(Chunk::Literal(&layout[literal_start..]));
    }
    chunks
}

/// True when the layout contains at least one field
pub fn has_fields(layout: &str) -> bool {
    tokenize(layout).iter().any(|c| matches!(c, Chunk::Std(_)))
}

fn push_offset(out: &mut String, offset_secs: i32, colon: bool, minutes: bool) {
    let minutes_total = offset_secs / 60;
    let (sign, abs) = if minutes_total < 0 { ('-', -minutes_total) } else { ('+', minutes_total) };
    out.push(sign);
    out.push_str(&format!("{:02}", abs / 60));
    if minutes {
        if colon {
            out.push(':');
        }
        out.push_str(&format!("{:02}", abs % 60));
    }
}

/// Render `t` using `layout`
pub fn format(layout: &str, t: &ZonedTime) -> String {
    let mut out = String::with_capacity(layout.len() + 10);
    let local = &t.local;
    for chunk in tokenize(layout) {
        let std = match chunk {
            Chunk::Literal(text) => {
                out.push_str(text);
                continue;
            }
            Chunk::Std(std) => std,
        };
        match std {
            Std::LongYear => out.push_str(&format!("{:04}", local.year())),
            Std::Year => out.push_str(&format!("{:02}", local.year().rem_euclid(100))),
            Std::LongMonth => out.push_str(LONG_MONTHS[local.month0() as usize]),
            Std::Month => out.push_str(SHORT_MONTHS[local.month0() as usize]),
            Std::NumMonth => out.push_str(&local.month().to_string()),
            Std::ZeroMonth => out.push_str(&format!("{:02}", local.month())),
            Std::LongWeekDay => {
                out.push_str(LONG_DAYS[local.weekday().num_days_from_sunday() as usize])
            }
            Std::WeekDay => {
                out.push_str(SHORT_DAYS[local.weekday().num_days_from_sunday() as usize])
            }
            Std::Day => out.push_str(&local.day().to_string()),
            Std::UnderDay => out.push_str(&format!("{:>2}", local.day())),
            Std::ZeroDay => out.push_str(&format!("{:02}", local.day())),
            Std::Hour => out.push_str(&format!("{:02}", local.hour())),
            Std::Hour12 | Std::ZeroHour12 => {
                let hour = match local.hour() % 12 {
                    0 => 12,
                    h => h,
                };
                if std == Std::ZeroHour12 {
                    out.push_str(&format!("{:02}", hour));
                } else {
                    out.push_str(&hour.to_string());
                }
            }
            Std::Minute => out.push_str(&local.minute().to_string()),
            Std::ZeroMinute => out.push_str(&format!("{:02}", local.minute())),
            Std::Second => out.push_str(&local.second().to_string()),
            Std::ZeroSecond => out.push_str(&format!("{:02}", local.second())),
            Std::PM => out.push_str(if local.hour() >= 12 { "PM" } else { "AM" }),
            Std::Pm => out.push_str(if local.hour() >= 12 { "pm" } else { "am" }),
            Std::Tz => match t.zone.as_deref() {
                Some(name) if !name.is_empty() => out.push_str(name),
                _ => push_offset(&mut out, t.offset_secs, false, true),
            },
            Std::Iso8601Tz | Std::Iso8601ColonTz | Std::Iso8601ShortTz if t.offset_secs == 0 => {
                out.push('Z')
            }
            Std::Iso8601Tz | Std::NumTz => push_offset(&mut out, t.offset_secs, false, true),
            Std::Iso8601ColonTz | Std::NumColonTz => push_offset(&mut out, t.offset_secs, true, true),
            Std::Iso8601ShortTz | Std::NumShortTz => push_offset(&mut out, t.offset_secs, false, false),
            Std::FracSecond0(digits) => {
                let nanos = format!("{:09}", local.nanosecond() % 1_000_000_000);
                out.push('.');
                out.push_str(&nanos[..digits]);
            }
            Std::FracSecond9(digits) => {
                let nanos = format!("{:09}", local.nanosecond() % 1_000_000_000);
                let trimmed = nanos[..digits].trim_end_matches('0');
                if !trimmed.is_empty() {
                    out.push('.');
                    out.push_str(trimmed);
                }
            }
        }
    }
    out
}

fn mismatch(element: &'static str, value: &str) -> LayoutError {
    LayoutError::Mismatch {
        element,
        value: value.to_string(),
    }
}

/// One or two leading digits; exactly two when `fixed`
fn getnum<'a>(s: &'a str, fixed: bool, element: &'static str) -> Result<(u32, &'a str), LayoutError> {
    let b = s.as_bytes();
    let first = match b.first() {
        Some(c) if c.is_ascii_digit() => (c - b'0') as u32,
        _ => return Err(mismatch(element, s)),
    };
    match b.get(1) {
        Some(c) if c.is_ascii_digit() => Ok((first * 10 + (c - b'0') as u32, &s[2..])),
        _ if fixed => Err(mismatch(element, s)),
        _ => Ok((first, &s[1..])),
    }
}

fn fixed_digits<'a>(s: &'a str, n: usize, element: &'static str) -> Result<(i32, &'a str), LayoutError> {
    match s.get(..n) {
        Some(p) if p.bytes().all(|c| c.is_ascii_digit()) => {
            let v = p.parse::<i32>().map_err(|_| mismatch(element, s))?;
            Ok((v, &s[n..]))
        }
        _ => Err(mismatch(element, s)),
    }
}

fn lookup<'a>(table: &[&str], s: &'a str, element: &'static str) -> Result<(usize, &'a str), LayoutError> {
    for (i, name) in table.iter().enumerate() {
        if s.get(..name.len()).map_or(false, |p| p.eq_ignore_ascii_case(name)) {
            return Ok((i, &s[name.len()..]));
        }
    }
    Err(mismatch(element, s))
}

/// Literal matching where a run of spaces in the layout matches a run of spaces in the value
fn skip<'a>(mut value: &'a str, mut prefix: &str) -> Result<&'a str, LayoutError> {
    let original = value;
    while let Some(c) = prefix.chars().next() {
        if c == ' ' {
            if !value.is_empty() && !value.starts_with(' ') {
                return Err(mismatch("literal", original));
            }
            prefix = prefix.trim_start_matches(' ');
            value = value.trim_start_matches(' ');
            continue;
        }
        if !value.starts_with(c) {
            return Err(mismatch("literal", original));
        }
        prefix = &prefix[c.len_utf8()..];
        value = &value[c.len_utf8()..];
    }
    Ok(value)
}

/// Length of a zone abbreviation at the start of `s` (3 to 5 upper-case letters)
fn zone_abbreviation_len(s: &str) -> Option<usize> {
    let upper = s.bytes().take(6).take_while(|c| c.is_ascii_uppercase()).count();
    let b = s.as_bytes();
    match upper {
        3 => Some(3),
        4 if b[3] == b'T' || &s[..4] == "WITA" => Some(4),
        5 if b[4] == b'T' => Some(5),
        _ => None,
    }
}

fn parse_offset<'a>(s: &'a str, std: Std) -> Result<(i32, &'a str), LayoutError> {
    let sign = match s.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(mismatch("time zone offset", s)),
    };
    let (hours, mut rest) = fixed_digits(&s[1..], 2, "time zone offset")?;
    let mut minutes = 0;
    match std {
        Std::NumColonTz | Std::Iso8601ColonTz => {
            rest = rest.strip_prefix(':').ok_or_else(|| mismatch("time zone offset", s))?;
            let (m, r) = fixed_digits(rest, 2, "time zone offset")?;
            minutes = m;
            rest = r;
        }
        Std::NumTz | Std::Iso8601Tz => {
            let (m, r) = fixed_digits(rest, 2, "time zone offset")?;
            minutes = m;
            rest = r;
        }
        _ => {}
    }
    if hours > 24 || minutes > 59 {
        return Err(LayoutError::OutOfRange("time zone offset"));
    }
    Ok((sign * (hours * 3600 + minutes * 60), rest))
}

fn parse_nanos(digits: &str) -> u32 {
    let mut padded = digits.chars().take(9).collect::<String>();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

/// Parse `value` according to `layout`. Omitted elements default to zero (or one for month
/// and day), so a layout without a year yields year 0.
pub fn parse(layout: &str, value: &str) -> Result<ZonedTime, LayoutError> {
    let chunks = tokenize(layout);
    let mut rest = value;

    let mut year: i32 = 0;
    let mut month: u32 = 1;
    let mut day: u32 = 1;
    let mut hour: u32 = 0;
    let mut minute: u32 = 0;
    let mut second: u32 = 0;
    let mut nanos: u32 = 0;
    let mut pm_set = false;
    let mut am_set = false;
    let mut offset: Option<i32> = None;
    let mut zone: Option<String> = None;

    for (index, chunk) in chunks.iter().enumerate() {
        let std = match chunk {
            Chunk::Literal(text) => {
                rest = skip(rest, text)?;
                continue;
            }
            Chunk::Std(std) => *std,
        };
        match std {
            Std::LongYear => {
                let (v, r) = fixed_digits(rest, 4, "year")?;
                year = v;
                rest = r;
            }
            Std::Year => {
                let (v, r) = fixed_digits(rest, 2, "year")?;
                year = if v >= 69 { v + 1900 } else { v + 2000 };
                rest = r;
            }
            Std::LongMonth | Std::Month => {
                let table: &[&str] = if std == Std::LongMonth { &LONG_MONTHS } else { &SHORT_MONTHS };
                let (i, r) = lookup(table, rest, "month")?;
                month = i as u32 + 1;
                rest = r;
            }
            Std::NumMonth | Std::ZeroMonth => {
                let (v, r) = getnum(rest, std == Std::ZeroMonth, "month")?;
                if !(1..=12).contains(&v) {
                    return Err(LayoutError::OutOfRange("month"));
                }
                month = v;
                rest = r;
            }
            Std::LongWeekDay | Std::WeekDay => {
                let table: &[&str] = if std == Std::LongWeekDay { &LONG_DAYS } else { &SHORT_DAYS };
                let (_, r) = lookup(table, rest, "day of week")?;
                rest = r;
            }
            Std::Day | Std::UnderDay | Std::ZeroDay => {
                if std == Std::UnderDay {
                    rest = rest.strip_prefix(' ').unwrap_or(rest);
                }
                let (v, r) = getnum(rest, std == Std::ZeroDay, "day")?;
                if v > 31 {
                    return Err(LayoutError::OutOfRange("day"));
                }
                day = v;
                rest = r;
            }
            Std::Hour => {
                let (v, r) = getnum(rest, false, "hour")?;
                if v > 23 {
                    return Err(LayoutError::OutOfRange("hour"));
                }
                hour = v;
                rest = r;
            }
            Std::Hour12 | Std::ZeroHour12 => {
                let (v, r) = getnum(rest, std == Std::ZeroHour12, "hour")?;
                if v > 12 {
                    return Err(LayoutError::OutOfRange("hour"));
                }
                hour = v;
                rest = r;
            }
            Std::Minute | Std::ZeroMinute => {
                let (v, r) = getnum(rest, std == Std::ZeroMinute, "minute")?;
                if v > 59 {
                    return Err(LayoutError::OutOfRange("minute"));
                }
                minute = v;
                rest = r;
            }
            Std::Second | Std::ZeroSecond => {
                let (v, r) = getnum(rest, std == Std::ZeroSecond, "second")?;
                if v > 59 {
                    return Err(LayoutError::OutOfRange("second"));
                }
                second = v;
                rest = r;
                // fractional seconds present in the value but not in the layout
                let next_is_frac = matches!(
                    chunks.get(index + 1),
                    Some(Chunk::Std(Std::FracSecond0(_) | Std::FracSecond9(_)))
                );
                let b = rest.as_bytes();
                if !next_is_frac && b.len() >= 2 && b[0] == b'.' && b[1].is_ascii_digit() {
                    let n = 1 + b[1..].iter().take_while(|c| c.is_ascii_digit()).count();
                    nanos = parse_nanos(&rest[1..n]);
                    rest = &rest[n..];
                }
            }
            Std::PM | Std::Pm => {
                let (am, pm) = if std == Std::PM { ("AM", "PM") } else { ("am", "pm") };
                match rest.get(..2) {
                    Some(p) if p == pm => pm_set = true,
                    Some(p) if p == am => am_set = true,
                    _ => return Err(mismatch("AM/PM", rest)),
                }
                rest = &rest[2..];
            }
            Std::Iso8601Tz | Std::Iso8601ColonTz | Std::Iso8601ShortTz if rest.starts_with('Z') => {
                rest = &rest[1..];
                offset = Some(0);
                zone = Some("UTC".to_string());
            }
            Std::Iso8601Tz
            | Std::Iso8601ColonTz
            | Std::Iso8601ShortTz
            | Std::NumTz
            | Std::NumColonTz
            | Std::NumShortTz => {
                let (v, r) = parse_offset(rest, std)?;
                offset = Some(v);
                rest = r;
            }
            Std::Tz => {
                if let Some(r) = rest.strip_prefix("UTC") {
                    offset = Some(0);
                    zone = Some("UTC".to_string());
                    rest = r;
                } else {
                    let n = zone_abbreviation_len(rest).ok_or_else(|| mismatch("time zone", rest))?;
                    zone = Some(rest[..n].to_string());
                    rest = &rest[n..];
                }
            }
            Std::FracSecond0(digits) => {
                let b = rest.as_bytes();
                let ok = b.len() > digits
                    && b[0] == b'.'
                    && b[1..=digits].iter().all(|c| c.is_ascii_digit());
                if !ok {
                    return Err(mismatch("fractional second", rest));
                }
                nanos = parse_nanos(&rest[1..=digits]);
                rest = &rest[1 + digits..];
            }
            Std::FracSecond9(_) => {
                let b = rest.as_bytes();
                if b.len() >= 2 && b[0] == b'.' && b[1].is_ascii_digit() {
                    let n = 1 + b[1..].iter().take_while(|c| c.is_ascii_digit()).count();
                    nanos = parse_nanos(&rest[1..n]);
                    rest = &rest[n..];
                }
            }
        }
    }

    if !rest.is_empty() {
        return Err(LayoutError::ExtraText(rest.to_string()));
    }

    if pm_set && hour < 12 {
        hour += 12;
    } else if am_set && hour == 12 {
        hour = 0;
    }

    let local = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(LayoutError::OutOfRange("day"))?
        .and_hms_nano_opt(hour, minute, second, nanos)
        .ok_or(LayoutError::OutOfRange("time"))?;

    // an abbreviation without an explicit offset is taken at offset zero
    let zone = match (offset, zone) {
        (Some(_), zone) => zone,
        (None, Some(name)) => Some(name),
        (None, None) => Some("UTC".to_string()),
    };
    Ok(ZonedTime::new(local, offset.unwrap_or(0), zone))
}

/// Whether `layout` is an acceptable value for the preference `kind`.
///
/// The reference instant is rendered with the layout, parsed back and rendered again; the
/// two renderings must agree and the parsed value must match the reference at the kind's
/// resolution (datetime: calendar date as rendered, date: UTC calendar date, time: UTC hour
/// and minute).
pub fn preference_value_ok(kind: PreferenceName, layout: &str) -> bool {
    let reference = match kind {
        PreferenceName::DatetimeFormat | PreferenceName::DateFormat => ZonedTime::reference_mst(),
        PreferenceName::TimeFormat => ZonedTime::reference_utc(),
    };

    let rendered = format(layout, &reference);
    let parsed = match parse(layout, &rendered) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    if parsed.is_zero() || format(layout, &parsed) != rendered {
        return false;
    }

    match kind {
        PreferenceName::DatetimeFormat => parsed.local.date() == reference.local.date(),
        PreferenceName::DateFormat => parsed.utc().date() == reference.utc().date(),
        PreferenceName::TimeFormat => {
            let (p, r) = (parsed.utc(), reference.utc());
            p.hour() == r.hour() && p.minute() == r.minute()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_reference_in_mst() {
        let t = ZonedTime::reference_mst();
        assert_eq!(format("2006-01-02 at 3:04PM MST", &t), "2006-01-02 at 8:04AM MST");
        assert_eq!(format("Mon Jan _2 15:04:05 2006", &t), "Mon Jan  2 08:04:05 2006");
        assert_eq!(format("2006-01-02T15:04:05Z07:00", &t), "2006-01-02T08:04:05-07:00");
        assert_eq!(format("January 2, 06", &t), "January 2, 06");
    }

    #[test]
    fn formats_utc_offsets_as_z() {
        let t = ZonedTime::reference_utc();
        assert_eq!(format("15:04Z07:00", &t), "15:04Z");
        assert_eq!(format("15:04 -0700", &t), "15:04 +0000");
        assert_eq!(format("3:04pm MST", &t), "3:04pm UTC");
    }

    #[test]
    fn fractional_seconds() {
        let local = NaiveDate::from_ymd_opt(2020, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 120)
            .unwrap();
        let t = ZonedTime::new(local, 0, Some("UTC".into()));
        assert_eq!(format("05.000", &t), "09.120");
        assert_eq!(format("05.999", &t), "09.12");

        let parsed = parse("15:04:05.000", "07:08:09.120").unwrap();
        assert_eq!(parsed.local.nanosecond(), 120_000_000);
    }

    #[test]
    fn parses_with_offset() {
        let parsed = parse("2006-01-02T15:04:05-07:00", "2006-01-02T08:04:05-07:00").unwrap();
        assert_eq!(parsed.offset_secs, -7 * 3600);
        assert_eq!(parsed.utc(), ZonedTime::reference_utc().local);
    }

    #[test]
    fn parses_twelve_hour_clock() {
        let parsed = parse("3:04PM", "12:30AM").unwrap();
        assert_eq!(parsed.local.hour(), 0);
        let parsed = parse("3:04PM", "1:05PM").unwrap();
        assert_eq!(parsed.local.hour(), 13);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("2006-01-02", "2006/01/02").is_err());
        assert!(parse("2006-01-02", "2006-02-30").is_err());
        assert!(matches!(parse("2006", "2006x"), Err(LayoutError::ExtraText(_))));
    }

    #[test]
    fn literal_layout_has_no_fields() {
        assert!(!has_fields("xxxxxx"));
        assert!(has_fields("2006"));
        let parsed = parse("xxxxxx", "xxxxxx").unwrap();
        assert_eq!(parsed.local.year(), 0);
    }

    #[test]
    fn accepts_default_formats() {
        assert!(preference_value_ok(PreferenceName::DatetimeFormat, "2006-01-02 at 3:04PM MST"));
        assert!(preference_value_ok(PreferenceName::DateFormat, "2006-01-02"));
        assert!(preference_value_ok(PreferenceName::TimeFormat, "3:04PM MST"));
    }

    #[test]
    fn accepts_other_reasonable_formats() {
        assert!(preference_value_ok(PreferenceName::DatetimeFormat, "Mon Jan _2 15:04:05 MST 2006"));
        assert!(preference_value_ok(PreferenceName::DatetimeFormat, "2006-01-02T15:04:05Z07:00"));
        assert!(preference_value_ok(PreferenceName::DateFormat, "Jan 2, 2006"));
        assert!(preference_value_ok(PreferenceName::TimeFormat, "15:04"));
    }

    #[test]
    fn rejects_formats_losing_resolution() {
        assert!(!preference_value_ok(PreferenceName::DatetimeFormat, "xxxxxx"));
        assert!(!preference_value_ok(PreferenceName::DateFormat, "xxxxxx"));
        assert!(!preference_value_ok(PreferenceName::TimeFormat, "xxxxxx"));
        // no day of month
        assert!(!preference_value_ok(PreferenceName::DateFormat, "2006-01"));
        // no minutes
        assert!(!preference_value_ok(PreferenceName::TimeFormat, "15h"));
    }
}
