//! Date parsing, formatting and rounding.
//!
//! Dates are milliseconds since the epoch. Patterns use the familiar
//! `yyyy-MM-dd HH:mm:ss.SSS` letters and are translated once to chrono
//! format strings; the translation is cached per pattern.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::cache::Caches;
use crate::value::{Val, format_canonical_date, parse_canonical_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRounding {
    Ceiling,
    Floor,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

/// A time zone given as a fixed offset or an IANA name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    pub fn utc() -> Zone {
        Zone::Fixed(Utc.fix())
    }

    /// Accepts `Z`, `UTC`, `GMT`, `+hh`, `+hhmm`, `+hh:mm` (or `-`) and IANA
    /// names such as `Europe/London`.
    pub fn parse(zone: &str) -> Result<Zone, String> {
        let zone = zone.trim();
        if ["Z", "UTC", "GMT"].iter().any(|z| zone.eq_ignore_ascii_case(z)) {
            return Ok(Zone::utc());
        }

        if let Some(rest) = zone.strip_prefix('+').or_else(|| zone.strip_prefix('-')) {
            let sign = if zone.starts_with('-') { -1 } else { 1 };
            let digits: String = rest.chars().filter(|c| *c != ':').collect();
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("Invalid offset '{zone}'"));
            }
            let (hours, minutes) = match digits.len() {
                2 => (&digits[..2], "0"),
                4 => (&digits[..2], &digits[2..]),
                _ => return Err(format!("Invalid offset '{zone}'")),
            };
            let hours: i32 = hours.parse().map_err(|_| format!("Invalid offset '{zone}'"))?;
            let minutes: i32 = minutes.parse().map_err(|_| format!("Invalid offset '{zone}'"))?;
            return FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
                .map(Zone::Fixed)
                .ok_or_else(|| format!("Offset '{zone}' out of range"));
        }

        zone.parse::<Tz>()
            .map(Zone::Named)
            .map_err(|_| format!("Unknown time zone '{zone}'"))
    }

    fn localize(&self, naive: &NaiveDateTime) -> Option<i64> {
        match self {
            Zone::Fixed(offset) => offset
                .from_local_datetime(naive)
                .single()
                .map(|dt| dt.timestamp_millis()),
            Zone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.timestamp_millis()),
        }
    }
}

/// A date pattern translated to a chrono format string.
#[derive(Debug, Clone)]
pub struct DatePattern {
    source: String,
    format: String,
    has_time: bool,
    has_offset: bool,
}

impl DatePattern {
    pub fn compile(pattern: &str) -> Result<DatePattern, String> {
        if pattern.is_empty() {
            return Err("Empty date pattern".to_string());
        }

        let chars: Vec<char> = pattern.chars().collect();
        let mut format = String::new();
        let mut has_time = false;
        let mut has_offset = false;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];

            if c == '\'' {
                // Quoted literal; '' is a single quote.
                if chars.get(i + 1) == Some(&'\'') {
                    format.push('\'');
                    i += 2;
                    continue;
                }
                i += 1;
                loop {
                    match chars.get(i).copied() {
                        None => return Err(format!("Unterminated quote in pattern '{pattern}'")),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            format.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some('%') => {
                            format.push_str("%%");
                            i += 1;
                        }
                        Some(other) => {
                            format.push(other);
                            i += 1;
                        }
                    }
                }
                continue;
            }

            if !c.is_ascii_alphabetic() {
                if c == '%' {
                    format.push_str("%%");
                } else {
                    format.push(c);
                }
                i += 1;
                continue;
            }

            let mut run = 1;
            while chars.get(i + run) == Some(&c) {
                run += 1;
            }
            i += run;

            let spec = match (c, run) {
                ('y', 2) => "%y",
                ('y', _) => "%Y",
                ('M', 1) => "%-m",
                ('M', 2) => "%m",
                ('M', 3) => "%b",
                ('M', _) => "%B",
                ('d', 1) => "%-d",
                ('d', _) => "%d",
                ('E', 1..=3) => "%a",
                ('E', _) => "%A",
                ('H', 1) => "%-H",
                ('H', _) => "%H",
                ('h', 1) => "%-I",
                ('h', _) => "%I",
                ('m', _) => "%M",
                ('s', _) => "%S",
                ('S', _) => "%3f",
                ('a', _) => "%p",
                ('X' | 'x', 3) => "%:z",
                ('X' | 'x' | 'Z', _) => "%z",
                _ => return Err(format!("Unsupported pattern letter '{c}' in '{pattern}'")),
            };
            has_time |= matches!(c, 'H' | 'h' | 'm' | 's' | 'S' | 'a');
            has_offset |= matches!(c, 'X' | 'x' | 'Z');
            format.push_str(spec);
        }

        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("Invalid date pattern '{pattern}'"));
        }

        Ok(DatePattern {
            source: pattern.to_string(),
            format,
            has_time,
            has_offset,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse `text` in `zone`, unless the pattern carries its own offset.
    pub fn parse(&self, text: &str, zone: &Zone) -> Result<i64, String> {
        let fail = |e: chrono::ParseError| format!("Unable to parse '{text}' with '{}': {e}", self.source);
        if self.has_offset {
            return DateTime::parse_from_str(text, &self.format)
                .map(|dt| dt.timestamp_millis())
                .map_err(fail);
        }
        let naive = if self.has_time {
            NaiveDateTime::parse_from_str(text, &self.format).map_err(fail)?
        } else {
            let date = NaiveDate::parse_from_str(text, &self.format).map_err(fail)?;
            date.and_hms_opt(0, 0, 0)
                .ok_or_else(|| format!("Invalid date '{text}'"))?
        };
        zone.localize(&naive)
            .ok_or_else(|| format!("'{text}' does not exist in the requested time zone"))
    }

    pub fn format(&self, millis: i64, zone: &Zone) -> Result<String, String> {
        let utc = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| format!("Date {millis} out of range"))?;
        let items = StrftimeItems::new(&self.format);
        let mut out = String::new();
        let written = match zone {
            Zone::Fixed(offset) => write!(out, "{}", utc.with_timezone(offset).format_with_items(items)),
            Zone::Named(tz) => write!(out, "{}", utc.with_timezone(tz).format_with_items(items)),
        };
        written.map_err(|_| format!("Unable to format date with '{}'", self.source))?;
        Ok(out)
    }
}

fn resolve_zone(caches: &Caches, zone: Option<&Val>) -> Result<Zone, Val> {
    match zone.and_then(Val::as_string) {
        None => Ok(Zone::utc()),
        Some(z) => caches.time_zone(&z).map_err(Val::err),
    }
}

/// `parseDate(text, pattern, zone)`. Without a pattern the text must be a
/// canonical `yyyy-MM-ddTHH:mm:ss.SSSZ` date.
pub fn parse_date(caches: &Caches, args: &[Val]) -> Val {
    let Some(value) = args.first() else {
        return Val::Null;
    };
    if !value.is_value() {
        return value.clone();
    }
    if let Val::Date(_) = value {
        return value.clone();
    }
    let text = value.as_string().unwrap_or_default();

    let Some(pattern) = args.get(1).and_then(Val::as_string) else {
        return match parse_canonical_date(&text) {
            Some(ms) => Val::Date(ms),
            None => Val::err(format!("Unable to parse date '{text}'")),
        };
    };
    let pattern = match caches.date_pattern(&pattern) {
        Ok(p) => p,
        Err(e) => return Val::err(e),
    };
    let zone = match resolve_zone(caches, args.get(2)) {
        Ok(z) => z,
        Err(e) => return e,
    };
    match pattern.parse(&text, &zone) {
        Ok(ms) => Val::Date(ms),
        Err(e) => Val::err(e),
    }
}

/// `formatDate(date, pattern, zone)`. Without a pattern the canonical form
/// is produced.
pub fn format_date(caches: &Caches, args: &[Val]) -> Val {
    let Some(value) = args.first() else {
        return Val::Null;
    };
    if !value.is_value() {
        return value.clone();
    }
    let Some(millis) = value.as_long() else {
        return Val::err(format!(
            "Unable to format '{}' as a date",
            value.as_string().unwrap_or_default()
        ));
    };

    let Some(pattern) = args.get(1).and_then(Val::as_string) else {
        return match format_canonical_date(millis) {
            Some(s) => Val::String(s),
            None => Val::err(format!("Date {millis} out of range")),
        };
    };
    let pattern = match caches.date_pattern(&pattern) {
        Ok(p) => p,
        Err(e) => return Val::err(e),
    };
    let zone = match resolve_zone(caches, args.get(2)) {
        Ok(z) => z,
        Err(e) => return e,
    };
    match pattern.format(millis, &zone) {
        Ok(s) => Val::String(s),
        Err(e) => Val::err(e),
    }
}

fn month_start(year: i32, month: u32) -> Option<i64> {
    let (year, month) = if month > 12 { (year + 1, 1) } else { (year, month) };
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Start of the unit containing `millis` and start of the next one, in UTC.
fn unit_bounds(millis: i64, unit: DateUnit) -> Option<(i64, i64)> {
    let fixed = match unit {
        DateUnit::Second => Some(1_000),
        DateUnit::Minute => Some(60_000),
        DateUnit::Hour => Some(3_600_000),
        DateUnit::Day => Some(86_400_000),
        DateUnit::Month | DateUnit::Year => None,
    };
    if let Some(size) = fixed {
        let floor = millis.div_euclid(size) * size;
        return Some((floor, floor + size));
    }

    let date = DateTime::<Utc>::from_timestamp_millis(millis)?;
    match unit {
        DateUnit::Month => Some((
            month_start(date.year(), date.month())?,
            month_start(date.year(), date.month() + 1)?,
        )),
        _ => Some((month_start(date.year(), 1)?, month_start(date.year() + 1, 1)?)),
    }
}

pub fn round_date(val: &Val, rounding: DateRounding, unit: DateUnit) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    let Some(millis) = val.as_long() else {
        return Val::err(format!(
            "Unable to round '{}' as a date",
            val.as_string().unwrap_or_default()
        ));
    };
    let Some((floor, next)) = unit_bounds(millis, unit) else {
        return Val::err(format!("Date {millis} out of range"));
    };

    let rounded = match rounding {
        DateRounding::Floor => floor,
        DateRounding::Ceiling if millis == floor => floor,
        DateRounding::Ceiling => next,
        DateRounding::Round if millis - floor >= (next - floor) / 2 => next,
        DateRounding::Round => floor,
    };
    Val::Date(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_translation() {
        let p = DatePattern::compile("yyyy-MM-dd'T'HH:mm:ss.SSSXX").unwrap();
        assert_eq!(p.format, "%Y-%m-%dT%H:%M:%S.%3f%z");
        assert!(p.has_time && p.has_offset);
        assert!(DatePattern::compile("yyyy 'unterminated").is_err());
        assert!(DatePattern::compile("qqq").is_err());
    }

    #[test]
    fn test_zone_parse() {
        assert_eq!(Zone::parse("+0400"), Ok(Zone::Fixed(FixedOffset::east_opt(14_400).unwrap())));
        assert_eq!(Zone::parse("-05:30"), Ok(Zone::Fixed(FixedOffset::west_opt(19_800).unwrap())));
        assert_eq!(Zone::parse("UTC"), Ok(Zone::utc()));
        assert!(matches!(Zone::parse("Europe/London"), Ok(Zone::Named(_))));
        assert!(Zone::parse("Mars/Olympus").is_err());
    }

    #[test]
    fn test_round_month() {
        // 2014-02-22T12:12:12.888Z
        let v = Val::Date(1_393_071_132_888);
        assert_eq!(
            round_date(&v, DateRounding::Round, DateUnit::Month),
            Val::Date(parse_canonical_date("2014-03-01T00:00:00.000Z").unwrap())
        );
        assert_eq!(
            round_date(&v, DateRounding::Floor, DateUnit::Year),
            Val::Date(parse_canonical_date("2014-01-01T00:00:00.000Z").unwrap())
        );
    }
}
