//! Natural-language temporal expressions.
//!
//! Recognized forms: `yesterday`, `today`, `N minutes|hours|days ago`
//! (`a`/`an` counting as 1), `last <weekday>`, `this morning` /
//! `this afternoon` / `this evening`, clock times (`3pm`, `15:30`,
//! `at 9am`), and day phrases combined with a clock (`yesterday at 3pm`).
//!
//! A parsed expression yields a target instant and a window. Matching picks
//! the seal whose timestamp is closest to the target among those inside the
//! window; the window is the documented tolerance (a calendar day for day
//! phrases, granularity-dependent for "ago" phrases, ±12 hours for clock
//! times). All arithmetic is in UTC, matching seal timestamps.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};

/// A parsed temporal expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemporalQuery {
    /// The instant the phrase points at.
    pub target: DateTime<Utc>,
    /// Earliest admissible timestamp.
    pub start: DateTime<Utc>,
    /// Latest admissible timestamp.
    pub end: DateTime<Utc>,
}

impl TemporalQuery {
    fn around(target: DateTime<Utc>, tolerance: Duration) -> Self {
        Self {
            target,
            start: target - tolerance,
            end: target + tolerance,
        }
    }

    /// Returns `true` if a timestamp (UTC nanoseconds) falls in the window.
    pub fn contains_nanos(&self, nanos: u64) -> bool {
        let start = self.start.timestamp_nanos_opt().unwrap_or(i64::MIN).max(0) as u64;
        let end = self.end.timestamp_nanos_opt().unwrap_or(i64::MAX).max(0) as u64;
        (start..=end).contains(&nanos)
    }

    /// Distance from the target, for nearest-match selection.
    pub fn distance_nanos(&self, nanos: u64) -> u64 {
        let target = self.target.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
        target.abs_diff(nanos)
    }
}

/// Parse a temporal phrase relative to `now`. Returns `None` if the input
/// is not a recognized form.
pub fn parse_temporal(input: &str, now: DateTime<Utc>) -> Option<TemporalQuery> {
    let phrase = input.trim().to_lowercase();
    let phrase = phrase.strip_prefix("at ").unwrap_or(&phrase);

    // "<day phrase> at <clock>"
    if let Some((day_part, clock_part)) = phrase.split_once(" at ") {
        let day = parse_day(day_part, now)?;
        let (hour, minute) = parse_clock(clock_part)?;
        let target = day.date_naive().and_hms_opt(hour, minute, 0)?;
        let target = Utc.from_utc_datetime(&target);
        return Some(TemporalQuery::around(target, Duration::hours(12)));
    }

    // "N <unit> ago"
    if let Some(rest) = phrase.strip_suffix(" ago") {
        let mut parts = rest.split_whitespace();
        let count_token = parts.next()?;
        let unit = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        let count: i64 = match count_token {
            "a" | "an" | "one" => 1,
            other => other.parse().ok()?,
        };
        let (delta, tolerance) = match unit {
            "minute" | "minutes" => (Duration::minutes(count), Duration::minutes(30)),
            "hour" | "hours" => (Duration::hours(count), Duration::hours(3)),
            "day" | "days" => (Duration::days(count), Duration::days(1)),
            "week" | "weeks" => (Duration::weeks(count), Duration::days(2)),
            _ => return None,
        };
        return Some(TemporalQuery::around(now - delta, tolerance));
    }

    // Day-part phrases.
    match phrase {
        "this morning" => return day_window(now, 0, 12, 9),
        "this afternoon" => return day_window(now, 12, 18, 15),
        "this evening" | "tonight" => return day_window(now, 18, 24, 20),
        _ => {}
    }

    // Whole-day phrases.
    if let Some(day) = parse_day(phrase, now) {
        let date = day.date_naive();
        let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
        let end = start + Duration::days(1);
        // Target the phrase's own instant so "yesterday" prefers the most
        // recent seal of that day relative to now's clock time.
        return Some(TemporalQuery {
            target: day,
            start,
            end,
        });
    }

    // Bare clock time means today.
    if let Some((hour, minute)) = parse_clock(phrase) {
        let target = now.date_naive().and_hms_opt(hour, minute, 0)?;
        let target = Utc.from_utc_datetime(&target);
        return Some(TemporalQuery::around(target, Duration::hours(12)));
    }

    None
}

/// Resolve a day phrase to an instant on that day.
fn parse_day(phrase: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match phrase {
        "today" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }
    if let Some(day_name) = phrase.strip_prefix("last ") {
        let wanted = parse_weekday(day_name)?;
        // Most recent occurrence strictly before today.
        let mut day = now - Duration::days(1);
        while day.weekday() != wanted {
            day -= Duration::days(1);
        }
        let noon = day.date_naive().and_hms_opt(12, 0, 0)?;
        return Some(Utc.from_utc_datetime(&noon));
    }
    None
}

fn day_window(now: DateTime<Utc>, from_hour: u32, to_hour: u32, target_hour: u32) -> Option<TemporalQuery> {
    let date = now.date_naive();
    let start = Utc.from_utc_datetime(&date.and_hms_opt(from_hour, 0, 0)?);
    let end = if to_hour == 24 {
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?) + Duration::days(1)
    } else {
        Utc.from_utc_datetime(&date.and_hms_opt(to_hour, 0, 0)?)
    };
    let target = Utc.from_utc_datetime(&date.and_hms_opt(target_hour, 0, 0)?);
    Some(TemporalQuery { target, start, end })
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse `3pm`, `3:30pm`, `9am`, `15:00`.
fn parse_clock(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    let (body, pm_offset) = if let Some(body) = s.strip_suffix("pm") {
        (body.trim(), Some(12))
    } else if let Some(body) = s.strip_suffix("am") {
        (body.trim(), Some(0))
    } else {
        (s, None)
    };

    let (hour_str, minute_str) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let mut hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;

    match pm_offset {
        Some(offset) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour = (hour % 12) + offset;
        }
        None => {
            // 24-hour form requires an explicit minute part.
            if !body.contains(':') {
                return None;
            }
        }
    }
    NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some((hour, minute))
}
