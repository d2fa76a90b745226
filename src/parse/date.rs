//! Bounded natural-language date search.
//!
//! English month names only, with a "prefer future" policy: a date with no
//! year resolves to its nearest future occurrence, a bare clock time to the
//! next one. This is deliberately a fixed, small grammar, not a general date
//! parser: day + month name (either order) with optional year and clock
//! time, or a standalone clock time.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use regex::Regex;

const MONTH_NAMES: &str = "january|february|march|april|may|june|july|august|september|october|\
                           november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ix)
        \b(?:on\s+)?
        (?:
            (?P<day1>\d{{1,2}})(?:st|nd|rd|th)?\s+(?P<mon1>{MONTH_NAMES})\b
          | (?P<mon2>{MONTH_NAMES})\s+(?P<day2>\d{{1,2}})(?:st|nd|rd|th)?\b
        )
        (?:,?\s+(?P<year>\d{{4}}))?
        (?:\s+(?:at\s+)?(?P<clock>\d{{1,2}}:\d{{2}}(?:\s*(?:am|pm))?|\d{{1,2}}\s*(?:am|pm)))?
        ",
    ))
    .expect("date pattern")
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ix)\b(?:at\s+)?(?P<clock>\d{1,2}:\d{2}(?:\s*(?:am|pm))?|\d{1,2}\s*(?:am|pm))\b")
        .expect("clock pattern")
});

/// Scan `text` for absolute dates and clock times. Returns the resolved
/// instants and the text with every resolved match removed.
pub(crate) fn scan(text: &str, now: DateTime<Utc>) -> (Vec<DateTime<Utc>>, String) {
    let mut times = Vec::new();
    let mut consumed: Vec<(usize, usize)> = Vec::new();

    for caps in DATE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let day = caps
            .name("day1")
            .or_else(|| caps.name("day2"))
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let month = caps
            .name("mon1")
            .or_else(|| caps.name("mon2"))
            .and_then(|m| month_number(m.as_str()));
        let year = caps.name("year").and_then(|m| m.as_str().parse::<i32>().ok());
        let clock = caps.name("clock").and_then(|m| parse_clock(m.as_str()));

        let (Some(day), Some(month)) = (day, month) else {
            continue;
        };
        if let Some(instant) = resolve_date(day, month, year, clock, now) {
            times.push(instant);
            consumed.push((whole.start(), whole.end()));
        }
    }

    let residual = remove_spans(text, &consumed);

    let mut consumed_times: Vec<(usize, usize)> = Vec::new();
    for caps in TIME_RE.captures_iter(&residual) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(clock) = caps.name("clock").and_then(|m| parse_clock(m.as_str())) else {
            continue;
        };
        if let Some(instant) = resolve_time(clock, now) {
            times.push(instant);
            consumed_times.push((whole.start(), whole.end()));
        }
    }

    let residual = remove_spans(&residual, &consumed_times);
    (times, residual)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse `4pm`, `16:30`, `4:30 pm` into (hour, minute).
fn parse_clock(text: &str) -> Option<(u32, u32)> {
    let text = text.trim().to_ascii_lowercase();
    let (body, meridiem) = if let Some(stripped) = text.strip_suffix("pm") {
        (stripped.trim(), Some(12))
    } else if let Some(stripped) = text.strip_suffix("am") {
        (stripped.trim(), Some(0))
    } else {
        (text.as_str(), None)
    };

    let (hour, minute) = match body.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (body.parse::<u32>().ok()?, 0),
    };

    let hour = match meridiem {
        // 12am is midnight, 12pm is noon
        Some(offset) => (hour % 12) + offset,
        None => hour,
    };

    if hour < 24 && minute < 60 {
        Some((hour, minute))
    } else {
        None
    }
}

fn resolve_date(
    day: u32,
    month: u32,
    year: Option<i32>,
    clock: Option<(u32, u32)>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let (hour, minute) = clock.unwrap_or((0, 0));
    match year {
        // An explicit year is taken literally, past or not.
        Some(y) => Utc.with_ymd_and_hms(y, month, day, hour, minute, 0).single(),
        None => {
            let this_year = Utc
                .with_ymd_and_hms(now.year(), month, day, hour, minute, 0)
                .single();
            match this_year {
                Some(instant) if instant > now => Some(instant),
                _ => Utc
                    .with_ymd_and_hms(now.year() + 1, month, day, hour, minute, 0)
                    .single(),
            }
        }
    }
}

fn resolve_time(clock: (u32, u32), now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let candidate = now
        .date_naive()
        .and_hms_opt(clock.0, clock.1, 0)?
        .and_utc();
    if candidate > now {
        Some(candidate)
    } else {
        Some(candidate + Duration::days(1))
    }
}

fn remove_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in spans {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        // A Tuesday in mid-2026
        Utc.with_ymd_and_hms(2026, 6, 16, 12, 0, 0).unwrap()
    }

    #[test]
    fn ordinal_day_month_with_time() {
        let (times, residual) = scan("22nd December 4pm print me", fixed_now());
        assert_eq!(
            times,
            vec![Utc.with_ymd_and_hms(2026, 12, 22, 16, 0, 0).unwrap()]
        );
        assert_eq!(residual.trim(), "print me");
    }

    #[test]
    fn month_first_form() {
        let (times, _) = scan("december 22 16:30", fixed_now());
        assert_eq!(
            times,
            vec![Utc.with_ymd_and_hms(2026, 12, 22, 16, 30, 0).unwrap()]
        );
    }

    #[test]
    fn past_date_without_year_prefers_future() {
        // January already passed relative to June 2026
        let (times, _) = scan("3rd January", fixed_now());
        assert_eq!(
            times,
            vec![Utc.with_ymd_and_hms(2027, 1, 3, 0, 0, 0).unwrap()]
        );
    }

    #[test]
    fn explicit_year_is_literal() {
        let (times, _) = scan("1st January 2020", fixed_now());
        assert_eq!(
            times,
            vec![Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()]
        );
    }

    #[test]
    fn bare_time_resolves_to_next_occurrence() {
        // 4pm is later today; 9am already passed, so it lands tomorrow
        let (times, residual) = scan("brief at 4pm then at 9am", fixed_now());
        assert_eq!(
            times,
            vec![
                Utc.with_ymd_and_hms(2026, 6, 16, 16, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 6, 17, 9, 0, 0).unwrap(),
            ]
        );
        let words: Vec<&str> = residual.split_whitespace().collect();
        assert_eq!(words, ["brief", "then"]);
    }

    #[test]
    fn invalid_calendar_date_is_left_alone() {
        let (times, residual) = scan("31st February party", fixed_now());
        assert!(times.is_empty());
        assert_eq!(residual, "31st February party");
    }

    #[test]
    fn month_word_without_day_is_not_a_date() {
        let (times, residual) = scan("it may rain", fixed_now());
        assert!(times.is_empty());
        assert_eq!(residual, "it may rain");
    }

    #[test]
    fn twelve_hour_edges() {
        assert_eq!(parse_clock("12am"), Some((0, 0)));
        assert_eq!(parse_clock("12pm"), Some((12, 0)));
        assert_eq!(parse_clock("4:30 pm"), Some((16, 30)));
        assert_eq!(parse_clock("25:00"), None);
    }
}
