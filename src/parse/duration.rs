//! Short relative-duration scanning.
//!
//! Recognizes tokens like `5s`, `3 mins`, `2h`, `1mo`, composable as
//! adjacent tokens (`4w3s`, `4w 3d`). Adjacency is an explicit interval
//! merge: match spans separated by at most the configured gap fuse into a
//! run, and a run compounds into one duration expression while unit order
//! strictly descends (years > months > ... > seconds).

use std::cmp::Reverse;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;

/// Duration units, largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl Unit {
    /// Rank increases as the unit shrinks; a compound expression is a
    /// strictly increasing rank sequence.
    fn rank(self) -> u8 {
        match self {
            Unit::Years => 0,
            Unit::Months => 1,
            Unit::Weeks => 2,
            Unit::Days => 3,
            Unit::Hours => 4,
            Unit::Minutes => 5,
            Unit::Seconds => 6,
        }
    }
}

static SHORTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (?: \b(?:in|on|at)\s+ )?
        (?:
            (?P<years>\d{1,4})\s*(?:years?|y)
          | (?P<months>\d{1,4})\s*(?:months?|mo)
          | (?P<weeks>\d{1,4})\s*(?:weeks?|w)
          | (?P<days>\d{1,4})\s*(?:days?|d)
          | (?P<hours>\d{1,4})\s*(?:hours?|hrs?|h)
          | (?P<minutes>\d{1,4})\s*(?:minutes?|mins?|m)
          | (?P<seconds>\d{1,5})\s*(?:seconds?|secs?|s)
        )",
    )
    .expect("short duration pattern")
});

const GROUPS: [(&str, Unit); 7] = [
    ("years", Unit::Years),
    ("months", Unit::Months),
    ("weeks", Unit::Weeks),
    ("days", Unit::Days),
    ("hours", Unit::Hours),
    ("minutes", Unit::Minutes),
    ("seconds", Unit::Seconds),
];

/// One recognized duration token with its span in the source text.
#[derive(Debug, Clone)]
struct Token {
    start: usize,
    end: usize,
    unit: Unit,
    value: u32,
}

/// A merged run of adjacent tokens.
#[derive(Debug, Clone)]
struct Run {
    start: usize,
    end: usize,
    tokens: Vec<(Unit, u32)>,
}

/// Result of scanning a text for short durations.
#[derive(Debug)]
pub(crate) struct ShortScan {
    /// Absolute instants, one per compound expression, unsorted.
    pub times: Vec<DateTime<Utc>>,
    /// Span of the primary compound group in the input, if any.
    pub primary_span: Option<(usize, usize)>,
    /// Input with all recognized runs removed.
    pub residual: String,
}

/// Scan `text` for short durations relative to `now`.
pub(crate) fn scan(text: &str, now: DateTime<Utc>, adjacency_gap: usize) -> ShortScan {
    let tokens = collect_tokens(text);
    if tokens.is_empty() {
        return ShortScan {
            times: Vec::new(),
            primary_span: None,
            residual: text.to_string(),
        };
    }

    let runs = merge_runs(tokens, adjacency_gap);
    let primary = primary_index(&runs);

    let mut times = Vec::new();
    for run in &runs {
        for group in compound_groups(&run.tokens) {
            times.push(apply_group(&group, now));
        }
    }

    let residual = remove_spans(text, runs.iter().map(|r| (r.start, r.end)));

    ShortScan {
        times,
        primary_span: primary.map(|i| (runs[i].start, runs[i].end)),
        residual,
    }
}

fn collect_tokens(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    SHORTS_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            // A unit glued to a following letter is not a duration token;
            // this keeps ordinals like "21st" out of the seconds group.
            if bytes
                .get(whole.end())
                .is_some_and(|b| b.is_ascii_alphabetic())
            {
                return None;
            }
            for (name, unit) in GROUPS {
                if let Some(group) = caps.name(name) {
                    let value: u32 = group.as_str().parse().ok()?;
                    return Some(Token {
                        start: whole.start(),
                        end: whole.end(),
                        unit,
                        value,
                    });
                }
            }
            None
        })
        .collect()
}

fn merge_runs(tokens: Vec<Token>, gap: usize) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for token in tokens {
        match runs.last_mut() {
            Some(run) if token.start.saturating_sub(run.end) <= gap => {
                run.end = token.end;
                run.tokens.push((token.unit, token.value));
            }
            _ => runs.push(Run {
                start: token.start,
                end: token.end,
                tokens: vec![(token.unit, token.value)],
            }),
        }
    }
    runs
}

/// The primary compound group: largest element count, earliest on ties.
fn primary_index(runs: &[Run]) -> Option<usize> {
    runs.iter()
        .enumerate()
        .min_by_key(|(_, r)| (Reverse(r.tokens.len()), r.start))
        .map(|(i, _)| i)
}

/// Split a run into compound expressions: a new expression starts
/// whenever unit order stops strictly descending.
fn compound_groups(tokens: &[(Unit, u32)]) -> Vec<Vec<(Unit, u32)>> {
    let mut groups: Vec<Vec<(Unit, u32)>> = Vec::new();
    for &(unit, value) in tokens {
        match groups.last_mut() {
            Some(group)
                if group
                    .last()
                    .is_some_and(|&(prev, _)| prev.rank() < unit.rank()) =>
            {
                group.push((unit, value));
            }
            _ => groups.push(vec![(unit, value)]),
        }
    }
    groups
}

/// Apply a compound expression to `now`. Months and years use
/// calendar-aware arithmetic; the rest are fixed-length.
fn apply_group(group: &[(Unit, u32)], now: DateTime<Utc>) -> DateTime<Utc> {
    let mut months: u32 = 0;
    let mut delta = Duration::zero();
    for &(unit, value) in group {
        let v = i64::from(value);
        match unit {
            Unit::Years => months += 12 * value,
            Unit::Months => months += value,
            Unit::Weeks => delta += Duration::weeks(v),
            Unit::Days => delta += Duration::days(v),
            Unit::Hours => delta += Duration::hours(v),
            Unit::Minutes => delta += Duration::minutes(v),
            Unit::Seconds => delta += Duration::seconds(v),
        }
    }
    let base = if months > 0 {
        now.checked_add_months(Months::new(months)).unwrap_or(now)
    } else {
        now
    };
    base + delta
}

fn remove_spans(text: &str, spans: impl Iterator<Item = (usize, usize)>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}
