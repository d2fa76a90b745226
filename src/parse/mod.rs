//! Natural-language time extraction for command text.
//!
//! A command like `do it 'in 3 days' thanks` is split into the instants it
//! names and the message left over once those phrases are removed. Three
//! scanners run in order: short durations (`5m`, `4w3s`), bounded calendar
//! dates (`22nd December 4pm`), and clock times. A single-quoted fragment,
//! when present, scopes the whole search to that fragment.

mod channel;
mod date;
mod duration;

pub use channel::ChannelOverride;

use chrono::{DateTime, Utc};

/// Knobs for the time scanners.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum characters between two short-duration tokens that still
    /// count as one phrase.
    pub adjacency_gap: usize,
    /// Message used when nothing but time phrases was supplied.
    pub default_message: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            adjacency_gap: 3,
            default_message: "...".to_string(),
        }
    }
}

/// The outcome of scanning command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    /// Every instant the text named, ascending. Empty when no time phrase
    /// was recognized.
    pub times: Vec<DateTime<Utc>>,
    /// The text with all recognized time phrases removed and tidied.
    pub message: String,
    /// Span of the primary duration run in the scanned text (the quoted
    /// fragment when one was present, otherwise the whole input).
    pub span: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct TimeParser {
    config: ParserConfig,
}

impl TimeParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Extract the first `-c` destination override, if any. Stripping is a
    /// separate step because the resolver decides how many argument tokens
    /// the override consumed.
    pub fn channel_override(&self, text: &str) -> Option<ChannelOverride> {
        channel::find(text)
    }

    /// See [`ChannelOverride`]: removes the flag and the `consumed` argument
    /// tokens, leaving the rest for time parsing.
    pub fn strip_override(&self, text: &str, ov: &ChannelOverride, consumed: usize) -> String {
        channel::strip(text, ov, consumed)
    }

    /// Scan `text` against the current wall clock.
    pub fn parse(&self, text: &str) -> Parsed {
        self.parse_at(text, Utc::now())
    }

    /// Scan `text` with an explicit reference instant.
    pub fn parse_at(&self, text: &str, now: DateTime<Utc>) -> Parsed {
        let (scope, outer) = match find_quoted(text) {
            Some((fragment, stripped)) => (fragment, Some(stripped)),
            None => (text.to_string(), None),
        };

        let scan = duration::scan(&scope, now, self.config.adjacency_gap);
        let (date_times, residual) = date::scan(&scan.residual, now);

        let mut times = scan.times;
        times.extend(date_times);
        times.sort_unstable();

        // Inside a quoted fragment, leftover words were part of the time
        // phrase the author marked off and do not belong in the message.
        let message = match outer {
            Some(stripped) => self.tidy(&stripped),
            None => self.tidy(&residual),
        };

        Parsed {
            times,
            message,
            span: scan.primary_span,
        }
    }

    fn tidy(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || ".,!?;:".contains(c));
        if trimmed.is_empty() {
            self.config.default_message.clone()
        } else {
            trimmed.to_string()
        }
    }
}

/// Find a fragment enclosed in single quotes. Both quotes are required; a
/// lone quote is ordinary text. Returns the fragment and the text with the
/// whole quoted span removed.
fn find_quoted(text: &str) -> Option<(String, String)> {
    let open = text.find('\'')?;
    let close_rel = text[open + 1..].find('\'')?;
    let close = open + 1 + close_rel;
    let fragment = text[open + 1..close].to_string();
    if fragment.trim().is_empty() {
        return None;
    }
    let mut stripped = String::with_capacity(text.len());
    stripped.push_str(&text[..open]);
    stripped.push_str(&text[close + 1..]);
    Some((fragment, stripped))
}
