//! `-c` destination-override extraction.
//!
//! The flag and its argument tokens are pulled out of the command text
//! before time parsing so channel names never collide with the time
//! grammar. How many tokens the override actually consumes (one for a
//! plain name, two for forms like `-c guild general`) is decided by the
//! resolver, so both candidates are captured here.

use std::sync::LazyLock;

use regex::Regex;

static OVERRIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(-c)\s+(\S+)(?:\s+(\S+))?").expect("override pattern")
});

/// A `-c` flag found in command text, with up to two candidate argument
/// tokens and the byte span each occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOverride {
    pub tokens: Vec<String>,
    flag_span: (usize, usize),
    token_spans: Vec<(usize, usize)>,
}

/// Find the first `-c` override in `text`, if any. A trailing `-c` with
/// no argument is ignored.
pub(crate) fn find(text: &str) -> Option<ChannelOverride> {
    let caps = OVERRIDE_RE.captures(text)?;
    let flag = caps.get(1)?;
    let mut tokens = Vec::new();
    let mut token_spans = Vec::new();
    for idx in [2, 3] {
        if let Some(m) = caps.get(idx) {
            tokens.push(m.as_str().to_string());
            token_spans.push((m.start(), m.end()));
        }
    }
    Some(ChannelOverride {
        tokens,
        flag_span: (flag.start(), flag.end()),
        token_spans,
    })
}

/// Remove the flag and the first `consumed` argument tokens from `text`.
/// Tokens the resolver did not consume stay in place as message text.
pub(crate) fn strip(text: &str, ov: &ChannelOverride, consumed: usize) -> String {
    let mut spans = vec![ov.flag_span];
    spans.extend(ov.token_spans.iter().take(consumed).copied());
    spans.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_two_candidate_tokens() {
        let ov = find("-c general do it 'in 3 days' thanks").unwrap();
        assert_eq!(ov.tokens, vec!["general", "do"]);
    }

    #[test]
    fn flag_mid_text() {
        let ov = find("remind me -c ops in 5m").unwrap();
        assert_eq!(ov.tokens, vec!["ops", "in"]);
    }

    #[test]
    fn no_flag() {
        assert!(find("remind me in 5m").is_none());
        assert!(find("-cgeneral nope").is_none());
    }

    #[test]
    fn trailing_flag_without_argument() {
        assert!(find("remind me -c").is_none());
    }

    #[test]
    fn strip_consumes_only_resolved_tokens() {
        let text = "-c general do it 'in 3 days' thanks";
        let ov = find(text).unwrap();
        let rest = strip(text, &ov, 1);
        assert_eq!(rest.trim(), "do it 'in 3 days' thanks");
    }

    #[test]
    fn strip_two_token_form() {
        let text = "say hi -c myguild general tomorrow";
        let ov = find(text).unwrap();
        let rest = strip(text, &ov, 2);
        let words: Vec<&str> = rest.split_whitespace().collect();
        assert_eq!(words, ["say", "hi", "tomorrow"]);
    }
}
