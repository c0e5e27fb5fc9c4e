//! Fenced code block recognition.
//!
//! Code fences can use backticks or tildes (three or more). The closing fence
//! must use the same character, be at least as long as the opening fence, and
//! be followed only by whitespace.

/// An opening fence line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Fence<'a> {
    /// Fence character.
    pub(crate) ch: u8,
    /// Number of fence characters.
    pub(crate) len: usize,
    /// Info string after the fence, trimmed.
    pub(crate) info: &'a str,
}

impl<'a> Fence<'a> {
    /// Parse an opening fence at the start of `line` (indentation already removed).
    pub(crate) fn open(line: &'a str) -> Option<Self> {
        let ch = *line.as_bytes().first()?;
        if ch != b'`' && ch != b'~' {
            return None;
        }
        let len = line.bytes().take_while(|&b| b == ch).count();
        if len < 3 {
            return None;
        }
        let info = line[len..].trim();
        // A backtick in a backtick fence's info string makes it an inline span.
        if ch == b'`' && info.contains('`') {
            return None;
        }
        Some(Self { ch, len, info })
    }

    /// Whether `line` closes this fence.
    pub(crate) fn is_closed_by(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let count = trimmed.bytes().take_while(|&b| b == self.ch).count();
        count >= self.len && trimmed[count..].chars().all(char::is_whitespace)
    }

    /// Language and remaining info string.
    pub(crate) fn language_and_info(&self) -> (Option<String>, Option<String>) {
        let mut parts = self.info.splitn(2, char::is_whitespace);
        let language = parts.next().filter(|s| !s.is_empty()).map(str::to_owned);
        let info = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        (language, info)
    }
}

/// Block quote and list markers in front of a fence on its line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ContainerPrefix {
    /// Number of `>` markers.
    pub(crate) quotes: usize,
    /// Bytes up to and including the last `>` marker and its optional space.
    pub(crate) quote_width: usize,
}

/// Parse the text before a fence on its line.
///
/// Only whitespace, `>` markers and list markers may precede a fence.
pub(crate) fn container_prefix(prefix: &str) -> Option<ContainerPrefix> {
    let bytes = prefix.as_bytes();
    let mut container = ContainerPrefix {
        quotes: 0,
        quote_width: 0,
    };
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' => i += 1,
            b'>' => {
                i += 1;
                if matches!(bytes.get(i), Some(b' ' | b'\t')) {
                    i += 1;
                }
                container.quotes += 1;
                container.quote_width = i;
            }
            b'-' | b'*' | b'+' => {
                if !matches!(bytes.get(i + 1), Some(b' ' | b'\t')) {
                    return None;
                }
                i += 2;
            }
            b'0'..=b'9' => {
                let digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
                let delimiter = bytes.get(i + digits);
                let spaced = matches!(bytes.get(i + digits + 1), Some(b' ' | b'\t'));
                if digits > 9 || !matches!(delimiter, Some(b'.' | b')')) || !spaced {
                    return None;
                }
                i += digits + 2;
            }
            _ => return None,
        }
    }
    Some(container)
}

/// Remove `quotes` levels of `>` markers from `line`.
///
/// Returns `None` when a marker is missing, which ends the block quote.
pub(crate) fn strip_quotes(line: &str, quotes: usize) -> Option<&str> {
    let mut rest = line;
    for _ in 0..quotes {
        rest = rest.trim_start_matches([' ', '\t']).strip_prefix('>')?;
        rest = rest
            .strip_prefix(' ')
            .or_else(|| rest.strip_prefix('\t'))
            .unwrap_or(rest);
    }
    Some(rest)
}

/// Remove up to `indent` leading spaces from `line`.
pub(crate) fn strip_indent(line: &str, indent: usize) -> &str {
    let spaces = line.bytes().take(indent).take_while(|&b| b == b' ').count();
    &line[spaces..]
}
