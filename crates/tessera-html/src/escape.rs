//! HTML escaping.
//!
//! Snippet output is spliced into a template, so escaping covers braces as well
//! as the usual markup characters: a literal `{` in code would otherwise start an
//! expression.

/// Escape `<`, `>`, `&` and `"`.
#[must_use]
pub fn escape_html(s: &str) -> String {
    escape_with(s, false)
}

/// Escape like [`escape_html`] and additionally turn braces into `&lbrace;` / `&rbrace;`.
#[must_use]
pub fn escape_html_and_braces(s: &str) -> String {
    escape_with(s, true)
}

/// Turn braces into `&lbrace;` / `&rbrace;`, leaving everything else alone.
#[must_use]
pub fn escape_braces(s: &str) -> String {
    if !s.contains(['{', '}']) {
        return s.to_owned();
    }
    s.replace('{', "&lbrace;").replace('}', "&rbrace;")
}

fn escape_with(s: &str, braces: bool) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '{' if braces => out.push_str("&lbrace;"),
            '}' if braces => out.push_str("&rbrace;"),
            _ => out.push(c),
        }
    }
    out
}
