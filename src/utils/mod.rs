pub mod cookie_utils;
pub mod crypto;
pub mod logging;

/// Current time as Unix epoch seconds
#[must_use]
pub fn epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Escape a string for inclusion in an HTML body
#[must_use]
pub fn html_safe(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
