use actix_web::cookie::{time::OffsetDateTime, SameSite};
use std::collections::HashMap;

use crate::utils::cookie_utils::{self, CookieAttributes};

/// Default session cookie name
pub const COOKIE_NAME: &str = "appSession";

/// Browser limit for a whole `Set-Cookie` value, attributes included
pub const MAX_COOKIE_SIZE: usize = 4096;

/// Session cookie configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookieConfig {
    pub name: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub same_site: Option<SameSite>,
    pub secure: Option<bool>,
    pub http_only: bool,
    /// Browser-session cookie: no `Expires` attribute is written, the
    /// envelope expiry is still enforced on read
    pub transient: bool,
    pub max_cookie_size: usize,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            name: COOKIE_NAME.to_string(),
            domain: None,
            path: Some("/".to_string()),
            same_site: Some(SameSite::Lax),
            secure: None,
            http_only: true,
            transient: false,
            max_cookie_size: MAX_COOKIE_SIZE,
        }
    }
}

impl SessionCookieConfig {
    /// Attributes for a session cookie expiring at `exp` (Unix seconds)
    #[must_use]
    pub fn attributes(&self, exp: i64) -> CookieAttributes {
        let expires = if self.transient {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(exp).ok()
        };
        CookieAttributes {
            domain: self.domain.clone(),
            path: self.path.clone(),
            same_site: self.same_site,
            secure: self.secure,
            http_only: Some(self.http_only),
            expires,
        }
    }

    /// Number of value bytes that fit in one single-digit chunk cookie
    ///
    /// The serialized length of an empty chunk cookie, with the same name
    /// length and attributes (including `Expires` for persistent cookies),
    /// is subtracted from the size budget.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size_with_index_width(1)
    }

    /// Chunk size for splitting a value of `value_len` bytes
    ///
    /// Every chunk is sized for the widest index the split needs, so
    /// `<name>.10` and later chunks fit the budget as well as `<name>.0`.
    #[must_use]
    pub fn chunk_size_for(&self, value_len: usize) -> usize {
        let mut width = 1;
        loop {
            let size = self.chunk_size_with_index_width(width);
            if size == 0 {
                return 0;
            }
            let last_index = value_len.div_ceil(size).saturating_sub(1);
            if decimal_width(last_index) <= width {
                return size;
            }
            width += 1;
        }
    }

    fn chunk_size_with_index_width(&self, width: usize) -> usize {
        let mut attributes = self.attributes(0);
        if !self.transient {
            attributes.expires = Some(OffsetDateTime::now_utc());
        }
        let name = format!("{}.{}", self.name, "0".repeat(width));
        let empty = cookie_utils::serialized_len(&name, "", &attributes);
        self.max_cookie_size.saturating_sub(empty)
    }
}

fn decimal_width(mut n: usize) -> usize {
    let mut width = 1;
    while n >= 10 {
        n /= 10;
        width += 1;
    }
    width
}

/// Name of the `index`-th chunk cookie
#[must_use]
pub fn chunk_name(name: &str, index: usize) -> String {
    format!("{name}.{index}")
}

/// Numeric suffix of `cookie_name` if it is a chunk of session `name`
#[must_use]
pub fn chunk_index(name: &str, cookie_name: &str) -> Option<usize> {
    let suffix = cookie_name.strip_prefix(name)?.strip_prefix('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Whether `cookie_name` belongs to session `name`, in either form
#[must_use]
pub fn is_session_cookie(name: &str, cookie_name: &str) -> bool {
    cookie_name == name || chunk_index(name, cookie_name).is_some()
}

/// Split an envelope into contiguous slices of at most `chunk_size` bytes
///
/// Envelopes are base64url text, so byte slicing never splits a character.
#[must_use]
pub fn split_chunks(value: &str, chunk_size: usize) -> Vec<String> {
    if value.is_empty() || chunk_size == 0 {
        return vec![value.to_string()];
    }
    value
        .as_bytes()
        .chunks(chunk_size)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Session value from request cookies, in unchunked or chunked form
///
/// Chunks are concatenated by ascending numeric suffix, never by map
/// iteration order.
#[must_use]
pub fn reassemble(name: &str, cookies: &HashMap<String, String>) -> Option<String> {
    if let Some(value) = cookies.get(name) {
        log::debug!("reading session from {name} cookie");
        return Some(value.clone()).filter(|value| !value.is_empty());
    }

    if !cookies.contains_key(&chunk_name(name, 0)) {
        return None;
    }

    let mut chunks: Vec<(usize, &String)> = cookies
        .iter()
        .filter_map(|(cookie_name, value)| chunk_index(name, cookie_name).map(|i| (i, value)))
        .collect();
    chunks.sort_by_key(|(index, _)| *index);
    log::debug!("reading session from {} chunks of {name}", chunks.len());

    let value: String = chunks.into_iter().map(|(_, chunk)| chunk.as_str()).collect();
    Some(value).filter(|value| !value.is_empty())
}
