//! Target identity.
//!
//! Outcome memory is keyed by the endpoint a request hits, not by the exact URL a variant
//! was sent to. Many strategies leave traces in the path (encodings, escapes, comments,
//! line breaks, traversal suffixes, random case), so the key is derived from a normalized
//! form of the URL that folds those traces away.

use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StrategyError;
use crate::request::Request;
use crate::util::UrlParts;

static COMMENT_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*|\*/").expect("static regex"));

static ESCAPES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\[uU]([0-9a-fA-F]{4})|\\[xX]([0-9a-fA-F]{2})").expect("static regex")
});

/// Decoding rounds applied to a path; nested encodings deeper than this stay visible.
const MAX_DECODE_PASSES: usize = 4;

/// Normalized `scheme://host[:port]/path` of an endpoint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetKey(String);

impl TargetKey {
    /// Derives the key of an absolute URL.
    ///
    /// Scheme and host are lower-cased and a default port is dropped. The path is taken
    /// as written, before any dot-segment resolution, and repeatedly percent-decoded,
    /// unescaped (`\uXXXX`, `\xXX`) and stripped of SQL comment markers, control characters
    /// and whitespace. Empty and `.` segments are dropped, everything from the first `..`
    /// segment on is cut off, and the result is lower-cased since several strategies
    /// randomize letter case. Query, fragment and credentials never take part in the key.
    pub fn from_url(raw: &str) -> Result<Self, StrategyError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|source| StrategyError::InvalidUrl {
            url: raw.to_owned(),
            source,
        })?;

        let mut key = format!("{}://", url.scheme());
        if let Some(host) = url.host_str() {
            key.push_str(&host.to_ascii_lowercase());
        }
        if let Some(port) = url.port() {
            key.push_str(&format!(":{port}"));
        }
        key.push_str(&normalize_path(&UrlParts::parse(raw)?.path));
        Ok(Self(key))
    }

    pub fn from_request(request: &Request) -> Result<Self, StrategyError> {
        Self::from_url(request.url())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize_path(raw: &str) -> String {
    let mut path = raw.to_owned();
    for _ in 0..MAX_DECODE_PASSES {
        let decoded = decode_once(&path);
        if decoded == path {
            break;
        }
        path = decoded;
    }

    let segments: Vec<String> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .take_while(|segment| *segment != "..")
        .map(str::to_lowercase)
        .collect();
    format!("/{}", segments.join("/"))
}

fn decode_once(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let visible = strip_invisible(&decoded);
    let uncommented = COMMENT_MARKERS.replace_all(&visible, "");
    let unescaped = unescape(&uncommented);
    strip_invisible(&COMMENT_MARKERS.replace_all(&unescaped, ""))
}

fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect()
}

fn unescape(text: &str) -> Cow<'_, str> {
    ESCAPES.replace_all(text, |caps: &Captures<'_>| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_owned(), String::from)
    })
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TargetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
