use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::{Rng, RngCore};

use crate::error::StrategyError;
use crate::request::Request;

/// Characters that are never escaped: ASCII alphanumerics and `_.-~`.
const ALWAYS_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// Escapes everything but path separators.
pub(crate) const PATH_SAFE: &AsciiSet = &ALWAYS_SAFE.remove(b'/');

/// Escapes everything but the query structure (`=` and `&`).
pub(crate) const QUERY_SAFE: &AsciiSet = &ALWAYS_SAFE.remove(b'=').remove(b'&');

/// Escapes payload text while keeping URL-ish punctuation readable.
pub(crate) const PAYLOAD_SAFE: &AsciiSet = &ALWAYS_SAFE
    .remove(b'/')
    .remove(b':')
    .remove(b'&')
    .remove(b'?')
    .remove(b'=');

pub(crate) fn quote(text: &str, safe: &'static AsciiSet) -> String {
    utf8_percent_encode(text, safe).to_string()
}

/// A URL split into raw textual parts.
///
/// Unlike [`url::Url`], rebuilding from `UrlParts` keeps whatever bytes a strategy wrote
/// into the path or query (raw spaces, comments, escapes). Only the initial string is
/// validated as an absolute URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UrlParts {
    /// `scheme://authority`
    pub prefix: String,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl UrlParts {
    pub fn parse(raw: &str) -> Result<Self, StrategyError> {
        url::Url::parse(raw).map_err(|source| StrategyError::InvalidUrl {
            url: raw.to_owned(),
            source,
        })?;

        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_owned())),
            None => (raw, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_owned())),
            None => (rest, None),
        };
        let authority_start = rest.find("://").map_or(0, |i| i + 3);
        let path_start = rest[authority_start..]
            .find('/')
            .map_or(rest.len(), |i| i + authority_start);

        Ok(Self {
            prefix: rest[..path_start].to_owned(),
            path: rest[path_start..].to_owned(),
            query,
            fragment,
        })
    }

    pub fn of(request: &Request) -> Result<Self, StrategyError> {
        Self::parse(request.url())
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query.as_deref().map(split_pairs).unwrap_or_default()
    }
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// Splits `a=1&b=2` into raw pairs. Values keep their encoding; blank values are kept.
pub(crate) fn split_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (part.to_owned(), String::new()),
        })
        .collect()
}

pub(crate) fn join_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Picks one element uniformly. `items` must not be empty.
pub(crate) fn pick<'a, T: ?Sized>(items: &[&'a T], rng: &mut dyn RngCore) -> &'a T {
    items[rng.random_range(0..items.len())]
}

pub(crate) fn random_token(alphabet: &[u8], len: usize, rng: &mut dyn RngCore) -> String {
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_rebuilds_raw_urls() {
        let parts = UrlParts::parse("http://x:8080/get/a?cmd=cat%20/etc/passwd#top").unwrap();
        assert_eq!(parts.prefix, "http://x:8080");
        assert_eq!(parts.path, "/get/a");
        assert_eq!(parts.query.as_deref(), Some("cmd=cat%20/etc/passwd"));
        assert_eq!(parts.fragment.as_deref(), Some("top"));
        assert_eq!(parts.to_string(), "http://x:8080/get/a?cmd=cat%20/etc/passwd#top");
    }

    #[test]
    fn raw_mutations_survive_a_round_trip() {
        let mut parts = UrlParts::parse("http://x/get?a=1").unwrap();
        parts.query = Some("a=/**/1 2".into());
        let rebuilt = parts.to_string();
        assert_eq!(UrlParts::parse(&rebuilt).unwrap().query.as_deref(), Some("a=/**/1 2"));
    }

    #[test]
    fn relative_urls_are_rejected() {
        assert!(UrlParts::parse("/get?a=1").is_err());
    }

    #[test]
    fn quoting_follows_the_safe_set() {
        assert_eq!(quote("cmd=cat /etc", QUERY_SAFE), "cmd=cat%20%2Fetc");
        assert_eq!(quote("/a b/", PATH_SAFE), "/a%20b/");
    }

    #[test]
    fn query_pairs_keep_blank_values() {
        assert_eq!(
            split_pairs("a=1&flag&b="),
            vec![
                ("a".to_owned(), "1".to_owned()),
                ("flag".to_owned(), String::new()),
                ("b".to_owned(), String::new()),
            ]
        );
    }
}
