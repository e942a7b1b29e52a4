//! The request value passed between strategies.
//!
//! A [`Request`] is a self-contained snapshot. Strategies only ever see `&Request` and build
//! new values from it, so a later strategy in a chain can never observe state written by an
//! earlier one through a shared mapping. Headers and file parts live behind an [`Arc`] and
//! are copied on first write ([`Arc::make_mut`]), which keeps cloning a request cheap without
//! giving up value semantics.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use url::Url;

use crate::error::StrategyError;

/// The HTTP method of a request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any other token, stored upper-cased.
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Other(token) => token,
        }
    }

    /// Methods that conventionally carry a request body.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Ok(match upper.as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            _ => Method::Other(upper),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered header mapping.
///
/// Keys are stored exactly as given. Lookups are case-sensitive unless the `_ignore_case`
/// variant is used; strategies that rely on HTTP's case-insensitive field names must ask
/// for it explicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name` to `value`, replacing an existing entry with the exact same key in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|(key, _)| key == name)?;
        Some(self.0.remove(index).1)
    }

    /// Removes every entry whose key matches `name` case-insensitively.
    pub fn remove_ignore_case(&mut self, name: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        before - self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut String)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Request payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Body {
    #[default]
    Empty,
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Text(String),
    /// Structured `key=value` form data; keys may repeat.
    Form(Vec<(String, String)>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Text(text) => text.is_empty(),
            Body::Form(pairs) => pairs.is_empty(),
        }
    }

    /// The body rendered as text: forms are url-encoded, byte bodies must be UTF-8.
    ///
    /// Returns `None` for an empty body or a byte body that is not valid UTF-8.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Body::Empty => None,
            Body::Bytes(bytes) => String::from_utf8(bytes.clone()).ok(),
            Body::Text(text) => Some(text.clone()),
            Body::Form(pairs) => Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish(),
            ),
        }
    }

    /// Rebuilds a body of the same kind from rewritten text; forms become text.
    pub(crate) fn with_text_like(&self, text: String) -> Body {
        match self {
            Body::Bytes(_) => Body::Bytes(text.into_bytes()),
            _ => Body::Text(text),
        }
    }
}

/// One uploaded file of a multipart request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilePart {
    pub filename: String,
    #[serde(with = "serde_bytes")]
    pub content: Vec<u8>,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// An HTTP request snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Request {
    headers: Arc<Headers>,
    url: String,
    method: Method,
    body: Body,
    files: Arc<BTreeMap<String, FilePart>>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            headers: Arc::default(),
            url: url.into(),
            method,
            body: Body::Empty,
            files: Arc::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers_mut().insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Arc::new(headers);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_file(mut self, field: impl Into<String>, part: FilePart) -> Self {
        self.files_mut().insert(field.into(), part);
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Copy-on-write access: the header map is cloned here if any other request shares it.
    pub fn headers_mut(&mut self) -> &mut Headers {
        Arc::make_mut(&mut self.headers)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Parses the URL, failing with [`StrategyError::InvalidUrl`] for relative or broken URLs.
    pub fn parsed_url(&self) -> Result<Url, StrategyError> {
        Url::parse(&self.url).map_err(|source| StrategyError::InvalidUrl {
            url: self.url.clone(),
            source,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub fn files(&self) -> &BTreeMap<String, FilePart> {
        &self.files
    }

    /// Copy-on-write access to the file parts.
    pub fn files_mut(&mut self) -> &mut BTreeMap<String, FilePart> {
        Arc::make_mut(&mut self.files)
    }

    /// The `Content-Type` header, looked up case-insensitively.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get_ignore_case("Content-Type")
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
    }

    /// Whether `self` and `other` share the same header allocation.
    pub fn shares_headers_with(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.headers, &other.headers)
    }
}
