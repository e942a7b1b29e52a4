//! Multipart body and boundary manipulation.
//!
//! Parsers disagree on how a `multipart/form-data` boundary is declared and matched. These
//! strategies declare boundaries that a WAF and an origin server resolve differently, or
//! re-encode an ordinary body as multipart altogether.

use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;

use crate::constants::{HEX_DIGITS, MULTIPART_CHARSETS};
use crate::error::StrategyError;
use crate::request::{Body, Request};
use crate::strategies::body_text;
use crate::util::random_token;

static BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"boundary="?([^";\s]+)"?"#).expect("static regex"));

static FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Content-Disposition: form-data;.*filename="([^"]+)""#).expect("static regex")
});

/// Halves of the RFC 2231 continuation `boundary*0`/`boundary*1`; joined they form the
/// boundary that a continuation-aware parser uses.
const SPLIT_BOUNDARY: (&str, &str) = ("----real", "Boundary");

fn declared_boundary(request: &Request) -> Option<String> {
    let content_type = request.content_type()?;
    BOUNDARY
        .captures(content_type)
        .map(|captures| captures[1].to_owned())
}

fn set_content_type(variant: &mut Request, value: String) {
    let headers = variant.headers_mut();
    headers.remove_ignore_case("Content-Type");
    headers.insert("Content-Type", value);
}

/// Declares a second boundary through RFC 2231 parameter continuations and appends a body
/// delimited by it.
///
/// A parser that ignores continuations keeps reading the original parts, one that honours
/// them reads the appended parts. Two variants are produced: one delimited by the split
/// boundary alone and one by the original boundary concatenated with it.
pub fn split_boundary(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let Some(text) = body_text(request, "multipart_boundary")? else {
        return Ok(vec![]);
    };
    if !request.is_multipart() && !text.contains("filename") {
        return Ok(vec![]);
    }
    let (Some(content_type), Some(boundary)) = (request.content_type(), declared_boundary(request))
    else {
        return Ok(vec![]);
    };

    let filenames: Vec<&str> = FILENAME
        .captures_iter(&text)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str())
        .collect();
    let (first, second) = SPLIT_BOUNDARY;
    let content_type = format!("{content_type}; boundary*0={first}; boundary*1={second}");

    let delimiters = [format!("{first}{second}"), format!("{boundary}{first}{second}")];
    Ok(delimiters
        .iter()
        .map(|delimiter| {
            let mut appended = String::new();
            for filename in &filenames {
                appended.push_str(&format!(
                    "--{delimiter}\r\nContent-Disposition: form-data; name=\"field2\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\nreal data\r\n"
                ));
            }
            appended.push_str(&format!("--{delimiter}--\r\n"));

            let mut variant = request.clone();
            set_content_type(&mut variant, content_type.clone());
            variant.set_body(request.body().with_text_like(format!("{text}{appended}")));
            variant
        })
        .collect())
}

/// Turns `filename` parameters into `filename=`, e.g. `filename=="shell.php"`.
pub fn double_equals(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let Some(text) = body_text(request, "multipart_double_equals")? else {
        return Ok(vec![]);
    };
    if !text.contains("filename") {
        return Ok(vec![]);
    }
    let mut variant = request.clone();
    variant.set_body(
        request
            .body()
            .with_text_like(text.replace("filename", "filename=")),
    );
    Ok(vec![variant])
}

/// Declares a fresh, quoted boundary and rewrites the body delimiters to its upper-cased
/// form, so that only a case-insensitive parser still finds the parts.
pub fn boundary_confusion(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if !request.is_multipart() {
        return Ok(vec![]);
    }
    let fresh = format!("AaB03x{}", random_token(HEX_DIGITS, 8, rng));

    let mut variant = request.clone();
    set_content_type(
        &mut variant,
        format!("multipart/form-data; boundary=\"{fresh}\""),
    );
    if let (Some(old), Some(text)) = (
        declared_boundary(request),
        body_text(request, "multipart_boundary_confusion")?,
    ) {
        let rewritten = text.replace(&format!("--{old}"), &format!("--{}", fresh.to_uppercase()));
        variant.set_body(request.body().with_text_like(rewritten));
    }
    Ok(vec![variant])
}

fn push_part(buf: &mut Vec<u8>, boundary: &str, disposition: &str, extra: &str, value: &[u8]) {
    buf.extend_from_slice(
        format!("--{boundary}\r\nContent-Disposition: form-data; {disposition}\r\n{extra}\r\n")
            .as_bytes(),
    );
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
}

/// Re-encodes the body (and any file parts) of a POST, PUT or PATCH request as
/// `multipart/form-data`, once per charset suffix in [`MULTIPART_CHARSETS`].
///
/// File parts are moved into the generated body, so the variants carry no separate files.
pub fn form_data(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if !request.method().carries_body() {
        return Ok(vec![]);
    }
    let boundary = format!(
        "----WebKitFormBoundary{}",
        random_token(HEX_DIGITS, 16, rng)
    );

    let mut buf = Vec::new();
    match request.body() {
        Body::Empty => {}
        Body::Form(pairs) => {
            for (name, value) in pairs {
                push_part(&mut buf, &boundary, &format!("name=\"{name}\""), "", value.as_bytes());
            }
        }
        Body::Text(text) => push_part(&mut buf, &boundary, "name=\"data\"", "", text.as_bytes()),
        Body::Bytes(bytes) => push_part(&mut buf, &boundary, "name=\"data\"", "", bytes),
    }
    for (field, part) in request.files() {
        push_part(
            &mut buf,
            &boundary,
            &format!("name=\"{field}\"; filename=\"{}\"", part.filename),
            "Content-Type: application/octet-stream\r\n",
            &part.content,
        );
    }
    buf.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let content_length = buf.len().to_string();
    let body = String::from_utf8(buf)
        .map(Body::Text)
        .unwrap_or_else(|err| Body::Bytes(err.into_bytes()));

    Ok(MULTIPART_CHARSETS
        .iter()
        .map(|charset| {
            let mut variant = request.clone();
            set_content_type(
                &mut variant,
                format!("multipart/form-data; boundary={boundary}{charset}"),
            );
            variant
                .headers_mut()
                .insert("Content-Length", content_length.clone());
            variant.set_body(body.clone());
            variant.files_mut().clear();
            variant
        })
        .collect())
}
