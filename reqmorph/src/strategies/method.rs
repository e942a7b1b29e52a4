//! Request-method conversion.
//!
//! Rules written for query strings do not fire when the same parameters arrive as a form
//! body, and many frameworks read both interchangeably.

use rand::RngCore;

use crate::constants::FORM_CONTENT_TYPE;
use crate::error::StrategyError;
use crate::request::{Body, Method, Request};
use crate::util::UrlParts;

/// A POST copy of a GET `request` sent to the URL without its query.
fn as_post(request: &Request, parts: &UrlParts) -> Request {
    let mut without_query = parts.clone();
    without_query.query = None;

    let mut variant = request.clone();
    variant.set_method(Method::Post);
    variant.set_url(without_query.to_string());
    variant
}

/// Moves the raw query string of a GET request into a form-encoded POST body, declared
/// with a lower-case `content-type` header.
pub fn get_to_post(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if *request.method() != Method::Get {
        return Ok(vec![]);
    }
    let parts = UrlParts::of(request)?;
    let mut variant = as_post(request, &parts);
    let headers = variant.headers_mut();
    headers.remove_ignore_case("Content-Type");
    headers.insert("content-type", FORM_CONTENT_TYPE);
    variant.set_body(Body::Text(parts.query.unwrap_or_default()));
    Ok(vec![variant])
}

/// Converts a GET request into a POST carrying every query parameter as structured form
/// data. Repeated parameters keep their first value.
pub fn method_conversion(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if *request.method() != Method::Get {
        return Ok(vec![]);
    }
    let parts = UrlParts::of(request)?;
    let mut pairs: Vec<(String, String)> = Vec::new();
    if let Some(query) = &parts.query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if !pairs.iter().any(|(seen, _)| *seen == key) {
                pairs.push((key.into_owned(), value.into_owned()));
            }
        }
    }

    let mut variant = as_post(request, &parts);
    let headers = variant.headers_mut();
    headers.remove_ignore_case("Content-Type");
    headers.insert("Content-Type", FORM_CONTENT_TYPE);
    variant.set_body(Body::Form(pairs));
    Ok(vec![variant])
}
