//! `Content-Type` and charset manipulation.
//!
//! A WAF picks its body parser from the declared media type. Declaring an unexpected,
//! duplicated or oddly-cased type can make it skip body inspection while the origin still
//! parses the payload.

use once_cell::sync::Lazy;
use rand::{Rng, RngCore};
use regex::Regex;

use crate::constants::{
    ACCEPT_CHARSETS, CONTENT_TYPES, EBCDIC_FORM_CONTENT_TYPE, FORM_CONTENT_TYPE,
    PRIMARY_ACCEPT_CHARSET, PRIMARY_ACCEPT_CHARSET_PROBABILITY,
};
use crate::error::StrategyError;
use crate::request::{Method, Request};
use crate::strategies::body_text;
use crate::util::pick;

const CONTENT_TYPE: &str = "Content-Type";

static PART_CONTENT_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Content-Type:[^;]+;\s*").expect("static regex"));

/// A copy of `request` whose only `Content-Type` header (in any case) is `value`.
fn with_content_type(request: &Request, value: String) -> Request {
    let mut variant = request.clone();
    let headers = variant.headers_mut();
    headers.remove_ignore_case(CONTENT_TYPE);
    headers.insert(CONTENT_TYPE, value);
    variant
}

/// Appends each known media type to the declared one, one variant per type.
/// Without a declared type, each variant declares `;type;`.
pub fn append(request: &Request, _rng: &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> {
    let declared = request.content_type();
    Ok(CONTENT_TYPES
        .iter()
        .map(|ct| match declared {
            Some(current) => with_content_type(request, format!("{current};{ct}")),
            None => with_content_type(request, format!(";{ct};")),
        })
        .collect())
}

/// Appends every known media type at once, for callers that want a small action space.
pub fn append_all(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let joined = CONTENT_TYPES.join(";");
    let value = match request.content_type() {
        Some(current) => format!("{current};{joined}"),
        None => format!(";{joined};"),
    };
    Ok(vec![with_content_type(request, value)])
}

/// Replaces the declared media type with each known one.
pub fn fake(request: &Request, _rng: &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> {
    if request.content_type().is_none() {
        return Ok(vec![]);
    }
    Ok(CONTENT_TYPES
        .iter()
        .map(|ct| with_content_type(request, format!("{ct};")))
        .collect())
}

pub fn value_upper(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    Ok(request
        .content_type()
        .map(|current| with_content_type(request, current.to_uppercase()))
        .into_iter()
        .collect())
}

/// Renames the `Content-Type` header itself to `content-type`.
pub fn name_lower(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let Some(current) = request.content_type().map(str::to_owned) else {
        return Ok(vec![]);
    };
    let mut variant = request.clone();
    let headers = variant.headers_mut();
    headers.remove_ignore_case(CONTENT_TYPE);
    headers.insert("content-type", current);
    Ok(vec![variant])
}

/// Declares a form body on a GET request.
pub fn for_get(request: &Request, _rng: &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> {
    if *request.method() != Method::Get {
        return Ok(vec![]);
    }
    Ok(vec![with_content_type(request, FORM_CONTENT_TYPE.to_owned())])
}

/// Drops the per-part `Content-Type: x;` declarations inside a multipart body.
pub fn strip_part_content_types(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if !request.is_multipart() {
        return Ok(vec![]);
    }
    let Some(text) = body_text(request, "part_content_type_strip")? else {
        return Ok(vec![]);
    };
    let stripped = PART_CONTENT_TYPE.replace_all(&text, "").into_owned();
    let mut variant = request.clone();
    variant.set_body(request.body().with_text_like(stripped));
    Ok(vec![variant])
}

/// Declares an EBCDIC charset for the form body.
pub fn charset_change(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    Ok(vec![with_content_type(
        request,
        EBCDIC_FORM_CONTENT_TYPE.to_owned(),
    )])
}

pub fn accept_charset(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let value = if rng.random_bool(PRIMARY_ACCEPT_CHARSET_PROBABILITY) {
        PRIMARY_ACCEPT_CHARSET
    } else {
        pick(ACCEPT_CHARSETS, rng)
    };
    let mut variant = request.clone();
    variant.headers_mut().insert("Accept-Charset", value);
    Ok(vec![variant])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::request::Body;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn append_yields_one_variant_per_media_type() {
        let request = Request::post("http://x/post").with_header("Content-Type", "text/plain");
        let variants = append(&request, &mut rng()).unwrap();
        assert_eq!(variants.len(), CONTENT_TYPES.len());
        assert_eq!(
            variants[3].headers().get("Content-Type"),
            Some("text/plain;application/json")
        );
        // Each variant is built from the input, not from the previous variant.
        assert!(
            variants
                .iter()
                .all(|v| v.headers().get("Content-Type").unwrap().matches(';').count() == 1)
        );
    }

    #[test]
    fn append_without_declared_type_wraps_in_semicolons() {
        let request = Request::get("http://x/get");
        let variants = append(&request, &mut rng()).unwrap();
        assert_eq!(
            variants[0].headers().get("Content-Type"),
            Some(";application/x-www-form-urlencoded;")
        );
    }

    #[test]
    fn lower_case_header_is_replaced_not_duplicated() {
        let request = Request::post("http://x/").with_header("content-type", "text/plain");
        let variant = &value_upper(&request, &mut rng()).unwrap()[0];
        assert_eq!(variant.headers().len(), 1);
        assert_eq!(variant.headers().get("Content-Type"), Some("TEXT/PLAIN"));
    }

    #[test]
    fn fake_needs_a_declared_type() {
        assert!(fake(&Request::get("http://x/"), &mut rng()).unwrap().is_empty());
    }

    #[test]
    fn name_lower_renames_the_header() {
        let request = Request::post("http://x/").with_header("Content-Type", "text/plain");
        let variant = &name_lower(&request, &mut rng()).unwrap()[0];
        assert_eq!(variant.headers().get("Content-Type"), None);
        assert_eq!(variant.headers().get("content-type"), Some("text/plain"));
        assert_eq!(request.headers().get("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn for_get_only_applies_to_get() {
        assert_eq!(for_get(&Request::get("http://x/"), &mut rng()).unwrap().len(), 1);
        assert!(for_get(&Request::post("http://x/"), &mut rng()).unwrap().is_empty());
    }

    #[test]
    fn strips_part_content_types() {
        let request = Request::post("http://x/upload")
            .with_header("Content-Type", "multipart/form-data; boundary=b")
            .with_body(Body::Text("--b\r\nContent-Type: text/plain; x\r\n--b--".into()));
        let variant = &strip_part_content_types(&request, &mut rng()).unwrap()[0];
        assert_eq!(variant.body(), &Body::Text("--b\r\nx\r\n--b--".into()));
    }

    #[test]
    fn strip_rejects_binary_multipart_bodies() {
        let request = Request::post("http://x/upload")
            .with_header("Content-Type", "multipart/form-data; boundary=b")
            .with_body(Body::Bytes(vec![0xff, 0xfe]));
        assert!(strip_part_content_types(&request, &mut rng()).is_err());
    }

    #[test]
    fn accept_charset_is_seeded() {
        let request = Request::get("http://x/");
        let a = accept_charset(&request, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = accept_charset(&request, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
        assert!(a[0].headers().contains("Accept-Charset"));
    }
}
