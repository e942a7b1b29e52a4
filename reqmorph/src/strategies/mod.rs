//! The built-in strategy catalogue.
//!
//! Every strategy is a plain function with the [`MutateFn`] signature; [`builtin`] wraps them
//! into named [`SharedStrategy`] values. Strategies are grouped by the part of the request
//! they rewrite.

use std::sync::Arc;

use rand::RngCore;

use crate::error::StrategyError;
use crate::request::{Body, Request};
use crate::strategy::{FnStrategy, MutateFn, SharedStrategy};
use crate::util::UrlParts;

pub mod body;
pub mod content_type;
pub mod headers;
pub mod method;
pub mod multipart;
pub mod obfuscation;
pub mod params;

/// Name and implementation of every built-in strategy, in catalogue order.
pub const BUILTIN: &[(&str, MutateFn)] = &[
    ("content_type_append", content_type::append),
    ("content_type_append_all", content_type::append_all),
    ("content_type_fake", content_type::fake),
    ("content_type_value_upper", content_type::value_upper),
    ("content_type_name_lower", content_type::name_lower),
    ("content_type_for_get", content_type::for_get),
    ("part_content_type_strip", content_type::strip_part_content_types),
    ("charset_change", content_type::charset_change),
    ("accept_charset", content_type::accept_charset),
    ("url_encoding", obfuscation::url_encoding),
    ("double_encoding", obfuscation::double_encoding),
    ("unicode_escape", obfuscation::unicode_escape),
    ("unicode_obfuscation", obfuscation::unicode_obfuscation),
    ("html_entities", obfuscation::html_entities),
    ("line_breaks", obfuscation::line_breaks),
    ("newline_obfuscation", obfuscation::newline_obfuscation),
    ("tab_obfuscation", obfuscation::tab_obfuscation),
    ("garbage_obfuscation", obfuscation::garbage_obfuscation),
    ("space_obfuscation", obfuscation::space_obfuscation),
    ("case_comment_obfuscation", obfuscation::case_comment_obfuscation),
    ("random_case", obfuscation::random_case_obfuscation),
    ("sql_comment", params::sql_comment),
    ("null_byte", params::null_byte),
    ("path_traversal", params::path_traversal),
    ("harmless_command", params::harmless_command),
    ("harmless_param", params::harmless_param),
    ("parameter_pollution_repeat", params::pollution_repeat),
    ("parameter_pollution_split", params::pollution_split),
    ("multipart_boundary", multipart::split_boundary),
    ("multipart_double_equals", multipart::double_equals),
    ("multipart_boundary_confusion", multipart::boundary_confusion),
    ("multipart_form_data", multipart::form_data),
    ("chunked_encoding", body::chunked),
    ("padding", body::padding),
    ("soap_envelope", body::soap_envelope),
    ("extension_swap", body::extension_swap),
    ("fake_ip", headers::fake_ip),
    ("user_agent", headers::user_agent),
    ("header_noise", headers::header_noise),
    ("get_to_post", method::get_to_post),
    ("method_conversion", method::method_conversion),
];

/// All built-in strategies as shareable trait objects.
pub fn builtin() -> Vec<SharedStrategy> {
    BUILTIN
        .iter()
        .map(|&(name, mutate)| Arc::new(FnStrategy::new(name, mutate)) as SharedStrategy)
        .collect()
}

/// A textual part of a request that obfuscations can rewrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Field {
    Path,
    Query,
    Body,
    Filename,
}

/// Query, text body and uploaded filenames: where attack payloads usually live.
pub(crate) const PAYLOAD_FIELDS: &[Field] = &[Field::Query, Field::Body, Field::Filename];

pub(crate) const ALL_FIELDS: &[Field] = &[Field::Path, Field::Query, Field::Body, Field::Filename];

/// Builds one variant of `request` with each selected field passed through `rewrite`.
///
/// Only text bodies are rewritten; byte and form bodies are left as they are.
pub(crate) fn rewrite_fields<F>(
    request: &Request,
    fields: &[Field],
    rng: &mut dyn RngCore,
    mut rewrite: F,
) -> Result<Request, StrategyError>
where
    F: FnMut(Field, &str, &mut dyn RngCore) -> String,
{
    let mut parts = UrlParts::of(request)?;
    if fields.contains(&Field::Path) {
        parts.path = rewrite(Field::Path, &parts.path, rng);
    }
    if fields.contains(&Field::Query) {
        if let Some(query) = parts.query.take() {
            parts.query = Some(rewrite(Field::Query, &query, rng));
        }
    }

    let mut variant = request.clone();
    variant.set_url(parts.to_string());

    if fields.contains(&Field::Body) {
        if let Body::Text(text) = request.body() {
            variant.set_body(Body::Text(rewrite(Field::Body, text, rng)));
        }
    }
    if fields.contains(&Field::Filename) && !request.files().is_empty() {
        for part in variant.files_mut().values_mut() {
            part.filename = rewrite(Field::Filename, &part.filename, rng);
        }
    }
    Ok(variant)
}

/// The body as text, failing for binary bodies a text-only strategy was asked to handle.
pub(crate) fn body_text(
    request: &Request,
    strategy: &'static str,
) -> Result<Option<String>, StrategyError> {
    match request.body() {
        Body::Empty => Ok(None),
        body => body
            .to_text()
            .map(Some)
            .ok_or(StrategyError::BinaryBody { strategy }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::request::{FilePart, Method};

    fn sample_requests() -> Vec<Request> {
        vec![
            Request::get("http://x/get?cmd=cat%20/etc/passwd"),
            Request::get("http://x/").with_header("User-Agent", "curl/8.0"),
            Request::post("http://x/post")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body(Body::Text("cmd=cat /etc/passwd".into())),
            Request::post("http://x/api")
                .with_header("Content-Type", "application/json")
                .with_body(Body::Text(r#"{"q":"' or 1=1--"}"#.into())),
            Request::new(Method::Put, "http://x/form")
                .with_body(Body::Form(vec![("id".into(), "1 union select 1".into())])),
            Request::post("http://x/upload")
                .with_header("Content-Type", "multipart/form-data; boundary=xyz")
                .with_body(Body::Text(
                    "--xyz\r\nContent-Disposition: form-data; name=\"f\"; filename=\"shell.php\"\r\nContent-Type: text/plain; \r\n\r\n<?php ?>\r\n--xyz--\r\n"
                        .into(),
                ))
                .with_file("f", FilePart::new("shell.php", "<?php ?>")),
            Request::post("http://x/bin").with_body(Body::Bytes(vec![0xff, 0x00, 0x10])),
        ]
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = BUILTIN.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), BUILTIN.len());
    }

    #[test]
    fn no_strategy_changes_its_input() {
        let mut rng = StdRng::seed_from_u64(42);
        for request in sample_requests() {
            let snapshot = request.clone();
            for strategy in builtin() {
                // Binary bodies may legitimately be rejected; the input must survive either way.
                let _ = strategy.mutate(&request, &mut rng);
                assert_eq!(request, snapshot, "{} changed its input", strategy.name());
            }
        }
    }

    #[test]
    fn variants_never_share_written_headers_with_the_input() {
        let mut rng = StdRng::seed_from_u64(3);
        for request in sample_requests() {
            for strategy in builtin() {
                let Ok(variants) = strategy.mutate(&request, &mut rng) else {
                    continue;
                };
                for variant in variants {
                    if variant.headers() != request.headers() {
                        assert!(
                            !variant.shares_headers_with(&request),
                            "{} aliased headers",
                            strategy.name()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn rewrite_fields_touches_only_selected_parts() {
        let request = Request::post("http://x/a/b?q=1")
            .with_body(Body::Text("data".into()))
            .with_file("f", FilePart::new("a.txt", "x"));
        let mut rng = StdRng::seed_from_u64(0);
        let variant = rewrite_fields(&request, PAYLOAD_FIELDS, &mut rng, |_, text, _| {
            text.to_uppercase()
        })
        .unwrap();
        assert_eq!(variant.url(), "http://x/a/b?Q=1");
        assert_eq!(variant.body(), &Body::Text("DATA".into()));
        assert_eq!(variant.files()["f"].filename, "A.TXT");
    }
}
