//! Parameter-level payload tricks: comments, null bytes, decoy parameters and HTTP
//! parameter pollution.

use rand::{Rng, RngCore};

use crate::constants::{DECOY_VALUES, HARMLESS_COMMAND, LOWER_ALPHA, TRAVERSAL_PAYLOADS};
use crate::error::StrategyError;
use crate::request::{Body, Method, Request};
use crate::strategies::body_text;
use crate::util::{UrlParts, join_pairs, pick, random_token};

/// How many decoy copies precede the real parameter.
const DECOY_REPEATS: usize = 3;

/// Replaces spaces (raw or `%20`) in a GET URL with SQL block comments.
pub fn sql_comment(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if *request.method() != Method::Get {
        return Ok(vec![]);
    }
    let mut variant = request.clone();
    variant.set_url(request.url().replace(' ', "/**/").replace("%20", "/**/"));
    Ok(vec![variant])
}

/// Inserts `%00` in front of every `=` of the query and text body.
pub fn null_byte(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let mut parts = UrlParts::of(request)?;
    parts.query = parts.query.map(|query| query.replace('=', "%00="));

    let mut variant = request.clone();
    variant.set_url(parts.to_string());
    if let Body::Text(text) = request.body() {
        variant.set_body(Body::Text(text.replace('=', "%00=")));
    }
    Ok(vec![variant])
}

/// Appends each traversal payload to the path, one variant per payload.
pub fn path_traversal(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let parts = UrlParts::of(request)?;
    Ok(TRAVERSAL_PAYLOADS
        .iter()
        .map(|payload| {
            let mut traversed = parts.clone();
            traversed.path = format!("{}/{payload}", parts.path);
            let mut variant = request.clone();
            variant.set_url(traversed.to_string());
            variant
        })
        .collect())
}

/// Prefixes every non-empty query value of a GET request with a harmless shell command,
/// so that `cmd=cat /etc/passwd` becomes `cmd=ls;cat /etc/passwd`.
pub fn harmless_command(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    if *request.method() != Method::Get {
        return Ok(vec![]);
    }
    let mut parts = UrlParts::of(request)?;
    let pairs = parts.query_pairs();
    if pairs.iter().all(|(_, value)| value.is_empty()) {
        return Ok(vec![]);
    }
    let prefixed: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(key, value)| {
            if value.is_empty() {
                (key, value)
            } else {
                (key, format!("{HARMLESS_COMMAND}{value}"))
            }
        })
        .collect();
    parts.query = Some(join_pairs(prefixed.iter().map(|(k, v)| (k.as_str(), v.as_str()))));

    let mut variant = request.clone();
    variant.set_url(parts.to_string());
    Ok(vec![variant])
}

/// Adds a random, meaningless parameter: to the query of a GET, or to a POST form body.
pub fn harmless_param(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let name = random_token(LOWER_ALPHA, 5, rng);
    let value = random_token(LOWER_ALPHA, 10, rng);

    let mut variant = request.clone();
    match (request.method(), request.body()) {
        (Method::Get, _) => {
            let mut parts = UrlParts::of(request)?;
            parts.query = Some(match parts.query.take() {
                Some(query) if !query.is_empty() => format!("{query}&{name}={value}"),
                _ => format!("{name}={value}"),
            });
            variant.set_url(parts.to_string());
        }
        (Method::Post, Body::Form(pairs)) => {
            let mut pairs = pairs.clone();
            pairs.push((name, value));
            variant.set_body(Body::Form(pairs));
        }
        _ => return Ok(vec![]),
    }
    Ok(vec![variant])
}

/// The key and value of the first `key<sep>value` item in `text`, if any.
fn first_item(text: &str, sep: char) -> Option<(&str, &str)> {
    let (key, rest) = text.split_once(sep)?;
    let value = rest.split(sep).next().unwrap_or(rest);
    Some((key, value))
}

/// Decoy for the `key:value` (JSON-ish) flavour; closes the object the way a scalar would.
fn json_decoy(decoy: &str) -> String {
    format!("\"{decoy}\"}}")
}

/// One variant per query parameter: `p=1` repeated before the real value, followed by the
/// other parameters.
fn pollute_query(request: &Request) -> Result<Vec<Request>, StrategyError> {
    let parts = UrlParts::of(request)?;
    let pairs = parts.query_pairs();
    Ok(pairs
        .iter()
        .enumerate()
        .map(|(index, (param, value))| {
            let polluted = std::iter::repeat_n((param.as_str(), "1"), DECOY_REPEATS)
                .chain(std::iter::once((param.as_str(), value.as_str())))
                .chain(
                    pairs
                        .iter()
                        .enumerate()
                        .filter(|(other, (name, _))| *other != index && name != param)
                        .map(|(_, (name, value))| (name.as_str(), value.as_str())),
                );
            let mut rebuilt = parts.clone();
            rebuilt.query = Some(join_pairs(polluted));
            let mut variant = request.clone();
            variant.set_url(rebuilt.to_string());
            variant
        })
        .collect())
}

/// Repeats the first parameter with decoy values before the real one.
///
/// A WAF that inspects only the first occurrence sees a decoy while a server that keeps
/// the last occurrence receives the payload. Text bodies yield one variant per syntax
/// found (`k=v` and `k:v`), form bodies one variant with every pair polluted, and a
/// request without a body one variant per query parameter.
pub fn pollution_repeat(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    match request.body() {
        body if body.is_empty() => pollute_query(request),
        Body::Form(pairs) => {
            let polluted = pairs
                .iter()
                .flat_map(|(key, value)| {
                    let decoy = pick(DECOY_VALUES, rng).to_owned();
                    std::iter::repeat_n((key.clone(), decoy), DECOY_REPEATS)
                        .chain(std::iter::once((key.clone(), value.clone())))
                        .collect::<Vec<_>>()
                })
                .collect();
            let mut variant = request.clone();
            variant.set_body(Body::Form(polluted));
            Ok(vec![variant])
        }
        body => {
            let Some(text) = body_text(request, "parameter_pollution_repeat")? else {
                return Ok(vec![]);
            };
            let mut variants = Vec::new();
            for sep in ['=', ':'] {
                let Some((key, value)) = first_item(&text, sep) else {
                    continue;
                };
                let decoy = match sep {
                    '=' => pick(DECOY_VALUES, rng).to_owned(),
                    _ => json_decoy(pick(DECOY_VALUES, rng)),
                };
                let mut polluted = String::new();
                for _ in 0..DECOY_REPEATS {
                    polluted.push_str(&format!("{key}{sep}{decoy}\n"));
                }
                polluted.push_str(&format!("{key}{sep}{value}"));

                let mut variant = request.clone();
                variant.set_body(body.with_text_like(polluted));
                variants.push(variant);
            }
            Ok(variants)
        }
    }
}

/// Splits `value` at two random interior points into three non-empty pieces.
fn split_in_three<'a>(value: &'a str, rng: &mut dyn RngCore) -> Option<[&'a str; 3]> {
    let bounds: Vec<usize> = value
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .collect();
    if bounds.len() < 2 {
        return None;
    }
    let first = rng.random_range(0..bounds.len() - 1);
    let second = rng.random_range(first + 1..bounds.len());
    let (a, b) = (bounds[first], bounds[second]);
    Some([&value[..a], &value[a..b], &value[b..]])
}

/// Splits a parameter value across three repetitions of its key.
///
/// Servers that concatenate repeated parameters rebuild the payload, while a WAF checking
/// each occurrence separately sees only fragments. Values shorter than three characters
/// cannot be split and are left out.
pub fn pollution_split(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    match request.body() {
        body if body.is_empty() => {
            let parts = UrlParts::of(request)?;
            let pairs = parts.query_pairs();
            let mut variants = Vec::new();
            for (index, (param, value)) in pairs.iter().enumerate() {
                let Some(pieces) = split_in_three(value, rng) else {
                    continue;
                };
                let polluted = pieces
                    .iter()
                    .map(|piece| (param.as_str(), *piece))
                    .chain(
                        pairs
                            .iter()
                            .enumerate()
                            .filter(|(other, _)| *other != index)
                            .map(|(_, (name, value))| (name.as_str(), value.as_str())),
                    );
                let mut rebuilt = parts.clone();
                rebuilt.query = Some(join_pairs(polluted));
                let mut variant = request.clone();
                variant.set_url(rebuilt.to_string());
                variants.push(variant);
            }
            Ok(variants)
        }
        Body::Form(pairs) => {
            let mut changed = false;
            let mut polluted = Vec::with_capacity(pairs.len() * 3);
            for (key, value) in pairs {
                match split_in_three(value, rng) {
                    Some(pieces) => {
                        changed = true;
                        polluted.extend(pieces.iter().map(|piece| (key.clone(), piece.to_string())));
                    }
                    None => polluted.push((key.clone(), value.clone())),
                }
            }
            if !changed {
                return Ok(vec![]);
            }
            let mut variant = request.clone();
            variant.set_body(Body::Form(polluted));
            Ok(vec![variant])
        }
        body => {
            let Some(text) = body_text(request, "parameter_pollution_split")? else {
                return Ok(vec![]);
            };
            let mut variants = Vec::new();
            for sep in ['=', ':'] {
                let Some((key, value)) = first_item(&text, sep) else {
                    continue;
                };
                let Some(pieces) = split_in_three(value, rng) else {
                    continue;
                };
                let polluted: String = pieces
                    .iter()
                    .map(|piece| format!("{key}{sep}{piece}\n"))
                    .collect();
                let mut variant = request.clone();
                variant.set_body(body.with_text_like(polluted));
                variants.push(variant);
            }
            Ok(variants)
        }
    }
}
