//! Character-level obfuscation of the request's textual fields.
//!
//! Every strategy here yields exactly one variant: the input with each selected field
//! ([`Field`]) rewritten. Signature-based rules match byte sequences, so breaking a
//! keyword with encodings, case, comments or whitespace is often enough to slip past them.

use rand::{Rng, RngCore};

use crate::constants::GARBAGE_CHARS;
use crate::error::StrategyError;
use crate::request::Request;
use crate::strategies::{ALL_FIELDS, Field, PAYLOAD_FIELDS, rewrite_fields};
use crate::util::{PATH_SAFE, PAYLOAD_SAFE, QUERY_SAFE, pick, quote, random_token};

const NEWLINES: &[&str] = &["", "\r", "", "\n", "", "\r\n", ""];
const TABS: &[&str] = &["", "\t", "", "\n", "", "\t\n", ""];

/// Chance that a filler is inserted after an alphanumeric character.
const INSERT_AFTER_ALNUM_PROBABILITY: f64 = 1.0 / 3.0;

fn single(
    request: &Request,
    fields: &[Field],
    rng: &mut dyn RngCore,
    rewrite: impl FnMut(Field, &str, &mut dyn RngCore) -> String,
) -> Result<Vec<Request>, StrategyError> {
    rewrite_fields(request, fields, rng, rewrite).map(|variant| vec![variant])
}

pub fn url_encoding(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, ALL_FIELDS, rng, |field, text, _| match field {
        Field::Path => quote(text, PATH_SAFE),
        Field::Query => quote(text, QUERY_SAFE),
        Field::Body | Field::Filename => quote(text, PAYLOAD_SAFE),
    })
}

/// Percent-encodes twice, so that `%` itself ends up escaped as `%25`.
pub fn double_encoding(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, &[Field::Query, Field::Body], rng, |_, text, _| {
        quote(&quote(text, PATH_SAFE), PATH_SAFE)
    })
}

/// Replaces each character with a lower-case `\uXXXX` escape with probability 1/2.
pub fn unicode_escape(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, ALL_FIELDS, rng, |_, text, rng| {
        text.chars()
            .map(|c| {
                if rng.random_bool(0.5) {
                    format!("\\u{:04x}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect()
    })
}

/// Replaces ASCII characters with an upper-case `\uXXXX` escape with probability 1/5.
pub fn unicode_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, rng| {
        text.chars()
            .map(|c| {
                if c.is_ascii() && rng.random_bool(0.2) {
                    format!("\\u{:04X}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect()
    })
}

pub fn html_entities(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, _| {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '"' | '\'' | '<' | '>' | '&' => out.push_str(&format!("&#{};", c as u32)),
                c => out.push(c),
            }
        }
        out
    })
}

/// Inserts an encoded line feed (`%0A`) before each character with probability 1/2.
pub fn line_breaks(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, ALL_FIELDS, rng, |_, text, rng| {
        let mut out = String::with_capacity(text.len() * 2);
        for c in text.chars() {
            if rng.random_bool(0.5) {
                out.push_str("%0A");
            }
            out.push(c);
        }
        out
    })
}

/// Copies `text`, calling `filler` after some of its alphanumeric characters.
fn insert_after_alnum(
    text: &str,
    rng: &mut dyn RngCore,
    mut filler: impl FnMut(&mut dyn RngCore) -> String,
) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        out.push(c);
        if c.is_alphanumeric() && rng.random_bool(INSERT_AFTER_ALNUM_PROBABILITY) {
            out.push_str(&filler(rng));
        }
    }
    out
}

pub fn newline_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, rng| {
        insert_after_alnum(text, rng, |rng| pick(NEWLINES, rng).to_owned())
    })
}

pub fn tab_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, rng| {
        insert_after_alnum(text, rng, |rng| pick(TABS, rng).to_owned())
    })
}

/// Inserts runs of 1 to 10 random printable characters after alphanumerics.
pub fn garbage_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, rng| {
        insert_after_alnum(text, rng, |rng| {
            let len = rng.random_range(1..=10);
            random_token(GARBAGE_CHARS, len, rng)
        })
    })
}

/// Applies `decorate` to every character except the first and last, each with probability 1/2.
fn decorate_inner(
    text: &str,
    rng: &mut dyn RngCore,
    decorate: impl Fn(char) -> String,
) -> String {
    let chars: Vec<char> = text.chars().collect();
    let last = chars.len().saturating_sub(1);
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i > 0 && i < last && rng.random_bool(0.5) {
                decorate(c)
            } else {
                c.to_string()
            }
        })
        .collect()
}

fn random_case(text: &str, rng: &mut dyn RngCore) -> String {
    text.chars()
        .flat_map(|c| {
            if rng.random_bool(0.5) {
                c.to_uppercase().collect::<Vec<_>>()
            } else {
                c.to_lowercase().collect::<Vec<_>>()
            }
        })
        .collect()
}

pub fn space_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, rng| {
        decorate_inner(text, rng, |c| format!(" {c}"))
    })
}

/// Wraps inner characters in `/*..*/` and randomizes letter case, e.g. `se/*L*/eCt`.
pub fn case_comment_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, ALL_FIELDS, rng, |_, text, rng| {
        let commented = decorate_inner(text, rng, |c| format!("/*{c}*/"));
        random_case(&commented, rng)
    })
}

pub fn random_case_obfuscation(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    single(request, PAYLOAD_FIELDS, rng, |_, text, rng| random_case(text, rng))
}
