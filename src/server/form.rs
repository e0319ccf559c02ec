//! Extraction of the `sprunge` form field from a POST request
//!
//! Both `application/x-www-form-urlencoded` and `multipart/form-data` bodies
//! are understood. `curl -F` sends the latter.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header, StatusCode},
};
use percent_encoding::percent_decode;

use crate::store::{StoreError, StoreResult};

/// Form field carrying the paste text
pub const PASTE_FIELD: &str = "sprunge";

/// Pull the paste payload out of a POST request.
///
/// The body is searched first, then the query string. A missing field is an
/// empty paste, and so is a body that cannot be parsed as a form. A body over
/// the configured limit fails with `PasteTooLarge`.
pub async fn paste_field(request: Request) -> StoreResult<Vec<u8>> {
    let from_query = query_field(&request);

    let from_body = if is_multipart(&request) {
        multipart_field(request).await?
    } else {
        urlencoded_field(request).await?
    };

    Ok(from_body.or(from_query).unwrap_or_default())
}

fn has_content_type(request: &Request, expected: &str) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with(expected))
        .unwrap_or(false)
}

fn is_multipart(request: &Request) -> bool {
    has_content_type(request, "multipart/form-data")
}

fn query_field(request: &Request) -> Option<Vec<u8>> {
    let query = request.uri().query()?;
    form_value(query.as_bytes(), PASTE_FIELD)
}

async fn urlencoded_field(request: Request) -> StoreResult<Option<Vec<u8>>> {
    if !has_content_type(&request, "application/x-www-form-urlencoded") {
        return Ok(None);
    }

    match Bytes::from_request(request, &()).await {
        Ok(body) => Ok(form_value(&body, PASTE_FIELD)),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(StoreError::PasteTooLarge)
        }
        Err(rejection) => {
            log::debug!("Unreadable form body treated as empty: {}", rejection);
            Ok(None)
        }
    }
}

/// First value of `name` in a urlencoded `input`, decoded to raw bytes.
///
/// Values are not required to be UTF-8: `%FF` decodes to the byte 0xFF.
fn form_value(input: &[u8], name: &str) -> Option<Vec<u8>> {
    input
        .split(|&b| b == b'&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (key, value) = match pair.iter().position(|&b| b == b'=') {
                Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                None => (pair, &[][..]),
            };
            (decode_component(key) == name.as_bytes()).then(|| decode_component(value))
        })
}

fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    percent_decode(&spaced).collect()
}

async fn multipart_field(request: Request) -> StoreResult<Option<Vec<u8>>> {
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(rejection) => {
            log::debug!("Unreadable multipart body treated as empty: {}", rejection);
            return Ok(None);
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(StoreError::PasteTooLarge)
            }
            Err(e) => {
                log::debug!("Malformed multipart body treated as empty: {}", e);
                return Ok(None);
            }
        };

        if field.name() != Some(PASTE_FIELD) {
            continue;
        }

        return match field.bytes().await {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(StoreError::PasteTooLarge),
            Err(e) => {
                log::debug!("Failed to read {} field: {}", PASTE_FIELD, e);
                Ok(None)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_value_decodes_raw_bytes() {
        assert_eq!(
            form_value(b"sprunge=%FF%FEabc", PASTE_FIELD),
            Some(vec![0xff, 0xfe, b'a', b'b', b'c'])
        );
    }

    #[test]
    fn test_form_value_plus_is_space() {
        assert_eq!(
            form_value(b"sprunge=hello+world%0A", PASTE_FIELD),
            Some(b"hello world\n".to_vec())
        );
    }

    #[test]
    fn test_form_value_first_occurrence_wins() {
        assert_eq!(
            form_value(b"other=1&sprunge=first&sprunge=second", PASTE_FIELD),
            Some(b"first".to_vec())
        );
    }

    #[test]
    fn test_form_value_encoded_key_and_missing_value() {
        assert_eq!(form_value(b"%73prunge=x", PASTE_FIELD), Some(b"x".to_vec()));
        assert_eq!(form_value(b"sprunge", PASTE_FIELD), Some(Vec::new()));
        assert_eq!(form_value(b"sprunge=", PASTE_FIELD), Some(Vec::new()));
    }

    #[test]
    fn test_form_value_absent() {
        assert_eq!(form_value(b"", PASTE_FIELD), None);
        assert_eq!(form_value(b"sprungeX=1&&x=2", PASTE_FIELD), None);
    }

    #[test]
    fn test_form_value_keeps_literal_equals_in_value() {
        assert_eq!(form_value(b"sprunge=a=b", PASTE_FIELD), Some(b"a=b".to_vec()));
    }
}
