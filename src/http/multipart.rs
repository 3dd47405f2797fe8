//! `multipart/form-data` body decoding.
//!
//! The body is split on `--<boundary>`; the preamble before the first delimiter and
//! the epilogue after the last one are dropped. Each remaining part is a descriptor
//! block, a blank line, then the content. Parts carrying a `filename` attribute
//! become [`MultipartFile`]s, the rest become plain attributes.
//!
//! Works on bytes so file payloads come through untouched. Both CRLF and bare LF
//! line endings are accepted.

use std::collections::HashMap;

use crate::http::parser::ParseError;
use crate::http::request::{AttributeMap, MultipartFile};

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// Fields and files decoded from one multipart body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: AttributeMap,
    pub files: HashMap<String, MultipartFile>,
}

/// Extracts the delimiter (`"--" + boundary`) from a multipart content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, ParseError> {
    let boundary = split_params(content_type)
        .into_iter()
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value.trim()))
        .ok_or(ParseError::MalformedMultipart("missing boundary parameter"))?;

    if boundary.is_empty() {
        return Err(ParseError::MalformedMultipart("empty boundary parameter"));
    }

    Ok(format!("--{}", boundary))
}

/// Decodes a multipart body using a delimiter from [`boundary_from_content_type`].
///
/// A repeated field name overwrites the earlier value or file.
pub fn decode_multipart(body: &[u8], delimiter: &str) -> Result<MultipartForm, ParseError> {
    let segments = split_bytes(body, delimiter.as_bytes());
    let mut form = MultipartForm::default();

    if segments.len() < 2 {
        return Ok(form);
    }

    for segment in &segments[1..segments.len() - 1] {
        let part = strip_leading_newline(segment);
        let (descriptor, content) = split_descriptor(part)
            .ok_or(ParseError::MalformedMultipart("part without blank line"))?;
        let content = strip_trailing_newline(content);

        let descriptor = std::str::from_utf8(descriptor)
            .map_err(|_| ParseError::MalformedMultipart("descriptor is not utf-8"))?;
        let mut lines = descriptor.lines();

        let disposition = lines
            .next()
            .ok_or(ParseError::MalformedMultipart("empty descriptor"))?;
        let (name, filename) = parse_disposition(disposition)?;

        match filename {
            Some(filename) => {
                let content_type = lines
                    .filter_map(|line| line.split_once(':'))
                    .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-type"))
                    .map(|(_, value)| value.trim().to_string())
                    .unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string());

                form.fields.remove(&name);
                form.files.insert(
                    name.clone(),
                    MultipartFile {
                        field_name: name,
                        filename,
                        content_type,
                        data: content.to_vec(),
                    },
                );
            }
            None => {
                let value = String::from_utf8_lossy(content).trim().to_string();
                form.files.remove(&name);
                form.fields.insert(name, Some(value));
            }
        }
    }

    Ok(form)
}

/// Reads `name` and `filename` from a `Content-Disposition: form-data; ...` line.
fn parse_disposition(line: &str) -> Result<(String, Option<String>), ParseError> {
    let mut name = None;
    let mut filename = None;

    for attr in split_params(line).into_iter().skip(1) {
        let Some((key, value)) = attr.trim().split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(unquote(value.trim())),
            "filename" => filename = Some(unquote(value.trim())),
            _ => {}
        }
    }

    let name = name.ok_or(ParseError::MalformedMultipart("part without name"))?;
    Ok((name, filename))
}

/// Splits a header value on `;`, leaving separators inside `"..."` alone.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);

    params
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

fn split_descriptor(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let crlf = find(part, b"\r\n\r\n");
    let lf = find(part, b"\n\n");

    match (crlf, lf) {
        (Some(c), Some(l)) if c < l => Some((&part[..c], &part[c + 4..])),
        (_, Some(l)) => Some((&part[..l], &part[l + 2..])),
        (Some(c), None) => Some((&part[..c], &part[c + 4..])),
        (None, None) => None,
    }
}

fn strip_leading_newline(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_prefix(b"\r\n")
        .or_else(|| bytes.strip_prefix(b"\n"))
        .unwrap_or(bytes)
}

fn strip_trailing_newline(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_bytes<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut rest = haystack;

    while let Some(pos) = find(rest, needle) {
        segments.push(&rest[..pos]);
        rest = &rest[pos + needle.len()..];
    }
    segments.push(rest);

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_prefixed() {
        let delimiter = boundary_from_content_type("multipart/form-data; boundary=XYZ").unwrap();
        assert_eq!(delimiter, "--XYZ");
    }

    #[test]
    fn quoted_boundary() {
        let delimiter =
            boundary_from_content_type("multipart/form-data; boundary=\"a b\"").unwrap();
        assert_eq!(delimiter, "--a b");
    }

    #[test]
    fn missing_boundary_is_malformed() {
        let result = boundary_from_content_type("multipart/form-data");
        assert!(matches!(result, Err(ParseError::MalformedMultipart(_))));
    }

    #[test]
    fn semicolon_inside_quotes_is_kept() {
        let (name, filename) =
            parse_disposition("form-data; name=\"doc\"; filename=\"a; b.png\"").unwrap();
        assert_eq!(name, "doc");
        assert_eq!(filename.as_deref(), Some("a; b.png"));
    }

    #[test]
    fn lf_only_body() {
        let body = b"--B\nContent-Disposition: form-data; name=\"k\"\n\nv\n--B--\n";
        let form = decode_multipart(body, "--B").unwrap();
        assert_eq!(form.fields.get("k"), Some(&Some("v".to_string())));
        assert!(form.files.is_empty());
    }

    #[test]
    fn part_without_separator_is_malformed() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"k\"\r\nv\r\n--B--\r\n";
        assert!(decode_multipart(body, "--B").is_err());
    }

    #[test]
    fn body_without_delimiter_has_no_parts() {
        let form = decode_multipart(b"just text", "--B").unwrap();
        assert_eq!(form, MultipartForm::default());
    }
}
