//! Decoding of URL-encoded key/value text and the `cookie` header.
//!
//! Query strings and `application/x-www-form-urlencoded` bodies share one rule:
//! split on `&`, then split each pair on the first `=`. A pair without `=` is a
//! key with no value, not an error. Percent-decoding is opt-in.

use std::collections::HashMap;

use crate::http::request::{Cookie, CookieSet};

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

/// Splits `key=value&key2` text into a map. Empty segments are skipped and a
/// repeated key keeps its last value.
pub fn decode_pairs(input: &str, percent_decode: bool) -> HashMap<String, Option<String>> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (
                decode_component(key, percent_decode),
                Some(decode_component(value, percent_decode)),
            ),
            None => (decode_component(pair, percent_decode), None),
        })
        .collect()
}

/// Decodes the query part of a request target (the text after `?`).
pub fn decode_query(query: &str, percent_decode: bool) -> HashMap<String, Option<String>> {
    decode_pairs(query, percent_decode)
}

/// Decodes a form body. Line breaks left over from line-oriented senders are
/// trimmed from the ends first.
pub fn decode_form_body(body: &str, percent_decode: bool) -> HashMap<String, Option<String>> {
    decode_pairs(body.trim_end_matches(['\r', '\n']), percent_decode)
}

fn decode_component(raw: &str, percent_decode: bool) -> String {
    if !percent_decode {
        return raw.to_string();
    }
    // '+' is a space in form encoding
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Parses a `cookie` header value (`a=1; b=2`) into a cookie set.
pub fn parse_cookies(value: &str) -> CookieSet {
    value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => Cookie::new(name.trim(), value.trim()),
            None => Cookie::new(pair, ""),
        })
        .collect()
}

/// Media type without parameters, lower-cased: `Text/HTML; charset=x` -> `text/html`.
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub fn is_json_media_type(content_type: &str) -> bool {
    media_type_essence(content_type) == JSON_MEDIA_TYPE
}

pub fn is_multipart_media_type(content_type: &str) -> bool {
    media_type_essence(content_type) == MULTIPART_MEDIA_TYPE
}
