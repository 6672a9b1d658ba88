//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical request is the newline-separated form that gets hashed and
//! signed:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Besides the canonical builders this module exposes [`encode_path`] and
//! [`encode_query`], which produce the strings actually put on the wire. Both
//! use the same unreserved character set as the canonical form so that what
//! is signed and what is sent never diverge.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Everything except the RFC 3986 unreserved characters
/// (`A-Z`, `a-z`, `0-9`, `-`, `_`, `.`, `~`) gets percent-encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from its components.
///
/// # Examples
///
/// ```
/// use rgw_broker_auth::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/admin/user",
///     "uid=alice",
///     &[("host", "rgw.local")],
///     &["host"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// assert!(canonical.starts_with("GET\n/admin/user\nuid=alice\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(uri);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical URI, encoding each path segment individually.
///
/// Segments are decoded before being re-encoded, so an already encoded path
/// and its raw form produce the same canonical URI.
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            uri_encode(&decoded)
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string by sorting the raw parameters.
///
/// Parameters without a value (sub-resources such as `key` in
/// `/admin/user?key&uid=...`) are rendered as `key=`. Values are kept exactly
/// as they appear on the wire.
///
/// # Examples
///
/// ```
/// use rgw_broker_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string("uid=bob&key"), "key=&uid=bob");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block from the request headers.
///
/// Only headers listed in `signed_headers` are included. Names are lowercased,
/// values trimmed with inner whitespace runs collapsed, duplicates joined with
/// commas. The result has no trailing newline.
#[must_use]
pub fn build_canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(name.to_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }

    let mut sorted_signed: Vec<&str> = signed_headers.to_vec();
    sorted_signed.sort_unstable();

    sorted_signed
        .iter()
        .filter_map(|name| header_map.get(*name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the `;`-separated, sorted list of signed header names.
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Encode path segments into an absolute request path.
///
/// # Examples
///
/// ```
/// use rgw_broker_auth::canonical::encode_path;
///
/// assert_eq!(encode_path(&["kube-rgw-data", "instance/a b"]), "/kube-rgw-data/instance%2Fa%20b");
/// assert_eq!(encode_path(&[]), "/");
/// ```
#[must_use]
pub fn encode_path(segments: &[&str]) -> String {
    if segments.is_empty() {
        return "/".to_owned();
    }
    segments.iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(&uri_encode(segment));
        path
    })
}

/// Encode an object key into a request path below `bucket`.
///
/// Unlike [`encode_path`], slashes inside the key are kept as path
/// separators, which is how S3 clients address `prefix/name` style keys.
///
/// # Examples
///
/// ```
/// use rgw_broker_auth::canonical::encode_object_path;
///
/// assert_eq!(encode_object_path("data", "bind/i-1/b 1"), "/data/bind/i-1/b%201");
/// ```
#[must_use]
pub fn encode_object_path(bucket: &str, key: &str) -> String {
    let mut segments = vec![bucket];
    segments.extend(key.split('/'));
    encode_path(&segments)
}

/// Encode query parameters in the given order.
///
/// A `None` value produces a bare sub-resource flag (`key`), matching how the
/// admin API expects `?key&uid=...`.
///
/// # Examples
///
/// ```
/// use rgw_broker_auth::canonical::encode_query;
///
/// let q = encode_query(&[("key", None), ("uid", Some("kube-rgw.x")), ("display-name", Some("a b"))]);
/// assert_eq!(q, "key&uid=kube-rgw.x&display-name=a%20b");
/// ```
#[must_use]
pub fn encode_query(pairs: &[(&str, Option<&str>)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{}={}", uri_encode(key), uri_encode(value)),
            None => uri_encode(key),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
