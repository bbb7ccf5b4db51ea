//! Normalized per-request context.
//!
//! One [`HttpContext`] is built per request and handed to the handler: an
//! immutable snapshot of headers, query, matched path parameters, and the
//! collected body, plus the raw request parts for handlers that need
//! lower-level access. No validation, no coercion — values are passed
//! through exactly as received.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::BodyExt;

use crate::error::HandlerError;

/// An immutable snapshot of one incoming request.
pub struct HttpContext {
    headers: http::HeaderMap,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    body: Bytes,
    raw: http::request::Parts,
}

impl HttpContext {
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Header lookup by name (case-insensitive). Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a query-string value. For `?page=2`, `ctx.query("page")`
    /// returns `Some("2")`.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `get_users_$id`, `ctx.param("id")` on `/users/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The raw request parts from the underlying server — method, URI,
    /// version, extensions. The escape hatch for anything this snapshot
    /// does not surface.
    pub fn raw(&self) -> &http::request::Parts {
        &self.raw
    }

    /// Derives a context with one extra path parameter. Pipeline stages use
    /// this to pass values downstream; the original snapshot semantics are
    /// kept by construction (consume, copy, return).
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_owned(), value.to_owned());
        self
    }

    pub(crate) fn from_parts(
        parts: http::request::Parts,
        params: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        Self {
            headers: parts.headers.clone(),
            query: parse_query(parts.uri.query().unwrap_or("")),
            params,
            body,
            raw: parts,
        }
    }
}

/// Builds the context for one request: collects the body, snapshots headers
/// and query, attaches the matched path parameters.
pub(crate) async fn extract(
    req: hyper::Request<hyper::body::Incoming>,
    params: HashMap<String, String>,
) -> Result<HttpContext, HandlerError> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.map_err(HandlerError::new)?.to_bytes();
    Ok(HttpContext::from_parts(parts, params, body))
}

/// Splits `a=1&b=two` into a string map. Duplicate keys keep the last
/// value; keys without `=` map to the empty string. No percent-decoding —
/// this layer does not interpret values.
fn parse_query(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_pairs() {
        let q = parse_query("a=1&b=two");
        assert_eq!(q.get("a").map(String::as_str), Some("1"));
        assert_eq!(q.get("b").map(String::as_str), Some("two"));
    }

    #[test]
    fn empty_query_is_empty_map() {
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn bare_key_maps_to_empty_string() {
        let q = parse_query("flag&x=1");
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert_eq!(q.get("x").map(String::as_str), Some("1"));
    }

    #[test]
    fn duplicate_keys_keep_last() {
        let q = parse_query("k=first&k=second");
        assert_eq!(q.get("k").map(String::as_str), Some("second"));
    }

    #[test]
    fn snapshot_exposes_headers_query_params_and_raw() {
        let (parts, ()) = http::Request::builder()
            .uri("/users/42?page=2")
            .header("x-trace", "abc")
            .body(())
            .unwrap()
            .into_parts();
        let params = HashMap::from([("id".to_owned(), "42".to_owned())]);
        let ctx = HttpContext::from_parts(parts, params, Bytes::from_static(b"hi"));

        assert_eq!(ctx.header("X-Trace"), Some("abc"));
        assert_eq!(ctx.query("page"), Some("2"));
        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(ctx.body(), b"hi");
        assert_eq!(ctx.raw().uri.path(), "/users/42");
    }
}
