//! Incoming HTTP request envelope.
//!
//! A [`Request`] is a value: every `with_*` method consumes it and returns
//! the changed copy, so a stage can never observe another stage mutating a
//! request it still holds.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::Uri;
use serde_json::Value;

use crate::method::Method;

/// An incoming HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
    parsed_body: Option<Value>,
    attributes: Attributes,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Vec::new(),
            cookies: HashMap::new(),
            query: HashMap::new(),
            body: Bytes::new(),
            parsed_body: None,
            attributes: Attributes::default(),
            remote_addr: None,
        }
    }

    pub(crate) fn from_parts(
        method: Method,
        uri: Uri,
        headers: Vec<(String, String)>,
        body: Bytes,
        remote_addr: SocketAddr,
    ) -> Self {
        let cookies = headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, v)| parse_cookies(v))
            .collect();
        Self {
            headers,
            cookies,
            body,
            remote_addr: Some(remote_addr),
            ..Self::new(method, uri)
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The raw, undecoded query string (`a=1&b=2`), if any.
    pub fn query_string(&self) -> Option<&str> { self.uri.query() }

    /// Case-insensitive header lookup. Returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Host the request was addressed to: the `Host` header without port,
    /// else the URI authority.
    pub fn host(&self) -> &str {
        match self.header("host") {
            Some(host) => match host.rsplit_once(':') {
                Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
                _ => host,
            },
            None => self.uri.host().unwrap_or_default(),
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Decoded query parameters. Empty until [`ParseBody`](crate::middleware::ParseBody)
    /// has promoted the raw query string.
    pub fn query(&self) -> &HashMap<String, String> { &self.query }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// The decoded body, once a stage has attached one.
    pub fn parsed_body(&self) -> Option<&Value> { self.parsed_body.as_ref() }

    /// Typed lookup in the attribute bag.
    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key)
    }

    // ── Copy-on-write updates ─────────────────────────────────────────────────

    /// Appends a header. A `Cookie` header also feeds the cookie map.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("cookie") {
            self.cookies.extend(parse_cookies(value));
        }
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_parsed_body(mut self, body: Value) -> Self {
        self.parsed_body = Some(body);
        self
    }

    pub fn with_attribute<T: Any + Send + Sync>(mut self, key: &str, value: T) -> Self {
        self.attributes.insert(key, value);
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    // ── Sanitised accessors for actions ───────────────────────────────────────

    /// Trimmed query parameter, or `default` when absent or blank.
    pub fn query_str(&self, name: &str, default: &str) -> String {
        non_blank(self.query_param(name)).unwrap_or(default).to_owned()
    }

    /// Leading-digit integer parse of a query parameter.
    pub fn query_int(&self, name: &str, default: u64) -> u64 {
        self.query_param(name).and_then(leading_integer).unwrap_or(default)
    }

    /// Trimmed string field of an object body, or `default`.
    pub fn body_str(&self, name: &str, default: &str) -> String {
        match self.body_field(name) {
            Some(Value::String(s)) => non_blank(Some(s)).unwrap_or(default).to_owned(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b))   => b.to_string(),
            _                      => default.to_owned(),
        }
    }

    /// Integer field of an object body; numeric strings are accepted.
    pub fn body_int(&self, name: &str, default: u64) -> u64 {
        match self.body_field(name) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Some(Value::String(s)) => leading_integer(s).unwrap_or(default),
            _                      => default,
        }
    }

    fn body_field(&self, name: &str) -> Option<&Value> {
        self.parsed_body.as_ref()?.as_object()?.get(name)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn leading_integer(value: &str) -> Option<u64> {
    let end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    value[..end].parse().ok()
}

fn parse_cookies(header: &str) -> impl Iterator<Item = (String, String)> + '_ {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_owned(), value.trim().trim_matches('"').to_owned()))
    })
}

// ── Attribute bag ─────────────────────────────────────────────────────────────

/// Per-request side channel between stages: string key → opaque value.
#[derive(Clone, Default)]
pub struct Attributes(HashMap<String, Arc<dyn Any + Send + Sync>>);

impl Attributes {
    fn insert<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.0.insert(key.to_owned(), Arc::new(value));
    }

    fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.0.get(key)?.downcast_ref()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get(uri: &'static str) -> Request {
        Request::new(Method::Get, Uri::from_static(uri))
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = get("/").with_header("Content-Type", "application/json");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn cookie_header_fills_cookie_map() {
        let req = get("/").with_header("Cookie", "token=abc.def; theme=\"dark\"; junk");
        assert_eq!(req.cookie("token"), Some("abc.def"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("junk"), None);
    }

    #[test]
    fn with_methods_leave_the_original_untouched() {
        let original = get("/a");
        let changed = original.clone().with_attribute("user_id", 7_u64);
        assert_eq!(changed.attribute::<u64>("user_id"), Some(&7));
        assert_eq!(original.attribute::<u64>("user_id"), None);
    }

    #[test]
    fn attribute_lookup_is_typed() {
        let req = get("/").with_attribute("user_id", 7_u64);
        assert_eq!(req.attribute::<String>("user_id"), None);
    }

    #[test]
    fn host_strips_port() {
        let req = get("/").with_header("Host", "example.com:8080");
        assert_eq!(req.host(), "example.com");
        assert_eq!(Request::new(Method::Get, Uri::from_static("http://foo.bar/x")).host(), "foo.bar");
    }

    #[test]
    fn sanitised_accessors() {
        let mut query = HashMap::new();
        query.insert("a".to_owned(), " hello ".to_owned());
        query.insert("b".to_owned(), "123abc".to_owned());
        query.insert("c".to_owned(), "x1".to_owned());
        let req = get("/")
            .with_query(query)
            .with_parsed_body(json!({ "n": 5, "s": "42", "t": "  ", "neg": -3 }));

        assert_eq!(req.query_str("a", "d"), "hello");
        assert_eq!(req.query_str("missing", "d"), "d");
        assert_eq!(req.query_int("b", 9), 123);
        assert_eq!(req.query_int("c", 9), 9);
        assert_eq!(req.body_int("n", 0), 5);
        assert_eq!(req.body_int("s", 0), 42);
        assert_eq!(req.body_int("neg", 1), 1);
        assert_eq!(req.body_str("t", "d"), "d");
        assert_eq!(req.body_str("n", "d"), "5");
    }
}
