//! Query-string promotion and body decoding.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{Next, Stage};
use crate::error::HttpError;
use crate::handler::{BoxFuture, Outcome};
use crate::negotiate::MediaKind;
use crate::request::Request;

pub const INVALID_JSON: &str = "Invalid JSON body";
pub const INVALID_URL_ENCODED: &str = "Invalid url encoded string";

/// Decodes what the client sent before any action sees it.
///
/// The raw query string is always decoded into the query map. For
/// `POST`, `PUT`, `PATCH` and `DELETE` requests that have no parsed body
/// yet, the body is decoded by media kind: `Content-Type` first, then
/// `Accept`, then the configured default. JSON and url-encoded bodies are
/// understood; anything else passes through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParseBody {
    default: Option<MediaKind>,
}

impl ParseBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kind assumed when neither header names one.
    pub fn with_default(mut self, kind: MediaKind) -> Self {
        self.default = Some(kind);
        self
    }

    fn parse(&self, req: Request) -> Outcome<Request> {
        let req = promote_query(req);
        if !req.method().carries_body() || req.parsed_body().is_some() {
            return Ok(req);
        }
        let parsed = match MediaKind::for_body(&req).or(self.default) {
            Some(MediaKind::Json)       => decode_json(req.body())?,
            Some(MediaKind::UrlEncoded) => decode_form(req.body())?,
            Some(MediaKind::Html) | None => return Ok(req),
        };
        Ok(req.with_parsed_body(parsed))
    }
}

impl Stage for ParseBody {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        let parsed = self.parse(req);
        Box::pin(async move { next.run(parsed?).await })
    }
}

fn promote_query(req: Request) -> Request {
    let Some(raw) = req.query_string() else { return req };
    let mut query: HashMap<String, String> = req.query().clone();
    query.extend(url::form_urlencoded::parse(raw.as_bytes()).into_owned());
    req.with_query(query)
}

fn decode_json(body: &[u8]) -> Outcome<Value> {
    if body.trim_ascii().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_slice(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
        Ok(_) => Err(HttpError::bad_request(INVALID_JSON)),
        Err(e) => Err(HttpError::bad_request(INVALID_JSON).with_source(e)),
    }
}

fn decode_form(body: &[u8]) -> Outcome<Value> {
    let fields: Map<String, Value> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect();
    if fields.is_empty() && !body.trim_ascii().is_empty() {
        return Err(HttpError::bad_request(INVALID_URL_ENCODED));
    }
    Ok(Value::Object(fields))
}
