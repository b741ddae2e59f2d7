//! Content negotiation.
//!
//! Maps `Accept` / `Content-Type` headers onto the three media kinds the
//! pipeline cares about. Parameters (`; charset=…`, `; q=…`) are ignored and
//! so is case.

use crate::request::Request;

/// A media family understood by the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MediaKind {
    Html,
    Json,
    UrlEncoded,
}

impl MediaKind {
    const TABLE: [(MediaKind, &'static [&'static str]); 3] = [
        (MediaKind::Html,       &["text/html", "application/xhtml+xml"]),
        (MediaKind::Json,       &["application/json", "text/json", "application/x-json"]),
        (MediaKind::UrlEncoded, &["application/x-www-form-urlencoded"]),
    ];

    /// Classifies one media type, e.g. `"application/json; charset=UTF-8"`.
    pub fn of_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        Self::TABLE.iter()
            .find(|(_, mimes)| mimes.contains(&essence.as_str()))
            .map(|(kind, _)| *kind)
    }

    /// First entry of the `Accept` list that is a known kind.
    pub fn from_accept(req: &Request) -> Option<Self> {
        req.header("accept")?.split(',').find_map(Self::of_mime)
    }

    pub fn from_content_type(req: &Request) -> Option<Self> {
        req.header("content-type").and_then(Self::of_mime)
    }

    /// What the client wants back: `Accept` first, then `Content-Type`.
    pub fn for_reply(req: &Request) -> Option<Self> {
        Self::from_accept(req).or_else(|| Self::from_content_type(req))
    }

    /// What the client sent: `Content-Type` first, then `Accept`.
    pub fn for_body(req: &Request) -> Option<Self> {
        Self::from_content_type(req).or_else(|| Self::from_accept(req))
    }
}
