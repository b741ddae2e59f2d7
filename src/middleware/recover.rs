//! Outermost stage: turns every failure into a response.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt as _;
use tracing::{debug, error};

use super::{Next, Stage};
use crate::error::HttpError;
use crate::handler::{BoxFuture, Outcome};
use crate::negotiate::MediaKind;
use crate::request::Request;
use crate::response::Response;

/// Catches errors and panics from every stage below it.
///
/// The response format follows what the client asked for (`Accept`, then
/// `Content-Type`, then the configured default): JSON clients get
/// `{"error", "code"}`, everyone else a short HTML page. Server errors
/// are logged; details of the cause are only shown with `debug` on.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recover {
    debug: bool,
    default: Option<MediaKind>,
}

#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
struct Panicked(String);

impl Recover {
    pub fn new(debug: bool) -> Self {
        Self { debug, default: None }
    }

    /// Format used when the request names none.
    pub fn with_default(mut self, kind: MediaKind) -> Self {
        self.default = Some(kind);
        self
    }
}

impl Stage for Recover {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        let kind = MediaKind::for_reply(&req).or(self.default);
        let method = req.method();
        let path = req.path().to_owned();

        Box::pin(async move {
            let err = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(Ok(res)) => return Ok(res),
                Ok(Err(err)) => err,
                Err(panic) => HttpError::internal("Internal Server Error")
                    .with_source(Panicked(panic_message(panic.as_ref()))),
            };

            if err.status().is_server_error() {
                error!(%method, %path, status = err.status().as_u16(), error = %err, causes = ?err.causes(), "request failed");
            } else {
                debug!(%method, %path, status = err.status().as_u16(), error = %err, "request refused");
            }
            Ok(Response::error(&err, kind, self.debug))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
