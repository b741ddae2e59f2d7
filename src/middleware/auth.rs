//! Bearer-token gate for the protected part of the site.

use std::sync::Arc;

use tracing::debug;

use super::{Next, Stage};
use crate::config::AuthConfig;
use crate::error::HttpError;
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::router::{BASE_NAME, SEPARATOR, SUFFIX, handler_name};
use crate::token::TokenCodec;

/// Attribute key under which the authenticated user id is stored.
pub const USER_ID: &str = "user_id";

/// The one message every authentication failure reports.
pub const NOT_LOGGED_IN: &str = "Not logged in";

/// Requires a valid token on every path under the protected prefix.
///
/// The token comes from `Authorization: Bearer <token>` or, failing that,
/// from the configured cookie. Whatever goes wrong (no token, bad
/// signature, expired, odd subject) the client sees the same
/// `401 Not logged in`.
///
/// Paths are compared by the handler they route to, so any spelling the
/// router accepts (case, doubled or trailing slashes) is gated the same way.
pub struct Auth {
    codec: Arc<TokenCodec>,
    config: AuthConfig,
    scope: String,
    exempt: Vec<String>,
}

impl Auth {
    pub fn new(codec: Arc<TokenCodec>, config: AuthConfig) -> Self {
        let scope = namespace(&config.base_path);
        let exempt = config.exempt.iter().map(|p| handler_name(p)).collect();
        Self { codec, config, scope, exempt }
    }

    fn protects(&self, path: &str) -> bool {
        let name = handler_name(path);
        name.starts_with(&self.scope) && !self.exempt.contains(&name)
    }

    fn authenticate(&self, req: &Request) -> Outcome<u64> {
        let token = bearer(req)
            .or_else(|| req.cookie(&self.config.cookie).filter(|t| !t.is_empty()))
            .ok_or_else(|| HttpError::unauthorized(NOT_LOGGED_IN))?;

        let claims = self.codec.decode(token).map_err(|e| {
            debug!(path = req.path(), reason = %e, "token rejected");
            HttpError::unauthorized(NOT_LOGGED_IN)
        })?;

        claims.subject_id().ok_or_else(|| {
            debug!(path = req.path(), sub = %claims.sub, "token subject is not a user id");
            HttpError::unauthorized(NOT_LOGGED_IN)
        })
    }
}

impl Stage for Auth {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        if !self.protects(req.path()) {
            return next.run(req);
        }
        let user = self.authenticate(&req);
        Box::pin(async move { next.run(req.with_attribute(USER_ID, user?)).await })
    }
}

/// The authenticated user, once [`Auth`] has let the request through.
pub fn user_id(req: &Request) -> Option<u64> {
    req.attribute::<u64>(USER_ID).copied()
}

/// `/api/` becomes `actions::Api::`, the prefix of every handler below it.
/// A root base path covers every handler.
fn namespace(base_path: &str) -> String {
    if base_path.trim_matches('/').is_empty() {
        return BASE_NAME.to_owned();
    }
    let name = handler_name(base_path);
    let stem = name.strip_suffix(SUFFIX).unwrap_or(&name);
    format!("{stem}{SEPARATOR}")
}

/// `Bearer <token>`, scheme matched case-insensitively.
fn bearer(req: &Request) -> Option<&str> {
    let value = req.header("authorization")?.trim();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
