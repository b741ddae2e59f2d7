//! Fixed-window, per-client request limiting.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;

use super::{Next, Stage};
use crate::clock::{SharedClock, SystemClock};
use crate::config::RateLimitConfig;
use crate::error::HttpError;
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::store::CounterStore;

pub const RATE_LIMITED: &str = "Rate limited: try again later";

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Counts requests per client address in fixed windows.
///
/// The first request of a window creates the counter and a companion
/// `<key>:timer` entry holding the moment the window closes; both expire
/// with the window. Up to `requests` requests per window are served, the
/// last of them with `X-RateLimit-Remaining: 0`. Anything beyond that is
/// answered with `429` and a `Retry-After` until the window ends.
pub struct RateLimit {
    store: Arc<dyn CounterStore>,
    clock: SharedClock,
    limit: u64,
    window: u64,
}

impl RateLimit {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            limit: config.requests,
            window: config.period_secs,
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Counts `req` against its client's window.
    fn check(&self, req: &Request) -> Outcome<u64> {
        let key = client_key(req);
        let timer = format!("{key}:timer");
        let now = self.clock.now();

        let count = self.store.increment(&key, self.window);
        if count == 1 {
            let closes_at = i64::try_from(now.saturating_add(self.window)).unwrap_or(i64::MAX);
            self.store.set(&timer, closes_at, self.window);
        }
        let count = u64::try_from(count).unwrap_or(0);

        if count > self.limit {
            let closes_at = u64::try_from(self.store.get(&timer, 0)).unwrap_or(0);
            let retry_after = closes_at.saturating_sub(now);
            warn!(client = %key, count, limit = self.limit, retry_after, "rate limit exceeded");
            return Err(HttpError::too_many_requests(RATE_LIMITED)
                .with_header(LIMIT_HEADER, self.limit)
                .with_header(REMAINING_HEADER, 0)
                .with_header(RETRY_AFTER_HEADER, retry_after)
                .with_header(RESET_HEADER, retry_after));
        }
        Ok(self.limit.saturating_sub(count))
    }
}

impl Stage for RateLimit {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        let checked = self.check(&req);
        Box::pin(async move {
            let remaining = checked?;
            let res = next.run(req).await?;
            Ok(res
                .with_header(LIMIT_HEADER, self.limit)
                .with_header(REMAINING_HEADER, remaining))
        })
    }
}

/// Hashed client address; `unknown` when the peer is not known.
fn client_key(req: &Request) -> String {
    let addr = req.remote_addr().map_or_else(|| "unknown".to_owned(), |a| a.ip().to_string());
    hex::encode(Sha256::digest(addr.as_bytes()))
}
