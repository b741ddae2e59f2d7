//! The middleware pipeline.
//!
//! A [`Dispatcher`] turns a list of [`Stage`]s into one request handler.
//! Stages are declared innermost first; the **last** stage added runs
//! first and wraps every stage added before it:
//!
//! ```text
//! Dispatcher::new().add(Route).add(Auth).add(Recover)
//!
//!   request ──▶ Recover ──▶ Auth ──▶ Route
//!   response ◀─ Recover ◀── Auth ◀── Route
//! ```
//!
//! Each stage receives the request and a [`Next`] continuation bound to
//! the stages below it. It can answer on its own, or call
//! [`Next::run`] (at most once) and adjust what comes back.
//!
//! The chain is an immutable `Arc<[stage]>`; [`Next`] is just that slice
//! plus a position. Nothing is mutated while a request runs, so one
//! dispatcher serves any number of concurrent requests.

use std::future::Future;
use std::sync::Arc;

use crate::error::HttpError;
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

pub mod auth;
pub mod parse;
pub mod profile;
pub mod rate_limit;
pub mod recover;
pub mod route;
pub mod trace;

pub use auth::Auth;
pub use parse::ParseBody;
pub use profile::Profile;
pub use rate_limit::RateLimit;
pub use recover::Recover;
pub use route::Route;
pub use trace::Trace;

/// One layer of the pipeline.
pub trait Stage: Send + Sync + 'static {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome>;
}

type Chain = Arc<[Arc<dyn Stage>]>;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the pipeline below the running stage.
#[derive(Clone)]
pub struct Next {
    stages: Chain,
    remaining: usize,
}

impl Next {
    /// Hands `req` to the next stage inward.
    ///
    /// Fails with [`HttpError::no_handler`] when no stage is left.
    pub fn run(self, req: Request) -> BoxFuture<'static, Outcome> {
        let Some(index) = self.remaining.checked_sub(1) else {
            return Box::pin(async { Err(HttpError::no_handler()) });
        };
        let stage = Arc::clone(&self.stages[index]);
        let next = Next { stages: self.stages, remaining: index };
        Box::pin(async move { stage.process(req, next).await })
    }

    /// Number of stages still below the current one.
    pub fn remaining(&self) -> usize { self.remaining }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// An ordered, shareable stack of stages.
#[derive(Clone)]
pub struct Dispatcher {
    stages: Chain,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { stages: Arc::from(Vec::new()) }
    }

    /// Appends `stage`. It will run before, and around, every stage added
    /// so far.
    pub fn add(self, stage: impl Stage) -> Self {
        self.add_shared(Arc::new(stage))
    }

    pub fn add_shared(self, stage: Arc<dyn Stage>) -> Self {
        let mut stages = self.stages.to_vec();
        stages.push(stage);
        Self { stages: stages.into() }
    }

    pub fn len(&self) -> usize { self.stages.len() }
    pub fn is_empty(&self) -> bool { self.stages.is_empty() }

    /// Runs `req` through the whole stack, outermost stage first.
    pub async fn handle(&self, req: Request) -> Outcome {
        Next { stages: Arc::clone(&self.stages), remaining: self.stages.len() }
            .run(req)
            .await
    }
}

impl Default for Dispatcher {
    fn default() -> Self { Self::new() }
}

// ── Closures as stages ────────────────────────────────────────────────────────

/// Wraps an async closure as a [`Stage`].
///
/// ```rust
/// use sluice::middleware::{Dispatcher, stage_fn};
///
/// let dispatcher = Dispatcher::new().add(stage_fn(|req, next| async move {
///     let res = next.run(req).await?;
///     Ok(res.with_header("X-Served-By", "sluice"))
/// }));
/// ```
pub fn stage_fn<F, Fut>(f: F) -> FnStage<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    FnStage(f)
}

/// See [`stage_fn`].
pub struct FnStage<F>(F);

impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        Box::pin((self.0)(req, next))
    }
}

#[cfg(test)]
mod tests {
    use http::{StatusCode, Uri};

    use super::*;
    use crate::error::NO_HANDLER;
    use crate::method::Method;
    use crate::response::Response;

    fn get(path: &'static str) -> Request {
        Request::new(Method::Get, Uri::from_static(path))
    }

    /// Delegates, then appends its tag to the body and an `X-Fake` header.
    fn tagging(tag: &'static str) -> impl Stage {
        stage_fn(move |req, next: Next| async move {
            let res = next.run(req).await?;
            let body = [res.body().as_ref(), tag.as_bytes()].concat();
            Ok(res.with_body(body).with_added_header("X-Fake", tag))
        })
    }

    fn terminal(body: &'static str) -> impl Stage {
        stage_fn(move |_req, _next| async move { Ok(Response::text(body)) })
    }

    #[tokio::test]
    async fn empty_dispatcher_has_no_handler() {
        let err = Dispatcher::new().handle(get("/")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), NO_HANDLER);
    }

    #[tokio::test]
    async fn last_added_runs_outermost() {
        let dispatcher = Dispatcher::new()
            .add(terminal("inner"))
            .add(tagging("1"))
            .add(tagging("2"))
            .add(tagging("3"));

        let res = dispatcher.handle(get("/")).await.unwrap();
        assert_eq!(res.body().as_ref(), b"inner123");
        assert_eq!(res.header_values("x-fake").collect::<Vec<_>>(), ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn stages_can_answer_without_delegating() {
        let dispatcher = Dispatcher::new()
            .add(terminal("never"))
            .add(stage_fn(|_req, _next| async { Ok(Response::status(StatusCode::NO_CONTENT)) }));
        let res = dispatcher.handle(get("/")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn delegating_past_the_end_fails() {
        let dispatcher = Dispatcher::new().add(tagging("only"));
        let err = dispatcher.handle(get("/")).await.unwrap_err();
        assert_eq!(err.message(), NO_HANDLER);
    }

    #[tokio::test]
    async fn errors_short_circuit_outward() {
        let dispatcher = Dispatcher::new()
            .add(stage_fn(|_req, _next| async { Err(HttpError::bad_request("nope")) }))
            .add(tagging("outer"));
        let err = dispatcher.handle(get("/")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stages_see_the_request_the_previous_stage_passed() {
        let dispatcher = Dispatcher::new()
            .add(stage_fn(|req: Request, _next| async move {
                Ok(Response::text(req.header("x-seen").unwrap_or("missing").to_owned()))
            }))
            .add(stage_fn(|req: Request, next: Next| async move {
                next.run(req.with_header("X-Seen", "yes")).await
            }));
        let res = dispatcher.handle(get("/")).await.unwrap();
        assert_eq!(res.body().as_ref(), b"yes");
    }

    #[tokio::test]
    async fn one_dispatcher_serves_concurrent_requests() {
        let dispatcher = Dispatcher::new()
            .add(stage_fn(|req: Request, _next| async move {
                tokio::task::yield_now().await;
                Ok(Response::text(req.path().to_owned()))
            }))
            .add(tagging("!"));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move {
                let path = format!("/req/{i}");
                let req = Request::new(Method::Get, path.parse().unwrap());
                let res = dispatcher.handle(req).await.unwrap();
                assert_eq!(res.body().as_ref(), format!("{path}!").as_bytes());
                assert_eq!(res.header_values("x-fake").count(), 1);
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
    }

    #[test]
    fn dispatcher_reports_its_size() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.is_empty());
        let dispatcher = dispatcher.add(terminal("x")).add(tagging("y"));
        assert_eq!(dispatcher.len(), 2);
    }
}
