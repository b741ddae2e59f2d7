use std::time::Instant;

use tracing::info;

use super::{Next, Stage};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

/// One `info` event per request: method, path, status and latency.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Stage for Trace {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        let method = req.method();
        let path = req.path().to_owned();
        Box::pin(async move {
            let started = Instant::now();
            let result = next.run(req).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            match &result {
                Ok(res) => info!(
                    %method, %path, status = res.status_code().as_u16(), latency_ms, "request"
                ),
                Err(err) => info!(
                    %method, %path, status = err.status().as_u16(), latency_ms, error = %err, "request"
                ),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use http::{StatusCode, Uri};

    use super::*;
    use crate::error::HttpError;
    use crate::method::Method;
    use crate::middleware::{Dispatcher, stage_fn};
    use crate::response::Response;

    #[tokio::test]
    async fn results_pass_through_unchanged() {
        let d = Dispatcher::new()
            .add(stage_fn(|req: Request, _next| async move {
                match req.path() {
                    "/ok" => Ok(Response::text("fine")),
                    _     => Err(HttpError::not_found("gone")),
                }
            }))
            .add(Trace);

        let res = d.handle(Request::new(Method::Get, Uri::from_static("/ok"))).await.unwrap();
        assert_eq!(res.body().as_ref(), b"fine");

        let err = d.handle(Request::new(Method::Get, Uri::from_static("/x"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
