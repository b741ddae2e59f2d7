//! Terminal stage: resolves the path to an action and runs it.

use std::sync::Arc;

use tracing::debug;

use super::{Next, Stage};
use crate::error::HttpError;
use crate::handler::{BoxFuture, Outcome};
use crate::method::Method;
use crate::request::Request;
use crate::router::{Resolver, handler_name};

pub const PAGE_NOT_FOUND: &str = "Page does not exist";

/// Maps the request path to a handler identifier, asks the resolver for
/// the action and calls the capability matching the method.
///
/// Always the innermost stage; it never delegates.
pub struct Route {
    resolver: Arc<dyn Resolver>,
}

impl Route {
    pub fn new(resolver: impl Resolver) -> Self {
        Self::shared(Arc::new(resolver))
    }

    pub fn shared(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

impl Stage for Route {
    fn process(&self, req: Request, _next: Next) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            let name = handler_name(req.path());
            if !self.resolver.has(&name) {
                debug!(path = req.path(), handler = %name, "no such handler");
                return Err(HttpError::not_found(PAGE_NOT_FOUND));
            }
            let action = self.resolver
                .resolve(&name)
                .ok_or_else(|| HttpError::not_found(PAGE_NOT_FOUND))?;

            let method = req.method();
            let handler = match method {
                Method::Get  => action.get_handler(),
                Method::Post => action.post_handler(),
                Method::Connect
                | Method::Delete
                | Method::Head
                | Method::Options
                | Method::Patch
                | Method::Put
                | Method::Trace => None,
            };
            match handler {
                Some(handler) => handler.call(req).await,
                None => Err(HttpError::method_not_allowed(format!("{method} not allowed"))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use http::{StatusCode, Uri};

    use super::*;
    use crate::handler::Action;
    use crate::middleware::{Dispatcher, stage_fn};
    use crate::response::Response;
    use crate::router::Router;

    async fn index(_req: Request) -> Outcome<&'static str> {
        Ok("index")
    }

    async fn login_form(_req: Request) -> Outcome<&'static str> {
        Ok("form")
    }

    async fn login(_req: Request) -> Outcome<&'static str> {
        Ok("logged in")
    }

    fn dispatcher() -> Dispatcher {
        let router = Router::new()
            .route("/", Action::new().get(index))
            .route("/api/v1/login", Action::new().get(login_form).post(login))
            .route("/submit-only", Action::new().post(login));
        Dispatcher::new().add(Route::new(router))
    }

    fn request(method: Method, path: &'static str) -> Request {
        Request::new(method, Uri::from_static(path))
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let err = dispatcher().handle(request(Method::Get, "/missing")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), PAGE_NOT_FOUND);
    }

    #[tokio::test]
    async fn methods_pick_their_capability() {
        let d = dispatcher();
        let res = d.handle(request(Method::Get, "/")).await.unwrap();
        assert_eq!(res.body().as_ref(), b"index");
        let res = d.handle(request(Method::Get, "/api/v1/login")).await.unwrap();
        assert_eq!(res.body().as_ref(), b"form");
        let res = d.handle(request(Method::Post, "/api/v1/login")).await.unwrap();
        assert_eq!(res.body().as_ref(), b"logged in");
    }

    #[tokio::test]
    async fn path_variants_reach_the_same_action() {
        let d = dispatcher();
        for path in ["/API/V1/LOGIN", "/api//v1/login/", "//api/v1/login"] {
            let req = Request::new(Method::Get, path.parse().unwrap());
            let res = d.handle(req).await.unwrap();
            assert_eq!(res.body().as_ref(), b"form", "{path}");
        }
    }

    #[tokio::test]
    async fn missing_capabilities_are_not_allowed() {
        let d = dispatcher();
        let err = d.handle(request(Method::Put, "/")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.message(), "PUT not allowed");

        let err = d.handle(request(Method::Get, "/submit-only")).await.unwrap_err();
        assert_eq!(err.message(), "GET not allowed");
    }

    #[tokio::test]
    async fn route_never_delegates() {
        let d = Dispatcher::new()
            .add(stage_fn(|_req, _next| async { Ok(Response::text("below")) }))
            .add(Route::new(Router::new().route("/", Action::new().get(index))));
        let res = d.handle(request(Method::Get, "/")).await.unwrap();
        assert_eq!(res.body().as_ref(), b"index");
    }

    #[tokio::test]
    async fn action_errors_pass_through() {
        async fn failing(_req: Request) -> Outcome {
            Err(HttpError::bad_request("bad input"))
        }
        let d = Dispatcher::new().add(Route::new(Router::new().route("/", Action::new().get(failing))));
        let err = d.handle(request(Method::Get, "/")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
