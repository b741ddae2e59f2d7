//! Action handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds actions of *different* handler types in a single
//! `HashMap<String, Action>`. Rust collections can only hold one concrete
//! type, so each handler is hidden behind a trait object
//! (`dyn ErasedHandler`) and stored uniformly.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn hello(req: Request) -> Outcome { … }    ← user writes this
//!        ↓ Action::new().get(hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req).await.map(into_response) })  ← BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HttpError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// What every action and stage resolves to.
pub type Outcome<T = Response> = Result<T, HttpError>;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send` lets
/// tokio move it across worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid action handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, HttpError>
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<R>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<R>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype wrapper that bridges a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<R>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

// ── Action ────────────────────────────────────────────────────────────────────

/// The object a handler identifier resolves to.
///
/// An action advertises which methods it can handle by which capabilities
/// it carries. A method without a capability is answered with
/// `405 Method Not Allowed`.
#[derive(Clone, Default)]
pub struct Action {
    get: Option<BoxedHandler>,
    post: Option<BoxedHandler>,
}

impl Action {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(mut self, handler: impl Handler) -> Self {
        self.get = Some(handler.into_boxed_handler());
        self
    }

    pub fn post(mut self, handler: impl Handler) -> Self {
        self.post = Some(handler.into_boxed_handler());
        self
    }

    pub(crate) fn get_handler(&self) -> Option<&BoxedHandler> { self.get.as_ref() }
    pub(crate) fn post_handler(&self) -> Option<&BoxedHandler> { self.post.as_ref() }
}
