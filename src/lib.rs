//! # sluice
//!
//! A small HTTP application core built from one idea: every request flows
//! through a stack of middleware stages and comes back out as a response.
//!
//! ## The pipeline
//!
//! - A last-in-first-out [`Dispatcher`]: the stage added last runs first
//!   and wraps everything added before it.
//! - Convention routing: `/api/v1/login` names the handler
//!   `actions::Api::V1::LoginAction`, looked up in a [`Resolver`].
//! - A bearer-token gate over everything under `/api/`, with a cookie
//!   fallback.
//! - A fixed-window rate limiter over a pluggable [`CounterStore`](store::CounterStore).
//!
//! Around that sit body parsing, timing, tracing and an outermost stage
//! that renders every failure as JSON or HTML depending on the client.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sluice::{Action, App, Config, Outcome, Request, Response, Router, Server};
//! use sluice::middleware::auth;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sluice::Error> {
//!     let config = Config::from_env()?;
//!     let app = App::new(config.clone());
//!
//!     let routes = Router::new()
//!         .route("/",             Action::new().get(index))
//!         .route("/api/v1/hello", Action::new().get(hello));
//!
//!     Server::new(config.bind_addr)
//!         .debug(config.debug)
//!         .serve(app.dispatcher(routes))
//!         .await
//! }
//!
//! async fn index(_req: Request) -> Outcome {
//!     Ok(Response::html("Hello World"))
//! }
//!
//! async fn hello(req: Request) -> Outcome {
//!     let user = auth::user_id(&req).unwrap_or_default();
//!     Response::json_value(&serde_json::json!({ "hello": "world", "user_id": user }))
//! }
//! ```

mod app;
mod error;
mod handler;
mod method;
mod negotiate;
mod request;
mod response;
mod router;
mod server;

pub mod clock;
pub mod config;
pub mod middleware;
pub mod signer;
pub mod store;
pub mod token;

pub use app::App;
pub use config::Config;
pub use error::{Error, HttpError};
pub use handler::{Action, BoxFuture, Handler, Outcome};
pub use method::Method;
pub use middleware::{Dispatcher, Next, Stage};
pub use negotiate::MediaKind;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{Resolver, Router, handler_name};
pub use server::{Server, shutdown_signal};
pub use signer::UriSigner;
pub use token::{Claims, TokenCodec, TokenError};
