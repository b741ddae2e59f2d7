//! Minimal sluice example: a public page, a login endpoint that hands out
//! tokens, and an endpoint only logged-in users can reach.
//!
//! Run with:
//!   APP_SECRET=change-me RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl -X POST http://localhost:3000/api/v1/login \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"foo@example.com","password":"password"}'
//!   curl http://localhost:3000/api/v1/hello -H "authorization: Bearer $TOKEN"

use std::sync::Arc;

use serde_json::json;
use sluice::middleware::auth;
use sluice::{Action, App, Config, HttpError, Outcome, Request, Response, Router, Server, TokenCodec};
use tracing_subscriber::EnvFilter;

const USER: &str = "foo@example.com";
const PASSWORD: &str = "password";
const USER_ID: u64 = 123;

#[tokio::main]
async fn main() -> Result<(), sluice::Error> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    let app = App::new(config.clone());
    let codec = app.codec();
    let valid_for = config.token_valid_seconds;

    let routes = Router::new()
        .route("/", Action::new().get(index))
        .route("/api/v1/login", Action::new().post(move |req: Request| login(Arc::clone(&codec), valid_for, req)))
        .route("/api/v1/hello", Action::new().get(hello));

    Server::new(config.bind_addr)
        .debug(config.debug)
        .serve(app.dispatcher(routes))
        .await
}

// GET /
async fn index(_req: Request) -> Outcome {
    Ok(Response::html("Hello World"))
}

// POST /api/v1/login
//
// JSON or form body with `username` and `password`.
async fn login(codec: Arc<TokenCodec>, valid_for: u64, req: Request) -> Outcome {
    let username = req.body_str("username", "");
    let password = req.body_str("password", "");
    if username != USER || password != PASSWORD {
        return Err(HttpError::unauthorized("Invalid username or password"));
    }

    let (token, claims) = codec
        .issue(USER_ID, req.host(), valid_for)
        .map_err(|e| HttpError::internal("Could not issue token").with_source(e))?;
    Response::json_value(&json!({ "token": token, "expires": claims.exp }))
}

// GET /api/v1/hello, behind the auth gate.
async fn hello(req: Request) -> Outcome {
    let user_id = auth::user_id(&req).unwrap_or_default();
    Response::json_value(&json!({ "hello": "world", "user_id": user_id }))
}
