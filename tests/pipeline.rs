//! The standard stack end to end: login, token-gated endpoints, error
//! rendering and rate limiting, all through one dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;

use http::{StatusCode, Uri};
use serde_json::{Value, json};
use sluice::clock::ManualClock;
use sluice::config::RateLimitConfig;
use sluice::middleware::auth;
use sluice::{
    Action, App, Config, Dispatcher, HttpError, Method, Outcome, Request, Response, Router, TokenCodec,
};

const NOW: u64 = 1_700_000_000;

struct Harness {
    clock: Arc<ManualClock>,
    dispatcher: Dispatcher,
}

fn harness(requests: u64) -> Harness {
    let mut config = Config::new("integration-secret");
    config.token_valid_seconds = 300;
    config.rate_limit = RateLimitConfig { requests, period_secs: 60 };

    let clock = Arc::new(ManualClock::new(NOW));
    let app = App::with_clock(config, clock.clone());
    let codec = app.codec();

    let routes = Router::new()
        .route("/", Action::new().get(index))
        .route("/api/v1/login", Action::new().post(move |req: Request| login(Arc::clone(&codec), req)))
        .route("/api/v1/hello", Action::new().get(hello));

    Harness { clock, dispatcher: app.dispatcher(routes) }
}

async fn index(_req: Request) -> Outcome {
    Ok(Response::html("Hello World"))
}

async fn login(codec: Arc<TokenCodec>, req: Request) -> Outcome {
    if req.body_str("username", "") != "foo@example.com" || req.body_str("password", "") != "password" {
        return Err(HttpError::unauthorized("Invalid username or password"));
    }
    let (token, claims) = codec
        .issue(123, req.host(), 300)
        .map_err(|e| HttpError::internal("Could not issue token").with_source(e))?;
    Response::json_value(&json!({ "token": token, "expires": claims.exp }))
}

async fn hello(req: Request) -> Outcome {
    Response::json_value(&json!({ "hello": "world", "user_id": auth::user_id(&req) }))
}

fn request(method: Method, path: &str) -> Request {
    let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
    Request::new(method, path.parse::<Uri>().unwrap())
        .with_remote_addr(peer)
        .with_header("Host", "localhost:3000")
}

fn json_body(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

impl Harness {
    async fn send(&self, req: Request) -> Response {
        // Recover is outermost, so the stack always answers.
        self.dispatcher.handle(req).await.unwrap()
    }

    async fn token(&self) -> String {
        let req = request(Method::Post, "/api/v1/login")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"username":"foo@example.com","password":"password"}"#);
        let res = self.send(req).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        json_body(&res)["token"].as_str().unwrap().to_owned()
    }
}

#[tokio::test]
async fn index_is_public_and_decorated() {
    let h = harness(100);
    let res = h.send(request(Method::Get, "/")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body().as_ref(), b"Hello World");
    assert!(res.header("x-profile-milliseconds").is_some());
    assert_eq!(res.header("x-ratelimit-limit"), Some("100"));
    assert_eq!(res.header("x-ratelimit-remaining"), Some("99"));
}

#[tokio::test]
async fn login_then_hello() {
    let h = harness(100);
    let token = h.token().await;

    let res = h
        .send(request(Method::Get, "/api/v1/hello").with_header("Authorization", &format!("Bearer {token}")))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(json_body(&res), json!({ "hello": "world", "user_id": 123 }));

    let res = h.send(request(Method::Get, "/api/v1/hello").with_cookie("token", &token)).await;
    assert_eq!(json_body(&res)["user_id"], 123);
}

#[tokio::test]
async fn issued_tokens_name_the_host_and_lifetime() {
    let h = harness(100);
    let req = request(Method::Post, "/api/v1/login")
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body("username=foo%40example.com&password=password");
    let res = h.send(req).await;
    let body = json_body(&res);
    assert_eq!(body["expires"], NOW + 300);

    let claims = TokenCodec::with_clock("integration-secret", h.clock.clone())
        .decode(body["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.iss, "localhost");
    assert_eq!(claims.sub, "123");
    assert_eq!(claims.iat, NOW);
}

#[tokio::test]
async fn bad_credentials_are_rejected_as_json() {
    let h = harness(100);
    let req = request(Method::Post, "/api/v1/login")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"username":"foo@example.com","password":"guess"}"#);
    let res = h.send(req).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&res), json!({ "error": "Invalid username or password", "code": 401 }));
}

#[tokio::test]
async fn protected_endpoints_need_a_valid_token() {
    let h = harness(100);
    let res = h.send(request(Method::Get, "/api/v1/hello").with_header("Accept", "application/json")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&res)["error"], "Not logged in");

    let token = h.token().await;
    h.clock.advance(300);
    let res = h
        .send(
            request(Method::Get, "/api/v1/hello")
                .with_header("Accept", "application/json")
                .with_header("Authorization", &format!("Bearer {token}")),
        )
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&res)["error"], "Not logged in");
}

#[tokio::test]
async fn path_spellings_do_not_skip_authentication() {
    let h = harness(100);
    for path in ["/API/V1/HELLO", "/Api/v1/hello", "//api/v1/hello", "/api/v1//hello/"] {
        let res = h.send(request(Method::Get, path).with_header("Accept", "application/json")).await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(json_body(&res)["error"], "Not logged in", "{path}");
    }

    let token = h.token().await;
    let res = h
        .send(request(Method::Get, "/API/V1/HELLO").with_header("Authorization", &format!("Bearer {token}")))
        .await;
    assert_eq!(json_body(&res)["user_id"], 123);
}

#[tokio::test]
async fn login_stays_open_under_any_spelling() {
    let h = harness(100);
    for path in ["/api/v1/login/", "/API/V1/Login", "//api/v1/login"] {
        let req = request(Method::Post, path)
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"username":"foo@example.com","password":"password"}"#);
        let res = h.send(req).await;
        assert_eq!(res.status_code(), StatusCode::OK, "{path}");
        assert!(json_body(&res)["token"].is_string(), "{path}");
    }
}

#[tokio::test]
async fn routing_failures_follow_the_client_format() {
    let h = harness(100);

    let res = h.send(request(Method::Get, "/no/such-page")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert!(res.header("content-type").unwrap().starts_with("text/html"));
    assert!(String::from_utf8_lossy(res.body()).contains("Page does not exist"));

    let res = h.send(request(Method::Put, "/").with_header("Accept", "application/json")).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(&res), json!({ "error": "PUT not allowed", "code": 405 }));
}

#[tokio::test]
async fn malformed_bodies_are_client_errors() {
    let h = harness(100);
    let req = request(Method::Post, "/api/v1/login")
        .with_header("Content-Type", "application/json")
        .with_body("{oops");
    let res = h.send(req).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&res)["error"], "Invalid JSON body");
}

#[tokio::test]
async fn clients_are_throttled_per_window() {
    let h = harness(3);
    for remaining in ["2", "1", "0"] {
        let res = h.send(request(Method::Get, "/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("x-ratelimit-remaining"), Some(remaining));
    }

    h.clock.advance(20);
    let res = h.send(request(Method::Get, "/").with_header("Accept", "application/json")).await;
    assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.header("retry-after"), Some("40"));
    assert_eq!(json_body(&res)["error"], "Rate limited: try again later");

    // Another client is unaffected.
    let other: SocketAddr = "198.51.100.7:1234".parse().unwrap();
    let res = h.send(request(Method::Get, "/").with_remote_addr(other)).await;
    assert_eq!(res.status_code(), StatusCode::OK);

    h.clock.advance(40);
    let res = h.send(request(Method::Get, "/")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.header("x-ratelimit-remaining"), Some("2"));
}

#[tokio::test]
async fn throttling_applies_before_authentication() {
    let h = harness(1);
    let res = h.send(request(Method::Get, "/api/v1/hello")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    let res = h.send(request(Method::Get, "/api/v1/hello")).await;
    assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
}
