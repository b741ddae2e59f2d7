//! The standard stack.

use std::sync::Arc;

use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::middleware::{Auth, Dispatcher, ParseBody, Profile, RateLimit, Recover, Route, Trace};
use crate::router::Resolver;
use crate::store::{CounterStore, SharedStore};
use crate::token::TokenCodec;

/// Wires configuration, token codec and counter store into the default
/// pipeline.
///
/// Stages are added innermost first, so requests run through them as
///
/// ```text
/// Recover → Trace → Profile → RateLimit → Auth → ParseBody → Route
/// ```
///
/// ```rust
/// use sluice::{Action, App, Config, Outcome, Request, Response, Router};
///
/// async fn index(_req: Request) -> Outcome {
///     Ok(Response::html("Hello World"))
/// }
///
/// let app = App::new(Config::new("secret"));
/// let dispatcher = app.dispatcher(Router::new().route("/", Action::new().get(index)));
/// assert_eq!(dispatcher.len(), 7);
/// ```
pub struct App {
    config: Config,
    clock: SharedClock,
    codec: Arc<TokenCodec>,
    store: Arc<dyn CounterStore>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Every time-dependent part of the stack reads `clock`.
    pub fn with_clock(config: Config, clock: SharedClock) -> Self {
        let codec = Arc::new(TokenCodec::with_clock(config.app_secret.as_bytes(), Arc::clone(&clock)));
        let store = Arc::new(SharedStore::with_clock(Arc::clone(&clock)).namespace("rate-limit"));
        Self { config, clock, codec, store }
    }

    /// Replaces the default in-process counter store.
    pub fn with_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &Config { &self.config }
    pub fn clock(&self) -> &SharedClock { &self.clock }

    /// The codec the auth gate verifies with; actions issue tokens with it.
    pub fn codec(&self) -> Arc<TokenCodec> { Arc::clone(&self.codec) }

    pub fn store(&self) -> Arc<dyn CounterStore> { Arc::clone(&self.store) }

    pub fn dispatcher(&self, resolver: impl Resolver) -> Dispatcher {
        let rate_limit = RateLimit::new(self.store(), self.config.rate_limit)
            .with_clock(Arc::clone(&self.clock));

        Dispatcher::new()
            .add(Route::new(resolver))
            .add(ParseBody::new())
            .add(Auth::new(self.codec(), self.config.auth.clone()))
            .add(rate_limit)
            .add(Profile)
            .add(Trace)
            .add(Recover::new(self.config.debug))
    }
}
