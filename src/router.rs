//! Convention-based routing.
//!
//! There is no route table to declare. A path is turned into a handler
//! identifier by a fixed naming convention, and the identifier is looked up
//! in a [`Resolver`]:
//!
//! ```text
//! /                 →  actions::IndexAction
//! /api/v1/login     →  actions::Api::V1::LoginAction
//! /foo/bar-baz      →  actions::Foo::BarBazAction
//! ```

use std::collections::HashMap;

use crate::handler::Action;

/// Prefix of every handler identifier.
pub const BASE_NAME: &str = "actions::";

/// Separator between path segments in a handler identifier.
pub const SEPARATOR: &str = "::";

/// Suffix of every handler identifier.
pub const SUFFIX: &str = "Action";

/// Maps a URL path to its canonical handler identifier.
///
/// Leading and trailing slashes are ignored, an empty path means `index`,
/// and runs of slashes count as a single separator. Each segment is
/// lower-cased, then every hyphen-delimited part gets an upper-case first
/// letter and the parts are joined without the hyphen.
pub fn handler_name(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let trimmed = if trimmed.is_empty() { "index" } else { trimmed };

    let segments: Vec<String> = trimmed
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment.to_lowercase()
                .split('-')
                .map(capitalise)
                .collect::<String>()
        })
        .collect();

    format!("{BASE_NAME}{}{SUFFIX}", segments.join(SEPARATOR))
}

fn capitalise(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Resolver ──────────────────────────────────────────────────────────────────

/// Looks up the action behind a handler identifier.
pub trait Resolver: Send + Sync + 'static {
    fn has(&self, name: &str) -> bool;
    fn resolve(&self, name: &str) -> Option<Action>;
}

/// The in-crate [`Resolver`]: a map from handler identifier to [`Action`].
///
/// Build it once at startup; each registration returns `self` so calls
/// chain naturally.
///
/// ```rust
/// use sluice::{Action, Outcome, Request, Response, Router};
///
/// async fn index(_req: Request) -> Outcome {
///     Ok(Response::html("Hello World"))
/// }
///
/// let router = Router::new().route("/", Action::new().get(index));
/// ```
#[derive(Default)]
pub struct Router {
    actions: HashMap<String, Action>,
}

impl Router {
    pub fn new() -> Self {
        Self { actions: HashMap::new() }
    }

    /// Registers an action under an explicit identifier.
    pub fn action(mut self, name: impl Into<String>, action: Action) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Registers an action under the identifier `path` maps to.
    pub fn route(self, path: &str, action: Action) -> Self {
        self.action(handler_name(path), action)
    }
}

impl Resolver for Router {
    fn has(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    fn resolve(&self, name: &str) -> Option<Action> {
        self.actions.get(name).cloned()
    }
}
