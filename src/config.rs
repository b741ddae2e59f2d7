//! Application configuration.
//!
//! Configuration is a plain value handed to whatever needs it. Nothing in
//! the crate reads the environment behind the caller's back.
//!
//! | Key                   | Default        |
//! |-----------------------|----------------|
//! | `APP_NAME`            | `My App`       |
//! | `APP_SECRET`          | required       |
//! | `APP_BIND`            | `0.0.0.0:3000` |
//! | `JWT_VALID_SECONDS`   | `1440`         |
//! | `LOG_LEVEL`           | `info`         |
//! | `RATE_LIMIT_REQUESTS` | `100`          |
//! | `RATE_LIMIT_PERIOD`   | `60`           |

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::Error;

pub const DEFAULT_APP_NAME: &str = "My App";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_TOKEN_VALID_SECONDS: u64 = 1440;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Everything the standard stack needs to run.
#[derive(Clone)]
pub struct Config {
    pub app_name: String,
    /// Token signing secret. Never printed.
    pub app_secret: String,
    pub bind_addr: SocketAddr,
    pub token_valid_seconds: u64,
    pub log_level: String,
    /// Include failure details in error responses.
    pub debug: bool,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

/// Fixed-window rate limit parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateLimitConfig {
    /// Requests accepted per window and client.
    pub requests: u64,
    /// Window length in seconds.
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests: 100, period_secs: 60 }
    }
}

/// Which paths the auth gate protects and where it looks for tokens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthConfig {
    /// Paths under this prefix require a token. Matching ignores case and
    /// extra slashes, the same way routing does.
    pub base_path: String,
    /// Paths under the prefix that stay open.
    pub exempt: Vec<String>,
    /// Cookie consulted when there is no `Authorization` header.
    pub cookie: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_path: "/api/".to_owned(),
            exempt: vec!["/api/v1/login".to_owned()],
            cookie: "token".to_owned(),
        }
    }
}

impl Config {
    /// Defaults everywhere except the secret.
    pub fn new(app_secret: impl Into<String>) -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_owned(),
            app_secret: app_secret.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            token_valid_seconds: DEFAULT_TOKEN_VALID_SECONDS,
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            debug: false,
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads a `.env` style file. Variables already set in the process
    /// environment win over the file.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let file = parse_env_file(&contents);
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Reads every key through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let app_secret = get("APP_SECRET")
            .ok_or_else(|| Error::config("APP_SECRET", "must be set to a non-empty value"))?;

        let bind_addr = get("APP_BIND").unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind_addr = bind_addr
            .parse()
            .map_err(|e| Error::config("APP_BIND", format!("`{bind_addr}`: {e}")))?;

        let log_level = match get("LOG_LEVEL").map(|l| l.to_ascii_lowercase()) {
            None => DEFAULT_LOG_LEVEL.to_owned(),
            Some(level) if level == "warning" => "warn".to_owned(),
            Some(level) if LOG_LEVELS.contains(&level.as_str()) => level,
            Some(level) => {
                return Err(Error::config("LOG_LEVEL", format!("unknown level `{level}`")));
            }
        };

        let mut config = Self::new(app_secret);
        config.app_name = get("APP_NAME").unwrap_or(config.app_name);
        config.bind_addr = bind_addr;
        config.debug = log_level == "debug" || log_level == "trace";
        config.log_level = log_level;
        config.token_valid_seconds =
            number(&get, "JWT_VALID_SECONDS")?.unwrap_or(config.token_valid_seconds);
        config.rate_limit.requests =
            number(&get, "RATE_LIMIT_REQUESTS")?.unwrap_or(config.rate_limit.requests);
        config.rate_limit.period_secs =
            number(&get, "RATE_LIMIT_PERIOD")?.unwrap_or(config.rate_limit.period_secs);

        if config.rate_limit.period_secs == 0 {
            return Err(Error::config("RATE_LIMIT_PERIOD", "must be at least one second"));
        }
        Ok(config)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_name", &self.app_name)
            .field("app_secret", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .field("token_valid_seconds", &self.token_valid_seconds)
            .field("log_level", &self.log_level)
            .field("debug", &self.debug)
            .field("rate_limit", &self.rate_limit)
            .field("auth", &self.auth)
            .finish()
    }
}

fn number(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<u64>, Error> {
    get(key)
        .map(|raw| raw.parse().map_err(|e| Error::config(key, format!("`{raw}`: {e}"))))
        .transpose()
}

/// `KEY=VALUE` lines; blank lines and `#` comments are skipped, an
/// `export ` prefix is allowed and matching outer quotes are stripped.
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_owned(), unquote(value.trim()).to_owned()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}
