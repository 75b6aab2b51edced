//! Server configuration module.
//!
//! Parses configuration from environment variables for the TodoLists server.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PORT` | No | 8080 | HTTP server port |
//! | `TODOLISTS_SESSION_TTL_SECS` | No | 86400 | Idle lifetime of a session |
//! | `TODOLISTS_MAX_SESSIONS` | No | 10000 | Maximum number of live sessions |
//! | `TODOLISTS_SECURE_COOKIE` | No | false | Mark the session cookie `Secure` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::session::{SessionStoreConfig, DEFAULT_MAX_CAPACITY, DEFAULT_TTL_SECS};

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,

    /// Idle time after which a session is discarded.
    pub session_ttl: Duration,

    /// Maximum number of live sessions.
    pub max_sessions: usize,

    /// When true, the session cookie is only sent over HTTPS.
    pub secure_cookie: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            session_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_sessions: DEFAULT_MAX_CAPACITY,
            secure_cookie: false,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - A numeric variable does not parse
    /// - The session TTL or the session capacity is zero
    ///
    /// # Example
    ///
    /// ```no_run
    /// use todolists_server::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Server will listen on port {}", config.port);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_env("PORT", DEFAULT_PORT)?;
        let ttl_secs = parse_env("TODOLISTS_SESSION_TTL_SECS", DEFAULT_TTL_SECS)?;
        let max_sessions = parse_env("TODOLISTS_MAX_SESSIONS", DEFAULT_MAX_CAPACITY)?;
        let secure_cookie = parse_bool_env("TODOLISTS_SECURE_COOKIE");

        let config = Self {
            port,
            session_ttl: Duration::from_secs(ttl_secs),
            max_sessions,
            secure_cookie,
        };

        config.validate()?;

        if !config.secure_cookie {
            warn!("TODOLISTS_SECURE_COOKIE is off - session cookies will be sent over plain HTTP");
        }

        Ok(config)
    }

    /// Settings for the session store derived from this configuration.
    pub fn session_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig::new(self.max_sessions, self.session_ttl, self.secure_cookie)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl.is_zero() {
            return Err(ConfigError::ValidationError(
                "TODOLISTS_SESSION_TTL_SECS must be greater than zero".to_string(),
            ));
        }

        if self.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "TODOLISTS_MAX_SESSIONS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a boolean environment variable.
///
/// Returns `true` if the variable is set to "true" (case-insensitive),
/// `false` otherwise.
fn parse_bool_env(name: &str) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Parse a numeric environment variable, falling back to `default` when unset.
fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::invalid_format(name, err.to_string())),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => {
            Err(ConfigError::invalid_format(name, "contains invalid unicode"))
        }
    }
}
