//! Relay configuration parsed from environment variables.
//!
//! All knobs are optional; defaults match a local development setup where
//! the drawing client is served from `http://localhost:3000`.

use std::time::Duration;

use uuid::Uuid;

use crate::event::EventKind;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 20;
pub const MAX_PING_SECS: u64 = 3600;
pub const DEFAULT_CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?} ({reason})")]
    Invalid { key: &'static str, value: String, reason: &'static str },
}

// =============================================================================
// ECHO POLICY
// =============================================================================

/// Whether a relayed event is delivered back to the connection that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoPolicy {
    #[default]
    IncludeSender,
    ExcludeSender,
}

impl EchoPolicy {
    /// The connection to skip when broadcasting an event from `sender`.
    #[must_use]
    pub fn excluded(self, sender: Uuid) -> Option<Uuid> {
        match self {
            Self::IncludeSender => None,
            Self::ExcludeSender => Some(sender),
        }
    }
}

/// One echo policy per relayed event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EchoPolicies {
    pub draw: EchoPolicy,
    pub cursor: EchoPolicy,
    pub clear: EchoPolicy,
}

impl EchoPolicies {
    #[must_use]
    pub fn for_kind(&self, kind: EventKind) -> EchoPolicy {
        match kind {
            EventKind::Draw => self.draw,
            EventKind::Cursor => self.cursor,
            EventKind::Clear => self.clear,
        }
    }
}

// =============================================================================
// ORIGINS
// =============================================================================

/// Browser origins allowed to open a relay socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Check an `Origin` header value against the allow-list.
    #[must_use]
    pub fn permits(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(list) => {
                let origin = normalize_origin(origin);
                list.iter().any(|allowed| allowed == origin)
            }
        }
    }
}

fn normalize_origin(raw: &str) -> &str {
    raw.trim().trim_end_matches('/')
}

// =============================================================================
// RELAY CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    pub allowed_origins: AllowedOrigins,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub client_queue_capacity: usize,
    pub echo: EchoPolicies,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: AllowedOrigins::List(vec![DEFAULT_ALLOWED_ORIGIN.to_owned()]),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            ping_timeout: Duration::from_secs(DEFAULT_PING_TIMEOUT_SECS),
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
            echo: EchoPolicies::default(),
        }
    }
}

impl RelayConfig {
    /// Build typed relay config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3001
    /// - `ALLOWED_ORIGINS`: comma-separated, `*` for any; default `http://localhost:3000`
    /// - `PING_INTERVAL_SECS`: default 25, at most 3600
    /// - `PING_TIMEOUT_SECS`: default 20, at most 3600
    /// - `CLIENT_QUEUE_CAPACITY`: default 256
    /// - `ECHO_DRAW`, `ECHO_CURSOR`, `ECHO_CLEAR`: `include` (default) or `exclude`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first variable that fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = parse_number(&lookup, "PORT", DEFAULT_PORT)?;
        let allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => AllowedOrigins::List(vec![DEFAULT_ALLOWED_ORIGIN.to_owned()]),
        };
        let ping_interval = parse_ping_secs(&lookup, "PING_INTERVAL_SECS", DEFAULT_PING_INTERVAL_SECS)?;
        let ping_timeout = parse_ping_secs(&lookup, "PING_TIMEOUT_SECS", DEFAULT_PING_TIMEOUT_SECS)?;
        let client_queue_capacity = parse_positive(&lookup, "CLIENT_QUEUE_CAPACITY", DEFAULT_CLIENT_QUEUE_CAPACITY)?;
        let echo = EchoPolicies {
            draw: parse_echo(&lookup, "ECHO_DRAW")?,
            cursor: parse_echo(&lookup, "ECHO_CURSOR")?,
            clear: parse_echo(&lookup, "ECHO_CLEAR")?,
        };

        Ok(Self {
            port,
            allowed_origins,
            ping_interval: Duration::from_secs(ping_interval),
            ping_timeout: Duration::from_secs(ping_timeout),
            client_queue_capacity,
            echo,
        })
    }

    /// Silence after which a socket is considered dead.
    #[must_use]
    pub fn idle_limit(&self) -> Duration {
        self.ping_interval.saturating_add(self.ping_timeout)
    }
}

fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value: raw, reason: "not a number" })
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value = parse_number(lookup, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid { key, value: "0".into(), reason: "must be greater than zero" });
    }
    Ok(value)
}

fn parse_ping_secs(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    let secs = parse_positive(lookup, key, default)?;
    if secs > MAX_PING_SECS {
        return Err(ConfigError::Invalid { key, value: secs.to_string(), reason: "must be at most 3600 seconds" });
    }
    Ok(secs)
}

fn parse_echo(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<EchoPolicy, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(EchoPolicy::default());
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "include" => Ok(EchoPolicy::IncludeSender),
        "exclude" => Ok(EchoPolicy::ExcludeSender),
        _ => Err(ConfigError::Invalid { key, value: raw, reason: "expected 'include' or 'exclude'" }),
    }
}

fn parse_origins(raw: &str) -> Result<AllowedOrigins, ConfigError> {
    let entries: Vec<&str> = raw
        .split(',')
        .map(normalize_origin)
        .filter(|entry| !entry.is_empty())
        .collect();

    if entries.is_empty() {
        return Err(ConfigError::Invalid { key: "ALLOWED_ORIGINS", value: raw.to_owned(), reason: "empty list" });
    }
    if entries.contains(&"*") {
        return Ok(AllowedOrigins::Any);
    }

    let mut origins = Vec::with_capacity(entries.len());
    for entry in entries {
        let has_scheme = entry.starts_with("http://") || entry.starts_with("https://");
        if !has_scheme || entry.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                key: "ALLOWED_ORIGINS",
                value: entry.to_owned(),
                reason: "origin must be an http(s) scheme and host",
            });
        }
        origins.push(entry.to_owned());
    }
    Ok(AllowedOrigins::List(origins))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
