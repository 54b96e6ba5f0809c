//! Service configuration parsed from environment variables.
//!
//! Loaded once in `main` and handed to the components that need it; nothing
//! reads the environment after startup.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_WS_IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    MissingVar { var: &'static str },
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("unknown PRESENCE_STORE: {0} (expected 'postgres' or 'memory')")]
    UnknownBackend(String),
}

/// Where device records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreBackend,
    pub port: u16,
    pub db_max_connections: u32,
    /// Mark every device offline at boot.
    pub reset_on_startup: bool,
    /// Close a device socket that sends nothing for this long.
    pub ws_idle_timeout_secs: u64,
}

impl Config {
    /// Build config from the process environment.
    ///
    /// - `PRESENCE_STORE`: `postgres` (default) or `memory`
    /// - `DATABASE_URL`: required for `postgres`
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `PRESENCE_RESET_ON_STARTUP`: default true
    /// - `WS_IDLE_TIMEOUT_SECS`: default 60
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("PRESENCE_STORE").as_deref().unwrap_or("postgres") {
            "postgres" => {
                let database_url = lookup("DATABASE_URL")
                    .filter(|v| !v.is_empty())
                    .ok_or(ConfigError::MissingVar { var: "DATABASE_URL" })?;
                StoreBackend::Postgres { database_url }
            }
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let reset_on_startup = match lookup("PRESENCE_RESET_ON_STARTUP") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "PRESENCE_RESET_ON_STARTUP", value: raw })?,
            None => true,
        };

        Ok(Self {
            store,
            port,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            reset_on_startup,
            ws_idle_timeout_secs: parse_or(&lookup, "WS_IDLE_TIMEOUT_SECS", DEFAULT_WS_IDLE_TIMEOUT_SECS).max(1),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
