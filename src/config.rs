//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall back
//! to the defaults listed on each field.

/// Default host the server binds to.
pub const DEFAULT_HOST: &str = "localhost";
/// Default port the server binds to.
pub const DEFAULT_PORT: u16 = 8080;
/// Default upgrade route.
pub const DEFAULT_PATH: &str = "/ws";
/// Default maximum size of one message (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;
/// Default maximum size of one frame (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (`WS_HOST`, default `localhost`).
    pub host: String,

    /// Port to bind (`WS_PORT`, default `8080`). `0` picks a free port.
    pub port: u16,

    /// Route that accepts upgrades (`WS_PATH`, default `/ws`).
    pub path: String,

    /// Largest accepted message in bytes (`WS_MAX_MESSAGE_SIZE`).
    pub max_message_size: usize,

    /// Largest accepted frame in bytes (`WS_MAX_FRAME_SIZE`).
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("WS_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let path = lookup("WS_PATH")
            .map(normalize_path)
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        Self {
            host,
            port: parse_value(lookup("WS_PORT"), DEFAULT_PORT),
            path,
            max_message_size: parse_value(lookup("WS_MAX_MESSAGE_SIZE"), DEFAULT_MAX_MESSAGE_SIZE),
            max_frame_size: parse_value(lookup("WS_MAX_FRAME_SIZE"), DEFAULT_MAX_FRAME_SIZE),
        }
    }
}

/// Parses `raw` as `T`, returning `default` on missing or invalid values.
fn parse_value<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Ensures the route starts with a single `/`.
fn normalize_path(raw: String) -> String {
    let trimmed = raw.trim().trim_start_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/ws");
    }

    #[test]
    fn reads_all_keys() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("WS_HOST", "0.0.0.0"),
            ("WS_PORT", "9001"),
            ("WS_PATH", "/socket"),
            ("WS_MAX_MESSAGE_SIZE", "1024"),
            ("WS_MAX_FRAME_SIZE", "512"),
        ]));
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9001);
        assert_eq!(config.path, "/socket");
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.max_frame_size, 512);
    }

    #[test]
    fn invalid_port_falls_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[("WS_PORT", "not-a-port")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn path_is_normalized() {
        let config = ServerConfig::from_lookup(lookup_from(&[("WS_PATH", "//live ")]));
        assert_eq!(config.path, "/live");
    }
}
