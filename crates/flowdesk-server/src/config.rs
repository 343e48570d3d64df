//! Server configuration read from `FLOWDESK_*` environment variables.
//!
//! Every setting has a default. A value that is present but does not parse
//! is logged and replaced by the default, so a typo never stops the server.

use std::str::FromStr;

use flowdesk_core::history::DEFAULT_HISTORY_LIMIT;
use flowdesk_view::runtime::DEFAULT_LABEL_MAX;
use flowdesk_view::style::Theme;

pub const DEFAULT_DB_PATH: &str = "flowdesk.db";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_VIEWPORT_DEBOUNCE_MS: i64 = 250;

/// Settings that shape one canvas session.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasConfig {
    pub history_limit: usize,
    pub label_max: usize,
    pub viewport_debounce_ms: i64,
    pub theme: Theme,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig {
            history_limit: DEFAULT_HISTORY_LIMIT,
            label_max: DEFAULT_LABEL_MAX,
            viewport_debounce_ms: DEFAULT_VIEWPORT_DEBOUNCE_MS,
            theme: Theme::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// SQLite database file (`FLOWDESK_DB_PATH`).
    pub db_path: String,
    /// Listen port (`FLOWDESK_PORT`).
    pub port: u16,
    /// `FLOWDESK_HISTORY_LIMIT`, `FLOWDESK_LABEL_MAX` and
    /// `FLOWDESK_VIEWPORT_DEBOUNCE_MS`.
    pub canvas: CanvasConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: DEFAULT_DB_PATH.to_string(),
            port: DEFAULT_PORT,
            canvas: CanvasConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        ServerConfig {
            db_path: lookup("FLOWDESK_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.db_path),
            port: parse_or(&lookup, "FLOWDESK_PORT", defaults.port, |_| true),
            canvas: CanvasConfig {
                history_limit: parse_or(
                    &lookup,
                    "FLOWDESK_HISTORY_LIMIT",
                    defaults.canvas.history_limit,
                    |v| *v > 0,
                ),
                label_max: parse_or(&lookup, "FLOWDESK_LABEL_MAX", defaults.canvas.label_max, |v| {
                    *v > 0
                }),
                viewport_debounce_ms: parse_or(
                    &lookup,
                    "FLOWDESK_VIEWPORT_DEBOUNCE_MS",
                    defaults.canvas.viewport_debounce_ms,
                    |v| *v >= 0,
                ),
                theme: defaults.canvas.theme,
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, fallback = %default, "ignoring invalid setting");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(ServerConfig::from_lookup(lookup(&[])), ServerConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("FLOWDESK_DB_PATH", "/tmp/x.db"),
            ("FLOWDESK_PORT", "8080"),
            ("FLOWDESK_HISTORY_LIMIT", "5"),
            ("FLOWDESK_LABEL_MAX", "12"),
            ("FLOWDESK_VIEWPORT_DEBOUNCE_MS", "0"),
        ]));
        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.canvas.history_limit, 5);
        assert_eq!(config.canvas.label_max, 12);
        assert_eq!(config.canvas.viewport_debounce_ms, 0);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("FLOWDESK_PORT", "eighty"),
            ("FLOWDESK_HISTORY_LIMIT", "0"),
            ("FLOWDESK_LABEL_MAX", "-3"),
            ("FLOWDESK_VIEWPORT_DEBOUNCE_MS", "-1"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.canvas.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.canvas.label_max, DEFAULT_LABEL_MAX);
        assert_eq!(config.canvas.viewport_debounce_ms, DEFAULT_VIEWPORT_DEBOUNCE_MS);
    }
}
