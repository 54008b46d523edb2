//! Application configuration loaded from environment variables.

/// Value of `LEDGER_DATABASE_URL` that selects the in-memory store.
pub const MEMORY_URL: &str = "memory";

const DEFAULT_DATABASE_URL: &str = "sqlite://ledger.db";

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Where the ledger keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Nothing survives the process.
    Memory,
    /// A SQLite database URL such as `sqlite://ledger.db`.
    Sqlite(String),
}

/// Ledger configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `LEDGER_DATABASE_URL`: SQLite URL, or `memory` (default: `"sqlite://ledger.db"`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LEDGER_LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `LEDGER_SEED_DEFAULTS`: seed default payment terms on startup (default: `true`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub seed_defaults: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            database_url: lookup("LEDGER_DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.database_url),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LEDGER_LOG_FORMAT")
                .and_then(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            seed_defaults: lookup("LEDGER_SEED_DEFAULTS")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.seed_defaults),
        }
    }

    /// Returns the store selected by `database_url`.
    pub fn store_location(&self) -> StoreLocation {
        if self.database_url.trim().eq_ignore_ascii_case(MEMORY_URL) {
            StoreLocation::Memory
        } else {
            StoreLocation::Sqlite(self.database_url.clone())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            seed_defaults: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.database_url, "sqlite://ledger.db");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.seed_defaults);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn test_values_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("LEDGER_DATABASE_URL", "sqlite:///var/lib/shop.db"),
            ("RUST_LOG", "ledger=debug"),
            ("LEDGER_LOG_FORMAT", "JSON"),
            ("LEDGER_SEED_DEFAULTS", "off"),
        ]));
        assert_eq!(config.database_url, "sqlite:///var/lib/shop.db");
        assert_eq!(config.log_level, "ledger=debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.seed_defaults);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("LEDGER_DATABASE_URL", "  "),
            ("LEDGER_LOG_FORMAT", "xml"),
            ("LEDGER_SEED_DEFAULTS", "maybe"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_store_location() {
        let memory = Config {
            database_url: "Memory".to_string(),
            ..Config::default()
        };
        assert_eq!(memory.store_location(), StoreLocation::Memory);
        assert_eq!(
            Config::default().store_location(),
            StoreLocation::Sqlite("sqlite://ledger.db".to_string())
        );
    }
}
