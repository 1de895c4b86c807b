use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";
pub const DEFAULT_STORE_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_STORE_BACKOFF_MS: u64 = 100;
pub const DEFAULT_MAX_CAS_CONFLICTS: u32 = 8;

/// Runtime settings of the progress engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    /// Attempts per store call before a transient failure is surfaced.
    pub store_max_attempts: u32,
    /// First backoff delay; doubles on every further attempt.
    pub store_backoff_base: Duration,
    /// Lost compare-and-swap races tolerated per update.
    pub max_cas_conflicts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.into(),
            store_max_attempts: DEFAULT_STORE_MAX_ATTEMPTS,
            store_backoff_base: Duration::from_millis(DEFAULT_STORE_BACKOFF_MS),
            max_cas_conflicts: DEFAULT_MAX_CAS_CONFLICTS,
        }
    }
}

impl EngineConfig {
    /// Read `STUDY_*` variables, falling back to defaults for missing ones.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = match lookup("STUDY_DB_URL") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    key: "STUDY_DB_URL",
                    expected: "a non-empty database URL",
                    raw,
                });
            }
            Some(raw) => raw,
            None => defaults.database_url,
        };

        let store_max_attempts = positive(&lookup, "STUDY_STORE_MAX_ATTEMPTS")?
            .unwrap_or(defaults.store_max_attempts);

        let store_backoff_base = match lookup("STUDY_STORE_BACKOFF_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid {
                    key: "STUDY_STORE_BACKOFF_MS",
                    expected: "a number of milliseconds",
                    raw,
                })?,
            None => defaults.store_backoff_base,
        };

        let max_cas_conflicts = match lookup("STUDY_MAX_CAS_CONFLICTS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::Invalid {
                    key: "STUDY_MAX_CAS_CONFLICTS",
                    expected: "a non-negative integer",
                    raw,
                })?,
            None => defaults.max_cas_conflicts,
        };

        Ok(Self {
            database_url,
            store_max_attempts,
            store_backoff_base,
            max_cas_conflicts,
        })
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a positive 32-bit integer",
            raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_variables_use_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.database_url, "sqlite://study.sqlite3");
        assert_eq!(config.store_backoff_base, Duration::from_millis(100));
    }

    #[test]
    fn variables_override_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("STUDY_DB_URL", "sqlite::memory:"),
            ("STUDY_STORE_MAX_ATTEMPTS", "5"),
            ("STUDY_STORE_BACKOFF_MS", "0"),
            ("STUDY_MAX_CAS_CONFLICTS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.store_max_attempts, 5);
        assert_eq!(config.store_backoff_base, Duration::ZERO);
        assert_eq!(config.max_cas_conflicts, 2);
    }

    #[test]
    fn unusable_values_are_rejected() {
        for pairs in [
            [("STUDY_STORE_MAX_ATTEMPTS", "0")],
            [("STUDY_STORE_MAX_ATTEMPTS", "many")],
            [("STUDY_STORE_BACKOFF_MS", "-1")],
            [("STUDY_MAX_CAS_CONFLICTS", "x")],
            [("STUDY_DB_URL", "  ")],
        ] {
            assert!(EngineConfig::from_lookup(lookup(&pairs)).is_err(), "{pairs:?}");
        }
    }
}
