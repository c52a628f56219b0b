//! Process configuration, read once at startup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | unset (in-memory stores) |
//! | `PORT` | `8080` |
//! | `APP_ENV` | `development` |
//! | `LOG_LEVEL` | `info` |

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
            AppEnv::Test => "test",
        }
    }

    /// Internal error detail is only returned to clients in development.
    pub fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub port: u16,
    pub app_env: AppEnv,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 8080,
            app_env: AppEnv::Development,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match read("PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(0) => return Err(ConfigError::invalid("PORT", "must be positive")),
                Ok(port) => port,
                Err(e) => return Err(ConfigError::invalid("PORT", format!("{raw:?}: {e}"))),
            },
            None => defaults.port,
        };

        let app_env = match read("APP_ENV").as_deref() {
            None | Some("development") => AppEnv::Development,
            Some("production") => AppEnv::Production,
            Some("test") => AppEnv::Test,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "APP_ENV",
                    format!("{other:?} is not one of development, production, test"),
                ));
            }
        };

        let log_level = match read("LOG_LEVEL") {
            None => defaults.log_level,
            Some(level) => match level.as_str() {
                "debug" | "info" | "warn" | "error" => level,
                _ => {
                    return Err(ConfigError::invalid(
                        "LOG_LEVEL",
                        format!("{level:?} is not one of debug, info, warn, error"),
                    ));
                }
            },
        };

        Ok(Self {
            database_url: read("DATABASE_URL"),
            port,
            app_env,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(load(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn all_variables_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/craneledger"),
            ("PORT", "3000"),
            ("APP_ENV", "production"),
            ("LOG_LEVEL", "warn"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/craneledger"));
        assert_eq!(config.port, 3000);
        assert_eq!(config.app_env, AppEnv::Production);
        assert!(!config.app_env.is_development());
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        assert_eq!(load(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (name, value) in [("PORT", "0"), ("PORT", "http"), ("APP_ENV", "staging"), ("LOG_LEVEL", "trace")] {
            match load(&[(name, value)]).unwrap_err() {
                ConfigError::Invalid { name: reported, .. } => assert_eq!(reported, name),
            }
        }
    }
}
