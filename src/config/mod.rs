//! Service settings, read once at startup from environment variables and passed explicitly.
//!
//! Nested keys use `__` as separator: `DB__HOST`, `APP__PORT`, ...

use crate::error::ConfigError;
use sqlx::postgres::PgConnectOptions;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Dev,
    Other(String),
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "local" => Environment::Local,
            "dev" => Environment::Dev,
            _ => Environment::Other(s.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Other(s) => s,
        }
    }

    /// Path prefix the API is mounted under. Deployed environments sit behind `/api`.
    pub fn root_path(&self) -> Option<&'static str> {
        match self {
            Environment::Local | Environment::Dev => None,
            Environment::Other(_) => Some("/api"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    /// How long a request waits for a pooled connection before failing.
    pub acquire_timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

#[derive(Clone, Debug)]
pub struct AppSettings {
    pub title: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub default_items_per_page: u32,
    pub max_items_per_page: u32,
    pub body_limit_bytes: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            title: "Entry project".into(),
            version: "1.0.0".into(),
            host: "0.0.0.0".into(),
            port: 8080,
            default_items_per_page: 100,
            max_items_per_page: 1000,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: Environment,
    pub db: DatabaseSettings,
    pub app: AppSettings,
}

fn required(vars: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    vars(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn parsed<T>(vars: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            details: e.to_string(),
        }),
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Read settings through `vars`, which returns the value of a variable if set.
    pub fn from_vars(vars: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = Environment::parse(&vars("APP_ENV").unwrap_or_else(|| "local".into()));
        let defaults = AppSettings::default();

        let db = DatabaseSettings {
            host: vars("DB__HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port: parsed(&vars, "DB__PORT", 5432)?,
            user: required(&vars, "DB__USER")?,
            password: required(&vars, "DB__PASSWORD")?,
            name: vars("DB__NAME").unwrap_or_else(|| "app".into()),
            max_connections: parsed(&vars, "DB__MAX_CONNECTIONS", 30)?,
            acquire_timeout_ms: parsed(&vars, "DB__ACQUIRE_TIMEOUT_MS", 30_000)?,
        };

        let app = AppSettings {
            title: vars("APP__TITLE").unwrap_or(defaults.title),
            version: vars("APP__VERSION").unwrap_or(defaults.version),
            host: vars("APP__HOST").unwrap_or(defaults.host),
            port: parsed(&vars, "APP__PORT", defaults.port)?,
            default_items_per_page: parsed(&vars, "APP__DEFAULT_ITEMS_PER_PAGE", defaults.default_items_per_page)?,
            max_items_per_page: parsed(&vars, "APP__MAX_ITEMS_PER_PAGE", defaults.max_items_per_page)?,
            body_limit_bytes: parsed(&vars, "APP__BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
        };

        if app.max_items_per_page == 0 {
            return Err(ConfigError::Invalid {
                key: "APP__MAX_ITEMS_PER_PAGE".into(),
                details: "must be greater than 0".into(),
            });
        }
        if app.default_items_per_page == 0 || app.default_items_per_page > app.max_items_per_page {
            return Err(ConfigError::Invalid {
                key: "APP__DEFAULT_ITEMS_PER_PAGE".into(),
                details: format!("must be between 1 and {}", app.max_items_per_page),
            });
        }

        Ok(Settings {
            environment,
            db,
            app,
        })
    }

    /// Settings from a fixed map; handy for tests and tools.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_vars(|k| map.get(k).cloned())
    }
}

/// Load `env/.env.<APP_ENV>` under `root` if present, then a plain `.env`. Variables already set
/// in the process win. Returns the files that were loaded.
pub fn load_dotenv(root: &Path) -> Vec<std::path::PathBuf> {
    let env_name = std::env::var("APP_ENV").unwrap_or_else(|_| "local".into());
    let mut loaded = Vec::new();
    for candidate in [
        root.join("env").join(format!(".env.{}", env_name)),
        root.join(".env"),
    ] {
        if candidate.is_file() && dotenvy::from_path(&candidate).is_ok() {
            loaded.push(candidate);
        }
    }
    loaded
}
