//! Serde-backed connection and session configuration.

use std::time::Duration;

use rowguard_security::Principal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::{Deserialize, Serialize};

use crate::secure::AuthError;

fn default_max_conns() -> u32 {
    10
}

fn default_min_conns() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_principal<I>() -> Principal<I> {
    Principal::Allow
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    /// Connection string, e.g. `sqlite::memory:` or `postgres://user@host/db`.
    pub dsn: String,
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,
    #[serde(default = "default_min_conns")]
    pub min_conns: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Forward sqlx statement logging to `tracing`.
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl DbConfig {
    #[must_use]
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            max_conns: default_max_conns(),
            min_conns: default_min_conns(),
            connect_timeout_secs: default_connect_timeout_secs(),
            sqlx_logging: false,
        }
    }

    /// In-memory `SQLite` databases live and die with a single connection.
    #[must_use]
    pub fn is_sqlite_memory(&self) -> bool {
        self.dsn.starts_with("sqlite:")
            && (self.dsn.contains(":memory:") || self.dsn.contains("mode=memory"))
    }

    fn scheme(&self) -> &str {
        self.dsn.split(':').next().unwrap_or_default()
    }
}

/// A database plus the principal sessions start with.
///
/// ```json
/// { "db": { "dsn": "sqlite::memory:" }, "default_principal": { "Identity": "alice" } }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig<I> {
    pub db: DbConfig,
    #[serde(default = "default_principal")]
    pub default_principal: Principal<I>,
}

/// Open a `SeaORM` connection for `config`.
///
/// In-memory `SQLite` DSNs are pinned to a single pooled connection regardless
/// of the configured pool size.
///
/// # Errors
/// Returns `AuthError::Invalid` for an empty DSN and `AuthError::Db` when the
/// engine refuses the connection.
pub async fn connect_db(config: &DbConfig) -> Result<DatabaseConnection, AuthError> {
    if config.dsn.trim().is_empty() {
        return Err(AuthError::Invalid("database dsn must not be empty"));
    }

    let (max_conns, min_conns) = if config.is_sqlite_memory() {
        (1, 1)
    } else {
        (config.max_conns, config.min_conns.min(config.max_conns))
    };

    let mut opts = ConnectOptions::new(config.dsn.clone());
    opts.max_connections(max_conns)
        .min_connections(min_conns)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    tracing::info!(
        scheme = config.scheme(),
        max_conns,
        min_conns,
        "opening database connection"
    );

    Ok(Database::connect(opts).await?)
}
