use std::fmt;

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use vdb_core::VdbError;

/// Connection parameters for the PostgreSQL server holding the collections.
///
/// Every field is required. Construct through [`new`](Self::new) or
/// [`from_env`](Self::from_env), or deserialize and then call
/// [`validate`](Self::validate).
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct PgVectoRsConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl PgVectoRsConfig {
    /// Build a validated configuration.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, VdbError> {
        let config = Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read `POSTGRESQL_HOST`, `POSTGRESQL_PORT`, `POSTGRESQL_USER`,
    /// `POSTGRESQL_PASSWORD` and `POSTGRESQL_DATABASE`.
    pub fn from_env() -> Result<Self, VdbError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VdbError> {
        let port = match lookup("POSTGRESQL_PORT") {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<u16>().map_err(|e| {
                VdbError::Config(format!("config POSTGRESQL_PORT is not a valid port '{raw}': {e}"))
            })?,
            _ => 0,
        };
        let config = Self {
            host: lookup("POSTGRESQL_HOST").unwrap_or_default(),
            port,
            user: lookup("POSTGRESQL_USER").unwrap_or_default(),
            password: lookup("POSTGRESQL_PASSWORD").unwrap_or_default(),
            database: lookup("POSTGRESQL_DATABASE").unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every connection parameter is present.
    pub fn validate(&self) -> Result<(), VdbError> {
        let missing = if self.host.trim().is_empty() {
            Some("POSTGRESQL_HOST")
        } else if self.port == 0 {
            Some("POSTGRESQL_PORT")
        } else if self.user.trim().is_empty() {
            Some("POSTGRESQL_USER")
        } else if self.password.is_empty() {
            Some("POSTGRESQL_PASSWORD")
        } else if self.database.trim().is_empty() {
            Some("POSTGRESQL_DATABASE")
        } else {
            None
        };
        match missing {
            Some(name) => Err(VdbError::Config(format!("config {name} is required"))),
            None => Ok(()),
        }
    }

    /// Connection options for building a pool.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// Open a connection pool. The caller owns the pool and may share it
    /// between any number of collections.
    pub async fn connect(&self, max_connections: u32) -> Result<PgPool, VdbError> {
        self.validate()?;
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(self.connect_options())
            .await
            .map_err(|e| {
                VdbError::Query(format!(
                    "failed to connect to PostgreSQL at {}:{}: {e}",
                    self.host, self.port
                ))
            })
    }
}

impl fmt::Debug for PgVectoRsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgVectoRsConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}
