//! Session provider for a PostgreSQL target database

use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection as _, PgConnection};
use std::str::FromStr;
use std::time::Duration;
use tiller_core::quote_identifier;
use tiller_interfaces::{Session, SessionError, SessionProvider, SessionResult};
use tracing::{debug, info, warn};

use super::{query_error, PgSession};

/// How each new session sets its `search_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPath {
    /// Only the `public` schema
    Public,
    /// Leave the server's default untouched
    ServerDefault,
    /// Comma separated list of schemas
    Custom(String),
}

impl SearchPath {
    /// An explicit override wins, otherwise `public` unless the server default is kept
    pub fn resolve(search_path: Option<&str>, keep_default: bool) -> Self {
        match search_path.map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => SearchPath::Custom(custom.to_string()),
            None if keep_default => SearchPath::ServerDefault,
            None => SearchPath::Public,
        }
    }

    /// Statement applied to every new session, if any
    pub fn statement(&self) -> Option<String> {
        match self {
            SearchPath::ServerDefault => None,
            SearchPath::Public => Some("SET search_path TO \"public\"".to_string()),
            SearchPath::Custom(schemas) => {
                let quoted: Vec<String> = schemas
                    .split(',')
                    .map(|s| s.trim().trim_matches('"'))
                    .filter(|s| !s.is_empty())
                    .map(quote_identifier)
                    .collect();
                Some(format!("SET search_path TO {}", quoted.join(", ")))
            }
        }
    }
}

/// Connection settings for the target database
#[derive(Debug, Clone)]
pub struct PgSettings {
    pub url: String,
    /// Database used while the target is dropped and recreated
    pub maintenance_database: String,
    pub connect_timeout: Duration,
    pub search_path: SearchPath,
}

impl PgSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            maintenance_database: "postgres".to_string(),
            connect_timeout: Duration::from_secs(30),
            search_path: SearchPath::Public,
        }
    }
}

/// Opens dedicated sessions against the target database
#[derive(Debug, Clone)]
pub struct PgSessionProvider {
    settings: PgSettings,
    options: PgConnectOptions,
}

impl PgSessionProvider {
    pub fn new(settings: PgSettings) -> SessionResult<Self> {
        let options = PgConnectOptions::from_str(&settings.url)
            .map_err(|e| SessionError::ConnectionFailed(format!("Invalid database URL: {}", e)))?;
        Ok(Self { settings, options })
    }

    async fn connect(&self, options: &PgConnectOptions) -> SessionResult<PgConnection> {
        tokio::time::timeout(self.settings.connect_timeout, PgConnection::connect_with(options))
            .await
            .map_err(|_| {
                SessionError::ConnectionFailed(format!(
                    "Timed out after {:?} connecting to the database",
                    self.settings.connect_timeout
                ))
            })?
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))
    }

    fn target_database(&self) -> SessionResult<String> {
        self.options
            .get_database()
            .map(str::to_string)
            .ok_or_else(|| SessionError::ConnectionFailed("Database URL does not name a database".to_string()))
    }
}

#[async_trait]
impl SessionProvider for PgSessionProvider {
    async fn open(&self) -> SessionResult<Box<dyn Session>> {
        let connection = self.connect(&self.options).await?;
        let session = PgSession::new(connection);

        if let Some(statement) = self.settings.search_path.statement() {
            session.execute_unsafe(&statement).await?;
        }
        debug!("Opened database session");
        Ok(Box::new(session))
    }

    async fn recreate_database(&self) -> SessionResult<()> {
        let database = self.target_database()?;
        if database == self.settings.maintenance_database {
            return Err(SessionError::QueryFailed(format!(
                "Refusing to recreate the maintenance database {}",
                database
            )));
        }

        let maintenance = self.options.clone().database(&self.settings.maintenance_database);
        let mut connection = self.connect(&maintenance).await?;

        let terminated = sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_catalog.pg_stat_activity \
             WHERE datname = $1 AND pid <> pg_backend_pid()",
        )
        .bind(database.as_str())
        .fetch_all(&mut connection)
        .await
        .map_err(query_error)?;
        if !terminated.is_empty() {
            warn!("Terminated {} sessions connected to {}", terminated.len(), database);
        }

        let quoted = quote_identifier(&database);
        for statement in [
            format!("DROP DATABASE IF EXISTS {}", quoted),
            format!("CREATE DATABASE {}", quoted),
        ] {
            sqlx::Executor::execute(&mut connection, sqlx::raw_sql(&statement))
                .await
                .map_err(query_error)?;
        }
        info!("Recreated database {}", database);

        connection.close().await.map_err(query_error)
    }

    fn target(&self) -> String {
        self.settings.url.clone()
    }
}
