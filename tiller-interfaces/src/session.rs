//! Database session interfaces

use async_trait::async_trait;
use thiserror::Error;

/// A result row, keyed by column name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Session-level errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Session is closed")]
    Closed,
}

/// A single database session.
///
/// One statement is in flight at a time. Session-scoped settings such as the
/// active role persist until [`Session::reset_active_identity`] or until the
/// session is closed.
#[async_trait]
pub trait Session: Send + Sync {
    /// Execute a parameterized statement and return its rows
    async fn execute(&self, statement: &str, params: &[serde_json::Value]) -> SessionResult<Vec<Row>>;

    /// Execute raw SQL, possibly containing several statements
    async fn execute_unsafe(&self, statement: &str) -> SessionResult<Vec<Row>>;

    /// Begin a transaction
    async fn begin_transaction(&self) -> SessionResult<()>;

    /// Commit the open transaction
    async fn commit_transaction(&self) -> SessionResult<()>;

    /// Roll back the open transaction
    async fn rollback_transaction(&self) -> SessionResult<()>;

    /// Switch the session identity to the given role
    async fn set_active_identity(&self, role: &str) -> SessionResult<()>;

    /// Switch back to the identity the session connected as
    async fn reset_active_identity(&self) -> SessionResult<()>;

    /// Close the session; further calls fail with [`SessionError::Closed`]
    async fn close(&self) -> SessionResult<()>;
}

/// Source of fresh database sessions for the migration target
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a new session against the target database
    async fn open(&self) -> SessionResult<Box<dyn Session>>;

    /// Drop and recreate the target database
    async fn recreate_database(&self) -> SessionResult<()>;

    /// Connection target handed to the restore tool
    fn target(&self) -> String;
}
