//! PostgreSQL transport
//!
//! A [`PgSession`] wraps one dedicated sqlx connection, because role
//! activation is session scoped and must not leak through a pool.

mod provider;
mod restore;
mod session;

pub use provider::{PgSessionProvider, PgSettings, SearchPath};
pub use restore::PgRestore;
pub use session::PgSession;

use tiller_interfaces::SessionError;

pub(crate) fn query_error(error: sqlx::Error) -> SessionError {
    match error {
        sqlx::Error::Io(e) => SessionError::ConnectionFailed(e.to_string()),
        sqlx::Error::Tls(e) => SessionError::ConnectionFailed(e.to_string()),
        other @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => SessionError::ConnectionFailed(other.to_string()),
        other => SessionError::QueryFailed(other.to_string()),
    }
}
