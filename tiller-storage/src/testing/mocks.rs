//! Mock implementations for testing
//!
//! Mocks of the interface traits using the mockall framework.

use async_trait::async_trait;
use mockall::mock;
use tiller_core::RestoreRequest;
use tiller_interfaces::{RestoreOutcome, RestoreService, Row, Session, SessionResult};

mock! {
    pub DbSession {}

    #[async_trait]
    impl Session for DbSession {
        async fn execute(&self, statement: &str, params: &[serde_json::Value]) -> SessionResult<Vec<Row>>;
        async fn execute_unsafe(&self, statement: &str) -> SessionResult<Vec<Row>>;
        async fn begin_transaction(&self) -> SessionResult<()>;
        async fn commit_transaction(&self) -> SessionResult<()>;
        async fn rollback_transaction(&self) -> SessionResult<()>;
        async fn set_active_identity(&self, role: &str) -> SessionResult<()>;
        async fn reset_active_identity(&self) -> SessionResult<()>;
        async fn close(&self) -> SessionResult<()>;
    }
}

mock! {
    pub Restore {}

    #[async_trait]
    impl RestoreService for Restore {
        async fn restore(&self, request: &RestoreRequest, target: &str) -> RestoreOutcome;
    }
}
