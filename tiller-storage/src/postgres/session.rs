//! A single PostgreSQL session

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Connection as _, PgConnection, Postgres, Row as _, TypeInfo as _};
use tiller_core::quote_identifier;
use tiller_interfaces::{Row, Session, SessionError, SessionResult};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::query_error;

/// Session over one dedicated connection
pub struct PgSession {
    connection: Mutex<Option<PgConnection>>,
}

impl PgSession {
    pub fn new(connection: PgConnection) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
        }
    }

    async fn run_raw(&self, statement: &str) -> SessionResult<Vec<PgRow>> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(SessionError::Closed)?;
        sqlx::Executor::fetch_all(&mut *connection, sqlx::raw_sql(statement)).await.map_err(query_error)
    }

    async fn control(&self, statement: &str) -> SessionResult<()> {
        self.run_raw(statement)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                SessionError::QueryFailed(message) => SessionError::TransactionFailed(message),
                other => other,
            })
    }
}

fn bind_param<'q>(query: Query<'q, Postgres, PgArguments>, value: &'q Value) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::Bool)),
        "INT2" => row.try_get::<Option<i16>, _>(index).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.and_then(|f| Number::from_f64(f as f64)).map(Value::Number)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.and_then(Number::from_f64).map(Value::Number)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| v.map(|t| Value::String(t.and_utc().to_rfc3339()))),
        _ => row.try_get::<Option<String>, _>(index).map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(e) => {
            trace!("Column {} of type {} not decoded: {}", index, type_name, e);
            Value::Null
        }
    }
}

fn to_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&self, statement: &str, params: &[Value]) -> SessionResult<Vec<Row>> {
        trace!("Executing: {}", statement);
        let mut query = sqlx::query(statement);
        for param in params {
            query = bind_param(query, param);
        }

        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(SessionError::Closed)?;
        let rows = query.fetch_all(&mut *connection).await.map_err(query_error)?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn execute_unsafe(&self, statement: &str) -> SessionResult<Vec<Row>> {
        let rows = self.run_raw(statement).await?;
        Ok(rows.iter().map(to_row).collect())
    }

    async fn begin_transaction(&self) -> SessionResult<()> {
        self.control("BEGIN").await
    }

    async fn commit_transaction(&self) -> SessionResult<()> {
        self.control("COMMIT").await
    }

    async fn rollback_transaction(&self) -> SessionResult<()> {
        self.control("ROLLBACK").await
    }

    async fn set_active_identity(&self, role: &str) -> SessionResult<()> {
        debug!("SET ROLE {}", role);
        self.run_raw(&format!("SET ROLE {}", quote_identifier(role))).await?;
        Ok(())
    }

    async fn reset_active_identity(&self) -> SessionResult<()> {
        debug!("RESET ROLE");
        self.run_raw("RESET ROLE").await?;
        Ok(())
    }

    async fn close(&self) -> SessionResult<()> {
        let connection = self.connection.lock().await.take();
        match connection {
            Some(connection) => connection.close().await.map_err(query_error),
            None => Ok(()),
        }
    }
}
