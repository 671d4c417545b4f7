use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::MySqlConnectOptions;

use crate::libs::config::{Backend, DatabaseConfig};
use crate::libs::mysql::MySqlFactory;
use crate::libs::query_builder::{Dialect, Statement};
use crate::libs::schema::{Record, TableSchema};
use crate::libs::sqlite::SqliteFactory;

/// One checked-out connection, scoped to a single request.
///
/// Implementations own a pooled connection; dropping the session hands it
/// back to the pool whether the request succeeded or not.
#[async_trait]
pub trait Session: Send {
    fn dialect(&self) -> Dialect;

    /// Names of every table and view in the current database.
    async fn table_names(&mut self) -> sqlx::Result<Vec<String>>;

    /// Ordered columns and primary key of a table known to exist.
    async fn describe(&mut self, table: &str) -> sqlx::Result<TableSchema>;

    async fn fetch_all(&mut self, stmt: &Statement) -> sqlx::Result<Vec<Record>>;

    /// Run a statement in autocommit mode and return the affected row count.
    async fn execute(&mut self, stmt: &Statement) -> sqlx::Result<u64>;

    /// Run a statement inside a transaction, rolling back if it fails.
    async fn execute_in_transaction(&mut self, stmt: &Statement) -> sqlx::Result<u64>;

    async fn fetch_optional(&mut self, stmt: &Statement) -> sqlx::Result<Option<Record>> {
        Ok(self.fetch_all(stmt).await?.into_iter().next())
    }
}

/// Hands out sessions. Injected into the gateway instead of a global connect function.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn open(&self) -> sqlx::Result<Box<dyn Session>>;

    /// Close every pooled connection. Called once at shutdown.
    async fn close(&self);
}

/// Build the factory for the configured backend. MySQL pools connect lazily.
pub async fn connect(config: &DatabaseConfig) -> sqlx::Result<Arc<dyn ConnectionFactory>> {
    let factory: Arc<dyn ConnectionFactory> = match &config.backend {
        Backend::MySql(settings) => Arc::new(MySqlFactory::connect_lazy(
            settings.connect_options(),
            config.max_connections,
        )),
        Backend::MySqlUrl(url) => Arc::new(MySqlFactory::connect_lazy(
            MySqlConnectOptions::from_str(url)?,
            config.max_connections,
        )),
        Backend::Sqlite(url) => Arc::new(SqliteFactory::connect(url, config.max_connections).await?),
    };
    Ok(factory)
}

/// How a JSON value is bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&Value> for BindValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => BindValue::Float(f),
                    None => BindValue::Text(n.to_string()),
                },
            },
            Value::String(s) => BindValue::Text(s.clone()),
            // nested structures are stored as their JSON text
            other => BindValue::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bind_values_follow_json_types() {
        assert_eq!(BindValue::from(&json!(null)), BindValue::Null);
        assert_eq!(BindValue::from(&json!(true)), BindValue::Bool(true));
        assert_eq!(BindValue::from(&json!(42)), BindValue::Int(42));
        assert_eq!(BindValue::from(&json!(1.5)), BindValue::Float(1.5));
        assert_eq!(BindValue::from(&json!("x")), BindValue::Text("x".into()));
        assert_eq!(
            BindValue::from(&json!({"a": 1})),
            BindValue::Text("{\"a\":1}".into())
        );
    }

    #[test]
    fn unsigned_beyond_i64_falls_back_to_float() {
        assert_eq!(
            BindValue::from(&json!(u64::MAX)),
            BindValue::Float(u64::MAX as f64)
        );
    }
}
