use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Column, Connection, MySqlPool, Row};

use crate::libs::database::{BindValue, ConnectionFactory, Session};
use crate::libs::query_builder::{Dialect, Statement};
use crate::libs::schema::{ColumnSchema, Record, TableSchema};

const TABLES_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS name \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type IN ('BASE TABLE', 'VIEW') \
     ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS name, CAST(COLUMN_TYPE AS CHAR) AS sql_type \
     FROM information_schema.columns \
     WHERE table_schema = DATABASE() AND table_name = ? \
     ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS name \
     FROM information_schema.key_column_usage \
     WHERE table_schema = DATABASE() AND table_name = ? AND constraint_name = 'PRIMARY' \
     ORDER BY ORDINAL_POSITION LIMIT 1";

pub struct MySqlFactory {
    pool: MySqlPool,
}

impl MySqlFactory {
    /// Build a pool that connects on first use, so the server can start before the database.
    pub fn connect_lazy(options: MySqlConnectOptions, max_connections: u32) -> Self {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy_with(options);
        Self { pool }
    }
}

#[async_trait]
impl ConnectionFactory for MySqlFactory {
    async fn open(&self) -> sqlx::Result<Box<dyn Session>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(MySqlSession { conn }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

pub struct MySqlSession {
    conn: PoolConnection<MySql>,
}

#[async_trait]
impl Session for MySqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn table_names(&mut self) -> sqlx::Result<Vec<String>> {
        let rows = sqlx::query(TABLES_SQL).fetch_all(&mut *self.conn).await?;
        rows.iter().map(|r| r.try_get::<String, _>("name")).collect()
    }

    async fn describe(&mut self, table: &str) -> sqlx::Result<TableSchema> {
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;
        let columns = rows
            .iter()
            .map(|r| -> sqlx::Result<ColumnSchema> {
                Ok(ColumnSchema::new(
                    r.try_get::<String, _>("name")?,
                    r.try_get::<String, _>("sql_type")?,
                ))
            })
            .collect::<sqlx::Result<Vec<_>>>()?;

        let primary_key = sqlx::query(PRIMARY_KEY_SQL)
            .bind(table)
            .fetch_optional(&mut *self.conn)
            .await?
            .map(|r| r.try_get::<String, _>("name"))
            .transpose()?;

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            primary_key,
        })
    }

    async fn fetch_all(&mut self, stmt: &Statement) -> sqlx::Result<Vec<Record>> {
        let rows = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn execute(&mut self, stmt: &Statement) -> sqlx::Result<u64> {
        let result = bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn execute_in_transaction(&mut self, stmt: &Statement) -> sqlx::Result<u64> {
        let mut tx = self.conn.begin().await?;
        match bind_params(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut *tx)
            .await
        {
            Ok(result) => {
                tx.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!("rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match BindValue::from(param) {
            BindValue::Null => query.bind(None::<String>),
            BindValue::Bool(b) => query.bind(b),
            BindValue::Int(i) => query.bind(i),
            BindValue::Float(f) => query.bind(f),
            BindValue::Text(s) => query.bind(s),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> Record {
    let mut map = Record::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), decode_value(row, col.ordinal()));
    }
    map
}

fn decode_value(row: &MySqlRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(i) {
        return v
            .map(|dt| Value::from(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(i) {
        return v
            .map(|d| Value::from(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(i) {
        return v
            .map(|t| Value::from(t.format("%H:%M:%S").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    // DECIMAL and friends travel as text but are not declared compatible with String
    match row.try_get_unchecked::<Option<String>, _>(i) {
        Ok(Some(v)) => Value::from(v),
        _ => Value::Null,
    }
}
