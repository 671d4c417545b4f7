use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Connection, Row, SqlitePool};

use crate::libs::database::{BindValue, ConnectionFactory, Session};
use crate::libs::query_builder::{Dialect, Statement};
use crate::libs::schema::{ColumnSchema, Record, TableSchema};

const TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
     ORDER BY name";

const COLUMNS_SQL: &str = "SELECT name, type AS sql_type, pk FROM pragma_table_info(?) ORDER BY cid";

pub struct SqliteFactory {
    pool: SqlitePool,
}

impl SqliteFactory {
    /// Open a pool for `url`. An in-memory database is pinned to a single
    /// connection that never expires, so every session sees the same data.
    pub async fn connect(url: &str, max_connections: u32) -> sqlx::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionFactory for SqliteFactory {
    async fn open(&self) -> sqlx::Result<Box<dyn Session>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(SqliteSession { conn }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl Session for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
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

        let mut columns = Vec::with_capacity(rows.len());
        // (position in key, column name); the lowest position is the key column
        let mut primary_key: Option<(i64, String)> = None;
        for r in &rows {
            let name: String = r.try_get("name")?;
            let sql_type: String = r.try_get("sql_type")?;
            let pk: i64 = r.try_get("pk")?;
            if pk > 0 && primary_key.as_ref().is_none_or(|(pos, _)| pk < *pos) {
                primary_key = Some((pk, name.clone()));
            }
            columns.push(ColumnSchema::new(name, sql_type));
        }

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            primary_key: primary_key.map(|(_, name)| name),
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
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
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

fn decode_row(row: &SqliteRow) -> Record {
    let mut map = Record::new();
    for col in row.columns() {
        let i = col.ordinal();
        let value = match row.try_get::<Option<i64>, _>(i) {
            Ok(Some(v)) => Value::from(v),
            Ok(None) => Value::Null,
            Err(_) => match row.try_get::<Option<f64>, _>(i) {
                Ok(Some(v)) => Value::from(v),
                Ok(None) => Value::Null,
                Err(_) => match row.try_get::<Option<String>, _>(i) {
                    Ok(Some(v)) => Value::from(v),
                    Ok(None) => Value::Null,
                    Err(_) => Value::Null,
                },
            },
        };
        map.insert(col.name().to_string(), value);
    }
    map
}
