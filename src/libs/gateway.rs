//! Request-time table access.
//!
//! Every operation opens its own session, reads the live catalog, and builds
//! its statement from what the catalog returned. Nothing about a table is
//! remembered between calls; the session is dropped, and its connection
//! released, on every exit path.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::libs::database::{ConnectionFactory, Session};
use crate::libs::error::{GatewayError, GatewayResult};
use crate::libs::query_builder::{self, QueryBuilder};
use crate::libs::schema::{Record, TableColumns, TableData, TableSchema, TableSummary};

/// Accepted layout for datetime and timestamp columns.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub struct TableGateway {
    connections: Arc<dyn ConnectionFactory>,
}

impl TableGateway {
    pub fn new(connections: Arc<dyn ConnectionFactory>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &Arc<dyn ConnectionFactory> {
        &self.connections
    }

    async fn session(&self) -> GatewayResult<Box<dyn Session>> {
        Ok(self.connections.open().await?)
    }

    /// Every table with its current row count.
    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> GatewayResult<Vec<TableSummary>> {
        let mut session = self.session().await?;
        let names = session.table_names().await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let record_count = count_rows(session.as_mut(), &name).await?;
            tables.push(TableSummary { name, record_count });
        }
        Ok(tables)
    }

    #[instrument(skip(self))]
    pub async fn get_columns(&self, table: &str) -> GatewayResult<TableColumns> {
        let mut session = self.session().await?;
        let schema = resolve(session.as_mut(), table).await?;
        Ok(schema.into())
    }

    /// All rows of the table. Unbounded: meant for small administrative tables.
    #[instrument(skip(self))]
    pub async fn get_table_data(&self, table: &str) -> GatewayResult<TableData> {
        let mut session = self.session().await?;
        let schema = resolve(session.as_mut(), table).await?;
        let stmt = QueryBuilder::new(session.dialect(), &schema.name).build();
        let rows = session.fetch_all(&stmt).await?;
        Ok(TableData {
            columns: schema.column_names(),
            rows,
        })
    }

    /// Row whose primary key equals `id`. The id is bound as text and left to
    /// the database to coerce.
    #[instrument(skip(self))]
    pub async fn get_record(&self, table: &str, id: &str) -> GatewayResult<Record> {
        let mut session = self.session().await?;
        let schema = resolve(session.as_mut(), table).await?;
        let key = require_primary_key(&schema)?;
        let stmt = QueryBuilder::new(session.dialect(), &schema.name)
            .r#where(key, json!(id))
            .build();
        session
            .fetch_optional(&stmt)
            .await?
            .ok_or_else(|| GatewayError::NotFound("Record not found".into()))
    }

    /// Insert a row under the next primary key (`max + 1`) and return that key.
    ///
    /// The max is read and the row written without a lock, so two concurrent
    /// inserts can pick the same key; the loser gets the engine's duplicate-key
    /// error as [`GatewayError::Database`].
    #[instrument(skip(self, payload))]
    pub async fn insert_record(&self, table: &str, payload: &Value) -> GatewayResult<i64> {
        let data = payload_object(payload)?;

        let mut session = self.session().await?;
        let schema = resolve(session.as_mut(), table).await?;
        let key = require_primary_key(&schema)?;
        let next_id = next_key(session.as_mut(), &schema.name, key).await?;

        let mut values = vec![(key.to_string(), json!(next_id))];
        values.extend(writable_values(&schema, data)?);
        if values.len() <= 1 {
            return Err(GatewayError::Validation("No valid columns to insert".into()));
        }

        let stmt = query_builder::insert(session.dialect(), &schema.name, values);
        debug!(sql = %stmt.sql, params = ?stmt.params, "insert");
        session.execute(&stmt).await?;

        info!(table = %schema.name, id = next_id, "record inserted");
        Ok(next_id)
    }

    /// Update the known, non-key columns in `payload` on the row keyed by `id`.
    /// Returns the affected row count, which is never zero on success.
    #[instrument(skip(self, payload))]
    pub async fn update_record(&self, table: &str, id: &str, payload: &Value) -> GatewayResult<u64> {
        let mut session = self.session().await?;
        let schema = resolve(session.as_mut(), table).await?;
        let data = payload_object(payload)?;
        let key = require_primary_key(&schema)?;

        let sets = writable_values(&schema, data)?;
        if sets.is_empty() {
            return Err(GatewayError::Validation("No valid columns to update".into()));
        }

        let lookup = QueryBuilder::new(session.dialect(), &schema.name)
            .r#where(key, json!(id))
            .build();
        if session.fetch_optional(&lookup).await?.is_none() {
            return Err(GatewayError::NotFound("Record not found".into()));
        }

        let stmt = query_builder::update(session.dialect(), &schema.name, sets, key, json!(id));
        debug!(sql = %stmt.sql, params = ?stmt.params, "update");
        let affected = session.execute_in_transaction(&stmt).await?;
        if affected == 0 {
            return Err(GatewayError::NotFound(
                "Record not found or no changes made".into(),
            ));
        }

        info!(table = %schema.name, id, affected, "record updated");
        Ok(affected)
    }

    /// Row count of `table`.
    ///
    /// Unlike the other operations an unknown table is not reported as
    /// `NotFound`; it surfaces as a database error, the way the engine would
    /// report the missing table.
    #[instrument(skip(self))]
    pub async fn count_records(&self, table: &str) -> GatewayResult<i64> {
        let mut session = self.session().await?;
        if !table_exists(session.as_mut(), table).await? {
            return Err(GatewayError::Database(format!(
                "Table '{}' doesn't exist",
                table
            )));
        }
        count_rows(session.as_mut(), table).await
    }
}

/// Exact, case-sensitive match against the live catalog.
async fn table_exists(session: &mut dyn Session, table: &str) -> GatewayResult<bool> {
    Ok(session.table_names().await?.iter().any(|name| name == table))
}

async fn resolve(session: &mut dyn Session, table: &str) -> GatewayResult<TableSchema> {
    if !table_exists(session, table).await? {
        return Err(GatewayError::NotFound(format!("Table {} not found", table)));
    }
    Ok(session.describe(table).await?)
}

async fn count_rows(session: &mut dyn Session, table: &str) -> GatewayResult<i64> {
    let stmt = QueryBuilder::new(session.dialect(), table).count("count").build();
    session
        .fetch_optional(&stmt)
        .await?
        .and_then(|row| row.get("count").and_then(Value::as_i64))
        .ok_or_else(|| GatewayError::Server(format!("could not count rows of {}", table)))
}

async fn next_key(session: &mut dyn Session, table: &str, key: &str) -> GatewayResult<i64> {
    let stmt = QueryBuilder::new(session.dialect(), table)
        .max_or_zero(key, "max_id")
        .build();
    let max = session
        .fetch_optional(&stmt)
        .await?
        .and_then(|row| row.get("max_id").cloned())
        .unwrap_or(Value::Null);
    match max.as_i64() {
        Some(max) => max.checked_add(1).ok_or_else(|| {
            GatewayError::Server(format!("primary key {} of {} is exhausted", key, table))
        }),
        None => Err(GatewayError::Server(format!(
            "primary key {} is not numeric (current max: {})",
            key, max
        ))),
    }
}

fn require_primary_key(schema: &TableSchema) -> GatewayResult<&str> {
    schema.primary_key.as_deref().ok_or_else(|| {
        GatewayError::Validation(format!("Table {} has no primary key", schema.name))
    })
}

fn payload_object(payload: &Value) -> GatewayResult<&Map<String, Value>> {
    match payload.as_object() {
        Some(map) if !map.is_empty() => Ok(map),
        _ => Err(GatewayError::Validation("No data provided".into())),
    }
}

/// Payload entries that name a real, non-key column, in catalog order.
/// Unknown keys and the primary key are dropped.
fn writable_values(
    schema: &TableSchema,
    data: &Map<String, Value>,
) -> GatewayResult<Vec<(String, Value)>> {
    let mut values = Vec::new();
    for column in &schema.columns {
        if schema.is_primary_key(&column.name) {
            continue;
        }
        let Some(value) = data.get(&column.name) else {
            continue;
        };
        let value = if column.is_temporal() {
            normalize_datetime(&column.name, value)?
        } else {
            value.clone()
        };
        values.push((column.name.clone(), value));
    }
    Ok(values)
}

fn normalize_datetime(column: &str, value: &Value) -> GatewayResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok())
        .map(|dt| Value::from(dt.format(DATETIME_FORMAT).to_string()))
        .ok_or_else(|| {
            GatewayError::Validation(format!(
                "Invalid datetime format for {}. Use YYYY-MM-DD HH:MM:SS",
                column
            ))
        })
}
