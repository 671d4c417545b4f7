// schema.rs
use serde::Serialize;
use serde_json::{Map, Value};

/// A row keyed by column name, in the column order the database returned.
pub type Record = Map<String, Value>;

/// Declared SQL type fragments that mark a column as date/time.
const TEMPORAL_TYPES: &[&str] = &["datetime", "timestamp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub sql_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }

    /// True when the declared type is a datetime or timestamp type.
    pub fn is_temporal(&self) -> bool {
        let sql_type = self.sql_type.to_lowercase();
        TEMPORAL_TYPES.iter().any(|t| sql_type.contains(t))
    }
}

/// Live description of a table, read from the catalog for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.as_deref() == Some(name)
    }
}

/// Body of `GET /table/{name}/columns`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableColumns {
    pub columns: Vec<String>,
    pub primary_key: Option<String>,
}

impl From<TableSchema> for TableColumns {
    fn from(schema: TableSchema) -> Self {
        Self {
            columns: schema.column_names(),
            primary_key: schema.primary_key,
        }
    }
}

/// Entry of `GET /tables`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    #[serde(rename = "recordCount")]
    pub record_count: i64,
}

/// Body of `GET /table/{name}`.
#[derive(Debug, Clone, Serialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}
