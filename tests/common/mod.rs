#![allow(dead_code)]

use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;
use tablegate::TableGateway;
use tablegate::sqlite::SqliteFactory;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, created_at TIMESTAMP)",
    "CREATE TABLE notes (body TEXT)",
    "CREATE TABLE tags (code TEXT PRIMARY KEY, label TEXT)",
    "INSERT INTO notes (body) VALUES ('first'), ('second')",
    "INSERT INTO tags (code, label) VALUES ('abc', 'letters')",
];

/// Fresh in-memory database with `users` (empty), `notes` (no primary key,
/// two rows) and `tags` (text primary key, one row).
pub async fn setup_gateway() -> (TableGateway, SqlitePool) {
    let factory = SqliteFactory::connect("sqlite::memory:", 1).await.unwrap();
    let pool = factory.pool().clone();
    for sql in SCHEMA {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    (TableGateway::new(Arc::new(factory)), pool)
}

/// Same schema in a database file, behind a pool of several connections, so
/// concurrent sessions really run side by side. Keep the `TempDir` alive for
/// as long as the gateway is used.
pub async fn setup_file_gateway() -> (TableGateway, SqlitePool, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("gate.db").display());
    let factory = SqliteFactory::connect(&url, 4).await.unwrap();
    let pool = factory.pool().clone();
    for sql in SCHEMA {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    (TableGateway::new(Arc::new(factory)), pool, dir)
}
