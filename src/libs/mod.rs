pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mysql;
pub mod query_builder;
pub mod routes;
pub mod schema;
pub mod server;
pub mod sqlite;

// Re-export them for easier access from main.rs
pub use config::*;
pub use database::*;
pub use error::*;
pub use gateway::*;
pub use query_builder::{Dialect, QueryBuilder, Statement};
pub use schema::*;
pub use server::HttpServer;
