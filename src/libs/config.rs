//! Process configuration.
//!
//! Database settings come from the environment (optionally seeded from a
//! `.env` file); listener settings come from the command line, falling back
//! to the environment and then to defaults.

use std::env;

use clap::Parser;
use sqlx::mysql::MySqlConnectOptions;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_DB_NAME: &str = "projeto_final_bd";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Which engine a configuration points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    MySql(MySqlSettings),
    /// `DATABASE_URL` naming a MySQL server
    MySqlUrl(String),
    Sqlite(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl MySqlSettings {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub backend: Backend,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Read `DATABASE_URL`, or `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`
    /// and `DB_NAME`, from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let backend = match lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            Some(url) if url.starts_with("sqlite:") => Backend::Sqlite(url),
            Some(url) => Backend::MySqlUrl(url),
            None => Backend::MySql(MySqlSettings::from_lookup(&lookup)),
        };

        Self {
            backend,
            max_connections,
        }
    }
}

impl MySqlSettings {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: lookup("DB_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DB_PORT),
            user: lookup("DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            database: lookup("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
        }
    }
}

/// Command line of the `tablegate` binary.
#[derive(Debug, Parser)]
#[command(name = "tablegate", version, about = "Browse and edit any table over HTTP")]
pub struct Cli {
    /// Interface to bind (env: APP_HOST, default 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (env: APP_PORT, default 5000)
    #[arg(long)]
    pub port: Option<u16>,

    /// Verbose logging, including generated SQL (env: APP_DEBUG)
    #[arg(long)]
    pub debug: bool,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Flags win over `APP_HOST` / `APP_PORT` / `APP_DEBUG`, which win over defaults.
    pub fn resolve<F>(cli: &Cli, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = cli
            .host
            .clone()
            .or_else(|| lookup("APP_HOST"))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli
            .port
            .or_else(|| lookup("APP_PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_PORT);
        let debug = cli.debug
            || lookup("APP_DEBUG")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false);
        Self { host, port, debug }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_database_defaults() {
        let config = DatabaseConfig::from_lookup(lookup(&[]));
        assert_eq!(config.max_connections, 5);
        assert_eq!(
            config.backend,
            Backend::MySql(MySqlSettings {
                host: "localhost".into(),
                port: 3306,
                user: "root".into(),
                password: String::new(),
                database: "projeto_final_bd".into(),
            })
        );
    }

    #[test]
    fn test_database_from_env() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_USER", "admin"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "shop"),
            ("DB_PORT", "3307"),
        ]));
        let Backend::MySql(settings) = config.backend else {
            panic!("expected mysql backend");
        };
        assert_eq!(settings.host, "db.internal");
        assert_eq!(settings.port, 3307);
        assert_eq!(settings.user, "admin");
        assert_eq!(settings.password, "secret");
        assert_eq!(settings.database, "shop");
    }

    #[test]
    fn test_sqlite_url_selects_sqlite() {
        let config = DatabaseConfig::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")]));
        assert_eq!(config.backend, Backend::Sqlite("sqlite::memory:".into()));
    }

    #[test]
    fn test_mysql_url_is_kept() {
        let url = "mysql://root@localhost/shop";
        let config = DatabaseConfig::from_lookup(lookup(&[("DATABASE_URL", url)]));
        assert_eq!(config.backend, Backend::MySqlUrl(url.into()));
    }

    #[test]
    fn test_server_defaults() {
        let cli = Cli::parse_from(["tablegate"]);
        let config = ServerConfig::resolve(&cli, lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.socket_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_flags_override_env() {
        let cli = Cli::parse_from(["tablegate", "--port", "8080", "--debug"]);
        let config = ServerConfig::resolve(
            &cli,
            lookup(&[("APP_PORT", "9000"), ("APP_HOST", "127.0.0.1")]),
        );
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
        assert!(config.debug);
    }

    #[test]
    fn test_debug_from_env() {
        let cli = Cli::parse_from(["tablegate"]);
        let config = ServerConfig::resolve(&cli, lookup(&[("APP_DEBUG", "true")]));
        assert!(config.debug);
    }
}
