use std::env;

use clap::Parser;
use tablegate::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let server_config = ServerConfig::resolve(&cli, |key| env::var(key).ok());
    logging::init_logging(server_config.debug);

    let db_config = DatabaseConfig::from_env();
    let connections = database::connect(&db_config).await?;
    info!(
        "Database backend: {}",
        match &db_config.backend {
            Backend::MySql(s) => format!("mysql {}@{}:{}/{}", s.user, s.host, s.port, s.database),
            Backend::MySqlUrl(_) => "mysql (DATABASE_URL)".to_string(),
            Backend::Sqlite(url) => url.clone(),
        }
    );

    let server = HttpServer::new(server_config, TableGateway::new(connections));
    server.start().await?;
    Ok(())
}
