use std::net::SocketAddr;

use clap::Args;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub async fn connect(&self) -> Result<PgPool> {
        if self.max_connections == 0 {
            return Err(Error::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
        }
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await?;
        info!(max_connections = self.max_connections, "connected to Postgres");
        Ok(pool)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Bearer token callers must present
    #[arg(long, env = "IMPORT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Entries kept in each dashboard ranking when a request does not ask for a size
    #[arg(long, env = "DASHBOARD_TOP_N", default_value_t = 10)]
    pub top_n: usize,
}

impl ServeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("IMPORT_TOKEN must not be empty".to_string()));
        }
        if self.top_n == 0 {
            return Err(Error::Config("DASHBOARD_TOP_N must be at least 1".to_string()));
        }
        Ok(())
    }
}
