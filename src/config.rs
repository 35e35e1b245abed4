//! Server and database configuration
//!
//! Every setting can come from a flag or from the environment (a `.env`
//! file is loaded by the binary before parsing).

use crate::error::{PipelineError, Result};
use clap::{Args, Parser};
use sqlx::postgres::PgConnectOptions;
use std::net::SocketAddr;

#[derive(Parser, Debug, Clone)]
#[command(name = "nlsql-server")]
#[command(about = "Answers natural-language questions about the sales dataset")]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind: String,

    #[command(flatten)]
    pub db: DbConfig,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| PipelineError::Config(format!("invalid bind address '{}': {}", self.bind, e)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct DbConfig {
    #[arg(long, env = "DB_NAME", default_value = "ragdb")]
    pub db_name: String,

    #[arg(long, env = "DB_USER", default_value = "rag_user")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "Rag@123", hide_env_values = true)]
    pub db_password: String,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Upper bound for a single statement, enforced by the server session
    #[arg(long, env = "DB_STATEMENT_TIMEOUT_SECS", default_value_t = 10)]
    pub statement_timeout_secs: u64,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl DbConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        let timeout = format!("{}s", self.statement_timeout_secs);
        PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(&self.db_password)
            .database(&self.db_name)
            .options([("statement_timeout", timeout.as_str())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["server"]);
        assert_eq!(config.db.db_port, 5432);
        assert_eq!(config.db.statement_timeout_secs, 10);
        assert_eq!(config.bind_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_flags_override() {
        let config = ServerConfig::parse_from([
            "server",
            "--db-host",
            "db.internal",
            "--db-port",
            "6543",
            "--bind",
            "127.0.0.1:9000",
        ]);
        assert_eq!(config.db.db_host, "db.internal");
        assert_eq!(config.db.db_port, 6543);
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = ServerConfig::parse_from(["server", "--bind", "not-an-address"]);
        assert!(matches!(config.bind_addr(), Err(PipelineError::Config(_))));
    }
}
