use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rusqlite::{Connection, OpenFlags};

use crate::ConfigError;

/// Serve one SQL query over HTTP. Each line of a CSV request body runs the
/// query once, with the line's fields as the query's parameters.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the SQLite database. It must already exist.
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// The SQL query, with `?` for each positional parameter.
    #[arg(long)]
    pub query: Option<String>,
    /// Port of the HTTP server.
    #[arg(long, default_value_t = 80)]
    pub port: u32,
    /// Request path the query is served on.
    #[arg(long, default_value = "/query")]
    pub path: String,
    /// Number of database connections. More than one lets requests run
    /// concurrently but gives up SQLite's single-writer safety.
    #[arg(long, default_value_t = 1)]
    pub connections: usize,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub db: PathBuf,
    pub query: String,
    pub port: u16,
    pub path: String,
    pub connections: usize,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl Args {
    pub fn validate(self) -> Result<Config, ConfigError> {
        let db = self.db.filter(|p| !p.as_os_str().is_empty()).ok_or(ConfigError::MissingDb)?;
        let query = self.query.filter(|q| !q.trim().is_empty()).ok_or(ConfigError::MissingQuery)?;
        if !db.is_file() {
            return Err(ConfigError::DbNotFound(db));
        }
        let port = u16::try_from(self.port).map_err(|_| ConfigError::InvalidPort(self.port))?;
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path));
        }
        if self.connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        Ok(Config {
            db,
            query,
            port,
            path: self.path,
            connections: self.connections,
        })
    }
}

impl Config {
    /// A connection factory for the executor. The database is opened read-write
    /// and never created.
    pub fn opener(&self) -> impl Fn() -> rusqlite::Result<Connection> + Send + Sync + 'static {
        let db = self.db.clone();
        move || {
            let conn = Connection::open_with_flags(
                &db,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(conn)
        }
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
