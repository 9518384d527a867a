use std::{io, time::Duration};

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

use crate::config::DatabaseSettings;

/// SeaORM pool handle shared by every handler.
pub type DB = DatabaseConnection;

const DEFAULT_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_MIN_CONNECTIONS: u32 = 5;

fn seconds(value: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(value.unwrap_or(default))
}

/// Pool options for `settings`. An in-memory SQLite database only exists on the
/// connection that created it, so that case is pinned to a single connection.
pub(crate) fn pool_options(settings: &DatabaseSettings) -> ConnectOptions {
    let (max, min) = if settings.is_in_memory() {
        (1, 1)
    } else {
        let max = settings.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let min = settings.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS);
        (max, min.min(max))
    };

    let mut opt = ConnectOptions::new(settings.url.clone());
    opt.max_connections(max)
        .min_connections(min)
        .connect_timeout(seconds(settings.connect_timeout_secs, 8))
        .acquire_timeout(seconds(settings.acquire_timeout_secs, 8))
        .idle_timeout(seconds(settings.idle_timeout_secs, 600))
        .sqlx_logging(settings.sql_log.unwrap_or(false))
        .sqlx_logging_level(log::LevelFilter::Debug);
    opt
}

/// Connects using `DATABASE_URL` and the optional `DATABASE_*` pool variables
/// (`MAX_CONNECTIONS`, `MIN_CONNECTIONS`, `CONNECT_TIMEOUT_SECS`,
/// `ACQUIRE_TIMEOUT_SECS`, `IDLE_TIMEOUT_SECS`, `SQL_LOG`).
pub async fn connect() -> io::Result<DB> {
    let settings = DatabaseSettings::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))?;
    connect_with_settings(&settings).await
}

/// Opens the pool and checks it answers before handing it out.
pub async fn connect_with_settings(settings: &DatabaseSettings) -> io::Result<DB> {
    let db = Database::connect(pool_options(settings))
        .await
        .map_err(|e| io::Error::other(format!("Failed to connect to {}: {}", settings.redacted_url(), e)))?;

    ping(&db)
        .await
        .map_err(|e| io::Error::other(format!("Database at {} did not answer: {}", settings.redacted_url(), e)))?;

    log::info!(
        "Connected to {:?} database at {}",
        db.get_database_backend(),
        settings.redacted_url()
    );
    Ok(db)
}

pub async fn ping(db: &DB) -> Result<(), DbErr> {
    db.execute(Statement::from_string(db.get_database_backend(), "SELECT 1"))
        .await?;
    Ok(())
}
