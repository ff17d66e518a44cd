use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{error, info};

/// The shared sea-orm connection pool.
pub type DbPool = DatabaseConnection;

/// Opens the pool with the tuning carried in `AppConfig`.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(true);

    info!(
        max_connections = cfg.db_max_connections,
        "opening database pool"
    );
    let pool = Database::connect(options)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(pool)
}

/// Applies pending migrations from the embedded migrator.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("applying database migrations");
    let started = std::time::Instant::now();

    match crate::migrator::Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "database migrations applied");
            Ok(())
        }
        Err(e) => {
            error!(elapsed = ?started.elapsed(), "database migrations failed: {}", e);
            Err(ServiceError::DatabaseError(e))
        }
    }
}
