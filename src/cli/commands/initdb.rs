use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, error, info, trace};

/// Connects to `database_url` and applies every pending migration.
pub async fn run_migrations(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Attempting to connect to database");
    let db = match Database::connect(database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            return Err(e.into());
        }
    };

    info!("Running database migrations");
    match Migrator::up(&db, None).await {
        Ok(()) => debug!("All pending migrations have been applied"),
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            return Err(e.into());
        }
    }

    Ok(db)
}

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    run_migrations(database_url).await?;

    info!("Database initialization completed successfully!");
    Ok(())
}
