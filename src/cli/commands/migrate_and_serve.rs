use anyhow::Result;
use tracing::{info, trace};

use super::{initdb::run_migrations, serve};
use crate::config::AppConfig;

pub async fn migrate_and_serve(config: &AppConfig) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    let db = run_migrations(&config.database.url).await?;
    db.close().await?;

    serve(config).await
}
