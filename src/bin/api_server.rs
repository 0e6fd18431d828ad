// HTTP API server binary for the movie catalog importer

use anyhow::Result;
use movie_catalog::api::ApiServer;
use movie_catalog::import::{ImportService, ImportSettings, PgCatalogStore};
use movie_catalog::telemetry::init_tracing;
use movie_catalog::util::db::{Db, DbOptions};
use movie_catalog::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing("info,sqlx=warn")?;

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    env_util::preflight_check(
        "api_server",
        &[
            "DATABASE_URL",
            "DB_MAX_CONNS",
            "USE_PREPARED",
            "API_HOST",
            "PORT",
            "ALLOWED_ORIGINS",
            "API_SECRET",
            "IMPORT_DATA_DIR",
            "IMPORT_BATCH_SIZE",
            "LOG_FORMAT",
        ],
    );

    let server = ApiServer::from_env()?;

    let database_url = env_util::db_url()?;
    let db = Db::connect(&database_url, &DbOptions::from_env()).await?;
    tracing::info!("Database connected successfully");

    let imports = ImportService::new(PgCatalogStore::new(db), ImportSettings::from_env());

    server.run(imports).await?;

    Ok(())
}
