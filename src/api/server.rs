// API server implementation using actix-web

use crate::api::{auth, middleware, routes};
use crate::import::{CatalogStore, ImportService};
use crate::util::env::{env_opt, env_parse};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub api_secret: Option<String>,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_opt("PORT") {
            Some(raw) => raw.trim().parse().context("Invalid PORT")?,
            None => 8080,
        };

        let api_secret = env_opt("API_SECRET");
        if api_secret.is_none() {
            tracing::warn!("API_SECRET not set; admin endpoints are unauthenticated");
        }

        let allowed_origins = env_parse(
            "ALLOWED_ORIGINS",
            "http://localhost:3000".to_string(),
        );

        Ok(Self {
            host,
            port,
            api_secret,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run<S: CatalogStore>(self, imports: ImportService<S>) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            data_dir = %imports.settings().data_dir.display(),
            "Starting movie catalog API server"
        );

        let import_data = web::Data::new(imports);
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(api_secret.clone());

            App::new()
                .app_data(import_data.clone())
                // Last wrap runs first: CORS answers preflights before auth sees them.
                .wrap(auth)
                .wrap(compress)
                .wrap(cors)
                .wrap(logger)
                .configure(routes::configure_routes::<S>)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
