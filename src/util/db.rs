use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

/// Pool settings, normally read from the environment by [`DbOptions::from_env`].
#[derive(Debug, Clone)]
pub struct DbOptions {
    pub max_connections: u32,
    /// Keep sqlx's prepared statement cache. Off by default so PgBouncer in
    /// transaction mode works.
    pub use_prepared: bool,
    /// Relax per-session durability and raise `work_mem` for bulk loads.
    pub fast_ingest: bool,
    pub work_mem_mb: u32,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            use_prepared: false,
            fast_ingest: false,
            work_mem_mb: 64,
        }
    }
}

impl DbOptions {
    pub fn from_env() -> Self {
        use crate::util::env::{env_flag, env_parse};
        let d = Self::default();
        Self {
            max_connections: env_parse("DB_MAX_CONNS", d.max_connections),
            use_prepared: env_flag("USE_PREPARED", d.use_prepared),
            fast_ingest: env_flag("FAST_INGEST", d.fast_ingest),
            work_mem_mb: env_parse("FAST_INGEST_WORK_MEM_MB", d.work_mem_mb),
        }
    }
}

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, opts: &DbOptions) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !opts.use_prepared {
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let fast_ingest = opts.fast_ingest;
        let work_mem_mb = opts.work_mem_mb;
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if fast_ingest {
                        // Best-effort; restricted roles may not be allowed to change these.
                        let _ = sqlx::query("SET synchronous_commit = 'off'")
                            .execute(&mut *conn)
                            .await;
                        let _ = sqlx::query(&format!("SET work_mem = '{}MB'", work_mem_mb))
                            .execute(&mut *conn)
                            .await;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await?;
        info!(
            max_connections = opts.max_connections,
            fast_ingest, "connected to db"
        );
        Ok(Self { pool })
    }
}
