//! Transactional store used by the importer.
//!
//! The importer only needs begin / create staging / bulk load / merge /
//! commit / rollback, so the database sits behind two small traits. The
//! Postgres implementation stages rows in a temp table dropped on commit and
//! loads them with `COPY ... FROM STDIN`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::debug;

use super::record::CatalogRecord;
use crate::util::db::Db;

#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    type Tx: ImportTx;

    async fn begin(&self) -> Result<Self::Tx>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<()>;
}

/// One import transaction. Dropping it without `commit` must discard every
/// change, staging area included.
#[async_trait]
pub trait ImportTx: Send {
    async fn create_staging(&mut self) -> Result<()>;

    /// Appends rows to the staging area. An empty slice is a no-op.
    async fn bulk_load(&mut self, rows: &[CatalogRecord]) -> Result<u64>;

    /// Upserts every staged row into the catalog; returns rows written.
    async fn merge(&mut self) -> Result<u64>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

const CREATE_STAGING_SQL: &str = r#"
CREATE TEMP TABLE movie_ids_import_staging (
    id             INTEGER        NOT NULL,
    original_title TEXT           NOT NULL,
    adult          BOOLEAN        NOT NULL,
    video          BOOLEAN        NOT NULL,
    popularity     NUMERIC(10, 4) NOT NULL
) ON COMMIT DROP
"#;

const COPY_STAGING_SQL: &str = "COPY movie_ids_import_staging (id, original_title, adult, video, popularity) FROM STDIN WITH (FORMAT csv)";

const MERGE_STAGING_SQL: &str = r#"
INSERT INTO movie_ids (id, original_title, adult, video, popularity)
SELECT id, original_title, adult, video, popularity
FROM movie_ids_import_staging
ON CONFLICT (id) DO UPDATE
SET
    original_title = EXCLUDED.original_title,
    adult = EXCLUDED.adult,
    video = EXCLUDED.video,
    popularity = EXCLUDED.popularity
"#;

#[derive(Clone)]
pub struct PgCatalogStore {
    db: Db,
}

impl PgCatalogStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    type Tx = PgImportTx;

    async fn begin(&self) -> Result<PgImportTx> {
        let tx = self.db.pool.begin().await.context("begin transaction")?;
        Ok(PgImportTx { tx })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, bool>("SELECT true")
            .fetch_one(&self.db.pool)
            .await?;
        Ok(())
    }
}

pub struct PgImportTx {
    tx: Transaction<'static, Postgres>,
}

/// Encodes rows as headerless CSV for `COPY ... WITH (FORMAT csv)`.
fn encode_csv(rows: &[CatalogRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(rows.len() * 64));
    for r in rows {
        writer.write_record([
            r.id.to_string(),
            r.original_title.clone(),
            r.adult.to_string(),
            r.video.to_string(),
            r.popularity_text(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush csv buffer: {}", e.error()))
}

#[async_trait]
impl ImportTx for PgImportTx {
    async fn create_staging(&mut self) -> Result<()> {
        sqlx::query(CREATE_STAGING_SQL)
            .execute(&mut *self.tx)
            .await
            .context("create staging table")?;
        Ok(())
    }

    async fn bulk_load(&mut self, rows: &[CatalogRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let payload = encode_csv(rows)?;
        let mut copy = self.tx.copy_in_raw(COPY_STAGING_SQL).await?;
        let sent = copy.send(payload).await.map(|_| ());
        if let Err(e) = sent {
            let _ = copy.abort(e.to_string()).await;
            return Err(e.into());
        }
        let copied = copy.finish().await?;
        debug!(rows = copied, "copied batch into staging");
        Ok(copied)
    }

    async fn merge(&mut self) -> Result<u64> {
        let done = sqlx::query(MERGE_STAGING_SQL)
            .execute(&mut *self.tx)
            .await?;
        Ok(done.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
