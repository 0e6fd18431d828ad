use tracing::debug;

use super::decoder::DecodedRecord;
use super::error::{ImportError, ImportResult};
use super::job::ImportJob;
use super::record::CatalogRecord;
use super::store::ImportTx;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Row counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportProgress {
    pub processed: u64,
    pub upserted: u64,
}

/// Buffers decoded records and copies them into the staging area one full
/// batch at a time, publishing progress after every flush.
pub struct BatchLoader<'a, T: ImportTx> {
    tx: &'a mut T,
    job: &'a ImportJob,
    batch: Vec<CatalogRecord>,
    capacity: usize,
    processed: u64,
    staged: u64,
    last_line: u64,
}

impl<'a, T: ImportTx> BatchLoader<'a, T> {
    pub fn new(tx: &'a mut T, job: &'a ImportJob, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tx,
            job,
            batch: Vec::with_capacity(capacity),
            capacity,
            processed: 0,
            staged: 0,
            last_line: 0,
        }
    }

    pub fn progress(&self) -> ImportProgress {
        ImportProgress {
            processed: self.processed,
            upserted: self.staged,
        }
    }

    pub async fn push(&mut self, decoded: DecodedRecord) -> ImportResult<()> {
        self.processed += 1;
        self.last_line = decoded.line;
        self.batch.push(decoded.record);
        if self.batch.len() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }

    /// Copies the buffered batch into staging. A no-op when nothing is
    /// buffered. Checks for a cancel request once the batch has landed.
    pub async fn flush(&mut self) -> ImportResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.tx
            .bulk_load(&self.batch)
            .await
            .map_err(|e| ImportError::Load {
                line: self.last_line,
                reason: format!("{e:#}"),
            })?;
        self.staged += self.batch.len() as u64;
        self.batch.clear();
        self.job.update_progress(self.processed, self.staged);
        debug!(
            processed_rows = self.processed,
            staged_rows = self.staged,
            line = self.last_line,
            "staged batch"
        );

        if self.job.cancel_requested() {
            return Err(ImportError::Cancelled);
        }
        Ok(())
    }

    /// Flushes the trailing partial batch.
    pub async fn finish(&mut self) -> ImportResult<ImportProgress> {
        self.flush().await?;
        Ok(self.progress())
    }
}
