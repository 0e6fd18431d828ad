//! Import orchestration: locate → begin → decode/stage → merge → commit.
//!
//! Runs are single-flight through [`ImportJob`] and execute on a spawned task;
//! callers get an immediate [`StartOutcome`] and poll the job for the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::decoder::{self, DecodedRecord, DecoderOptions};
use super::error::{ImportError, ImportResult};
use super::job::{ImportJob, ImportStatus};
use super::loader::{BatchLoader, ImportProgress, DEFAULT_BATCH_SIZE};
use super::locator;
use super::store::{CatalogStore, ImportTx};
use crate::util::env::{env_opt, env_parse};

/// Records buffered between the decode thread and the loader.
const DECODE_CHANNEL_DEPTH: usize = 4096;

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub decoder: DecoderOptions,
}

impl ImportSettings {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            decoder: DecoderOptions::default(),
        }
    }

    pub fn from_env() -> Self {
        let data_dir = env_opt("IMPORT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(locator::resolve_data_dir);
        let d = DecoderOptions::default();
        Self {
            data_dir,
            batch_size: env_parse("IMPORT_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            decoder: DecoderOptions {
                line_buffer_bytes: env_parse("IMPORT_LINE_BUFFER_BYTES", d.line_buffer_bytes),
                max_line_bytes: env_parse("IMPORT_MAX_LINE_BYTES", d.max_line_bytes),
            }
            .normalized(),
        }
    }
}

/// Result of asking for a new run.
#[derive(Debug)]
pub enum StartOutcome {
    Accepted(ImportStatus),
    Conflict,
    NotFound(ImportError),
    InternalError(ImportError),
}

/// A failed run together with the counters it had reached.
#[derive(Debug)]
pub struct RunFailure {
    pub progress: ImportProgress,
    pub error: ImportError,
}

impl RunFailure {
    fn new(progress: ImportProgress, error: ImportError) -> Self {
        Self { progress, error }
    }
}

pub struct ImportService<S> {
    store: Arc<S>,
    job: Arc<ImportJob>,
    settings: Arc<ImportSettings>,
}

impl<S> Clone for ImportService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            job: Arc::clone(&self.job),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<S: CatalogStore> ImportService<S> {
    pub fn new(store: S, settings: ImportSettings) -> Self {
        Self {
            store: Arc::new(store),
            job: Arc::new(ImportJob::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn job(&self) -> &ImportJob {
        &self.job
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn status(&self) -> ImportStatus {
        self.job.snapshot()
    }

    pub fn cancel(&self) -> bool {
        let accepted = self.job.request_cancel();
        if accepted {
            info!("movie import cancel requested");
        }
        accepted
    }

    /// Starts a background run on the current tokio runtime. Never waits for
    /// the run itself.
    pub fn start(&self) -> StartOutcome {
        if self.job.is_running() {
            warn!("movie import start rejected: already running");
            return StartOutcome::Conflict;
        }

        let source = match locator::find_latest_dataset(&self.settings.data_dir) {
            Ok(path) => path,
            Err(e) if e.is_not_found() => {
                warn!(data_dir = %self.settings.data_dir.display(), "no movie id dataset found");
                return StartOutcome::NotFound(e);
            }
            Err(e) => {
                error!(error = %e, "failed to locate latest movie data file");
                return StartOutcome::InternalError(e);
            }
        };

        if !self.job.start_if_idle(&source) {
            warn!(source_file = %source.display(), "movie import start rejected: already running");
            return StartOutcome::Conflict;
        }
        info!(source_file = %source.display(), "movie import started");
        let snapshot = self.job.snapshot();

        let store = Arc::clone(&self.store);
        let job = Arc::clone(&self.job);
        let settings = Arc::clone(&self.settings);
        let run_source = source.clone();
        let run = tokio::spawn(async move {
            run_import(store.as_ref(), &job, &run_source, &settings).await
        });

        let job = Arc::clone(&self.job);
        tokio::spawn(async move {
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(join) => Err(RunFailure::new(
                    ImportProgress::default(),
                    ImportError::Worker(join.to_string()),
                )),
            };
            report(&job, &source, outcome);
        });

        StartOutcome::Accepted(snapshot)
    }
}

fn report(job: &ImportJob, source: &Path, outcome: Result<ImportProgress, RunFailure>) {
    match outcome {
        Ok(p) => {
            job.finish_success(p.processed, p.upserted);
            info!(
                source_file = %source.display(),
                processed_rows = p.processed,
                upserted_rows = p.upserted,
                "movie import succeeded"
            );
        }
        Err(RunFailure { progress, error }) => {
            job.finish_failure(progress.processed, progress.upserted, error.to_string());
            error!(
                source_file = %source.display(),
                processed_rows = progress.processed,
                upserted_rows = progress.upserted,
                error = %error,
                "movie import failed"
            );
        }
    }
}

/// Runs one import of `source` to completion inside a single transaction.
///
/// Nothing becomes visible in the catalog unless every line decodes, every
/// batch stages, and the merge commits.
pub async fn run_import<S: CatalogStore>(
    store: &S,
    job: &ImportJob,
    source: &Path,
    settings: &ImportSettings,
) -> Result<ImportProgress, RunFailure> {
    let fail = |e| RunFailure::new(ImportProgress::default(), e);

    let records = decoder::open_dataset(source, settings.decoder).map_err(fail)?;

    let mut tx = store
        .begin()
        .await
        .map_err(|e| fail(ImportError::store("begin transaction", e)))?;

    if let Err(e) = tx.create_staging().await {
        rollback(tx).await;
        return Err(fail(ImportError::store("create staging table", e)));
    }

    let (sender, mut rx) = mpsc::channel(DECODE_CHANNEL_DEPTH.min(settings.batch_size).max(1));
    let worker = tokio::task::spawn_blocking(move || {
        for item in records {
            let last = item.is_err();
            if sender.blocking_send(item).is_err() || last {
                break;
            }
        }
    });

    let (progress, staged) = {
        let mut loader = BatchLoader::new(&mut tx, job, settings.batch_size);
        let res = stage_records(&mut loader, &mut rx).await;
        (loader.progress(), res)
    };
    drop(rx);

    let staged = match staged {
        Ok(()) => worker
            .await
            .map_err(|e| ImportError::Worker(e.to_string())),
        Err(e) => Err(e),
    };
    if let Err(e) = staged {
        rollback(tx).await;
        return Err(RunFailure::new(progress, e));
    }

    let merged = match tx.merge().await {
        Ok(n) => n,
        Err(e) => {
            rollback(tx).await;
            return Err(RunFailure::new(
                progress,
                ImportError::Merge {
                    reason: format!("{e:#}"),
                },
            ));
        }
    };
    info!(
        source_file = %source.display(),
        staged_rows = progress.upserted,
        merged_rows = merged,
        "merged staging into catalog"
    );

    tx.commit().await.map_err(|e| {
        RunFailure::new(
            progress,
            ImportError::Commit {
                reason: format!("{e:#}"),
            },
        )
    })?;

    let done = ImportProgress {
        processed: progress.processed,
        upserted: merged,
    };
    job.update_progress(done.processed, done.upserted);
    Ok(done)
}

async fn stage_records<T: ImportTx>(
    loader: &mut BatchLoader<'_, T>,
    rx: &mut mpsc::Receiver<ImportResult<DecodedRecord>>,
) -> ImportResult<()> {
    while let Some(item) = rx.recv().await {
        loader.push(item?).await?;
    }
    loader.finish().await.map(|_| ())
}

async fn rollback<T: ImportTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "rollback failed; transaction will be discarded on drop");
    }
}
