use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl ImportState {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportState::Idle => "idle",
            ImportState::Running => "running",
            ImportState::Succeeded => "succeeded",
            ImportState::Failed => "failed",
        }
    }
}

/// Point-in-time copy of the job, safe to hand across threads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportStatus {
    pub status: ImportState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub source_file: Option<PathBuf>,
    pub processed_rows: u64,
    pub upserted_rows: u64,
    pub error: String,
}

impl ImportStatus {
    pub fn is_running(&self) -> bool {
        self.status == ImportState::Running
    }
}

/// Process-wide import job state. The running flag is derived from `status`
/// so the two can never disagree.
#[derive(Debug, Default)]
pub struct ImportJob {
    inner: Mutex<ImportStatus>,
    cancel: AtomicBool,
}

impl ImportJob {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the fields consistent (every
    // mutation is a plain field store), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, ImportStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the job for a new run. Returns `false` without touching
    /// anything when a run is already in flight.
    pub fn start_if_idle(&self, source_file: &Path) -> bool {
        let mut s = self.lock();
        if s.is_running() {
            return false;
        }
        *s = ImportStatus {
            status: ImportState::Running,
            started_at: Some(Utc::now()),
            finished_at: None,
            source_file: Some(source_file.to_path_buf()),
            processed_rows: 0,
            upserted_rows: 0,
            error: String::new(),
        };
        self.cancel.store(false, Ordering::SeqCst);
        true
    }

    pub fn update_progress(&self, processed: u64, upserted: u64) {
        let mut s = self.lock();
        if !s.is_running() {
            return;
        }
        s.processed_rows = s.processed_rows.max(processed);
        s.upserted_rows = s.upserted_rows.max(upserted);
    }

    pub fn finish_success(&self, processed: u64, upserted: u64) {
        let mut s = self.lock();
        s.status = ImportState::Succeeded;
        s.finished_at = Some(Utc::now());
        s.processed_rows = processed;
        s.upserted_rows = upserted;
        s.error.clear();
    }

    /// Records a failed run. Counters never drop below what progress updates
    /// already published, and the whole transition happens under one lock.
    pub fn finish_failure(&self, processed: u64, upserted: u64, message: impl Into<String>) {
        let mut s = self.lock();
        s.status = ImportState::Failed;
        s.finished_at = Some(Utc::now());
        s.processed_rows = s.processed_rows.max(processed);
        s.upserted_rows = s.upserted_rows.max(upserted);
        s.error = message.into();
    }

    pub fn snapshot(&self) -> ImportStatus {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// Asks the in-flight run to stop at its next batch boundary. Returns
    /// `false` when nothing is running.
    pub fn request_cancel(&self) -> bool {
        let s = self.lock();
        if !s.is_running() {
            return false;
        }
        self.cancel.store(true, Ordering::SeqCst);
        true
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn starts_idle() {
        let job = ImportJob::new();
        let snap = job.snapshot();
        assert_eq!(snap.status, ImportState::Idle);
        assert!(!job.is_running());
        assert!(snap.started_at.is_none());
    }

    #[test]
    fn second_start_is_rejected_without_mutation() {
        let job = ImportJob::new();
        assert!(job.start_if_idle(Path::new("data/a.json.gz")));
        job.update_progress(10, 10);
        let before = job.snapshot();

        assert!(!job.start_if_idle(Path::new("data/b.json.gz")));
        assert_eq!(job.snapshot(), before);
    }

    #[test]
    fn concurrent_starts_admit_exactly_one() {
        let job = Arc::new(ImportJob::new());
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let job = Arc::clone(&job);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    job.start_if_idle(Path::new(&format!("data/{i}.json.gz")))
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        let snap = job.snapshot();
        assert_eq!(snap.processed_rows, 0);
        assert!(snap.error.is_empty());
    }

    #[test]
    fn running_snapshot_has_no_finish_time() {
        let job = ImportJob::new();
        job.start_if_idle(Path::new("x.json.gz"));
        let snap = job.snapshot();
        assert_eq!(snap.status, ImportState::Running);
        assert!(snap.started_at.is_some());
        assert!(snap.finished_at.is_none());
    }

    #[test]
    fn success_sets_finish_time_and_clears_error() {
        let job = ImportJob::new();
        job.start_if_idle(Path::new("x.json.gz"));
        job.finish_success(5, 5);
        let snap = job.snapshot();
        assert_eq!(snap.status, ImportState::Succeeded);
        assert!(snap.finished_at.is_some());
        assert_eq!(snap.error, "");
        assert_eq!((snap.processed_rows, snap.upserted_rows), (5, 5));
        assert!(!job.is_running());
    }

    #[test]
    fn failure_keeps_highest_published_counters() {
        let job = ImportJob::new();
        job.start_if_idle(Path::new("x.json.gz"));
        job.update_progress(20_000, 20_000);
        job.finish_failure(20_004, 0, "line 20005: invalid JSON");
        let snap = job.snapshot();
        assert_eq!(snap.status, ImportState::Failed);
        assert_eq!(snap.processed_rows, 20_004);
        assert_eq!(snap.upserted_rows, 20_000);
        assert_eq!(snap.error, "line 20005: invalid JSON");
    }

    #[test]
    fn progress_is_monotonic_and_ignored_when_idle() {
        let job = ImportJob::new();
        job.update_progress(7, 7);
        assert_eq!(job.snapshot().processed_rows, 0);

        job.start_if_idle(Path::new("x.json.gz"));
        job.update_progress(10, 10);
        job.update_progress(4, 4);
        assert_eq!(job.snapshot().processed_rows, 10);
    }

    #[test]
    fn restart_resets_counters_and_error() {
        let job = ImportJob::new();
        job.start_if_idle(Path::new("a.json.gz"));
        job.finish_failure(3, 0, "boom");
        assert!(job.start_if_idle(Path::new("b.json.gz")));
        let snap = job.snapshot();
        assert_eq!(snap.processed_rows, 0);
        assert_eq!(snap.error, "");
        assert_eq!(snap.source_file.as_deref(), Some(Path::new("b.json.gz")));
    }

    #[test]
    fn cancel_only_applies_to_running_job() {
        let job = ImportJob::new();
        assert!(!job.request_cancel());
        job.start_if_idle(Path::new("a.json.gz"));
        assert!(job.request_cancel());
        assert!(job.cancel_requested());
        job.finish_failure(0, 0, "movie import cancelled");
        job.start_if_idle(Path::new("a.json.gz"));
        assert!(!job.cancel_requested());
    }
}
