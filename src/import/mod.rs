//! Bulk movie-id catalog import.
//!
//! A run streams the newest `*.json.gz` export from the data directory into a
//! transaction-scoped staging table, then upserts it into `movie_ids` and
//! commits. At most one run is active per process.

pub mod decoder;
pub mod error;
pub mod job;
pub mod loader;
pub mod locator;
pub mod record;
pub mod runner;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use error::{ImportError, ImportResult};
pub use job::{ImportJob, ImportState, ImportStatus};
pub use record::CatalogRecord;
pub use runner::{run_import, ImportService, ImportSettings, StartOutcome};
pub use store::{CatalogStore, ImportTx, PgCatalogStore};
