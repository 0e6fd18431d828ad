//! In-memory `CatalogStore` for tests: records bulk-load calls and can be
//! told to fail at specific steps.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::record::CatalogRecord;
use super::store::{CatalogStore, ImportTx};

#[derive(Debug, Default, Clone)]
pub(crate) struct Faults {
    pub fail_begin: bool,
    /// 1-based index of the non-empty bulk load that should fail.
    pub fail_bulk_load_at: Option<usize>,
    pub fail_merge: bool,
    pub fail_commit: bool,
}

#[derive(Default)]
struct Inner {
    catalog: BTreeMap<i32, CatalogRecord>,
    bulk_loads: Vec<usize>,
    commits: usize,
    rollbacks: usize,
    faults: Faults,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryCatalogStore {
    inner: Arc<Mutex<Inner>>,
    begin_gate: Option<Arc<Notify>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().faults = faults;
        store
    }

    /// `begin` waits for the returned handle to be notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.begin_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn seed(&self, rows: impl IntoIterator<Item = CatalogRecord>) {
        let mut inner = self.inner.lock().unwrap();
        for r in rows {
            inner.catalog.insert(r.id, r);
        }
    }

    pub fn catalog(&self) -> BTreeMap<i32, CatalogRecord> {
        self.inner.lock().unwrap().catalog.clone()
    }

    pub fn bulk_load_sizes(&self) -> Vec<usize> {
        self.inner.lock().unwrap().bulk_loads.clone()
    }

    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.lock().unwrap().rollbacks
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        if let Some(gate) = &self.begin_gate {
            gate.notified().await;
        }
        if self.inner.lock().unwrap().faults.fail_begin {
            bail!("connection refused");
        }
        Ok(MemoryTx {
            inner: Arc::clone(&self.inner),
            staging: None,
            merged: None,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct MemoryTx {
    inner: Arc<Mutex<Inner>>,
    staging: Option<Vec<CatalogRecord>>,
    merged: Option<BTreeMap<i32, CatalogRecord>>,
}

#[async_trait]
impl ImportTx for MemoryTx {
    async fn create_staging(&mut self) -> Result<()> {
        if self.staging.is_some() {
            bail!("relation \"movie_ids_import_staging\" already exists");
        }
        self.staging = Some(Vec::new());
        Ok(())
    }

    async fn bulk_load(&mut self, rows: &[CatalogRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let staging = self
            .staging
            .as_mut()
            .ok_or_else(|| anyhow!("staging table does not exist"))?;
        let mut inner = self.inner.lock().unwrap();
        inner.bulk_loads.push(rows.len());
        if inner.faults.fail_bulk_load_at == Some(inner.bulk_loads.len()) {
            bail!("value too long for type numeric(10,4)");
        }
        staging.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn merge(&mut self) -> Result<u64> {
        let staging = self
            .staging
            .take()
            .ok_or_else(|| anyhow!("staging table does not exist"))?;
        let inner = self.inner.lock().unwrap();
        if inner.faults.fail_merge {
            bail!("deadlock detected");
        }
        let mut seen = HashSet::new();
        let mut next = inner.catalog.clone();
        for row in staging {
            if !seen.insert(row.id) {
                bail!("ON CONFLICT DO UPDATE command cannot affect row a second time");
            }
            next.insert(row.id, row);
        }
        let written = seen.len() as u64;
        self.merged = Some(next);
        Ok(written)
    }

    async fn commit(self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.faults.fail_commit {
            inner.rollbacks += 1;
            bail!("could not serialize access");
        }
        if let Some(next) = self.merged {
            inner.catalog = next;
        }
        inner.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.inner.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}
