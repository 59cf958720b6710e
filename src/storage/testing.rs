//! In-memory storage that fails on demand

use crate::output::JobReport;
use crate::record::ProductRecord;
use crate::storage::{
    BrandCount, FieldCoverage, JobRecord, ProductPage, ProductQuery, SqliteStorage, Storage,
    StorageError, StorageResult, StoredRow,
};

fn busy() -> StorageError {
    StorageError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        None,
    ))
}

/// Wraps an in-memory database; staging misbehaves as configured
pub(crate) struct FlakyStorage {
    pub inner: SqliteStorage,

    /// `begin_staging` fails with a non-transient error
    pub broken_staging: bool,

    /// Staging reports a busy database once this many records are staged
    pub busy_after: Option<u64>,

    staged: u64,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self {
            inner: SqliteStorage::new_in_memory().unwrap(),
            broken_staging: false,
            busy_after: None,
            staged: 0,
        }
    }
}

impl Storage for FlakyStorage {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        self.inner.ensure_schema()
    }

    fn begin_staging(&mut self) -> StorageResult<()> {
        if self.broken_staging {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "temp store is read-only",
            )));
        }
        self.inner.begin_staging()
    }

    fn stage_product(&mut self, record: &ProductRecord) -> StorageResult<()> {
        if matches!(self.busy_after, Some(limit) if self.staged >= limit) {
            return Err(busy());
        }
        self.inner.stage_product(record)?;
        self.staged += 1;
        Ok(())
    }

    fn staged_count(&self) -> StorageResult<u64> {
        self.inner.staged_count()
    }

    fn commit_staged(&mut self) -> StorageResult<u64> {
        self.inner.commit_staged()
    }

    fn discard_staged(&mut self) -> StorageResult<()> {
        self.inner.discard_staged()
    }

    fn record_job(&mut self, report: &JobReport, config_hash: &str) -> StorageResult<i64> {
        self.inner.record_job(report, config_hash)
    }

    fn recent_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>> {
        self.inner.recent_jobs(limit)
    }

    fn get_product(&self, id: i64) -> StorageResult<Option<StoredRow>> {
        self.inner.get_product(id)
    }

    fn list_products(&self, query: &ProductQuery) -> StorageResult<ProductPage> {
        self.inner.list_products(query)
    }

    fn search_products(&self, term: &str, limit: u32) -> StorageResult<Vec<StoredRow>> {
        self.inner.search_products(term, limit)
    }

    fn brand_counts(&self) -> StorageResult<Vec<BrandCount>> {
        self.inner.brand_counts()
    }

    fn count_products(&self) -> StorageResult<u64> {
        self.inner.count_products()
    }

    fn field_coverage(&self) -> StorageResult<FieldCoverage> {
        self.inner.field_coverage()
    }
}
