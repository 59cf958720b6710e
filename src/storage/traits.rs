//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::output::JobReport;
use crate::record::ProductRecord;
use crate::storage::{BrandCount, FieldCoverage, JobRecord, ProductPage, ProductQuery, StoredRow};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Busy/locked conditions clear up on their own and are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Failure to persist harvested records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// One record could not be stored; the batch goes on
    #[error("insert of '{name}' failed: {message}")]
    Insert { name: String, message: String },

    /// The database stayed busy through every retry
    #[error("gave up after {attempts} attempt(s): {message}")]
    Exhausted { attempts: u32, message: String },

    /// The per-connection staging area could not be prepared
    #[error("could not prepare staging: {0}")]
    Staging(String),

    /// Moving staged records into the products table failed
    #[error("commit failed: {0}")]
    Commit(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes go through a per-connection staging area so a job's records are
/// published together by [`Storage::commit_staged`].
pub trait Storage: Send {
    // ===== Schema =====

    /// Creates tables and indexes if they do not exist
    fn ensure_schema(&mut self) -> StorageResult<()>;

    // ===== Staging =====

    /// Prepares an empty staging area on this connection
    fn begin_staging(&mut self) -> StorageResult<()>;

    /// Stages one record; not visible to readers until committed
    fn stage_product(&mut self, record: &ProductRecord) -> StorageResult<()>;

    /// Number of records currently staged
    fn staged_count(&self) -> StorageResult<u64>;

    /// Moves every staged record into `products` in one transaction
    ///
    /// # Returns
    ///
    /// The number of records published
    fn commit_staged(&mut self) -> StorageResult<u64>;

    /// Drops staged records without publishing them
    fn discard_staged(&mut self) -> StorageResult<()>;

    // ===== Job Bookkeeping =====

    /// Records a finished job
    fn record_job(&mut self, report: &JobReport, config_hash: &str) -> StorageResult<i64>;

    /// Most recent jobs first
    fn recent_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>>;

    // ===== Queries =====

    /// Gets one product by ID
    fn get_product(&self, id: i64) -> StorageResult<Option<StoredRow>>;

    /// Lists products ordered by name, with an optional brand filter
    fn list_products(&self, query: &ProductQuery) -> StorageResult<ProductPage>;

    /// Products whose name contains `term`
    fn search_products(&self, term: &str, limit: u32) -> StorageResult<Vec<StoredRow>>;

    /// Distinct brands with their product counts, most common first
    fn brand_counts(&self) -> StorageResult<Vec<BrandCount>>;

    /// Counts the total number of stored products
    fn count_products(&self) -> StorageResult<u64>;

    /// How many stored products carry each optional field
    fn field_coverage(&self) -> StorageResult<FieldCoverage>;
}
