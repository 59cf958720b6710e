//! Storage module for persisting harvested records
//!
//! This module handles all database operations, including:
//! - SQLite initialization and idempotent schema creation
//! - Per-job staging and the single end-of-job commit
//! - The bounded connection pool shared by concurrent jobs
//! - The read-only query surface over the `products` table

mod loader;
mod pool;
mod schema;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use loader::{IngestionLoader, LoadSummary, RecordFailure};
pub use pool::{PooledStorage, StoragePool};
pub use sqlite::SqliteStorage;
pub use traits::{PersistenceError, Storage, StorageError, StorageResult};

use crate::record::Price;
use serde::Serialize;
use std::path::Path;

/// Largest page size the query surface hands out
pub const MAX_PAGE_SIZE: u32 = 100;

/// Shortest accepted search term
pub const MIN_SEARCH_LEN: usize = 2;

/// Opens a storage database and makes sure the schema exists
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    let mut storage = SqliteStorage::open(path)?;
    storage.ensure_schema()?;
    Ok(storage)
}

/// A persisted product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub price: Option<Price>,
    pub unit_price: Option<Price>,
    pub unit_label: Option<String>,
    pub size: Option<String>,
    pub promo: Option<String>,
    pub created_at: String,
}

/// Parameters of a product listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// Case-insensitive substring of the brand
    pub brand: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ProductQuery {
    /// Limit clamped to `1..=MAX_PAGE_SIZE`
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            brand: None,
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of a product listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPage {
    pub records: Vec<StoredRow>,

    /// Matching products across all pages
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandCount {
    pub brand: String,
    pub count: u64,
}

/// How complete the stored records are
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldCoverage {
    pub total: u64,
    pub with_brand: u64,
    pub with_price: u64,
    pub with_unit_price: u64,
    pub with_size: u64,
    pub with_promo: u64,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub average_price: Option<f64>,
}

/// A row of the `crawl_jobs` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub id: i64,
    pub source: String,
    pub state: String,
    pub reason: Option<String>,
    pub pages_fetched: u32,
    pub records_committed: u64,
    pub persistence_failures: u64,
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
}
