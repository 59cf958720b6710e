//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::JobReport;
use crate::record::{Price, ProductRecord};
use crate::storage::schema::{initialize_schema, initialize_staging};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BrandCount, FieldCoverage, JobRecord, ProductPage, ProductQuery, StoredRow, MAX_PAGE_SIZE,
    MIN_SEARCH_LEN,
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const PRODUCT_COLUMNS: &str =
    "id, name, brand, price, unit_price, unit_label, size, promo, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a database file
    ///
    /// The schema is not touched here; see [`Storage::ensure_schema`].
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // WAL lets readers run while a job commits
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Sets how long a statement waits on a locked database before failing
    pub fn set_busy_timeout(&self, timeout: Duration) -> StorageResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }
}

/// Amounts are bound as decimal text; below [`Price::MAX`] the column's
/// double always rounds back to the same cent
fn price_from_row(value: Option<f64>) -> Option<Price> {
    value.and_then(Price::from_f64)
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        name: row.get(1)?,
        brand: row.get(2)?,
        price: price_from_row(row.get(3)?),
        unit_price: price_from_row(row.get(4)?),
        unit_label: row.get(5)?,
        size: row.get(6)?,
        promo: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Schema =====

    fn ensure_schema(&mut self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    // ===== Staging =====

    fn begin_staging(&mut self) -> StorageResult<()> {
        initialize_staging(&self.conn)?;
        Ok(())
    }

    fn stage_product(&mut self, record: &ProductRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO temp.staged_products (name, brand, price, unit_price, unit_label, size, promo)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.name,
                record.brand,
                record.price.map(|p| p.to_string()),
                record.unit_price.map(|p| p.to_string()),
                record.unit_label,
                record.size,
                record.promo,
            ],
        )?;
        Ok(())
    }

    fn staged_count(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM temp.staged_products", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    fn commit_staged(&mut self) -> StorageResult<u64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let moved = tx.execute(
            "INSERT INTO products (name, brand, price, unit_price, unit_label, size, promo)
             SELECT name, brand, price, unit_price, unit_label, size, promo
             FROM temp.staged_products ORDER BY seq",
            [],
        )?;
        tx.execute("DELETE FROM temp.staged_products", [])?;
        tx.commit()?;

        Ok(moved as u64)
    }

    fn discard_staged(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM temp.staged_products", [])?;
        Ok(())
    }

    // ===== Job Bookkeeping =====

    fn record_job(&mut self, report: &JobReport, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_jobs (source, state, reason, pages_fetched, records_extracted,
             extraction_rejects, validation_rejects, records_staged, records_committed,
             persistence_failures, started_at, finished_at, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                report.source,
                report.state.to_db_string(),
                report.reason,
                report.pages_fetched,
                report.records_extracted as i64,
                report.extraction_rejects as i64,
                report.validation_rejects as i64,
                report.records_staged as i64,
                report.records_committed as i64,
                report.persistence_failures.len() as i64,
                report.started_at.to_rfc3339(),
                report.finished_at.to_rfc3339(),
                config_hash,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, state, reason, pages_fetched, records_committed,
             persistence_failures, started_at, finished_at, config_hash
             FROM crawl_jobs ORDER BY id DESC LIMIT ?1",
        )?;

        let jobs = stmt
            .query_map(params![limit], |row| {
                Ok(JobRecord {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    state: row.get(2)?,
                    reason: row.get(3)?,
                    pages_fetched: row.get(4)?,
                    records_committed: row.get::<_, i64>(5)? as u64,
                    persistence_failures: row.get::<_, i64>(6)? as u64,
                    started_at: row.get(7)?,
                    finished_at: row.get(8)?,
                    config_hash: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    // ===== Queries =====

    fn get_product(&self, id: i64) -> StorageResult<Option<StoredRow>> {
        let product = self
            .conn
            .query_row(
                &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
                params![id],
                row_to_product,
            )
            .optional()?;
        Ok(product)
    }

    fn list_products(&self, query: &ProductQuery) -> StorageResult<ProductPage> {
        let limit = query.effective_limit();
        let brand = query
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());

        // instr() instead of LIKE so '%' and '_' in the filter are literal
        let filter = "?1 IS NULL OR instr(lower(brand), lower(?1)) > 0";

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM products WHERE {}", filter),
            params![brand],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM products WHERE {} ORDER BY name, id LIMIT ?2 OFFSET ?3",
            PRODUCT_COLUMNS, filter
        ))?;
        let records = stmt
            .query_map(params![brand, limit, query.offset], row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProductPage {
            records,
            total: total as u64,
            limit,
            offset: query.offset,
        })
    }

    fn search_products(&self, term: &str, limit: u32) -> StorageResult<Vec<StoredRow>> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_LEN {
            return Err(StorageError::InvalidQuery(format!(
                "search term must be at least {} characters",
                MIN_SEARCH_LEN
            )));
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM products WHERE instr(lower(name), lower(?1)) > 0
             ORDER BY name, id LIMIT ?2",
            PRODUCT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![term, limit.clamp(1, MAX_PAGE_SIZE)], row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn brand_counts(&self) -> StorageResult<Vec<BrandCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT brand, COUNT(*) FROM products WHERE brand IS NOT NULL
             GROUP BY brand ORDER BY COUNT(*) DESC, brand",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(BrandCount {
                    brand: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn count_products(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn field_coverage(&self) -> StorageResult<FieldCoverage> {
        let coverage = self.conn.query_row(
            "SELECT COUNT(*), COUNT(brand), COUNT(price), COUNT(unit_price), COUNT(size),
             COUNT(promo), MIN(price), MAX(price), AVG(price)
             FROM products",
            [],
            |row| {
                Ok(FieldCoverage {
                    total: row.get::<_, i64>(0)? as u64,
                    with_brand: row.get::<_, i64>(1)? as u64,
                    with_price: row.get::<_, i64>(2)? as u64,
                    with_unit_price: row.get::<_, i64>(3)? as u64,
                    with_size: row.get::<_, i64>(4)? as u64,
                    with_promo: row.get::<_, i64>(5)? as u64,
                    min_price: price_from_row(row.get(6)?),
                    max_price: price_from_row(row.get(7)?),
                    average_price: row.get(8)?,
                })
            },
        )?;
        Ok(coverage)
    }
}
