//! Database schema definitions
//!
//! `products` is the table the query side reads; its shape is fixed.
//! `crawl_jobs` is crawler bookkeeping. `staged_products` lives in the
//! connection's TEMP schema and is never visible to other connections.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested promotional products (append-only snapshots)
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    brand TEXT,
    price DECIMAL(10,2) CHECK (price IS NULL OR price >= 0),
    unit_price DECIMAL(10,2) CHECK (unit_price IS NULL OR unit_price >= 0),
    unit_label TEXT,
    size TEXT,
    promo TEXT,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand);

-- One row per finished crawl job
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    state TEXT NOT NULL,
    reason TEXT,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    records_extracted INTEGER NOT NULL DEFAULT 0,
    extraction_rejects INTEGER NOT NULL DEFAULT 0,
    validation_rejects INTEGER NOT NULL DEFAULT 0,
    records_staged INTEGER NOT NULL DEFAULT 0,
    records_committed INTEGER NOT NULL DEFAULT 0,
    persistence_failures INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_source ON crawl_jobs(source);
"#;

/// Connection-local staging area for one job's records
pub const STAGING_SQL: &str = r#"
CREATE TEMP TABLE IF NOT EXISTS staged_products (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    brand TEXT,
    price REAL CHECK (price IS NULL OR price >= 0),
    unit_price REAL CHECK (unit_price IS NULL OR unit_price >= 0),
    unit_label TEXT,
    size TEXT,
    promo TEXT
);
"#;

/// Initializes the database schema
///
/// Safe to run any number of times, from any number of connections.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Creates this connection's staging table if needed and empties it
pub fn initialize_staging(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(STAGING_SQL)?;
    conn.execute("DELETE FROM temp.staged_products", [])?;
    Ok(())
}
