use crate::record::ProductRecord;
use crate::storage::{PersistenceError, Storage, StorageError};
use serde::Serialize;
use std::time::Duration;

/// Pause before the first retry of a busy database; grows linearly
const RETRY_STEP: Duration = Duration::from_millis(50);

/// A record that could not be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub name: String,
    pub message: String,
}

/// Outcome of one job's ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Records handed to the loader
    pub attempted: u64,

    /// Records staged successfully
    pub staged: u64,

    /// Records published by the final commit
    pub inserted: u64,

    /// Per-record failures; the batch went on without them
    pub failures: Vec<RecordFailure>,

    /// Set when the final commit failed, in which case nothing was published
    pub commit_error: Option<PersistenceError>,
}

/// Streams one job's records into storage
///
/// Records are staged as they arrive and published together by
/// [`IngestionLoader::finish`]. If the process dies first, the staged
/// records are lost with the connection.
pub struct IngestionLoader<'a> {
    storage: &'a mut dyn Storage,
    source: String,
    max_retries: u32,
    summary: LoadSummary,
}

impl<'a> IngestionLoader<'a> {
    /// Opens a fresh staging area on `storage`
    pub fn begin(
        storage: &'a mut dyn Storage,
        source: &str,
        max_retries: u32,
    ) -> Result<Self, PersistenceError> {
        storage
            .begin_staging()
            .map_err(|e| PersistenceError::Staging(e.to_string()))?;

        Ok(Self {
            storage,
            source: source.to_string(),
            max_retries,
            summary: LoadSummary::default(),
        })
    }

    /// Stages one record
    ///
    /// Returns `Ok(false)` when this record alone failed; it is logged and
    /// listed in the summary. Returns an error only when the database stayed
    /// busy through every retry, which should stop the job.
    pub async fn ingest(&mut self, record: &ProductRecord) -> Result<bool, PersistenceError> {
        self.summary.attempted += 1;

        let mut attempt = 0;
        loop {
            match self.storage.stage_product(record) {
                Ok(()) => {
                    self.summary.staged += 1;
                    return Ok(true);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "[{}] database busy staging '{}', retry {}/{}",
                        self.source,
                        record.name,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(RETRY_STEP * attempt).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(PersistenceError::Exhausted {
                        attempts: attempt + 1,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let failure = PersistenceError::Insert {
                        name: record.name.clone(),
                        message: e.to_string(),
                    };
                    tracing::warn!("[{}] {}", self.source, failure);
                    self.summary.failures.push(RecordFailure {
                        name: record.name.clone(),
                        message: e.to_string(),
                    });
                    return Ok(false);
                }
            }
        }
    }

    /// Publishes every staged record in one transaction
    pub async fn finish(mut self) -> LoadSummary {
        let mut attempt = 0;
        let result = loop {
            match self.storage.commit_staged() {
                Ok(count) => break Ok(count),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "[{}] database busy committing, retry {}/{}",
                        self.source,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(RETRY_STEP * attempt).await;
                }
                Err(e) => break Err(self.commit_failure(e, attempt + 1)),
            }
        };

        match result {
            Ok(count) => {
                self.summary.inserted = count;
                tracing::debug!("[{}] committed {} record(s)", self.source, count);
            }
            Err(error) => {
                tracing::error!("[{}] {}", self.source, error);
                if let Err(e) = self.storage.discard_staged() {
                    tracing::warn!("[{}] could not clear staging: {}", self.source, e);
                }
                self.summary.commit_error = Some(error);
            }
        }

        self.summary
    }

    fn commit_failure(&self, error: StorageError, attempts: u32) -> PersistenceError {
        if error.is_transient() {
            PersistenceError::Exhausted {
                attempts,
                message: error.to_string(),
            }
        } else {
            PersistenceError::Commit(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Price;
    use crate::storage::testing::FlakyStorage;
    use crate::storage::SqliteStorage;

    fn record(name: &str) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            brand: Some("Marque".to_string()),
            price: Some(Price::from_cents(250)),
            unit_price: None,
            unit_label: None,
            size: None,
            promo: None,
            source: "test".to_string(),
            page: 1,
            source_url: "https://shop.example.com/".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ingest_and_commit() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut loader = IngestionLoader::begin(&mut storage, "test", 3).unwrap();

        for name in ["A", "B", "C"] {
            assert!(loader.ingest(&record(name)).await.unwrap());
        }
        let summary = loader.finish().await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.staged, 3);
        assert_eq!(summary.inserted, 3);
        assert!(summary.failures.is_empty());
        assert!(summary.commit_error.is_none());
        assert_eq!(storage.count_products().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_one_failing_insert_does_not_stop_batch() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut loader = IngestionLoader::begin(&mut storage, "test", 3).unwrap();

        assert!(loader.ingest(&record("A")).await.unwrap());
        assert!(!loader.ingest(&record("   ")).await.unwrap());
        assert!(loader.ingest(&record("C")).await.unwrap());
        let summary = loader.finish().await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(storage.count_products().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_nothing_published_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promos.db");
        let mut writer = crate::storage::open_storage(&path).unwrap();
        let reader = crate::storage::open_storage(&path).unwrap();

        let mut loader = IngestionLoader::begin(&mut writer, "test", 3).unwrap();
        loader.ingest(&record("A")).await.unwrap();
        assert_eq!(reader.count_products().unwrap(), 0);

        loader.finish().await;
        assert_eq!(reader.count_products().unwrap(), 1);
    }

    #[test]
    fn test_staging_failure_is_not_a_commit_failure() {
        let mut storage = FlakyStorage::new();
        storage.broken_staging = true;

        let error = IngestionLoader::begin(&mut storage, "test", 3).err().unwrap();
        assert!(matches!(error, PersistenceError::Staging(_)));
        assert!(error.to_string().starts_with("could not prepare staging"));
    }

    #[tokio::test]
    async fn test_busy_staging_gives_up_after_retries() {
        let mut storage = FlakyStorage::new();
        storage.busy_after = Some(1);
        let mut loader = IngestionLoader::begin(&mut storage, "test", 2).unwrap();

        assert!(loader.ingest(&record("A")).await.unwrap());
        assert!(matches!(
            loader.ingest(&record("B")).await,
            Err(PersistenceError::Exhausted { attempts: 3, .. })
        ));

        let summary = loader.finish().await;
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.inserted, 1);
        assert_eq!(storage.count_products().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_gives_up_on_locked_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promos.db");
        let mut writer = crate::storage::open_storage(&path).unwrap();
        writer.set_busy_timeout(Duration::from_millis(10)).unwrap();

        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let mut loader = IngestionLoader::begin(&mut writer, "test", 1).unwrap();
        loader.ingest(&record("A")).await.unwrap();
        let summary = loader.finish().await;

        assert_eq!(summary.inserted, 0);
        assert!(matches!(
            summary.commit_error,
            Some(PersistenceError::Exhausted { attempts: 2, .. })
        ));

        blocker.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(writer.count_products().unwrap(), 0);
    }
}
