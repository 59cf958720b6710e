use crate::storage::{SqliteStorage, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use deadpool::managed::{self, Metrics, Object, Pool, PoolError, RecycleResult};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// Opens and recycles SQLite connections for the pool
#[derive(Debug)]
pub struct StorageManager {
    path: PathBuf,
}

#[async_trait]
impl managed::Manager for StorageManager {
    type Type = SqliteStorage;
    type Error = StorageError;

    async fn create(&self) -> Result<SqliteStorage, StorageError> {
        SqliteStorage::open(&self.path)
    }

    async fn recycle(&self, storage: &mut SqliteStorage, _: &Metrics) -> RecycleResult<StorageError> {
        // A job that died before finishing may have left rows staged
        storage.begin_staging()?;
        Ok(())
    }
}

/// A connection checked out of a [`StoragePool`]; returned on drop
pub type PooledStorage = Object<StorageManager>;

/// Bounded set of SQLite connections shared by concurrent jobs
///
/// At most `size` connections are checked out at once; returned
/// connections are kept and reused. The schema is created exactly once per
/// pool, by whichever job gets a connection first.
pub struct StoragePool {
    path: PathBuf,
    pool: Pool<StorageManager>,
    schema: OnceCell<()>,
}

impl StoragePool {
    pub fn new(path: impl Into<PathBuf>, size: u32) -> StorageResult<Self> {
        let path = path.into();
        let manager = StorageManager { path: path.clone() };
        let pool = Pool::builder(manager)
            .max_size(size.max(1) as usize)
            .build()
            .map_err(|e| StorageError::Pool(e.to_string()))?;

        Ok(Self {
            path,
            pool,
            schema: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for a free slot and hands out a connection
    pub async fn acquire(&self) -> StorageResult<PooledStorage> {
        let mut storage = self.pool.get().await.map_err(|e| match e {
            PoolError::Backend(e) => e,
            PoolError::Closed => StorageError::PoolClosed,
            other => StorageError::Pool(other.to_string()),
        })?;

        let conn: &mut SqliteStorage = &mut storage;
        self.schema
            .get_or_try_init(|| async move { conn.ensure_schema() })
            .await?;

        Ok(storage)
    }

    /// Number of connections waiting to be reused
    pub fn idle_count(&self) -> usize {
        self.pool.status().available as usize
    }

    /// Stops handing out connections; pending `acquire` calls fail
    pub fn close(&self) {
        self.pool.close();
    }
}
