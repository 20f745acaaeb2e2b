//! Durable [`Persistence`] on RocksDB. Every flushed key is one row of the
//! default column family.

use {
    crate::{
        backend::{Persistence, WriteBatch},
        error::{Result, StoreError},
        Key, Value,
    },
    log::*,
    rocksdb::{IteratorMode, Options, WriteOptions, DB},
    std::path::{Path, PathBuf},
};

fn persistence_error(err: rocksdb::Error) -> StoreError {
    StoreError::Persistence(err.to_string())
}

pub struct RocksBackend {
    db: DB,
    path: PathBuf,
}

impl RocksBackend {
    /// Opens the database at `path`, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path).map_err(persistence_error)?;
        info!("opened state database at {:?}", path);
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for RocksBackend {
    fn load(&self) -> Result<Vec<(Key, Value)>> {
        self.db
            .iterator(IteratorMode::Start)
            .map(|entry| {
                entry
                    .map(|(key, value)| (key.into_vec(), value.into_vec()))
                    .map_err(persistence_error)
            })
            .collect()
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<()> {
        let mut write_batch = rocksdb::WriteBatch::default();
        for (key, value) in batch {
            match value {
                Some(value) => write_batch.put(key, value),
                None => write_batch.delete(key),
            }
        }
        // a flushed layer is dropped from memory right after this returns
        let mut write_options = WriteOptions::default();
        write_options.set_sync(true);
        self.db
            .write_opt(write_batch, &write_options)
            .map_err(persistence_error)?;
        trace!("persisted {} keys to {:?}", batch.len(), self.path);
        Ok(())
    }
}
