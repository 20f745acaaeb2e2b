use {
    crate::{
        error::{Result, StoreError},
        Key, Value,
    },
    std::{
        collections::BTreeMap,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc, RwLock,
        },
    },
};

/// Net effect of the flushed layers; `None` deletes the key.
pub type WriteBatch = BTreeMap<Key, Option<Value>>;

/// Durable storage under the versioned store.
pub trait Persistence: Send + Sync {
    /// Everything previously persisted, read once when the store opens.
    fn load(&self) -> Result<Vec<(Key, Value)>>;

    /// Persist a batch atomically.
    fn write_batch(&self, batch: &WriteBatch) -> Result<()>;
}

/// In-memory backend. Clones share the same data, so a test can keep a
/// handle to inspect what was flushed or to inject write failures.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Key, Value>>>,
    fail_writes: Arc<AtomicBool>,
    batches_written: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `write_batch` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.data.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written.load(Ordering::Acquire)
    }
}

impl Persistence for MemoryBackend {
    fn load(&self) -> Result<Vec<(Key, Value)>> {
        Ok(self
            .data
            .read()
            .unwrap()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(StoreError::Persistence(
                "memory backend configured to fail".to_string(),
            ));
        }
        let mut data = self.data.write().unwrap();
        for (key, value) in batch {
            match value {
                Some(value) => data.insert(key.clone(), value.clone()),
                None => data.remove(key),
            };
        }
        self.batches_written.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
