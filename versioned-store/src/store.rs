use {
    crate::{
        backend::{Persistence, WriteBatch},
        error::{Result, StoreError},
        flush_policy::FlushPolicy,
        session::Session,
        snapshot::Snapshot,
        Key, Value,
    },
    log::*,
    std::{
        collections::{HashMap, VecDeque},
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, RwLock,
        },
        time::Instant,
    },
};

/// Writes of one session; `None` is a tombstone.
pub(crate) type Layer = HashMap<Key, Option<Value>>;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(0);

/// Capability to open a top-level session. Exactly one exists per store and
/// it is not `Clone`, so at most one top-level session can be open at a
/// time.
#[derive(Debug)]
pub struct SessionToken {
    store_id: u64,
}

struct Committed {
    base: im::HashMap<Key, Value>,
    // oldest first
    sealed: VecDeque<Arc<Layer>>,
    // newest `revocable` layers of `sealed` can still be popped; a layer
    // that left this window never re-enters it
    revocable: usize,
    revocable_depth: usize,
    shutdown_deadline: Option<Instant>,
}

impl Committed {
    fn irreversible_len(&self) -> usize {
        self.sealed.len() - self.revocable
    }
}

pub struct VersionedStore {
    id: u64,
    committed: RwLock<Committed>,
    backend: Arc<dyn Persistence>,
    flush_policy: FlushPolicy,
}

impl VersionedStore {
    /// Opens a store over `backend`, loading what it holds as the base view.
    pub fn open(
        backend: Arc<dyn Persistence>,
        flush_policy: FlushPolicy,
    ) -> Result<(Self, SessionToken)> {
        let base: im::HashMap<Key, Value> = backend.load()?.into_iter().collect();
        debug!("versioned store opened with {} persisted keys", base.len());
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
        let store = Self {
            id,
            committed: RwLock::new(Committed {
                base,
                sealed: VecDeque::new(),
                revocable: 0,
                revocable_depth: 0,
                shutdown_deadline: None,
            }),
            backend,
            flush_policy,
        };
        Ok((store, SessionToken { store_id: id }))
    }

    fn check_token(&self, token: &SessionToken) -> Result<()> {
        if token.store_id == self.id {
            Ok(())
        } else {
            Err(StoreError::ForeignToken)
        }
    }

    /// Opens a top-level session. The token stays borrowed until the session
    /// is committed or dropped.
    pub fn build_session<'a>(&'a self, token: &'a mut SessionToken) -> Result<Session<'a>> {
        self.check_token(token)?;
        Ok(Session::new_root(self, self.snapshot(), token))
    }

    pub fn snapshot(&self) -> Snapshot {
        let committed = self.committed.read().unwrap();
        Snapshot::new(
            committed.base.clone(),
            committed.sealed.iter().cloned().collect(),
        )
    }

    /// Discards the newest revocable layer, undoing the last commit.
    pub fn pop(&self, token: &mut SessionToken) -> Result<()> {
        self.check_token(token)?;
        let mut committed = self.committed.write().unwrap();
        if committed.revocable == 0 {
            return Err(StoreError::NothingToPop);
        }
        committed.sealed.pop_back();
        committed.revocable -= 1;
        Ok(())
    }

    /// Keeps only the newest `depth` sealed layers revocable. Older layers
    /// are flushed by the next commit once enough of them accumulate.
    pub fn set_revocable_depth(&self, depth: usize) {
        let mut committed = self.committed.write().unwrap();
        committed.revocable_depth = depth;
        committed.revocable = committed.revocable.min(depth);
    }

    pub fn set_shutdown_deadline(&self, deadline: Option<Instant>) {
        self.committed.write().unwrap().shutdown_deadline = deadline;
    }

    pub fn revocable_len(&self) -> usize {
        self.committed.read().unwrap().revocable
    }

    pub fn sealed_len(&self) -> usize {
        self.committed.read().unwrap().sealed.len()
    }

    /// Flushes every sealed layer, revocable ones included. Used on orderly
    /// shutdown; nothing can be popped afterwards.
    pub fn flush_all(&self, token: &mut SessionToken) -> Result<()> {
        self.check_token(token)?;
        let mut committed = self.committed.write().unwrap();
        let count = committed.sealed.len();
        if count > 0 {
            self.flush(&mut committed, count)?;
        }
        committed.revocable = 0;
        info!("flushed {} layers on shutdown", count);
        Ok(())
    }

    /// Pushes a committed top-level layer. If this makes a flush due and the
    /// flush fails, the layer is removed again.
    pub(crate) fn seal(&self, layer: Layer) -> Result<()> {
        let mut committed = self.committed.write().unwrap();
        let revocable = committed.revocable;
        committed.sealed.push_back(Arc::new(layer));
        committed.revocable = (revocable + 1).min(committed.revocable_depth);

        let flush_count = self
            .flush_policy
            .flush_count(committed.shutdown_deadline, Instant::now());
        let irreversible = committed.irreversible_len();
        if irreversible >= flush_count {
            if let Err(err) = self.flush(&mut committed, irreversible) {
                error!("flush of {} layers failed: {}", irreversible, err);
                committed.sealed.pop_back();
                committed.revocable = revocable;
                return Err(err);
            }
        }
        Ok(())
    }

    fn flush(&self, committed: &mut Committed, count: usize) -> Result<()> {
        let mut batch = WriteBatch::new();
        for layer in committed.sealed.iter().take(count) {
            for (key, value) in layer.iter() {
                batch.insert(key.clone(), value.clone());
            }
        }
        self.backend.write_batch(&batch)?;

        for (key, value) in batch {
            match value {
                Some(value) => {
                    committed.base.insert(key, value);
                }
                None => {
                    committed.base.remove(&key);
                }
            }
        }
        committed.sealed.drain(..count);
        debug!("flushed {} layers", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{backend::MemoryBackend, KeyValueRead, KeyValueWrite},
        assert_matches::assert_matches,
        std::time::Duration,
    };

    fn open(policy: FlushPolicy) -> (VersionedStore, SessionToken, MemoryBackend) {
        let backend = MemoryBackend::new();
        let (store, token) = VersionedStore::open(Arc::new(backend.clone()), policy).unwrap();
        (store, token, backend)
    }

    fn never_flush() -> FlushPolicy {
        FlushPolicy {
            min_flush_count: usize::MAX,
            max_flush_count: usize::MAX,
            ..FlushPolicy::default()
        }
    }

    fn commit_put(store: &VersionedStore, token: &mut SessionToken, key: &[u8], value: &[u8]) {
        let mut session = store.build_session(token).unwrap();
        session.put(key.to_vec(), value.to_vec());
        session.commit().unwrap();
    }

    #[test]
    fn test_commit_is_visible_and_drop_rolls_back() {
        let (store, mut token, _backend) = open(never_flush());
        commit_put(&store, &mut token, b"a", b"1");
        assert_eq!(store.snapshot().get(b"a"), Some(b"1".to_vec()));

        {
            let mut session = store.build_session(&mut token).unwrap();
            session.put(b"a".to_vec(), b"2".to_vec());
            session.put(b"b".to_vec(), b"3".to_vec());
            assert_eq!(session.get(b"a"), Some(b"2".to_vec()));
        }
        let snapshot = store.snapshot();
        assert_eq!(snapshot.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(snapshot.get(b"b"), None);
        assert_eq!(store.sealed_len(), 1);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let (store, mut token, _backend) = open(FlushPolicy::default());
        store.set_revocable_depth(1);
        commit_put(&store, &mut token, b"a", b"1");
        let snapshot = store.snapshot();

        commit_put(&store, &mut token, b"a", b"2");
        commit_put(&store, &mut token, b"a", b"3");
        store.pop(&mut token).unwrap();
        store.flush_all(&mut token).unwrap();

        assert_eq!(snapshot.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(store.snapshot().get(b"a"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_pop_undoes_newest_revocable_layer() {
        let (store, mut token, _backend) = open(never_flush());
        store.set_revocable_depth(2);
        commit_put(&store, &mut token, b"a", b"1");
        commit_put(&store, &mut token, b"a", b"2");
        commit_put(&store, &mut token, b"a", b"3");

        store.pop(&mut token).unwrap();
        assert_eq!(store.snapshot().get(b"a"), Some(b"2".to_vec()));
        store.pop(&mut token).unwrap();
        assert_eq!(store.snapshot().get(b"a"), Some(b"1".to_vec()));
        // the oldest layer is irreversible
        assert_matches!(store.pop(&mut token), Err(StoreError::NothingToPop));
        assert_eq!(store.snapshot().get(b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_popping_never_revives_irreversible_layers() {
        let (store, mut token, _backend) = open(never_flush());
        store.set_revocable_depth(1);
        commit_put(&store, &mut token, b"a", b"1");
        commit_put(&store, &mut token, b"a", b"2");
        assert_eq!(store.revocable_len(), 1);

        store.pop(&mut token).unwrap();
        assert_eq!(store.revocable_len(), 0);
        assert_matches!(store.pop(&mut token), Err(StoreError::NothingToPop));
        assert_eq!(store.snapshot().get(b"a"), Some(b"1".to_vec()));

        commit_put(&store, &mut token, b"a", b"3");
        store.pop(&mut token).unwrap();
        assert_matches!(store.pop(&mut token), Err(StoreError::NothingToPop));
        assert_eq!(store.snapshot().get(b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_shrinking_depth_clamps_revocable_layers() {
        let (store, mut token, _backend) = open(never_flush());
        store.set_revocable_depth(3);
        commit_put(&store, &mut token, b"a", b"1");
        commit_put(&store, &mut token, b"a", b"2");
        assert_eq!(store.revocable_len(), 2);

        store.set_revocable_depth(1);
        assert_eq!(store.revocable_len(), 1);
        // widening again does not make the older layer revocable
        store.set_revocable_depth(3);
        assert_eq!(store.revocable_len(), 1);
        store.pop(&mut token).unwrap();
        assert_matches!(store.pop(&mut token), Err(StoreError::NothingToPop));
    }

    #[test]
    fn test_irreversible_layers_flush_at_count() {
        let policy = FlushPolicy {
            min_flush_count: 1,
            max_flush_count: 2,
            ..FlushPolicy::default()
        };
        let (store, mut token, backend) = open(policy);
        commit_put(&store, &mut token, b"a", b"1");
        assert_eq!(backend.batches_written(), 0);
        assert_eq!(store.sealed_len(), 1);

        commit_put(&store, &mut token, b"b", b"2");
        assert_eq!(backend.batches_written(), 1);
        assert_eq!(store.sealed_len(), 0);
        assert_eq!(backend.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(backend.get(b"b"), Some(b"2".to_vec()));
        assert_eq!(store.snapshot().get(b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_pending_shutdown_uses_min_flush_count() {
        let (store, mut token, backend) = open(FlushPolicy::default());
        store.set_shutdown_deadline(Some(Instant::now() + Duration::from_secs(1)));
        commit_put(&store, &mut token, b"a", b"1");
        assert_eq!(backend.batches_written(), 1);
    }

    #[test]
    fn test_flush_applies_deletes() {
        let (store, mut token, backend) = open(FlushPolicy {
            min_flush_count: 1,
            max_flush_count: 1,
            ..FlushPolicy::default()
        });
        commit_put(&store, &mut token, b"a", b"1");
        let mut session = store.build_session(&mut token).unwrap();
        session.delete(b"a".to_vec());
        session.commit().unwrap();
        assert_eq!(backend.get(b"a"), None);
        assert_eq!(store.snapshot().get(b"a"), None);
    }

    #[test]
    fn test_failed_flush_undoes_seal() {
        let (store, mut token, backend) = open(FlushPolicy {
            min_flush_count: 1,
            max_flush_count: 1,
            ..FlushPolicy::default()
        });
        backend.set_fail_writes(true);
        let mut session = store.build_session(&mut token).unwrap();
        session.put(b"a".to_vec(), b"1".to_vec());
        assert_matches!(session.commit(), Err(StoreError::Persistence(_)));
        assert_eq!(store.snapshot().get(b"a"), None);
        assert_eq!(store.sealed_len(), 0);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_reopen_loads_persisted_state() {
        let (store, mut token, backend) = open(never_flush());
        commit_put(&store, &mut token, b"a", b"1");
        store.flush_all(&mut token).unwrap();
        assert_eq!(store.revocable_len(), 0);

        let (reopened, _token) =
            VersionedStore::open(Arc::new(backend), FlushPolicy::default()).unwrap();
        assert_eq!(reopened.snapshot().get(b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_foreign_token_is_rejected() {
        let (store, _token, _backend) = open(never_flush());
        let (_other, mut other_token, _other_backend) = open(never_flush());
        assert_matches!(
            store.build_session(&mut other_token).err(),
            Some(StoreError::ForeignToken)
        );
        assert_matches!(store.pop(&mut other_token), Err(StoreError::ForeignToken));
    }
}
