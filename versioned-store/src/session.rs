use {
    crate::{
        error::Result,
        snapshot::Snapshot,
        store::{Layer, SessionToken, VersionedStore},
        Key, KeyValueRead, KeyValueWrite, Value,
    },
    std::mem,
};

enum Frames<'a> {
    Root {
        frames: Vec<Layer>,
        _token: &'a mut SessionToken,
    },
    Nested(&'a mut Vec<Layer>),
}

/// An uncommitted set of writes over the committed state.
///
/// A session sees its own writes, then its parents' writes, then the
/// committed state as of the moment the top-level session was opened.
pub struct Session<'a> {
    store: &'a VersionedStore,
    view: Snapshot,
    frames: Frames<'a>,
    // index of this session's own layer in `frames`
    level: usize,
    finished: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new_root(
        store: &'a VersionedStore,
        view: Snapshot,
        token: &'a mut SessionToken,
    ) -> Self {
        Self {
            store,
            view,
            frames: Frames::Root {
                frames: vec![Layer::default()],
                _token: token,
            },
            level: 0,
            finished: false,
        }
    }

    fn frames(&self) -> &[Layer] {
        match &self.frames {
            Frames::Root { frames, .. } => &frames[..],
            Frames::Nested(frames) => &frames[..],
        }
    }

    fn frames_mut(&mut self) -> &mut Vec<Layer> {
        match &mut self.frames {
            Frames::Root { frames, .. } => frames,
            Frames::Nested(frames) => &mut **frames,
        }
    }

    /// Opens a child session. Its writes reach this session only if it is
    /// committed.
    pub fn nested(&mut self) -> Session<'_> {
        let store = self.store;
        let view = self.view.clone();
        let frames = self.frames_mut();
        frames.push(Layer::default());
        let level = frames.len() - 1;
        Session {
            store,
            view,
            frames: Frames::Nested(frames),
            level,
            finished: false,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.frames, Frames::Nested(_))
    }

    /// Number of keys written in this session's own layer.
    pub fn write_count(&self) -> usize {
        self.frames()[self.level].len()
    }

    /// A nested session merges into its parent. A top-level session seals
    /// its writes into the store, where every reader can see them and
    /// [`VersionedStore::pop`] can undo them.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let level = self.level;
        match &mut self.frames {
            Frames::Nested(frames) => {
                let committed = frames.split_off(level);
                let parent = &mut frames[level - 1];
                for layer in committed {
                    parent.extend(layer);
                }
                Ok(())
            }
            Frames::Root { frames, .. } => {
                let mut sealed = Layer::default();
                for layer in mem::take(frames) {
                    sealed.extend(layer);
                }
                self.store.seal(sealed)
            }
        }
    }
}

impl KeyValueRead for Session<'_> {
    fn get(&self, key: &[u8]) -> Option<Value> {
        for layer in self.frames()[..=self.level].iter().rev() {
            if let Some(value) = layer.get(key) {
                return value.clone();
            }
        }
        self.view.get(key)
    }
}

impl KeyValueWrite for Session<'_> {
    fn put(&mut self, key: Key, value: Value) {
        let level = self.level;
        self.frames_mut()[level].insert(key, Some(value));
    }

    fn delete(&mut self, key: Key) {
        let level = self.level;
        self.frames_mut()[level].insert(key, None);
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Frames::Nested(frames) = &mut self.frames {
            frames.truncate(self.level);
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{backend::MemoryBackend, flush_policy::FlushPolicy},
        std::sync::Arc,
        test_case::test_case,
    };

    fn open() -> (VersionedStore, SessionToken) {
        VersionedStore::open(Arc::new(MemoryBackend::new()), FlushPolicy::default()).unwrap()
    }

    #[test]
    fn test_nested_sees_parent_writes() {
        let (store, mut token) = open();
        let mut session = store.build_session(&mut token).unwrap();
        session.put(b"a".to_vec(), b"1".to_vec());
        {
            let mut nested = session.nested();
            assert!(nested.is_nested());
            assert_eq!(nested.get(b"a"), Some(b"1".to_vec()));
            nested.delete(b"a".to_vec());
            assert_eq!(nested.get(b"a"), None);
        }
        assert_eq!(session.get(b"a"), Some(b"1".to_vec()));
        assert!(!session.is_nested());
    }

    #[test_case(true; "committed child")]
    #[test_case(false; "dropped child")]
    fn test_nested_commit_or_drop(commit: bool) {
        let (store, mut token) = open();
        let mut session = store.build_session(&mut token).unwrap();
        session.put(b"a".to_vec(), b"1".to_vec());
        {
            let mut nested = session.nested();
            nested.put(b"a".to_vec(), b"2".to_vec());
            nested.put(b"b".to_vec(), b"3".to_vec());
            if commit {
                nested.commit().unwrap();
            }
        }
        assert_eq!(session.write_count(), if commit { 2 } else { 1 });
        session.commit().unwrap();

        let snapshot = store.snapshot();
        let (a, b) = if commit {
            (Some(b"2".to_vec()), Some(b"3".to_vec()))
        } else {
            (Some(b"1".to_vec()), None)
        };
        assert_eq!(snapshot.get(b"a"), a);
        assert_eq!(snapshot.get(b"b"), b);
    }

    #[test]
    fn test_grandchild_merges_one_level() {
        let (store, mut token) = open();
        let mut session = store.build_session(&mut token).unwrap();
        {
            let mut child = session.nested();
            {
                let mut grandchild = child.nested();
                grandchild.put(b"g".to_vec(), b"1".to_vec());
                grandchild.commit().unwrap();
            }
            assert_eq!(child.get(b"g"), Some(b"1".to_vec()));
            // child dropped: the grandchild's writes go with it
        }
        assert_eq!(session.get(b"g"), None);
        assert_eq!(session.write_count(), 0);
    }

    #[test]
    fn test_committed_nested_does_not_reach_store_until_root_commits() {
        let (store, mut token) = open();
        {
            let mut session = store.build_session(&mut token).unwrap();
            let mut nested = session.nested();
            nested.put(b"a".to_vec(), b"1".to_vec());
            nested.commit().unwrap();
            assert_eq!(store.snapshot().get(b"a"), None);
        }
        assert_eq!(store.snapshot().get(b"a"), None);
        assert_eq!(store.sealed_len(), 0);
    }
}
