//! Layered key-value state with all-or-nothing sessions.
//!
//! Committed state is a durable base view plus a stack of sealed layers, one
//! per committed top-level session. The newest layers stay revocable so a
//! chain reorganization can undo whole blocks with [`VersionedStore::pop`];
//! older layers are irreversible and get flushed to the [`Persistence`]
//! backend in batches: [`RocksBackend`] on disk, or [`MemoryBackend`].
//!
//! Writers open a [`Session`] with the store's unique [`SessionToken`].
//! Sessions nest strictly: a nested session borrows its parent mutably, so
//! the parent cannot be touched until the child is committed or dropped.
//! Dropping a session without committing discards every write made in it.

mod backend;
mod error;
mod flush_policy;
mod rocks_backend;
mod session;
mod snapshot;
mod store;

pub use {
    backend::{MemoryBackend, Persistence, WriteBatch},
    error::{Result, StoreError},
    flush_policy::FlushPolicy,
    rocks_backend::RocksBackend,
    session::Session,
    snapshot::Snapshot,
    store::{SessionToken, VersionedStore},
};

pub type Key = Vec<u8>;
pub type Value = Vec<u8>;

/// Read access shared by sessions and snapshots.
pub trait KeyValueRead {
    fn get(&self, key: &[u8]) -> Option<Value>;

    fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }
}

/// Write access; only sessions are writable.
pub trait KeyValueWrite: KeyValueRead {
    fn put(&mut self, key: Key, value: Value);
    fn delete(&mut self, key: Key);
}
