use {
    crate::{store::Layer, KeyValueRead, Key, Value},
    std::sync::Arc,
};

/// A frozen view of committed state. Capturing one is cheap, and later
/// commits, pops and flushes never change what it returns.
#[derive(Clone, Default)]
pub struct Snapshot {
    base: im::HashMap<Key, Value>,
    // oldest first
    layers: Vec<Arc<Layer>>,
}

impl Snapshot {
    pub(crate) fn new(base: im::HashMap<Key, Value>, layers: Vec<Arc<Layer>>) -> Self {
        Self { base, layers }
    }
}

impl KeyValueRead for Snapshot {
    fn get(&self, key: &[u8]) -> Option<Value> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.get(key) {
                return value.clone();
            }
        }
        self.base.get(key).cloned()
    }
}
