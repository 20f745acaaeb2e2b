//! Hashing with the SHA-256 hash function, and a general [`Hash`] type.

use {
    serde_derive::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    std::fmt,
};

/// Size of a hash in bytes.
pub const HASH_BYTES: usize = 32;

/// A SHA-256 hash.
#[derive(Serialize, Deserialize, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Hash(pub(crate) [u8; HASH_BYTES]);

#[derive(Clone, Default)]
pub struct Hasher {
    hasher: Sha256,
}

impl Hasher {
    pub fn hash(&mut self, val: &[u8]) {
        self.hasher.update(val);
    }

    pub fn hashv(&mut self, vals: &[&[u8]]) {
        for val in vals {
            self.hash(val);
        }
    }

    pub fn result(self) -> Hash {
        let mut bytes = [0u8; HASH_BYTES];
        bytes.copy_from_slice(&self.hasher.finalize());
        Hash(bytes)
    }

    pub fn result_reset(&mut self) -> Hash {
        std::mem::take(self).result()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; HASH_BYTES]> for Hash {
    fn from(from: [u8; HASH_BYTES]) -> Self {
        Self(from)
    }
}

impl Hash {
    pub const fn new_from_array(hash_array: [u8; HASH_BYTES]) -> Self {
        Self(hash_array)
    }

    /// Unique hash for tests and benchmarks.
    pub fn new_unique() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static I: AtomicU64 = AtomicU64::new(1);

        let mut b = [0u8; HASH_BYTES];
        let i = I.fetch_add(1, Ordering::Relaxed);
        b[0..8].copy_from_slice(&i.to_le_bytes());
        Self::new_from_array(b)
    }

    pub const fn to_bytes(self) -> [u8; HASH_BYTES] {
        self.0
    }
}

/// Return a SHA-256 hash for the given data.
pub fn hashv(vals: &[&[u8]]) -> Hash {
    let mut hasher = Hasher::default();
    hasher.hashv(vals);
    hasher.result()
}

/// Return a SHA-256 hash for the given data.
pub fn hash(val: &[u8]) -> Hash {
    hashv(&[val])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashv_matches_incremental_hasher() {
        let mut hasher = Hasher::default();
        hasher.hash(b"tapos");
        hasher.hash(b"anchor");
        assert_eq!(hasher.result(), hashv(&[b"tapos", b"anchor"]));
        assert_eq!(hash(b"taposanchor"), hashv(&[b"tapos", b"anchor"]));
    }

    #[test]
    fn test_result_reset() {
        let mut hasher = Hasher::default();
        hasher.hash(b"first");
        let first = hasher.result_reset();
        hasher.hash(b"first");
        assert_eq!(first, hasher.result_reset());
        assert_ne!(first, hasher.result());
    }

    #[test]
    fn test_new_unique() {
        assert_ne!(Hash::new_unique(), Hash::new_unique());
    }

    #[test]
    fn test_display_is_hex() {
        let hash = Hash::new_from_array([0xab; HASH_BYTES]);
        assert_eq!(hash.to_string(), "ab".repeat(HASH_BYTES));
    }
}
