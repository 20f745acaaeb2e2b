//! Ed25519 signatures and keypairs.

use {
    crate::pubkey::Pubkey,
    ed25519_dalek::Signer as DalekSigner,
    rand::Rng,
    serde_derive::{Deserialize, Serialize},
    std::fmt,
};

/// Number of bytes in a signature.
pub const SIGNATURE_BYTES: usize = 64;

#[derive(Serialize, Deserialize, Clone, Default, Eq, PartialEq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(signature_slice: &[u8]) -> Self {
        Self(signature_slice.to_vec())
    }

    fn verify_verbose(
        &self,
        pubkey_bytes: &[u8],
        message_bytes: &[u8],
    ) -> Result<(), ed25519_dalek::SignatureError> {
        let publickey = ed25519_dalek::PublicKey::from_bytes(pubkey_bytes)?;
        let signature: ed25519_dalek::Signature = self.0.as_slice().try_into()?;
        publickey.verify_strict(message_bytes, &signature)
    }

    pub fn verify(&self, pubkey_bytes: &[u8], message_bytes: &[u8]) -> bool {
        self.verify_verbose(pubkey_bytes, message_bytes).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

pub trait Signer {
    fn pubkey(&self) -> Pubkey;
    fn sign_message(&self, message: &[u8]) -> Signature;
}

/// A vanilla Ed25519 key pair.
pub struct Keypair(ed25519_dalek::Keypair);

impl Keypair {
    /// Constructs a new, random `Keypair`.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill(&mut seed);
        Self::from_seed(&seed).expect("any 32 bytes form an ed25519 secret key")
    }

    /// Derives a `Keypair` from the first 32 bytes of `seed`.
    pub fn from_seed(seed: &[u8]) -> Result<Self, ed25519_dalek::SignatureError> {
        let secret = ed25519_dalek::SecretKey::from_bytes(seed.get(..32).unwrap_or(seed))?;
        let public = ed25519_dalek::PublicKey::from(&secret);
        Ok(Self(ed25519_dalek::Keypair { secret, public }))
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Pubkey {
        Pubkey::from(self.0.public.to_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        Signature::new(&self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Keypair({})", self.pubkey())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::new();
        let signature = keypair.sign_message(b"block 101");
        assert!(signature.verify(keypair.pubkey().as_ref(), b"block 101"));
        assert!(!signature.verify(keypair.pubkey().as_ref(), b"block 102"));
        assert!(!signature.verify(Keypair::new().pubkey().as_ref(), b"block 101"));
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = Keypair::from_seed(&[7u8; 32]).unwrap();
        let b = Keypair::from_seed(&[7u8; 32]).unwrap();
        assert_eq!(a.pubkey(), b.pubkey());
        assert!(Keypair::from_seed(&[7u8; 16]).is_err());
    }

    #[test]
    fn test_malformed_signature_does_not_verify() {
        let keypair = Keypair::new();
        assert!(!Signature::default().verify(keypair.pubkey().as_ref(), b"msg"));
        assert!(!Signature::new(&[1u8; 10]).verify(keypair.pubkey().as_ref(), b"msg"));
    }
}
