//! Blocks and block identities.

use {
    crate::{
        hash::{hash, Hash},
        pubkey::Pubkey,
        signature::{Signature, Signer},
        transaction::Transaction,
    },
    serde_derive::{Deserialize, Serialize},
    std::fmt,
};

/// Identity of a block: its height and the hash of its raw header.
#[derive(Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub number: u64,
    pub hash: Hash,
}

impl BlockId {
    pub fn new(number: u64, hash: Hash) -> Self {
        Self { number, hash }
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}:{}", self.number, self.hash)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}:{}", self.number, self.hash)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RawBlockHeader {
    pub parent_hash: Hash,
    pub number: u64,
    /// Milliseconds since the unix epoch.
    pub timestamp: u64,
    pub producer: Pubkey,
    /// Merkle root over the merkle hashes of the block's transactions.
    pub merkle_root: Hash,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub raw: RawBlockHeader,
    pub signature: Signature,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        hash(&bincode::serialize(&self.raw).unwrap())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(raw: RawBlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header: BlockHeader {
                raw,
                signature: Signature::default(),
            },
            transactions,
        }
    }

    pub fn sign<T: Signer + ?Sized>(&mut self, signer: &T) {
        self.header.signature = signer.sign_message(self.header.hash().as_ref());
    }

    pub fn id(&self) -> BlockId {
        BlockId::new(self.header.raw.number, self.header.hash())
    }

    pub fn number(&self) -> u64 {
        self.header.raw.number
    }

    pub fn parent_hash(&self) -> &Hash {
        &self.header.raw.parent_hash
    }

    pub fn timestamp(&self) -> u64 {
        self.header.raw.timestamp
    }

    pub fn producer(&self) -> &Pubkey {
        &self.header.raw.producer
    }

    pub fn merkle_root(&self) -> &Hash {
        &self.header.raw.merkle_root
    }

    pub fn has_producer_signature(&self) -> bool {
        !self.header.signature.is_empty()
    }

    pub fn verify_producer_signature(&self) -> bool {
        self.header
            .signature
            .verify(self.producer().as_ref(), self.header.hash().as_ref())
    }

    pub fn serialized_size(&self) -> u64 {
        bincode::serialized_size(self).unwrap()
    }

    pub fn shielded_transaction_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|transaction| transaction.is_shielded())
            .count()
    }
}
