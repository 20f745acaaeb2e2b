//! Binary merkle trees over block contents.

pub mod merkle_tree;

pub use merkle_tree::MerkleTree;
use strata_sdk::{hash::Hash, transaction::Transaction};

/// Collects leaf hashes while a block is being assembled, then merklizes
/// them in one go.
#[derive(Debug, Default)]
pub struct LeafAccumulator {
    leaves: Vec<Hash>,
}

impl LeafAccumulator {
    pub fn push(&mut self, hash: Hash) {
        self.leaves.push(hash);
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn merklize(&self) -> MerkleTree {
        MerkleTree::new(&self.leaves)
    }

    /// The root, or the default hash for an empty block.
    pub fn root(&self) -> Hash {
        self.merklize().get_root().copied().unwrap_or_default()
    }
}

/// Merkle root committed to by a block header: built over each
/// transaction's merkle hash, which includes its recorded result.
pub fn transactions_root(transactions: &[Transaction]) -> Hash {
    let mut accumulator = LeafAccumulator::default();
    for transaction in transactions {
        accumulator.push(transaction.merkle_hash());
    }
    accumulator.root()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        strata_sdk::{
            pubkey::Pubkey,
            receipt::ContractResult,
            transaction::{Contract, ContractType, RawTransaction},
        },
    };

    fn transaction(expiration: u64) -> Transaction {
        Transaction::new_unsigned(RawTransaction {
            expiration,
            contracts: vec![Contract {
                kind: ContractType::Transfer,
                owner: Pubkey::new_unique(),
                parameter: vec![],
            }],
            ..RawTransaction::default()
        })
    }

    #[test]
    fn test_empty_root_is_default() {
        assert_eq!(transactions_root(&[]), Hash::default());
        assert!(LeafAccumulator::default().is_empty());
    }

    #[test]
    fn test_root_covers_recorded_result() {
        let mut transactions = vec![transaction(1), transaction(2), transaction(3)];
        let root = transactions_root(&transactions);
        transactions[2].ret = Some(ContractResult::Revert);
        assert_ne!(root, transactions_root(&transactions));
    }

    #[test]
    fn test_accumulator_matches_tree() {
        let transactions = vec![transaction(1), transaction(2)];
        let hashes: Vec<_> = transactions.iter().map(|t| t.merkle_hash()).collect();
        assert_eq!(
            Some(&transactions_root(&transactions)),
            MerkleTree::new(&hashes).get_root()
        );
    }
}
