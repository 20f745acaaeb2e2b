use strata_sdk::{
    block::{Block, RawBlockHeader},
    hash::Hash,
    pubkey::Pubkey,
};

/// State the chain starts from when the store is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesisConfig {
    /// Milliseconds since the unix epoch.
    pub creation_time: u64,
    pub accounts: Vec<(Pubkey, u64)>,
}

impl GenesisConfig {
    pub fn new(creation_time: u64, accounts: &[(Pubkey, u64)]) -> Self {
        Self {
            creation_time,
            accounts: accounts.to_vec(),
        }
    }

    /// Block number 0. It carries no transactions and no signature.
    pub fn block(&self) -> Block {
        Block::new(
            RawBlockHeader {
                parent_hash: Hash::default(),
                number: 0,
                timestamp: self.creation_time,
                producer: Pubkey::default(),
                merkle_root: Hash::default(),
            },
            vec![],
        )
    }
}
