//! Atomically-committed sequences of contract calls.
//!
//! A transaction carries exactly one contract in practice, a Tapos reference
//! to a recent block, an expiration timestamp, and the signatures of the
//! contract owner's permission keys. The transaction id is the hash of the
//! raw payload only, so neither signatures nor the recorded result change it.

mod error;

pub use error::TransactionError;
use {
    crate::{
        hash::{hash, Hash},
        pubkey::Pubkey,
        receipt::ContractResult,
        signature::{Signature, Signer},
    },
    serde_derive::{Deserialize, Serialize},
    std::sync::atomic::{AtomicBool, Ordering},
};

pub type Result<T> = std::result::Result<T, TransactionError>;

/// Transaction ids are the hash of the raw transaction.
pub type TransactionId = Hash;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractType {
    AccountCreate,
    Transfer,
    TransferAsset,
    FreezeBalance,
    CreateSmartContract,
    TriggerSmartContract,
    ShieldedTransfer,
}

impl ContractType {
    pub fn is_shielded(&self) -> bool {
        matches!(self, ContractType::ShieldedTransfer)
    }
}

/// One typed operation and its parameters. Parameters are opaque to the
/// ledger and interpreted by the actuator registered for `kind`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    pub kind: ContractType,
    pub owner: Pubkey,
    pub parameter: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTransaction {
    pub ref_block_number: u64,
    pub ref_block_hash: Hash,
    /// Milliseconds since the unix epoch.
    pub expiration: u64,
    pub timestamp: u64,
    pub fee_limit: u64,
    pub contracts: Vec<Contract>,
}

impl RawTransaction {
    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }
}

/// Whether signatures were already checked. Not serialized, and ignored by
/// equality.
#[derive(Debug, Default)]
pub struct VerifiedFlag(AtomicBool);

impl Clone for VerifiedFlag {
    fn clone(&self) -> Self {
        Self(AtomicBool::new(self.0.load(Ordering::Acquire)))
    }
}

impl PartialEq for VerifiedFlag {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for VerifiedFlag {}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub raw: RawTransaction,
    pub signatures: Vec<Signature>,
    /// Result recorded by the block producer when the transaction was packed.
    pub ret: Option<ContractResult>,
    #[serde(skip)]
    verified: VerifiedFlag,
}

impl Transaction {
    pub fn new_unsigned(raw: RawTransaction) -> Self {
        Self {
            raw,
            signatures: vec![],
            ret: None,
            verified: VerifiedFlag::default(),
        }
    }

    pub fn new<T: Signer + ?Sized>(raw: RawTransaction, signers: &[&T]) -> Self {
        let mut transaction = Self::new_unsigned(raw);
        for signer in signers {
            transaction.sign(*signer);
        }
        transaction
    }

    pub fn sign<T: Signer + ?Sized>(&mut self, signer: &T) {
        let signature = signer.sign_message(self.id().as_ref());
        self.signatures.push(signature);
    }

    pub fn id(&self) -> TransactionId {
        hash(&self.raw.serialize())
    }

    /// The hash committed to by a block's merkle root. Covers signatures and
    /// the recorded result.
    pub fn merkle_hash(&self) -> Hash {
        hash(&bincode::serialize(self).unwrap())
    }

    pub fn serialized_size(&self) -> u64 {
        bincode::serialized_size(self).unwrap()
    }

    pub fn contract(&self) -> Option<&Contract> {
        self.raw.contracts.first()
    }

    pub fn owner(&self) -> Option<&Pubkey> {
        self.contract().map(|contract| &contract.owner)
    }

    pub fn expiration(&self) -> u64 {
        self.raw.expiration
    }

    pub fn is_shielded(&self) -> bool {
        self.raw
            .contracts
            .iter()
            .any(|contract| contract.kind.is_shielded())
    }

    pub fn is_verified(&self) -> bool {
        self.verified.0.load(Ordering::Acquire)
    }

    pub fn set_verified(&self, verified: bool) {
        self.verified.0.store(verified, Ordering::Release);
    }
}
