//! Account state and the permission structure transaction signatures are
//! checked against.

use {
    crate::pubkey::Pubkey,
    serde_derive::{Deserialize, Serialize},
};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: u64,
    /// `None` means the default single-key owner permission.
    pub owner_permission: Option<Permission>,
}

impl Account {
    pub fn new(balance: u64) -> Self {
        Self {
            balance,
            owner_permission: None,
        }
    }

    pub fn permission(&self, address: &Pubkey) -> Permission {
        self.owner_permission
            .clone()
            .unwrap_or_else(|| Permission::single(*address))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PermissionKey {
    pub address: Pubkey,
    pub weight: u64,
}

/// A weighted multi-signature permission: signers must reach `threshold`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    pub threshold: u64,
    pub keys: Vec<PermissionKey>,
}

impl Permission {
    pub fn single(address: Pubkey) -> Self {
        Self {
            threshold: 1,
            keys: vec![PermissionKey { address, weight: 1 }],
        }
    }

    pub fn weight_of(&self, address: &Pubkey) -> Option<u64> {
        self.keys
            .iter()
            .find(|key| key.address == *address)
            .map(|key| key.weight)
    }
}
