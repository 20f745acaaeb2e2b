//! Transaction receipts: the recorded outcome and cost of applying one
//! transaction.

use serde_derive::{Deserialize, Serialize};

/// Result code of a contract execution, as recorded in a block.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContractResult {
    #[default]
    Default,
    Success,
    Revert,
    IllegalOperation,
    OutOfEnergy,
    OutOfTime,
    TransferFailed,
    Unknown,
}

impl ContractResult {
    /// Whether a locally observed `self` may be retried once when the block
    /// being replayed recorded `expected`.
    pub fn is_retryable_mismatch(&self, expected: &ContractResult) -> bool {
        *self == ContractResult::OutOfTime && *expected != ContractResult::OutOfTime
    }
}

/// An applied transaction's receipt.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Receipt {
    pub result: ContractResult,
    /// Total fee charged to the payer.
    pub fee: u64,
    pub net_usage: u64,
    pub energy_usage: u64,
    /// Set when the transaction was applied as part of a block.
    pub block_number: Option<u64>,
}

impl Receipt {
    /// Key used to order transactions in priority mode.
    pub fn order_key(&self) -> u64 {
        self.fee
    }
}

#[cfg(test)]
mod tests {
    use {super::*, test_case::test_case};

    #[test_case(ContractResult::OutOfTime, ContractResult::Success, true)]
    #[test_case(ContractResult::OutOfTime, ContractResult::Revert, true)]
    #[test_case(ContractResult::OutOfTime, ContractResult::OutOfTime, false)]
    #[test_case(ContractResult::Revert, ContractResult::Success, false)]
    #[test_case(ContractResult::Success, ContractResult::Success, false)]
    fn test_is_retryable_mismatch(local: ContractResult, expected: ContractResult, retry: bool) {
        assert_eq!(local.is_retryable_mismatch(&expected), retry);
    }
}
