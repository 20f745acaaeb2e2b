//! Collaborators the processor calls into for contract semantics and
//! resource accounting.

use {
    std::{collections::HashMap, sync::Arc},
    strata_sdk::{
        receipt::{ContractResult, Receipt},
        transaction::{Contract, ContractType, Transaction},
    },
    strata_versioned_store::{KeyValueRead, KeyValueWrite},
};

/// Executes one contract type.
pub trait Actuator: Send + Sync {
    /// Checks the domain rules of `contract` against the current state.
    fn validate(&self, contract: &Contract, state: &dyn KeyValueRead) -> Result<(), String>;

    /// Applies `contract` and reports its result. An `Err` aborts the
    /// transaction; a non-success result such as `Revert` does not.
    fn execute(
        &self,
        contract: &Contract,
        state: &mut dyn KeyValueWrite,
        receipt: &mut Receipt,
    ) -> Result<ContractResult, String>;
}

/// Bandwidth and energy accounting.
pub trait ResourceProcessor: Send + Sync {
    /// Charges the payer for `transaction`, recording the cost in `receipt`.
    fn consume(
        &self,
        transaction: &Transaction,
        state: &mut dyn KeyValueWrite,
        receipt: &mut Receipt,
    ) -> Result<(), String>;
}

#[derive(Clone, Default)]
pub struct ActuatorRegistry {
    actuators: HashMap<ContractType, Arc<dyn Actuator>>,
}

impl ActuatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `actuator` for `kind`, replacing any earlier one.
    pub fn register(&mut self, kind: ContractType, actuator: Arc<dyn Actuator>) {
        self.actuators.insert(kind, actuator);
    }

    pub fn with(mut self, kind: ContractType, actuator: Arc<dyn Actuator>) -> Self {
        self.register(kind, actuator);
        self
    }

    pub fn get(&self, kind: &ContractType) -> Option<&Arc<dyn Actuator>> {
        self.actuators.get(kind)
    }
}
