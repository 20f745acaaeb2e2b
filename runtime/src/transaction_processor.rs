//! Validation and execution of a single transaction inside a session.

use {
    crate::{
        actuator::{ActuatorRegistry, ResourceProcessor},
        state::{self, TransactionRecord},
        status_cache::StatusCache,
    },
    log::*,
    std::sync::Arc,
    strata_perf::SignatureEngine,
    strata_sdk::{
        receipt::{ContractResult, Receipt},
        transaction::{Result, Transaction, TransactionError},
    },
    strata_versioned_store::Session,
};

pub const DEFAULT_MAX_TRANSACTION_SIZE: u64 = 500 * 1024;
pub const DEFAULT_MAX_EXPIRATION_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub max_transaction_size: u64,
    /// How far past the head block time an expiration may lie.
    pub max_expiration_window_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
            max_expiration_window_ms: DEFAULT_MAX_EXPIRATION_WINDOW_MS,
        }
    }
}

/// The block a transaction is applied in. Absent while simulating
/// admission or packing a local block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
    /// Results recorded in a signed block are checked against local ones.
    pub has_producer_signature: bool,
}

pub struct TransactionProcessor {
    config: ProcessorConfig,
    actuators: ActuatorRegistry,
    resources: Arc<dyn ResourceProcessor>,
    signature_engine: Arc<dyn SignatureEngine>,
    status_cache: Arc<StatusCache>,
}

impl TransactionProcessor {
    pub fn new(
        config: ProcessorConfig,
        actuators: ActuatorRegistry,
        resources: Arc<dyn ResourceProcessor>,
        signature_engine: Arc<dyn SignatureEngine>,
        status_cache: Arc<StatusCache>,
    ) -> Self {
        Self {
            config,
            actuators,
            resources,
            signature_engine,
            status_cache,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn status_cache(&self) -> &Arc<StatusCache> {
        &self.status_cache
    }

    pub fn signature_engine(&self) -> &Arc<dyn SignatureEngine> {
        &self.signature_engine
    }

    /// Applies `transaction` to `session`. On error the session may hold
    /// partial writes of the checks that passed; callers drop it.
    pub fn process(
        &self,
        session: &mut Session,
        transaction: &Transaction,
        block: Option<&BlockContext>,
    ) -> Result<Receipt> {
        let id = transaction.id();
        self.check_shape(transaction)?;
        self.check_tapos(session, transaction)?;
        self.check_expiration(session, transaction)?;
        if state::has_transaction(session, &id) {
            return Err(TransactionError::DuplicateTransaction);
        }
        self.check_signatures(session, transaction)?;

        let expected = block
            .filter(|block| block.has_producer_signature)
            .and(transaction.ret);
        let mut receipt = self.execute(session, transaction, expected)?;
        receipt.block_number = block.map(|block| block.number);

        if let Some(block) = block {
            state::put_transaction_record(
                session,
                &TransactionRecord {
                    transaction: transaction.clone(),
                    receipt: receipt.clone(),
                    block_number: block.number,
                },
            );
            self.status_cache.insert(id);
        }
        trace!("processed {}: {:?}", id, receipt.result);
        Ok(receipt)
    }

    fn check_shape(&self, transaction: &Transaction) -> Result<()> {
        let contracts = transaction.raw.contracts.len();
        if contracts != 1 {
            return Err(TransactionError::ContractSizeNotEqualToOne(contracts));
        }
        let size = transaction.serialized_size();
        if size > self.config.max_transaction_size {
            return Err(TransactionError::TooBigTransaction {
                size,
                max: self.config.max_transaction_size,
            });
        }
        Ok(())
    }

    fn check_tapos(&self, session: &Session, transaction: &Transaction) -> Result<()> {
        let number = transaction.raw.ref_block_number;
        match state::get_recent_block(session, number) {
            Some(anchor)
                if anchor.number == number && anchor.hash == transaction.raw.ref_block_hash =>
            {
                Ok(())
            }
            Some(anchor) => Err(TransactionError::TaposInvalid(format!(
                "reference block #{}:{} does not match recorded {}",
                number, transaction.raw.ref_block_hash, anchor
            ))),
            None => Err(TransactionError::TaposInvalid(format!(
                "no recent block recorded for #{}",
                number
            ))),
        }
    }

    fn check_expiration(&self, session: &Session, transaction: &Transaction) -> Result<()> {
        let head_timestamp = state::get_head_state(session)
            .map(|head| head.timestamp)
            .unwrap_or_default();
        let expiration = transaction.expiration();
        if expiration <= head_timestamp {
            return Err(TransactionError::TransactionExpired(format!(
                "expiration {} is not after head block time {}",
                expiration, head_timestamp
            )));
        }
        let latest = head_timestamp.saturating_add(self.config.max_expiration_window_ms);
        if expiration > latest {
            return Err(TransactionError::TransactionExpired(format!(
                "expiration {} is beyond {}",
                expiration, latest
            )));
        }
        Ok(())
    }

    fn check_signatures(&self, session: &Session, transaction: &Transaction) -> Result<()> {
        if transaction.is_verified() {
            return Ok(());
        }
        let Some(owner) = transaction.owner() else {
            return Err(TransactionError::ContractSizeNotEqualToOne(0));
        };
        let permission = state::owner_permission(session, owner);
        self.signature_engine
            .verify(transaction, &permission)
            .map_err(|err| TransactionError::SignatureInvalid(err.to_string()))?;
        transaction.set_verified(true);
        Ok(())
    }

    /// Resource accounting and contract execution in a nested session. A
    /// signed block's recorded result must be reproduced; a local timeout
    /// gets one more attempt on a fresh nested session.
    fn execute(
        &self,
        session: &mut Session,
        transaction: &Transaction,
        expected: Option<ContractResult>,
    ) -> Result<Receipt> {
        let mut retried = false;
        loop {
            let mut nested = session.nested();
            let receipt = self.run_contract(&mut nested, transaction)?;
            match expected {
                Some(expected) if receipt.result != expected => {
                    if !retried && receipt.result.is_retryable_mismatch(&expected) {
                        debug!(
                            "retrying {} after {:?}, block recorded {:?}",
                            transaction.id(),
                            receipt.result,
                            expected
                        );
                        retried = true;
                        continue;
                    }
                    return Err(TransactionError::ReceiptCheck {
                        expected,
                        actual: receipt.result,
                    });
                }
                _ => {
                    nested
                        .commit()
                        .map_err(|err| TransactionError::StorageFailure(err.to_string()))?;
                    return Ok(receipt);
                }
            }
        }
    }

    fn run_contract(&self, session: &mut Session, transaction: &Transaction) -> Result<Receipt> {
        let mut receipt = Receipt::default();
        self.resources
            .consume(transaction, session, &mut receipt)
            .map_err(TransactionError::AccountResourceInsufficient)?;

        let Some(contract) = transaction.contract() else {
            return Err(TransactionError::ContractSizeNotEqualToOne(0));
        };
        let actuator = self.actuators.get(&contract.kind).ok_or_else(|| {
            TransactionError::ContractValidate(format!(
                "no actuator registered for {:?}",
                contract.kind
            ))
        })?;
        actuator
            .validate(contract, session)
            .map_err(TransactionError::ContractValidate)?;
        receipt.result = actuator
            .execute(contract, session, &mut receipt)
            .map_err(TransactionError::ContractExecution)?;
        Ok(receipt)
    }
}
