//! A manager over the mock chain, and a fee model that charges each
//! transaction its declared fee limit.
#![allow(unused)]

#[path = "../../ledger/tests/mock_chain.rs"]
pub mod mock_chain;

use {
    self::mock_chain::*,
    std::sync::Arc,
    strata_core::{manager::Manager, txpool::PoolConfig},
    strata_ledger::consensus::FixedDepthSchedule,
    strata_perf::Ed25519SignatureEngine,
    strata_runtime::{
        actuator::{ActuatorRegistry, ResourceProcessor},
        state,
        status_cache::StatusCache,
        transaction_processor::{ProcessorConfig, TransactionProcessor},
    },
    strata_sdk::{
        block::Block,
        receipt::Receipt,
        signature::{Keypair, Signer},
        transaction::{ContractType, Transaction},
    },
    strata_versioned_store::KeyValueWrite,
};

pub struct FeeLimitFee;

impl ResourceProcessor for FeeLimitFee {
    fn consume(
        &self,
        transaction: &Transaction,
        writer: &mut dyn KeyValueWrite,
        receipt: &mut Receipt,
    ) -> Result<(), String> {
        let owner = transaction.owner().ok_or("no owner")?;
        let fee = transaction.raw.fee_limit;
        let mut account = state::get_account(&*writer, owner).ok_or("unknown payer")?;
        account.balance = account
            .balance
            .checked_sub(fee)
            .ok_or("balance below fee")?;
        state::put_account(writer, owner, &account);
        receipt.fee = fee;
        Ok(())
    }
}

pub fn fee_limit_processor() -> Arc<TransactionProcessor> {
    let actuators = ActuatorRegistry::new()
        .with(ContractType::Transfer, Arc::new(TransferActuator))
        .with(ContractType::ShieldedTransfer, Arc::new(TransferActuator));
    Arc::new(TransactionProcessor::new(
        ProcessorConfig::default(),
        actuators,
        Arc::new(FeeLimitFee),
        Arc::new(Ed25519SignatureEngine),
        Arc::new(StatusCache::default()),
    ))
}

pub struct MockNode {
    pub chain: MockChain,
    pub manager: Manager,
}

impl MockNode {
    pub fn new(pool_config: PoolConfig) -> Self {
        Self::with_chain(MockChain::new(), pool_config)
    }

    pub fn with_chain(chain: MockChain, pool_config: PoolConfig) -> Self {
        let manager = Manager::new(chain.ledger.clone(), pool_config);
        Self { chain, manager }
    }

    /// Produces a block one interval after the head with the chain's
    /// producer key.
    pub fn produce(&self) -> strata_ledger::Result<Block> {
        let timestamp = self.manager.ledger().head_state().timestamp + BLOCK_INTERVAL;
        self.manager
            .produce_block(&self.chain.producer, timestamp, far_deadline())
    }

    /// A transfer from `from` to `to` paying `fee_limit`.
    pub fn transfer_with_fee(&self, from: usize, to: usize, amount: u64, fee_limit: u64) -> Transaction {
        let chain = &self.chain;
        let mut raw = raw_transfer(
            ContractType::Transfer,
            &chain.users[from],
            &chain.users[to].pubkey(),
            amount,
            &chain.genesis.id(),
        );
        raw.fee_limit = fee_limit;
        Transaction::new(raw, &[&chain.users[from]])
    }
}

pub fn foreign_schedule() -> Arc<FixedDepthSchedule> {
    Arc::new(FixedDepthSchedule::new([Keypair::new().pubkey()], 10))
}
