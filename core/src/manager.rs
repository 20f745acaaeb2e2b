//! Entry points of the node: client submissions, peer blocks and local
//! production, with the pool kept in step with the chain.

use {
    crate::txpool::{PoolConfig, TransactionPool},
    log::*,
    std::{sync::Arc, time::Instant},
    strata_ledger::{Ledger, PushOutcome},
    strata_sdk::{
        block::Block,
        receipt::Receipt,
        signature::Signer,
        transaction::{self, Transaction},
    },
};

pub struct Manager {
    ledger: Arc<Ledger>,
    pool: Arc<TransactionPool>,
}

impl Manager {
    pub fn new(ledger: Arc<Ledger>, pool_config: PoolConfig) -> Self {
        let pool = Arc::new(TransactionPool::new(pool_config, ledger.clone()));
        Self { ledger, pool }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn pool(&self) -> &Arc<TransactionPool> {
        &self.pool
    }

    pub fn submit_transaction(&self, transaction: Transaction) -> transaction::Result<Receipt> {
        self.pool.admit(transaction)
    }

    pub fn push_block(&self, block: Block) -> strata_ledger::Result<PushOutcome> {
        match self.ledger.push_block(block) {
            Ok(outcome) => {
                self.after_push(&outcome);
                Ok(outcome)
            }
            Err(err) => {
                let orphaned = self.ledger.take_orphaned_blocks();
                if !orphaned.is_empty() {
                    warn!("re-queueing transactions of {} orphaned blocks", orphaned.len());
                    self.pool.push_popped(&orphaned);
                    self.pool.reschedule();
                }
                Err(err)
            }
        }
    }

    /// Packs pending transactions into a block on top of the head and
    /// pushes it. Candidates that were not included go back to the pool.
    pub fn produce_block(
        &self,
        producer: &dyn Signer,
        timestamp: u64,
        deadline: Instant,
    ) -> strata_ledger::Result<Block> {
        let mut round = self.pool.packing_round();
        match self
            .ledger
            .produce_block(producer, timestamp, deadline, &mut round)
        {
            Ok((block, outcome)) => {
                round.finish(true);
                self.after_push(&outcome);
                Ok(block)
            }
            Err(err) => {
                warn!("block production failed: {}", err);
                round.finish(false);
                Err(err)
            }
        }
    }

    fn after_push(&self, outcome: &PushOutcome) {
        match outcome {
            PushOutcome::Applied => (),
            PushOutcome::SwitchedFork { erased } => self.pool.push_popped(erased),
            PushOutcome::StoredAsFork | PushOutcome::AlreadyKnown => return,
        }
        self.pool.reschedule();
    }
}
