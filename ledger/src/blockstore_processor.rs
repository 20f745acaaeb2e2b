//! Admission and application of blocks.

use {
    crate::{
        error::{BlockError, PushOutcome, Result},
        ledger::{ChainState, Ledger},
    },
    log::*,
    strata_merkle_tree::transactions_root,
    strata_perf::VerifyRequest,
    strata_runtime::{
        state::{self, HeadState},
        transaction_processor::BlockContext,
        trigger::Trigger,
    },
    strata_sdk::{block::Block, receipt::Receipt},
    strata_versioned_store::KeyValueRead,
};

impl Ledger {
    /// Runs the admission gates, links the block and routes it: straight
    /// onto the head, through a fork switch, or into the fork store.
    /// `local` blocks come from this node's producer and skip the producer
    /// signature and transaction signature checks.
    pub(crate) fn push_block_locked(
        &self,
        chain: &mut ChainState,
        block: Block,
        local: bool,
    ) -> Result<PushOutcome> {
        let id = block.id();
        if chain.fork_db.contains(&id.hash) || state::has_block(&self.store.snapshot(), &id.hash) {
            debug!("block {} already known", id);
            return Ok(PushOutcome::AlreadyKnown);
        }
        self.check_block_shape(&block)?;
        if !local && !block.verify_producer_signature() {
            return Err(BlockError::BadBlock {
                id,
                reason: "invalid producer signature".to_string(),
            });
        }

        let block = chain.fork_db.push(block)?;
        let head = chain.head.head;
        if *block.parent_hash() == head.hash {
            if let Err(err) = self.apply_block(chain, &block, local) {
                warn!("failed to apply block {}: {}", id, err);
                chain.fork_db.remove(&id);
                chain.reset_fork_head();
                return Err(err);
            }
            Ok(PushOutcome::Applied)
        } else if id.number > head.number {
            let erased = self.switch_fork(chain, &block)?;
            Ok(PushOutcome::SwitchedFork { erased })
        } else {
            info!("stored fork block {}, head stays at {}", id, head);
            Ok(PushOutcome::StoredAsFork)
        }
    }

    fn check_block_shape(&self, block: &Block) -> Result<()> {
        let id = block.id();
        let size = block.serialized_size();
        if size > self.config.max_block_size {
            return Err(BlockError::BadBlock {
                id,
                reason: format!("size {} exceeds limit {}", size, self.config.max_block_size),
            });
        }
        let shielded = block.shielded_transaction_count();
        if shielded > self.config.max_shielded_per_block {
            return Err(BlockError::BadBlock {
                id,
                reason: format!(
                    "{} shielded transactions exceed limit {}",
                    shielded, self.config.max_shielded_per_block
                ),
            });
        }
        if transactions_root(&block.transactions) != *block.merkle_root() {
            return Err(BlockError::BadBlock {
                id,
                reason: "merkle root mismatch".to_string(),
            });
        }
        Ok(())
    }

    /// Applies `block` on top of the current head in one top-level session.
    /// Either every write of the block is committed or none is.
    pub(crate) fn apply_block(&self, chain: &mut ChainState, block: &Block, local: bool) -> Result<()> {
        let id = block.id();
        let ChainState {
            token,
            fork_db,
            head,
            ..
        } = chain;
        let mut session = self.store.build_session(token)?;

        self.consensus
            .valid_block(block)
            .map_err(|reason| BlockError::ValidateSchedule(id, reason))?;
        if local {
            for transaction in &block.transactions {
                transaction.set_verified(true);
            }
        } else {
            self.verify_signatures(&session, block)?;
        }

        let context = BlockContext {
            number: id.number,
            timestamp: block.timestamp(),
            has_producer_signature: block.has_producer_signature(),
        };
        let mut receipts = Vec::with_capacity(block.transactions.len());
        for transaction in &block.transactions {
            let receipt = self
                .processor
                .process(&mut session, transaction, Some(&context))
                .map_err(|err| BlockError::Transaction {
                    block: id,
                    transaction: transaction.id(),
                    err,
                })?;
            receipts.push(receipt);
        }
        self.consensus
            .apply_block(block)
            .map_err(|reason| BlockError::BadBlock { id, reason })?;

        let previous_irreversible = head.last_irreversible;
        let last_irreversible = self
            .consensus
            .last_irreversible_number(&id)
            .max(previous_irreversible)
            .min(id.number);
        let new_head = HeadState {
            head: id,
            timestamp: block.timestamp(),
            last_irreversible,
        };
        state::put_block(&mut session, block);
        state::put_block_id(&mut session, &id);
        state::put_recent_block(&mut session, &id);
        state::put_head_state(&mut session, &new_head);
        // the sealed layer must land in the window of the new head, so that
        // the flush triggered by this commit sees the new irreversible count
        let reversible = id.number - last_irreversible;
        self.store.set_revocable_depth(reversible as usize);
        if let Err(err) = session.commit() {
            return Err(self.poison(format!("commit of block {} failed: {}", id, err)));
        }
        *head = new_head;

        fork_db.set_max_size(reversible + 1);
        fork_db.prune(id.number);

        debug!(
            "applied block {} with {} transactions, last irreversible #{}",
            id,
            block.transactions.len(),
            last_irreversible
        );
        self.publish(block, &receipts, previous_irreversible, last_irreversible);
        Ok(())
    }

    /// Checks every transaction signature of a peer block on the
    /// verification pool, against permissions as of the block's parent.
    fn verify_signatures<R: KeyValueRead>(&self, reader: &R, block: &Block) -> Result<()> {
        let requests = block
            .transactions
            .iter()
            .filter_map(|transaction| {
                let owner = transaction.owner()?;
                Some(VerifyRequest {
                    transaction,
                    permission: state::owner_permission(reader, owner),
                })
            })
            .collect::<Vec<_>>();
        self.verifier
            .verify_batch(&requests)
            .map_err(|err| BlockError::Signature(block.id(), err))
    }

    fn publish(
        &self,
        block: &Block,
        receipts: &[Receipt],
        previous_irreversible: u64,
        last_irreversible: u64,
    ) {
        let Some(sink) = &self.trigger_sink else {
            return;
        };
        let id = block.id();
        sink.offer(Trigger::BlockApplied {
            id,
            transaction_count: block.transactions.len(),
        });
        for (transaction, receipt) in block.transactions.iter().zip(receipts) {
            sink.offer(Trigger::TransactionApplied {
                id: transaction.id(),
                block_number: id.number,
                result: receipt.result,
            });
        }
        if last_irreversible > previous_irreversible {
            sink.offer(Trigger::Solidified { last_irreversible });
        }
    }
}
