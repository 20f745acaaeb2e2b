//! Packing pending transactions into a locally produced block.

use {
    crate::{
        error::{PushOutcome, Result},
        ledger::{ChainState, Ledger},
    },
    log::*,
    std::time::Instant,
    strata_merkle_tree::transactions_root,
    strata_runtime::transaction_processor::BlockContext,
    strata_sdk::{
        block::{Block, RawBlockHeader},
        signature::Signer,
        transaction::{Transaction, TransactionError},
    },
};

/// Size of an ed25519 signature once serialized into a header.
const PRODUCER_SIGNATURE_BYTES: u64 = 64;

/// Supplies candidate transactions while a block is being packed.
pub trait PackingSource {
    /// The next transaction to try, or `None` when nothing is left to offer
    /// in this round.
    fn next_candidate(&mut self) -> Option<Transaction>;

    /// `transaction` did not fit this block but stays valid for a later one.
    /// It must not be offered again in the same round.
    fn postpone(&mut self, transaction: Transaction);

    /// `transaction` failed against the head state and is dropped.
    fn reject(&mut self, transaction: Transaction, err: TransactionError);
}

impl Ledger {
    /// Builds, signs and pushes a block on top of the current head, packing
    /// candidates from `source` until it runs dry or `deadline` passes.
    pub fn produce_block(
        &self,
        producer: &dyn Signer,
        timestamp: u64,
        deadline: Instant,
        source: &mut dyn PackingSource,
    ) -> Result<(Block, PushOutcome)> {
        self.check_poisoned()?;
        let mut chain = self.chain.lock().unwrap();
        let parent = chain.head.head;
        let number = parent.number + 1;

        let transactions = self.pack_transactions(&mut chain, number, timestamp, deadline, source)?;
        let mut block = Block::new(
            RawBlockHeader {
                parent_hash: parent.hash,
                number,
                timestamp,
                producer: producer.pubkey(),
                merkle_root: transactions_root(&transactions),
            },
            transactions,
        );
        block.sign(producer);
        info!(
            "produced block {} with {} transactions",
            block.id(),
            block.transactions.len()
        );

        let outcome = self.push_block_locked(&mut chain, block.clone(), true)?;
        Ok((block, outcome))
    }

    /// Applies candidates one by one in nested sessions of a throwaway
    /// session, keeping those that succeed and fit. Each kept transaction
    /// carries its result in `ret`.
    fn pack_transactions(
        &self,
        chain: &mut ChainState,
        number: u64,
        timestamp: u64,
        deadline: Instant,
        source: &mut dyn PackingSource,
    ) -> Result<Vec<Transaction>> {
        let mut session = self.store.build_session(&mut chain.token)?;
        let context = BlockContext {
            number,
            timestamp,
            has_producer_signature: false,
        };
        let mut block_size = Block::default().serialized_size() + PRODUCER_SIGNATURE_BYTES;
        let mut shielded = 0;
        let mut packed = vec![];

        while Instant::now() < deadline {
            let Some(mut transaction) = source.next_candidate() else {
                break;
            };
            if transaction.is_shielded() && shielded >= self.config.max_shielded_per_block {
                source.postpone(transaction);
                continue;
            }

            let mut nested = session.nested();
            let receipt = match self.processor.process(&mut nested, &transaction, Some(&context)) {
                Ok(receipt) => receipt,
                Err(err) => {
                    drop(nested);
                    debug!("dropping {} from block #{}: {}", transaction.id(), number, err);
                    source.reject(transaction, err);
                    continue;
                }
            };
            transaction.ret = Some(receipt.result);
            let size = transaction.serialized_size();
            if block_size + size > self.config.max_block_size {
                drop(nested);
                transaction.ret = None;
                source.postpone(transaction);
                continue;
            }
            nested.commit()?;

            block_size += size;
            if transaction.is_shielded() {
                shielded += 1;
            }
            packed.push(transaction);
        }
        Ok(packed)
    }
}
