//! Admission of client transactions, and the queues block production draws
//! from.
//!
//! Admitted transactions wait in `pending`. After every block the pool is
//! rescheduled: pending entries, and the transactions of blocks erased by a
//! fork switch, move to `repush`, from where the repush service re-admits
//! them against the new head.

use {
    dashmap::{mapref::entry::Entry, DashMap},
    log::*,
    std::{
        cmp::Reverse,
        collections::{BTreeMap, HashMap, HashSet, VecDeque},
        mem,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex,
        },
    },
    strata_ledger::{Ledger, PackingSource},
    strata_runtime::state,
    strata_sdk::{
        block::Block,
        receipt::Receipt,
        transaction::{self, Transaction, TransactionError, TransactionId},
    },
};

pub const DEFAULT_MAX_PENDING: usize = 2_000;
pub const DEFAULT_MAX_SHIELDED_PENDING: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Admission answers `ServerBusy` once pending and re-push together
    /// hold more than this many transactions.
    pub max_pending: usize,
    pub max_shielded_pending: usize,
    /// Order by receipt fee instead of arrival.
    pub priority_mode: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            max_shielded_pending: DEFAULT_MAX_SHIELDED_PENDING,
            priority_mode: false,
        }
    }
}

/// Position in a queue: highest rank first, then arrival. In FIFO mode every
/// rank is zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rank: Reverse<u64>,
    sequence: u64,
}

#[derive(Default)]
struct Queues {
    pending: BTreeMap<QueueKey, Transaction>,
    repush: BTreeMap<QueueKey, Transaction>,
    // erased by a fork switch, waiting for the next reschedule
    popped: VecDeque<Transaction>,
    // every id held by the three queues above
    ids: HashSet<TransactionId>,
}

impl Queues {
    fn shielded_count(&self) -> usize {
        self.pending
            .values()
            .chain(self.repush.values())
            .filter(|transaction| transaction.is_shielded())
            .count()
    }
}

/// Marks an id as being admitted. A second admission of the same id fails
/// while the guard lives.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<TransactionId, ()>,
    id: TransactionId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a DashMap<TransactionId, ()>, id: TransactionId) -> Option<Self> {
        match in_flight.entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(());
                Some(Self { in_flight, id })
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

pub struct TransactionPool {
    config: PoolConfig,
    ledger: Arc<Ledger>,
    queues: Mutex<Queues>,
    in_flight: DashMap<TransactionId, ()>,
    next_sequence: AtomicU64,
}

impl TransactionPool {
    pub fn new(config: PoolConfig, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            ledger,
            queues: Mutex::default(),
            in_flight: DashMap::new(),
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn pending_len(&self) -> usize {
        self.queues.lock().unwrap().pending.len()
    }

    pub fn repush_len(&self) -> usize {
        self.queues.lock().unwrap().repush.len()
    }

    pub fn popped_len(&self) -> usize {
        self.queues.lock().unwrap().popped.len()
    }

    /// Whether `id` waits in any of the queues.
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.queues.lock().unwrap().ids.contains(id)
    }

    pub fn is_too_many_pending(&self) -> bool {
        let queues = self.queues.lock().unwrap();
        queues.pending.len() + queues.repush.len() > self.config.max_pending
    }

    /// Validates `transaction` against the head state and queues it for
    /// the next block.
    pub fn admit(&self, transaction: Transaction) -> transaction::Result<Receipt> {
        if self.is_too_many_pending() {
            return Err(TransactionError::ServerBusy);
        }
        if transaction.is_shielded()
            && self.queues.lock().unwrap().shielded_count() >= self.config.max_shielded_pending
        {
            debug!("shielded pending limit reached, rejecting {}", transaction.id());
            return Err(TransactionError::ServerBusy);
        }

        let id = transaction.id();
        let _guard = InFlightGuard::acquire(&self.in_flight, id)
            .ok_or(TransactionError::DuplicateTransaction)?;
        if self.ledger.processor().status_cache().contains(&id) || self.contains(&id) {
            return Err(TransactionError::DuplicateTransaction);
        }
        match self.validate(&transaction) {
            Ok(receipt) => {
                self.enqueue(transaction, &receipt);
                Ok(receipt)
            }
            Err(err @ TransactionError::TaposInvalid(_)) => {
                // the anchor may belong to a branch the node has yet to
                // switch to
                debug!("queueing {} for re-push: {}", id, err);
                self.requeue(self.next_key(0), transaction);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Re-admits the first re-push entry. Returns `false` when nothing was
    /// re-admitted or dropped: the queue was empty, or its first entry went
    /// back to the queue.
    pub fn repush_one(&self) -> bool {
        let Some((key, transaction)) = self.take_repush() else {
            return false;
        };
        let id = transaction.id();
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, id) else {
            // a concurrent admission of the same id is in progress
            self.requeue(key, transaction);
            return false;
        };
        match self.validate(&transaction) {
            Ok(receipt) => self.enqueue(transaction, &receipt),
            Err(TransactionError::TaposInvalid(reason)) => {
                trace!("{} still fails Tapos: {}", id, reason);
                self.requeue(self.next_key(0), transaction);
                return false;
            }
            Err(err) => debug!("dropping re-pushed transaction {}: {}", id, err),
        }
        true
    }

    fn take_repush(&self) -> Option<(QueueKey, Transaction)> {
        let mut queues = self.queues.lock().unwrap();
        let (key, transaction) = queues.repush.pop_first()?;
        queues.ids.remove(&transaction.id());
        Some((key, transaction))
    }

    fn requeue(&self, key: QueueKey, transaction: Transaction) {
        let mut queues = self.queues.lock().unwrap();
        if queues.ids.insert(transaction.id()) {
            queues.repush.insert(key, transaction);
        }
    }

    fn validate(&self, transaction: &Transaction) -> transaction::Result<Receipt> {
        if self.ledger.has_transaction(&transaction.id()) {
            return Err(TransactionError::DuplicateTransaction);
        }
        self.check_signatures(transaction)?;
        self.ledger.simulate_transaction(transaction)
    }

    fn enqueue(&self, transaction: Transaction, receipt: &Receipt) {
        let id = transaction.id();
        let key = self.next_key(receipt.order_key());
        let mut queues = self.queues.lock().unwrap();
        if queues.ids.insert(id) {
            queues.pending.insert(key, transaction);
        }
        drop(queues);
        self.ledger.processor().status_cache().insert(id);
        trace!("admitted {}", id);
    }

    fn check_signatures(&self, transaction: &Transaction) -> transaction::Result<()> {
        if transaction.is_verified() {
            return Ok(());
        }
        let owner = transaction
            .owner()
            .ok_or(TransactionError::ContractSizeNotEqualToOne(0))?;
        let permission = state::owner_permission(&self.ledger.snapshot(), owner);
        self.ledger
            .processor()
            .signature_engine()
            .verify(transaction, &permission)
            .map_err(|err| TransactionError::SignatureInvalid(err.to_string()))?;
        transaction.set_verified(true);
        Ok(())
    }

    fn next_key(&self, order_key: u64) -> QueueKey {
        let rank = if self.config.priority_mode {
            order_key
        } else {
            0
        };
        QueueKey {
            rank: Reverse(rank),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Keeps the transactions of blocks erased by a fork switch, newest
    /// block first, until the next reschedule.
    pub fn push_popped(&self, erased: &[Block]) {
        let mut queues = self.queues.lock().unwrap();
        for block in erased.iter().rev() {
            for transaction in &block.transactions {
                let mut transaction = transaction.clone();
                transaction.ret = None;
                if queues.ids.insert(transaction.id()) {
                    queues.popped.push_back(transaction);
                }
            }
        }
    }

    /// Moves popped and pending entries to re-push so they are validated
    /// again against the new head. Entries that expired or got committed
    /// are dropped.
    pub fn reschedule(&self) {
        let head = self.ledger.head_state();
        let snapshot = self.ledger.snapshot();
        let mut queues = self.queues.lock().unwrap();
        let popped = mem::take(&mut queues.popped)
            .into_iter()
            .map(|transaction| (self.next_key(0), transaction))
            .collect::<Vec<_>>();
        let pending = mem::take(&mut queues.pending);
        let repush = mem::take(&mut queues.repush);

        let mut dropped = 0;
        for (key, transaction) in repush.into_iter().chain(pending).chain(popped) {
            let id = transaction.id();
            if transaction.expiration() <= head.timestamp
                || state::has_transaction(&snapshot, &id)
            {
                queues.ids.remove(&id);
                dropped += 1;
                continue;
            }
            queues.repush.insert(key, transaction);
        }
        debug!(
            "rescheduled at {}: {} to re-push, {} dropped",
            head.head,
            queues.repush.len(),
            dropped
        );
    }

    /// Starts drawing candidates for one block.
    pub fn packing_round(&self) -> PackingRound<'_> {
        PackingRound {
            pool: self,
            handed_out: HashMap::new(),
            postponed: vec![],
        }
    }
}

/// One block's draws from the pool. Candidates leave the queues when handed
/// out; [`PackingRound::finish`] returns those that did not make it into a
/// pushed block to the re-push queue.
pub struct PackingRound<'a> {
    pool: &'a TransactionPool,
    handed_out: HashMap<TransactionId, (QueueKey, Transaction)>,
    postponed: Vec<(QueueKey, Transaction)>,
}

impl PackingRound<'_> {
    /// `pushed` tells whether the block holding the packed candidates was
    /// accepted.
    pub fn finish(self, pushed: bool) {
        let mut entries = self.postponed;
        if !pushed {
            entries.extend(self.handed_out.into_values());
        }
        for (key, transaction) in entries {
            self.pool.requeue(key, transaction);
        }
    }
}

impl PackingSource for PackingRound<'_> {
    fn next_candidate(&mut self) -> Option<Transaction> {
        let mut queues = self.pool.queues.lock().unwrap();
        let from_pending = match (queues.pending.first_key_value(), queues.repush.first_key_value()) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some((pending, _)), Some((repush, _))) => {
                !self.pool.config.priority_mode || pending.rank <= repush.rank
            }
        };
        let (key, transaction) = if from_pending {
            queues.pending.pop_first()?
        } else {
            queues.repush.pop_first()?
        };
        queues.ids.remove(&transaction.id());
        drop(queues);

        self.handed_out
            .insert(transaction.id(), (key, transaction.clone()));
        Some(transaction)
    }

    fn postpone(&mut self, transaction: Transaction) {
        if let Some((key, _)) = self.handed_out.remove(&transaction.id()) {
            self.postponed.push((key, transaction));
        }
    }

    fn reject(&mut self, transaction: Transaction, err: TransactionError) {
        debug!("dropping {} from the pool: {}", transaction.id(), err);
        self.handed_out.remove(&transaction.id());
    }
}
