//! The chain ledger: owns the versioned store, the fork store and the
//! collaborators a block is applied with.

use {
    crate::{
        consensus::ConsensusSchedule,
        error::{BlockError, PushOutcome, Result},
        fork_db::ForkDb,
        genesis_config::GenesisConfig,
    },
    log::*,
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex, RwLock,
        },
        time::Instant,
    },
    strata_perf::ParallelSignatureVerifier,
    strata_runtime::{
        state::{self, HeadState, TransactionRecord},
        transaction_processor::TransactionProcessor,
        trigger::TriggerSink,
    },
    strata_sdk::{
        block::{Block, BlockId},
        receipt::Receipt,
        transaction::{self, Transaction, TransactionError, TransactionId},
    },
    strata_versioned_store::{FlushPolicy, Persistence, SessionToken, Snapshot, VersionedStore},
};

pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 2_000_000;
pub const DEFAULT_MAX_SHIELDED_PER_BLOCK: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on a block's serialized size, in bytes.
    pub max_block_size: u64,
    pub max_shielded_per_block: usize,
    /// Signature verification workers; 0 means one per core.
    pub sig_verify_threads: usize,
    pub flush_policy: FlushPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            max_shielded_per_block: DEFAULT_MAX_SHIELDED_PER_BLOCK,
            sig_verify_threads: 0,
            flush_policy: FlushPolicy::default(),
        }
    }
}

/// Everything a chain mutation needs exclusive access to.
pub(crate) struct ChainState {
    pub(crate) token: SessionToken,
    pub(crate) fork_db: ForkDb,
    pub(crate) head: HeadState,
    // erased by a fork switch and not restored after the switch failed,
    // newest first
    pub(crate) orphaned: Vec<Block>,
}

impl ChainState {
    /// Points the fork store back at the applied head.
    pub(crate) fn reset_fork_head(&mut self) {
        if let Err(err) = self.fork_db.set_head(&self.head.head) {
            error!("fork store lost the applied head: {}", err);
        }
    }
}

pub struct Ledger {
    pub(crate) config: LedgerConfig,
    pub(crate) store: VersionedStore,
    pub(crate) chain: Mutex<ChainState>,
    pub(crate) processor: Arc<TransactionProcessor>,
    pub(crate) verifier: ParallelSignatureVerifier,
    pub(crate) consensus: Arc<dyn ConsensusSchedule>,
    pub(crate) trigger_sink: Option<Arc<dyn TriggerSink>>,
    poisoned: AtomicBool,
    poison_reason: RwLock<Option<String>>,
}

impl Ledger {
    /// Opens the ledger over `backend`. An empty backend is initialized from
    /// `genesis`; otherwise the chain resumes from the persisted head.
    pub fn new(
        config: LedgerConfig,
        genesis: &GenesisConfig,
        backend: Arc<dyn Persistence>,
        processor: Arc<TransactionProcessor>,
        consensus: Arc<dyn ConsensusSchedule>,
        trigger_sink: Option<Arc<dyn TriggerSink>>,
        exit: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (store, mut token) = VersionedStore::open(backend, config.flush_policy.clone())?;
        let (head, head_block) = match state::get_head_state(&store.snapshot()) {
            Some(head) => {
                let block = state::get_block(&store.snapshot(), &head.head.hash).ok_or_else(|| {
                    BlockError::Fatal(format!("head block {} is missing from the store", head.head))
                })?;
                info!("resuming chain at {}, last irreversible #{}", head.head, head.last_irreversible);
                (head, block)
            }
            None => Self::write_genesis(&store, &mut token, genesis)?,
        };

        let reversible = head.head.number - head.last_irreversible;
        store.set_revocable_depth(reversible as usize);
        let mut fork_db = ForkDb::default();
        fork_db.set_max_size(reversible + 1);
        fork_db.start(head_block);

        let verifier = ParallelSignatureVerifier::new(
            config.sig_verify_threads,
            processor.signature_engine().clone(),
            exit,
        );
        Ok(Self {
            config,
            store,
            chain: Mutex::new(ChainState {
                token,
                fork_db,
                head,
                orphaned: vec![],
            }),
            processor,
            verifier,
            consensus,
            trigger_sink,
            poisoned: AtomicBool::new(false),
            poison_reason: RwLock::new(None),
        })
    }

    fn write_genesis(
        store: &VersionedStore,
        token: &mut SessionToken,
        genesis: &GenesisConfig,
    ) -> Result<(HeadState, Block)> {
        let block = genesis.block();
        let id = block.id();
        let head = HeadState {
            head: id,
            timestamp: block.timestamp(),
            last_irreversible: 0,
        };
        let mut session = store.build_session(token)?;
        for (address, balance) in &genesis.accounts {
            state::credit_account(&mut session, address, *balance);
        }
        state::put_block(&mut session, &block);
        state::put_block_id(&mut session, &id);
        state::put_recent_block(&mut session, &id);
        state::put_head_state(&mut session, &head);
        session.commit()?;
        info!(
            "initialized chain from genesis {} with {} accounts",
            id,
            genesis.accounts.len()
        );
        Ok((head, block))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn processor(&self) -> &Arc<TransactionProcessor> {
        &self.processor
    }

    /// Links and, when it extends the best chain, applies a block received
    /// from a peer.
    pub fn push_block(&self, block: Block) -> Result<PushOutcome> {
        self.check_poisoned()?;
        let mut chain = self.chain.lock().unwrap();
        self.push_block_locked(&mut chain, block, false)
    }

    /// Runs `transaction` against the head state without keeping any of its
    /// writes.
    pub fn simulate_transaction(&self, transaction: &Transaction) -> transaction::Result<Receipt> {
        if self.is_poisoned() {
            return Err(TransactionError::StorageFailure(
                "ledger halted after a storage failure".to_string(),
            ));
        }
        let mut chain = self.chain.lock().unwrap();
        let mut session = self
            .store
            .build_session(&mut chain.token)
            .map_err(|err| TransactionError::StorageFailure(err.to_string()))?;
        self.processor.process(&mut session, transaction, None)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn head_state(&self) -> HeadState {
        self.chain.lock().unwrap().head
    }

    pub fn head(&self) -> BlockId {
        self.head_state().head
    }

    pub fn has_transaction(&self, id: &TransactionId) -> bool {
        state::has_transaction(&self.store.snapshot(), id)
    }

    pub fn get_transaction_record(&self, id: &TransactionId) -> Option<TransactionRecord> {
        state::get_transaction_record(&self.store.snapshot(), id)
    }

    /// The block at `number` on the current chain.
    pub fn get_block_by_number(&self, number: u64) -> Option<Block> {
        let snapshot = self.store.snapshot();
        let id = state::get_block_id(&snapshot, number)?;
        state::get_block(&snapshot, &id.hash)
    }

    /// Takes the blocks a failed fork switch erased and could not restore,
    /// newest first. Their transactions are no longer on any applied branch.
    pub fn take_orphaned_blocks(&self) -> Vec<Block> {
        std::mem::take(&mut self.chain.lock().unwrap().orphaned)
    }

    /// Head of the fork store; matches [`Ledger::head`] between pushes.
    pub fn fork_head(&self) -> Option<BlockId> {
        self.chain.lock().unwrap().fork_db.head()
    }

    pub fn fork_db_len(&self) -> usize {
        self.chain.lock().unwrap().fork_db.len()
    }

    pub fn revocable_len(&self) -> usize {
        self.store.revocable_len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// While set, irreversible layers are flushed faster the closer the
    /// deadline gets.
    pub fn set_shutdown_deadline(&self, deadline: Option<Instant>) {
        self.store.set_shutdown_deadline(deadline);
    }

    /// Flushes every committed layer to persistence. A poisoned ledger
    /// flushes nothing.
    pub fn shutdown(&self) -> Result<()> {
        self.check_poisoned()?;
        let mut chain = self.chain.lock().unwrap();
        self.store.flush_all(&mut chain.token)?;
        info!("ledger shut down at {}", chain.head.head);
        Ok(())
    }

    pub(crate) fn check_poisoned(&self) -> Result<()> {
        if self.is_poisoned() {
            let reason = self.poison_reason.read().unwrap().clone().unwrap_or_default();
            return Err(BlockError::Fatal(reason));
        }
        Ok(())
    }

    /// Stops the ledger for good after a failure that left committed state
    /// unknown.
    pub(crate) fn poison(&self, reason: String) -> BlockError {
        error!("halting ledger: {}", reason);
        *self.poison_reason.write().unwrap() = Some(reason.clone());
        self.poisoned.store(true, Ordering::Release);
        BlockError::Fatal(reason)
    }
}
