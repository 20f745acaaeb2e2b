use {
    std::collections::HashSet,
    strata_sdk::{
        block::{Block, BlockId},
        pubkey::Pubkey,
    },
};

/// Producer scheduling and finality, owned by the consensus engine.
pub trait ConsensusSchedule: Send + Sync {
    /// Checks that the producer was scheduled for the block's slot.
    fn valid_block(&self, block: &Block) -> Result<(), String>;

    /// Records the applied block in the consensus state.
    fn apply_block(&self, block: &Block) -> Result<(), String>;

    /// Height of the newest block that can no longer be reverted, given the
    /// new head.
    fn last_irreversible_number(&self, head: &BlockId) -> u64;
}

/// A fixed producer set where blocks become irreversible a fixed number of
/// heights below the head.
#[derive(Debug, Clone, Default)]
pub struct FixedDepthSchedule {
    /// Empty means any producer.
    producers: HashSet<Pubkey>,
    confirmation_depth: u64,
}

impl FixedDepthSchedule {
    pub fn new(producers: impl IntoIterator<Item = Pubkey>, confirmation_depth: u64) -> Self {
        Self {
            producers: producers.into_iter().collect(),
            confirmation_depth,
        }
    }
}

impl ConsensusSchedule for FixedDepthSchedule {
    fn valid_block(&self, block: &Block) -> Result<(), String> {
        if self.producers.is_empty() || self.producers.contains(block.producer()) {
            Ok(())
        } else {
            Err(format!("{} is not a scheduled producer", block.producer()))
        }
    }

    fn apply_block(&self, _block: &Block) -> Result<(), String> {
        Ok(())
    }

    fn last_irreversible_number(&self, head: &BlockId) -> u64 {
        head.number.saturating_sub(self.confirmation_depth)
    }
}
