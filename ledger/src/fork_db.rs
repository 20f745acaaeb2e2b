//! In-memory tree of candidate blocks rooted at the last committed block.
//!
//! Every block the node has linked but not necessarily applied lives here,
//! so the node can switch to a longer branch without asking peers for its
//! blocks again. The tree only keeps the window above the last irreversible
//! block.

use {
    std::{
        collections::{BTreeMap, HashMap, HashSet},
        sync::Arc,
    },
    strata_sdk::{
        block::{Block, BlockId},
        hash::Hash,
    },
    thiserror::Error,
};

pub const DEFAULT_FORK_DB_MAX_SIZE: u64 = 65_536;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForkDbError {
    #[error("parent of {0} is unknown")]
    Unlinked(BlockId),

    #[error("block {id} does not follow its parent #{parent_number}")]
    NumberMismatch { id: BlockId, parent_number: u64 },

    #[error("no common ancestor for {0} and {1}")]
    NonCommon(BlockId, BlockId),

    #[error("unknown block {0}")]
    Unknown(BlockId),
}

pub type Result<T> = std::result::Result<T, ForkDbError>;

/// A branch, newest block first.
pub type Branch = Vec<Arc<Block>>;

#[derive(Debug)]
pub struct ForkDb {
    blocks: HashMap<Hash, Arc<Block>>,
    by_number: BTreeMap<u64, Vec<Hash>>,
    head: Option<BlockId>,
    max_size: u64,
}

impl Default for ForkDb {
    fn default() -> Self {
        Self {
            blocks: HashMap::new(),
            by_number: BTreeMap::new(),
            head: None,
            max_size: DEFAULT_FORK_DB_MAX_SIZE,
        }
    }
}

impl ForkDb {
    /// Resets the tree to a single root.
    pub fn start(&mut self, block: Block) {
        self.blocks.clear();
        self.by_number.clear();
        let id = block.id();
        self.insert(Arc::new(block));
        self.head = Some(id);
    }

    fn insert(&mut self, block: Arc<Block>) {
        let id = block.id();
        self.by_number.entry(id.number).or_default().push(id.hash);
        self.blocks.insert(id.hash, block);
    }

    /// Links `block` under its parent. The head moves to it when it is
    /// higher than the current head.
    pub fn push(&mut self, block: Block) -> Result<Arc<Block>> {
        let id = block.id();
        if let Some(existing) = self.blocks.get(&id.hash) {
            return Ok(existing.clone());
        }
        let parent = self
            .blocks
            .get(block.parent_hash())
            .ok_or(ForkDbError::Unlinked(id))?;
        if parent.number().checked_add(1) != Some(id.number) {
            return Err(ForkDbError::NumberMismatch {
                id,
                parent_number: parent.number(),
            });
        }

        let block = Arc::new(block);
        self.insert(block.clone());
        if self.head.map(|head| id.number > head.number).unwrap_or(true) {
            self.head = Some(id);
        }
        Ok(block)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Arc<Block>> {
        self.blocks.get(hash)
    }

    pub fn head(&self) -> Option<BlockId> {
        self.head
    }

    pub fn set_head(&mut self, id: &BlockId) -> Result<()> {
        if !self.contains(&id.hash) {
            return Err(ForkDbError::Unknown(*id));
        }
        self.head = Some(*id);
        Ok(())
    }

    /// Moves the head to its parent, keeping the old head in the tree.
    /// Returns the new head, or `None` if the parent is not held.
    pub fn pop(&mut self) -> Option<BlockId> {
        let head = self.head?;
        let parent = self.blocks.get(&head.hash)?.parent_hash();
        let parent_id = self.blocks.get(parent)?.id();
        self.head = Some(parent_id);
        Some(parent_id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: u64) {
        self.max_size = max_size.max(1);
    }

    /// Drops every block more than `max_size - 1` heights below
    /// `head_number`.
    pub fn prune(&mut self, head_number: u64) {
        let min_number = (head_number + 1).saturating_sub(self.max_size);
        let keep = self.by_number.split_off(&min_number);
        for hash in self.by_number.values().flatten() {
            self.blocks.remove(hash);
        }
        self.by_number = keep;
    }

    pub fn remove(&mut self, id: &BlockId) {
        if self.blocks.remove(&id.hash).is_none() {
            return;
        }
        if let Some(hashes) = self.by_number.get_mut(&id.number) {
            hashes.retain(|hash| *hash != id.hash);
            if hashes.is_empty() {
                self.by_number.remove(&id.number);
            }
        }
        if self.head == Some(*id) {
            self.head = None;
        }
    }

    /// Removes `id` and every block descending from it.
    pub fn remove_subtree(&mut self, id: &BlockId) {
        let mut doomed: HashSet<Hash> = HashSet::from([id.hash]);
        let descendants: Vec<BlockId> = self
            .by_number
            .range(id.number + 1..)
            .flat_map(|(_, hashes)| hashes.iter())
            .filter_map(|hash| self.blocks.get(hash))
            .filter_map(|block| {
                if doomed.contains(block.parent_hash()) {
                    doomed.insert(block.id().hash);
                    Some(block.id())
                } else {
                    None
                }
            })
            .collect();
        self.remove(id);
        for descendant in descendants {
            self.remove(&descendant);
        }
    }

    /// The oldest ancestor of `id` still held, or `id` itself.
    pub fn oldest_ancestor(&self, id: &BlockId) -> BlockId {
        let mut oldest = *id;
        while let Some(parent) = self
            .blocks
            .get(&oldest.hash)
            .and_then(|block| self.blocks.get(block.parent_hash()))
        {
            oldest = parent.id();
        }
        oldest
    }

    /// Walks back from `a` and `b` to their common ancestor. Each branch
    /// is newest first and excludes the ancestor.
    pub fn branches(&self, a: &BlockId, b: &BlockId) -> Result<(Branch, Branch)> {
        let non_common = || ForkDbError::NonCommon(*a, *b);
        let mut tip_a = self.blocks.get(&a.hash).ok_or_else(non_common)?.clone();
        let mut tip_b = self.blocks.get(&b.hash).ok_or_else(non_common)?.clone();
        let mut branch_a = vec![];
        let mut branch_b = vec![];

        while tip_a.id() != tip_b.id() {
            let (number_a, number_b) = (tip_a.number(), tip_b.number());
            if number_a >= number_b {
                let parent = self.blocks.get(tip_a.parent_hash()).ok_or_else(non_common)?;
                branch_a.push(std::mem::replace(&mut tip_a, parent.clone()));
            }
            if number_b >= number_a {
                let parent = self.blocks.get(tip_b.parent_hash()).ok_or_else(non_common)?;
                branch_b.push(std::mem::replace(&mut tip_b, parent.clone()));
            }
        }
        Ok((branch_a, branch_b))
    }
}
