use {
    crate::{
        error::{BlockError, Result},
        fork_db::Branch,
        ledger::{ChainState, Ledger},
    },
    log::*,
    strata_runtime::state,
    strata_sdk::block::Block,
};

impl Ledger {
    /// Makes `new_head` the head of the chain: erases the current branch back
    /// to the common ancestor, then applies the branch leading to `new_head`.
    /// If any block of the new branch fails, the old branch is restored and
    /// the failing block and its descendants are dropped from the fork store.
    ///
    /// Returns the erased blocks, newest first.
    pub(crate) fn switch_fork(&self, chain: &mut ChainState, new_head: &Block) -> Result<Vec<Block>> {
        let new_id = new_head.id();
        let old_head = chain.head.head;
        let (new_branch, old_branch) = match chain.fork_db.branches(&new_id, &old_head) {
            Ok(branches) => branches,
            Err(err) => {
                // the branch lost its link to the chain when its fork point
                // was pruned
                let detached = chain.fork_db.oldest_ancestor(&new_id);
                warn!("dropping branch from {} to {}: {}", detached, new_id, err);
                chain.fork_db.remove_subtree(&detached);
                chain.reset_fork_head();
                return Err(err.into());
            }
        };
        if old_branch.len() > self.store.revocable_len() {
            // forks below the last irreversible block, so no block of the
            // new branch can ever be applied
            let fork_root = new_branch.last().map(|block| block.id()).unwrap_or(new_id);
            warn!(
                "dropping branch from {} to {}: it forks {} blocks below the head",
                fork_root,
                new_id,
                old_branch.len()
            );
            chain.fork_db.remove_subtree(&fork_root);
            chain.reset_fork_head();
            return Err(BlockError::NonCommonBlock(new_id, old_head));
        }
        warn!(
            "switching fork from {} to {}: erasing {} blocks, applying {}",
            old_head,
            new_id,
            old_branch.len(),
            new_branch.len()
        );

        chain.fork_db.set_head(&old_head)?;
        self.erase_blocks(chain, old_branch.len())?;

        for (applied, block) in new_branch.iter().rev().enumerate() {
            if let Err(err) = self.apply_block(chain, block, false) {
                warn!("fork switch to {} failed at {}: {}", new_id, block.id(), err);
                chain.fork_db.remove_subtree(&block.id());
                self.erase_blocks(chain, applied)?;
                self.restore_branch(chain, &old_branch);
                return Err(err);
            }
            chain.fork_db.set_head(&block.id())?;
        }
        info!("switched fork to {}", new_id);
        Ok(old_branch.iter().map(|block| (**block).clone()).collect())
    }

    /// Reverts the newest `count` applied blocks.
    fn erase_blocks(&self, chain: &mut ChainState, count: usize) -> Result<()> {
        for _ in 0..count {
            let erased = chain.head.head;
            if let Err(err) = self.store.pop(&mut chain.token) {
                return Err(self.poison(format!("cannot erase block {}: {}", erased, err)));
            }
            chain.fork_db.pop();
            chain.head = state::get_head_state(&self.store.snapshot()).ok_or_else(|| {
                self.poison(format!("no head state left after erasing {}", erased))
            })?;
            debug!("erased block {}", erased);
        }
        Ok(())
    }

    /// Re-applies a previously erased branch, oldest first. A failure stops
    /// the restore; the blocks left unapplied are kept as orphans.
    fn restore_branch(&self, chain: &mut ChainState, branch: &Branch) {
        for (restored, block) in branch.iter().rev().enumerate() {
            if let Err(err) = self.apply_block(chain, block, false) {
                let unapplied = &branch[..branch.len() - restored];
                error!(
                    "failed to restore block {}: {}, orphaning {} blocks",
                    block.id(),
                    err,
                    unapplied.len()
                );
                chain
                    .orphaned
                    .extend(unapplied.iter().map(|block| (**block).clone()));
                break;
            }
        }
        chain.reset_fork_head();
    }
}
