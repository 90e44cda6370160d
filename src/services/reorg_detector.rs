//! Compares stored vs. live block hashes and rolls back on divergence (§4.4).

use sea_orm::DatabaseConnection;

use crate::errors::IndexerError;
use crate::models::indexer_state::IndexerStateModel;
use crate::models::reorg::{NewReorg, Reorg};
use crate::models::transfer::Transfer;
use crate::services::rpc_client::RpcClient;

pub const MAX_DEPTH: i64 = 100;
/// Transfers up to this many blocks past the reorg point are considered
/// potentially orphaned and are swept along with the rollback.
const AFFECTED_LOOKAHEAD: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorgOutcome {
    NoOp,
    RolledBack {
        reorg_id: uuid::Uuid,
        rollback_to: i64,
        block_number: i64,
        transfers_deleted: u64,
    },
}

pub struct ReorgDetector<'a> {
    db: &'a DatabaseConnection,
    rpc: &'a RpcClient,
    check_depth: i64,
}

impl<'a> ReorgDetector<'a> {
    pub fn new(db: &'a DatabaseConnection, rpc: &'a RpcClient, check_depth: i64) -> Self {
        Self { db, rpc, check_depth }
    }

    /// `checkForReorg(chainId, blockNumber)`.
    pub async fn check_for_reorg(
        &self,
        chain_id: i64,
        contract_address: &str,
        block_number: i64,
        head: i64,
    ) -> Result<ReorgOutcome, IndexerError> {
        if block_number < 1 || head - block_number > self.check_depth {
            return Ok(ReorgOutcome::NoOp);
        }

        let live_block = match self.rpc.get_block_by_number(block_number as u64).await {
            Ok(block) => block,
            Err(_) => return Ok(ReorgOutcome::NoOp),
        };

        let stored_hash = Transfer::stored_block_hash(self.db, chain_id, block_number).await?;
        let stored_hash = match stored_hash {
            Some(h) => h,
            None => return Ok(ReorgOutcome::NoOp),
        };

        if live_block.hash.eq_ignore_ascii_case(&stored_hash) {
            return Ok(ReorgOutcome::NoOp);
        }

        if Reorg::find_recent_at_block(self.db, chain_id, block_number)
            .await?
            .is_some()
        {
            return Ok(ReorgOutcome::NoOp);
        }

        let depth = self.walk_back_to_fork_point(chain_id, block_number).await?;
        let rollback = block_number - depth;

        let affected_to = block_number + AFFECTED_LOOKAHEAD;
        let affected = Transfer::count_in_range(self.db, chain_id, rollback + 1, affected_to).await?;

        let reorg = Reorg::create(
            self.db,
            NewReorg {
                chain_id,
                detected_at_block: block_number,
                reorg_depth: depth,
                old_block_hash: stored_hash,
                new_block_hash: live_block.hash.clone(),
            },
        )
        .await?;

        let deleted = Transfer::delete_in_range(self.db, chain_id, rollback, affected_to).await?;
        IndexerStateModel::reset(self.db, chain_id, contract_address, rollback).await?;
        Reorg::mark_resolved(self.db, reorg.id, deleted as i64).await?;

        tracing::warn!(
            chain_id,
            contract_address,
            block_number,
            depth,
            rollback,
            deleted,
            "reorg detected and rolled back"
        );

        Ok(ReorgOutcome::RolledBack {
            reorg_id: reorg.id,
            rollback_to: rollback,
            block_number,
            transfers_deleted: deleted,
        })
    }

    /// Step 3: walk backward from `block_number`, comparing live vs. stored
    /// hashes, up to `MAX_DEPTH`. Returns the number of blocks that diverged.
    async fn walk_back_to_fork_point(&self, chain_id: i64, block_number: i64) -> Result<i64, IndexerError> {
        for k in 1..=MAX_DEPTH {
            let candidate = block_number - k;
            if candidate < 1 {
                return Ok(k - 1);
            }

            let stored = Transfer::stored_block_hash(self.db, chain_id, candidate).await?;
            let stored = match stored {
                Some(h) => h,
                None => continue,
            };

            let live = self.rpc.get_block_by_number(candidate as u64).await?;
            if live.hash.eq_ignore_ascii_case(&stored) {
                return Ok(k);
            }
        }

        Ok(MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_depth_is_bounded() {
        assert_eq!(MAX_DEPTH, 100);
    }
}
