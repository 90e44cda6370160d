use loco_rs::prelude::*;
use num_bigint::BigUint;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::_entities::{prelude::*, transfers};

/// A single ERC-20 `Transfer` log, as produced by the block-range worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub chain_id: i64,
    pub tx_hash: String,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub timestamp: chrono::NaiveDateTime,
    pub from_address: String,
    pub to_address: String,
    pub amount: BigUint,
    pub contract_id: Option<Uuid>,
    pub contract_address: String,
    pub confirmations: i32,
    pub is_confirmed: bool,
    pub status: i32,
}

impl From<transfers::Model> for Transfer {
    fn from(model: transfers::Model) -> Self {
        Self {
            chain_id: model.chain_id,
            tx_hash: model.tx_hash,
            log_index: model.log_index,
            block_number: model.block_number,
            block_hash: model.block_hash,
            timestamp: model.timestamp,
            from_address: model.from_address,
            to_address: model.to_address,
            amount: model.amount.parse().unwrap_or_default(),
            contract_id: model.contract_id,
            contract_address: model.contract_address,
            confirmations: model.confirmations,
            is_confirmed: model.is_confirmed,
            status: model.status,
        }
    }
}

impl Transfer {
    /// `upsertTransfersBatch` (§4.5). Executed under a single transaction;
    /// conflicts on `(tx_hash, log_index, chain_id)` update the mutable
    /// fields only and are treated as benign.
    pub async fn upsert_batch(db: &DatabaseConnection, batch: &[Transfer]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let txn = db.begin().await?;

        for transfer in batch {
            let existing = Transfers::find()
                .filter(transfers::Column::TxHash.eq(transfer.tx_hash.to_lowercase()))
                .filter(transfers::Column::LogIndex.eq(transfer.log_index))
                .filter(transfers::Column::ChainId.eq(transfer.chain_id))
                .one(&txn)
                .await?;

            match existing {
                Some(model) => {
                    let mut active: transfers::ActiveModel = model.into();
                    active.amount = Set(transfer.amount.to_string());
                    active.timestamp = Set(transfer.timestamp);
                    active.block_hash = Set(transfer.block_hash.to_lowercase());
                    active.status = Set(transfer.status);
                    active.confirmations = Set(transfer.confirmations);
                    active.is_confirmed = Set(transfer.is_confirmed);
                    active.updated_at = Set(chrono::Utc::now().naive_utc());
                    active.update(&txn).await?;
                }
                None => {
                    let active = transfers::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        chain_id: Set(transfer.chain_id),
                        tx_hash: Set(transfer.tx_hash.to_lowercase()),
                        log_index: Set(transfer.log_index),
                        block_number: Set(transfer.block_number),
                        block_hash: Set(transfer.block_hash.to_lowercase()),
                        timestamp: Set(transfer.timestamp),
                        from_address: Set(transfer.from_address.to_lowercase()),
                        to_address: Set(transfer.to_address.to_lowercase()),
                        amount: Set(transfer.amount.to_string()),
                        contract_id: Set(transfer.contract_id),
                        contract_address: Set(transfer.contract_address.to_lowercase()),
                        confirmations: Set(transfer.confirmations),
                        is_confirmed: Set(transfer.is_confirmed),
                        status: Set(transfer.status),
                        created_at: Set(chrono::Utc::now().naive_utc()),
                        updated_at: Set(chrono::Utc::now().naive_utc()),
                    };
                    // A unique-constraint violation here is a benign race with
                    // another worker upserting the same log; swallow it.
                    if let Err(err) = active.insert(&txn).await {
                        if !is_unique_violation(&err) {
                            return Err(err.into());
                        }
                    }
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    /// `countTransfersInRange` (§4.5).
    pub async fn count_in_range(db: &DatabaseConnection, chain_id: i64, from: i64, to: i64) -> Result<u64> {
        let count = Transfers::find()
            .filter(transfers::Column::ChainId.eq(chain_id))
            .filter(transfers::Column::BlockNumber.gte(from))
            .filter(transfers::Column::BlockNumber.lte(to))
            .count(db)
            .await?;

        Ok(count)
    }

    /// `deleteTransfersInRange` (§4.5). Returns the number of rows deleted.
    pub async fn delete_in_range(db: &DatabaseConnection, chain_id: i64, from: i64, to: i64) -> Result<u64> {
        let result = Transfers::delete_many()
            .filter(transfers::Column::ChainId.eq(chain_id))
            .filter(transfers::Column::BlockNumber.gt(from))
            .filter(transfers::Column::BlockNumber.lte(to))
            .exec(db)
            .await?;

        Ok(result.rows_affected)
    }

    /// `getStoredBlockHash` (§4.5): the block hash this indexer recorded
    /// against the given block number, if any transfer was persisted for it.
    pub async fn stored_block_hash(db: &DatabaseConnection, chain_id: i64, block: i64) -> Result<Option<String>> {
        let row = Transfers::find()
            .filter(transfers::Column::ChainId.eq(chain_id))
            .filter(transfers::Column::BlockNumber.eq(block))
            .one(db)
            .await?;

        Ok(row.map(|m| m.block_hash))
    }

    pub async fn list_by_chain(
        db: &DatabaseConnection,
        chain_id: i64,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Transfer>, u64)> {
        let paginator = Transfers::find()
            .filter(transfers::Column::ChainId.eq(chain_id))
            .order_by_desc(transfers::Column::BlockNumber)
            .paginate(db, per_page);

        let total_pages = paginator.num_pages().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((rows.into_iter().map(Transfer::from).collect(), total_pages))
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err,
        DbErr::Query(RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(e)))
            if e.is_unique_violation()
    )
}
