use chrono::Utc;
use loco_rs::prelude::*;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::_entities::{indexer_state, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexerStatus {
    Running,
    Stopped,
    Paused,
    Error,
}

impl IndexerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerStatus::Running => "running",
            IndexerStatus::Stopped => "stopped",
            IndexerStatus::Paused => "paused",
            IndexerStatus::Error => "error",
        }
    }
}

impl From<&str> for IndexerStatus {
    fn from(s: &str) -> Self {
        match s {
            "running" => IndexerStatus::Running,
            "paused" => IndexerStatus::Paused,
            "error" => IndexerStatus::Error,
            _ => IndexerStatus::Stopped,
        }
    }
}

/// View of `IndexerState` as returned across the control plane. All bigint
/// fields are serialized as strings per §6.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerStateView {
    pub chain_id: String,
    pub contract_address: String,
    pub start_block: String,
    pub last_processed_block: String,
    pub highest_processed_block: String,
    pub current_block: String,
    pub status: String,
    pub is_catching_up: bool,
    pub error_count: i32,
    pub last_error: Option<String>,
    pub last_error_at: Option<chrono::NaiveDateTime>,
    pub blocks_per_second: f64,
    pub transfers_indexed: String,
    pub last_indexed_at: Option<chrono::NaiveDateTime>,
}

impl From<indexer_state::Model> for IndexerStateView {
    fn from(m: indexer_state::Model) -> Self {
        Self {
            chain_id: m.chain_id.to_string(),
            contract_address: m.contract_address,
            start_block: m.start_block.to_string(),
            last_processed_block: m.last_processed_block.to_string(),
            highest_processed_block: m.highest_processed_block.to_string(),
            current_block: m.current_block.to_string(),
            status: m.status,
            is_catching_up: m.is_catching_up,
            error_count: m.error_count,
            last_error: m.last_error,
            last_error_at: m.last_error_at,
            blocks_per_second: m.blocks_per_second,
            transfers_indexed: m.transfers_indexed.to_string(),
            last_indexed_at: m.last_indexed_at,
        }
    }
}

pub struct IndexerStateModel;

impl IndexerStateModel {
    /// `getOrCreateState` (§4.5). Atomic: relies on the unique index on
    /// `(chain_id, contract_address)` to make concurrent creation safe.
    pub async fn get_or_create(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        default_start: i64,
    ) -> Result<indexer_state::Model> {
        let contract_address = contract_address.to_lowercase();

        if let Some(existing) = Self::find(db, chain_id, &contract_address).await? {
            return Ok(existing);
        }

        let model = indexer_state::ActiveModel {
            id: Set(Uuid::new_v4()),
            chain_id: Set(chain_id),
            contract_address: Set(contract_address.clone()),
            contract_id: Set(None),
            start_block: Set(default_start),
            last_processed_block: Set(default_start),
            highest_processed_block: Set(default_start),
            current_block: Set(0),
            status: Set(IndexerStatus::Stopped.as_str().to_string()),
            is_catching_up: Set(false),
            error_count: Set(0),
            last_error: Set(None),
            last_error_at: Set(None),
            blocks_per_second: Set(0.0),
            transfers_indexed: Set(0),
            last_indexed_at: Set(None),
            created_at: Set(Utc::now().naive_utc()),
            updated_at: Set(Utc::now().naive_utc()),
        };

        match model.insert(db).await {
            Ok(created) => Ok(created),
            Err(_) => Self::find(db, chain_id, &contract_address)
                .await?
                .ok_or_else(|| Error::string("failed to create or read back indexer state")),
        }
    }

    pub async fn find(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
    ) -> Result<Option<indexer_state::Model>> {
        let contract_address = contract_address.to_lowercase();
        let state = IndexerState::find()
            .filter(indexer_state::Column::ChainId.eq(chain_id))
            .filter(indexer_state::Column::ContractAddress.eq(contract_address))
            .one(db)
            .await?;
        Ok(state)
    }

    pub async fn find_all_running(db: &DatabaseConnection) -> Result<Vec<indexer_state::Model>> {
        let rows = IndexerState::find()
            .filter(indexer_state::Column::Status.eq(IndexerStatus::Running.as_str()))
            .all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_all(db: &DatabaseConnection) -> Result<Vec<indexer_state::Model>> {
        Ok(IndexerState::find().all(db).await?)
    }

    /// `updateStatus` (§4.5).
    pub async fn update_status(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        status: IndexerStatus,
    ) -> Result<indexer_state::Model> {
        let existing = Self::find(db, chain_id, contract_address)
            .await?
            .ok_or_else(|| Error::string("indexer state not found"))?;

        let mut active: indexer_state::ActiveModel = existing.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(db).await?)
    }

    /// `updateCurrentBlock` (§4.5).
    pub async fn update_current_block(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        head: i64,
    ) -> Result<indexer_state::Model> {
        let existing = Self::find(db, chain_id, contract_address)
            .await?
            .ok_or_else(|| Error::string("indexer state not found"))?;

        let mut active: indexer_state::ActiveModel = existing.into();
        active.current_block = Set(head);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(db).await?)
    }

    /// `updateLastProcessedBlock` (§4.5). `added_transfers` may be negative on
    /// a rollback. `blocks_per_second` is recomputed over the interval since
    /// `last_indexed_at`.
    pub async fn advance(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        to: i64,
        added_transfers: i64,
    ) -> Result<indexer_state::Model> {
        let existing = Self::find(db, chain_id, contract_address)
            .await?
            .ok_or_else(|| Error::string("indexer state not found"))?;

        let now = Utc::now().naive_utc();
        let prev_last_indexed = existing.last_indexed_at;
        let prev_block = existing.last_processed_block;
        let highest = existing.highest_processed_block.max(to);

        let blocks_per_second = match prev_last_indexed {
            Some(prev_time) => {
                let elapsed = (now - prev_time).num_milliseconds().max(1) as f64 / 1000.0;
                let delta_blocks = (to - prev_block).max(0) as f64;
                delta_blocks / elapsed
            }
            None => existing.blocks_per_second,
        };

        let mut active: indexer_state::ActiveModel = existing.into();
        active.last_processed_block = Set(to);
        active.highest_processed_block = Set(highest);
        active.transfers_indexed = Set((active.transfers_indexed.as_ref() + added_transfers).max(0));
        active.last_indexed_at = Set(Some(now));
        active.blocks_per_second = Set(blocks_per_second);
        active.updated_at = Set(now);

        Ok(active.update(db).await?)
    }

    /// `resetState` (§4.5).
    pub async fn reset(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        new_start: i64,
    ) -> Result<indexer_state::Model> {
        let existing = Self::find(db, chain_id, contract_address)
            .await?
            .ok_or_else(|| Error::string("indexer state not found"))?;

        let mut active: indexer_state::ActiveModel = existing.into();
        active.is_catching_up = Set(false);
        active.error_count = Set(0);
        active.last_processed_block = Set(new_start);
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(db).await?)
    }

    pub async fn set_catching_up(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        catching_up: bool,
    ) -> Result<indexer_state::Model> {
        let existing = Self::find(db, chain_id, contract_address)
            .await?
            .ok_or_else(|| Error::string("indexer state not found"))?;

        let mut active: indexer_state::ActiveModel = existing.into();
        active.is_catching_up = Set(catching_up);
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(db).await?)
    }

    /// `recordError` (§4.5).
    pub async fn record_error(
        db: &DatabaseConnection,
        chain_id: i64,
        contract_address: &str,
        message: &str,
    ) -> Result<indexer_state::Model> {
        let existing = Self::find(db, chain_id, contract_address)
            .await?
            .ok_or_else(|| Error::string("indexer state not found"))?;

        let error_count = existing.error_count + 1;

        let mut active: indexer_state::ActiveModel = existing.into();
        active.error_count = Set(error_count);
        active.last_error = Set(Some(message.to_string()));
        active.last_error_at = Set(Some(Utc::now().naive_utc()));
        active.updated_at = Set(Utc::now().naive_utc());

        Ok(active.update(db).await?)
    }
}
