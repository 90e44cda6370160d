//! Thin façade over the model-level persistence operations (§4.5), so
//! callers depend on one port rather than reaching into `models::*` piecemeal.

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::errors::IndexerError;
use crate::models::_entities::{indexer_state, reorgs};
use crate::models::contract::Contract;
use crate::models::indexer_state::{IndexerStateModel, IndexerStatus};
use crate::models::reorg::{NewReorg, Reorg};
use crate::models::transfer::Transfer;

#[derive(Clone)]
pub struct Persistence {
    db: DatabaseConnection,
}

impl Persistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn upsert_transfers_batch(&self, batch: &[Transfer]) -> Result<(), IndexerError> {
        Transfer::upsert_batch(&self.db, batch).await.map_err(map_loco_err)
    }

    pub async fn count_transfers_in_range(&self, chain_id: i64, from: i64, to: i64) -> Result<u64, IndexerError> {
        Transfer::count_in_range(&self.db, chain_id, from, to).await.map_err(map_loco_err)
    }

    pub async fn delete_transfers_in_range(&self, chain_id: i64, from: i64, to: i64) -> Result<u64, IndexerError> {
        Transfer::delete_in_range(&self.db, chain_id, from, to).await.map_err(map_loco_err)
    }

    pub async fn stored_block_hash(&self, chain_id: i64, block: i64) -> Result<Option<String>, IndexerError> {
        Transfer::stored_block_hash(&self.db, chain_id, block).await.map_err(map_loco_err)
    }

    pub async fn get_or_create_state(
        &self,
        chain_id: i64,
        contract_address: &str,
        default_start: i64,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::get_or_create(&self.db, chain_id, contract_address, default_start)
            .await
            .map_err(map_loco_err)
    }

    pub async fn find_state(
        &self,
        chain_id: i64,
        contract_address: &str,
    ) -> Result<Option<indexer_state::Model>, IndexerError> {
        IndexerStateModel::find(&self.db, chain_id, contract_address).await.map_err(map_loco_err)
    }

    pub async fn find_all_running(&self) -> Result<Vec<indexer_state::Model>, IndexerError> {
        IndexerStateModel::find_all_running(&self.db).await.map_err(map_loco_err)
    }

    pub async fn find_all_states(&self) -> Result<Vec<indexer_state::Model>, IndexerError> {
        IndexerStateModel::find_all(&self.db).await.map_err(map_loco_err)
    }

    pub async fn update_status(
        &self,
        chain_id: i64,
        contract_address: &str,
        status: IndexerStatus,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::update_status(&self.db, chain_id, contract_address, status)
            .await
            .map_err(map_loco_err)
    }

    pub async fn update_current_block(
        &self,
        chain_id: i64,
        contract_address: &str,
        head: i64,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::update_current_block(&self.db, chain_id, contract_address, head)
            .await
            .map_err(map_loco_err)
    }

    pub async fn advance(
        &self,
        chain_id: i64,
        contract_address: &str,
        to: i64,
        added_transfers: i64,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::advance(&self.db, chain_id, contract_address, to, added_transfers)
            .await
            .map_err(map_loco_err)
    }

    pub async fn reset_state(
        &self,
        chain_id: i64,
        contract_address: &str,
        new_start: i64,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::reset(&self.db, chain_id, contract_address, new_start)
            .await
            .map_err(map_loco_err)
    }

    pub async fn set_catching_up(
        &self,
        chain_id: i64,
        contract_address: &str,
        catching_up: bool,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::set_catching_up(&self.db, chain_id, contract_address, catching_up)
            .await
            .map_err(map_loco_err)
    }

    pub async fn record_error(
        &self,
        chain_id: i64,
        contract_address: &str,
        message: &str,
    ) -> Result<indexer_state::Model, IndexerError> {
        IndexerStateModel::record_error(&self.db, chain_id, contract_address, message)
            .await
            .map_err(map_loco_err)
    }

    pub async fn create_reorg(&self, reorg: NewReorg) -> Result<reorgs::Model, IndexerError> {
        Reorg::create(&self.db, reorg).await.map_err(map_loco_err)
    }

    pub async fn mark_reorg_resolved(&self, id: Uuid, affected: i64) -> Result<reorgs::Model, IndexerError> {
        Reorg::mark_resolved(&self.db, id, affected).await.map_err(map_loco_err)
    }

    pub async fn get_reorg_at_block(&self, chain_id: i64, block: i64) -> Result<Option<reorgs::Model>, IndexerError> {
        Reorg::find_recent_at_block(&self.db, chain_id, block).await.map_err(map_loco_err)
    }

    pub async fn list_reorgs(&self, chain_id: Option<i64>, limit: u64) -> Result<Vec<reorgs::Model>, IndexerError> {
        Reorg::list_recent(&self.db, chain_id, limit).await.map_err(map_loco_err)
    }

    pub async fn get_all_active_contracts(&self) -> Result<Vec<Contract>, IndexerError> {
        Contract::find_all_active(&self.db).await.map_err(map_loco_err)
    }

    pub async fn get_contract_by_address_and_chain(
        &self,
        address: &str,
        chain_id: i64,
    ) -> Result<Option<Contract>, IndexerError> {
        Contract::find_by_address_and_chain(&self.db, address, chain_id)
            .await
            .map_err(map_loco_err)
    }
}

fn map_loco_err(err: loco_rs::Error) -> IndexerError {
    IndexerError::Permanent(err.to_string())
}
