use chrono::Utc;
use loco_rs::prelude::*;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::_entities::{prelude::*, reorgs};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReorgStatus {
    Detected,
    Processing,
    Resolved,
}

impl ReorgStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorgStatus::Detected => "detected",
            ReorgStatus::Processing => "processing",
            ReorgStatus::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReorg {
    pub chain_id: i64,
    pub detected_at_block: i64,
    pub reorg_depth: i64,
    pub old_block_hash: String,
    pub new_block_hash: String,
}

/// View of `Reorg` as returned across the control plane, mirroring
/// `IndexerStateView`'s bigint-as-string convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorgView {
    pub id: Uuid,
    pub chain_id: String,
    pub detected_at_block: String,
    pub reorg_depth: String,
    pub old_block_hash: String,
    pub new_block_hash: String,
    pub status: String,
    pub transfers_affected: String,
    pub detected_at: chrono::NaiveDateTime,
    pub resolved_at: Option<chrono::NaiveDateTime>,
}

impl From<reorgs::Model> for ReorgView {
    fn from(m: reorgs::Model) -> Self {
        Self {
            id: m.id,
            chain_id: m.chain_id.to_string(),
            detected_at_block: m.detected_at_block.to_string(),
            reorg_depth: m.reorg_depth.to_string(),
            old_block_hash: m.old_block_hash,
            new_block_hash: m.new_block_hash,
            status: m.status,
            transfers_affected: m.transfers_affected.to_string(),
            detected_at: m.detected_at,
            resolved_at: m.resolved_at,
        }
    }
}

pub struct Reorg;

impl Reorg {
    /// `createReorg` (§4.5).
    pub async fn create(db: &DatabaseConnection, reorg: NewReorg) -> Result<reorgs::Model> {
        let model = reorgs::ActiveModel {
            id: Set(Uuid::new_v4()),
            chain_id: Set(reorg.chain_id),
            detected_at_block: Set(reorg.detected_at_block),
            reorg_depth: Set(reorg.reorg_depth),
            old_block_hash: Set(reorg.old_block_hash.to_lowercase()),
            new_block_hash: Set(reorg.new_block_hash.to_lowercase()),
            status: Set(ReorgStatus::Detected.as_str().to_string()),
            transfers_affected: Set(0),
            detected_at: Set(Utc::now().naive_utc()),
            resolved_at: Set(None),
        };

        Ok(model.insert(db).await?)
    }

    /// `markReorgResolved` (§4.5).
    pub async fn mark_resolved(db: &DatabaseConnection, id: Uuid, affected: i64) -> Result<reorgs::Model> {
        let existing = Reorgs::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| Error::string("reorg not found"))?;

        let mut active: reorgs::ActiveModel = existing.into();
        active.status = Set(ReorgStatus::Resolved.as_str().to_string());
        active.transfers_affected = Set(affected);
        active.resolved_at = Set(Some(Utc::now().naive_utc()));

        Ok(active.update(db).await?)
    }

    /// `getReorgAtBlock` (§4.5). Dedup window: 24h.
    pub async fn find_recent_at_block(
        db: &DatabaseConnection,
        chain_id: i64,
        block: i64,
    ) -> Result<Option<reorgs::Model>> {
        let window_start = Utc::now().naive_utc() - chrono::Duration::hours(24);

        let row = Reorgs::find()
            .filter(reorgs::Column::ChainId.eq(chain_id))
            .filter(reorgs::Column::DetectedAtBlock.eq(block))
            .filter(reorgs::Column::DetectedAt.gte(window_start))
            .order_by_desc(reorgs::Column::DetectedAt)
            .one(db)
            .await?;

        Ok(row)
    }

    pub async fn list_recent(
        db: &DatabaseConnection,
        chain_id: Option<i64>,
        limit: u64,
    ) -> Result<Vec<reorgs::Model>> {
        let mut query = Reorgs::find().order_by_desc(reorgs::Column::DetectedAt);

        if let Some(chain_id) = chain_id {
            query = query.filter(reorgs::Column::ChainId.eq(chain_id));
        }

        Ok(query.limit(limit).all(db).await?)
    }
}
