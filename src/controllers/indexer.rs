//! Control-plane HTTP surface (§6.1): start/stop/reset/catch-up an indexer
//! for a given (chain, contract) pair, and read back status, reorg history
//! and queue health.

use axum::extract::Query;
use loco_rs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::IndexerError;
use crate::middleware::auth::api_key_middleware;
use crate::models::indexer_state::IndexerStateView;
use crate::models::reorg::ReorgView;
use crate::services::job_queue::QueueMetrics;
use crate::services::runtime::IndexerRuntime;

fn runtime() -> Result<std::sync::Arc<IndexerRuntime>> {
    IndexerRuntime::get().ok_or_else(|| Error::string("indexer runtime not initialized"))
}

/// `/start`, `/stop`, `/reset` response envelope (§6.1).
#[derive(Debug, Serialize)]
pub struct StatusEnvelope {
    pub message: String,
    pub status: IndexerStateView,
}

/// `/catch-up` response envelope (§6.1).
#[derive(Debug, Serialize)]
pub struct DetailsEnvelope {
    pub details: String,
    pub status: IndexerStateView,
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("indexer")
        .layer(axum::middleware::from_fn(api_key_middleware))
        .add("/start", post(start))
        .add("/stop", post(stop))
        .add("/reset", post(reset))
        .add("/catch-up", post(catch_up))
        .add("/status", get(status))
        .add("/reorgs", get(reorgs))
        .add("/queue-metrics", get(queue_metrics))
        .add("/reset-error-counters", post(reset_error_counters))
}

#[derive(Debug, Deserialize)]
pub struct StartIndexerPayload {
    pub chain_id: i64,
    pub contract_address: String,
    pub start_block: Option<i64>,
}

async fn start(Json(payload): Json<StartIndexerPayload>) -> Result<Json<StatusEnvelope>> {
    info!(chain_id = payload.chain_id, contract = %payload.contract_address, "starting indexer");
    let rt = runtime()?;
    let state = rt
        .coordinator
        .start_indexer(payload.chain_id, &payload.contract_address, payload.start_block)
        .await
        .map_err(loco_rs::Error::from)?;
    format::json(StatusEnvelope {
        message: "indexer started".to_string(),
        status: state,
    })
}

#[derive(Debug, Deserialize)]
pub struct StopIndexerPayload {
    pub chain_id: i64,
    pub contract_address: String,
}

async fn stop(Json(payload): Json<StopIndexerPayload>) -> Result<Json<StatusEnvelope>> {
    info!(chain_id = payload.chain_id, contract = %payload.contract_address, "stopping indexer");
    let rt = runtime()?;
    let state = rt
        .coordinator
        .stop_indexer(payload.chain_id, &payload.contract_address)
        .await
        .map_err(loco_rs::Error::from)?;
    format::json(StatusEnvelope {
        message: "indexer stopped".to_string(),
        status: state,
    })
}

#[derive(Debug, Deserialize)]
pub struct ResetIndexerPayload {
    pub chain_id: i64,
    pub contract_address: String,
    pub block: i64,
}

async fn reset(Json(payload): Json<ResetIndexerPayload>) -> Result<Json<StatusEnvelope>> {
    info!(
        chain_id = payload.chain_id,
        contract = %payload.contract_address,
        block = payload.block,
        "resetting indexer"
    );
    let rt = runtime()?;
    let state = rt
        .coordinator
        .reset_indexer(payload.chain_id, &payload.contract_address, payload.block)
        .await
        .map_err(loco_rs::Error::from)?;
    format::json(StatusEnvelope {
        message: format!("indexer reset to block {}", payload.block),
        status: state,
    })
}

#[derive(Debug, Deserialize)]
pub struct CatchUpPayload {
    pub chain_id: i64,
    pub contract_address: String,
    pub from_block: i64,
    pub to_block: i64,
}

async fn catch_up(Json(payload): Json<CatchUpPayload>) -> Result<Json<DetailsEnvelope>> {
    info!(
        chain_id = payload.chain_id,
        contract = %payload.contract_address,
        from_block = payload.from_block,
        to_block = payload.to_block,
        "triggering catch-up"
    );
    let rt = runtime()?;
    rt.coordinator
        .trigger_catch_up(
            payload.chain_id,
            &payload.contract_address,
            payload.from_block,
            payload.to_block,
        )
        .await
        .map_err(loco_rs::Error::from)?;

    let state = rt
        .persistence
        .find_state(payload.chain_id, &payload.contract_address)
        .await
        .map_err(loco_rs::Error::from)?
        .ok_or_else(|| IndexerError::NotFound("indexer state not found".to_string()))
        .map_err(loco_rs::Error::from)?;

    format::json(DetailsEnvelope {
        details: format!(
            "catch-up accepted for blocks {}-{}",
            payload.from_block, payload.to_block
        ),
        status: IndexerStateView::from(state),
    })
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub chain_id: i64,
    pub contract_address: String,
}

async fn status(Query(params): Query<StatusQuery>) -> Result<Json<IndexerStateView>> {
    let rt = runtime()?;
    let state = rt
        .persistence
        .find_state(params.chain_id, &params.contract_address)
        .await
        .map_err(loco_rs::Error::from)?
        .ok_or_else(|| IndexerError::NotFound("indexer state not found".to_string()))
        .map_err(loco_rs::Error::from)?;
    format::json(IndexerStateView::from(state))
}

#[derive(Debug, Deserialize)]
pub struct ReorgsQuery {
    pub chain_id: Option<i64>,
    pub limit: Option<u64>,
}

async fn reorgs(Query(params): Query<ReorgsQuery>) -> Result<Json<Vec<ReorgView>>> {
    let rt = runtime()?;
    let limit = params.limit.unwrap_or(50).min(500);
    let list = rt
        .persistence
        .list_reorgs(params.chain_id, limit)
        .await
        .map_err(loco_rs::Error::from)?;
    format::json(list.into_iter().map(ReorgView::from).collect::<Vec<_>>())
}

#[derive(Debug, Serialize)]
pub struct AllQueueMetrics {
    pub block_ranges: QueueMetrics,
    pub catchup: QueueMetrics,
    pub reorg: QueueMetrics,
}

async fn queue_metrics() -> Result<Json<AllQueueMetrics>> {
    let rt = runtime()?;
    let block_ranges = rt
        .queue
        .metrics(crate::services::job_queue::QueueName::BlockRanges)
        .await
        .map_err(loco_rs::Error::from)?;
    let catchup = rt
        .queue
        .metrics(crate::services::job_queue::QueueName::Catchup)
        .await
        .map_err(loco_rs::Error::from)?;
    let reorg = rt
        .queue
        .metrics(crate::services::job_queue::QueueName::Reorg)
        .await
        .map_err(loco_rs::Error::from)?;

    format::json(AllQueueMetrics { block_ranges, catchup, reorg })
}

#[derive(Debug, Serialize)]
pub struct ResetErrorCountersResponse {
    pub reset: bool,
}

async fn reset_error_counters() -> Result<Json<ResetErrorCountersResponse>> {
    let rt = runtime()?;
    rt.error_governor.reset();
    info!("error governor counters reset via control plane");
    format::json(ResetErrorCountersResponse { reset: true })
}
