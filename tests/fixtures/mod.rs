//! Shared test data: sample contracts, RPC payloads, and queue jobs.

use evm_transfer_indexer::services::job_queue::{BlockRangeJob, CatchupJob, ReorgJob};
use uuid::Uuid;

pub const USDT_ADDRESS: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
pub const USDC_ADDRESS: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

pub struct BlockRangeJobFixture;

impl BlockRangeJobFixture {
    pub fn sample() -> BlockRangeJob {
        BlockRangeJob {
            chain_id: 1,
            contract_address: USDT_ADDRESS.to_string(),
            from_block: 18_000_000,
            to_block: 18_000_009,
            priority: 10,
            retry_count: 0,
        }
    }
}

pub struct CatchupJobFixture;

impl CatchupJobFixture {
    pub fn sample() -> CatchupJob {
        CatchupJob {
            chain_id: 1,
            contract_address: USDC_ADDRESS.to_string(),
            from_block: 6_082_465,
            to_block: 6_082_965,
            chunk_size: 50,
        }
    }
}

pub struct ReorgJobFixture;

impl ReorgJobFixture {
    pub fn sample() -> ReorgJob {
        ReorgJob {
            chain_id: 1,
            reorg_id: Uuid::new_v4(),
            affected_from_block: 18_000_000,
            affected_to_block: 18_000_010,
        }
    }
}

/// A minimal `eth_getLogs` JSON-RPC response body for a single Transfer log,
/// shaped the way `rpc_client.rs`'s response parser expects it.
pub const SAMPLE_GET_LOGS_RESPONSE: &str = r#"{
    "jsonrpc": "2.0",
    "id": 1,
    "result": [
        {
            "address": "0xdac17f958d2ee523a2206206994597c13d831ec7",
            "topics": [
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef",
                "0x000000000000000000000000a1b2c3d4e5f60718293a4b5c6d7e8f9001a2b3c",
                "0x000000000000000000000000b1c2d3e4f5a60718293a4b5c6d7e8f9001a2b3c"
            ],
            "data": "0x00000000000000000000000000000000000000000000000000000005f5e100",
            "blockNumber": "0x112a880",
            "blockHash": "0xabc1230000000000000000000000000000000000000000000000000000000",
            "transactionHash": "0xdef4560000000000000000000000000000000000000000000000000000000",
            "transactionIndex": "0x1",
            "logIndex": "0x0",
            "removed": false
        }
    ]
}"#;

/// A minimal `eth_blockNumber` JSON-RPC response.
pub const SAMPLE_BLOCK_NUMBER_RESPONSE: &str = r#"{"jsonrpc":"2.0","id":1,"result":"0x112a880"}"#;
