pub mod _entities;

pub mod contract;
pub mod indexer_state;
pub mod reorg;
pub mod transfer;
