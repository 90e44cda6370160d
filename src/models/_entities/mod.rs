pub mod prelude;

pub mod contracts;
pub mod indexer_state;
pub mod reorgs;
pub mod transfers;
