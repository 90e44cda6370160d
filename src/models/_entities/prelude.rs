pub use super::contracts::Entity as Contracts;
pub use super::indexer_state::Entity as IndexerState;
pub use super::reorgs::Entity as Reorgs;
pub use super::transfers::Entity as Transfers;
