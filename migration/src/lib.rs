pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_contracts;
mod m20240101_000002_create_indexer_state;
mod m20240101_000003_create_transfers;
mod m20240101_000004_create_reorgs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_contracts::Migration),
            Box::new(m20240101_000002_create_indexer_state::Migration),
            Box::new(m20240101_000003_create_transfers::Migration),
            Box::new(m20240101_000004_create_reorgs::Migration),
        ]
    }
}
