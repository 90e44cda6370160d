use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_contracts::Contracts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IndexerState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IndexerState::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()".to_string()),
                    )
                    .col(ColumnDef::new(IndexerState::ChainId).big_integer().not_null())
                    .col(ColumnDef::new(IndexerState::ContractAddress).string().not_null())
                    .col(ColumnDef::new(IndexerState::ContractId).uuid())
                    .col(ColumnDef::new(IndexerState::StartBlock).big_integer().not_null())
                    .col(ColumnDef::new(IndexerState::LastProcessedBlock).big_integer().not_null())
                    .col(ColumnDef::new(IndexerState::HighestProcessedBlock).big_integer().not_null())
                    .col(ColumnDef::new(IndexerState::CurrentBlock).big_integer().not_null().default(0))
                    .col(ColumnDef::new(IndexerState::Status).string().not_null().default("stopped"))
                    .col(ColumnDef::new(IndexerState::IsCatchingUp).boolean().not_null().default(false))
                    .col(ColumnDef::new(IndexerState::ErrorCount).integer().not_null().default(0))
                    .col(ColumnDef::new(IndexerState::LastError).text())
                    .col(ColumnDef::new(IndexerState::LastErrorAt).timestamp())
                    .col(ColumnDef::new(IndexerState::BlocksPerSecond).double().not_null().default(0.0))
                    .col(ColumnDef::new(IndexerState::TransfersIndexed).big_integer().not_null().default(0))
                    .col(ColumnDef::new(IndexerState::LastIndexedAt).timestamp())
                    .col(ColumnDef::new(IndexerState::CreatedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .col(ColumnDef::new(IndexerState::UpdatedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_indexer_state_contract_id")
                            .from(IndexerState::Table, IndexerState::ContractId)
                            .to(Contracts::Table, Contracts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_indexer_state_chain_contract")
                    .table(IndexerState::Table)
                    .col(IndexerState::ChainId)
                    .col(IndexerState::ContractAddress)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IndexerState::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum IndexerState {
    Table,
    Id,
    ChainId,
    ContractAddress,
    ContractId,
    StartBlock,
    LastProcessedBlock,
    HighestProcessedBlock,
    CurrentBlock,
    Status,
    IsCatchingUp,
    ErrorCount,
    LastError,
    LastErrorAt,
    BlocksPerSecond,
    TransfersIndexed,
    LastIndexedAt,
    CreatedAt,
    UpdatedAt,
}
