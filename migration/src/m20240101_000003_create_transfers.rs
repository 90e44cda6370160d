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
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transfers::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()".to_string()),
                    )
                    .col(ColumnDef::new(Transfers::ChainId).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::TxHash).string().not_null())
                    .col(ColumnDef::new(Transfers::LogIndex).integer().not_null())
                    .col(ColumnDef::new(Transfers::BlockNumber).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::BlockHash).string().not_null())
                    .col(ColumnDef::new(Transfers::Timestamp).timestamp().not_null())
                    .col(ColumnDef::new(Transfers::FromAddress).string().not_null())
                    .col(ColumnDef::new(Transfers::ToAddress).string().not_null())
                    .col(ColumnDef::new(Transfers::Amount).string().not_null())
                    .col(ColumnDef::new(Transfers::ContractId).uuid())
                    .col(ColumnDef::new(Transfers::ContractAddress).string().not_null())
                    .col(ColumnDef::new(Transfers::Confirmations).integer().not_null().default(0))
                    .col(ColumnDef::new(Transfers::IsConfirmed).boolean().not_null().default(false))
                    .col(ColumnDef::new(Transfers::Status).integer().not_null().default(1))
                    .col(ColumnDef::new(Transfers::CreatedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .col(ColumnDef::new(Transfers::UpdatedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transfers_contract_id")
                            .from(Transfers::Table, Transfers::ContractId)
                            .to(Contracts::Table, Contracts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_identity")
                    .table(Transfers::Table)
                    .col(Transfers::TxHash)
                    .col(Transfers::LogIndex)
                    .col(Transfers::ChainId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_chain_block")
                    .table(Transfers::Table)
                    .col(Transfers::ChainId)
                    .col(Transfers::BlockNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_tx_hash")
                    .table(Transfers::Table)
                    .col(Transfers::TxHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_from_address")
                    .table(Transfers::Table)
                    .col(Transfers::FromAddress)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_to_address")
                    .table(Transfers::Table)
                    .col(Transfers::ToAddress)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_timestamp")
                    .table(Transfers::Table)
                    .col(Transfers::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_is_confirmed")
                    .table(Transfers::Table)
                    .col(Transfers::IsConfirmed)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transfers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Transfers {
    Table,
    Id,
    ChainId,
    TxHash,
    LogIndex,
    BlockNumber,
    BlockHash,
    Timestamp,
    FromAddress,
    ToAddress,
    Amount,
    ContractId,
    ContractAddress,
    Confirmations,
    IsConfirmed,
    Status,
    CreatedAt,
    UpdatedAt,
}
