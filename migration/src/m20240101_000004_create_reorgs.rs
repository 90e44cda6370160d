use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reorgs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reorgs::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()".to_string()),
                    )
                    .col(ColumnDef::new(Reorgs::ChainId).big_integer().not_null())
                    .col(ColumnDef::new(Reorgs::DetectedAtBlock).big_integer().not_null())
                    .col(ColumnDef::new(Reorgs::ReorgDepth).big_integer().not_null())
                    .col(ColumnDef::new(Reorgs::OldBlockHash).string().not_null())
                    .col(ColumnDef::new(Reorgs::NewBlockHash).string().not_null())
                    .col(ColumnDef::new(Reorgs::Status).string().not_null().default("detected"))
                    .col(ColumnDef::new(Reorgs::TransfersAffected).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Reorgs::DetectedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .col(ColumnDef::new(Reorgs::ResolvedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reorgs_chain_block")
                    .table(Reorgs::Table)
                    .col(Reorgs::ChainId)
                    .col(Reorgs::DetectedAtBlock)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reorgs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Reorgs {
    Table,
    Id,
    ChainId,
    DetectedAtBlock,
    ReorgDepth,
    OldBlockHash,
    NewBlockHash,
    Status,
    TransfersAffected,
    DetectedAt,
    ResolvedAt,
}
