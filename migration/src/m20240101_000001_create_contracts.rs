use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contracts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contracts::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()".to_string()),
                    )
                    .col(ColumnDef::new(Contracts::Address).string().not_null())
                    .col(ColumnDef::new(Contracts::ChainId).big_integer().not_null())
                    .col(ColumnDef::new(Contracts::Name).string())
                    .col(ColumnDef::new(Contracts::Symbol).string())
                    .col(ColumnDef::new(Contracts::Decimals).integer())
                    .col(ColumnDef::new(Contracts::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(Contracts::CreatedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .col(ColumnDef::new(Contracts::UpdatedAt).timestamp().not_null().extra("DEFAULT CURRENT_TIMESTAMP".to_string()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contracts_address_chain")
                    .table(Contracts::Table)
                    .col(Contracts::Address)
                    .col(Contracts::ChainId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Contracts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Contracts {
    Table,
    Id,
    Address,
    ChainId,
    Name,
    Symbol,
    Decimals,
    Active,
    CreatedAt,
    UpdatedAt,
}
