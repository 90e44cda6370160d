use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "indexer_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub chain_id: i64,
    pub contract_address: String,
    pub contract_id: Option<Uuid>,
    pub start_block: i64,
    pub last_processed_block: i64,
    pub highest_processed_block: i64,
    pub current_block: i64,
    pub status: String,
    pub is_catching_up: bool,
    pub error_count: i32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime>,
    pub blocks_per_second: f64,
    pub transfers_indexed: i64,
    pub last_indexed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contracts::Entity",
        from = "Column::ContractId",
        to = "super::contracts::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Contracts,
}

impl Related<super::contracts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contracts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
