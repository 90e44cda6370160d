use loco_rs::prelude::*;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::_entities::{contracts, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub address: String,
    pub chain_id: i64,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<i32>,
    pub active: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterContractRequest {
    pub address: String,
    pub chain_id: i64,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<i32>,
}

impl From<contracts::Model> for Contract {
    fn from(model: contracts::Model) -> Self {
        Self {
            id: model.id,
            address: model.address,
            chain_id: model.chain_id,
            name: model.name,
            symbol: model.symbol,
            decimals: model.decimals,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl Contract {
    /// Register a new contract under management, or reactivate an existing one.
    pub async fn register(db: &DatabaseConnection, req: RegisterContractRequest) -> Result<Contract> {
        let address = req.address.to_lowercase();

        if let Some(existing) = Self::find_by_address_and_chain(db, &address, req.chain_id).await? {
            return Ok(existing);
        }

        let model = contracts::ActiveModel {
            id: Set(Uuid::new_v4()),
            address: Set(address),
            chain_id: Set(req.chain_id),
            name: Set(req.name),
            symbol: Set(req.symbol),
            decimals: Set(req.decimals),
            active: Set(true),
            created_at: Set(chrono::Utc::now().naive_utc()),
            updated_at: Set(chrono::Utc::now().naive_utc()),
        };

        let created = model.insert(db).await?;
        Ok(Contract::from(created))
    }

    /// `getContractByAddressAndChain` (§4.5).
    pub async fn find_by_address_and_chain(
        db: &DatabaseConnection,
        address: &str,
        chain_id: i64,
    ) -> Result<Option<Contract>> {
        let address = address.to_lowercase();
        let contract = Contracts::find()
            .filter(contracts::Column::Address.eq(address))
            .filter(contracts::Column::ChainId.eq(chain_id))
            .one(db)
            .await?;

        Ok(contract.map(Contract::from))
    }

    /// `getAllActiveContracts` (§4.5).
    pub async fn find_all_active(db: &DatabaseConnection) -> Result<Vec<Contract>> {
        let contracts = Contracts::find()
            .filter(contracts::Column::Active.eq(true))
            .order_by_asc(contracts::Column::ChainId)
            .all(db)
            .await?;

        Ok(contracts.into_iter().map(Contract::from).collect())
    }

    pub async fn deactivate(db: &DatabaseConnection, address: &str, chain_id: i64) -> Result<()> {
        let address = address.to_lowercase();
        let contract = Contracts::find()
            .filter(contracts::Column::Address.eq(address))
            .filter(contracts::Column::ChainId.eq(chain_id))
            .one(db)
            .await?
            .ok_or_else(|| Error::string("contract not found"))?;

        let mut contract: contracts::ActiveModel = contract.into();
        contract.active = Set(false);
        contract.updated_at = Set(chrono::Utc::now().naive_utc());
        contract.update(db).await?;

        Ok(())
    }
}
