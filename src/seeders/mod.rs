use loco_rs::prelude::*;
use sea_orm::*;

use crate::models::_entities::contracts;
use crate::models::contract::RegisterContractRequest;
use crate::models::indexer_state::IndexerStateModel;

pub struct DatabaseSeeder;

impl DatabaseSeeder {
    /// Seed the database with a couple of well-known ERC-20 contracts, each
    /// with a fresh `IndexerState` row, so a development environment has
    /// something to index immediately.
    pub async fn seed_development(db: &DatabaseConnection) -> Result<()> {
        tracing::info!("Starting development database seeding...");

        let seed_contracts = vec![
            (
                RegisterContractRequest {
                    address: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
                    chain_id: 1,
                    name: Some("Tether USD".to_string()),
                    symbol: Some("USDT".to_string()),
                    decimals: Some(6),
                },
                4_634_748_i64,
            ),
            (
                RegisterContractRequest {
                    address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
                    chain_id: 1,
                    name: Some("USD Coin".to_string()),
                    symbol: Some("USDC".to_string()),
                    decimals: Some(6),
                },
                6_082_465_i64,
            ),
        ];

        for (req, start_block) in seed_contracts {
            let address = req.address.clone();
            let chain_id = req.chain_id;
            crate::models::contract::Contract::register(db, req)
                .await
                .map_err(|e| Error::string(&format!("failed to seed contract {}: {}", address, e)))?;
            IndexerStateModel::get_or_create(db, chain_id, &address, start_block).await?;
        }

        tracing::info!("Development database seeding completed successfully");
        Ok(())
    }

    /// Check if the database has been seeded.
    pub async fn is_seeded(db: &DatabaseConnection) -> Result<bool> {
        let count = contracts::Entity::find().count(db).await?;
        Ok(count > 0)
    }

    /// Clear all seeded data (for testing).
    pub async fn clear_all(db: &DatabaseConnection) -> Result<()> {
        tracing::warn!("Clearing all database data...");

        crate::models::_entities::transfers::Entity::delete_many().exec(db).await?;
        crate::models::_entities::indexer_state::Entity::delete_many().exec(db).await?;
        crate::models::_entities::reorgs::Entity::delete_many().exec(db).await?;
        contracts::Entity::delete_many().exec(db).await?;

        tracing::info!("All database data cleared");
        Ok(())
    }
}
