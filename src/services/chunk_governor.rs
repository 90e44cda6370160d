//! Per-chain adaptive block-range chunk size (§4.2).

use std::collections::HashMap;
use std::sync::RwLock;

pub struct ChunkGovernor {
    floor: u64,
    ceiling: u64,
    max_per_chain: RwLock<HashMap<i64, u64>>,
}

impl ChunkGovernor {
    pub fn new(floor: u64, ceiling: u64) -> Self {
        Self {
            floor,
            ceiling,
            max_per_chain: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_per_chain(&self, chain_id: i64) -> u64 {
        self.max_per_chain
            .read()
            .expect("chunk governor lock poisoned")
            .get(&chain_id)
            .copied()
            .unwrap_or(self.ceiling)
    }

    /// `reduce(chainId)`: halve, floored.
    pub fn reduce(&self, chain_id: i64) -> u64 {
        let mut map = self.max_per_chain.write().expect("chunk governor lock poisoned");
        let current = *map.get(&chain_id).unwrap_or(&self.ceiling);
        let reduced = self.floor.max(current / 2);
        map.insert(chain_id, reduced);
        reduced
    }

    /// `increase(chainId)`: grow by max(current/4, 10), capped at ceiling.
    pub fn increase(&self, chain_id: i64) -> u64 {
        let mut map = self.max_per_chain.write().expect("chunk governor lock poisoned");
        let current = *map.get(&chain_id).unwrap_or(&self.ceiling);
        let increased = self.ceiling.min(current + (current / 4).max(10));
        map.insert(chain_id, increased);
        increased
    }

    /// `reset(chainId)`: drop the dynamic override.
    pub fn reset(&self, chain_id: i64) {
        self.max_per_chain
            .write()
            .expect("chunk governor lock poisoned")
            .remove(&chain_id);
    }

    /// `optimal(lag, chainId)`: tiered heuristic, clamped to `[1, maxPerChain]`.
    pub fn optimal(&self, lag: i64, chain_id: i64) -> u64 {
        let tier = if lag <= 1 {
            1
        } else if lag <= 5 {
            2
        } else if lag <= 20 {
            5
        } else if lag <= 100 {
            10
        } else if lag <= 500 {
            20
        } else {
            self.max_per_chain(chain_id)
        };

        tier.clamp(1, self.max_per_chain(chain_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_is_bounded_by_max_per_chain() {
        let gov = ChunkGovernor::new(10, 50);
        for lag in [0, 1, 5, 20, 100, 500, 10_000] {
            let value = gov.optimal(lag, 1);
            assert!(value >= 1 && value <= gov.max_per_chain(1));
        }
    }

    #[test]
    fn reduce_floors_and_increase_ceils() {
        let gov = ChunkGovernor::new(10, 50);
        for _ in 0..10 {
            gov.reduce(1);
        }
        assert_eq!(gov.max_per_chain(1), 10);

        for _ in 0..20 {
            gov.increase(1);
        }
        assert_eq!(gov.max_per_chain(1), 50);
    }

    #[test]
    fn reset_drops_override() {
        let gov = ChunkGovernor::new(10, 50);
        gov.reduce(1);
        assert_eq!(gov.max_per_chain(1), 25);
        gov.reset(1);
        assert_eq!(gov.max_per_chain(1), 50);
    }
}
