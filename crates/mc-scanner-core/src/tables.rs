//! Injected lookup tables: block property domains (for needle expansion)
//! and the stats weighting table.

use crate::error::{Error, Result};
use crate::model::{Identifier, ItemType, StatsResults};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

const BUILTIN_BLOCK_PROPERTIES: &str = include_str!("../resources/block_properties.json");

pub type PropertyDomains = BTreeMap<String, Vec<String>>;

/// Legal property values per block type.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    blocks: HashMap<Identifier, PropertyDomains>,
}

impl BlockRegistry {
    pub fn builtin() -> Self {
        // the embedded table is part of the build, a parse failure is a packaging bug
        Self::from_json(BUILTIN_BLOCK_PROPERTIES).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, PropertyDomains> = serde_json::from_str(json)?;
        let mut blocks = HashMap::with_capacity(raw.len());
        for (id, domains) in raw {
            blocks.insert(Identifier::parse(&id)?, domains);
        }
        Ok(Self { blocks })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn properties(&self, id: &Identifier) -> Option<&PropertyDomains> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct StatsTableFile {
    #[serde(default = "default_weight")]
    default_weight: f64,
    #[serde(default)]
    weights: HashMap<String, f64>,
}

fn default_weight() -> f64 {
    1.0
}

/// Weighting applied to raw item tallies in stats mode.
#[derive(Debug, Clone)]
pub struct StatsTable {
    default_weight: f64,
    weights: HashMap<ItemType, f64>,
}

impl Default for StatsTable {
    fn default() -> Self {
        Self {
            default_weight: default_weight(),
            weights: HashMap::new(),
        }
    }
}

impl StatsTable {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: StatsTableFile = serde_json::from_str(json)?;
        if !file.default_weight.is_finite() {
            return Err(Error::InvalidArgument("stats default_weight must be finite".into()));
        }
        let mut weights = HashMap::with_capacity(file.weights.len());
        for (id, weight) in file.weights {
            weights.insert(ItemType::parse(&id)?, weight);
        }
        Ok(Self {
            default_weight: file.default_weight,
            weights,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn weight(&self, item: &ItemType) -> f64 {
        self.weights.get(item).copied().unwrap_or(self.default_weight)
    }

    /// Reduces one location's tallies to a `StatsResults` needle.
    pub fn tally_stats(&self, tally: &HashMap<ItemType, u64>) -> StatsResults {
        let mut types: Vec<ItemType> = tally.keys().cloned().collect();
        types.sort();
        let matrix = types
            .iter()
            .map(|item| tally[item] as f64 * self.weight(item))
            .collect();
        StatsResults { types, matrix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_chests() {
        let registry = BlockRegistry::builtin();
        assert!(!registry.is_empty());
        let chest = registry
            .properties(&Identifier::new("minecraft", "chest"))
            .unwrap();
        assert_eq!(chest["facing"].len(), 4);
    }

    #[test]
    fn invalid_registry_json_is_an_error() {
        assert!(BlockRegistry::from_json("{\"Bad Id\": {}}").is_err());
        assert!(BlockRegistry::from_json("[").is_err());
    }

    #[test]
    fn stats_tally_is_sorted_and_weighted() {
        let table = StatsTable::from_json(
            r#"{ "default_weight": 1.0, "weights": { "minecraft:diamond": 64.0 } }"#,
        )
        .unwrap();
        let mut tally = HashMap::new();
        tally.insert(ItemType::parse("stone").unwrap(), 10);
        tally.insert(ItemType::parse("diamond").unwrap(), 2);
        let stats = table.tally_stats(&tally);
        assert_eq!(
            stats.types,
            vec![ItemType::parse("diamond").unwrap(), ItemType::parse("stone").unwrap()]
        );
        assert_eq!(stats.matrix, vec![128.0, 10.0]);
    }
}
