use crate::error::{Error, Result};
use crate::tables::BlockRegistry;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Namespaced resource identifier such as `minecraft:chest`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub namespace: String,
    pub path: String,
}

impl Identifier {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (namespace, path) = match value.split_once(':') {
            Some((namespace, path)) => (namespace, path),
            None => (DEFAULT_NAMESPACE, value),
        };
        let valid = |s: &str| {
            !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_-./".contains(c))
        };
        if !valid(namespace) || !valid(path) {
            return Err(Error::InvalidArgument(format!("invalid identifier '{}'", value)));
        }
        Ok(Self::new(namespace, path))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// A block type with a (possibly empty) subset of its properties pinned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState {
    pub id: Identifier,
    pub properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.properties.insert(name.to_string(), value.to_string());
        self
    }

    /// Parses `ns:id[prop=value,...]`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (id, props) = match value.find('[') {
            Some(open) => {
                if !value.ends_with(']') {
                    return Err(Error::InvalidArgument(format!(
                        "unterminated property list in '{}'",
                        value
                    )));
                }
                (&value[..open], Some(&value[open + 1..value.len() - 1]))
            }
            None => (value, None),
        };

        let mut state = BlockState::new(Identifier::parse(id)?);
        for pair in props.into_iter().flat_map(|p| p.split(',')) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (name, val) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidArgument(format!("expected property=value, got '{}'", pair))
            })?;
            let (name, val) = (name.trim(), val.trim());
            if name.is_empty() || val.is_empty() {
                return Err(Error::InvalidArgument(format!("empty property in '{}'", value)));
            }
            state.properties.insert(name.to_string(), val.to_string());
        }
        Ok(state)
    }

    /// True when every pinned property of `self` has the same value in `other`.
    pub fn matches(&self, other: &BlockState) -> bool {
        self.id == other.id
            && self
                .properties
                .iter()
                .all(|(k, v)| other.properties.get(k) == Some(v))
    }

    /// Every concrete state this pattern stands for: the cross product of the
    /// legal values of each property left unpinned. Empty when the registry
    /// does not know the block, or when a pinned property is not one the
    /// block has.
    pub fn unflatten(&self, registry: &BlockRegistry) -> Vec<BlockState> {
        let Some(domains) = registry.properties(&self.id) else {
            return Vec::new();
        };
        if self.properties.keys().any(|name| !domains.contains_key(name)) {
            return Vec::new();
        }

        let mut states = vec![self.clone()];
        for (name, values) in domains {
            if self.properties.contains_key(name) {
                continue;
            }
            states = states
                .into_iter()
                .flat_map(|state| {
                    values
                        .iter()
                        .map(move |value| state.clone().with(name, value))
                })
                .collect();
        }
        states
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if !self.properties.is_empty() {
            let props: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "[{}]", props.join(","))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemType {
    pub id: Identifier,
}

impl ItemType {
    pub fn new(id: Identifier) -> Self {
        Self { id }
    }

    pub fn parse(value: &str) -> Result<Self> {
        Ok(Self::new(Identifier::parse(value)?))
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Synthetic needle produced by the stats classification of one location.
#[derive(Debug, Clone)]
pub struct StatsResults {
    pub types: Vec<ItemType>,
    pub matrix: Vec<f64>,
}

impl PartialEq for StatsResults {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
            && self.matrix.len() == other.matrix.len()
            && self
                .matrix
                .iter()
                .zip(&other.matrix)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for StatsResults {}

impl Hash for StatsResults {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.types.hash(state);
        for weight in &self.matrix {
            weight.to_bits().hash(state);
        }
    }
}

impl fmt::Display for StatsResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self
            .types
            .iter()
            .zip(&self.matrix)
            .map(|(t, w)| format!("{}={:.2}", t, w))
            .collect();
        write!(f, "Stats[{}]", cells.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Needle {
    BlockState(BlockState),
    ItemType(ItemType),
    StatsResults(StatsResults),
}

impl Needle {
    pub fn tag(&self) -> &'static str {
        match self {
            Needle::BlockState(_) => "BlockState",
            Needle::ItemType(_) => "ItemType",
            Needle::StatsResults(_) => "StatsResults",
        }
    }

    pub fn unflatten(&self, registry: &BlockRegistry) -> Vec<Needle> {
        match self {
            Needle::BlockState(state) => state
                .unflatten(registry)
                .into_iter()
                .map(Needle::BlockState)
                .collect(),
            Needle::ItemType(_) | Needle::StatsResults(_) => Vec::new(),
        }
    }

    /// Ordering used by the text report: blocks, then items, then stats.
    pub fn report_key(&self) -> (u8, String) {
        match self {
            Needle::BlockState(state) => (0, state.to_string()),
            Needle::ItemType(item) => (1, item.to_string()),
            Needle::StatsResults(stats) => (2, stats.to_string()),
        }
    }
}

impl fmt::Display for Needle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Needle::BlockState(state) => state.fmt(f),
            Needle::ItemType(item) => item.fmt(f),
            Needle::StatsResults(stats) => stats.fmt(f),
        }
    }
}

impl From<BlockState> for Needle {
    fn from(state: BlockState) -> Self {
        Needle::BlockState(state)
    }
}

impl From<ItemType> for Needle {
    fn from(item: ItemType) -> Self {
        Needle::ItemType(item)
    }
}
