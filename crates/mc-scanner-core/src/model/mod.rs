mod location;
mod needle;

pub use location::Location;
pub use needle::{BlockState, Identifier, ItemType, Needle, StatsResults, DEFAULT_NAMESPACE};

use crate::tables::BlockRegistry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// `count` occurrences of `needle` at `location`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub needle: Needle,
    pub location: Arc<Location>,
    pub count: u64,
}

impl SearchResult {
    pub fn new(needle: Needle, location: Arc<Location>, count: u64) -> Self {
        Self {
            needle,
            location,
            count,
        }
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} x {}", self.location, self.needle, self.count)
    }
}

/// The active needle set of a run.
///
/// Holds every user-specified needle plus its concrete expansions, each mapped
/// back to the needle the user asked for. Matches are reported under that
/// original identity.
#[derive(Debug, Clone, Default)]
pub struct NeedleSet {
    originals: Vec<Needle>,
    concrete: HashMap<Needle, usize>,
    // block patterns the registry could not expand, matched by property subset
    patterns: HashMap<Identifier, Vec<usize>>,
}

impl NeedleSet {
    pub fn new(needles: impl IntoIterator<Item = Needle>, registry: &BlockRegistry) -> Self {
        let mut set = NeedleSet::default();
        let mut seen = HashSet::new();
        for needle in needles {
            if !seen.insert(needle.clone()) {
                continue;
            }
            let index = set.originals.len();
            let expansions = needle.unflatten(registry);
            if let Needle::BlockState(state) = &needle {
                match registry.properties(&state.id) {
                    None => set.patterns.entry(state.id.clone()).or_default().push(index),
                    Some(_) if expansions.is_empty() => {
                        warn!("{} pins a property {} does not have; it matches nothing", state, state.id)
                    }
                    Some(_) => {}
                }
            }
            set.concrete.entry(needle.clone()).or_insert(index);
            for expanded in expansions {
                set.concrete.entry(expanded).or_insert(index);
            }
            set.originals.push(needle);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn originals(&self) -> &[Needle] {
        &self.originals
    }

    /// Number of concrete needles scanned for.
    pub fn expanded_len(&self) -> usize {
        self.concrete.len()
    }

    pub fn has_blocks(&self) -> bool {
        self.originals
            .iter()
            .any(|n| matches!(n, Needle::BlockState(_)))
    }

    pub fn has_items(&self) -> bool {
        self.originals.iter().any(|n| matches!(n, Needle::ItemType(_)))
    }

    /// The user-facing needle a palette entry rolls up under, if any.
    pub fn match_block(&self, state: &BlockState) -> Option<&Needle> {
        let needle = Needle::BlockState(state.clone());
        if let Some(index) = self.concrete.get(&needle) {
            return Some(&self.originals[*index]);
        }
        let candidates = self.patterns.get(&state.id)?;
        candidates.iter().map(|i| &self.originals[*i]).find(|n| match n {
            Needle::BlockState(pattern) => pattern.matches(state),
            _ => false,
        })
    }

    pub fn match_item(&self, item: &ItemType) -> Option<&Needle> {
        self.concrete
            .get(&Needle::ItemType(item.clone()))
            .map(|index| &self.originals[*index])
    }
}
