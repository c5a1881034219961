mod items;
pub mod player;
pub mod region;
mod walk;

pub use items::{Contents, Tally};
pub use player::PlayerFile;
pub use region::{RegionFile, RegionPos};
pub use walk::{collect_haystack, dimension_for_path, DIMENSIONS};

use crate::decompress::Decompressor;
use crate::error::Result;
use crate::model::{NeedleSet, SearchResult};
use crate::tables::StatsTable;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Read-only state shared by every scan task of a run.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    pub decompressor: Decompressor,
    pub needles: &'a NeedleSet,
    pub stats: Option<&'a StatsTable>,
}

impl<'a> ScanContext<'a> {
    pub fn new(
        decompressor: Decompressor,
        needles: &'a NeedleSet,
        stats: Option<&'a StatsTable>,
    ) -> Self {
        Self {
            decompressor,
            needles,
            stats,
        }
    }

    pub fn stats_mode(&self) -> bool {
        self.stats.is_some()
    }
}

/// A file that can be searched. Two scannables are the same haystack entry
/// when they point at the same canonical path.
#[derive(Debug, Clone)]
pub enum Scannable {
    Region(RegionFile),
    Player(PlayerFile),
}

impl Scannable {
    pub fn path(&self) -> &Path {
        match self {
            Scannable::Region(region) => region.path(),
            Scannable::Player(player) => player.path(),
        }
    }

    /// Size on disk, used for throughput reporting.
    pub fn size(&self) -> u64 {
        match self {
            Scannable::Region(region) => region.size(),
            Scannable::Player(player) => player.size(),
        }
    }

    pub fn scan(&self, ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        match self {
            Scannable::Region(region) => region.scan(ctx),
            Scannable::Player(player) => player.scan(ctx),
        }
    }
}

impl PartialEq for Scannable {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for Scannable {}

impl Hash for Scannable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl fmt::Display for Scannable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
