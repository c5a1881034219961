use super::items::Contents;
use super::ScanContext;
use crate::error::{Error, Result};
use crate::model::{Location, SearchResult};
use crate::nbt::{self, PlayerData};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// A gzip-compressed player data file named `<uuid>.dat`.
#[derive(Debug, Clone)]
pub struct PlayerFile {
    path: PathBuf,
    player: Uuid,
    size: u64,
}

impl PlayerFile {
    /// True for `*.dat` files whose stem is a dashed five-group UUID.
    pub fn is_player_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "dat")
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem.split('-').count() == 5)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !Self::is_player_file(path) {
            return Err(Error::InvalidArgument(format!(
                "{} is not named like a player file",
                path.display()
            )));
        }
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let player = Uuid::parse_str(stem).map_err(|err| {
            Error::corrupt(path.display().to_string(), format!("bad player id: {}", err))
        })?;
        let metadata = fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            player,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn player(&self) -> Uuid {
        self.player
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn scan(&self, ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        let compressed = fs::read(&self.path)?;
        self.scan_bytes(&compressed, ctx)
    }

    pub fn scan_bytes(&self, compressed: &[u8], ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        let data: PlayerData = nbt::from_bytes(
            &ctx.decompressor.gunzip(compressed)?,
            self.path.display().to_string(),
        )?;
        let mut results = Vec::new();
        for (items, ender_chest) in [(&data.inventory, false), (&data.ender_items, true)] {
            let location = Location::PlayerInventory {
                player: self.player,
                ender_chest,
            };
            Contents::from_items(items, ctx).emit(Arc::new(location), ctx, &mut results);
        }
        Ok(results)
    }
}
