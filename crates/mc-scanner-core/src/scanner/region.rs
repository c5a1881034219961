//! Region files: a 1024-entry location table followed by independently
//! compressed chunk payloads, each decoded to an NBT chunk tree.

use super::items::Contents;
use super::ScanContext;
use crate::decompress::CompressionScheme;
use crate::error::{Error, Result};
use crate::model::{BlockState, Identifier, Location, Needle, SearchResult};
use crate::nbt::{self, BlockEntity, ChunkData, Entity, PaletteEntry, Section};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

pub const SECTOR_SIZE: usize = 4096;
pub const HEADER_SIZE: usize = SECTOR_SIZE * 2;
pub const ENTRY_COUNT: usize = 1024;
pub const REGION_SIZE: i32 = 32;

const SECTION_VOLUME: usize = 16 * 16 * 16;
/// First data version whose block-state arrays stop packing entries across
/// long boundaries.
const NON_SPANNING_DATA_VERSION: i32 = 2527;

/// Region coordinates, parsed from a file name like `r.0.-1.mca`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// `None` for other names, and for regions whose chunk coordinates would
    /// not fit in an i32.
    pub fn from_filename(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() == 4 && parts[0] == "r" && parts[3] == "mca" {
            let x: i32 = parts[1].parse().ok()?;
            let z: i32 = parts[2].parse().ok()?;
            x.checked_mul(REGION_SIZE)
                .zip(z.checked_mul(REGION_SIZE))
                .map(|_| Self { x, z })
        } else {
            None
        }
    }

    pub fn local_to_world(&self, local_x: i32, local_z: i32) -> (i32, i32) {
        (
            self.x * REGION_SIZE + local_x,
            self.z * REGION_SIZE + local_z,
        )
    }
}

pub fn index_to_local(index: usize) -> (i32, i32) {
    let local_x = (index % REGION_SIZE as usize) as i32;
    let local_z = (index / REGION_SIZE as usize) as i32;
    (local_x, local_z)
}

#[derive(Debug, Clone)]
pub struct RegionFile {
    path: PathBuf,
    dimension: String,
    pos: Option<RegionPos>,
    size: u64,
}

impl RegionFile {
    pub fn new(path: PathBuf, dimension: &str, size: u64) -> Self {
        let pos = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(RegionPos::from_filename);
        Self {
            path,
            dimension: dimension.to_string(),
            pos,
            size,
        }
    }

    pub fn open(path: &Path, dimension: &str) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(path.to_path_buf(), dimension, metadata.len()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    pub fn pos(&self) -> Option<RegionPos> {
        self.pos
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn scan(&self, ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        let data = fs::read(&self.path)?;
        self.scan_bytes(&data, ctx)
    }

    /// Scans every present entry. A corrupt entry is logged and contributes
    /// nothing; the remaining entries are still scanned.
    pub fn scan_bytes(&self, data: &[u8], ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() < HEADER_SIZE {
            return Err(Error::corrupt(
                self.path.display().to_string(),
                format!("{} bytes is too short for a region header", data.len()),
            ));
        }

        let mut results = Vec::new();
        for index in 0..ENTRY_COUNT {
            let entry = &data[index * 4..index * 4 + 4];
            let sector = u32::from_be_bytes([0, entry[0], entry[1], entry[2]]) as usize;
            if sector == 0 {
                continue;
            }
            match self.scan_entry(data, index, sector, ctx) {
                Ok(found) => results.extend(found),
                Err(err) => error!(
                    "Skipping chunk {} of {}: {}",
                    index,
                    self.path.display(),
                    err
                ),
            }
        }
        Ok(results)
    }

    fn scan_entry(
        &self,
        data: &[u8],
        index: usize,
        sector: usize,
        ctx: &ScanContext<'_>,
    ) -> Result<Vec<SearchResult>> {
        let payload = self.read_payload(data, index, sector, ctx)?;
        let chunk: ChunkData = nbt::from_bytes(&payload, self.context(index))?;
        let mut results = Vec::new();
        self.scan_chunk(chunk, index, ctx, &mut results)?;
        Ok(results)
    }

    fn context(&self, index: usize) -> String {
        format!("{} entry {}", self.path.display(), index)
    }

    fn read_payload(
        &self,
        data: &[u8],
        index: usize,
        sector: usize,
        ctx: &ScanContext<'_>,
    ) -> Result<Vec<u8>> {
        let start = sector * SECTOR_SIZE;
        if sector < 2 || start + 5 > data.len() {
            return Err(Error::corrupt(
                self.context(index),
                format!("sector offset {} outside the file", sector),
            ));
        }
        let length = u32::from_be_bytes([
            data[start],
            data[start + 1],
            data[start + 2],
            data[start + 3],
        ]) as usize;
        if length == 0 {
            return Err(Error::corrupt(self.context(index), "zero-length payload"));
        }
        let tag = data[start + 4];
        let scheme = CompressionScheme::from_tag(tag & !CompressionScheme::EXTERNAL_FLAG)
            .ok_or_else(|| {
                Error::corrupt(
                    self.context(index),
                    format!("unknown compression scheme {}", tag),
                )
            })?;

        if tag & CompressionScheme::EXTERNAL_FLAG != 0 {
            let external = self.external_path(index)?;
            debug!("Reading oversized chunk from {}", external.display());
            let bytes = fs::read(&external)?;
            return ctx.decompressor.decode(scheme, &bytes);
        }

        let end = start + 4 + length;
        if end > data.len() {
            return Err(Error::corrupt(
                self.context(index),
                format!("payload of {} bytes runs past the end of the file", length),
            ));
        }
        ctx.decompressor.decode(scheme, &data[start + 5..end])
    }

    fn external_path(&self, index: usize) -> Result<PathBuf> {
        let pos = self.pos.ok_or_else(|| {
            Error::corrupt(
                self.context(index),
                "external chunk in a region file without coordinates in its name",
            )
        })?;
        let (local_x, local_z) = index_to_local(index);
        let (x, z) = pos.local_to_world(local_x, local_z);
        Ok(self.path.with_file_name(format!("c.{}.{}.mcc", x, z)))
    }

    /// The chunk's own coordinates, falling back to its slot in the region.
    fn chunk_pos(&self, chunk: &ChunkData, index: usize) -> Location {
        let (x, z) = chunk.coords().unwrap_or_else(|| {
            let (local_x, local_z) = index_to_local(index);
            match self.pos {
                Some(pos) => pos.local_to_world(local_x, local_z),
                None => (local_x, local_z),
            }
        });
        Location::chunk(&self.dimension, x, z)
    }

    fn scan_chunk(
        &self,
        chunk: ChunkData,
        index: usize,
        ctx: &ScanContext<'_>,
        results: &mut Vec<SearchResult>,
    ) -> Result<()> {
        let chunk_pos = self.chunk_pos(&chunk, index);
        let data_version = chunk.data_version;
        let body = chunk.into_body();

        if ctx.needles.has_blocks() {
            for section in &body.sections {
                self.scan_section(section, data_version, &chunk_pos, index, ctx, results)?;
            }
        }

        if ctx.stats_mode() || ctx.needles.has_items() {
            for block_entity in &body.block_entities {
                self.scan_block_entity(block_entity, ctx, results);
            }
            for entity in &body.entities {
                self.scan_entity(entity, ctx, results);
            }
        }
        Ok(())
    }

    fn scan_section(
        &self,
        section: &Section,
        data_version: i32,
        chunk_pos: &Location,
        index: usize,
        ctx: &ScanContext<'_>,
        results: &mut Vec<SearchResult>,
    ) -> Result<()> {
        let section_y = section.y;
        let (palette, data, legacy) = section.block_data();
        let spanning = legacy && data_version < NON_SPANNING_DATA_VERSION;
        if palette.is_empty() {
            return Ok(());
        }

        let matches: Vec<Option<&Needle>> = palette
            .iter()
            .map(|entry| palette_state(entry).and_then(|state| ctx.needles.match_block(&state)))
            .collect();
        if matches.iter().all(Option::is_none) {
            return Ok(());
        }

        let mut emit = |block: usize, needle: &Needle| -> Result<()> {
            let offset = (
                (block & 15) as i32,
                (block >> 8) as i32,
                ((block >> 4) & 15) as i32,
            );
            let location = Location::from_section(chunk_pos, section_y, offset).ok_or_else(|| {
                Error::corrupt(
                    self.context(index),
                    format!("section {} of {} is outside the world", section_y, chunk_pos),
                )
            })?;
            results.push(SearchResult::new(needle.clone(), Arc::new(location), 1));
            Ok(())
        };

        let data = match data.filter(|d| !d.is_empty()) {
            Some(data) => data,
            None if palette.len() == 1 => {
                if let Some(needle) = matches[0] {
                    for block in 0..SECTION_VOLUME {
                        emit(block, needle)?;
                    }
                }
                return Ok(());
            }
            None => {
                return Err(Error::corrupt(
                    self.context(index),
                    format!(
                        "section {} has {} palette entries but no block data",
                        section_y,
                        palette.len()
                    ),
                ))
            }
        };

        let bits = bits_per_block(palette.len());
        let expected = packed_len(bits, spanning);
        if data.len() < expected {
            return Err(Error::corrupt(
                self.context(index),
                format!(
                    "section {} has {} longs of block data, expected {}",
                    section_y,
                    data.len(),
                    expected
                ),
            ));
        }

        for block in 0..SECTION_VOLUME {
            let palette_index = unpack(data, bits, block, spanning);
            match matches.get(palette_index) {
                Some(Some(needle)) => emit(block, *needle)?,
                Some(None) => {}
                None => {
                    return Err(Error::corrupt(
                        self.context(index),
                        format!(
                            "palette index {} out of range in section {}",
                            palette_index, section_y
                        ),
                    ))
                }
            }
        }
        Ok(())
    }

    fn scan_block_entity(
        &self,
        block_entity: &BlockEntity,
        ctx: &ScanContext<'_>,
        results: &mut Vec<SearchResult>,
    ) {
        let Some(items) = &block_entity.items else {
            return;
        };
        let location = Location::Container {
            kind: kind_or_unknown(&block_entity.id),
            location: Arc::new(Location::block(
                &self.dimension,
                block_entity.x,
                block_entity.y,
                block_entity.z,
            )),
        };
        Contents::from_items(items, ctx).emit(Arc::new(location), ctx, results);
    }

    fn scan_entity(&self, entity: &Entity, ctx: &ScanContext<'_>, results: &mut Vec<SearchResult>) {
        let mut contents = Contents::new();
        for items in entity.inventories() {
            contents.add_items(items, ctx);
        }
        if contents.is_empty() {
            return;
        }

        let (x, y, z) = match entity.pos[..] {
            [x, y, z] => (x, y, z),
            _ => (0.0, 0.0, 0.0),
        };
        let location = Location::Entity {
            kind: kind_or_unknown(&entity.id),
            location: Arc::new(Location::Vec3d {
                dimension: self.dimension.clone(),
                x,
                y,
                z,
            }),
        };
        contents.emit(Arc::new(location), ctx, results);
    }
}

fn kind_or_unknown(id: &str) -> String {
    if id.is_empty() {
        "unknown".to_string()
    } else {
        id.to_string()
    }
}

fn palette_state(entry: &PaletteEntry) -> Option<BlockState> {
    let id = Identifier::parse(&entry.name).ok()?;
    let mut state = BlockState::new(id);
    state.properties.extend(
        entry
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    Some(state)
}

/// Palette index width: `ceil(log2(len))`, never below 4.
pub fn bits_per_block(palette_len: usize) -> usize {
    let needed = if palette_len <= 1 {
        0
    } else {
        (usize::BITS - (palette_len - 1).leading_zeros()) as usize
    };
    needed.max(4)
}

fn packed_len(bits: usize, spanning: bool) -> usize {
    if spanning {
        (SECTION_VOLUME * bits).div_ceil(64)
    } else {
        SECTION_VOLUME.div_ceil(64 / bits)
    }
}

/// Reads the `index`-th `bits`-wide entry out of a packed long array.
pub fn unpack(data: &[i64], bits: usize, index: usize, spanning: bool) -> usize {
    let mask = (1u64 << bits) - 1;
    if spanning {
        let bit = index * bits;
        let (word, offset) = (bit / 64, bit % 64);
        let mut value = data[word] as u64 >> offset;
        if offset + bits > 64 {
            value |= (data[word + 1] as u64) << (64 - offset);
        }
        (value & mask) as usize
    } else {
        let per_long = 64 / bits;
        let (word, offset) = (index / per_long, (index % per_long) * bits);
        ((data[word] as u64 >> offset) & mask) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_names() {
        assert_eq!(RegionPos::from_filename("r.0.-1.mca"), Some(RegionPos::new(0, -1)));
        assert_eq!(RegionPos::from_filename("r.a.1.mca"), None);
        assert_eq!(RegionPos::from_filename("c.1.2.mcc"), None);
        assert_eq!(RegionPos::new(-1, 2).local_to_world(31, 0), (-1, 64));
        assert_eq!(RegionPos::from_filename("r.99999999.0.mca"), None);
    }

    #[test]
    fn palette_width() {
        assert_eq!(bits_per_block(1), 4);
        assert_eq!(bits_per_block(16), 4);
        assert_eq!(bits_per_block(17), 5);
        assert_eq!(bits_per_block(33), 6);
    }

    #[test]
    fn unpacks_padded_longs() {
        // 5 bits: 12 entries per long, the top 4 bits unused
        let mut data = vec![0i64; packed_len(5, false)];
        assert_eq!(data.len(), 342);
        data[1] = 0b10011 << 5;
        assert_eq!(unpack(&data, 5, 13, false), 0b10011);
        assert_eq!(unpack(&data, 5, 12, false), 0);
    }

    #[test]
    fn unpacks_spanning_longs() {
        // 5 bits: entry 12 occupies bits 60..65, straddling the first two longs
        let mut data = vec![0i64; packed_len(5, true)];
        assert_eq!(data.len(), 320);
        let value: u64 = 0b10111;
        data[0] = (value << 60) as i64;
        data[1] = (value >> 4) as i64;
        assert_eq!(unpack(&data, 5, 12, true), 0b10111);
    }

    #[test]
    fn short_header_is_corrupt() {
        use crate::decompress::Decompressor;
        use crate::model::NeedleSet;
        let needles = NeedleSet::default();
        let ctx = ScanContext::new(Decompressor::Internal, &needles, None);
        let region = RegionFile::new(PathBuf::from("r.0.0.mca"), "overworld", 10);
        assert!(region.scan_bytes(&[0u8; 10], &ctx).is_err());
        assert!(region.scan_bytes(&[], &ctx).unwrap().is_empty());
    }
}
