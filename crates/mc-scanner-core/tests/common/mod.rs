#![allow(dead_code)]

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use fastnbt::LongArray;
use mc_scanner_core::scanner::region::{HEADER_SIZE, SECTOR_SIZE};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const PLAYER: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

// --- NBT documents, only the fields the scanner reads ---

#[derive(Debug, Clone, Serialize)]
pub struct PaletteBlock {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Properties", skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stack {
    id: String,
    #[serde(rename = "Count")]
    count: i8,
}

#[derive(Debug, Serialize)]
pub struct Chest {
    id: String,
    x: i32,
    y: i32,
    z: i32,
    #[serde(rename = "Items")]
    items: Vec<Stack>,
}

#[derive(Debug, Serialize)]
pub struct Entity {
    id: String,
    #[serde(rename = "Pos")]
    pos: Vec<f64>,
    #[serde(rename = "Items", skip_serializing_if = "Vec::is_empty")]
    items: Vec<Stack>,
    #[serde(rename = "Item", skip_serializing_if = "Option::is_none")]
    item: Option<Stack>,
}

#[derive(Serialize)]
struct ModernChunk {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "Status")]
    status: String,
    sections: Vec<ModernSection>,
    block_entities: Vec<Chest>,
}

#[derive(Serialize)]
struct ModernSection {
    #[serde(rename = "Y")]
    y: i8,
    block_states: BlockStates,
}

#[derive(Serialize)]
struct BlockStates {
    palette: Vec<PaletteBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<LongArray>,
}

#[derive(Serialize)]
struct LegacyChunk {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "Level")]
    level: LegacyLevel,
}

#[derive(Serialize)]
struct LegacyLevel {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "Sections")]
    sections: Vec<LegacySection>,
    #[serde(rename = "TileEntities")]
    tile_entities: Vec<Chest>,
    #[serde(rename = "Entities")]
    entities: Vec<Entity>,
}

#[derive(Serialize)]
struct LegacySection {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Palette")]
    palette: Vec<PaletteBlock>,
    #[serde(rename = "BlockStates")]
    states: LongArray,
}

#[derive(Serialize)]
struct PlayerData {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "Inventory")]
    inventory: Vec<Stack>,
    #[serde(rename = "EnderItems")]
    ender_items: Vec<Stack>,
}

pub fn block(name: &str) -> PaletteBlock {
    block_with(name, &[])
}

pub fn block_with(name: &str, properties: &[(&str, &str)]) -> PaletteBlock {
    PaletteBlock {
        name: name.to_string(),
        properties: properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

pub fn stack(id: &str, count: i8) -> Stack {
    Stack {
        id: id.to_string(),
        count,
    }
}

pub fn entity(id: &str, pos: [f64; 3], items: Vec<Stack>, item: Option<Stack>) -> Entity {
    Entity {
        id: id.to_string(),
        pos: pos.to_vec(),
        items,
        item,
    }
}

/// Packs `(block index, palette index)` pairs into a section long array.
pub fn pack(blocks: &[(usize, u64)], bits: usize, spanning: bool) -> Vec<i64> {
    let len = if spanning {
        (4096 * bits).div_ceil(64)
    } else {
        4096usize.div_ceil(64 / bits)
    };
    let mut data = vec![0u64; len];
    for &(index, value) in blocks {
        if spanning {
            let bit = index * bits;
            let (word, offset) = (bit / 64, bit % 64);
            data[word] |= value << offset;
            if offset + bits > 64 {
                data[word + 1] |= value >> (64 - offset);
            }
        } else {
            let per_long = 64 / bits;
            data[index / per_long] |= value << ((index % per_long) * bits);
        }
    }
    data.into_iter().map(|v| v as i64).collect()
}

/// Block index inside a section.
pub fn at(x: usize, y: usize, z: usize) -> usize {
    y * 256 + z * 16 + x
}

/// A chunk in the flattened (1.18+) layout.
pub fn modern_chunk(
    x: i32,
    z: i32,
    sections: Vec<(i8, Vec<PaletteBlock>, Vec<i64>)>,
    block_entities: Vec<Chest>,
) -> Vec<u8> {
    let chunk = ModernChunk {
        data_version: 3465,
        x_pos: x,
        z_pos: z,
        status: "minecraft:full".to_string(),
        sections: sections
            .into_iter()
            .map(|(y, palette, data)| ModernSection {
                y,
                block_states: BlockStates {
                    palette,
                    data: (!data.is_empty()).then(|| LongArray::new(data)),
                },
            })
            .collect(),
        block_entities,
    };
    fastnbt::to_bytes(&chunk).unwrap()
}

/// A chunk in the pre-1.18 `Level` layout with the given data version.
pub fn legacy_chunk(
    x: i32,
    z: i32,
    data_version: i32,
    sections: Vec<(i8, Vec<PaletteBlock>, Vec<i64>)>,
    tile_entities: Vec<Chest>,
    entities: Vec<Entity>,
) -> Vec<u8> {
    let chunk = LegacyChunk {
        data_version,
        level: LegacyLevel {
            x_pos: x,
            z_pos: z,
            sections: sections
                .into_iter()
                .map(|(y, palette, data)| LegacySection {
                    y,
                    palette,
                    states: LongArray::new(data),
                })
                .collect(),
            tile_entities,
            entities,
        },
    };
    fastnbt::to_bytes(&chunk).unwrap()
}

pub fn chest(x: i32, y: i32, z: i32, items: Vec<Stack>) -> Chest {
    Chest {
        id: "minecraft:chest".to_string(),
        x,
        y,
        z,
        items,
    }
}

/// Region file bytes from `(entry index, scheme tag, payload)` triples.
/// Payloads are stored as given, so callers compress them first.
pub fn region_bytes(entries: &[(usize, u8, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE];
    for (index, scheme, payload) in entries {
        let sector = out.len() / SECTOR_SIZE;
        let mut body = (payload.len() as u32 + 1).to_be_bytes().to_vec();
        body.push(*scheme);
        body.extend_from_slice(payload);
        let sectors = body.len().div_ceil(SECTOR_SIZE);
        body.resize(sectors * SECTOR_SIZE, 0);
        out[index * 4..index * 4 + 3].copy_from_slice(&(sector as u32).to_be_bytes()[1..]);
        out[index * 4 + 3] = sectors as u8;
        out.extend_from_slice(&body);
    }
    out
}

pub fn player_bytes(inventory: Vec<Stack>, ender_items: Vec<Stack>) -> Vec<u8> {
    let player = PlayerData {
        data_version: 3465,
        inventory,
        ender_items,
    };
    gzip(&fastnbt::to_bytes(&player).unwrap())
}

/// Lays out a small world:
///
/// * `region/r.0.0.mca`
///   * entry 0 (chunk 0,0): section 4 with three stone blocks and a
///     north-facing chest holding 3 diamonds and 5 dirt
///   * entry 1: an unknown compression scheme
///   * entry 2: zero offset (absent)
///   * entry 3 (chunk 3,0): a section made entirely of stone, gzip-compressed
/// * `DIM-1/region/r.-1.0.mca`: one 1.13-era chunk with spanning 5-bit
///   block states holding two gold blocks
/// * `playerdata/<uuid>.dat`: 2 diamonds in the inventory, 1 in the ender chest
/// * `playerdata/Notch.dat`: ignored
pub fn create_test_world(root: &Path) {
    fs::create_dir_all(root.join("region")).unwrap();
    fs::create_dir_all(root.join("DIM-1/region")).unwrap();
    fs::create_dir_all(root.join("playerdata")).unwrap();

    let palette = vec![
        block("minecraft:air"),
        block("minecraft:stone"),
        block_with(
            "minecraft:chest",
            &[("facing", "north"), ("type", "single"), ("waterlogged", "false")],
        ),
    ];
    let data = pack(
        &[
            (at(0, 0, 0), 1),
            (at(15, 0, 0), 1),
            (at(3, 15, 7), 1),
            (at(1, 0, 2), 2),
        ],
        4,
        false,
    );
    let chunk = modern_chunk(
        0,
        0,
        vec![(4, palette, data)],
        vec![chest(
            1,
            64,
            2,
            vec![stack("minecraft:diamond", 3), stack("minecraft:dirt", 5)],
        )],
    );
    let solid = modern_chunk(3, 0, vec![(-1, vec![block("minecraft:stone")], vec![])], vec![]);
    let region = region_bytes(&[
        (0, 2, zlib(&chunk)),
        (1, 4, vec![1, 2, 3, 4]),
        (3, 1, gzip(&solid)),
    ]);
    fs::write(root.join("region/r.0.0.mca"), region).unwrap();

    let mut palette = vec![block("minecraft:air")];
    palette.extend((0..15).map(|_| block("minecraft:netherrack")));
    palette.push(block("minecraft:gold_block"));
    let data = pack(&[(12, 16), (at(5, 5, 5), 16)], 5, true);
    let nether = legacy_chunk(-32, 0, 1976, vec![(2, palette, data)], vec![], vec![]);
    fs::write(
        root.join("DIM-1/region/r.-1.0.mca"),
        region_bytes(&[(0, 2, zlib(&nether))]),
    )
    .unwrap();

    fs::write(
        root.join(format!("playerdata/{}.dat", PLAYER)),
        player_bytes(
            vec![stack("minecraft:diamond", 2), stack("minecraft:stick", 1)],
            vec![stack("minecraft:diamond", 1)],
        ),
    )
    .unwrap();
    fs::write(root.join("playerdata/Notch.dat"), b"not a player").unwrap();
}
