//! Serde views of the NBT documents stored in region and player files.
//!
//! Only the fields the scanners read are declared; everything else in the
//! document is skipped while decoding. Item stacks stay dynamic because their
//! layout differs between game versions.

use crate::error::{Error, Result};
use fastnbt::{IntArray, LongArray, Value};
use serde::Deserialize;
use std::collections::HashMap;

pub type Compound = HashMap<String, Value>;

/// Decodes an uncompressed NBT document, reporting failures against `context`.
pub fn from_bytes<T>(data: &[u8], context: impl Into<String>) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    fastnbt::from_bytes(data).map_err(|err| Error::corrupt(context, err.to_string()))
}

// --- Chunk ---
// 1.18+ keeps everything at the root; older versions nest it under "Level".
// Entity files (1.17+) carry "Position" and "Entities" at the root.
#[derive(Debug, Deserialize)]
pub struct ChunkData {
    #[serde(rename = "DataVersion", default)]
    pub data_version: i32,

    #[serde(rename = "Level")]
    pub level: Option<ChunkBody>,

    #[serde(rename = "Position")]
    pub position: Option<IntArray>,

    #[serde(rename = "xPos")]
    pub x_pos: Option<i32>,
    #[serde(rename = "zPos")]
    pub z_pos: Option<i32>,

    #[serde(default)]
    pub sections: Vec<Section>,

    #[serde(default)]
    pub block_entities: Vec<BlockEntity>,

    #[serde(rename = "Entities", default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkBody {
    #[serde(rename = "xPos")]
    pub x_pos: Option<i32>,
    #[serde(rename = "zPos")]
    pub z_pos: Option<i32>,

    #[serde(rename = "Sections", default)]
    pub sections: Vec<Section>,

    #[serde(rename = "TileEntities", default)]
    pub block_entities: Vec<BlockEntity>,

    #[serde(rename = "Entities", default)]
    pub entities: Vec<Entity>,
}

impl ChunkData {
    /// Chunk coordinates stored in the document, if any.
    pub fn coords(&self) -> Option<(i32, i32)> {
        let level = self.level.as_ref();
        let x = level.and_then(|l| l.x_pos).or(self.x_pos);
        let z = level.and_then(|l| l.z_pos).or(self.z_pos);
        if let (Some(x), Some(z)) = (x, z) {
            return Some((x, z));
        }
        match self.position.as_deref() {
            Some(&[x, z]) => Some((x, z)),
            _ => None,
        }
    }

    /// The chunk contents, whichever layout they were stored in.
    pub fn into_body(self) -> ChunkBody {
        match self.level {
            Some(mut level) => {
                if level.entities.is_empty() {
                    level.entities = self.entities;
                }
                level
            }
            None => ChunkBody {
                x_pos: self.x_pos,
                z_pos: self.z_pos,
                sections: self.sections,
                block_entities: self.block_entities,
                entities: self.entities,
            },
        }
    }
}

// --- Section (16x16x16 cube) ---
// 1.18+ nests the palette under "block_states"; older versions keep
// "Palette" and "BlockStates" on the section itself.
#[derive(Debug, Deserialize)]
pub struct Section {
    #[serde(rename = "Y", default)]
    pub y: i32,

    pub block_states: Option<BlockStates>,

    #[serde(rename = "Palette")]
    pub palette: Option<Vec<PaletteEntry>>,
    #[serde(rename = "BlockStates")]
    pub states: Option<LongArray>,
}

#[derive(Debug, Deserialize)]
pub struct BlockStates {
    #[serde(default)]
    pub palette: Vec<PaletteEntry>,
    // absent when the palette has a single entry filling the whole section
    pub data: Option<LongArray>,
}

#[derive(Debug, Deserialize)]
pub struct PaletteEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default)]
    pub properties: HashMap<String, String>,
}

impl Section {
    /// `(palette, packed data, legacy layout)` for whichever layout is present.
    pub fn block_data(&self) -> (&[PaletteEntry], Option<&[i64]>, bool) {
        match &self.block_states {
            Some(states) => (&states.palette, states.data.as_deref(), false),
            None => (
                self.palette.as_deref().unwrap_or(&[]),
                self.states.as_deref(),
                true,
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BlockEntity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub z: i32,
    #[serde(rename = "Items")]
    pub items: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Pos", default)]
    pub pos: Vec<f64>,

    #[serde(rename = "Items", default)]
    pub items: Vec<Value>,
    #[serde(rename = "Inventory", default)]
    pub inventory: Vec<Value>,
    #[serde(rename = "HandItems", default)]
    pub hand_items: Vec<Value>,
    #[serde(rename = "ArmorItems", default)]
    pub armor_items: Vec<Value>,
    // item frames and dropped items
    #[serde(rename = "Item")]
    pub item: Option<Value>,
}

impl Entity {
    pub fn inventories(&self) -> impl Iterator<Item = &[Value]> {
        [
            &self.items[..],
            &self.inventory[..],
            &self.hand_items[..],
            &self.armor_items[..],
        ]
        .into_iter()
        .chain(self.item.as_ref().map(std::slice::from_ref))
    }
}

// --- Player ---
#[derive(Debug, Deserialize)]
pub struct PlayerData {
    #[serde(rename = "Inventory", default)]
    pub inventory: Vec<Value>,
    #[serde(rename = "EnderItems", default)]
    pub ender_items: Vec<Value>,
}

pub fn as_compound(value: &Value) -> Option<&Compound> {
    match value {
        Value::Compound(compound) => Some(compound),
        _ => None,
    }
}

pub fn as_list(value: &Value) -> Option<&[Value]> {
    match value {
        Value::List(list) => Some(list),
        _ => None,
    }
}

pub fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(value) => Some(value),
        _ => None,
    }
}

/// Any integral tag widened to i64.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Byte(v) => Some(*v as i64),
        Value::Short(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::Long(v) => Some(*v),
        _ => None,
    }
}
