//! Compact JSON encoding of a result set.
//!
//! Each result becomes one object with short keys: `nt` needle type, `id`
//! needle identifier, `lt` location type, `di` the location's distinguishing
//! value, `lc` its coordinates and `cn` the count. Keys without a value for a
//! given variant are left out.

use crate::error::Result;
use crate::model::{Location, Needle, SearchResult};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::io::Write;

struct Encoded<'a>(&'a SearchResult);

impl Serialize for Encoded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let result = self.0;
        let mut out = serializer.serialize_struct("SearchResult", 6)?;

        out.serialize_field("nt", result.needle.tag())?;
        match &result.needle {
            Needle::BlockState(state) => out.serialize_field("id", &state.id.path)?,
            Needle::ItemType(item) => out.serialize_field("id", &item.id.path)?,
            Needle::StatsResults(_) => out.skip_field("id")?,
        }

        let location = result.location.as_ref();
        out.serialize_field("lt", location.tag())?;
        match location {
            Location::ChunkPos { dimension, x, z } => {
                out.serialize_field("di", dimension)?;
                out.serialize_field("lc", &[*x, *z])?;
            }
            Location::BlockPos { dimension, x, y, z } => {
                out.serialize_field("di", dimension)?;
                out.serialize_field("lc", &[*x, *y, *z])?;
            }
            Location::Vec3d { dimension, .. } => {
                out.serialize_field("di", dimension)?;
                out.skip_field("lc")?;
            }
            Location::PlayerInventory { player, .. } => {
                out.serialize_field("di", &player.to_string())?;
                out.skip_field("lc")?;
            }
            Location::Container { kind, .. } | Location::Entity { kind, .. } => {
                out.serialize_field("di", kind)?;
                out.skip_field("lc")?;
            }
            Location::SubLocation { index, .. } => {
                out.serialize_field("di", &index.to_string())?;
                out.skip_field("lc")?;
            }
        }

        out.serialize_field("cn", &result.count)?;
        out.end()
    }
}

/// Writes `results` as a JSON array and flushes `out`.
pub fn write_json(results: &[SearchResult], out: &mut dyn Write) -> Result<()> {
    let mut serializer = serde_json::Serializer::new(&mut *out);
    serializer.collect_seq(results.iter().map(Encoded))?;
    out.flush()?;
    Ok(())
}

pub fn to_json_string(results: &[SearchResult]) -> Result<String> {
    let mut buf = Vec::new();
    write_json(results, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockState, ItemType};
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn block_state_at_block_pos() {
        let result = SearchResult::new(
            Needle::BlockState(BlockState::parse("stone").unwrap()),
            Arc::new(Location::block("overworld", 10, 64, -5)),
            3,
        );
        let value: Value = serde_json::from_str(&to_json_string(&[result]).unwrap()).unwrap();
        assert_eq!(
            value,
            json!([{ "nt": "BlockState", "id": "stone", "lt": "BlockPos",
                     "di": "overworld", "lc": [10, 64, -5], "cn": 3 }])
        );
    }

    #[test]
    fn wrapper_locations_encode_their_own_tag() {
        let pos = Arc::new(Location::block("overworld", 0, 0, 0));
        let chest = Arc::new(Location::Container {
            kind: "minecraft:chest".into(),
            location: pos,
        });
        let results = vec![
            SearchResult::new(
                Needle::ItemType(ItemType::parse("diamond").unwrap()),
                chest.clone(),
                5,
            ),
            SearchResult::new(
                Needle::ItemType(ItemType::parse("diamond").unwrap()),
                Arc::new(Location::SubLocation {
                    parent: chest,
                    index: 2,
                }),
                1,
            ),
        ];
        let value: Value = serde_json::from_str(&to_json_string(&results).unwrap()).unwrap();
        assert_eq!(value[0]["lt"], "Container");
        assert_eq!(value[0]["di"], "minecraft:chest");
        assert!(value[0].get("lc").is_none());
        assert_eq!(value[1]["lt"], "SubLocation");
        assert_eq!(value[1]["di"], "2");
    }

    #[test]
    fn empty_result_set_is_an_empty_array() {
        assert_eq!(to_json_string(&[]).unwrap(), "[]");
    }
}
