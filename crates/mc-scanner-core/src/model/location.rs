use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a match was found.
///
/// Wrapper variants (`Container`, `Entity`, `SubLocation`) hold their parent
/// behind an `Arc`; parents never point back at children, so every location is
/// a finite tree rooted at a coordinate-bearing variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    ChunkPos {
        dimension: String,
        x: i32,
        z: i32,
    },
    BlockPos {
        dimension: String,
        x: i32,
        y: i32,
        z: i32,
    },
    Vec3d {
        dimension: String,
        x: f64,
        y: f64,
        z: f64,
    },
    PlayerInventory {
        player: Uuid,
        ender_chest: bool,
    },
    Container {
        kind: String,
        location: Arc<Location>,
    },
    Entity {
        kind: String,
        location: Arc<Location>,
    },
    SubLocation {
        parent: Arc<Location>,
        index: usize,
    },
}

impl Location {
    pub fn block(dimension: &str, x: i32, y: i32, z: i32) -> Self {
        Location::BlockPos {
            dimension: dimension.to_string(),
            x,
            y,
            z,
        }
    }

    pub fn chunk(dimension: &str, x: i32, z: i32) -> Self {
        Location::ChunkPos {
            dimension: dimension.to_string(),
            x,
            z,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Location::ChunkPos { .. } => "ChunkPos",
            Location::BlockPos { .. } => "BlockPos",
            Location::Vec3d { .. } => "Vec3d",
            Location::PlayerInventory { .. } => "PlayerInventory",
            Location::Container { .. } => "Container",
            Location::Entity { .. } => "Entity",
            Location::SubLocation { .. } => "SubLocation",
        }
    }

    /// Section coordinates (`coord >> 4`) of a block position.
    pub fn section(&self) -> Option<(i32, i32, i32)> {
        match self {
            Location::BlockPos { x, y, z, .. } => Some((x >> 4, y >> 4, z >> 4)),
            _ => None,
        }
    }

    /// Block `offset` of section `section_y` inside a `ChunkPos`. `None` for
    /// other variants, or when the block lies outside the i32 coordinate range.
    pub fn from_section(chunk: &Location, section_y: i32, offset: (i32, i32, i32)) -> Option<Self> {
        let Location::ChunkPos { dimension, x, z } = chunk else {
            return None;
        };
        let (dx, dy, dz) = offset;
        Some(Location::BlockPos {
            dimension: dimension.clone(),
            x: x.checked_mul(16)?.checked_add(dx)?,
            y: section_y.checked_mul(16)?.checked_add(dy)?,
            z: z.checked_mul(16)?.checked_add(dz)?,
        })
    }

    /// Whether a `ChunkPos` lies within the sections spanned by two block
    /// positions, inclusive. Dimensions are not compared.
    pub fn in_chunk_range(&self, from: &Location, to: &Location) -> bool {
        match (self, from.section(), to.section()) {
            (Location::ChunkPos { x, z, .. }, Some((x0, _, z0)), Some((x1, _, z1))) => {
                (x0..=x1).contains(x) && (z0..=z1).contains(z)
            }
            _ => false,
        }
    }

    /// Whether a `BlockPos` lies within the box spanned by two block
    /// positions, inclusive. Dimensions are not compared.
    pub fn in_block_range(&self, from: &Location, to: &Location) -> bool {
        match (self, from, to) {
            (
                Location::BlockPos { x, y, z, .. },
                Location::BlockPos {
                    x: x0,
                    y: y0,
                    z: z0,
                    ..
                },
                Location::BlockPos {
                    x: x1,
                    y: y1,
                    z: z1,
                    ..
                },
            ) => (x0..=x1).contains(&x) && (y0..=y1).contains(&y) && (z0..=z1).contains(&z),
            _ => false,
        }
    }

    pub fn dimension(&self) -> Option<&str> {
        match self {
            Location::ChunkPos { dimension, .. }
            | Location::BlockPos { dimension, .. }
            | Location::Vec3d { dimension, .. } => Some(dimension),
            _ => None,
        }
    }

    /// The coordinate-bearing variant at the bottom of the wrapper layers.
    pub fn root(&self) -> &Location {
        match self {
            Location::Container { location, .. } | Location::Entity { location, .. } => {
                location.root()
            }
            Location::SubLocation { parent, .. } => parent.root(),
            other => other,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Location::Container { location, .. } | Location::Entity { location, .. } => {
                1 + location.depth()
            }
            Location::SubLocation { parent, .. } => 1 + parent.depth(),
            _ => 0,
        }
    }

    pub fn is_sub_location(&self) -> bool {
        matches!(self, Location::SubLocation { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::ChunkPos { dimension, x, z } => {
                write!(f, "ChunkPos({}, {}, {})", dimension, x, z)
            }
            Location::BlockPos { dimension, x, y, z } => {
                write!(f, "BlockPos({}, {}, {}, {})", dimension, x, y, z)
            }
            Location::Vec3d { dimension, x, y, z } => {
                write!(f, "Vec3d({}, {:.2}, {:.2}, {:.2})", dimension, x, y, z)
            }
            Location::PlayerInventory {
                player,
                ender_chest,
            } => {
                if *ender_chest {
                    write!(f, "PlayerInventory({}, ender_chest)", player)
                } else {
                    write!(f, "PlayerInventory({})", player)
                }
            }
            Location::Container { kind, location } => write!(f, "Container({}, {})", kind, location),
            Location::Entity { kind, location } => write!(f, "Entity({}, {})", kind, location),
            Location::SubLocation { parent, index } => write!(f, "{}#{}", parent, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_uses_arithmetic_shift() {
        assert_eq!(Location::block("overworld", 17, -1, -16).section(), Some((1, -1, -1)));
        assert_eq!(Location::chunk("overworld", 0, 0).section(), None);
    }

    #[test]
    fn from_section_offsets_into_the_chunk() {
        let chunk = Location::chunk("the_nether", -2, 3);
        assert_eq!(
            Location::from_section(&chunk, -1, (15, 0, 4)),
            Some(Location::block("the_nether", -17, -16, 52))
        );
        let far = Location::chunk("overworld", 200_000_000, 0);
        assert_eq!(Location::from_section(&far, 0, (0, 0, 0)), None);
        let edge = Location::chunk("overworld", i32::MAX / 16, 0);
        assert_eq!(
            Location::from_section(&edge, 0, (15, 0, 0)),
            Some(Location::block("overworld", i32::MAX, 0, 0))
        );
        assert_eq!(Location::from_section(&Location::block("overworld", 0, 0, 0), 0, (0, 0, 0)), None);
    }

    #[test]
    fn block_and_chunk_ranges_are_inclusive() {
        let from = Location::block("overworld", -16, 0, 0);
        let to = Location::block("overworld", 31, 64, 15);
        assert!(Location::block("overworld", -16, 64, 15).in_block_range(&from, &to));
        assert!(Location::block("the_end", 31, 0, 0).in_block_range(&from, &to));
        assert!(!Location::block("overworld", 32, 10, 10).in_block_range(&from, &to));
        assert!(!Location::block("overworld", 0, 65, 0).in_block_range(&from, &to));

        assert!(Location::chunk("overworld", -1, 0).in_chunk_range(&from, &to));
        assert!(Location::chunk("overworld", 1, 0).in_chunk_range(&from, &to));
        assert!(!Location::chunk("overworld", 2, 0).in_chunk_range(&from, &to));
        assert!(!Location::chunk("overworld", 0, 1).in_chunk_range(&from, &to));
        assert!(!Location::chunk("overworld", 0, 0).in_block_range(&from, &to));
    }

    #[test]
    fn wrappers_resolve_to_root() {
        let pos = Arc::new(Location::block("overworld", 1, 2, 3));
        let chest = Arc::new(Location::Container {
            kind: "minecraft:chest".into(),
            location: pos.clone(),
        });
        let sub = Location::SubLocation {
            parent: chest,
            index: 2,
        };
        assert_eq!(sub.root(), pos.as_ref());
        assert_eq!(sub.depth(), 2);
        assert_eq!(
            sub.to_string(),
            "Container(minecraft:chest, BlockPos(overworld, 1, 2, 3))#2"
        );
    }
}
