use super::ScanContext;
use crate::model::{ItemType, Location, Needle, SearchResult};
use crate::nbt::{as_compound, as_i64, as_list, as_str, Compound};
use fastnbt::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

pub type Tally = HashMap<ItemType, u64>;

/// Item tallies of one container. Index 0 holds everything the container
/// holds, nested containers included; in stats mode every nested container
/// (shulker box, bundle) also gets its own tally at index 1, 2, ...
#[derive(Debug)]
pub struct Contents {
    tallies: Vec<Tally>,
}

impl Contents {
    pub fn new() -> Self {
        Self {
            tallies: vec![Tally::new()],
        }
    }

    pub fn from_items(items: &[Value], ctx: &ScanContext<'_>) -> Self {
        let mut contents = Self::new();
        contents.add_items(items, ctx);
        contents
    }

    pub fn add_items(&mut self, items: &[Value], ctx: &ScanContext<'_>) {
        self.add_list(items.iter().filter_map(as_compound), ctx, &[0]);
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.iter().all(Tally::is_empty)
    }

    fn add_list<'t>(
        &mut self,
        stacks: impl Iterator<Item = &'t Compound>,
        ctx: &ScanContext<'_>,
        targets: &[usize],
    ) {
        for stack in stacks {
            self.add_stack(stack, ctx, targets);
        }
    }

    fn add_stack(&mut self, stack: &Compound, ctx: &ScanContext<'_>, targets: &[usize]) {
        let Some(id) = stack.get("id").and_then(as_str) else {
            return;
        };
        let count = stack
            .get("Count")
            .or_else(|| stack.get("count"))
            .and_then(as_i64)
            .unwrap_or(1);
        if count <= 0 {
            return;
        }
        match ItemType::parse(id) {
            Ok(item) => {
                if ctx.stats_mode() || ctx.needles.match_item(&item).is_some() {
                    for target in targets {
                        *self.tallies[*target].entry(item.clone()).or_insert(0) += count as u64;
                    }
                }
            }
            Err(err) => trace!("Skipping item stack: {}", err),
        }

        for nested in nested_containers(stack) {
            if ctx.stats_mode() {
                let index = self.tallies.len();
                self.tallies.push(Tally::new());
                let mut nested_targets = targets.to_vec();
                nested_targets.push(index);
                self.add_list(nested.into_iter(), ctx, &nested_targets);
            } else {
                self.add_list(nested.into_iter(), ctx, targets);
            }
        }
    }

    /// Emits the results for this container at `location`.
    pub fn emit(self, location: Arc<Location>, ctx: &ScanContext<'_>, results: &mut Vec<SearchResult>) {
        let mut tallies = self.tallies.into_iter();
        let Some(total) = tallies.next() else {
            return;
        };
        if total.is_empty() {
            return;
        }
        push_sorted(&total, &location, results);

        let Some(table) = ctx.stats else {
            return;
        };
        results.push(SearchResult::new(
            Needle::StatsResults(table.tally_stats(&total)),
            location.clone(),
            1,
        ));
        for (offset, tally) in tallies.enumerate() {
            if tally.is_empty() {
                continue;
            }
            let sub = Arc::new(Location::SubLocation {
                parent: location.clone(),
                index: offset + 1,
            });
            push_sorted(&tally, &sub, results);
        }
    }
}

impl Default for Contents {
    fn default() -> Self {
        Self::new()
    }
}

fn push_sorted(tally: &Tally, location: &Arc<Location>, results: &mut Vec<SearchResult>) {
    let mut entries: Vec<(&ItemType, &u64)> = tally.iter().collect();
    entries.sort();
    for (item, count) in entries {
        results.push(SearchResult::new(
            Needle::ItemType(item.clone()),
            location.clone(),
            *count,
        ));
    }
}

/// Item lists stored inside a single stack, across both the legacy `tag`
/// layout and the component layout.
fn nested_containers(stack: &Compound) -> Vec<Vec<&Compound>> {
    let mut nested = Vec::new();

    if let Some(tag) = stack.get("tag").and_then(as_compound) {
        let block_entity_items = tag
            .get("BlockEntityTag")
            .and_then(as_compound)
            .and_then(|c| c.get("Items"));
        for list in [block_entity_items, tag.get("Items")].into_iter().flatten() {
            if let Some(list) = as_list(list) {
                nested.push(list.iter().filter_map(as_compound).collect());
            }
        }
    }

    if let Some(components) = stack.get("components").and_then(as_compound) {
        if let Some(slots) = components.get("minecraft:container").and_then(as_list) {
            nested.push(
                slots
                    .iter()
                    .filter_map(as_compound)
                    .filter_map(|slot| slot.get("item").and_then(as_compound))
                    .collect(),
            );
        }
        if let Some(list) = components
            .get("minecraft:bundle_contents")
            .and_then(as_list)
        {
            nested.push(list.iter().filter_map(as_compound).collect());
        }
    }

    nested
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::Decompressor;
    use crate::model::NeedleSet;
    use crate::tables::{BlockRegistry, StatsTable};

    fn compound<const N: usize>(entries: [(&str, Value); N]) -> Value {
        Value::Compound(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn stack(id: &str, count: i8) -> Value {
        compound([("id", Value::String(id.into())), ("Count", Value::Byte(count))])
    }

    fn shulker(items: Vec<Value>) -> Value {
        compound([
            ("id", Value::String("minecraft:shulker_box".into())),
            ("Count", Value::Byte(1)),
            (
                "tag",
                compound([("BlockEntityTag", compound([("Items", Value::List(items))]))]),
            ),
        ])
    }

    #[test]
    fn search_mode_counts_only_needles_and_merges_slots() {
        let needles = NeedleSet::new(
            [Needle::ItemType(ItemType::parse("diamond").unwrap())],
            &BlockRegistry::default(),
        );
        let ctx = ScanContext::new(Decompressor::Internal, &needles, None);
        let items = vec![
            stack("minecraft:diamond", 3),
            stack("minecraft:dirt", 64),
            shulker(vec![stack("minecraft:diamond", 5)]),
        ];
        let mut results = Vec::new();
        Contents::from_items(&items, &ctx).emit(
            Arc::new(Location::block("overworld", 0, 0, 0)),
            &ctx,
            &mut results,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 8);
    }

    #[test]
    fn stats_mode_emits_sub_locations_for_nested_containers() {
        let needles = NeedleSet::default();
        let table = StatsTable::default();
        let ctx = ScanContext::new(Decompressor::Internal, &needles, Some(&table));
        let items = vec![
            stack("minecraft:dirt", 10),
            shulker(vec![stack("minecraft:diamond", 2)]),
        ];
        let mut results = Vec::new();
        let location = Arc::new(Location::block("overworld", 0, 0, 0));
        Contents::from_items(&items, &ctx).emit(location.clone(), &ctx, &mut results);

        // diamond, dirt, shulker_box at the container, the stats needle, diamond in the sub-location
        assert_eq!(results.len(), 5);
        assert!(matches!(results[3].needle, Needle::StatsResults(_)));
        let sub = &results[4];
        assert_eq!(
            *sub.location,
            Location::SubLocation {
                parent: location,
                index: 1
            }
        );
        assert_eq!(sub.count, 2);
    }

    #[test]
    fn component_containers_are_walked() {
        let needles = NeedleSet::new(
            [Needle::ItemType(ItemType::parse("emerald").unwrap())],
            &BlockRegistry::default(),
        );
        let ctx = ScanContext::new(Decompressor::Internal, &needles, None);
        let slot = compound([
            ("slot", Value::Int(0)),
            (
                "item",
                compound([
                    ("id", Value::String("minecraft:emerald".into())),
                    ("count", Value::Int(40)),
                ]),
            ),
        ]);
        let box_stack = compound([
            ("id", Value::String("minecraft:red_shulker_box".into())),
            ("count", Value::Int(1)),
            (
                "components",
                compound([("minecraft:container", Value::List(vec![slot]))]),
            ),
        ]);
        let contents = Contents::from_items(&[box_stack], &ctx);
        let mut results = Vec::new();
        contents.emit(Arc::new(Location::chunk("overworld", 0, 0)), &ctx, &mut results);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 40);
    }
}
