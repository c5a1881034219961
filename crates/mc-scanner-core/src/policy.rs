//! Scan policies decide which haystack entries are scanned, how, and what
//! happens to each batch of results as it arrives.

use crate::error::{Error, Result};
use crate::model::{Location, Needle, SearchResult};
use crate::scanner::region::REGION_SIZE;
use crate::scanner::{RegionFile, ScanContext, Scannable};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

/// Hooks the engine calls during a run.
///
/// `on_results` is invoked while the engine holds its aggregate lock, so
/// calls never overlap and each sees one task's batch.
pub trait ScanPolicy: Sync {
    fn accepts(&self, _scannable: &Scannable, _ctx: &ScanContext<'_>) -> bool {
        true
    }

    fn scan(&self, scannable: &Scannable, ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        scannable.scan(ctx)
    }

    fn on_results(&self, _results: &[SearchResult]) -> Result<()> {
        Ok(())
    }

    fn after(&self, _results: &[SearchResult]) -> Result<()> {
        Ok(())
    }
}

pub type ReportWriter<'w> = Box<dyn Write + Send + 'w>;

/// An inclusive block box in one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    from: Location,
    to: Location,
}

impl Bounds {
    /// The box spanned by two corners, in either order.
    pub fn new(dimension: &str, a: (i32, i32, i32), b: (i32, i32, i32)) -> Self {
        Self {
            from: Location::block(dimension, a.0.min(b.0), a.1.min(b.1), a.2.min(b.2)),
            to: Location::block(dimension, a.0.max(b.0), a.1.max(b.1), a.2.max(b.2)),
        }
    }

    pub fn dimension(&self) -> &str {
        self.from.dimension().unwrap_or_default()
    }

    /// Whether any chunk of `region` reaches into the box.
    pub fn overlaps_region(&self, region: &RegionFile) -> bool {
        if region.dimension() != self.dimension() {
            return false;
        }
        let (Some(pos), Some((x0, _, z0))) = (region.pos(), self.from.section()) else {
            return true;
        };
        let (first_x, first_z) = pos.local_to_world(0, 0);
        let (last_x, last_z) = pos.local_to_world(REGION_SIZE - 1, REGION_SIZE - 1);
        // the region's chunk closest to the box's lower corner
        let nearest = Location::chunk(
            self.dimension(),
            x0.clamp(first_x, last_x),
            z0.clamp(first_z, last_z),
        );
        nearest.in_chunk_range(&self.from, &self.to)
    }

    /// Whether the position a result resolves to lies inside the box.
    pub fn contains(&self, location: &Location) -> bool {
        let root = location.root();
        if root.dimension() != Some(self.dimension()) {
            return false;
        }
        match root {
            Location::BlockPos { .. } => root.in_block_range(&self.from, &self.to),
            Location::ChunkPos { .. } => root.in_chunk_range(&self.from, &self.to),
            Location::Vec3d { dimension, x, y, z } => Location::block(
                dimension,
                x.floor() as i32,
                y.floor() as i32,
                z.floor() as i32,
            )
            .in_block_range(&self.from, &self.to),
            _ => false,
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Parses `dimension,x1,y1,z1,x2,y2,z2`.
impl FromStr for Bounds {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || {
            Error::InvalidArgument(format!(
                "expected dimension,x1,y1,z1,x2,y2,z2 for bounds, got '{}'",
                value
            ))
        };
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        let [dimension, coords @ ..] = &parts[..] else {
            return Err(invalid());
        };
        let coords: Vec<i32> = coords
            .iter()
            .map(|c| c.parse().map_err(|_| invalid()))
            .collect::<Result<_>>()?;
        match coords[..] {
            [x1, y1, z1, x2, y2, z2] if !dimension.is_empty() => {
                Ok(Bounds::new(dimension, (x1, y1, z1), (x2, y2, z2)))
            }
            _ => Err(invalid()),
        }
    }
}

struct Report<'w> {
    writer: ReportWriter<'w>,
    totals: HashMap<Needle, u64>,
}

/// The stock policy for both search and stats runs.
///
/// Only files that can hold something of interest are scanned: player files
/// when items are wanted, region files when anything is. With a report
/// writer every result is written as one line and per-needle totals follow
/// at the end; sub-location results are left out of the totals.
pub struct SearchPolicy<'w> {
    report: Option<Mutex<Report<'w>>>,
    bounds: Option<Bounds>,
}

impl<'w> SearchPolicy<'w> {
    pub fn new(writer: Option<ReportWriter<'w>>) -> Self {
        Self {
            report: writer.map(|writer| {
                Mutex::new(Report {
                    writer,
                    totals: HashMap::new(),
                })
            }),
            bounds: None,
        }
    }

    /// A policy with no text report, used when results are encoded as JSON.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn with_bounds(mut self, bounds: Option<Bounds>) -> Self {
        self.bounds = bounds;
        self
    }

    fn with_report<T>(&self, f: impl FnOnce(&mut Report<'w>) -> Result<T>) -> Result<Option<T>> {
        match &self.report {
            None => Ok(None),
            Some(report) => {
                let mut report = report
                    .lock()
                    .map_err(|_| Error::Policy("report lock poisoned".into()))?;
                f(&mut report).map(Some)
            }
        }
    }
}

impl ScanPolicy for SearchPolicy<'_> {
    fn accepts(&self, scannable: &Scannable, ctx: &ScanContext<'_>) -> bool {
        match (scannable, &self.bounds) {
            (Scannable::Player(_), Some(_)) => false,
            (Scannable::Player(_), None) => ctx.stats_mode() || ctx.needles.has_items(),
            (Scannable::Region(region), bounds) => {
                (ctx.stats_mode() || !ctx.needles.is_empty())
                    && bounds.as_ref().map_or(true, |b| b.overlaps_region(region))
            }
        }
    }

    fn scan(&self, scannable: &Scannable, ctx: &ScanContext<'_>) -> Result<Vec<SearchResult>> {
        let mut results = scannable.scan(ctx)?;
        if let Some(bounds) = &self.bounds {
            results.retain(|result| bounds.contains(&result.location));
        }
        Ok(results)
    }

    fn on_results(&self, results: &[SearchResult]) -> Result<()> {
        self.with_report(|report| {
            for result in results {
                writeln!(report.writer, "{}", result)?;
                if !result.location.is_sub_location() {
                    *report.totals.entry(result.needle.clone()).or_insert(0) += result.count;
                }
            }
            report.writer.flush()?;
            Ok(())
        })?;
        Ok(())
    }

    fn after(&self, _results: &[SearchResult]) -> Result<()> {
        self.with_report(|report| {
            let mut totals: Vec<(&Needle, &u64)> = report.totals.iter().collect();
            totals.sort_by_key(|(needle, _)| needle.report_key());
            let lines: Vec<String> = totals
                .into_iter()
                .map(|(needle, count)| format!("Total {}: {}", needle, count))
                .collect();
            for line in lines {
                writeln!(report.writer, "{}", line)?;
            }
            report.writer.flush()?;
            Ok(())
        })?;
        Ok(())
    }
}
