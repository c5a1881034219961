use super::{PlayerFile, RegionFile, Scannable};
use dashmap::DashSet;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// World sub-folders holding each dimension's chunk data.
pub const DIMENSIONS: [(&str, &str); 3] = [
    (".", "overworld"),
    ("DIM-1", "the_nether"),
    ("DIM1", "the_end"),
];

const CHUNK_FOLDERS: [&str; 2] = ["region", "entities"];

/// Builds the de-duplicated haystack for `root_paths`.
///
/// A root is either a world folder or a single `.mca` file. Files matching an
/// ignore pattern are skipped; files that cannot be read are logged and left
/// out without failing the collection.
pub fn collect_haystack(root_paths: &[PathBuf], ignore_globs: &[String]) -> Vec<Scannable> {
    let haystack: DashSet<Scannable> = DashSet::new();

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    root_paths
        .par_iter()
        .for_each(|root| visit_root(root, &haystack, &ignore_patterns));

    let mut haystack: Vec<Scannable> = haystack.into_iter().collect();
    haystack.sort_by(|a, b| a.path().cmp(b.path()));
    haystack
}

/// Dimension of a standalone region file, judged from its folder names.
pub fn dimension_for_path(path: &Path) -> &'static str {
    let dimension_dir = path
        .parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .and_then(|name| name.to_str());
    DIMENSIONS
        .iter()
        .find(|(dir, _)| Some(*dir) == dimension_dir)
        .map(|(_, dimension)| *dimension)
        .unwrap_or(DIMENSIONS[0].1)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn visit_root(root: &Path, haystack: &DashSet<Scannable>, ignore_patterns: &[Pattern]) {
    if root.is_file() {
        if root.extension().is_some_and(|ext| ext == "mca") {
            let path = canonical(root);
            add_region(&path, dimension_for_path(&path), haystack, ignore_patterns);
        } else {
            error!("Not a world folder or region file: {}", root.display());
        }
        return;
    }
    if !root.is_dir() {
        error!("Path does not exist: {}", root.display());
        return;
    }

    let root = canonical(root);
    visit_dir(&root.join("playerdata"), haystack, ignore_patterns, |path, haystack| {
        if !PlayerFile::is_player_file(path) {
            debug!("Skipping {}: not a player file", path.display());
            return;
        }
        match PlayerFile::open(path) {
            Ok(player) => {
                haystack.insert(Scannable::Player(player));
            }
            Err(err) => error!("Skipping {}: {}", path.display(), err),
        }
    });

    for (dir, dimension) in DIMENSIONS {
        for folder in CHUNK_FOLDERS {
            let chunk_dir = match dir {
                "." => root.join(folder),
                _ => root.join(dir).join(folder),
            };
            visit_dir(&chunk_dir, haystack, ignore_patterns, |path, haystack| {
                if path.extension().is_some_and(|ext| ext == "mca") {
                    add_region(path, dimension, haystack, ignore_patterns);
                }
            });
        }
    }
}

fn add_region(
    path: &Path,
    dimension: &str,
    haystack: &DashSet<Scannable>,
    ignore_patterns: &[Pattern],
) {
    if ignore_patterns.iter().any(|pattern| pattern.matches_path(path)) {
        return;
    }
    match RegionFile::open(path, dimension) {
        Ok(region) => {
            haystack.insert(Scannable::Region(region));
        }
        Err(err) => error!("Skipping {}: {}", path.display(), err),
    }
}

/// Calls `visit` for every regular file directly inside `dir` that no ignore
/// pattern matches. A missing folder is not an error.
fn visit_dir<F>(dir: &Path, haystack: &DashSet<Scannable>, ignore_patterns: &[Pattern], visit: F)
where
    F: Fn(&Path, &DashSet<Scannable>) + Sync,
{
    if !dir.is_dir() {
        return;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() == io::ErrorKind::PermissionDenied {
                error!("Access denied reading directory {}: {}", dir.display(), err);
            } else {
                error!("Error reading directory {}: {}", dir.display(), err);
            }
            return;
        }
    };

    entries.par_bridge().for_each(|entry_result| {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error reading entry in directory {}: {}", dir.display(), err);
                return;
            }
        };

        let path = entry.path();
        if !path.is_file()
            || ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(&path))
        {
            return;
        }
        visit(&path, haystack);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_from_folder_names() {
        assert_eq!(dimension_for_path(Path::new("/w/DIM-1/region/r.0.0.mca")), "the_nether");
        assert_eq!(dimension_for_path(Path::new("/w/DIM1/entities/r.0.0.mca")), "the_end");
        assert_eq!(dimension_for_path(Path::new("/w/region/r.0.0.mca")), "overworld");
        assert_eq!(dimension_for_path(Path::new("r.0.0.mca")), "overworld");
    }

    #[test]
    fn collects_world_layout_and_ignores_strays() {
        let world = tempfile::tempdir().unwrap();
        let root = world.path();
        for dir in ["region", "DIM-1/region", "DIM1/entities", "playerdata"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("region/r.0.0.mca"), b"").unwrap();
        fs::write(root.join("region/r.0.0.mca.bak"), b"").unwrap();
        fs::write(root.join("DIM-1/region/r.-1.0.mca"), b"").unwrap();
        fs::write(root.join("DIM1/entities/r.0.0.mca"), b"").unwrap();
        fs::write(
            root.join("playerdata/069a79f4-44e9-4726-a5be-fca90e38aaf5.dat"),
            b"",
        )
        .unwrap();
        fs::write(root.join("playerdata/Notch.dat"), b"").unwrap();

        // the same world twice must not produce duplicate entries
        let roots = vec![root.to_path_buf(), root.join(".")];
        let haystack = collect_haystack(&roots, &[]);
        assert_eq!(haystack.len(), 4);
        let players = haystack
            .iter()
            .filter(|s| matches!(s, Scannable::Player(_)))
            .count();
        assert_eq!(players, 1);
        let nether = haystack.iter().find_map(|s| match s {
            Scannable::Region(r) if r.dimension() == "the_nether" => Some(r),
            _ => None,
        });
        assert!(nether.is_some());

        let ignored = collect_haystack(&roots, &["*DIM*".to_string()]);
        assert_eq!(ignored.len(), 2);
    }
}
