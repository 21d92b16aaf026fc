//! On-disk dependency cache.
//!
//! A JSON object mapping each file path to its direct dependency paths.
//! Anything unreadable or malformed is treated as an empty cache.

use super::builder::{DependencyGraph, SourceFile};
use super::modified_time;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Raw cache contents, `None` if the file is missing or malformed.
pub fn read_dependency_cache(path: &Path) -> Option<BTreeMap<PathBuf, Vec<PathBuf>>> {
    let content = fs::read_to_string(path).ok()?;
    let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(&content).ok()?;

    Some(
        raw.into_iter()
            .map(|(file, deps)| {
                (
                    PathBuf::from(file),
                    deps.into_iter().map(PathBuf::from).collect(),
                )
            })
            .collect(),
    )
}

/// Load the entries of the cache that can be carried into this build.
///
/// Everything is discarded when the configuration is newer than the cache.
/// Otherwise an entry survives if the file and all of its dependencies still
/// exist and the file was last modified before the cache was written.
pub fn load_dependency_cache(path: &Path, config_modified: Option<SystemTime>) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    let Some(cache_time) = modified_time(path) else {
        return graph;
    };
    if config_modified.is_some_and(|config| config > cache_time) {
        return graph;
    }
    let Some(entries) = read_dependency_cache(path) else {
        return graph;
    };

    for (file, dependencies) in entries {
        let Some(file_time) = modified_time(&file) else {
            continue;
        };
        if file_time >= cache_time || !dependencies.iter().all(|d| d.exists()) {
            continue;
        }
        graph.insert(SourceFile::new(file, dependencies));
    }

    graph
}

/// Persist `graph`, creating parent directories as needed.
pub fn write_dependency_cache(path: &Path, graph: &DependencyGraph) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let raw: BTreeMap<String, Vec<String>> = graph
        .iter()
        .map(|file| {
            (
                file.path.to_string_lossy().into_owned(),
                file.dependencies
                    .iter()
                    .map(|d| d.to_string_lossy().into_owned())
                    .collect(),
            )
        })
        .collect();

    let content = serde_json::to_string_pretty(&raw)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write dependency cache {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn age(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    fn project() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.c");
        let util = dir.path().join("util.h");
        fs::write(&main, "#include \"util.h\"\n").unwrap();
        fs::write(&util, "").unwrap();
        age(&main, 100);
        age(&util, 100);
        (dir, main, util)
    }

    #[test]
    fn test_round_trip() {
        let (dir, main, util) = project();
        let graph = DependencyGraph::build(std::slice::from_ref(&main), &[]);
        let cache = dir.path().join(".kiln/dependencies/linux-debug.json");
        write_dependency_cache(&cache, &graph).unwrap();

        let raw = read_dependency_cache(&cache).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[&main], vec![util.clone()]);
        assert!(raw[&util].is_empty());

        let loaded = load_dependency_cache(&cache, None);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dependencies(&main), &[util]);
    }

    #[test]
    fn test_malformed_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("deps.json");
        fs::write(&cache, "{ not json").unwrap();
        assert!(read_dependency_cache(&cache).is_none());
        assert!(load_dependency_cache(&cache, None).is_empty());
    }

    #[test]
    fn test_newer_config_invalidates_everything() {
        let (dir, main, _) = project();
        let graph = DependencyGraph::build(std::slice::from_ref(&main), &[]);
        let cache = dir.path().join("deps.json");
        write_dependency_cache(&cache, &graph).unwrap();
        age(&cache, 50);

        let config_time = SystemTime::now();
        assert!(load_dependency_cache(&cache, Some(config_time)).is_empty());
    }

    #[test]
    fn test_stale_and_dangling_entries_are_dropped() {
        let (dir, main, util) = project();
        let graph = DependencyGraph::build(std::slice::from_ref(&main), &[]);
        let cache = dir.path().join("deps.json");
        write_dependency_cache(&cache, &graph).unwrap();
        age(&cache, 50);

        // main.c edited after the cache was written
        fs::write(&main, "int main() {}\n").unwrap();
        let loaded = load_dependency_cache(&cache, None);
        assert!(!loaded.contains(&main));
        assert!(loaded.contains(&util));

        fs::remove_file(&util).unwrap();
        age(&main, 100);
        let loaded = load_dependency_cache(&cache, None);
        assert!(loaded.is_empty());
    }
}
