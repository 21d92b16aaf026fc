use super::normalize_path;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions of files compiled as translation units.
pub const SOURCE_EXTENSIONS: [&str; 4] = ["c", "cc", "cpp", "cxx"];

pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_string_lossy().as_ref()))
}

/// Recursively collect every compilable source file under `dir`.
///
/// Returned paths are absolute, normalized and sorted. A missing directory
/// yields an empty list.
pub fn scan_sources(dir: &Path) -> Vec<PathBuf> {
    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| is_source_file(path))
        .map(|path| normalize_path(&base, &path))
        .collect();

    sources.sort();
    sources
}
