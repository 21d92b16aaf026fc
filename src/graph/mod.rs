//! Source dependency analysis.
//!
//! This module discovers translation units, extracts their `#include`
//! directives and derives a file-level dependency graph that is persisted
//! between builds.
//!
//! ## Pieces
//!
//! - [`scanner`] - Walks the source directory for compilable files
//! - [`includes`] - Lexical `#include` extraction and path resolution
//! - [`builder`] - Transitive graph construction (cycle tolerant)
//! - [`times`] - Effective modification times over the graph
//! - [`depcache`] - The on-disk dependency cache

pub mod builder;
pub mod depcache;
pub mod includes;
pub mod scanner;
pub mod times;

pub use builder::{DependencyGraph, SourceFile};
pub use includes::{IncludeDirective, resolve_includes, scan_includes};
pub use scanner::{is_source_file, scan_sources};

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Last modification time of `path`, or `None` if it can't be read.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Make `path` absolute (relative to `base`) and lexically normalize it.
///
/// `.` components are dropped and `..` pops the previous component. Symlinks
/// are not resolved, so two spellings of the same file compare equal as long
/// as they normalize to the same text.
pub fn normalize_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}
