use super::includes::resolve_includes;
use super::modified_time;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One node of the include graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Resolved direct includes, in order of first appearance.
    pub dependencies: Vec<PathBuf>,
    /// On-disk modification time, `None` if the file is gone.
    pub last_modified: Option<SystemTime>,
    /// Max of `last_modified` over the file and everything it reaches.
    /// Filled in by [`DependencyGraph::compute_effective_times`].
    pub effective: Option<SystemTime>,
}

impl SourceFile {
    pub fn new(path: PathBuf, dependencies: Vec<PathBuf>) -> Self {
        let last_modified = modified_time(&path);
        Self {
            path,
            dependencies,
            last_modified,
            effective: None,
        }
    }
}

/// File-level include graph keyed by normalized absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub(crate) files: BTreeMap<PathBuf, SourceFile>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn insert(&mut self, file: SourceFile) {
        self.files.insert(file.path.clone(), file);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn dependencies(&self, path: &Path) -> &[PathBuf] {
        self.files
            .get(path)
            .map(|f| f.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Build the transitive include closure of `roots` from scratch.
    pub fn build(roots: &[PathBuf], search_dirs: &[PathBuf]) -> Self {
        Self::refresh(roots, search_dirs, Self::new())
    }

    /// Extend `carried` (entries known to still be valid) into the full
    /// closure of `roots`.
    ///
    /// Carried entries are not re-scanned but their dependencies are still
    /// walked. Every other file reached gets a placeholder entry before its
    /// includes are resolved, so include cycles terminate. Files that can't
    /// be read end up with no dependencies. Entries unreachable from `roots`
    /// are dropped at the end.
    pub fn refresh(roots: &[PathBuf], search_dirs: &[PathBuf], carried: Self) -> Self {
        let mut graph = carried;
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut pending: VecDeque<PathBuf> = roots.iter().cloned().collect();

        while let Some(path) = pending.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }

            if let Some(existing) = graph.files.get_mut(&path) {
                existing.last_modified = modified_time(&path);
                existing.effective = None;
                pending.extend(existing.dependencies.iter().cloned());
                continue;
            }

            graph.insert(SourceFile::new(path.clone(), Vec::new()));
            let dependencies = resolve_includes(&path, search_dirs).unwrap_or_default();
            pending.extend(dependencies.iter().cloned());

            if let Some(entry) = graph.files.get_mut(&path) {
                entry.dependencies = dependencies;
            }
        }

        graph.retain_reachable(roots);
        graph
    }

    /// Drop every entry that can't be reached from `roots`.
    pub fn retain_reachable(&mut self, roots: &[PathBuf]) {
        let mut reachable: HashSet<PathBuf> = HashSet::new();
        let mut stack: Vec<&Path> = roots.iter().map(PathBuf::as_path).collect();

        while let Some(path) = stack.pop() {
            if !self.files.contains_key(path) || !reachable.insert(path.to_path_buf()) {
                continue;
            }
            stack.extend(self.dependencies(path).iter().map(PathBuf::as_path));
        }

        self.files.retain(|path, _| reachable.contains(path));
    }
}
