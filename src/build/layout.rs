use crate::config::Project;
use std::path::{Path, PathBuf};

/// Where one target's outputs and cached state live.
#[derive(Debug, Clone)]
pub struct BuildLayout {
    pub root: PathBuf,
    /// `bin/<os>-<mode>/`
    pub bin_dir: PathBuf,
    /// `bin/<os>-<mode>/int/`, objects and clang PCH files
    pub int_dir: PathBuf,
    /// `.kiln/`
    pub cache_dir: PathBuf,
    pub dependency_cache: PathBuf,
    pub records_dir: PathBuf,
    pub executable: PathBuf,
    pub compile_commands: PathBuf,
}

impl BuildLayout {
    pub fn new(project: &Project) -> Self {
        let root = project.root.clone();
        let config_name = project.target.config_name();
        let bin_dir = root.join("bin").join(&config_name);
        let int_dir = bin_dir.join("int");
        let cache_dir = root.join(".kiln");
        let executable = bin_dir.join(format!(
            "{}{}",
            project.build.output_name,
            project.target.os.executable_extension()
        ));

        Self {
            dependency_cache: cache_dir
                .join("dependencies")
                .join(format!("{}.json", config_name)),
            records_dir: cache_dir.join("records").join(&config_name),
            compile_commands: root.join("compile_commands.json"),
            root,
            bin_dir,
            int_dir,
            cache_dir,
            executable,
        }
    }

    /// Object file for `source`: its path under the project root, mirrored
    /// into the intermediate directory with `.o` appended.
    pub fn object_path(&self, source: &Path) -> PathBuf {
        let relative: PathBuf = match source.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => source
                .components()
                .filter(|c| matches!(c, std::path::Component::Normal(_)))
                .collect(),
        };
        let mut name = self.int_dir.join(relative).into_os_string();
        name.push(".o");
        PathBuf::from(name)
    }
}
