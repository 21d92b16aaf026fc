//! Output artifact records.
//!
//! Every object file and precompiled header gets a small JSON record under
//! `.kiln/records/<os>-<mode>/` describing how it was produced: the compiler,
//! the exact argument list and a SHA-256 digest of the produced file. The
//! staleness check compares the record against the invocation about to run.
//!
//! A record is removed before its artifact is rebuilt and written again only
//! after the compiler succeeded, so an interrupted build never leaves a
//! record that vouches for a partial artifact.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub compiler: String,
    pub args: Vec<String>,
    pub hash: String,
}

impl ArtifactRecord {
    /// Describe `output` as produced by `compiler` with `args`, hashing its
    /// current content.
    pub fn capture(compiler: &str, args: &[String], output: &Path) -> Result<Self> {
        Ok(Self {
            compiler: compiler.to_string(),
            args: args.to_vec(),
            hash: hash_file(output)?,
        })
    }
}

/// A record together with the time its file was last written.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: ArtifactRecord,
    pub written: SystemTime,
}

/// SHA-256 of a file's content as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Artifact records for one build target.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    project_root: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            project_root: project_root.into(),
        }
    }

    /// Where the record for `output` lives: the output path relative to the
    /// project root (or with its root stripped, for outputs elsewhere) plus
    /// a `.json` suffix.
    pub fn record_path(&self, output: &Path) -> PathBuf {
        let relative: PathBuf = match output.strip_prefix(&self.project_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => output
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect(),
        };

        let mut name = self.dir.join(relative).into_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Load the record for `output`. Missing or malformed records are `None`.
    pub fn load(&self, output: &Path) -> Option<StoredRecord> {
        let path = self.record_path(output);
        let written = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let content = fs::read_to_string(&path).ok()?;
        let record: ArtifactRecord = serde_json::from_str(&content).ok()?;
        Some(StoredRecord { record, written })
    }

    pub fn save(&self, output: &Path, record: &ArtifactRecord) -> Result<()> {
        let path = self.record_path(output);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write record {}", path.display()))?;
        Ok(())
    }

    /// Delete the record for `output`. A record that doesn't exist is fine.
    pub fn remove(&self, output: &Path) -> Result<()> {
        let path = self.record_path(output);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    /// Hash the freshly produced `output` and store its record.
    pub fn record_output(&self, compiler: &str, args: &[String], output: &Path) -> Result<()> {
        let record = ArtifactRecord::capture(compiler, args, output)?;
        self.save(output, &record)
    }
}
