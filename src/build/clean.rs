//! Build artifact cleanup.
//!
//! `kiln clean` removes every target's outputs (`bin/`), the dependency
//! cache and artifact records (`.kiln/`) and `compile_commands.json`.
//! gcc precompiled headers live next to their header and are removed too.

use crate::config::Project;
use crate::toolchain::CompilerType;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Generated files outside `bin/` and `.kiln/`. clang precompiled headers
/// live under `bin/` and go with it.
fn generated_files(project: &Project) -> Vec<PathBuf> {
    let mut files = vec![project.root.join("compile_commands.json")];
    if project.build.toolchain.compiler_type == CompilerType::GCC {
        for header in [
            &project.build.c_precompiled_header,
            &project.build.cpp_precompiled_header,
        ]
        .into_iter()
        .flatten()
        {
            files.push(project.build.toolchain.pch_output(header, Path::new("")));
        }
    }
    files
}

pub fn clean(project: &Project) -> Result<()> {
    let mut cleaned = false;
    let root = &project.root;

    // 1. Output and cache directories
    for dir in ["bin", ".kiln"] {
        let path = root.join(dir);
        if path.exists() {
            fs::remove_dir_all(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            println!("{} Removed {}/", "🗑️".red(), dir);
            cleaned = true;
        }
    }

    // 2. Generated files next to sources
    for file in generated_files(project) {
        if file.is_file() {
            fs::remove_file(&file)
                .with_context(|| format!("Failed to remove {}", file.display()))?;
            cleaned = true;
        }
    }

    if cleaned {
        println!("{} Clean complete.", "✓".green());
    } else {
        println!("{} Nothing to clean", "!".yellow());
    }
    Ok(())
}
