//! Compiler selection
//!
//! The toolchain is always one gcc-compatible family. A `compiler` value
//! from `kiln.toml` picks the family and an optional version suffix; the
//! driver paths can be overridden per language.

pub mod types;

pub use types::{CompilerType, Toolchain, ToolchainError};

use std::path::{Path, PathBuf};

impl Toolchain {
    /// Parse `gcc`, `g++`, `clang`, `clang++` or any of those with a `-<N>`
    /// version suffix.
    pub fn parse(compiler: &str) -> Result<Self, ToolchainError> {
        let unknown = || ToolchainError::UnknownCompiler(compiler.to_string());

        let (family, version) = match compiler.rsplit_once('-') {
            Some((family, suffix)) => {
                let version: u32 = suffix.parse().map_err(|_| unknown())?;
                (family, Some(version))
            }
            None => (compiler, None),
        };

        let compiler_type = match family {
            "gcc" | "g++" => CompilerType::GCC,
            "clang" | "clang++" => CompilerType::Clang,
            _ => return Err(unknown()),
        };

        let (cc_path, cxx_path) = compiler_type.drivers(version);
        Ok(Self {
            compiler_type,
            version,
            cc_path,
            cxx_path,
        })
    }

    /// Resolve the toolchain from configuration values.
    pub fn from_config(
        compiler: &str,
        c_compiler_path: Option<&Path>,
        cpp_compiler_path: Option<&Path>,
    ) -> Result<Self, ToolchainError> {
        let mut toolchain = Self::parse(compiler)?;
        if let Some(path) = c_compiler_path {
            toolchain.cc_path = path.to_path_buf();
        }
        if let Some(path) = cpp_compiler_path {
            toolchain.cxx_path = path.to_path_buf();
        }
        Ok(toolchain)
    }

    /// Get the appropriate compiler for a source or header language
    pub fn compiler_for(&self, is_c: bool) -> &Path {
        if is_c { &self.cc_path } else { &self.cxx_path }
    }

    /// Where the precompiled form of `header` is written.
    ///
    /// gcc looks for `<header>.gch` next to the header on its own; clang
    /// needs an explicit `-include-pch`, so its output goes to the
    /// intermediate directory.
    pub fn pch_output(&self, header: &Path, int_dir: &Path) -> PathBuf {
        match self.compiler_type {
            CompilerType::GCC => {
                let mut name = header.as_os_str().to_os_string();
                name.push(".gch");
                PathBuf::from(name)
            }
            CompilerType::Clang => {
                let mut name = header
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_default();
                name.push(".pch");
                int_dir.join(name)
            }
        }
    }

    /// Arguments that compile `header` into `output`, appended after the
    /// shared compile flags.
    pub fn pch_args(&self, header: &Path, output: &Path, is_c: bool) -> Vec<String> {
        let language = if is_c { "c-header" } else { "c++-header" };
        vec![
            "-o".to_string(),
            output.to_string_lossy().to_string(),
            "-x".to_string(),
            language.to_string(),
            header.to_string_lossy().to_string(),
        ]
    }

    /// Arguments a translation unit needs to use the precompiled header.
    pub fn pch_use_args(&self, pch: &Path) -> Vec<String> {
        match self.compiler_type {
            CompilerType::GCC => Vec::new(),
            CompilerType::Clang => vec![
                "-include-pch".to_string(),
                pch.to_string_lossy().to_string(),
            ],
        }
    }
}
