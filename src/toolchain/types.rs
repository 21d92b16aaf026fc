use std::path::PathBuf;
use thiserror::Error;

/// Supported compiler families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum CompilerType {
    /// GNU Compiler Collection (gcc / g++)
    GCC,
    /// Clang/LLVM (clang / clang++)
    Clang,
}

impl CompilerType {
    pub fn name(&self) -> &'static str {
        match self {
            CompilerType::GCC => "gcc",
            CompilerType::Clang => "clang",
        }
    }

    fn c_driver(&self) -> &'static str {
        match self {
            CompilerType::GCC => "gcc",
            CompilerType::Clang => "clang",
        }
    }

    fn cxx_driver(&self) -> &'static str {
        match self {
            CompilerType::GCC => "g++",
            CompilerType::Clang => "clang++",
        }
    }

    pub(crate) fn drivers(&self, version: Option<u32>) -> (PathBuf, PathBuf) {
        match version {
            Some(v) => (
                PathBuf::from(format!("{}-{}", self.c_driver(), v)),
                PathBuf::from(format!("{}-{}", self.cxx_driver(), v)),
            ),
            None => (
                PathBuf::from(self.c_driver()),
                PathBuf::from(self.cxx_driver()),
            ),
        }
    }
}

/// The compiler pair used for one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub compiler_type: CompilerType,

    /// Major version suffix, e.g. `13` for `gcc-13`
    pub version: Option<u32>,

    /// C compiler driver
    pub cc_path: PathBuf,

    /// C++ compiler driver, also used for linking C++ programs
    pub cxx_path: PathBuf,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolchainError {
    #[error("invalid value '{0}' for field 'compiler' (expected gcc, clang, gcc-<N> or clang-<N>)")]
    UnknownCompiler(String),
}
