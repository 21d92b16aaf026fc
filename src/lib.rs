//! # kiln - Incremental C/C++ builds
//!
//! kiln compiles a C/C++ source tree into one executable, rebuilding only
//! what changed since the last run.
//!
//! ## Features
//!
//! - **Include-aware staleness**: `#include` graphs are scanned and cached,
//!   so touching a header recompiles exactly the files that reach it
//! - **Artifact records**: compiler, arguments and content hash are stored
//!   per object, so flag changes trigger rebuilds
//! - **Parallel compilation** with ordered, readable output
//! - **Rules**: named shell actions before building, before linking and
//!   after building, with dependencies between them
//!
//! ## Quick Start
//!
//! ```bash
//! kiln new myapp
//! cd myapp
//! kiln run
//! ```
//!
//! ## Module Organization
//!
//! - [`graph`] - Source scanning, include resolution, dependency cache
//! - [`build`] - Staleness, scheduling, rules and the build pipeline
//! - [`cache`] - Per-artifact build records
//! - [`config`] - `kiln.toml` parsing and resolution
//! - [`toolchain`] - gcc/clang driver selection

/// Compilation pipeline, scheduler and rule engine.
pub mod build;

/// Artifact records (compiler, arguments, content hash).
pub mod cache;

/// Configuration file parsing (`kiln.toml`).
pub mod config;

/// Source dependency analysis.
pub mod graph;

/// External process execution.
pub mod process;

/// Project scaffolding.
pub mod templates;

/// Compiler driver selection.
pub mod toolchain;

/// Console reporting helpers.
pub mod ui;
