//! Project configuration (`kiln.toml`).
//!
//! The file is parsed once at startup and flattened into a [`Project`] for
//! one build target. Layering order is `[build]`, then `[target.<os>]`, then
//! `[profile.<mode>]`; a later layer replaces any field it sets, lists
//! included.

use crate::build::rules::{Rule, RuleSet, RuleVariant};
use crate::graph::normalize_path;
use crate::process::DiagnosticPatterns;
use crate::toolchain::Toolchain;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const CONFIG_FILE: &str = "kiln.toml";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct KilnConfig {
    pub package: PackageConfig,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub target: BTreeMap<String, BuildSection>,
    #[serde(default)]
    pub profile: BTreeMap<String, BuildSection>,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub error_patterns: Vec<String>,
    #[serde(default)]
    pub warning_patterns: Vec<String>,
}

/// `optimization = 2` and `optimization = "s"` are both accepted.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum OptLevel {
    Level(u8),
    Named(String),
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptLevel::Level(n) => write!(f, "{}", n),
            OptLevel::Named(s) => f.write_str(s),
        }
    }
}

/// One layer of build settings. Every field is optional so layers can be
/// stacked.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    pub compiler: Option<String>,
    pub c_compiler_path: Option<PathBuf>,
    pub cpp_compiler_path: Option<PathBuf>,
    pub c_standard: Option<String>,
    pub cpp_standard: Option<String>,
    pub c_compiler_flags: Option<Vec<String>>,
    pub cpp_compiler_flags: Option<Vec<String>>,
    pub link_flags: Option<Vec<String>>,
    pub libraries: Option<Vec<String>>,
    pub include_paths: Option<Vec<PathBuf>>,
    pub defines: Option<Vec<String>>,
    pub warnings: Option<Vec<String>>,
    pub optimization: Option<OptLevel>,
    pub source_directory: Option<PathBuf>,
    pub excluded_sources: Option<Vec<PathBuf>>,
    pub prebuild_rules: Option<Vec<String>>,
    pub prelink_rules: Option<Vec<String>>,
    pub postbuild_rules: Option<Vec<String>>,
    pub link_dependencies: Option<Vec<String>>,
    pub c_precompiled_header: Option<PathBuf>,
    pub cpp_precompiled_header: Option<PathBuf>,
    pub emit_compile_commands: Option<bool>,
    pub output_name: Option<String>,
    pub run_args: Option<Vec<String>>,
}

macro_rules! overlay_fields {
    ($dst:expr, $src:expr; $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = &$src.$field {
                $dst.$field = Some(value.clone());
            }
        )*
    };
}

impl BuildSection {
    /// Apply `other` on top of `self`.
    pub fn overlay(&mut self, other: &BuildSection) {
        overlay_fields!(self, other;
            compiler, c_compiler_path, cpp_compiler_path, c_standard, cpp_standard,
            c_compiler_flags, cpp_compiler_flags, link_flags, libraries, include_paths,
            defines, warnings, optimization, source_directory, excluded_sources,
            prebuild_rules, prelink_rules, postbuild_rules, link_dependencies,
            c_precompiled_header, cpp_precompiled_header, emit_compile_commands,
            output_name, run_args,
        );
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RuleVariantConfig {
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub command: Option<String>,
    pub commands: Option<Vec<String>>,
    #[serde(default)]
    pub is_file: bool,
}

/// `[rules.<name>]`: either the variant fields directly, or a `windows`
/// and a `unix` table.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub command: Option<String>,
    pub commands: Option<Vec<String>>,
    #[serde(default)]
    pub is_file: bool,
    pub windows: Option<RuleVariantConfig>,
    pub unix: Option<RuleVariantConfig>,
}

impl RuleConfig {
    fn shared(&self) -> RuleVariantConfig {
        RuleVariantConfig {
            dependencies: self.dependencies.clone(),
            command: self.command.clone(),
            commands: self.commands.clone(),
            is_file: self.is_file,
        }
    }
}

// --- Build target ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Debug,
    Release,
}

impl BuildMode {
    pub fn name(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Release => "release",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOs {
    Linux,
    Windows,
    MacOs,
}

impl TargetOs {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            TargetOs::Windows
        } else if cfg!(target_os = "macos") {
            TargetOs::MacOs
        } else {
            TargetOs::Linux
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linux" => Some(TargetOs::Linux),
            "windows" => Some(TargetOs::Windows),
            "macos" => Some(TargetOs::MacOs),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetOs::Linux => "linux",
            TargetOs::Windows => "windows",
            TargetOs::MacOs => "macos",
        }
    }

    pub fn executable_extension(&self) -> &'static str {
        match self {
            TargetOs::Windows => ".exe",
            _ => "",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, TargetOs::Windows)
    }

    fn default_compiler(&self) -> &'static str {
        match self {
            TargetOs::MacOs => "clang",
            _ => "gcc",
        }
    }
}

/// An OS + mode combination, e.g. `linux-debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildTarget {
    pub os: TargetOs,
    pub mode: BuildMode,
}

impl BuildTarget {
    pub fn host(mode: BuildMode) -> Self {
        Self {
            os: TargetOs::current(),
            mode,
        }
    }

    pub fn config_name(&self) -> String {
        format!("{}-{}", self.os.name(), self.mode.name())
    }
}

// --- Resolved configuration ---

/// Flat build settings for one target, paths absolute.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub toolchain: Toolchain,
    pub c_standard: String,
    pub cpp_standard: String,
    pub c_compiler_flags: Vec<String>,
    pub cpp_compiler_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub libraries: Vec<String>,
    pub include_paths: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub warnings: Vec<String>,
    pub optimization: String,
    pub source_directory: PathBuf,
    pub excluded_sources: Vec<PathBuf>,
    pub prebuild_rules: Vec<String>,
    pub prelink_rules: Vec<String>,
    pub postbuild_rules: Vec<String>,
    pub link_dependencies: Vec<String>,
    pub c_precompiled_header: Option<PathBuf>,
    pub cpp_precompiled_header: Option<PathBuf>,
    pub emit_compile_commands: bool,
    pub output_name: String,
    pub run_args: Vec<String>,
}

impl BuildConfig {
    fn resolve(section: BuildSection, package: &str, root: &Path, target: BuildTarget) -> Result<Self> {
        let absolute = |p: &Path| normalize_path(root, p);
        let absolute_all = |paths: Option<Vec<PathBuf>>| -> Vec<PathBuf> {
            paths.unwrap_or_default().iter().map(|p| absolute(p)).collect()
        };

        let compiler = section
            .compiler
            .unwrap_or_else(|| target.os.default_compiler().to_string());
        let toolchain = Toolchain::from_config(
            &compiler,
            section.c_compiler_path.as_deref(),
            section.cpp_compiler_path.as_deref(),
        )?;

        let optimization = match section.optimization {
            Some(level) => level.to_string(),
            None => match target.mode {
                BuildMode::Debug => "0".to_string(),
                BuildMode::Release => "3".to_string(),
            },
        };

        Ok(Self {
            toolchain,
            c_standard: section.c_standard.unwrap_or_else(|| "c11".to_string()),
            cpp_standard: section.cpp_standard.unwrap_or_else(|| "c++20".to_string()),
            c_compiler_flags: section.c_compiler_flags.unwrap_or_default(),
            cpp_compiler_flags: section.cpp_compiler_flags.unwrap_or_default(),
            link_flags: section.link_flags.unwrap_or_default(),
            libraries: section.libraries.unwrap_or_default(),
            include_paths: absolute_all(section.include_paths),
            defines: section.defines.unwrap_or_default(),
            warnings: section.warnings.unwrap_or_default(),
            optimization,
            source_directory: absolute(
                section
                    .source_directory
                    .as_deref()
                    .unwrap_or_else(|| Path::new("src")),
            ),
            excluded_sources: absolute_all(section.excluded_sources),
            prebuild_rules: section.prebuild_rules.unwrap_or_default(),
            prelink_rules: section.prelink_rules.unwrap_or_default(),
            postbuild_rules: section.postbuild_rules.unwrap_or_default(),
            link_dependencies: section.link_dependencies.unwrap_or_default(),
            c_precompiled_header: section.c_precompiled_header.as_deref().map(absolute),
            cpp_precompiled_header: section.cpp_precompiled_header.as_deref().map(absolute),
            emit_compile_commands: section.emit_compile_commands.unwrap_or(false),
            output_name: section.output_name.unwrap_or_else(|| package.to_string()),
            run_args: section.run_args.unwrap_or_default(),
        })
    }
}

/// Everything one build needs to know about the project.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub name: String,
    pub version: Option<String>,
    pub config_path: PathBuf,
    pub config_modified: SystemTime,
    pub target: BuildTarget,
    pub build: BuildConfig,
    pub rules: RuleSet,
    pub diagnostics: DiagnosticPatterns,
}

impl Project {
    /// Load `kiln.toml` (or `config_path`) for `target`.
    pub fn load(root: &Path, config_path: Option<&Path>, target: BuildTarget) -> Result<Self> {
        let config_path = normalize_path(root, config_path.unwrap_or_else(|| Path::new(CONFIG_FILE)));
        if !config_path.exists() {
            bail!(
                "{} not found.\n\n\
                💡 Tip: Run 'kiln new <name>' to create a new project.",
                config_path.display()
            );
        }

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config_modified = fs::metadata(&config_path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", config_path.display()))?;

        Self::parse(root, &config_path, &text, config_modified, target)
    }

    /// Parse configuration text. `config_path` is only used for messages and
    /// the returned value.
    pub fn parse(
        root: &Path,
        config_path: &Path,
        text: &str,
        config_modified: SystemTime,
        target: BuildTarget,
    ) -> Result<Self> {
        let config: KilnConfig = toml::from_str(text)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        if config.package.name.trim().is_empty() {
            bail!("'package.name' must not be empty");
        }

        let mut section = config.build.clone();
        for name in config.target.keys() {
            if TargetOs::parse(name).is_none() {
                bail!("unknown target '{}' in [target] (expected linux, windows or macos)", name);
            }
        }
        if let Some(layer) = config.target.get(target.os.name()) {
            section.overlay(layer);
        }
        for name in config.profile.keys() {
            if name != "debug" && name != "release" {
                bail!("unknown profile '{}' in [profile] (expected debug or release)", name);
            }
        }
        if let Some(layer) = config.profile.get(target.mode.name()) {
            section.overlay(layer);
        }

        let build = BuildConfig::resolve(section, &config.package.name, root, target)?;

        let mut rules = RuleSet::new();
        for (name, rule) in &config.rules {
            rules.insert(rule_from_config(name, rule)?);
        }

        let diagnostics = DiagnosticPatterns::new(
            &config.diagnostics.error_patterns,
            &config.diagnostics.warning_patterns,
        )?;

        Ok(Self {
            root: root.to_path_buf(),
            name: config.package.name,
            version: config.package.version,
            config_path: config_path.to_path_buf(),
            config_modified,
            target,
            build,
            rules,
            diagnostics,
        })
    }
}

fn variant_from_config(name: &str, field: &str, cfg: &RuleVariantConfig) -> Result<RuleVariant> {
    let commands = match (&cfg.command, &cfg.commands) {
        (Some(_), Some(_)) => bail!(
            "rule '{}'{}: only one of 'command' or 'commands' may be set",
            name,
            field
        ),
        (Some(command), None) => vec![command.clone()],
        (None, Some(commands)) => commands.clone(),
        (None, None) => Vec::new(),
    };
    Ok(RuleVariant {
        dependencies: cfg.dependencies.clone(),
        commands,
        is_file: cfg.is_file,
    })
}

fn rule_from_config(name: &str, cfg: &RuleConfig) -> Result<Rule> {
    match (&cfg.windows, &cfg.unix) {
        (None, None) => Ok(Rule::shared(name, variant_from_config(name, "", &cfg.shared())?)),
        (Some(windows), Some(unix)) => {
            if cfg.command.is_some()
                || cfg.commands.is_some()
                || !cfg.dependencies.is_empty()
                || cfg.is_file
            {
                bail!(
                    "rule '{}': shared fields can't be combined with 'windows'/'unix' tables",
                    name
                );
            }
            Ok(Rule {
                name: name.to_string(),
                windows: variant_from_config(name, ".windows", windows)?,
                unix: variant_from_config(name, ".unix", unix)?,
            })
        }
        (Some(_), None) => bail!("rule '{}': 'windows' is set but 'unix' is missing", name),
        (None, Some(_)) => bail!("rule '{}': 'unix' is set but 'windows' is missing", name),
    }
}
