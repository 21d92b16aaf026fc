//! External process execution.
//!
//! Compilers, the linker and rule commands all go through [`ProcessRunner`],
//! so the build engine can be driven by a fake in tests.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

static DEFAULT_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&regex::escape("error:")).expect("invalid error regex"));
static DEFAULT_WARNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&regex::escape("warning:")).expect("invalid warning regex"));

/// Exit status and captured text of one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, as shown to the user.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`. Without `capture` the child inherits the
    /// console and the returned text is empty.
    fn run(&self, program: &Path, args: &[String], capture: bool) -> Result<ProcessOutput>;

    /// Run a command line through the platform shell.
    fn run_shell(&self, command: &str, capture: bool) -> Result<ProcessOutput>;
}

/// Runs real processes with the project root as working directory.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    working_dir: PathBuf,
}

impl SystemRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    fn execute(&self, mut command: Command, display: &str, capture: bool) -> Result<ProcessOutput> {
        command.current_dir(&self.working_dir);

        if capture {
            let output = command
                .stdin(Stdio::null())
                .output()
                .with_context(|| format!("Failed to execute '{}'", display))?;
            Ok(ProcessOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let status = command
                .status()
                .with_context(|| format!("Failed to execute '{}'", display))?;
            Ok(ProcessOutput {
                exit_code: status.code().unwrap_or(-1),
                ..Default::default()
            })
        }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String], capture: bool) -> Result<ProcessOutput> {
        let mut command = Command::new(program);
        command.args(args);
        self.execute(command, &program.to_string_lossy(), capture)
    }

    fn run_shell(&self, script: &str, capture: bool) -> Result<ProcessOutput> {
        let command = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", script]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", script]);
            c
        };
        self.execute(command, script, capture)
    }
}

/// Patterns whose matches in compiler output are counted as errors and
/// warnings. Counting is a text heuristic, not a diagnostic protocol.
#[derive(Debug, Clone)]
pub struct DiagnosticPatterns {
    errors: Vec<Regex>,
    warnings: Vec<Regex>,
}

impl Default for DiagnosticPatterns {
    fn default() -> Self {
        Self {
            errors: vec![DEFAULT_ERROR.clone()],
            warnings: vec![DEFAULT_WARNING.clone()],
        }
    }
}

impl DiagnosticPatterns {
    /// Compile configured patterns. An empty list keeps the default for that kind.
    pub fn new(errors: &[String], warnings: &[String]) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            errors: compile_patterns(errors, "diagnostics.error_patterns")?
                .unwrap_or(defaults.errors),
            warnings: compile_patterns(warnings, "diagnostics.warning_patterns")?
                .unwrap_or(defaults.warnings),
        })
    }

    /// `(errors, warnings)` found in `text`.
    pub fn count(&self, text: &str) -> (usize, usize) {
        let count = |patterns: &[Regex]| -> usize {
            patterns.iter().map(|p| p.find_iter(text).count()).sum()
        };
        (count(&self.errors), count(&self.warnings))
    }
}

fn compile_patterns(patterns: &[String], field: &str) -> Result<Option<Vec<Regex>>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("Invalid regex '{}' in '{}'", p, field)))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_count_literals() {
        let patterns = DiagnosticPatterns::default();
        let text = "main.c:3:1: error: expected ';'\n\
                    main.c:5:9: warning: unused variable 'x'\n\
                    main.c:7:1: error: unknown type name 'foo'\n";
        assert_eq!(patterns.count(text), (2, 1));
        assert_eq!(patterns.count(""), (0, 0));
    }

    #[test]
    fn test_custom_patterns() {
        let patterns = DiagnosticPatterns::new(&["(?i)fehler:".to_string()], &[]).unwrap();
        assert_eq!(patterns.count("a.c:1: Fehler: x\na.c:2: warning: y\n"), (1, 1));
    }

    #[test]
    fn test_invalid_pattern_names_field() {
        let err = DiagnosticPatterns::new(&[], &["(".to_string()]).unwrap_err();
        assert!(format!("{:#}", err).contains("diagnostics.warning_patterns"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_shell_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::new(dir.path());
        let out = runner.run_shell("echo hello; echo oops >&2; exit 3", true).unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }
}
