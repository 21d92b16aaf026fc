//! Compiler invocation scheduling.
//!
//! Parallel mode submits every invocation to a rayon pool sized
//! `min(jobs, invocations)`. Workers send `(index, result)` over a channel
//! and the calling thread keeps a reorder buffer, so the `(i/N) file` lines
//! and compiler output appear in submission order whatever the completion
//! order. Every submitted invocation runs to completion.
//!
//! Sequential mode runs one invocation at a time with the compiler writing
//! straight to the console and stops at the first failure.

use super::invocation::CompilerInvocation;
use crate::process::{DiagnosticPatterns, ProcessRunner};
use crate::ui;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::mpsc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileResult {
    pub exit_code: i32,
    pub error_count: usize,
    pub warning_count: usize,
    /// Captured compiler output. Empty in sequential mode.
    pub output: String,
}

impl CompileResult {
    pub fn is_failure(&self) -> bool {
        self.exit_code != 0 || self.error_count > 0
    }
}

pub struct Scheduler<'a> {
    runner: &'a dyn ProcessRunner,
    patterns: &'a DiagnosticPatterns,
    root: &'a Path,
    verbose: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        patterns: &'a DiagnosticPatterns,
        root: &'a Path,
        verbose: bool,
    ) -> Self {
        Self {
            runner,
            patterns,
            root,
            verbose,
        }
    }

    /// Run `invocations` with at most `jobs` at once. `jobs <= 1` means
    /// sequential.
    ///
    /// Results come back in submission order. In sequential mode the list
    /// ends at the first failure.
    pub fn run(&self, invocations: &[CompilerInvocation], jobs: usize) -> Result<Vec<CompileResult>> {
        if invocations.is_empty() {
            return Ok(Vec::new());
        }
        if jobs <= 1 {
            self.run_sequential(invocations)
        } else {
            self.run_parallel(invocations, jobs)
        }
    }

    fn progress_line(&self, index: usize, total: usize, invocation: &CompilerInvocation) -> String {
        let width = total.to_string().len();
        format!(
            "({:>width$}/{}) {}",
            index + 1,
            total,
            ui::display_path(&invocation.input, self.root),
            width = width
        )
    }

    fn run_sequential(&self, invocations: &[CompilerInvocation]) -> Result<Vec<CompileResult>> {
        let total = invocations.len();
        let mut results = Vec::with_capacity(total);

        for (index, invocation) in invocations.iter().enumerate() {
            println!("{}", self.progress_line(index, total, invocation));
            if self.verbose {
                ui::print_command(&invocation.command_line());
            }

            let output = self
                .runner
                .run(&invocation.compiler, &invocation.args, false)
                .with_context(|| format!("Failed to run compiler for {}", invocation.input.display()))?;
            let result = CompileResult {
                exit_code: output.exit_code,
                ..Default::default()
            };
            let failed = result.is_failure();
            results.push(result);
            if failed {
                break;
            }
        }

        Ok(results)
    }

    fn compile_captured(&self, invocation: &CompilerInvocation) -> Result<CompileResult> {
        let output = self
            .runner
            .run(&invocation.compiler, &invocation.args, true)
            .with_context(|| format!("Failed to run compiler for {}", invocation.input.display()))?;
        let text = output.combined();
        let (error_count, warning_count) = self.patterns.count(&text);
        Ok(CompileResult {
            exit_code: output.exit_code,
            error_count,
            warning_count,
            output: text,
        })
    }

    fn run_parallel(&self, invocations: &[CompilerInvocation], jobs: usize) -> Result<Vec<CompileResult>> {
        let total = invocations.len();
        let workers = jobs.min(total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("Failed to start compiler worker pool")?;

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message("Compiling...");

        let (tx, rx) = mpsc::channel::<(usize, Result<CompileResult>)>();

        let ordered = pool.in_place_scope(|scope| {
            for (index, invocation) in invocations.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = self.compile_captured(invocation);
                    // receiver outlives the scope
                    let _ = tx.send((index, result));
                });
            }
            drop(tx);

            let mut slots: Vec<Option<Result<CompileResult>>> = (0..total).map(|_| None).collect();
            let mut ordered: Vec<Result<CompileResult>> = Vec::with_capacity(total);

            for (index, result) in rx {
                pb.inc(1);
                slots[index] = Some(result);

                while ordered.len() < total {
                    let next = ordered.len();
                    let Some(result) = slots[next].take() else {
                        break;
                    };
                    pb.suspend(|| {
                        println!("{}", self.progress_line(next, total, &invocations[next]));
                        if self.verbose {
                            ui::print_command(&invocations[next].command_line());
                        }
                        if let Ok(r) = &result
                            && !r.output.is_empty()
                        {
                            print!("{}", r.output);
                        }
                    });
                    ordered.push(result);
                }
            }
            ordered
        });

        pb.finish_and_clear();
        ordered.into_iter().collect()
    }
}

/// Print the outcome of a compile phase and turn it into an exit code.
///
/// Failure in parallel mode is exit code 1; sequential mode hands back the
/// failing compiler's own exit code.
pub fn report_results(results: &[CompileResult], sequential: bool) -> i32 {
    let errors: usize = results.iter().map(|r| r.error_count).sum();
    let warnings: usize = results.iter().map(|r| r.warning_count).sum();

    let Some(failed) = results.iter().find(|r| r.is_failure()) else {
        if warnings > 0 {
            ui::report_warning("kiln", &format!("{} warning(s) emitted by compiler", warnings));
        }
        return 0;
    };

    let message = match (errors, warnings) {
        (0, _) => format!("compilation failed with exit code {}", failed.exit_code),
        (e, 0) => format!("compilation failed with {} error(s)", e),
        (e, w) => format!("compilation failed with {} error(s) and {} warning(s)", e, w),
    };
    ui::report_error("kiln", &message);

    if sequential && failed.exit_code != 0 {
        failed.exit_code
    } else {
        1
    }
}
