//! The build pipeline.
//!
//! One build runs these stages in order, and the first nonzero exit code
//! stops everything after it:
//!
//! 1. pre-build rules
//! 2. dependency graph refresh (the cache is written back every time)
//! 3. precompiled headers, then stale translation units
//! 4. pre-link rules, then link-dependency rules
//! 5. link, when something the executable depends on is newer than it
//! 6. post-build rules

use super::feedback::FeedbackAnalyzer;
use super::invocation::{CompilerInvocation, InvocationPlan, is_c_source, write_compile_commands};
use super::layout::BuildLayout;
use super::rules::RuleEngine;
use super::scheduler::{CompileResult, Scheduler, report_results};
use super::staleness::rebuild_reason;
use super::utils::link_args;
use crate::cache::RecordStore;
use crate::config::{BuildMode, Project};
use crate::graph::depcache::{load_dependency_cache, write_dependency_cache};
use crate::graph::{DependencyGraph, modified_time, scan_sources};
use crate::process::ProcessRunner;
use crate::ui;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Instant, SystemTime};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Compiler processes to run at once.
    pub jobs: usize,
    pub sequential: bool,
    /// Recompile everything regardless of timestamps and records.
    pub rebuild: bool,
    /// Relink even if the executable looks up to date.
    pub force_link: bool,
    pub verbose: bool,
    pub emit_compile_commands: bool,
    /// Extra arguments appended to every compile command.
    pub extra_args: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: thread::available_parallelism().map_or(1, |n| n.get()),
            sequential: false,
            rebuild: false,
            force_link: false,
            verbose: false,
            emit_compile_commands: false,
            extra_args: Vec::new(),
        }
    }
}

/// What a build did. `exit_code` is nonzero when a stage failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    pub exit_code: i32,
    /// Translation units compiled.
    pub compiled: usize,
    /// Precompiled headers regenerated.
    pub precompiled: usize,
    pub linked: bool,
}

impl BuildOutcome {
    fn failed(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Sources under the source directory that aren't excluded, or that live
/// under an excluded directory.
fn collect_sources(project: &Project) -> Vec<PathBuf> {
    let excluded = &project.build.excluded_sources;
    scan_sources(&project.build.source_directory)
        .into_iter()
        .filter(|source| !excluded.iter().any(|ex| source.starts_with(ex)))
        .collect()
}

fn print_hint(results: &[CompileResult]) {
    for result in results.iter().filter(|r| r.is_failure()) {
        if let Some(hint) = FeedbackAnalyzer::analyze(&result.output) {
            println!("\n{} {}", "💡 Hint:".yellow().bold(), hint);
            return;
        }
    }
}

pub fn build_project(
    project: &Project,
    options: &BuildOptions,
    runner: &dyn ProcessRunner,
) -> Result<BuildOutcome> {
    let start_time = Instant::now();
    let build = &project.build;
    let layout = BuildLayout::new(project);
    let mut outcome = BuildOutcome::default();

    println!(
        "{} Building {} ({})",
        "🔨".cyan(),
        project.name.bold(),
        project.target.config_name()
    );

    let mut rules = RuleEngine::new(
        &project.rules,
        project.target.os,
        &project.root,
        project.config_modified,
        runner,
    );

    // 1. Pre-build rules
    let prebuild = rules.run_rules("pre-build", &build.prebuild_rules, true)?;
    if !prebuild.success() {
        return Ok(outcome.failed(prebuild.exit_code));
    }

    // 2. Dependency graph
    let sources = collect_sources(project);
    if sources.is_empty() {
        ui::report_error(
            "kiln",
            &format!(
                "no source files found in {}",
                ui::display_path(&build.source_directory, &project.root)
            ),
        );
        return Ok(outcome.failed(1));
    }

    let headers: Vec<PathBuf> = [&build.c_precompiled_header, &build.cpp_precompiled_header]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    if let Some(header) = headers.iter().find(|h| !h.is_file()) {
        ui::report_error(
            &ui::display_path(header, &project.root),
            "precompiled header does not exist",
        );
        return Ok(outcome.failed(1));
    }

    let mut roots = sources.clone();
    roots.extend(headers);

    let carried = load_dependency_cache(&layout.dependency_cache, Some(project.config_modified));
    let mut graph = DependencyGraph::refresh(&roots, &build.include_paths, carried);
    graph.compute_effective_times();
    write_dependency_cache(&layout.dependency_cache, &graph)?;

    let plan = InvocationPlan::new(project, &layout, &graph, &sources, &options.extra_args);

    if project.target.mode == BuildMode::Debug
        && (build.emit_compile_commands || options.emit_compile_commands)
    {
        let written = modified_time(&layout.compile_commands);
        if written.is_none() || written < graph.newest_effective_time() {
            write_compile_commands(&layout.compile_commands, &project.root, &plan.units)?;
            if options.verbose {
                println!("   {} Wrote compile_commands.json", "📝".cyan());
            }
        }
    }

    // 3. Compile
    let records = RecordStore::new(&layout.records_dir, &project.root);
    fs::create_dir_all(&layout.int_dir)
        .with_context(|| format!("Failed to create {}", layout.int_dir.display()))?;
    let scheduler = Scheduler::new(runner, &project.diagnostics, &project.root, options.verbose);

    for pch in [&plan.c_pch, &plan.cpp_pch].into_iter().flatten() {
        let record = records.load(&pch.output);
        let Some(reason) =
            rebuild_reason(pch, record.as_ref(), None, prebuild.last_update, options.rebuild)
        else {
            continue;
        };
        if options.verbose {
            println!(
                "   {} {}: {}",
                "↻".dimmed(),
                ui::display_path(&pch.input, &project.root),
                reason
            );
        }
        println!("   {} Precompiling header...", "📦".cyan());

        let results = compile(&scheduler, &records, std::slice::from_ref(pch), 1)?;
        outcome.precompiled += 1;
        let code = report_results(&results, true);
        if code != 0 {
            return Ok(outcome.failed(code));
        }
    }

    let pch_time = |is_c: bool| {
        let pch = if is_c { &plan.c_pch } else { &plan.cpp_pch };
        pch.as_ref().and_then(|p| modified_time(&p.output))
    };
    let (c_pch_time, cpp_pch_time) = (pch_time(true), pch_time(false));

    let mut stale: Vec<CompilerInvocation> = Vec::new();
    for unit in &plan.units {
        let is_c = is_c_source(&unit.input);
        let record = records.load(&unit.output);
        let unit_pch_time = if is_c { c_pch_time } else { cpp_pch_time };
        if let Some(reason) = rebuild_reason(
            unit,
            record.as_ref(),
            unit_pch_time,
            prebuild.last_update,
            options.rebuild,
        ) {
            if options.verbose {
                println!(
                    "   {} {}: {}",
                    "↻".dimmed(),
                    ui::display_path(&unit.input, &project.root),
                    reason
                );
            }
            stale.push(unit.clone());
        }
    }

    if !stale.is_empty() {
        let jobs = if options.sequential { 1 } else { options.jobs.max(1) };
        println!(
            "   {} Compiling {} file(s) with {} job(s)...",
            "⚙️".cyan(),
            stale.len(),
            jobs.min(stale.len())
        );

        let results = compile(&scheduler, &records, &stale, jobs)?;
        outcome.compiled = results.iter().filter(|r| !r.is_failure()).count();
        let code = report_results(&results, jobs <= 1);
        if code != 0 {
            print_hint(&results);
            return Ok(outcome.failed(code));
        }
    }

    // 4. Pre-link and link-dependency rules
    let prelink = rules.run_rules("pre-link", &build.prelink_rules, true)?;
    if !prelink.success() {
        return Ok(outcome.failed(prelink.exit_code));
    }
    let link_deps = rules.run_rules("link-dependency", &build.link_dependencies, false)?;
    if !link_deps.success() {
        return Ok(outcome.failed(link_deps.exit_code));
    }

    // 5. Link
    let objects = plan.objects();
    let newest_object: Option<SystemTime> = objects.iter().filter_map(|o| modified_time(o)).max();
    let baseline = Some(project.config_modified)
        .max(prelink.last_update)
        .max(link_deps.last_update)
        .max(newest_object);
    let needs_link = options.force_link
        || match modified_time(&layout.executable) {
            None => true,
            Some(exe_time) => baseline.is_some_and(|t| exe_time < t),
        };

    if needs_link {
        let code = link(project, &layout, &plan, &objects, runner, options.verbose)?;
        if code != 0 {
            return Ok(outcome.failed(code));
        }
        outcome.linked = true;
    }

    // 6. Post-build rules
    let postbuild = rules.run_rules("post-build", &build.postbuild_rules, true)?;
    if !postbuild.success() {
        return Ok(outcome.failed(postbuild.exit_code));
    }

    let did_work = outcome.compiled > 0
        || outcome.precompiled > 0
        || outcome.linked
        || prebuild.any_run
        || prelink.any_run
        || link_deps.any_run
        || postbuild.any_run;
    if did_work {
        println!(
            "{} Build finished in {:.2?}",
            "✓".green(),
            start_time.elapsed()
        );
    } else {
        println!("{} Up to date", "⚡".green());
    }

    Ok(outcome)
}

/// Run `invocations` through the scheduler, refreshing each artifact record.
///
/// Old records are removed first so an interrupted compile can't leave a
/// record that vouches for a half-written output.
fn compile(
    scheduler: &Scheduler,
    records: &RecordStore,
    invocations: &[CompilerInvocation],
    jobs: usize,
) -> Result<Vec<CompileResult>> {
    for invocation in invocations {
        records.remove(&invocation.output)?;
        if let Some(parent) = invocation.output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let results = scheduler.run(invocations, jobs)?;
    for (invocation, result) in invocations.iter().zip(&results) {
        if !result.is_failure() {
            records.record_output(&invocation.compiler_id(), &invocation.args, &invocation.output)?;
        }
    }
    Ok(results)
}

fn link(
    project: &Project,
    layout: &BuildLayout,
    plan: &InvocationPlan,
    objects: &[PathBuf],
    runner: &dyn ProcessRunner,
    verbose: bool,
) -> Result<i32> {
    let build = &project.build;
    let linker = build.toolchain.compiler_for(!plan.any_cpp());
    let args = link_args(build, &layout.executable, objects, &project.root);

    fs::create_dir_all(&layout.bin_dir)
        .with_context(|| format!("Failed to create {}", layout.bin_dir.display()))?;
    println!(
        "   {} Linking {}",
        "🔗".cyan(),
        ui::display_path(&layout.executable, &project.root)
    );
    if verbose {
        let mut command = vec![linker.to_string_lossy().to_string()];
        command.extend(args.iter().cloned());
        ui::print_command(&command.join(" "));
    }

    let output = runner
        .run(linker, &args, true)
        .with_context(|| format!("Failed to run linker {}", linker.display()))?;
    let text = output.combined();
    if !text.is_empty() {
        print!("{}", text);
    }

    if !output.success() {
        ui::report_error(
            &build.output_name,
            &format!("linking failed with exit code {}", output.exit_code),
        );
        if let Some(hint) = FeedbackAnalyzer::analyze(&text) {
            println!("\n{} {}", "💡 Hint:".yellow().bold(), hint);
        }
        return Ok(output.exit_code);
    }
    Ok(0)
}

/// Build, then run the program with `run_args` followed by `args`.
pub fn build_and_run(
    project: &Project,
    options: &BuildOptions,
    runner: &dyn ProcessRunner,
    args: &[String],
) -> Result<i32> {
    let outcome = build_project(project, options, runner)?;
    if !outcome.success() {
        return Ok(outcome.exit_code);
    }

    let executable = BuildLayout::new(project).executable;
    let mut run_args = project.build.run_args.clone();
    run_args.extend(args.iter().cloned());

    println!("{} Running...\n", "▶".green());
    let output = runner
        .run(&executable, &run_args, false)
        .with_context(|| format!("Failed to run {}", executable.display()))?;
    Ok(output.exit_code)
}

/// Standalone `kiln run-rule`.
pub fn run_named_rule(
    project: &Project,
    name: &str,
    force: bool,
    runner: &dyn ProcessRunner,
) -> Result<i32> {
    let mut engine = RuleEngine::new(
        &project.rules,
        project.target.os,
        &project.root,
        project.config_modified,
        runner,
    )
    .force(force);
    let outcome = engine.run_rule(name)?;
    if outcome.success() && !outcome.any_run {
        println!("{} '{}' is up to date", "⚡".green(), name);
    }
    Ok(outcome.exit_code)
}
