//! # kiln CLI Entry Point
//!
//! Parses arguments with clap, loads `kiln.toml` from the current directory
//! and hands off to the library.
//!
//! ## Commands
//!
//! - **Build**: `build`, `run`, `clean`
//! - **Rules**: `run-rule`
//! - **Project**: `new`

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kiln::build::{self, BuildOptions};
use kiln::config::{BuildMode, BuildTarget, Project};
use kiln::process::SystemRunner;
use kiln::templates;
use kiln::ui;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Incremental C/C++ builds", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct BuildArgs {
    /// Build in release mode, with optimizations
    #[arg(long)]
    release: bool,
    /// Number of compiler processes to run at once [default: logical CPUs]
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Compile one file at a time with direct compiler output
    #[arg(long)]
    sequential: bool,
    /// Recompile everything
    #[arg(long)]
    rebuild: bool,
    /// Relink even if the executable is up to date
    #[arg(long)]
    link: bool,
    /// Write compile_commands.json (debug builds)
    #[arg(long)]
    emit_compile_commands: bool,
    /// Show commands and rebuild reasons
    #[arg(short, long)]
    verbose: bool,
    /// Configuration file [default: kiln.toml]
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and link the current project
    Build {
        #[command(flatten)]
        args: BuildArgs,
        /// Extra arguments passed to every compile command
        #[arg(last = true)]
        compiler_args: Vec<String>,
    },
    /// Build, then run the output binary
    Run {
        #[command(flatten)]
        args: BuildArgs,
        /// Arguments passed to the program
        #[arg(last = true)]
        program_args: Vec<String>,
    },
    /// Run one rule and its dependencies
    RunRule {
        /// Rule name, or the file a file rule produces
        rule: String,
        /// Run file rules even if their file is up to date
        #[arg(long)]
        force: bool,
        /// Use release settings
        #[arg(long)]
        release: bool,
        /// Configuration file [default: kiln.toml]
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Remove build outputs and cached state
    Clean {
        /// Configuration file [default: kiln.toml]
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Create a new project
    New {
        /// Directory to create
        name: PathBuf,
        /// Language (cpp or c)
        #[arg(long, default_value = "cpp")]
        lang: String,
    },
}

fn mode(release: bool) -> BuildMode {
    if release {
        BuildMode::Release
    } else {
        BuildMode::Debug
    }
}

fn load_project(root: &Path, config: Option<&Path>, release: bool) -> Result<Project> {
    Project::load(root, config, BuildTarget::host(mode(release)))
}

fn build_options(args: &BuildArgs, extra_args: &[String]) -> BuildOptions {
    let mut options = BuildOptions {
        sequential: args.sequential,
        rebuild: args.rebuild,
        force_link: args.link,
        verbose: args.verbose,
        emit_compile_commands: args.emit_compile_commands,
        extra_args: extra_args.to_vec(),
        ..Default::default()
    };
    if let Some(jobs) = args.jobs {
        options.jobs = jobs.max(1);
    }
    options
}

fn run(cli: Cli) -> Result<i32> {
    let root = env::current_dir().context("Failed to read current directory")?;
    let runner = SystemRunner::new(&root);

    match cli.command {
        Commands::Build {
            args,
            compiler_args,
        } => {
            let project = load_project(&root, args.config.as_deref(), args.release)?;
            let outcome = build::build_project(&project, &build_options(&args, &compiler_args), &runner)?;
            Ok(outcome.exit_code)
        }

        Commands::Run { args, program_args } => {
            let project = load_project(&root, args.config.as_deref(), args.release)?;
            build::build_and_run(&project, &build_options(&args, &[]), &runner, &program_args)
        }

        Commands::RunRule {
            rule,
            force,
            release,
            config,
        } => {
            let project = load_project(&root, config.as_deref(), release)?;
            build::run_named_rule(&project, &rule, force, &runner)
        }

        Commands::Clean { config } => {
            let project = load_project(&root, config.as_deref(), false)?;
            build::clean(&project)?;
            Ok(0)
        }

        Commands::New { name, lang } => {
            templates::create_project(&name, &lang)?;
            Ok(0)
        }
    }
}

fn main() -> ExitCode {
    enable_windows_utf8_console();

    let cli = Cli::parse();
    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            ui::report_error("kiln", &format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
