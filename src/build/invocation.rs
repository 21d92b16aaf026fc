use super::layout::BuildLayout;
use super::utils::compile_flags;
use crate::config::Project;
use crate::graph::DependencyGraph;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One compiler run: everything needed to execute it and to judge whether
/// its output is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInvocation {
    pub compiler: PathBuf,
    pub args: Vec<String>,
    pub input: PathBuf,
    /// Effective time of `input` in the dependency graph.
    pub input_time: Option<SystemTime>,
    pub output: PathBuf,
}

impl CompilerInvocation {
    /// Compiler identity stored in artifact records.
    pub fn compiler_id(&self) -> String {
        self.compiler.to_string_lossy().to_string()
    }

    /// The command line as the user would type it.
    pub fn command_line(&self) -> String {
        let mut line = self.compiler_id();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

pub fn is_c_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "c")
}

/// Every compilation the project could need, before staleness filtering.
#[derive(Debug, Clone, Default)]
pub struct InvocationPlan {
    pub c_pch: Option<CompilerInvocation>,
    pub cpp_pch: Option<CompilerInvocation>,
    pub units: Vec<CompilerInvocation>,
}

impl InvocationPlan {
    pub fn new(
        project: &Project,
        layout: &BuildLayout,
        graph: &DependencyGraph,
        sources: &[PathBuf],
        extra_args: &[String],
    ) -> Self {
        let build = &project.build;
        let toolchain = &build.toolchain;
        let mode = project.target.mode;

        let c_flags = compile_flags(build, mode, true, extra_args);
        let cpp_flags = compile_flags(build, mode, false, extra_args);

        let pch_invocation = |header: &Path, is_c: bool, flags: &[String]| {
            let output = toolchain.pch_output(header, &layout.int_dir);
            let mut args = flags.to_vec();
            args.extend(toolchain.pch_args(header, &output, is_c));
            CompilerInvocation {
                compiler: toolchain.compiler_for(is_c).to_path_buf(),
                args,
                input: header.to_path_buf(),
                input_time: graph.effective_time(header),
                output,
            }
        };

        let c_pch = build
            .c_precompiled_header
            .as_deref()
            .map(|h| pch_invocation(h, true, &c_flags));
        let cpp_pch = build
            .cpp_precompiled_header
            .as_deref()
            .map(|h| pch_invocation(h, false, &cpp_flags));

        let units = sources
            .iter()
            .map(|source| {
                let is_c = is_c_source(source);
                let (flags, pch) = if is_c {
                    (&c_flags, &c_pch)
                } else {
                    (&cpp_flags, &cpp_pch)
                };

                let output = layout.object_path(source);
                let mut args = flags.clone();
                if let Some(pch) = pch {
                    args.extend(toolchain.pch_use_args(&pch.output));
                }
                args.push("-o".to_string());
                args.push(output.to_string_lossy().to_string());
                args.push(source.to_string_lossy().to_string());

                CompilerInvocation {
                    compiler: toolchain.compiler_for(is_c).to_path_buf(),
                    args,
                    input: source.clone(),
                    input_time: graph.effective_time(source),
                    output,
                }
            })
            .collect();

        Self {
            c_pch,
            cpp_pch,
            units,
        }
    }

    /// Whether anything is C++, which decides the link driver.
    pub fn any_cpp(&self) -> bool {
        self.units.iter().any(|u| !is_c_source(&u.input))
    }

    pub fn objects(&self) -> Vec<PathBuf> {
        self.units.iter().map(|u| u.output.clone()).collect()
    }
}

#[derive(Serialize)]
struct CompileCommand<'a> {
    directory: String,
    file: String,
    arguments: Vec<&'a str>,
}

/// Write `compile_commands.json` for `units`, sorted by source file.
pub fn write_compile_commands(path: &Path, root: &Path, units: &[CompilerInvocation]) -> Result<()> {
    let directory = root.to_string_lossy().to_string();
    let compiler_ids: Vec<String> = units.iter().map(|u| u.compiler_id()).collect();

    let mut entries: Vec<CompileCommand> = units
        .iter()
        .zip(&compiler_ids)
        .map(|(unit, compiler)| {
            let mut arguments = vec![compiler.as_str()];
            arguments.extend(unit.args.iter().map(String::as_str));
            CompileCommand {
                directory: directory.clone(),
                file: unit.input.to_string_lossy().to_string(),
                arguments,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.file.cmp(&b.file));

    let json = serde_json::to_string_pretty(&entries)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
