//! Integration tests for the incremental build pipeline.
//!
//! Each test lays out a project in a temporary directory and builds it with
//! a fake toolchain. The fake writes every `-o` output and stamps it from a
//! logical clock that starts well in the past, so timestamp ordering never
//! depends on filesystem resolution.

use anyhow::Result;
use kiln::build::{BuildLayout, BuildOptions, RuleError, build_project};
use kiln::cache::RecordStore;
use kiln::config::{BuildMode, BuildTarget, Project};
use kiln::graph::depcache::read_dependency_cache;
use kiln::process::{ProcessOutput, ProcessRunner};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

fn ago(secs: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(secs)
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

struct FakeToolchain {
    clock: Mutex<SystemTime>,
    compiled: Mutex<Vec<PathBuf>>,
    links: Mutex<usize>,
    shell: Mutex<Vec<String>>,
    link_exit_code: i32,
    /// Compiles write their output and exit 0 but report an error.
    compile_error: bool,
}

impl FakeToolchain {
    fn new() -> Self {
        Self {
            clock: Mutex::new(ago(500)),
            compiled: Mutex::new(Vec::new()),
            links: Mutex::new(0),
            shell: Mutex::new(Vec::new()),
            link_exit_code: 0,
            compile_error: false,
        }
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap();
        *clock += Duration::from_secs(1);
        *clock
    }

    /// Give `path` a modification time newer than anything built so far.
    fn touch(&self, path: &Path) {
        set_mtime(path, self.tick());
    }

    fn take_compiled(&self) -> Vec<PathBuf> {
        let mut compiled = std::mem::take(&mut *self.compiled.lock().unwrap());
        compiled.sort();
        compiled
    }

    fn take_links(&self) -> usize {
        std::mem::take(&mut *self.links.lock().unwrap())
    }
}

impl ProcessRunner for FakeToolchain {
    fn run(&self, _program: &Path, args: &[String], _capture: bool) -> Result<ProcessOutput> {
        let is_compile = args.iter().any(|a| a == "-c");
        if !is_compile && self.link_exit_code != 0 {
            return Ok(ProcessOutput {
                exit_code: self.link_exit_code,
                stdout: String::new(),
                stderr: "undefined reference to `missing'\n".to_string(),
            });
        }

        if let Some(index) = args.iter().position(|a| a == "-o") {
            let output = PathBuf::from(&args[index + 1]);
            fs::write(&output, args.join(" "))?;
            set_mtime(&output, self.tick());
        }

        if is_compile {
            let input = PathBuf::from(args.last().cloned().unwrap_or_default());
            self.compiled.lock().unwrap().push(input.clone());
            if self.compile_error {
                return Ok(ProcessOutput {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: format!("{}:1:1: error: expected ';'\n", input.display()),
                });
            }
        } else {
            *self.links.lock().unwrap() += 1;
        }
        Ok(ProcessOutput::default())
    }

    fn run_shell(&self, command: &str, _capture: bool) -> Result<ProcessOutput> {
        self.shell.lock().unwrap().push(command.to_string());
        Ok(ProcessOutput::default())
    }
}

/// Write `files` (path, content) under a fresh project root, all aged well
/// before the fake clock.
fn create_project(config: &str, files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let toml = format!("[package]\nname = \"app\"\n{}", config);
    fs::write(root.join("kiln.toml"), toml).unwrap();
    set_mtime(&root.join("kiln.toml"), ago(1000));

    for (path, content) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        set_mtime(&path, ago(1000));
    }
    dir
}

fn load(root: &Path) -> Project {
    Project::load(root, None, BuildTarget::host(BuildMode::Debug)).unwrap()
}

fn build(root: &Path, runner: &FakeToolchain) -> kiln::build::BuildOutcome {
    let options = BuildOptions {
        jobs: 4,
        ..Default::default()
    };
    build_project(&load(root), &options, runner).unwrap()
}

#[test]
fn test_end_to_end_incremental_build() {
    let dir = create_project(
        "",
        &[
            ("src/main.c", "#include \"util.h\"\nint main(void) { return 0; }\n"),
            ("src/util.h", "#define UTIL 1\n"),
        ],
    );
    let root = dir.path();
    let runner = FakeToolchain::new();

    // first build: one compile, one link, cache and record written
    let first = build(root, &runner);
    assert!(first.success());
    assert_eq!(runner.take_compiled(), vec![root.join("src/main.c")]);
    assert_eq!(runner.take_links(), 1);

    let project = load(root);
    let layout = BuildLayout::new(&project);
    let cache = read_dependency_cache(&layout.dependency_cache).unwrap();
    assert_eq!(cache[&root.join("src/main.c")], vec![root.join("src/util.h")]);
    assert!(cache[&root.join("src/util.h")].is_empty());

    let object = layout.object_path(&root.join("src/main.c"));
    let record = RecordStore::new(&layout.records_dir, root).load(&object).unwrap();
    assert_eq!(
        record.record.compiler,
        project.build.toolchain.cc_path.to_string_lossy()
    );
    assert!(record.record.args.contains(&"-c".to_string()));
    assert_eq!(record.record.hash.len(), 64);
    assert!(layout.executable.is_file());

    // second build: nothing to do
    let second = build(root, &runner);
    assert!(second.success());
    assert!(runner.take_compiled().is_empty());
    assert_eq!(runner.take_links(), 0);
    assert!(!second.linked);

    // touching the header recompiles and relinks
    runner.touch(&root.join("src/util.h"));
    let third = build(root, &runner);
    assert_eq!(runner.take_compiled(), vec![root.join("src/main.c")]);
    assert_eq!(runner.take_links(), 1);
    assert_eq!(third.compiled, 1);
    assert!(third.linked);
}

#[test]
fn test_staleness_propagates_through_include_chain() {
    let dir = create_project(
        "",
        &[
            ("src/a.c", "#include \"b.h\"\nint main(void) { return B; }\n"),
            ("src/b.h", "#include \"c.h\"\n#define B C\n"),
            ("src/c.h", "#define C 0\n"),
            ("src/d.c", "int d(void) { return 1; }\n"),
            ("src/unrelated.h", "#define U 2\n"),
        ],
    );
    let root = dir.path();
    let runner = FakeToolchain::new();

    build(root, &runner);
    assert_eq!(runner.take_compiled().len(), 2);
    runner.take_links();

    runner.touch(&root.join("src/unrelated.h"));
    build(root, &runner);
    assert!(runner.take_compiled().is_empty());

    runner.touch(&root.join("src/c.h"));
    build(root, &runner);
    assert_eq!(runner.take_compiled(), vec![root.join("src/a.c")]);
}

#[test]
fn test_include_cycle_builds_once() {
    let dir = create_project(
        "",
        &[
            ("src/main.c", "#include \"a.h\"\nint main(void) { return 0; }\n"),
            ("src/a.h", "#pragma once\n#include \"b.h\"\n"),
            ("src/b.h", "#pragma once\n#include \"a.h\"\n"),
        ],
    );
    let root = dir.path();
    let runner = FakeToolchain::new();

    assert!(build(root, &runner).success());
    assert_eq!(runner.take_compiled().len(), 1);

    let layout = BuildLayout::new(&load(root));
    let cache = read_dependency_cache(&layout.dependency_cache).unwrap();
    assert_eq!(cache.len(), 3);
    assert_eq!(cache[&root.join("src/a.h")], vec![root.join("src/b.h")]);
    assert_eq!(cache[&root.join("src/b.h")], vec![root.join("src/a.h")]);

    // a change anywhere in the cycle reaches the translation unit
    runner.touch(&root.join("src/b.h"));
    build(root, &runner);
    assert_eq!(runner.take_compiled(), vec![root.join("src/main.c")]);
}

#[test]
fn test_artifacts_reused_across_runs() {
    let dir = create_project(
        "",
        &[("src/main.cpp", "int main() { return 0; }\n")],
    );
    let root = dir.path();

    build(root, &FakeToolchain::new());

    // a new runner stands in for a second process
    let runner = FakeToolchain::new();
    let outcome = build(root, &runner);
    assert_eq!(outcome.compiled, 0);
    assert!(runner.take_compiled().is_empty());
}

#[test]
fn test_flag_change_recompiles() {
    let dir = create_project("", &[("src/main.c", "int main(void) { return 0; }\n")]);
    let root = dir.path();
    let runner = FakeToolchain::new();
    build(root, &runner);
    runner.take_compiled();

    let options = BuildOptions {
        extra_args: vec!["-DEXTRA".to_string()],
        ..Default::default()
    };
    let outcome = build_project(&load(root), &options, &runner).unwrap();
    assert_eq!(outcome.compiled, 1);
}

#[test]
fn test_precompiled_header_gates_units() {
    let dir = create_project(
        "[build]\ncompiler = \"gcc\"\ncpp_precompiled_header = \"src/pch.h\"\n",
        &[
            ("src/pch.h", "#include <vector>\n"),
            ("src/main.cpp", "int main() { return 0; }\n"),
        ],
    );
    let root = dir.path();
    let runner = FakeToolchain::new();

    let first = build(root, &runner);
    assert_eq!(first.precompiled, 1);
    assert_eq!(first.compiled, 1);
    assert!(root.join("src/pch.h.gch").is_file());
    runner.take_compiled();

    let second = build(root, &runner);
    assert_eq!((second.precompiled, second.compiled), (0, 0));

    runner.touch(&root.join("src/pch.h"));
    let third = build(root, &runner);
    assert_eq!((third.precompiled, third.compiled), (1, 1));
}

#[test]
fn test_failed_compile_leaves_no_record() {
    let dir = create_project("", &[("src/main.c", "int main(void) { return 0 }\n")]);
    let root = dir.path();
    let runner = FakeToolchain {
        compile_error: true,
        ..FakeToolchain::new()
    };

    // exit status 0 with an error in the output still fails the build
    let outcome = build(root, &runner);
    assert_eq!(outcome.exit_code, 1);
    assert!(!outcome.linked);
    assert_eq!(runner.take_links(), 0);

    let layout = BuildLayout::new(&load(root));
    let object = layout.object_path(&root.join("src/main.c"));
    assert!(object.is_file());
    assert!(RecordStore::new(&layout.records_dir, root).load(&object).is_none());

    // the leftover object is not trusted on the next run
    let runner = FakeToolchain::new();
    let retry = build(root, &runner);
    assert!(retry.success());
    assert_eq!(runner.take_compiled(), vec![root.join("src/main.c")]);
    assert!(RecordStore::new(&layout.records_dir, root).load(&object).is_some());
}

#[test]
fn test_missing_precompiled_header_fails() {
    let dir = create_project(
        "[build]\nc_precompiled_header = \"src/missing.h\"\n",
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
    let runner = FakeToolchain::new();
    let outcome = build(dir.path(), &runner);
    assert_eq!(outcome.exit_code, 1);
    assert!(runner.take_compiled().is_empty());
}

#[test]
fn test_rules_run_around_build() {
    let dir = create_project(
        r#"[build]
prebuild_rules = ["generate"]
postbuild_rules = ["package"]

[rules.generate]
command = "echo generate"

[rules.package]
commands = ["echo package", "echo done"]
"#,
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
    let runner = FakeToolchain::new();
    assert!(build(dir.path(), &runner).success());
    assert_eq!(
        *runner.shell.lock().unwrap(),
        vec!["echo generate", "echo package", "echo done"]
    );
}

#[test]
fn test_prebuild_rule_output_triggers_recompile() {
    let dir = create_project(
        r#"[build]
prebuild_rules = ["gen/config.txt"]

[rules."gen/config.txt"]
is_file = true
dependencies = ["input.txt"]
command = "regen"
"#,
        &[
            ("src/main.c", "int main(void) { return 0; }\n"),
            ("input.txt", "A=1\n"),
            ("gen/config.txt", "#define A 1\n"),
        ],
    );
    let root = dir.path();
    let runner = FakeToolchain::new();

    build(root, &runner);
    assert_eq!(runner.take_compiled().len(), 1);
    assert!(runner.shell.lock().unwrap().is_empty());

    // nothing the unit includes changed, only what the rule depends on
    runner.touch(&root.join("gen/config.txt"));
    runner.touch(&root.join("input.txt"));
    let outcome = build(root, &runner);
    assert_eq!(*runner.shell.lock().unwrap(), vec!["regen"]);
    assert_eq!(outcome.compiled, 1);
    assert_eq!(runner.take_compiled(), vec![root.join("src/main.c")]);
}

#[test]
fn test_link_failure_stops_post_build() {
    let dir = create_project(
        "[build]\npostbuild_rules = [\"package\"]\n\n[rules.package]\ncommand = \"echo package\"\n",
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
    let runner = FakeToolchain {
        link_exit_code: 3,
        ..FakeToolchain::new()
    };
    let outcome = build(dir.path(), &runner);
    assert_eq!(outcome.exit_code, 3);
    assert!(!outcome.linked);
    assert!(runner.shell.lock().unwrap().is_empty());
}

#[test]
fn test_rule_cycle_is_reported() {
    let dir = create_project(
        r#"[build]
prebuild_rules = ["a"]

[rules.a]
dependencies = ["b"]
command = "echo a"

[rules.b]
dependencies = ["a"]
command = "echo b"
"#,
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
    let runner = FakeToolchain::new();
    let err = build_project(&load(dir.path()), &BuildOptions::default(), &runner).unwrap_err();

    let cycle = err
        .chain()
        .find_map(|e| e.downcast_ref::<RuleError>())
        .unwrap();
    match cycle {
        RuleError::Circular { rule, .. } => assert_eq!(rule, "a"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(runner.shell.lock().unwrap().is_empty());
    assert!(runner.take_compiled().is_empty());
}
