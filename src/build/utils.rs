use crate::config::{BuildConfig, BuildMode};
use crate::graph::normalize_path;
use std::path::{Path, PathBuf};

/// Get the GCC/Clang-compatible standard flag for a given edition
/// GCC/Clang use -std= prefix
pub fn get_std_flag_gcc(edition: &str) -> String {
    let normalized = edition.to_lowercase();

    // If already in -std= format, extract the standard
    let edition_clean = normalized.strip_prefix("-std=").unwrap_or(&normalized);

    match edition_clean {
        // C standards
        "c89" | "c90" => "-std=c89".to_string(),
        "c99" => "-std=c99".to_string(),
        "c11" => "-std=c11".to_string(),
        "c17" | "c18" => "-std=c17".to_string(),
        "c23" | "c2x" => "-std=c23".to_string(),

        // C++ standards
        "c++98" | "c++03" => "-std=c++03".to_string(),
        "c++11" | "c++0x" => "-std=c++11".to_string(),
        "c++14" | "c++1y" => "-std=c++14".to_string(),
        "c++17" | "c++1z" => "-std=c++17".to_string(),
        "c++20" | "c++2a" => "-std=c++20".to_string(),
        "c++23" | "c++2b" => "-std=c++23".to_string(),
        "c++26" | "c++2c" => "-std=c++26".to_string(),

        // GNU extensions
        "gnu89" | "gnu90" => "-std=gnu89".to_string(),
        "gnu99" => "-std=gnu99".to_string(),
        "gnu11" => "-std=gnu11".to_string(),
        "gnu17" | "gnu18" => "-std=gnu17".to_string(),
        "gnu23" | "gnu2x" => "-std=gnu23".to_string(),
        "gnu++98" | "gnu++03" => "-std=gnu++03".to_string(),
        "gnu++11" | "gnu++0x" => "-std=gnu++11".to_string(),
        "gnu++14" | "gnu++1y" => "-std=gnu++14".to_string(),
        "gnu++17" | "gnu++1z" => "-std=gnu++17".to_string(),
        "gnu++20" | "gnu++2a" => "-std=gnu++20".to_string(),
        "gnu++23" | "gnu++2b" => "-std=gnu++23".to_string(),
        "gnu++26" | "gnu++2c" => "-std=gnu++26".to_string(),

        // Default: use as-is with -std= prefix
        _ => format!("-std={}", edition_clean),
    }
}

/// `-W` flags with every positive warning ahead of every `no-` warning.
/// Relative order within each group is kept.
pub fn warning_flags(warnings: &[String]) -> Vec<String> {
    let (negative, positive): (Vec<&String>, Vec<&String>) =
        warnings.iter().partition(|w| w.starts_with("no-"));
    positive
        .into_iter()
        .chain(negative)
        .map(|w| format!("-W{}", w))
        .collect()
}

/// Flags shared by every compilation of one language, up to but excluding
/// precompiled-header and input/output arguments.
pub fn compile_flags(
    build: &BuildConfig,
    mode: BuildMode,
    is_c: bool,
    extra_args: &[String],
) -> Vec<String> {
    let mut args = vec!["-c".to_string()];

    if mode == BuildMode::Debug {
        args.push("-g".to_string());
    }

    let standard = if is_c {
        &build.c_standard
    } else {
        &build.cpp_standard
    };
    args.push(get_std_flag_gcc(standard));

    if is_c {
        args.extend(build.c_compiler_flags.iter().cloned());
    } else {
        args.extend(build.cpp_compiler_flags.iter().cloned());
    }

    for path in &build.include_paths {
        args.push(format!("-I{}", path.display()));
    }
    for define in &build.defines {
        args.push(format!("-D{}", define));
    }
    args.extend(warning_flags(&build.warnings));
    args.push(format!("-O{}", build.optimization));
    args.extend(extra_args.iter().cloned());
    args
}

/// Linker arguments: output, objects, link dependencies, libraries, flags.
/// Link dependencies are paths relative to the project root.
pub fn link_args(
    build: &BuildConfig,
    executable: &Path,
    objects: &[PathBuf],
    root: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        executable.to_string_lossy().to_string(),
    ];
    args.extend(objects.iter().map(|o| o.to_string_lossy().to_string()));
    for dependency in &build.link_dependencies {
        let path = normalize_path(root, Path::new(dependency));
        args.push(path.to_string_lossy().to_string());
    }
    args.extend(build.libraries.iter().map(|lib| format!("-l{}", lib)));
    args.extend(build.link_flags.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildTarget, Project, TargetOs};
    use std::time::SystemTime;

    fn project(build: &str, mode: BuildMode) -> Project {
        let text = format!("[package]\nname = \"app\"\n[build]\n{}", build);
        Project::parse(
            Path::new("/p"),
            Path::new("/p/kiln.toml"),
            &text,
            SystemTime::UNIX_EPOCH,
            BuildTarget {
                os: TargetOs::Linux,
                mode,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_get_std_flag_gcc_cpp_standards() {
        assert_eq!(get_std_flag_gcc("c++11"), "-std=c++11");
        assert_eq!(get_std_flag_gcc("c++14"), "-std=c++14");
        assert_eq!(get_std_flag_gcc("c++17"), "-std=c++17");
        assert_eq!(get_std_flag_gcc("c++20"), "-std=c++20");
        assert_eq!(get_std_flag_gcc("c++23"), "-std=c++23");
        assert_eq!(get_std_flag_gcc("c++26"), "-std=c++26");
    }

    #[test]
    fn test_get_std_flag_gcc_c_standards() {
        assert_eq!(get_std_flag_gcc("c89"), "-std=c89");
        assert_eq!(get_std_flag_gcc("c99"), "-std=c99");
        assert_eq!(get_std_flag_gcc("c11"), "-std=c11");
        assert_eq!(get_std_flag_gcc("c17"), "-std=c17");
        assert_eq!(get_std_flag_gcc("c23"), "-std=c23");
    }

    #[test]
    fn test_get_std_flag_gcc_gnu_extensions() {
        assert_eq!(get_std_flag_gcc("gnu++17"), "-std=gnu++17");
        assert_eq!(get_std_flag_gcc("gnu++20"), "-std=gnu++20");
        assert_eq!(get_std_flag_gcc("gnu11"), "-std=gnu11");
    }

    #[test]
    fn test_get_std_flag_gcc_aliases() {
        assert_eq!(get_std_flag_gcc("c++0x"), "-std=c++11");
        assert_eq!(get_std_flag_gcc("c++1y"), "-std=c++14");
        assert_eq!(get_std_flag_gcc("c++1z"), "-std=c++17");
        assert_eq!(get_std_flag_gcc("c++2a"), "-std=c++20");
        assert_eq!(get_std_flag_gcc("c++2b"), "-std=c++23");
        assert_eq!(get_std_flag_gcc("c2x"), "-std=c23");
    }

    #[test]
    fn test_get_std_flag_gcc_strip_prefix() {
        assert_eq!(get_std_flag_gcc("-std=c++20"), "-std=c++20");
    }

    #[test]
    fn test_warning_order() {
        let warnings: Vec<String> = ["no-unused", "all", "no-sign-compare", "extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            warning_flags(&warnings),
            vec!["-Wall", "-Wextra", "-Wno-unused", "-Wno-sign-compare"]
        );
    }

    #[test]
    fn test_compile_flag_order() {
        let p = project(
            "cpp_compiler_flags = [\"-fno-rtti\"]\ninclude_paths = [\"include\"]\ndefines = [\"FOO=1\"]\nwarnings = [\"all\"]\n",
            BuildMode::Debug,
        );
        let args = compile_flags(&p.build, BuildMode::Debug, false, &["-DEXTRA".to_string()]);
        assert_eq!(
            args,
            vec![
                "-c",
                "-g",
                "-std=c++20",
                "-fno-rtti",
                "-I/p/include",
                "-DFOO=1",
                "-Wall",
                "-O0",
                "-DEXTRA"
            ]
        );

        let release = project("", BuildMode::Release);
        let args = compile_flags(&release.build, BuildMode::Release, true, &[]);
        assert_eq!(args, vec!["-c", "-std=c11", "-O3"]);
    }

    #[test]
    fn test_link_arg_order() {
        let p = project(
            "libraries = [\"m\", \"pthread\"]\nlink_flags = [\"-static\"]\nlink_dependencies = [\"lib/libfoo.a\"]\n",
            BuildMode::Debug,
        );
        let args = link_args(
            &p.build,
            Path::new("/p/bin/app"),
            &[PathBuf::from("/p/a.o"), PathBuf::from("/p/b.o")],
            Path::new("/p"),
        );
        assert_eq!(
            args,
            vec![
                "-o",
                "/p/bin/app",
                "/p/a.o",
                "/p/b.o",
                "/p/lib/libfoo.a",
                "-lm",
                "-lpthread",
                "-static"
            ]
        );
    }
}
