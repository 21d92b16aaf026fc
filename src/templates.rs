//! Project scaffolding for `kiln new`.

use crate::config::CONFIG_FILE;
use anyhow::{Context, Result, bail};
use colored::*;
use std::fs;
use std::path::Path;

/// `kiln.toml` and the starter `main` for a console program in `lang`
/// (`c` or `cpp`).
pub fn get_template(name: &str, lang: &str) -> (String, String) {
    if lang == "c" {
        let config = format!(
            r#"[package]
name = "{}"
version = "0.1.0"

[build]
compiler = "gcc"
c_standard = "c17"
warnings = ["all", "extra"]
emit_compile_commands = true

[profile.release]
defines = ["NDEBUG"]
"#,
            name
        );
        let code = r#"#include <stdio.h>

int main(void) {
    printf("Hello from kiln!\n");
    return 0;
}
"#;
        (config, code.to_string())
    } else {
        let config = format!(
            r#"[package]
name = "{}"
version = "0.1.0"

[build]
compiler = "gcc"
cpp_standard = "c++20"
warnings = ["all", "extra"]
emit_compile_commands = true

[profile.release]
defines = ["NDEBUG"]
"#,
            name
        );
        let code = r#"#include <iostream>

int main() {
    std::cout << "Hello from kiln!" << std::endl;
    return 0;
}
"#;
        (config, code.to_string())
    }
}

/// Create `path` with a `kiln.toml`, `src/main.<ext>` and a `.gitignore`.
pub fn create_project(path: &Path, lang: &str) -> Result<()> {
    if lang != "c" && lang != "cpp" {
        bail!("unknown language '{}', expected 'c' or 'cpp'", lang);
    }
    if path.exists() {
        bail!("directory '{}' already exists", path.display());
    }

    fs::create_dir_all(path.join("src")).context("Failed to create src")?;

    // Only the final directory name becomes the project name
    let project_name = path
        .file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy();
    let (config, main_code) = get_template(&project_name, lang);

    fs::write(path.join(CONFIG_FILE), config)?;
    fs::write(path.join(".gitignore"), "bin/\n.kiln/\ncompile_commands.json\n")?;
    fs::write(path.join("src").join(format!("main.{}", lang)), main_code)?;

    println!(
        "{} Created new project: {}",
        "✓".green(),
        project_name.bold()
    );
    println!("  cd {}\n  kiln run", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, BuildTarget, Project};
    use std::time::SystemTime;

    #[test]
    fn test_default_cpp_template() {
        let (config, code) = get_template("myapp", "cpp");
        assert!(config.contains("name = \"myapp\""));
        assert!(config.contains("c++20"));
        assert!(code.contains("#include <iostream>"));
    }

    #[test]
    fn test_default_c_template() {
        let (config, code) = get_template("myapp", "c");
        assert!(config.contains("c17"));
        assert!(code.contains("#include <stdio.h>"));
    }

    #[test]
    fn test_created_project_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello");
        create_project(&path, "cpp").unwrap();
        assert!(path.join("src/main.cpp").is_file());

        let text = fs::read_to_string(path.join(CONFIG_FILE)).unwrap();
        let project = Project::parse(
            &path,
            &path.join(CONFIG_FILE),
            &text,
            SystemTime::UNIX_EPOCH,
            BuildTarget::host(BuildMode::Release),
        )
        .unwrap();
        assert_eq!(project.name, "hello");
        assert_eq!(project.build.defines, vec!["NDEBUG".to_string()]);
    }

    #[test]
    fn test_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_project(dir.path(), "cpp").is_err());
        assert!(create_project(&dir.path().join("x"), "rust").is_err());
    }
}
