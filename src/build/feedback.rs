use colored::*;

/// Turns common compiler and linker failures into a hint about `kiln.toml`.
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Main function missing (Specific Linker Error)
        if output.contains("undefined reference to `main'")
            || output.contains("undefined symbols for architecture") && output.contains("_main")
        {
            return Some(format!(
                "Your project is missing a {} function.\nEnsure one source file under {} defines the entry point.",
                "main()".bold().yellow(),
                "source_directory".bold().green()
            ));
        }

        // 2. Generic Missing Library (Linker Error)
        if output.contains("undefined reference to") || output.contains("Undefined symbols") {
            return Some(format!(
                "It looks like a {} error.\nYou might be missing a library in {}.\nAdd it to {} or pass its path in {}.",
                "Linker".bold().red(),
                "kiln.toml".bold().yellow(),
                "libraries".bold().green(),
                "link_dependencies".bold().green()
            ));
        }

        // 3. Missing Header (Compiler Error)
        if output.contains("fatal error: ")
            && (output.contains("No such file or directory") || output.contains("file not found"))
        {
            return Some(format!(
                "It looks like a {} error.\nYou might be missing an include path.\nCheck {} in kiln.toml.",
                "Missing Header".bold().red(),
                "include_paths".bold().yellow()
            ));
        }

        None
    }
}
