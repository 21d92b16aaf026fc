//! Terminal output helpers.
//!
//! Errors and warnings share one shape, `site: error: message`, where the
//! site is the file, rule or tool the message is about.

use colored::*;
use std::path::Path;

pub fn report_error(site: &str, message: &str) {
    eprintln!(
        "{}: {} {}",
        site.bright_white().bold(),
        "error:".bright_red().bold(),
        message
    );
}

pub fn report_warning(site: &str, message: &str) {
    eprintln!(
        "{}: {} {}",
        site.bright_white().bold(),
        "warning:".bright_magenta().bold(),
        message
    );
}

/// Echo a command line in verbose mode.
pub fn print_command(command: &str) {
    println!("   {} {}", "$".dimmed(), command.dimmed());
}

/// `path` relative to `root` when it is inside it, for shorter output.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        let root = Path::new("/p");
        assert_eq!(display_path(Path::new("/p/src/main.c"), root), "src/main.c");
        assert_eq!(display_path(Path::new("/usr/include/x.h"), root), "/usr/include/x.h");
    }
}
