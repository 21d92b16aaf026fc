//! `#include` extraction.
//!
//! A single forward pass over the file bytes that understands comments,
//! string literals and line structure well enough to find `#include`
//! directives. There is no macro expansion and no conditional evaluation:
//! an include inside `#if 0` is still reported.

use super::normalize_path;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Text between the delimiters, verbatim.
    pub path: String,
    /// `true` for `<...>`, `false` for `"..."`.
    pub is_library: bool,
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line_begin: bool,
}

impl<'a> Lexer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            line_begin: true,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Advance to the next `#` that starts a logical line. Returns `false` at EOF.
    fn next_directive(&mut self) -> bool {
        while let Some(c) = self.peek(0) {
            match c {
                b'\n' => {
                    self.line_begin = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' | b'\x0c' => self.pos += 1,
                b'\\' if self.peek(1) == Some(b'\n') => self.pos += 2,
                b'#' if self.line_begin => return true,
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'"' | b'\'' => {
                    self.line_begin = false;
                    self.skip_literal(c);
                }
                _ => {
                    self.line_begin = false;
                    self.pos += 1;
                }
            }
        }
        false
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
        // unterminated comment runs to EOF
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == b'\n' {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_literal(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            match c {
                b'\\' => self.pos += 2,
                b'\n' => return,
                _ if c == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
    }

    fn skip_horizontal_space(&mut self) {
        while matches!(self.peek(0), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Consume `#` and the directive identifier following it.
    fn directive_name(&mut self) -> &'a [u8] {
        self.pos += 1;
        self.line_begin = false;
        self.skip_horizontal_space();
        let start = self.pos;
        while matches!(self.peek(0), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    /// Read a `<...>` or `"..."` operand. The closing delimiter must be on
    /// the same line, otherwise the directive is ignored.
    fn include_operand(&mut self) -> Option<IncludeDirective> {
        self.skip_horizontal_space();
        let (close, is_library) = match self.peek(0)? {
            b'<' => (b'>', true),
            b'"' => (b'"', false),
            _ => return None,
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek(0) {
            if c == close {
                let path = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                self.pos += 1;
                return Some(IncludeDirective { path, is_library });
            }
            if c == b'\n' {
                return None;
            }
            self.pos += 1;
        }
        None
    }
}

/// Extract every `#include` directive from `text`, in order of appearance.
pub fn scan_includes(text: &[u8]) -> Vec<IncludeDirective> {
    let mut lexer = Lexer::new(text);
    let mut result = Vec::new();

    while lexer.next_directive() {
        if lexer.directive_name() == b"include"
            && let Some(include) = lexer.include_operand()
        {
            result.push(include);
        }
    }

    result
}

/// Resolve one directive to an existing file.
///
/// Quoted includes try the including file's directory first; both forms then
/// try `search_dirs` in order. The first existing file wins.
pub fn resolve_include(
    include: &IncludeDirective,
    file_dir: &Path,
    search_dirs: &[PathBuf],
) -> Option<PathBuf> {
    if !include.is_library {
        let local = file_dir.join(&include.path);
        if local.is_file() {
            return Some(normalize_path(file_dir, &local));
        }
    }

    search_dirs
        .iter()
        .map(|dir| dir.join(&include.path))
        .find(|candidate| candidate.is_file())
        .map(|found| normalize_path(file_dir, &found))
}

/// Read `file` and return the resolved paths of its direct includes.
///
/// Includes that resolve to nothing (system headers, missing files) are
/// dropped. Duplicates keep their first position.
pub fn resolve_includes(file: &Path, search_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_dir = file.parent().unwrap_or_else(|| Path::new("/"));

    let mut result: Vec<PathBuf> = Vec::new();
    for include in scan_includes(&bytes) {
        if let Some(path) = resolve_include(&include, file_dir, search_dirs)
            && !result.contains(&path)
        {
            result.push(path);
        }
    }
    Ok(result)
}
