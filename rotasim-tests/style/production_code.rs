//! Production Code Enforcement
//!
//! Library and binary code must propagate errors instead of panicking, and
//! must not silence dead-code warnings. Everything after the first
//! `#[cfg(test)]` in a file is test code and exempt.

use std::fs;
use std::path::{Path, PathBuf};

/// Source directories checked, relative to this crate.
const SOURCE_DIRS: [&str; 3] = [
    "../rotasim-core/src",
    "../rotasim-mechanics/src",
    "../rotasim-cli/src",
];

/// A banned pattern found in production code
#[derive(Debug)]
struct Violation {
    file_path: String,
    line_number: usize,
    pattern: &'static str,
    context: String,
}

/// Checker for panicking calls and dead-code allowances in production code
struct ProductionChecker {
    violations: Vec<Violation>,
    files_checked: usize,
}

impl ProductionChecker {
    const BANNED: [(&'static str, &'static str); 3] = [
        (".unwrap()", "propagate the error with `?`"),
        (".expect(", "propagate the error with `?`"),
        ("dead_code", "remove the unused item or use it"),
    ];

    fn new() -> Self {
        Self {
            violations: Vec::new(),
            files_checked: 0,
        }
    }

    fn find_rust_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::find_rust_files(&path, files)?;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Checks source text, stopping at the test module.
    fn check_source(&mut self, file_path: &str, content: &str) {
        self.files_checked += 1;
        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("#[cfg(test)]") {
                break;
            }
            if trimmed.starts_with("//") {
                continue;
            }
            for (pattern, _) in Self::BANNED {
                let hit = match pattern {
                    "dead_code" => trimmed.starts_with("#[allow(") && trimmed.contains(pattern),
                    _ => trimmed.contains(pattern),
                };
                if hit {
                    self.violations.push(Violation {
                        file_path: file_path.to_string(),
                        line_number: index + 1,
                        pattern,
                        context: trimmed.to_string(),
                    });
                }
            }
        }
    }

    fn check_workspace(&mut self) -> std::io::Result<()> {
        let mut files = Vec::new();
        for dir in SOURCE_DIRS {
            Self::find_rust_files(Path::new(dir), &mut files)?;
        }
        for file in files {
            let content = fs::read_to_string(&file)?;
            self.check_source(&file.display().to_string(), &content);
        }
        Ok(())
    }

    fn report_violations(&self) -> bool {
        if self.violations.is_empty() {
            println!(
                "Production code enforcement: {} files checked, no violations found",
                self.files_checked
            );
            return true;
        }

        println!("Production code violations found:");
        for violation in &self.violations {
            let advice = Self::BANNED
                .iter()
                .find(|(pattern, _)| *pattern == violation.pattern)
                .map_or("", |(_, advice)| advice);
            println!("{}:{}", violation.file_path, violation.line_number);
            println!("  {}", violation.context);
            println!("  `{}`: {advice}", violation.pattern);
        }
        println!(
            "Found {} violation(s) in {} file(s) checked",
            self.violations.len(),
            self.files_checked
        );
        false
    }
}
