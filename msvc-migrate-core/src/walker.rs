//! Directory traversal and file classification

use std::path::Path;

use regex::{
    Regex,
    RegexBuilder,
};
use walkdir::WalkDir;

use crate::{
    config::FilePatterns,
    error::{
        MigrateError,
        MigrateResult,
    },
};

/// Kind of file the walker dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Project,
    Solution,
}

/// Matches file names against the configured glob patterns
#[derive(Debug, Clone)]
pub struct FileMatcher {
    project:  Vec<Regex>,
    solution: Vec<Regex>,
}

impl FileMatcher {
    pub fn new(patterns: &FilePatterns) -> MigrateResult<Self> {
        Ok(Self {
            project:  compile_globs(&patterns.project)?,
            solution: compile_globs(&patterns.solution)?,
        })
    }

    /// Classify a bare file name; project patterns win over solution ones
    pub fn classify(&self, file_name: &str) -> Option<FileKind> {
        if self.project.iter().any(|re| re.is_match(file_name)) {
            Some(FileKind::Project)
        } else if self.solution.iter().any(|re| re.is_match(file_name)) {
            Some(FileKind::Solution)
        } else {
            None
        }
    }
}

fn compile_globs(patterns: &[String]) -> MigrateResult<Vec<Regex>> {
    patterns.iter().map(|pattern| compile_glob(pattern)).collect()
}

/// Convert a `*`/`?` glob into an anchored, case-insensitive regex
fn compile_glob(pattern: &str) -> MigrateResult<Regex> {
    let mut regex_pattern = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => regex_pattern.push_str(".*"),
            '?' => regex_pattern.push('.'),
            other => regex_pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex_pattern.push('$');

    RegexBuilder::new(&regex_pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| MigrateError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Walk `root` depth-first, handing every matching file to `visit`
///
/// Within a directory, files are visited before subdirectories and each
/// group is ordered by name. An unreadable directory or a failing visit
/// aborts the walk.
pub fn walk<F>(root: &Path, matcher: &FileMatcher, mut visit: F) -> MigrateResult<()>
where
    F: FnMut(FileKind, &Path) -> MigrateResult<()>,
{
    let walker = WalkDir::new(root).sort_by(|a, b| {
        let a_dir = a.file_type().is_dir();
        let b_dir = b.file_type().is_dir();
        a_dir.cmp(&b_dir).then_with(|| a.file_name().cmp(b.file_name()))
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if let Some(kind) = matcher.classify(&file_name) {
            tracing::trace!("Visiting {:?} {}", kind, entry.path().display());
            visit(kind, entry.path())?;
        }
    }

    Ok(())
}
