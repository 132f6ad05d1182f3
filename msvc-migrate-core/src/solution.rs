//! Solution file filtering

use std::{
    fs,
    path::Path,
};

use crate::error::{
    MigrateError,
    MigrateResult,
};

const UTF8_BOM: char = '\u{feff}';

/// Drops solution lines that mention a retired platform
#[derive(Debug, Clone)]
pub struct SolutionRewriter {
    retired_platform: String,
}

impl SolutionRewriter {
    pub fn new(retired_platform: impl Into<String>) -> Self {
        Self {
            retired_platform: retired_platform.into(),
        }
    }

    /// Remove every line containing the retired platform token
    ///
    /// Line terminators and a leading byte-order mark are kept as they were.
    pub fn filter(&self, source: &str) -> (String, usize) {
        let (bom, body) = match source.strip_prefix(UTF8_BOM) {
            Some(rest) => (true, rest),
            None => (false, source),
        };

        let mut out = String::with_capacity(source.len());
        if bom {
            out.push(UTF8_BOM);
        }
        let mut removed = 0;
        for line in body.split_inclusive('\n') {
            if line.contains(self.retired_platform.as_str()) {
                removed += 1;
            } else {
                out.push_str(line);
            }
        }
        (out, removed)
    }

    /// Rewrite the solution at `path`; the file is written even when no line
    /// was removed. Returns the number of removed lines.
    pub fn fix_solution(&self, path: &Path) -> MigrateResult<usize> {
        let source = fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
        let (filtered, removed) = self.filter(&source);
        fs::write(path, filtered).map_err(|e| MigrateError::io(path, e))?;
        Ok(removed)
    }
}
