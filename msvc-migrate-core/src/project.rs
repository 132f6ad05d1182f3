//! Project file rewriting

use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use crate::{
    document::{
        Document,
        DocumentError,
    },
    error::{
        MigrateError,
        MigrateResult,
    },
    rules::RuleSet,
};

/// Result of rewriting one project file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub path:    PathBuf,
    /// Names of the rules that changed the file, in application order
    pub applied: Vec<String>,
}

impl ProjectOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Applies a [`RuleSet`] to project files
#[derive(Debug, Clone)]
pub struct ProjectRewriter {
    rules: RuleSet,
}

impl ProjectRewriter {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Rewrite project XML held in memory
    ///
    /// Returns the new text and the applied rule names, or `None` when no
    /// rule changed anything.
    pub fn rewrite(
        &self,
        source: &str,
        file_name: &str,
    ) -> Result<Option<(String, Vec<String>)>, DocumentError> {
        let mut doc = Document::parse(source)?;
        let applied = self.rules.apply(&mut doc, file_name);
        if applied.is_empty() {
            return Ok(None);
        }
        Ok(Some((doc.to_xml_string()?, applied)))
    }

    /// Rewrite the project at `path` in place, saving only when a rule
    /// changed it
    pub fn fix_project(&self, path: &Path) -> MigrateResult<ProjectOutcome> {
        let source = fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let rewritten = self
            .rewrite(&source, &file_name)
            .map_err(|source| MigrateError::Document {
                path: path.to_path_buf(),
                source,
            })?;

        let applied = match rewritten {
            Some((xml, applied)) => {
                fs::write(path, xml).map_err(|e| MigrateError::io(path, e))?;
                applied
            },
            None => Vec::new(),
        };

        Ok(ProjectOutcome {
            path: path.to_path_buf(),
            applied,
        })
    }
}
