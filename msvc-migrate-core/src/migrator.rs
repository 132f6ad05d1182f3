//! Migration driver tying the walker to the two rewriters

use std::path::{
    Path,
    PathBuf,
};

use tracing::{
    debug,
    info,
};

use crate::{
    config::MigrationConfig,
    error::MigrateResult,
    project::ProjectRewriter,
    rules::RuleSet,
    solution::SolutionRewriter,
    walker::{
        walk,
        FileKind,
        FileMatcher,
    },
};

/// Totals for one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub projects_scanned:    usize,
    /// Projects that were rewritten, in visit order
    pub fixed_projects:      Vec<PathBuf>,
    pub solutions_rewritten: usize,
}

/// Migrates every project and solution below a root directory
#[derive(Debug, Clone)]
pub struct Migrator {
    projects:  ProjectRewriter,
    solutions: SolutionRewriter,
    matcher:   FileMatcher,
}

impl Migrator {
    pub fn new(config: &MigrationConfig) -> MigrateResult<Self> {
        let rules = RuleSet::from_config(config)?;
        debug!(
            "Rule set {} with {} rules",
            rules.version(),
            rules.rules().len()
        );

        Ok(Self {
            projects:  ProjectRewriter::new(rules),
            solutions: SolutionRewriter::new(config.solution.retired_platform.clone()),
            matcher:   FileMatcher::new(&config.files)?,
        })
    }

    /// Walk `root`, printing `Fixed <path>` for every project that changed
    pub fn run(&self, root: &Path) -> MigrateResult<MigrationSummary> {
        self.run_with(root, |path| println!("Fixed {}", path.display()))
    }

    /// Like [`Migrator::run`], reporting fixed projects to `on_fixed`
    pub fn run_with<F>(&self, root: &Path, mut on_fixed: F) -> MigrateResult<MigrationSummary>
    where
        F: FnMut(&Path),
    {
        info!("Migrating {}", root.display());
        let mut summary = MigrationSummary::default();

        walk(root, &self.matcher, |kind, path| {
            match kind {
                FileKind::Project => {
                    summary.projects_scanned += 1;
                    let outcome = self.projects.fix_project(path)?;
                    if outcome.changed() {
                        debug!("{}: {}", path.display(), outcome.applied.join(", "));
                        on_fixed(path);
                        summary.fixed_projects.push(outcome.path);
                    }
                },
                FileKind::Solution => {
                    let removed = self.solutions.fix_solution(path)?;
                    debug!("{}: removed {} lines", path.display(), removed);
                    summary.solutions_rewritten += 1;
                },
            }
            Ok(())
        })?;

        info!(
            "Scanned {} projects, fixed {}, rewrote {} solutions",
            summary.projects_scanned,
            summary.fixed_projects.len(),
            summary.solutions_rewritten
        );
        Ok(summary)
    }
}
