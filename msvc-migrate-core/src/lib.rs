//! MSVC Migrate Core - Batch migration engine for Visual Studio C++ projects
//!
//! This library walks a directory tree and brings every `.vcxproj` project and
//! `.sln` solution it finds up to a newer toolchain configuration: Windows SDK
//! version, ClangCL toolset, warning policy, language standard, and removal of
//! retired Win32 configurations.
//!
//! # Architecture
//!
//! - **Walker** ([`walker`]): depth-first traversal that classifies files by
//!   glob pattern
//! - **Project Rewriter** ([`project`]): parses a project into a
//!   whitespace-preserving [`Document`], runs an ordered [`RuleSet`] over it
//!   and saves only when a rule changed something
//! - **Solution Rewriter** ([`solution`]): drops every line naming the retired
//!   platform
//! - **Migrator** ([`migrator`]): ties the three together for one run
//!
//! Rules are data. The built-in tables are versioned by [`RuleSetVersion`]
//! and extended from [`MigrationConfig::extra_rules`].

#![forbid(unsafe_code)]
// Lints configured in Cargo.toml

// Core modules
pub mod config;
pub mod document;
pub mod error;
pub mod exceptions;
pub mod migrator;
pub mod project;
pub mod rules;
pub mod selector;
pub mod solution;
pub mod walker;

// Public API
pub use config::{
    MigrationConfig,
    CONFIG_FILE_NAME,
};
pub use document::{
    Document,
    DocumentError,
};
pub use error::{
    MigrateError,
    MigrateResult,
};
pub use migrator::{
    MigrationSummary,
    Migrator,
};
pub use project::{
    ProjectOutcome,
    ProjectRewriter,
};
pub use rules::{
    RuleSet,
    RuleSetVersion,
};
pub use selector::{
    Namespaces,
    Selector,
};
pub use solution::SolutionRewriter;
pub use walker::{
    FileKind,
    FileMatcher,
};

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
