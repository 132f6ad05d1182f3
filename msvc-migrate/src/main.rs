//! msvc-migrate - Batch migration tool for Visual Studio C++ projects
//!
//! Walks a directory tree and rewrites every project and solution file it
//! finds, printing `Fixed <path>` for each project that changed.

use std::{
    path::PathBuf,
    process,
};

use anyhow::{
    Context,
    Result,
};
use clap::Parser;
use colored::Colorize;
use msvc_migrate_core::{
    MigrationConfig,
    Migrator,
    RuleSetVersion,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Migrate .vcxproj and .sln files under a directory to the current toolchain
#[derive(Parser, Debug)]
#[command(name = "msvc-migrate")]
#[command(
    version,
    about = "Migrate Visual Studio C++ projects and solutions under a directory",
    long_about = "
Migrate Visual Studio C++ projects and solutions under a directory

Every *.vcxproj below ROOT gets the configured Windows SDK version, toolset,
warning policy and language standard; Win32 configurations are removed.
Every *.sln below ROOT loses the lines that mention Win32.

Examples:
  msvc-migrate ./src
  msvc-migrate ./src --rule-set initial
  msvc-migrate ./src --config migrate.toml --log-level debug

Configuration:
  Without --config, ROOT/msvc-migrate.toml is used when it exists.
"
)]
struct Cli {
    /// Directory to migrate
    root: PathBuf,

    /// Configuration file (defaults to ROOT/msvc-migrate.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Built-in rule table, overriding the configuration
    #[arg(long, value_enum)]
    rule_set: Option<RuleSetArg>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "MSVC_MIGRATE_LOG")]
    log_level: String,
}

/// Built-in rule tables
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RuleSetArg {
    /// Platform version, toolset, warnings-as-errors, language standard
    Initial,
    /// Initial rules plus warning level, warning flag and Win32 removal
    Current,
}

impl From<RuleSetArg> for RuleSetVersion {
    fn from(arg: RuleSetArg) -> Self {
        match arg {
            RuleSetArg::Initial => RuleSetVersion::Initial,
            RuleSetArg::Current => RuleSetVersion::Current,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "error:".bright_red(), e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level.parse::<Level>().unwrap_or(Level::WARN))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default tracing subscriber")?;

    let mut config = match &cli.config {
        Some(path) => MigrationConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => MigrationConfig::discover(&cli.root).context("Failed to load configuration")?,
    };
    if let Some(rule_set) = cli.rule_set {
        config.rule_set = rule_set.into();
    }

    let migrator = Migrator::new(&config).context("Invalid migration rules")?;
    let summary = migrator
        .run(&cli.root)
        .with_context(|| format!("Migration of {} failed", cli.root.display()))?;

    tracing::info!(
        "{} of {} projects fixed",
        summary.fixed_projects.len(),
        summary.projects_scanned
    );
    Ok(())
}
