//! Configuration management for the migration engine
//!
//! Every literal the migration writes lives here. The defaults reproduce the
//! ClangCL / Windows 10 SDK migration; a `msvc-migrate.toml` file can
//! override any of them and declare additional rules.

use std::path::Path;

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    error::{
        MigrateError,
        MigrateResult,
    },
    rules::RuleSetVersion,
};

/// Name of the configuration file looked up in the migration root
pub const CONFIG_FILE_NAME: &str = "msvc-migrate.toml";

/// MSBuild 2003 project namespace
pub const MSBUILD_NAMESPACE: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

/// Complete migration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Which built-in rule table to apply
    pub rule_set:    RuleSetVersion,
    pub namespace:   NamespaceSettings,
    pub files:       FilePatterns,
    pub project:     ProjectSettings,
    pub solution:    SolutionSettings,
    pub exceptions:  ExceptionSettings,
    /// User rules applied after the built-in table
    pub extra_rules: Vec<RuleSpec>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            rule_set:    RuleSetVersion::default(),
            namespace:   NamespaceSettings::default(),
            files:       FilePatterns::default(),
            project:     ProjectSettings::default(),
            solution:    SolutionSettings::default(),
            exceptions:  ExceptionSettings::default(),
            extra_rules: Vec::new(),
        }
    }
}

/// Namespace bound to unprefixed names and to `prefix` in selectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamespaceSettings {
    pub uri:    String,
    pub prefix: String,
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        Self {
            uri:    MSBUILD_NAMESPACE.to_string(),
            prefix: "ms".to_string(),
        }
    }
}

/// Glob patterns matched against file names (case-insensitive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilePatterns {
    pub project:  Vec<String>,
    pub solution: Vec<String>,
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            project:  vec!["*.vcxproj".to_string()],
            solution: vec!["*.sln".to_string()],
        }
    }
}

/// Values written into project files by the built-in rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSettings {
    pub platform_version:        String,
    pub platform_toolset:        String,
    pub warning_level:           String,
    pub treat_warning_as_error:  String,
    /// Compiler flag appended to `AdditionalOptions`, space separated
    pub warning_flag:            String,
    pub language_standard:       String,
    /// `Configuration|Platform` labels whose items and groups are deleted
    pub retired_configurations:  Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            platform_version:       "10.0.17763.0".to_string(),
            platform_toolset:       "ClangCL".to_string(),
            warning_level:          "Level4".to_string(),
            treat_warning_as_error: "false".to_string(),
            warning_flag:           "-Wno-error".to_string(),
            language_standard:      "stdcpp17".to_string(),
            retired_configurations: vec!["Debug|Win32".to_string(), "Release|Win32".to_string()],
        }
    }
}

/// Solution filtering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolutionSettings {
    /// Lines containing this token are dropped
    pub retired_platform: String,
}

impl Default for SolutionSettings {
    fn default() -> Self {
        Self {
            retired_platform: "Win32".to_string(),
        }
    }
}

/// Literals used by the `ksuser.lib` exceptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExceptionSettings {
    /// Library dependency moved from the audio library onto console programs
    pub dependency:         String,
    pub separator:          String,
    /// File name of the library project that must not carry the dependency
    pub library_project:    String,
    pub console_subsystem:  String,
    pub debug_information:  String,
    pub deployment_content: String,
}

impl Default for ExceptionSettings {
    fn default() -> Self {
        Self {
            dependency:         "ksuser.lib".to_string(),
            separator:          ";".to_string(),
            library_project:    "portaudio.vcxproj".to_string(),
            console_subsystem:  "Console".to_string(),
            debug_information:  "DebugFull".to_string(),
            deployment_content: "false".to_string(),
        }
    }
}

/// What a configured rule does to the elements it selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleActionKind {
    Set,
    Append,
    Prepend,
    StripPrefix,
    Remove,
}

/// A rule declared in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub name:     Option<String>,
    pub selector: String,
    /// Child element to find or create under each selected element
    pub child:    Option<String>,
    pub action:   RuleActionKind,
    pub value:    Option<String>,
}

impl MigrationConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MigrateError::io(path, e))?;
        toml::from_str(&content).map_err(|source| MigrateError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `msvc-migrate.toml` from `root` if present, else use defaults
    pub fn discover(root: &Path) -> MigrateResult<Self> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::info!("Using configuration {}", candidate.display());
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}
