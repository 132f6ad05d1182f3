//! Edit rules and the versioned rule tables
//!
//! A rule selects elements, optionally steps into a named child (created
//! when missing), and edits the text or removes the element. The built-in
//! tables are plain data built from [`MigrationConfig`]; order matters
//! because later rules see the edits of earlier ones.

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    trace,
};

use crate::{
    config::{
        MigrationConfig,
        RuleActionKind,
        RuleSpec,
    },
    document::{
        Document,
        Element,
    },
    error::{
        MigrateError,
        MigrateResult,
    },
    exceptions,
    selector::{
        literal,
        Namespaces,
        Selector,
    },
};

/// Built-in rule table revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetVersion {
    /// Platform version, toolset, warnings-as-errors and language standard
    Initial,
    /// Adds warning level, the warning flag and Win32 configuration removal
    #[default]
    Current,
}

impl std::fmt::Display for RuleSetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSetVersion::Initial => write!(f, "initial"),
            RuleSetVersion::Current => write!(f, "current"),
        }
    }
}

/// Edit applied to an element's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    /// Replace the text
    Set(String),
    /// Append `value` after `separator`; an empty text takes the bare value
    /// and nothing happens when the value is already at the end
    Append {
        value:     String,
        separator: String,
    },
    /// Prepend unless the text already contains `unless_contains`
    Prepend {
        text:            String,
        unless_contains: String,
    },
    /// Remove a leading token when present
    StripPrefix(String),
}

impl TextEdit {
    /// Apply to `element`; `false` when the text was already in shape
    pub fn apply(&self, element: &mut Element) -> bool {
        let current = element.text();
        match self {
            TextEdit::Set(value) => element.set_text(value),
            TextEdit::Append { value, separator } => {
                if current.trim().is_empty() {
                    return element.set_text(value);
                }
                if current == *value || current.ends_with(&format!("{}{}", separator, value)) {
                    return false;
                }
                element.set_text(&format!("{}{}{}", current, separator, value))
            },
            TextEdit::Prepend {
                text,
                unless_contains,
            } => {
                if current.contains(unless_contains.as_str()) {
                    return false;
                }
                element.set_text(&format!("{}{}", text, current))
            },
            TextEdit::StripPrefix(prefix) => match current.strip_prefix(prefix.as_str()) {
                Some(rest) => element.set_text(rest),
                None => false,
            },
        }
    }
}

/// What a rule does to each selected element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Edit(TextEdit),
    Remove,
    /// Insert an empty element ahead of the selected element's children;
    /// a rule child does not apply
    InsertFirst(String),
}

/// Precondition that must hold for a rule to run at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The project's file name equals this value
    FileName(String),
    /// The selector matches at least one element
    Present(Selector),
    /// The selector matches nothing
    Absent(Selector),
}

impl Guard {
    fn allows(&self, doc: &Document, file_name: &str) -> bool {
        match self {
            Guard::FileName(name) => file_name == name,
            Guard::Present(selector) => selector.matches_any(doc),
            Guard::Absent(selector) => !selector.matches_any(doc),
        }
    }
}

/// One entry of a rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRule {
    name:       String,
    selector:   Selector,
    child:      Option<String>,
    action:     Action,
    guards:     Vec<Guard>,
    first_only: bool,
}

impl EditRule {
    pub fn new(name: impl Into<String>, selector: Selector, action: Action) -> Self {
        Self {
            name: name.into(),
            selector,
            child: None,
            action,
            guards: Vec::new(),
            first_only: false,
        }
    }

    /// Replace the text of every selected element
    pub fn set(name: impl Into<String>, selector: Selector, value: impl Into<String>) -> Self {
        Self::new(name, selector, Action::Edit(TextEdit::Set(value.into())))
    }

    pub fn remove(name: impl Into<String>, selector: Selector) -> Self {
        Self::new(name, selector, Action::Remove)
    }

    /// Operate on this child of each selected element instead of the element
    pub fn on_child(mut self, child: impl Into<String>) -> Self {
        self.child = Some(child.into());
        self
    }

    /// Add a precondition; every guard must hold
    pub fn when(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Only touch the first match in document order
    pub fn first_match(mut self) -> Self {
        self.first_only = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Apply the rule; `true` when the document changed
    pub fn apply(&self, doc: &mut Document, file_name: &str) -> bool {
        if !self.guards.iter().all(|guard| guard.allows(doc, file_name)) {
            return false;
        }

        let mut paths = self.selector.select(doc);
        if self.first_only {
            paths.truncate(1);
        }

        let mut changed = false;
        // Reverse document order keeps the remaining paths valid while
        // elements are inserted or removed.
        for path in paths.into_iter().rev() {
            changed |= match (&self.action, &self.child) {
                (Action::Remove, None) => doc.remove(&path),
                (Action::Remove, Some(child)) => doc
                    .element_mut(&path)
                    .is_some_and(|element| element.remove_child(child)),
                (Action::Edit(edit), None) => doc
                    .element_mut(&path)
                    .is_some_and(|element| edit.apply(element)),
                (Action::Edit(edit), Some(child)) => match doc.find_or_create_child(&path, child) {
                    Some((target, created)) => {
                        // `|` so the edit runs even when the child was just created
                        edit.apply(target) | created
                    },
                    None => false,
                },
                (Action::InsertFirst(name), _) => doc.prepend_child(&path, name).is_some(),
            };
        }
        changed
    }
}

/// An ordered rule table ready to run against project documents
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: RuleSetVersion,
    rules:   Vec<EditRule>,
}

impl RuleSet {
    /// Build the table selected by `config.rule_set`, followed by the
    /// configured extra rules and the `ksuser.lib` exceptions
    pub fn from_config(config: &MigrationConfig) -> MigrateResult<Self> {
        let namespaces = namespaces(config);

        let mut rules = built_in_rules(config, &namespaces)?;
        for spec in &config.extra_rules {
            rules.push(compile_spec(spec, &namespaces)?);
        }
        rules.push(exceptions::library_dependency(config, &namespaces)?);
        rules.extend(exceptions::console_subsystem(config, &namespaces)?);

        Ok(Self {
            version: config.rule_set,
            rules,
        })
    }

    pub fn version(&self) -> RuleSetVersion {
        self.version
    }

    pub fn rules(&self) -> &[EditRule] {
        &self.rules
    }

    /// Run every rule in order, returning the names of those that changed
    /// the document
    pub fn apply(&self, doc: &mut Document, file_name: &str) -> Vec<String> {
        let mut applied = Vec::new();
        for rule in &self.rules {
            if rule.apply(doc, file_name) {
                debug!("{}: rule `{}` changed the project", file_name, rule.name());
                applied.push(rule.name().to_string());
            } else {
                trace!("{}: rule `{}` left the project unchanged", file_name, rule.name());
            }
        }
        applied
    }
}

/// Namespace bindings shared by every selector of a run
pub fn namespaces(config: &MigrationConfig) -> Namespaces {
    Namespaces::new()
        .with_default(config.namespace.uri.clone())
        .with_prefix(config.namespace.prefix.clone(), config.namespace.uri.clone())
}

/// Selector text with `{ms}` standing for the configured prefix
pub(crate) fn select(
    template: &str,
    config: &MigrationConfig,
    namespaces: &Namespaces,
) -> MigrateResult<Selector> {
    let source = template.replace("{ms}", &config.namespace.prefix);
    Selector::parse(&source, namespaces)
}

/// Expression MSBuild uses to restrict a group to one configuration
pub fn configuration_condition(label: &str) -> String {
    format!("'$(Configuration)|$(Platform)'=='{}'", label)
}

fn built_in_rules(config: &MigrationConfig, ns: &Namespaces) -> MigrateResult<Vec<EditRule>> {
    let project = &config.project;
    let current = config.rule_set == RuleSetVersion::Current;
    let cl_compile = "/{ms}:Project/{ms}:ItemDefinitionGroup[@Condition]/{ms}:ClCompile";

    let platform_version =
        select("/{ms}:Project/{ms}:PropertyGroup/{ms}:WindowsTargetPlatformVersion", config, ns)?;
    let unconditioned_group = select("/{ms}:Project/{ms}:PropertyGroup[not(@Condition)]", config, ns)?;

    let mut rules = vec![
        EditRule::set(
            "platform-version",
            platform_version.clone(),
            project.platform_version.clone(),
        ),
        // Missing version: Globals group, else the first unconditioned group,
        // else a new group at the top of the project
        EditRule::set(
            "platform-version-globals",
            select("/{ms}:Project/{ms}:PropertyGroup[@Label='Globals']", config, ns)?,
            project.platform_version.clone(),
        )
        .first_match()
        .on_child("WindowsTargetPlatformVersion")
        .when(Guard::Absent(platform_version.clone())),
        EditRule::new(
            "platform-version-group",
            select("/{ms}:Project", config, ns)?,
            Action::InsertFirst("PropertyGroup".to_string()),
        )
        .when(Guard::Absent(platform_version.clone()))
        .when(Guard::Absent(unconditioned_group.clone())),
        EditRule::set(
            "platform-version-property-group",
            unconditioned_group,
            project.platform_version.clone(),
        )
        .first_match()
        .on_child("WindowsTargetPlatformVersion")
        .when(Guard::Absent(platform_version)),
        EditRule::set(
            "platform-toolset",
            select("/{ms}:Project/{ms}:PropertyGroup/{ms}:PlatformToolset", config, ns)?,
            project.platform_toolset.clone(),
        ),
    ];

    if current {
        rules.push(EditRule::set(
            "warning-level",
            select(&format!("{}/{{ms}}:WarningLevel", cl_compile), config, ns)?,
            project.warning_level.clone(),
        ));
    }

    rules.push(EditRule::set(
        "warnings-as-errors",
        select(&format!("{}/{{ms}}:TreatWarningAsError", cl_compile), config, ns)?,
        project.treat_warning_as_error.clone(),
    ));

    if current {
        rules.push(
            EditRule::new(
                "ignore-warnings-as-errors",
                select(cl_compile, config, ns)?,
                Action::Edit(TextEdit::Append {
                    value:     project.warning_flag.clone(),
                    separator: " ".to_string(),
                }),
            )
            .on_child("AdditionalOptions"),
        );
    }

    rules.push(
        EditRule::set(
            "language-standard",
            select(cl_compile, config, ns)?,
            project.language_standard.clone(),
        )
        .on_child("LanguageStandard"),
    );

    if current {
        for label in &project.retired_configurations {
            rules.push(EditRule::remove(
                format!("retired-item {}", label),
                select(&format!("//*[@Include={}]", literal(label)?), config, ns)?,
            ));
        }
        for label in &project.retired_configurations {
            let condition = literal(&configuration_condition(label))?;
            rules.push(EditRule::remove(
                format!("retired-group {}", label),
                select(&format!("//*[@Condition={}]", condition), config, ns)?,
            ));
        }
    }

    Ok(rules)
}

fn compile_spec(spec: &RuleSpec, ns: &Namespaces) -> MigrateResult<EditRule> {
    let name = spec.name.clone().unwrap_or_else(|| spec.selector.clone());
    let selector = Selector::parse(&spec.selector, ns)?;
    let value = || {
        spec.value.clone().ok_or_else(|| {
            MigrateError::Config(format!("rule `{}` needs a `value` for its action", name))
        })
    };

    let action = match spec.action {
        RuleActionKind::Set => Action::Edit(TextEdit::Set(value()?)),
        RuleActionKind::Append => Action::Edit(TextEdit::Append {
            value:     value()?,
            separator: String::new(),
        }),
        RuleActionKind::Prepend => {
            let text = value()?;
            Action::Edit(TextEdit::Prepend {
                unless_contains: text.clone(),
                text,
            })
        },
        RuleActionKind::StripPrefix => Action::Edit(TextEdit::StripPrefix(value()?)),
        RuleActionKind::Remove => Action::Remove,
    };

    let rule = EditRule::new(name, selector, action);
    Ok(match &spec.child {
        Some(child) => rule.on_child(child.clone()),
        None => rule,
    })
}
