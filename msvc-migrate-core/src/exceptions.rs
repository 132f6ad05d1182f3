//! Project-specific exceptions for the `ksuser.lib` dependency
//!
//! The dependency is stripped from PortAudio's library project and added to
//! every console program instead. These rules run after the generic table
//! and the configured extra rules.

use crate::{
    config::MigrationConfig,
    error::MigrateResult,
    rules::{
        select,
        Action,
        EditRule,
        Guard,
        TextEdit,
    },
    selector::{
        literal,
        Namespaces,
    },
};

const LINK: &str = "/{ms}:Project/{ms}:ItemDefinitionGroup[@Condition]/{ms}:Link";

/// Strip the leading dependency from the audio library's own link inputs
pub fn library_dependency(config: &MigrationConfig, ns: &Namespaces) -> MigrateResult<EditRule> {
    let exceptions = &config.exceptions;
    let token = format!("{}{}", exceptions.dependency, exceptions.separator);

    Ok(EditRule::new(
        "library-dependency-exception",
        select("/{ms}:Project/{ms}:ItemDefinitionGroup/{ms}:Lib/{ms}:AdditionalDependencies", config, ns)?,
        Action::Edit(TextEdit::StripPrefix(token)),
    )
    .when(Guard::FileName(exceptions.library_project.clone())))
}

/// Console programs get full debug information and the dependency
pub fn console_subsystem(config: &MigrationConfig, ns: &Namespaces) -> MigrateResult<Vec<EditRule>> {
    let exceptions = &config.exceptions;
    let console_link = format!(
        "{}[{{ms}}:SubSystem={}]",
        LINK,
        literal(&exceptions.console_subsystem)?
    );

    Ok(vec![
        EditRule::set(
            "deployment-content-exception",
            select("/{ms}:Project/{ms}:ItemGroup/{ms}:Image/{ms}:DeploymentContent", config, ns)?,
            exceptions.deployment_content.clone(),
        )
        .when(Guard::Present(select(LINK, config, ns)?)),
        EditRule::set(
            "console-debug-information-exception",
            select(&format!("{}/{{ms}}:GenerateDebugInformation", console_link), config, ns)?,
            exceptions.debug_information.clone(),
        ),
        EditRule::new(
            "console-dependency-exception",
            select(&format!("{}/{{ms}}:AdditionalDependencies", console_link), config, ns)?,
            Action::Edit(TextEdit::Prepend {
                text:            format!("{}{}", exceptions.dependency, exceptions.separator),
                unless_contains: exceptions.dependency.clone(),
            }),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document::Document,
        rules::namespaces,
    };

    const CONSOLE_APP: &str = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Debug|x64'">
    <Link>
      <SubSystem>Console</SubSystem>
      <GenerateDebugInformation>true</GenerateDebugInformation>
      <AdditionalDependencies>winmm.lib;%(AdditionalDependencies)</AdditionalDependencies>
    </Link>
  </ItemDefinitionGroup>
  <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Release|x64'">
    <Link>
      <SubSystem>Windows</SubSystem>
      <GenerateDebugInformation>true</GenerateDebugInformation>
      <AdditionalDependencies>winmm.lib</AdditionalDependencies>
    </Link>
  </ItemDefinitionGroup>
  <ItemGroup>
    <Image Include="app.ico">
      <DeploymentContent>true</DeploymentContent>
    </Image>
  </ItemGroup>
</Project>"#;

    const PORTAUDIO: &str = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Debug|x64'">
    <Lib>
      <AdditionalDependencies>ksuser.lib;%(AdditionalDependencies)</AdditionalDependencies>
    </Lib>
  </ItemDefinitionGroup>
</Project>"#;

    fn apply_all(rules: &[EditRule], doc: &mut Document, file_name: &str) -> bool {
        rules
            .iter()
            .fold(false, |changed, rule| rule.apply(doc, file_name) | changed)
    }

    #[test]
    fn test_console_link_gains_dependency_and_debug_info() {
        let config = MigrationConfig::default();
        let rules = console_subsystem(&config, &namespaces(&config)).unwrap();
        let mut doc = Document::parse(CONSOLE_APP).unwrap();

        assert!(apply_all(&rules, &mut doc, "app.vcxproj"));
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.contains(
            "<AdditionalDependencies>ksuser.lib;winmm.lib;%(AdditionalDependencies)</AdditionalDependencies>"
        ));
        assert!(xml.contains("<GenerateDebugInformation>DebugFull</GenerateDebugInformation>"));
        assert!(xml.contains("<DeploymentContent>false</DeploymentContent>"));

        // Windows subsystem link untouched
        assert!(xml.contains("<AdditionalDependencies>winmm.lib</AdditionalDependencies>"));
        assert!(xml.contains("<GenerateDebugInformation>true</GenerateDebugInformation>"));

        assert!(!apply_all(&rules, &mut doc, "app.vcxproj"));
    }

    #[test]
    fn test_deployment_content_needs_a_link() {
        let config = MigrationConfig::default();
        let rules = console_subsystem(&config, &namespaces(&config)).unwrap();
        let mut doc = Document::parse(
            r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup><Image Include="a.png"><DeploymentContent>true</DeploymentContent></Image></ItemGroup>
</Project>"#,
        )
        .unwrap();

        assert!(!apply_all(&rules, &mut doc, "lib.vcxproj"));
    }

    #[test]
    fn test_library_dependency_only_for_named_project() {
        let config = MigrationConfig::default();
        let rule = library_dependency(&config, &namespaces(&config)).unwrap();

        let mut other = Document::parse(PORTAUDIO).unwrap();
        assert!(!rule.apply(&mut other, "other.vcxproj"));

        let mut doc = Document::parse(PORTAUDIO).unwrap();
        assert!(rule.apply(&mut doc, "portaudio.vcxproj"));
        assert!(doc
            .to_xml_string()
            .unwrap()
            .contains("<AdditionalDependencies>%(AdditionalDependencies)</AdditionalDependencies>"));
        assert!(!rule.apply(&mut doc, "portaudio.vcxproj"));
    }
}
