//! Integration tests for the msvc-migrate binary

use std::{
    fs,
    path::Path,
    process::{
        Command,
        Output,
    },
};

use tempfile::TempDir;

const STALE_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup Label="Globals">
    <WindowsTargetPlatformVersion>8.1</WindowsTargetPlatformVersion>
  </PropertyGroup>
  <PropertyGroup Condition="'$(Configuration)|$(Platform)'=='Release|x64'" Label="Configuration">
    <PlatformToolset>v141</PlatformToolset>
  </PropertyGroup>
</Project>
"#;

fn msvc_migrate(args: &[&str]) -> std::io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_msvc-migrate"))
        .args(args)
        .env_remove("MSVC_MIGRATE_LOG")
        .output()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_prints_fixed_projects_only() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir(root.join("app"))?;
    fs::write(root.join("app/app.vcxproj"), STALE_PROJECT)?;
    fs::write(root.join("all.sln"), "Global\nDebug|Win32\nEndGlobal\n")?;

    let output = msvc_migrate(&[path_arg(root)])?;
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout)?,
        format!("Fixed {}\n", root.join("app/app.vcxproj").display())
    );
    assert_eq!(fs::read_to_string(root.join("all.sln"))?, "Global\nEndGlobal\n");

    let output = msvc_migrate(&[path_arg(root)])?;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn test_rule_set_flag_overrides_config() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::write(
        root.join("app.vcxproj"),
        r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup>
    <ProjectConfiguration Include="Debug|Win32" />
  </ItemGroup>
  <PropertyGroup Label="Globals">
    <WindowsTargetPlatformVersion>10.0.17763.0</WindowsTargetPlatformVersion>
  </PropertyGroup>
</Project>"#,
    )?;

    let output = msvc_migrate(&[path_arg(root), "--rule-set", "initial"])?;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(fs::read_to_string(root.join("app.vcxproj"))?.contains("Debug|Win32"));

    let output = msvc_migrate(&[path_arg(root), "--rule-set", "current"])?;
    assert!(output.status.success());
    assert!(!fs::read_to_string(root.join("app.vcxproj"))?.contains("Debug|Win32"));
    Ok(())
}

#[test]
fn test_explicit_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().join("tree");
    fs::create_dir(&root)?;
    fs::write(root.join("app.vcxproj"), STALE_PROJECT)?;
    let config = temp_dir.path().join("migrate.toml");
    fs::write(&config, "[project]\nplatform_toolset = \"v143\"\n")?;

    let output = msvc_migrate(&[path_arg(&root), "--config", path_arg(&config)])?;
    assert!(output.status.success());
    assert!(fs::read_to_string(root.join("app.vcxproj"))?
        .contains("<PlatformToolset>v143</PlatformToolset>"));
    Ok(())
}

#[test]
fn test_failure_exits_with_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("broken.vcxproj"), "<Project><PropertyGroup></Project>")?;

    let output = msvc_migrate(&[path_arg(temp_dir.path())])?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("broken.vcxproj"));
    Ok(())
}

#[test]
fn test_missing_root_argument_is_a_usage_error() -> Result<(), Box<dyn std::error::Error>> {
    let output = msvc_migrate(&[])?;
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    Ok(())
}
