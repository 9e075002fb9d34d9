//! CLI integration tests for steward-server
//!
//! Run the built binary against temporary directories and check the init,
//! config and workflow commands.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Run steward-server with arguments, colors off
fn run_steward(args: &[&str], working_dir: Option<&std::path::Path>) -> std::process::Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_steward-server"));
    cmd.arg("--no-color").args(args);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    cmd.output().expect("Failed to execute steward-server")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let output = run_steward(&["--help"], None);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("init"));
    assert!(text.contains("config"));
    assert!(text.contains("workflow"));
}

#[test]
fn test_version() {
    let output = run_steward(&["--version"], None);
    assert!(output.status.success());
    assert!(stdout(&output).contains("steward-server"));
}

// =============================================================================
// Init
// =============================================================================

#[test]
fn test_init_scaffolds_project() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_str().unwrap();

    let output = run_steward(&["init", path], None);
    assert!(output.status.success(), "init failed: {:?}", output);

    let config = fs::read_to_string(temp_dir.path().join("steward.toml")).unwrap();
    assert!(config.contains("[server]"));
    assert!(config.contains("[engine]"));
    assert!(config.contains("[[workflows]]"));
    assert!(temp_dir.path().join("data").is_dir());
    assert!(temp_dir.path().join(".env.example").exists());
}

#[test]
fn test_init_minimal_has_no_workflows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_str().unwrap();

    let output = run_steward(&["init", path, "--minimal"], None);
    assert!(output.status.success());

    let config = fs::read_to_string(temp_dir.path().join("steward.toml")).unwrap();
    assert!(!config.contains("[[workflows]]"));
}

#[test]
fn test_init_keeps_existing_config_without_force() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("steward.toml");
    fs::write(&config_path, "# mine\n").unwrap();

    let output = run_steward(&["init", temp_dir.path().to_str().unwrap()], None);
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine\n");

    let output = run_steward(&["init", temp_dir.path().to_str().unwrap(), "--force"], None);
    assert!(output.status.success());
    assert!(fs::read_to_string(&config_path).unwrap().contains("[server]"));
}

// =============================================================================
// Config and workflow inspection
// =============================================================================

#[test]
fn test_config_validate_on_generated_config() {
    let temp_dir = TempDir::new().unwrap();
    run_steward(&["init", "."], Some(temp_dir.path()));

    let output = run_steward(&["config", "--validate"], Some(temp_dir.path()));
    assert!(output.status.success(), "validate failed: {:?}", output);
    assert!(stdout(&output).contains("Configuration is valid"));
}

#[test]
fn test_config_validate_rejects_bad_workflow() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("steward.toml"),
        r#"
[[workflows]]
id = "broken"
name = "Broken"
steps = []
"#,
    )
    .unwrap();

    let output = run_steward(&["config", "--validate"], Some(temp_dir.path()));
    assert!(!output.status.success());
}

#[test]
fn test_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_steward(&["config"], Some(temp_dir.path()));
    assert!(!output.status.success());
}

#[test]
fn test_workflow_list_and_show() {
    let temp_dir = TempDir::new().unwrap();
    run_steward(&["init", "."], Some(temp_dir.path()));

    let output = run_steward(&["workflow", "list"], Some(temp_dir.path()));
    assert!(output.status.success());
    assert!(stdout(&output).contains("document-review"));

    let output = run_steward(&["workflow", "show", "document-review"], Some(temp_dir.path()));
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("manager-approval"));
    assert!(text.contains("create_task"));

    let output = run_steward(&["workflow", "show", "nope"], Some(temp_dir.path()));
    assert!(!output.status.success());
}
