//! Init command implementation
//!
//! Scaffolds a Steward deployment: `steward.toml`, `.env.example`, the
//! `data/` directory and a `.gitignore`.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (steward.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Leave out the sample workflow
    pub minimal: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.title("Initializing Steward");

    let base_path = &config.path;

    let config_path = base_path.join("steward.toml");
    if config_path.exists() && !config.force {
        output.warn("steward.toml already exists, pass --force to overwrite it");
        return InitResult::AlreadyExists;
    }

    let data_dir = base_path.join("data");
    if !data_dir.exists() {
        if let Err(e) = fs::create_dir_all(&data_dir) {
            output.fail(&format!("Failed to create data: {}", e));
            return InitResult::Error(e.to_string());
        }
        output.scaffolded("data/", None);
    } else {
        output.scaffolded("data/", Some("already exists"));
    }

    let toml_content = generate_steward_toml(&config);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.fail(&format!("Failed to create steward.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.scaffolded("steward.toml", None);

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, generate_env_example(), config.force) {
        output.fail(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.scaffolded(".env.example", None);

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, generate_gitignore(), false) {
            output.warn(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.scaffolded(".gitignore", None);
        }
    }

    output.ok("Steward initialized");

    output.section("Next steps");
    output.next_step(1, "Review the workflows in steward.toml", "steward-server config --validate");
    output.next_step(2, "Start the server", "steward-server");
    output.note(&format!(
        "The API will listen on http://{}:{}/api",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_steward_toml(config: &InitConfig) -> String {
    let workflows = if config.minimal {
        "# Add [[workflows]] entries here, or POST them to /api/workflows\n"
    } else {
        SAMPLE_WORKFLOW
    };

    format!(
        r#"# Steward Configuration
# =====================
# Generated by: steward-server init
#
# Send SIGHUP to reload this file and re-register its workflows.

# =============================================================================
# Server Configuration
# =============================================================================
[server]
host = "{host}"
port = {port}
log_level = "info"
# "pretty" or "json"
log_format = "pretty"

# =============================================================================
# Database Configuration
# =============================================================================
[database]
# Path to a local database file, or ":memory:"
url = "./data/steward.db"
# For remote Turso (build with --features turso):
# turso_url_env = "TURSO_DATABASE_URL"
# turso_token_env = "TURSO_AUTH_TOKEN"

# =============================================================================
# Engine
# =============================================================================
[engine]
max_conflict_retries = 5
# Fail steps with unregistered action types instead of skipping them
strict_actions = false
# Seconds between expiry sweeps (0 disables the built-in sweeper)
sweep_interval_secs = 60

# =============================================================================
# Notifications
# =============================================================================
[notifications]
# webhook_url = "https://example.internal/hooks/steward"
timeout_ms = 5000

# =============================================================================
# Workflows
# =============================================================================
{workflows}"#,
        host = config.host,
        port = config.port,
        workflows = workflows,
    )
}

const SAMPLE_WORKFLOW: &str = r#"[[workflows]]
id = "document-review"
name = "Document review"
description = "Open a review task, wait for a manager, then notify the author"

[[workflows.steps]]
id = "open-task"
type = "action"
action_type = "create_task"
parameters = { title = "Review {{document}}", due_in_days = 2 }

[[workflows.steps]]
id = "manager-approval"
type = "approval"
approvers = ["manager1", "manager2"]
approval_type = "any"
timeout_secs = 172800

[[workflows.steps]]
id = "notify-author"
type = "action"
action_type = "send_notification"
parameters = { recipient = "{{author}}", message = "{{document}} was approved" }
"#;

fn generate_env_example() -> &'static str {
    r#"# Steward environment
# Copy to .env and adjust

# Log filter (overrides server.log_level)
# RUST_LOG=steward=debug,tower_http=info

# Remote Turso database (only with the turso feature)
# TURSO_DATABASE_URL=libsql://your-db.turso.io
# TURSO_AUTH_TOKEN=
"#
}

fn generate_gitignore() -> &'static str {
    r#"# Steward
/data/
*.db
.env
"#
}
