use anyhow::Context;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use steward::{
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands, WorkflowCommands,
    },
    utils::toml_config::{LogFormat, StewardConfig, StewardConfigManager},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            minimal,
            host,
            port,
        }) => {
            let result = init::run(
                InitConfig {
                    path,
                    force,
                    minimal,
                    host,
                    port,
                },
                &output,
            );
            if let InitResult::Error(_) = result {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Config { full, validate }) => show_config(&cli.config, full, validate, &output),
        Some(Commands::Workflow(cmd)) => show_workflows(&cli.config, cmd, &output),
        Some(Commands::Serve) | None => serve(&cli.config, cli.verbose).await,
    }
}

fn init_tracing(config: &StewardConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("steward={level},tower_http={level}")));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let config_manager = Arc::new(
        StewardConfigManager::new(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?,
    );
    let config = config_manager.config();
    init_tracing(&config, verbose);

    let state = AppState::from_config(config_manager.clone())
        .await
        .context("Failed to initialize application state")?;
    tracing::info!(
        workflows = config.workflows.len(),
        strict_actions = config.engine.strict_actions,
        "Engine ready"
    );

    if config.engine.sweep_interval_secs > 0 {
        spawn_sweeper(state.clone(), Duration::from_secs(config.engine.sweep_interval_secs));
    }

    #[cfg(unix)]
    spawn_reload_on_hangup(state.clone())?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Steward listening on http://{}", addr);

    axum::serve(listener, steward::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically expire overdue approval gates
fn spawn_sweeper(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match state.engine.expire_overdue(Utc::now()).await {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!(count = expired.len(), "Expired overdue approvals")
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Expiry sweep failed: {}", e),
            }
        }
    });
    tracing::info!(interval_secs = every.as_secs(), "Expiry sweeper started");
}

/// Reload steward.toml and re-register its workflows on SIGHUP. Engine,
/// storage and notifier settings keep their startup values.
#[cfg(unix)]
fn spawn_reload_on_hangup(state: AppState) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            if let Err(e) = state.config_manager.reload() {
                tracing::warn!("Failed to reload config: {}. Keeping previous config.", e);
                continue;
            }
            match state.seed_workflows().await {
                Ok(n) => tracing::info!(workflows = n, "Workflows re-registered"),
                Err(e) => tracing::error!("Failed to register workflows: {}", e),
            }
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn load_or_exit(config_path: &Path, output: &Output) -> StewardConfig {
    match StewardConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            output.fail(&format!("{}: {}", config_path.display(), e));
            std::process::exit(1);
        }
    }
}

fn show_config(config_path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = load_or_exit(config_path, output);

    output.title("Configuration");
    output.field("File", &config_path.display().to_string());
    output.field(
        "Server",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    output.field("Database", &config.database.url);
    output.field(
        "Notifications",
        config
            .notifications
            .webhook_url
            .as_deref()
            .unwrap_or("log only"),
    );
    output.field("Workflows", &config.workflows.len().to_string());

    if validate {
        output.section("Validation");
        let known = builtin_action_types();
        match config.validate_with_warnings(&known) {
            Ok(warnings) => {
                output.config_warnings(&warnings);
                output.ok("Configuration is valid");
            }
            Err(e) => {
                output.fail(&e.to_string());
                std::process::exit(1);
            }
        }
    }

    if full {
        output.section("Full configuration");
        let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        println!("{}", text);
    }

    Ok(())
}

fn show_workflows(config_path: &Path, cmd: WorkflowCommands, output: &Output) -> anyhow::Result<()> {
    let config = load_or_exit(config_path, output);

    match cmd {
        WorkflowCommands::List => {
            output.title("Workflows");
            if config.workflows.is_empty() {
                output.note("No workflows configured");
                return Ok(());
            }
            output.workflow_table(&config.workflows);
        }
        WorkflowCommands::Show { id } => {
            let Some(wf) = config.get_workflow(&id) else {
                output.fail(&format!("Workflow '{}' not found", id));
                std::process::exit(1);
            };
            output.title(&wf.name);
            output.field("Id", &wf.id);
            if let Some(ref description) = wf.description {
                output.field("Description", description);
            }
            output.section("Steps");
            output.steps(&wf.steps);
        }
    }

    Ok(())
}

/// Action types the server registers at startup
fn builtin_action_types() -> Vec<String> {
    let store = Arc::new(steward::MemoryStore::new());
    steward::ActionRegistry::with_default_actions(store, Arc::new(steward::notify::LogNotifier))
        .action_types()
}
