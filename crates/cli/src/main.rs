mod registry_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tendril_engine::{Engine, EngineOptions},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tendril", version, about = "Inspect and run a plugin-based CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Application root (the directory holding the root plugin descriptor).
    #[arg(long, global = true, env = "TENDRIL_ROOT", default_value = ".")]
    root: PathBuf,

    /// Ignore cached command discovery for this run.
    #[arg(long, global = true, default_value_t = false)]
    reset_cache: bool,

    /// Cache directory (overrides the application's default).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List commands.
    Commands {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Include hidden commands.
        #[arg(long)]
        hidden: bool,
    },
    /// List topics.
    Topics {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List plugins.
    Plugins {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show details about a command.
    Info {
        /// Command identifier (e.g. `config:set`).
        id: String,
    },
    /// Dispatch a lifecycle event to every registered hook.
    Hook {
        /// Event name.
        event: String,
        /// JSON payload merged into the hook context.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Run a command.
    Run {
        /// Command identifier.
        id: String,
        /// Arguments passed to the command.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Logs go to stderr so listings on stdout stay machine-readable.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), root = %cli.root.display(), "tendril starting");

    let options = EngineOptions {
        reset_cache: cli.reset_cache,
        cache_dir: cli.cache_dir.clone(),
    };
    let engine = match Engine::load(&cli.root, options).await {
        Ok(engine) => engine,
        Err(e) => exit_on_hook(e)?,
    };

    match cli.command {
        Commands::Commands { json, hidden } => {
            registry_commands::list_commands(&engine, json, hidden)?;
        },
        Commands::Topics { json } => registry_commands::list_topics(&engine, json)?,
        Commands::Plugins { json } => registry_commands::list_plugins(&engine, json)?,
        Commands::Info { id } => registry_commands::command_info(&engine, &id)?,
        Commands::Hook { event, payload } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            if let Err(e) = engine.run_hook(&event, payload).await {
                exit_on_hook::<()>(e)?;
            }
        },
        Commands::Run { id, args } => {
            if let Err(e) = engine.run_command(&id, &args).await {
                exit_on_hook::<()>(e)?;
            }
        },
    }

    Ok(())
}

/// Exit with the hook's code when a hook asked for it; otherwise hand the
/// error back.
fn exit_on_hook<T>(err: tendril_engine::Error) -> anyhow::Result<T> {
    if let Some(code) = err.exit_code() {
        debug!(code, "exiting at hook request");
        std::process::exit(code);
    }
    Err(err.into())
}
