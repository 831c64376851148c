mod config_commands;
mod console;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    gemexp_config::GemExpConfig,
    gemexp_plugin::GeminiExpPlugin,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "gemexp", about = "Gemini image editing over chat, from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (defaults to the first `gemexp.{toml,yaml,json}` found).
    #[arg(long, global = true, env = "GEMEXP_CONFIG")]
    config: Option<PathBuf>,

    /// Sender id used for console messages.
    #[arg(long, default_value = "console-user")]
    user: String,

    /// Display name used in prompts.
    #[arg(long, default_value = "you")]
    name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the plugin on stdin (default when no subcommand is provided).
    Chat,
    /// Validate the config file.
    Check {
        /// Also show informational diagnostics.
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the conversation, so logs go to stderr.
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

fn load(cli: &Cli) -> anyhow::Result<GemExpConfig> {
    match &cli.config {
        Some(path) => {
            let mut config = gemexp_config::load_config(path)?;
            gemexp_config::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
            Ok(config)
        },
        None => Ok(gemexp_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "gemexp starting");

    match cli.command {
        Some(Commands::Check { verbose }) => config_commands::check(cli.config.as_deref(), verbose),
        None | Some(Commands::Chat) => {
            let config = load(&cli)?;
            let plugin = GeminiExpPlugin::from_config(config)?;
            let outcome = console::run(&plugin, &cli.user, &cli.name).await;
            plugin.terminate();
            outcome
        },
    }
}
