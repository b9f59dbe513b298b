use clap::{Parser, Subcommand};
use logdrain::config::{resolve_config_path, Overrides};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logdrain")]
#[command(about = "HTTP log drain forwarding batched syslog lines to a log store", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding server.bind
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Retention in days for newly created log groups
    #[arg(long, global = true)]
    retention: Option<u32>,

    /// Basic-auth username
    #[arg(long, global = true)]
    user: Option<String>,

    /// Basic-auth password
    #[arg(long, global = true)]
    pass: Option<String>,

    /// Remove terminal colour sequences from messages
    #[arg(long, global = true)]
    strip_ansi_codes: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logdrain=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            let overrides = Overrides {
                bind: cli.bind,
                retention_days: cli.retention,
                username: cli.user,
                password: cli.pass,
                strip_ansi_codes: cli.strip_ansi_codes,
            };
            logdrain::cli::run::run(config_path, overrides).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => logdrain::cli::config::init(stdout)?,
            ConfigAction::Validate => logdrain::cli::config::validate(config_path)?,
        },
    }

    Ok(())
}
