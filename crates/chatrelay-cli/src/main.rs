use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chatrelay_core::config::{LogFormat, Settings};

#[derive(Parser)]
#[command(
    name = "chatrelay",
    about = "Streaming chat proxy between SSE clients and an LLM completion API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config.yaml / config.local.yaml
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind host override
        #[arg(long)]
        host: Option<String>,

        /// Bind port override
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (secrets redacted)
    Show,
}

fn init_logging(settings: &Settings, verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        settings.logging.level.clone()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match settings.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config_dir.as_deref())?;
    init_logging(&settings, cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            chatrelay_server::serve(settings).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let mut shown = settings.clone();
                if !shown.upstream.api_key.is_empty() {
                    shown.upstream.api_key = "***".into();
                }
                for key in &mut shown.auth.api_keys {
                    key.key = "***".into();
                }
                if shown.auth.jwt.secret.is_some() {
                    shown.auth.jwt.secret = Some("***".into());
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            }
        },
    }

    Ok(())
}
