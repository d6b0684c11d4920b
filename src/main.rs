//! chat-relay CLI - Telegram webhook relay for streaming model answers

use anyhow::{bail, Context, Result};
use chat_relay::{
    chat::{ChatId, ConsoleChannel, TelegramClient},
    config::Config,
    webhook, ApiAgent, Orchestrator, OrchestratorConfig, Relay, Request,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Relay chat messages to a streaming model with live draft updates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/chat-relay/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Relay a single prompt, as if it arrived from a chat
    Ask {
        /// Prompt text
        prompt: String,

        /// Destination chat (required unless --console)
        #[arg(long)]
        chat_id: Option<i64>,

        /// Print drafts and the answer to the terminal instead of Telegram
        #[arg(long)]
        console: bool,
    },

    /// Point the Telegram bot at this relay's webhook URL
    SetWebhook {
        /// Public HTTPS URL of the webhook route
        url: String,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (secrets masked)
    Show,

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = Config::load_from(config_path)?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            run_serve(config).await?;
        }
        Commands::Ask {
            prompt,
            chat_id,
            console,
        } => {
            let config = Config::load_from(config_path)?;
            run_ask(config, prompt, chat_id, console).await?;
        }
        Commands::SetWebhook { url } => {
            let config = Config::load_from(config_path)?;
            run_set_webhook(config, &url).await?;
        }
        Commands::Config(cmd) => {
            run_config_command(cmd, config_path)?;
        }
    }

    Ok(())
}

async fn run_serve(config: Config) -> Result<()> {
    let relay = Relay::from_config(&config).context("cannot start relay")?;

    info!(
        provider = %config.model.provider,
        model = %config.model.model,
        throttle_chars = config.orchestrator.throttle_chars,
        "relay ready"
    );

    webhook::serve(Arc::new(relay), &config.server).await?;
    Ok(())
}

async fn run_ask(config: Config, prompt: String, chat_id: Option<i64>, console: bool) -> Result<()> {
    let model = Arc::new(ApiAgent::new(config.api_config())?);
    let orchestrator_config = OrchestratorConfig::from(&config.orchestrator);

    let (orchestrator, chat_id) = if console {
        let console = Arc::new(ConsoleChannel::new());
        (
            Orchestrator::new(orchestrator_config, model, console.clone(), console),
            ChatId(chat_id.unwrap_or_default()),
        )
    } else {
        let Some(chat_id) = chat_id else {
            bail!("--chat-id is required unless --console is set");
        };
        let telegram = Arc::new(TelegramClient::new(config.telegram_config()?));
        (
            Orchestrator::new(orchestrator_config, model, telegram.clone(), telegram),
            ChatId(chat_id),
        )
    };

    let Some(request) = Request::new(chat_id, &prompt) else {
        bail!("prompt is empty");
    };

    let report = orchestrator.run(request).await;

    eprintln!("\n--- Relay Report ---");
    eprintln!("Outcome: {}", report.outcome);
    eprintln!("Draft id: {}", report.draft_id);
    eprintln!(
        "Draft updates: {} ({} failed)",
        report.draft_updates, report.draft_update_failures
    );

    if !report.is_success() {
        bail!("request failed: {}", report.outcome);
    }
    Ok(())
}

async fn run_set_webhook(config: Config, url: &str) -> Result<()> {
    let telegram = TelegramClient::new(config.telegram_config()?);

    let me = telegram.get_me().await.context("bot token rejected")?;
    telegram.set_webhook(url).await?;

    println!(
        "Webhook for @{} set to {}",
        me.username.unwrap_or_else(|| me.id.to_string()),
        url
    );
    Ok(())
}

fn run_config_command(cmd: ConfigCommands, path: PathBuf) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save_to(path.clone())?;
            println!("Config written to {}", path.display());
        }
        ConfigCommands::Show => {
            let mut config = Config::load_from(path)?;
            if config.telegram.bot_token.is_some() {
                config.telegram.bot_token = Some("********".to_string());
            }
            if config.model.api_key.is_some() {
                config.model.api_key = Some("********".to_string());
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Validate => {
            let config = Config::load_from(path)?;
            config.validate()?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}
