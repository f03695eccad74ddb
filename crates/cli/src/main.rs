use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Courier CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: COURIER_CONFIG_PATH or ~/.courier/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the channel relay: filter messages from the source feeds and
    /// publish them to the destination channel.
    Relay {
        /// Config file path (default: COURIER_CONFIG_PATH or ~/.courier/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the submission bot: screen user submissions and post confirmed
    /// ones to the destination channel.
    Bot {
        /// Config file path (default: COURIER_CONFIG_PATH or ~/.courier/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Send a one-off test message to the destination channel to verify access.
    Send {
        /// Config file path (default: COURIER_CONFIG_PATH or ~/.courier/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Message text (default: a short test notice)
        #[arg(long, short)]
        text: Option<String>,
    },

    /// Print session counters from a running relay or bot instance.
    Stats {
        /// Config file path (default: COURIER_CONFIG_PATH or ~/.courier/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("courier {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Relay { config }) => {
            if let Err(e) = run_relay(config).await {
                log::error!("relay failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Bot { config }) => {
            if let Err(e) = run_bot(config).await {
                log::error!("bot failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send { config, text }) => {
            if let Err(e) = run_send(config, text).await {
                log::error!("send failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Stats { config }) => {
            if let Err(e) = run_stats(config).await {
                log::error!("stats failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_relay(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    lib::init::require_initialized(&path)?;
    log::info!(
        "starting relay: {} source(s) -> {}",
        config.relay.source_channels.len(),
        config.relay.destination_channel.as_deref().unwrap_or("(unset)")
    );
    lib::relay::run_relay(config).await
}

async fn run_bot(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    lib::init::require_initialized(&path)?;
    log::info!(
        "starting submission bot -> {}",
        config.relay.destination_channel.as_deref().unwrap_or("(unset)")
    );
    lib::submit::run_submission_bot(config).await
}

/// Resolve the destination and send a single test message through it.
async fn run_send(
    config_path: Option<std::path::PathBuf>,
    text: Option<String>,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use lib::channels::ChannelApi;

    let (config, _) = lib::config::load_config(config_path)?;
    let destination = config
        .relay
        .destination_channel
        .clone()
        .context("relay.destinationChannel must be configured")?;
    let token = lib::config::resolve_telegram_token(&config)
        .context("telegram bot token not configured (set telegram.botToken or TELEGRAM_BOT_TOKEN)")?;

    let api = Arc::new(lib::channels::TelegramApi::new(
        token,
        lib::channels::resolve_api_base(config.telegram.api_base.as_deref()),
    ));
    let resolver = lib::resolver::ChannelResolver::new(api.clone());
    let channel = resolver
        .resolve(&destination)
        .await
        .with_context(|| format!("resolving destination channel {}", destination))?;
    println!(
        "resolved {} -> {} ({})",
        destination,
        channel.chat_id,
        channel.title.as_deref().unwrap_or("untitled")
    );

    let text = text.unwrap_or_else(|| "Test message from courier - please ignore".to_string());
    api.send_message(&channel.chat_id, &text)
        .await
        .context("sending test message")?;
    println!("test message sent");
    Ok(())
}

/// Query the status server of a running instance and print its counters.
async fn run_stats(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use anyhow::Context;

    let (config, _) = lib::config::load_config(config_path)?;
    let url = format!("http://{}:{}/stats", config.status.bind, config.status.port);
    let res = reqwest::get(&url)
        .await
        .with_context(|| format!("requesting {} (is a relay or bot running?)", url))?;
    anyhow::ensure!(res.status().is_success(), "stats request failed: {}", res.status());
    let stats: serde_json::Value = res.json().await.context("parsing stats response")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
