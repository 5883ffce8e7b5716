mod dispatch;
mod liveness;
mod logging;
mod plugins;
mod telegram;

use core::time::Duration;
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use teloxide::{prelude::*, types::BotCommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{dispatch::BotState, logging::init_tracing, telegram::TelegramMessenger};
use plugin_core::{Messenger, PluginRegistry, PluginSpec, SessionStore};
use plugin_forward::ForwardConfig;

#[derive(Parser, Debug)]
#[command(
    name = "channel-forwarder",
    version,
    about = "Telegram bot that copies message ranges between channels"
)]
struct Args {
    /// Bot token from @BotFather
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: String,

    /// Optional YAML file with plugin specs
    #[arg(long, env = "BOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Port for the HTTP health endpoint
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// URL to GET periodically so the host keeps the process awake
    #[arg(long, env = "PING_URL")]
    ping_url: Option<String>,

    /// Seconds between keep-alive pings
    #[arg(long, env = "PING_EVERY_SECONDS", default_value_t = 180)]
    ping_every: u64,

    /// Seconds to wait after each copied message
    #[arg(long, env = "BASE_DELAY", default_value_t = 0.9)]
    base_delay: f64,

    /// Seconds to wait after each failed copy
    #[arg(long, env = "FAIL_DELAY", default_value_t = 1.7)]
    fail_delay: f64,

    /// Directory holding `<plugin>/config.yaml` overrides
    #[arg(long, env = "PLUGINS_DIR", default_value = "./plugins")]
    plugins_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub(crate) struct BotConfig {
    #[serde(default)]
    pub(crate) plugins: Option<Vec<PluginSpec>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so both RUST_LOG and clap see it.
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let token = args.token.trim();
    if token.is_empty() {
        return Err(anyhow!("BOT_TOKEN is required"));
    }
    let config = load_config(&args.config)?;

    let bot = Bot::new(token);
    let username = match bot.get_me().await {
        Ok(me) => Some(me.username().to_owned()),
        Err(e) => {
            warn!(error = %e, "Could not fetch bot identity; commands with an @bot suffix will be ignored");
            None
        }
    };
    info!(username = ?username, "Bot identity");

    let forward = ForwardConfig {
        base_delay_secs: args.base_delay,
        fail_delay_secs: args.fail_delay,
    };
    let registry = plugins::build_registry(&config, &forward, &args.plugins_dir).await;
    publish_commands(&bot, &registry).await;

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding health endpoint on {addr}"))?;
    info!(%addr, "Health endpoint listening");
    tokio::spawn(async move {
        if let Err(e) = liveness::serve(listener).await {
            warn!(error = %e, "Health endpoint stopped");
        }
    });

    if let Some(url) = args.ping_url.filter(|u| !u.trim().is_empty()) {
        let client = liveness::ping_client()?;
        let every = Duration::from_secs(args.ping_every.max(1));
        info!(url = %url, every_secs = every.as_secs(), "Keep-alive pinger enabled");
        tokio::spawn(liveness::ping_loop(client, url, every));
    }

    let state = Arc::new(BotState {
        messenger: Arc::new(TelegramMessenger::new(bot.clone())) as Arc<dyn Messenger>,
        registry,
        sessions: Arc::new(SessionStore::new()),
        username,
    });

    info!("Bot starting (long polling)… Press Ctrl+C to stop.");
    Dispatcher::builder(bot, Update::filter_message().endpoint(on_message))
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

async fn on_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        state.handle_text(msg.chat.id.0, text).await;
    }
    Ok(())
}

/// Advertise enabled commands in the Telegram client menu.
async fn publish_commands(bot: &Bot, registry: &PluginRegistry) {
    let mut commands = Vec::new();
    for (id, entry) in registry.entries().await {
        if !registry.is_enabled(&id).await {
            continue;
        }
        for cmd in &entry.spec.triggers.commands {
            let name = cmd.trim_start_matches('/').to_lowercase();
            commands.push(BotCommand::new(name, entry.plugin.help()));
        }
    }
    let names: Vec<&str> = commands.iter().map(|c| c.command.as_str()).collect();
    info!(commands = ?names, "Registered plugin commands");
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "Failed to publish bot commands");
    }
}

fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        info!(path = %path.display(), "No config file, using built-in plugin defaults");
        return Ok(BotConfig::default());
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    let cfg: BotConfig = serde_yaml::from_str(&yaml).context("parsing YAML config")?;
    Ok(cfg)
}
