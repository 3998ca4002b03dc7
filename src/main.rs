//! Qasi - moderation bot for a single Discord server
//!
//! Watches guild messages for banned and warned words, reports deletions,
//! joins, leaves and bans to a home channel, and greets new members.

mod common;
mod config;
mod discord;
mod moderation;
mod storage;

use std::time::Duration;

use anyhow::Result;
use serenity::all::UserId;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use config::env::get_config_path;
use config::validate::validate_censorship;
use config::{load_and_validate, load_censorship, BotMode, Config};
use discord::recent::RecentMessages;
use discord::{CommandHandler, DiscordBotBuilder, Moderation, ModerationHandler};
use moderation::WordFilter;
use storage::{SettingsStore, WelcomeLog};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Qasi v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Mode: {}", config.mode);
    info!("  Guild: {}", config.guild);
    info!("  Home channel: {}", config.home);
    info!("  Exemption roles: {:?}", config.exemptions);

    let settings = SettingsStore::open(config.storage.database_path(config.mode)).await?;
    let commands = CommandHandler::new(
        settings,
        config.prefix.clone(),
        UserId::new(config.auth.owner_id),
        config.exemptions.clone(),
    );

    let moderation = match config.mode {
        BotMode::Live => Some(load_moderation(&config)?),
        BotMode::Dev => {
            warn!("Running in dev mode: moderation and notifications are disabled");
            None
        }
    };

    let handler = ModerationHandler::new(&config, commands, moderation);
    let discord_bot = DiscordBotBuilder::new(config.auth.token.clone(), handler)
        .build()
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut discord_task = tokio::spawn(discord_bot.run(shutdown_rx));

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - disconnecting...");
            true
        }
        _ = &mut discord_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            warn!("Shutdown channel closed (Discord task already exited): {}", e);
        }
        match tokio::time::timeout(Duration::from_secs(5), discord_task).await {
            Ok(Ok(())) => info!("Disconnected gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

/// Load the word lists and welcome state. Any failure here aborts startup.
fn load_moderation(config: &Config) -> Result<Moderation> {
    let censorship_path = config.storage.censorship_path();
    info!("Loading word lists from {}...", censorship_path.display());

    let lists = load_censorship(&censorship_path)?;
    validate_censorship(&lists).map_err(|e| {
        error!("Invalid word lists in {}: {}", censorship_path.display(), e);
        e
    })?;

    let filter = WordFilter::new(&lists);
    let (banned, warned, false_positive) = filter.counts();
    info!(
        "Word lists loaded: {} banned, {} warned, {} false positives",
        banned, warned, false_positive
    );

    let welcomes = WelcomeLog::load(config.storage.welcomes_path())?;

    Ok(Moderation {
        filter,
        welcomes,
        recent: RecentMessages::default(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
