//! Discord bot client abstraction.
//!
//! Provides a high-level interface for creating and running the Discord bot,
//! hiding serenity implementation details from the rest of the application.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use serenity::all::{
    ChannelId, ConnectionStage, GuildId, Member, Message, MessageId, MessageUpdateEvent, Ready,
    ResumedEvent, ShardManager, ShardStageUpdateEvent, User,
};
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::discord::handler::ModerationHandler;

/// Gateway events the bot reacts to, forwarded to a single processing loop.
#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    /// Bot connected and ready.
    Ready { context: Context, ready: Ready },
    /// Message received.
    Message { context: Context, message: Message },
    /// Message edited.
    MessageUpdate {
        message_id: MessageId,
        content: Option<String>,
    },
    /// Message deleted.
    MessageDelete {
        context: Context,
        channel_id: ChannelId,
        message_id: MessageId,
        guild_id: Option<GuildId>,
    },
    MemberJoin { context: Context, member: Member },
    MemberLeave {
        context: Context,
        guild_id: GuildId,
        user: User,
        member: Option<Member>,
    },
    /// Ban added (`banned = true`) or removed.
    Ban {
        context: Context,
        guild_id: GuildId,
        user: User,
        banned: bool,
    },
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn new(discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>) -> Self {
        Self { discord_events_tx }
    }

    fn forward(&self, event: DiscordBotEvent) {
        if let Err(error) = self.discord_events_tx.send(event) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, context: Context, ready: Ready) {
        self.forward(DiscordBotEvent::Ready { context, ready });
    }

    async fn resume(&self, _context: Context, _event: ResumedEvent) {
        info!("QASI resumed its Discord session.");
    }

    async fn shard_stage_update(&self, _context: Context, event: ShardStageUpdateEvent) {
        match (event.old, event.new) {
            (_, ConnectionStage::Disconnected) => warn!("QASI disconnected from Discord."),
            (ConnectionStage::Disconnected, _) | (_, ConnectionStage::Resuming) => {
                warn!("QASI reconnecting to Discord.")
            }
            (old, new) => debug!("Shard {} stage {:?} -> {:?}", event.shard_id, old, new),
        }
    }

    async fn message(&self, context: Context, message: Message) {
        self.forward(DiscordBotEvent::Message { context, message });
    }

    async fn message_update(
        &self,
        _context: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        self.forward(DiscordBotEvent::MessageUpdate {
            message_id: event.id,
            content: event.content,
        });
    }

    async fn message_delete(
        &self,
        context: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        self.forward(DiscordBotEvent::MessageDelete {
            context,
            channel_id,
            message_id: deleted_message_id,
            guild_id,
        });
    }

    async fn guild_member_addition(&self, context: Context, new_member: Member) {
        self.forward(DiscordBotEvent::MemberJoin {
            context,
            member: new_member,
        });
    }

    async fn guild_member_removal(
        &self,
        context: Context,
        guild_id: GuildId,
        user: User,
        member_data_if_available: Option<Member>,
    ) {
        self.forward(DiscordBotEvent::MemberLeave {
            context,
            guild_id,
            user,
            member: member_data_if_available,
        });
    }

    async fn guild_ban_addition(&self, context: Context, guild_id: GuildId, banned_user: User) {
        self.forward(DiscordBotEvent::Ban {
            context,
            guild_id,
            user: banned_user,
            banned: true,
        });
    }

    async fn guild_ban_removal(&self, context: Context, guild_id: GuildId, unbanned_user: User) {
        self.forward(DiscordBotEvent::Ban {
            context,
            guild_id,
            user: unbanned_user,
            banned: false,
        });
    }
}

/// Builder for creating the Discord bot.
pub struct DiscordBotBuilder {
    token: String,
    handler: ModerationHandler,
}

impl DiscordBotBuilder {
    /// Create a new Discord bot builder.
    pub fn new(token: String, handler: ModerationHandler) -> Self {
        Self { token, handler }
    }

    /// Build the Discord bot.
    pub async fn build(self) -> anyhow::Result<DiscordBot> {
        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();

        let client = build_client(&self.token, discord_events_tx.clone()).await?;
        let (shard_manager_tx, _) = watch::channel(Some(client.shard_manager.clone()));

        Ok(DiscordBot {
            client: Some(client),
            token: self.token,
            handler: self.handler,
            discord_events_rx,
            discord_events_tx,
            shard_manager_tx,
        })
    }
}

async fn build_client(
    token: &str,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION
        | GatewayIntents::DIRECT_MESSAGES;

    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    // Build the Serenity HTTP client with our custom reqwest client
    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let events = DiscordBotEvents::new(discord_events_tx);
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

/// Create an exponential backoff iterator for rebuilding the client.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn discord_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(300))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    handler: ModerationHandler,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    /// Shard manager of the client currently running.
    shard_manager_tx: watch::Sender<Option<Arc<ShardManager>>>,
}

impl DiscordBot {
    /// Run until the connection ends for good or `shutdown_rx` turns true.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let shard_manager_rx = self.shard_manager_tx.subscribe();
        let client = &mut self.client;
        let handler = &mut self.handler;
        let discord_events_rx = &mut self.discord_events_rx;

        tokio::select! {
            _ = Self::run_connection(client, &self.token, &self.discord_events_tx, &self.shard_manager_tx) => {},
            _ = Self::process_events(discord_events_rx, handler) => {},
            _ = async {
                // Wait for shutdown signal
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                // Gracefully shutdown Discord gateway
                let manager = shard_manager_rx.borrow().clone();
                if let Some(manager) = manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(
        client: &mut Option<Client>,
        token: &str,
        discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>,
        shard_manager_tx: &watch::Sender<Option<Arc<ShardManager>>>,
    ) {
        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => {
                    // serenity handles gateway reconnects itself; this only runs after a fatal error.
                    match build_client(token, discord_events_tx.clone()).await {
                        Ok(client) => {
                            backoff = discord_backoff();
                            shard_manager_tx.send_replace(Some(client.shard_manager.clone()));
                            client
                        }
                        Err(e) => {
                            error!("Failed to rebuild Discord client: {}", e);
                            let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                            warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                            sleep(delay).await;
                            continue;
                        }
                    }
                }
            };

            match client.start().await {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                    warn!(
                        "QASI disconnected from Discord. Reconnecting in {:.1}s...",
                        delay.as_secs_f64(),
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        handler: &mut ModerationHandler,
    ) {
        while let Some(event) = discord_events_rx.recv().await {
            match event {
                DiscordBotEvent::Ready { context, ready } => {
                    handler.handle_ready(&context, &ready).await;
                }
                DiscordBotEvent::Message { context, message } => {
                    handler.handle_message(&context, message).await;
                }
                DiscordBotEvent::MessageUpdate { message_id, content } => {
                    handler.handle_message_edit(message_id, content);
                }
                DiscordBotEvent::MessageDelete {
                    context,
                    channel_id,
                    message_id,
                    guild_id,
                } => {
                    handler
                        .handle_message_delete(&context, channel_id, message_id, guild_id)
                        .await;
                }
                DiscordBotEvent::MemberJoin { context, member } => {
                    handler.handle_member_join(&context, member).await;
                }
                DiscordBotEvent::MemberLeave {
                    context,
                    guild_id,
                    user,
                    member,
                } => {
                    handler.handle_member_leave(&context, guild_id, user, member).await;
                }
                DiscordBotEvent::Ban {
                    context,
                    guild_id,
                    user,
                    banned,
                } => {
                    handler.handle_ban(&context, guild_id, user, banned).await;
                }
            }
        }
        debug!("Discord events channel closed.");
    }
}
