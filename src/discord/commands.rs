//! Discord bot commands (!help, !ping, !prefix).
//!
//! Commands start with the guild's prefix or a mention of the bot. The
//! prefix lives in the settings store and falls back to the configured one.

use std::time::Instant;

use serenity::all::{Context, EditMessage, GuildId, Message, UserId};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::moderation::exemption;
use crate::storage::settings::{SettingsStore, GLOBAL, PREFIX_KEY};

/// Longest message still considered for command parsing.
const MAX_COMMAND_LEN: usize = 200;

/// Built-in commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    /// Show the prefix, or change it when an argument is given.
    Prefix(Option<String>),
}

impl Command {
    pub fn parse(name: &str, args: Option<String>) -> Option<Self> {
        match name {
            "help" | "commands" => Some(Self::Help),
            "ping" => Some(Self::Ping),
            "prefix" => Some(Self::Prefix(args)),
            _ => None,
        }
    }
}

/// Split a message into a lowercased command name and its arguments.
///
/// Returns `None` unless the message starts with `prefix` or a mention of `bot_id`.
pub fn parse_invocation(
    content: &str,
    prefix: Option<&str>,
    bot_id: UserId,
) -> Option<(String, Option<String>)> {
    let content = content.trim();
    if content.is_empty() || content.len() > MAX_COMMAND_LEN {
        return None;
    }

    let rest = strip_mention(content, bot_id)
        .or_else(|| prefix.filter(|p| !p.is_empty()).and_then(|p| content.strip_prefix(p)))?;

    let mut parts = rest.trim_start().splitn(2, char::is_whitespace);
    let name = parts.next()?.to_lowercase();
    if name.is_empty() {
        return None;
    }
    let args = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some((name, args))
}

fn strip_mention(content: &str, bot_id: UserId) -> Option<&str> {
    let forms = [format!("<@{}>", bot_id), format!("<@!{}>", bot_id)];
    forms
        .iter()
        .find_map(|form| content.strip_prefix(form.as_str()))
}

/// Command handler for Discord bot.
pub struct CommandHandler {
    settings: SettingsStore,
    default_prefix: String,
    owner_id: UserId,
    exemptions: Vec<String>,
}

impl CommandHandler {
    pub fn new(
        settings: SettingsStore,
        default_prefix: String,
        owner_id: UserId,
        exemptions: Vec<String>,
    ) -> Self {
        Self {
            settings,
            default_prefix,
            owner_id,
            exemptions,
        }
    }

    /// Effective prefix for a guild (or DMs). `None` means mention-only.
    ///
    /// Lookup order: the guild's own value, the global value, the configured default.
    pub async fn prefix_for(&self, guild_id: Option<GuildId>) -> Option<String> {
        let key = settings_key(guild_id);
        let mut stored = self.stored_prefix(key).await;
        if stored.is_none() && key != GLOBAL {
            stored = self.stored_prefix(GLOBAL).await;
        }

        match stored {
            Some(prefix) if prefix.is_empty() => None,
            Some(prefix) => Some(prefix),
            None => Some(self.default_prefix.clone()),
        }
    }

    async fn stored_prefix(&self, key: u64) -> Option<String> {
        match self.settings.get_str(key, PREFIX_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to read prefix for {}: {}", key, e);
                None
            }
        }
    }

    /// Parse and execute a command from Discord.
    ///
    /// Returns `true` if the message was a command, `false` otherwise.
    pub async fn handle_command(&self, ctx: &Context, msg: &Message) -> anyhow::Result<bool> {
        let prefix = self.prefix_for(msg.guild_id).await;
        let bot_id = ctx.cache.current_user().id;

        let Some((name, args)) = parse_invocation(&msg.content, prefix.as_deref(), bot_id) else {
            return Ok(false);
        };
        let Some(command) = Command::parse(&name, args) else {
            debug!("Unknown command '{}' from {}", name, msg.author.name);
            return Ok(false);
        };

        info!("{:?} command from {}", command, msg.author.name);

        match command {
            Command::Help => self.handle_help(ctx, msg, prefix.as_deref()).await?,
            Command::Ping => self.handle_ping(ctx, msg).await?,
            Command::Prefix(None) => self.show_prefix(ctx, msg, prefix.as_deref()).await?,
            Command::Prefix(Some(arg)) => self.change_prefix(ctx, msg, &arg).await?,
        }
        Ok(true)
    }

    /// Handle !help command.
    async fn handle_help(&self, ctx: &Context, msg: &Message, prefix: Option<&str>) -> anyhow::Result<()> {
        let p = prefix.unwrap_or("@mention ");
        let help_text = format!(
            "**Available Commands:**\n\
             • `{p}help` - Show this help message\n\
             • `{p}ping` - Check how fast I respond\n\
             • `{p}prefix` - Show the command prefix\n\
             • `{p}prefix <new|default|none>` - Change the command prefix (staff only)"
        );

        msg.channel_id.say(&ctx.http, help_text).await?;
        Ok(())
    }

    /// Handle !ping command.
    async fn handle_ping(&self, ctx: &Context, msg: &Message) -> anyhow::Result<()> {
        let started = Instant::now();
        let mut reply = msg.channel_id.say(&ctx.http, "Pinging...").await?;
        let elapsed = started.elapsed().as_millis();

        reply
            .edit(
                ctx,
                EditMessage::new().content(format!("Pong! The message round-trip took {}ms.", elapsed)),
            )
            .await?;
        Ok(())
    }

    async fn show_prefix(&self, ctx: &Context, msg: &Message, prefix: Option<&str>) -> anyhow::Result<()> {
        let text = match prefix {
            Some(p) => format!("The command prefix is `{}`. You can also mention me.", p),
            None => "There is no command prefix. Mention me to run commands.".to_string(),
        };
        msg.channel_id.say(&ctx.http, text).await?;
        Ok(())
    }

    /// Handle !prefix <arg>.
    async fn change_prefix(&self, ctx: &Context, msg: &Message, arg: &str) -> anyhow::Result<()> {
        if !self.is_staff(ctx, msg).await {
            msg.channel_id
                .say(&ctx.http, "Only the bot owner or staff can change the prefix.")
                .await?;
            return Ok(());
        }

        let key = settings_key(msg.guild_id);
        let reply = match arg.to_lowercase().as_str() {
            "default" => {
                self.settings.remove(key, PREFIX_KEY).await?;
                match self.prefix_for(msg.guild_id).await {
                    Some(p) => format!("Reset the command prefix to the default (`{}`).", p),
                    None => "Reset the command prefix. The default is mention-only.".to_string(),
                }
            }
            "none" => {
                self.settings.set(key, PREFIX_KEY, Value::String(String::new())).await?;
                "Removed the command prefix. Mention me to run commands.".to_string()
            }
            _ if arg.chars().any(char::is_whitespace) => {
                "The prefix must not contain spaces.".to_string()
            }
            _ => {
                self.settings.set(key, PREFIX_KEY, Value::String(arg.to_string())).await?;
                format!("Set the command prefix to `{}`.", arg)
            }
        };

        info!("Prefix change in {} by {}: {}", key, msg.author.name, reply);
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    }

    /// The owner, or in a guild anyone holding an exemption role.
    async fn is_staff(&self, ctx: &Context, msg: &Message) -> bool {
        if msg.author.id == self.owner_id {
            return true;
        }
        let Some(guild_id) = msg.guild_id else {
            return false;
        };
        let roles = msg.member.as_ref().map(|m| m.roles.as_slice());
        exemption::check_member(ctx, guild_id, msg.author.id, roles, &self.exemptions).await
    }
}

fn settings_key(guild_id: Option<GuildId>) -> u64 {
    guild_id.map(|g| g.get()).unwrap_or(GLOBAL)
}
