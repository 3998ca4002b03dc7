//! Discord event handling.
//!
//! Moderates guild messages and reports membership changes to the home
//! channel. Events arrive one at a time from the bot's event loop, so the
//! handler owns its state without locking.

use std::collections::HashSet;

use chrono::Utc;
use serenity::all::{
    ChannelId, Context, CreateMessage, GuildId, Member, Message, MessageId, Ready, Timestamp, User,
    UserId,
};
use tracing::{debug, error, info, warn};

use crate::config::types::{Config, WelcomeConfig};
use crate::discord::commands::CommandHandler;
use crate::discord::notify::{self, MemberInfo, Notification};
use crate::discord::recent::{CachedMessage, RecentMessages};
use crate::moderation::{exemption, Verdict, WordFilter};
use crate::storage::{WelcomeAction, WelcomeLog};

/// Reason attached to automatic bans.
const BAN_REASON: &str = "Usage of a banned word";

/// Where an incoming message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRoute {
    /// Bots, and guilds other than ours.
    Ignore,
    /// A direct message: welcome requests and commands only.
    Direct,
    /// Our guild: moderation first, then commands.
    Guild,
}

/// What moderation does with a guild message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    /// Let it through to commands.
    Pass,
    /// Report, ban the author, delete the message.
    Ban,
    /// Report only.
    Alert,
}

impl ModerationAction {
    pub fn decide(verdict: Verdict, exempt: bool) -> Self {
        match verdict {
            _ if exempt => Self::Pass,
            Verdict::Clean => Self::Pass,
            Verdict::Banned => Self::Ban,
            Verdict::Warned => Self::Alert,
        }
    }

    /// Messages acted on never reach the command layer.
    pub fn stops_commands(self) -> bool {
        self != Self::Pass
    }
}

/// The guild and channels the handler watches.
#[derive(Debug, Clone)]
pub struct Scope {
    guild_id: GuildId,
    home_id: ChannelId,
    ignored_delete_channels: HashSet<ChannelId>,
}

impl Scope {
    pub fn from_config(config: &Config) -> Self {
        Self {
            guild_id: GuildId::new(config.guild),
            home_id: ChannelId::new(config.home),
            ignored_delete_channels: config
                .ignored_delete_channels
                .iter()
                .map(|id| ChannelId::new(*id))
                .collect(),
        }
    }

    pub fn route_message(&self, author_bot: bool, guild_id: Option<GuildId>) -> MessageRoute {
        match guild_id {
            _ if author_bot => MessageRoute::Ignore,
            None => MessageRoute::Direct,
            Some(id) if id == self.guild_id => MessageRoute::Guild,
            Some(_) => MessageRoute::Ignore,
        }
    }

    /// The buffered message whose deletion should be reported, if any.
    ///
    /// Exemption of the author is checked separately since it needs the API.
    pub fn deletion_to_report<'a>(
        &self,
        guild_id: Option<GuildId>,
        channel_id: ChannelId,
        cached: Option<&'a CachedMessage>,
        self_id: UserId,
    ) -> Option<&'a CachedMessage> {
        if guild_id.is_some_and(|g| g != self.guild_id) {
            return None;
        }
        if channel_id == self.home_id || self.ignored_delete_channels.contains(&channel_id) {
            return None;
        }
        cached.filter(|message| message.author_id != self_id)
    }
}

/// State only the live bot needs.
pub struct Moderation {
    pub filter: WordFilter,
    pub welcomes: WelcomeLog,
    pub recent: RecentMessages,
}

/// Discord event handler.
pub struct ModerationHandler {
    scope: Scope,
    /// Set once the first ready event came in.
    home: Option<ChannelId>,
    exemptions: Vec<String>,
    welcome: WelcomeConfig,
    commands: CommandHandler,
    /// `None` in dev mode: commands and lifecycle logging only.
    moderation: Option<Moderation>,
}

impl ModerationHandler {
    pub fn new(config: &Config, commands: CommandHandler, moderation: Option<Moderation>) -> Self {
        Self {
            scope: Scope::from_config(config),
            home: None,
            exemptions: config.exemptions.clone(),
            welcome: config.welcome.clone(),
            commands,
            moderation,
        }
    }

    /// Returns true on the first ready event only.
    fn mark_ready(&mut self) -> bool {
        let first = self.home.is_none();
        self.home = Some(self.scope.home_id);
        first
    }

    pub async fn handle_ready(&mut self, ctx: &Context, ready: &Ready) {
        if !self.mark_ready() {
            // serenity sends ready again after every re-identify
            info!("QASI re-identified as {}.", ready.user.tag());
            return;
        }
        info!("QASI initialized. Logged in as {}.", ready.user.tag());

        let home_id = self.scope.home_id;
        match home_id.to_channel(ctx).await {
            Ok(channel) => {
                let name = channel
                    .guild()
                    .map(|c| c.name)
                    .unwrap_or_else(|| home_id.to_string());
                info!("Home channel resolved: #{}", name);
            }
            // Sending may still work (e.g. missing view permission on fetch)
            Err(e) => warn!("Could not resolve home channel {}: {}", home_id, e),
        }
    }

    pub async fn handle_message(&mut self, ctx: &Context, msg: Message) {
        let clean = msg.content_safe(&ctx.cache);
        info!(
            "{} in {}:\n>>> {}",
            msg.author.name,
            channel_label(ctx, &msg),
            clean
        );

        if msg.guild_id == Some(self.scope.guild_id) {
            if let Some(moderation) = self.moderation.as_mut() {
                moderation.recent.insert(CachedMessage::from(&msg));
            }
        }

        match self.scope.route_message(msg.author.bot, msg.guild_id) {
            MessageRoute::Ignore => return,
            MessageRoute::Direct => {
                if self.handle_welcome_request(ctx, &msg).await {
                    return;
                }
            }
            MessageRoute::Guild => {
                if self.moderate(ctx, &msg, &clean).await {
                    return;
                }
            }
        }

        if let Err(e) = self.commands.handle_command(ctx, &msg).await {
            error!("Command handler error: {}", e);
        }
    }

    /// Apply the word lists to a message from our guild.
    ///
    /// Returns `true` if the message was acted on.
    async fn moderate(&mut self, ctx: &Context, msg: &Message, clean: &str) -> bool {
        let verdict = match self.moderation.as_ref() {
            Some(moderation) => moderation.filter.check(clean),
            None => return false,
        };
        if verdict == Verdict::Clean {
            return false;
        }

        let roles = msg.member.as_ref().map(|m| m.roles.as_slice());
        let exempt =
            exemption::check_member(ctx, self.scope.guild_id, msg.author.id, roles, &self.exemptions)
                .await;

        let action = ModerationAction::decide(verdict, exempt);
        match action {
            ModerationAction::Pass => {
                debug!("{} is exempt, ignoring {:?} message", msg.author.name, verdict);
            }
            ModerationAction::Ban => {
                warn!("Banned word from {} in {}", msg.author.name, msg.channel_id);
                self.notify(ctx, notify::banned_word(msg.author.id, msg.channel_id, &msg.content))
                    .await;

                if let Err(e) = self
                    .scope
                    .guild_id
                    .ban_with_reason(&ctx.http, msg.author.id, 0, BAN_REASON)
                    .await
                {
                    error!("Failed to ban {}: {}", msg.author.name, e);
                }

                // Our own deletion is already reported above
                if let Some(moderation) = self.moderation.as_mut() {
                    moderation.recent.take(msg.id);
                }
                if let Err(e) = msg.delete(ctx).await {
                    error!("Failed to delete message {}: {}", msg.id, e);
                }
            }
            ModerationAction::Alert => {
                info!("Warned word from {} in {}", msg.author.name, msg.channel_id);
                self.notify(ctx, notify::warned_word(msg.author.id, msg.channel_id, &msg.content))
                    .await;
            }
        }
        action.stops_commands()
    }

    /// Post a welcome in the introductions channel for a member who replied
    /// `welcome` to the welcome DMs.
    ///
    /// Returns `true` if the message was such a request.
    async fn handle_welcome_request(&mut self, ctx: &Context, msg: &Message) -> bool {
        if self.moderation.is_none() || !notify::is_welcome_request(&msg.content) {
            return false;
        }
        let Some(channel) = self
            .welcome
            .introductions_channel
            .filter(|id| *id != 0)
            .map(ChannelId::new)
        else {
            debug!("Welcome requested by {} but no introductions channel is set", msg.author.tag());
            return false;
        };

        if let Err(e) = self.scope.guild_id.member(ctx, msg.author.id).await {
            debug!("Welcome requested by non-member {}: {}", msg.author.tag(), e);
            return false;
        }

        let already_posted = self
            .moderation
            .as_ref()
            .is_some_and(|m| m.welcomes.has_posted(msg.author.id.get()));
        let reply = if already_posted {
            notify::welcome_already_posted(channel)
        } else {
            let post = notify::introduction_welcome(msg.author.id, &self.welcome.server_name);
            if let Err(e) = channel.send_message(&ctx.http, post.into_message()).await {
                error!("Failed to post welcome for {}: {}", msg.author.tag(), e);
                return true;
            }
            info!("Posted welcome for {} in {}", msg.author.tag(), channel);

            if let Some(moderation) = self.moderation.as_mut() {
                if let Err(e) = moderation.welcomes.record_post(msg.author.id.get(), Utc::now()) {
                    error!("Failed to record welcome post for {}: {}", msg.author.tag(), e);
                }
            }
            notify::welcome_posted(channel)
        };

        if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            warn!("Failed to reply to {}: {}", msg.author.tag(), e);
        }
        true
    }

    pub fn handle_message_edit(&mut self, message_id: MessageId, content: Option<String>) {
        if let (Some(moderation), Some(content)) = (self.moderation.as_mut(), content) {
            moderation.recent.update_content(message_id, content);
        }
    }

    pub async fn handle_message_delete(
        &mut self,
        ctx: &Context,
        channel_id: ChannelId,
        message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        let Some(moderation) = self.moderation.as_mut() else {
            return;
        };
        let cached = moderation.recent.take(message_id);
        if cached.is_none() {
            debug!(
                "Deleted message {} was not buffered ({} buffered)",
                message_id,
                moderation.recent.len()
            );
        }

        let self_id = ctx.cache.current_user().id;
        let Some(cached) = self
            .scope
            .deletion_to_report(guild_id, channel_id, cached.as_ref(), self_id)
        else {
            return;
        };

        if exemption::check_member(
            ctx,
            self.scope.guild_id,
            cached.author_id,
            cached.author_roles.as_deref(),
            &self.exemptions,
        )
        .await
        {
            return;
        }

        self.notify(ctx, notify::message_deleted(cached.author_id, channel_id, &cached.content))
            .await;
    }

    pub async fn handle_member_join(&mut self, ctx: &Context, member: Member) {
        if member.guild_id != self.scope.guild_id || self.moderation.is_none() {
            return;
        }
        info!("{} joined the server", member.user.tag());

        let info = MemberInfo::from_member(&member);
        self.notify(ctx, notify::member_joined(&info, Timestamp::now())).await;

        let action = match self.moderation.as_ref() {
            Some(moderation) => moderation.welcomes.action_for(member.user.id.get()),
            None => return,
        };

        match action {
            WelcomeAction::SendWelcome => self.send_welcome(ctx, &member.user).await,
            WelcomeAction::Skip => {
                self.notify(ctx, notify::repeat_join(member.user.id)).await;
            }
        }
    }

    async fn send_welcome(&mut self, ctx: &Context, user: &User) {
        for text in notify::welcome_dms(&self.welcome) {
            if let Err(e) = user.direct_message(ctx, CreateMessage::new().content(text)).await {
                warn!("Failed to send welcome DM to {}: {}", user.tag(), e);
                return;
            }
        }

        if let Some(moderation) = self.moderation.as_mut() {
            if let Err(e) = moderation.welcomes.record(user.id.get(), Utc::now()) {
                error!("Failed to record welcome for {}: {}", user.tag(), e);
            }
        }
    }

    pub async fn handle_member_leave(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        user: User,
        member: Option<Member>,
    ) {
        if guild_id != self.scope.guild_id || self.moderation.is_none() {
            return;
        }
        info!("{} left the server", user.tag());

        let info = MemberInfo::from_user(&user, member.as_ref());
        self.notify(ctx, notify::member_left(&info, Timestamp::now())).await;
    }

    pub async fn handle_ban(&self, ctx: &Context, guild_id: GuildId, user: User, banned: bool) {
        if guild_id != self.scope.guild_id || self.moderation.is_none() {
            return;
        }

        let notification = if banned {
            info!("{} was banned", user.tag());
            notify::member_banned(user.id, &user.name)
        } else {
            info!("{} was unbanned", user.tag());
            notify::member_unbanned(user.id, &user.name)
        };
        self.notify(ctx, notification).await;
    }

    /// Send to the home channel. Failures are logged, never retried.
    async fn notify(&self, ctx: &Context, notification: Notification) {
        let Some(home) = self.home else {
            warn!("Home channel not ready, dropping notification: {:?}", notification);
            return;
        };

        if let Err(e) = home.send_message(&ctx.http, notification.into_message()).await {
            error!("Failed to send to home channel {}: {}", home, e);
        }
    }
}

/// Channel name for logs, falling back to the raw id.
fn channel_label(ctx: &Context, msg: &Message) -> String {
    let Some(guild_id) = msg.guild_id else {
        return "DM".to_string();
    };

    ctx.cache
        .guild(guild_id)
        .and_then(|guild| guild.channels.get(&msg.channel_id).map(|c| format!("#{}", c.name)))
        .unwrap_or_else(|| msg.channel_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SettingsStore;

    const GUILD: u64 = 100;
    const HOME: u64 = 200;
    const IGNORED: u64 = 300;
    const BOT: u64 = 999;

    fn scope() -> Scope {
        Scope {
            guild_id: GuildId::new(GUILD),
            home_id: ChannelId::new(HOME),
            ignored_delete_channels: [ChannelId::new(IGNORED)].into_iter().collect(),
        }
    }

    fn cached(author: u64) -> CachedMessage {
        CachedMessage {
            id: MessageId::new(1),
            author_id: UserId::new(author),
            author_roles: None,
            content: "gone".to_string(),
        }
    }

    fn report(guild: Option<u64>, channel: u64, message: Option<&CachedMessage>) -> bool {
        scope()
            .deletion_to_report(
                guild.map(GuildId::new),
                ChannelId::new(channel),
                message,
                UserId::new(BOT),
            )
            .is_some()
    }

    #[test]
    fn test_bots_are_ignored_everywhere() {
        let scope = scope();
        assert_eq!(scope.route_message(true, Some(GuildId::new(GUILD))), MessageRoute::Ignore);
        assert_eq!(scope.route_message(true, None), MessageRoute::Ignore);
    }

    #[test]
    fn test_other_guilds_are_ignored() {
        assert_eq!(scope().route_message(false, Some(GuildId::new(7))), MessageRoute::Ignore);
    }

    #[test]
    fn test_routes_for_dm_and_our_guild() {
        let scope = scope();
        assert_eq!(scope.route_message(false, None), MessageRoute::Direct);
        assert_eq!(scope.route_message(false, Some(GuildId::new(GUILD))), MessageRoute::Guild);
    }

    #[test]
    fn test_hits_stop_commands() {
        let ban = ModerationAction::decide(Verdict::Banned, false);
        let alert = ModerationAction::decide(Verdict::Warned, false);
        assert_eq!(ban, ModerationAction::Ban);
        assert_eq!(alert, ModerationAction::Alert);
        assert!(ban.stops_commands());
        assert!(alert.stops_commands());

        let clean = ModerationAction::decide(Verdict::Clean, false);
        assert_eq!(clean, ModerationAction::Pass);
        assert!(!clean.stops_commands());
    }

    #[test]
    fn test_exempt_authors_pass() {
        assert_eq!(ModerationAction::decide(Verdict::Banned, true), ModerationAction::Pass);
        assert_eq!(ModerationAction::decide(Verdict::Warned, true), ModerationAction::Pass);
    }

    #[test]
    fn test_deletion_reported() {
        let message = cached(42);
        let reported = scope().deletion_to_report(
            Some(GuildId::new(GUILD)),
            ChannelId::new(5),
            Some(&message),
            UserId::new(BOT),
        );
        assert_eq!(reported, Some(&message));
    }

    #[test]
    fn test_deletion_skips() {
        let message = cached(42);
        // Own messages
        assert!(!report(Some(GUILD), 5, Some(&cached(BOT))));
        // Home channel
        assert!(!report(Some(GUILD), HOME, Some(&message)));
        // Configured channels
        assert!(!report(Some(GUILD), IGNORED, Some(&message)));
        // Not buffered
        assert!(!report(Some(GUILD), 5, None));
        // Other guilds
        assert!(!report(Some(7), 5, Some(&message)));
    }

    #[test]
    fn test_scope_from_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "auth": { "owner_id": 1, "token": "abc" },
                "prefix": "!",
                "guild": 100,
                "home": 200,
                "ignored_delete_channels": [300]
            }"#,
        )
        .unwrap();

        let scope = Scope::from_config(&config);
        assert_eq!(scope.guild_id, GuildId::new(GUILD));
        assert_eq!(scope.home_id, ChannelId::new(HOME));
        assert!(scope.ignored_delete_channels.contains(&ChannelId::new(IGNORED)));
    }

    #[tokio::test]
    async fn test_only_first_ready_initializes() {
        let config: Config = serde_json::from_str(
            r#"{ "auth": { "owner_id": 1, "token": "abc" }, "prefix": "!", "guild": 100, "home": 200 }"#,
        )
        .unwrap();
        let settings = SettingsStore::open_in_memory().await.unwrap();
        let commands = CommandHandler::new(settings, "!".to_string(), UserId::new(1), Vec::new());
        let mut handler = ModerationHandler::new(&config, commands, None);

        assert!(handler.home.is_none());
        assert!(handler.mark_ready());
        assert_eq!(handler.home, Some(ChannelId::new(HOME)));
        assert!(!handler.mark_ready());
    }
}
