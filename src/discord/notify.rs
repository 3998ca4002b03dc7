//! Home-channel notifications and welcome texts.
//!
//! Everything here is pure formatting: handlers build a [`Notification`]
//! and hand it to serenity.

use serenity::all::{
    ChannelId, CreateEmbed, CreateMessage, Member, Mentionable, Timestamp, User, UserId,
};

use crate::config::types::WelcomeConfig;

/// Red, used when someone gets banned for a word.
pub const COLOUR_BAN: u32 = 16711680;
/// Orange, used for warned-word alerts.
pub const COLOUR_ALERT: u32 = 16737330;
/// Purple, used for membership and deletion logs.
pub const COLOUR_LOG: u32 = 8700043;

/// Embed contents, kept separate from serenity's builder so it can be inspected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedNotice {
    pub title: Option<String>,
    pub description: Option<String>,
    pub colour: u32,
    pub fields: Vec<(String, String)>,
    pub image: Option<String>,
    pub timestamp: Option<Timestamp>,
}

impl EmbedNotice {
    pub fn to_embed(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new().colour(self.colour);
        if let Some(ref title) = self.title {
            embed = embed.title(title);
        }
        if let Some(ref description) = self.description {
            embed = embed.description(description);
        }
        for (name, value) in &self.fields {
            embed = embed.field(name, value, false);
        }
        if let Some(ref image) = self.image {
            embed = embed.image(image);
        }
        if let Some(timestamp) = self.timestamp {
            embed = embed.timestamp(timestamp);
        }
        embed
    }
}

/// A message destined for the home channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Embed(EmbedNotice),
    Text(String),
}

impl Notification {
    pub fn into_message(self) -> CreateMessage {
        match self {
            Self::Embed(notice) => CreateMessage::new().embed(notice.to_embed()),
            Self::Text(text) => CreateMessage::new().content(text),
        }
    }
}

/// The parts of a user shown in membership notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub id: UserId,
    pub username: String,
    pub tag: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl MemberInfo {
    pub fn from_user(user: &User, member: Option<&Member>) -> Self {
        Self {
            id: user.id,
            username: user.name.clone(),
            tag: user.tag(),
            display_name: member
                .map(|m| m.display_name().to_string())
                .unwrap_or_else(|| user.display_name().to_string()),
            avatar_url: user.face(),
        }
    }

    pub fn from_member(member: &Member) -> Self {
        Self::from_user(&member.user, Some(member))
    }
}

pub fn banned_word(author: UserId, channel: ChannelId, content: &str) -> Notification {
    Notification::Embed(EmbedNotice {
        title: Some(format!(
            "Banning {} for usage of a banned word in {}.",
            author.mention(),
            channel.mention()
        )),
        description: Some(content.to_string()),
        colour: COLOUR_BAN,
        ..Default::default()
    })
}

pub fn warned_word(author: UserId, channel: ChannelId, content: &str) -> Notification {
    Notification::Embed(EmbedNotice {
        title: Some("🚨 Funny Alert 🚨".to_string()),
        description: Some(format!(
            "**{} in {}**\n{}",
            author.mention(),
            channel.mention(),
            content
        )),
        colour: COLOUR_ALERT,
        ..Default::default()
    })
}

pub fn message_deleted(author: UserId, channel: ChannelId, content: &str) -> Notification {
    Notification::Embed(EmbedNotice {
        description: Some(format!(
            "**Message from {} deleted in {}.**\n{}",
            author.mention(),
            channel.mention(),
            content
        )),
        colour: COLOUR_LOG,
        ..Default::default()
    })
}

pub fn member_joined(member: &MemberInfo, now: Timestamp) -> Notification {
    membership(format!("{} has joined the server.", member.username), member, now)
}

pub fn member_left(member: &MemberInfo, now: Timestamp) -> Notification {
    membership(
        format!("{} ({}) has left the server.", member.username, member.display_name),
        member,
        now,
    )
}

fn membership(title: String, member: &MemberInfo, now: Timestamp) -> Notification {
    Notification::Embed(EmbedNotice {
        title: Some(title),
        description: None,
        colour: COLOUR_LOG,
        fields: vec![
            ("Ping".to_string(), member.id.mention().to_string()),
            ("Tag".to_string(), member.tag.clone()),
        ],
        image: Some(member.avatar_url.clone()),
        timestamp: Some(now),
    })
}

pub fn member_banned(user: UserId, username: &str) -> Notification {
    Notification::Text(format!(
        "{} ({}) has been banned from the server.",
        user.mention(),
        username
    ))
}

pub fn member_unbanned(user: UserId, username: &str) -> Notification {
    Notification::Text(format!(
        "{} ({}) has been unbanned from the server.",
        user.mention(),
        username
    ))
}

pub fn repeat_join(user: UserId) -> Notification {
    Notification::Text(format!(
        "Almost sent a welcome message to {}, but they have been here before or something :thinking: ",
        user.mention()
    ))
}

/// The direct messages a first-time member receives, in order.
pub fn welcome_dms(welcome: &WelcomeConfig) -> Vec<String> {
    let rules = channel_ref(welcome.rules_channel, "the rules channel");
    let introductions = channel_ref(welcome.introductions_channel, "the introductions channel");

    vec![
        format!(
            "hello ^_^ welcome to the {} server. please remember to check out {} if you haven't already!",
            welcome.server_name, rules
        ),
        format!(
            "oh, by the way: would you like me to post a welcome message for you in {}?",
            introductions
        ),
        "just respond here with 'welcome' any time in the future and i'll do it. :)".to_string(),
    ]
}

/// Whether a DM asks for the welcome post offered in [`welcome_dms`].
pub fn is_welcome_request(content: &str) -> bool {
    content
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .eq_ignore_ascii_case("welcome")
}

/// The post made in the introductions channel on request.
pub fn introduction_welcome(user: UserId, server_name: &str) -> Notification {
    Notification::Text(format!(
        "everyone please welcome {} to the {} server! ^_^",
        user.mention(),
        server_name
    ))
}

/// DM reply once the welcome post is up.
pub fn welcome_posted(channel: ChannelId) -> String {
    format!("done! i posted a welcome message for you in {} :)", channel.mention())
}

/// DM reply when the welcome was posted before.
pub fn welcome_already_posted(channel: ChannelId) -> String {
    format!(
        "i already posted a welcome message for you in {}, but thank you for asking ^_^",
        channel.mention()
    )
}

fn channel_ref(channel: Option<u64>, fallback: &str) -> String {
    match channel {
        Some(id) if id != 0 => ChannelId::new(id).mention().to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> MemberInfo {
        MemberInfo {
            id: UserId::new(42),
            username: "nyan".to_string(),
            tag: "nyan#0001".to_string(),
            display_name: "Nyan Cat".to_string(),
            avatar_url: "https://cdn.example/avatar.png".to_string(),
        }
    }

    fn embed(notification: Notification) -> EmbedNotice {
        match notification {
            Notification::Embed(notice) => notice,
            Notification::Text(text) => panic!("expected embed, got text: {}", text),
        }
    }

    #[test]
    fn test_banned_word_embed() {
        let notice = embed(banned_word(UserId::new(1), ChannelId::new(2), "bad stuff"));
        assert_eq!(
            notice.title.as_deref(),
            Some("Banning <@1> for usage of a banned word in <#2>.")
        );
        assert_eq!(notice.description.as_deref(), Some("bad stuff"));
        assert_eq!(notice.colour, COLOUR_BAN);
    }

    #[test]
    fn test_warned_word_embed() {
        let notice = embed(warned_word(UserId::new(1), ChannelId::new(2), "hmm"));
        assert_eq!(notice.title.as_deref(), Some("🚨 Funny Alert 🚨"));
        assert_eq!(notice.description.as_deref(), Some("**<@1> in <#2>**\nhmm"));
        assert_eq!(notice.colour, COLOUR_ALERT);
    }

    #[test]
    fn test_deleted_message_embed() {
        let notice = embed(message_deleted(UserId::new(1), ChannelId::new(2), "gone"));
        assert!(notice.title.is_none());
        assert_eq!(
            notice.description.as_deref(),
            Some("**Message from <@1> deleted in <#2>.**\ngone")
        );
        assert_eq!(notice.colour, COLOUR_LOG);
    }

    #[test]
    fn test_join_and_leave_embeds() {
        let now = Timestamp::now();

        let joined = embed(member_joined(&member(), now));
        assert_eq!(joined.title.as_deref(), Some("nyan has joined the server."));
        assert_eq!(
            joined.fields,
            vec![
                ("Ping".to_string(), "<@42>".to_string()),
                ("Tag".to_string(), "nyan#0001".to_string()),
            ]
        );
        assert_eq!(joined.image.as_deref(), Some("https://cdn.example/avatar.png"));
        assert_eq!(joined.timestamp, Some(now));

        let left = embed(member_left(&member(), now));
        assert_eq!(left.title.as_deref(), Some("nyan (Nyan Cat) has left the server."));
        assert_eq!(left.colour, COLOUR_LOG);
    }

    #[test]
    fn test_ban_texts() {
        assert_eq!(
            member_banned(UserId::new(42), "nyan"),
            Notification::Text("<@42> (nyan) has been banned from the server.".to_string())
        );
        assert_eq!(
            member_unbanned(UserId::new(42), "nyan"),
            Notification::Text("<@42> (nyan) has been unbanned from the server.".to_string())
        );
    }

    #[test]
    fn test_repeat_join_text() {
        match repeat_join(UserId::new(42)) {
            Notification::Text(text) => {
                assert!(text.starts_with("Almost sent a welcome message to <@42>"))
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_welcome_dms_with_channels() {
        let config = WelcomeConfig {
            server_name: "Nyanners".to_string(),
            rules_channel: Some(183028007403913216),
            introductions_channel: Some(182712193287061504),
        };

        let dms = welcome_dms(&config);
        assert_eq!(dms.len(), 3);
        assert!(dms[0].contains("welcome to the Nyanners server"));
        assert!(dms[0].contains("<#183028007403913216>"));
        assert!(dms[1].contains("<#182712193287061504>"));
        assert!(dms[2].contains("'welcome'"));
    }

    #[test]
    fn test_welcome_request_replies() {
        assert!(is_welcome_request("welcome"));
        assert!(is_welcome_request("  Welcome! "));
        assert!(is_welcome_request("'welcome'"));
        assert!(!is_welcome_request("welcome me please"));
        assert!(!is_welcome_request("!help"));
        assert!(!is_welcome_request(""));
    }

    #[test]
    fn test_introduction_texts() {
        assert_eq!(
            introduction_welcome(UserId::new(42), "Nyanners"),
            Notification::Text("everyone please welcome <@42> to the Nyanners server! ^_^".to_string())
        );
        assert!(welcome_posted(ChannelId::new(7)).contains("<#7>"));
        assert!(welcome_already_posted(ChannelId::new(7)).starts_with("i already posted"));
    }

    #[test]
    fn test_welcome_dms_without_channels() {
        let dms = welcome_dms(&WelcomeConfig::default());
        assert!(dms[0].contains("the rules channel"));
        assert!(dms[1].contains("the introductions channel"));
    }
}
