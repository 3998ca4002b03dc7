//! Discord bot integration.
//!
//! This module connects to Discord, moderates guild messages and posts
//! notifications to the home channel.

pub mod client;
pub mod commands;
pub mod handler;
pub mod notify;
pub mod recent;

// Re-export main types for external use
pub use client::DiscordBotBuilder;
pub use commands::CommandHandler;
pub use handler::{Moderation, ModerationHandler};
