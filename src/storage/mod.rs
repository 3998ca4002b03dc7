//! Persistence: the settings database and the welcome-state file.

pub mod settings;
pub mod welcome;

pub use settings::SettingsStore;
pub use welcome::{WelcomeAction, WelcomeLog};
