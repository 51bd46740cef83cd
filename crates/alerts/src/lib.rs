//! Telegram alerting for tracked tokens.
//!
//! This crate provides:
//! - The `Notifier` collaborator trait and its Telegram implementation
//! - Message templates for new-token posts, multiplier alerts and summaries

pub mod notifier;
pub mod telegram;

pub use notifier::{AlertError, Notifier, SendOptions};
pub use telegram::{
    format_age, format_multiplier_alert, format_new_token_message, format_price, format_usd,
    format_weekly_summary, parse_recipient, MessageTemplate, TelegramNotifier,
};

/// HTML-escape text for Telegram's HTML parse mode.
pub use teloxide::utils::html::escape as escape_html;
