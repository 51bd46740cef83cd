//! Notifier collaborator interface.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Invalid channel id: {0}")]
    InvalidChannel(String),
}

/// Delivery options for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Render the text as Telegram HTML.
    pub html: bool,
    /// Suppress link previews.
    pub disable_link_preview: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::html()
    }
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            html: true,
            disable_link_preview: true,
        }
    }
}

/// Delivers formatted messages to a channel.
///
/// Delivery is best effort: callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> Result<(), AlertError>;
}
