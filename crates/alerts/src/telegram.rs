//! Telegram delivery and message templates.

use crate::notifier::{AlertError, Notifier, SendOptions};
use async_trait::async_trait;
use gemwatch_core::{SummaryEntry, TokenRecord};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode, Recipient};
use teloxide::utils::html::escape;
use tracing::debug;

/// Telegram bot wrapper implementing [`Notifier`].
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    /// Create a new notifier with the given bot token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Get the underlying bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Turn a configured channel id into a Telegram recipient.
///
/// Numeric ids (`-100...`) address chats directly, `@name` addresses a
/// public channel.
pub fn parse_recipient(channel: &str) -> Result<Recipient, AlertError> {
    let channel = channel.trim();
    if let Ok(id) = channel.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if channel.len() > 1 && channel.starts_with('@') {
        return Ok(Recipient::ChannelUsername(channel.to_string()));
    }
    Err(AlertError::InvalidChannel(channel.to_string()))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> Result<(), AlertError> {
        let recipient = parse_recipient(channel)?;
        let mut request = self.bot.send_message(recipient, text);
        if options.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if options.disable_link_preview {
            request = request.link_preview_options(LinkPreviewOptions {
                is_disabled: true,
                url: None,
                prefer_small_media: false,
                prefer_large_media: false,
                show_above_text: false,
            });
        }
        request.await?;
        debug!(channel = channel, bytes = text.len(), "Telegram message sent");
        Ok(())
    }
}

/// Branding shared by all messages.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    pub bot_name: String,
    /// Extra lines appended to new-token posts (referral links and such).
    pub footer: Vec<String>,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            bot_name: "Zeus Gems".to_string(),
            footer: Vec::new(),
        }
    }
}

/// Group an integer string's digits in threes.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a USD amount rounded to whole dollars, e.g. `$1,234,568`.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let rounded = value.abs().round() as u64;
    let sign = if value < 0.0 && rounded > 0 { "-" } else { "" };
    format!("{}${}", sign, group_thousands(&rounded.to_string()))
}

/// Format price with appropriate precision based on magnitude.
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "$0".to_string();
    }
    let abs_price = price.abs();
    if abs_price >= 1000.0 {
        format!("${:.2}", price)
    } else if abs_price >= 1.0 {
        format!("${:.4}", price)
    } else if abs_price >= 0.01 {
        format!("${:.6}", price)
    } else if abs_price >= 0.0001 {
        format!("${:.8}", price)
    } else {
        format!("${:.10}", price)
    }
}

/// Format a pair age compactly, e.g. `45s`, `12m`, `3h 5m`, `2d 4h`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

fn or_na(value: Option<f64>, f: fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| "N/A".to_string())
}

/// Format the post announcing a newly tracked token.
pub fn format_new_token_message(record: &TokenRecord, template: &MessageTemplate) -> String {
    let mut msg = format!(
        "🔔 <b>{} | {}</b>\n\
         <code>{}</code>\n\n\
         🧢 Marketcap: {}\n\
         💵 Price: {}\n\
         ⏱️ Age: {}\n\
         🚀 Volume (1h): {}\n\
         💧 Liquidity: {}",
        escape(&record.name),
        escape(&record.symbol),
        escape(&record.id),
        or_na(record.market_cap, format_usd),
        or_na(record.price_usd, format_price),
        record.age.map(format_age).unwrap_or_else(|| "N/A".to_string()),
        or_na(record.volume, format_usd),
        or_na(record.liquidity, format_usd),
    );

    if let Some(url) = &record.url {
        msg.push_str(&format!(
            "\n📊 Chart: <a href=\"{}\">Dexscreener</a>",
            escape(url)
        ));
    }

    msg.push_str("\n\n💎 Gamble Play, NFA, DYOR");
    msg.push_str(&format!("\n\n— Powered by {} Bot", escape(&template.bot_name)));
    for line in &template.footer {
        msg.push('\n');
        msg.push_str(&escape(line));
    }
    msg
}

/// Format the alert for one crossed multiplier.
pub fn format_multiplier_alert(display_name: &str, symbol: &str, multiplier: u32) -> String {
    format!(
        "🔥 <b>{}x Alert!</b>\n💎 {} ({}) just hit {}x from when it was posted!",
        multiplier,
        escape(display_name),
        escape(symbol),
        multiplier
    )
}

/// Format the periodic summary. Returns `None` when there is nothing to report.
pub fn format_weekly_summary(entries: &[SummaryEntry], template: &MessageTemplate) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut msg = format!("<b>📈 {} Weekly Summary</b>\n", escape(&template.bot_name));
    for entry in entries {
        msg.push_str(&format!(
            "\n💠 {}: {:.1}x",
            escape(&entry.display_name),
            entry.peak_multiple
        ));
    }
    Some(msg)
}
