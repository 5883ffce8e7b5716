use core::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::channel::ChannelRef;

/// Chat identifier as used by the messaging platform.
pub type ChatId = i64;

/// Platform-assigned message index within a chat.
pub type MessageIndex = i32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessengerError {
    /// The platform asked us to back off before the next request.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    /// The platform rejected the request with a description.
    #[error("{description}")]
    Api { description: String },
    #[error("network error: {0}")]
    Network(String),
}

impl MessengerError {
    pub fn api(description: impl Into<String>) -> Self {
        Self::Api {
            description: description.into(),
        }
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            Self::Api { .. } | Self::Network(_) => None,
        }
    }
}

/// Outbound operations the bot needs from the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), MessengerError>;

    /// Turn a channel reference into a numeric chat id. Numeric references are
    /// returned as-is without contacting the platform.
    async fn resolve(&self, channel: &ChannelRef) -> Result<ChatId, MessengerError>;

    /// Copy a single message from `from` into `to` as a new message.
    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message: MessageIndex,
    ) -> Result<(), MessengerError>;
}
