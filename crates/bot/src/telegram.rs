use core::time::Duration;

use async_trait::async_trait;
use plugin_core::{ChannelRef, ChatId, MessageIndex, Messenger, MessengerError};
use teloxide::{
    RequestError,
    prelude::*,
    types::{MessageId, Recipient},
};

/// [`Messenger`] backed by the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn map_error(err: RequestError) -> MessengerError {
    match err {
        RequestError::RetryAfter(secs) => MessengerError::RateLimited {
            retry_after: Duration::from_secs(u64::from(secs.seconds())),
        },
        RequestError::Api(api) => MessengerError::api(api.to_string()),
        RequestError::Network(e) => MessengerError::Network(e.to_string()),
        RequestError::Io(e) => MessengerError::Network(e.to_string()),
        err @ (RequestError::MigrateToChatId(_) | RequestError::InvalidJson { .. }) => {
            MessengerError::api(err.to_string())
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), MessengerError> {
        self.bot
            .send_message(teloxide::types::ChatId(chat_id), text)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn resolve(&self, channel: &ChannelRef) -> Result<ChatId, MessengerError> {
        match channel {
            ChannelRef::Id(id) => Ok(*id),
            ChannelRef::Handle(handle) => {
                let chat = self
                    .bot
                    .get_chat(Recipient::ChannelUsername(handle.clone()))
                    .await
                    .map_err(map_error)?;
                Ok(chat.id.0)
            }
        }
    }

    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message: MessageIndex,
    ) -> Result<(), MessengerError> {
        self.bot
            .copy_message(
                teloxide::types::ChatId(to),
                teloxide::types::ChatId(from),
                MessageId(message),
            )
            .await
            .map_err(map_error)?;
        Ok(())
    }
}
