use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use plugin_core::{
    ChannelRef, ChatId, MessageIndex, Messenger, MessengerError, PluginContext, PluginRegistry,
    SessionStore,
};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyAttempt {
    pub to: ChatId,
    pub from: ChatId,
    pub message: MessageIndex,
    pub at: Instant,
}

/// In-memory messenger that records traffic and replays scripted failures.
#[derive(Debug, Default)]
pub struct FakeMessenger {
    sent: Mutex<Vec<(ChatId, String)>>,
    copies: Mutex<Vec<CopyAttempt>>,
    copy_script: Mutex<HashMap<MessageIndex, VecDeque<MessengerError>>>,
    handles: Mutex<HashMap<String, Result<ChatId, MessengerError>>>,
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_handle(&self, handle: &str, result: Result<ChatId, MessengerError>) {
        self.handles.lock().unwrap().insert(handle.to_owned(), result);
    }

    /// Queue a failure for the next copy attempt of `message`.
    pub fn fail_copy(&self, message: MessageIndex, err: MessengerError) {
        self.copy_script
            .lock()
            .unwrap()
            .entry(message)
            .or_default()
            .push_back(err);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn last_sent(&self) -> String {
        self.sent().last().cloned().unwrap_or_default()
    }

    pub fn copies(&self) -> Vec<CopyAttempt> {
        self.copies.lock().unwrap().clone()
    }

    pub fn copied_indices(&self) -> Vec<MessageIndex> {
        self.copies().iter().map(|c| c.message).collect()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), MessengerError> {
        self.sent.lock().unwrap().push((chat_id, text.to_owned()));
        Ok(())
    }

    async fn resolve(&self, channel: &ChannelRef) -> Result<ChatId, MessengerError> {
        match channel {
            ChannelRef::Id(id) => Ok(*id),
            ChannelRef::Handle(handle) => self
                .handles
                .lock()
                .unwrap()
                .get(handle)
                .cloned()
                .unwrap_or_else(|| Err(MessengerError::api("Bad Request: chat not found"))),
        }
    }

    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message: MessageIndex,
    ) -> Result<(), MessengerError> {
        self.copies.lock().unwrap().push(CopyAttempt {
            to,
            from,
            message,
            at: Instant::now(),
        });
        let scripted = self
            .copy_script
            .lock()
            .unwrap()
            .get_mut(&message)
            .and_then(VecDeque::pop_front);
        scripted.map_or(Ok(()), Err)
    }
}

pub fn context(messenger: &Arc<FakeMessenger>, chat_id: ChatId) -> PluginContext {
    PluginContext {
        messenger: Arc::clone(messenger) as Arc<dyn Messenger>,
        chat_id,
        registry: Arc::new(PluginRegistry::new()),
        sessions: Arc::new(SessionStore::new()),
    }
}
