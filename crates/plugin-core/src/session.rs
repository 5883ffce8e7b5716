use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{channel::ChannelRef, messenger::ChatId, messenger::MessageIndex};

/// Where a chat currently is in the setup conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Idle,
    AwaitingSource,
    AwaitingDestination,
    AwaitingTestInput,
}

/// Inclusive range of message indices, always ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRange {
    start: MessageIndex,
    end: MessageIndex,
}

impl MessageRange {
    /// Build a range from two bounds given in either order.
    #[must_use]
    pub fn new(a: MessageIndex, b: MessageIndex) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    #[must_use]
    pub const fn start(&self) -> MessageIndex {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> MessageIndex {
        self.end
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        u64::try_from(i64::from(self.end) - i64::from(self.start) + 1).unwrap_or(0)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = MessageIndex> {
        self.start..=self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub step: Step,
    /// Set while a forward run owns this chat.
    pub running: bool,
    pub range: Option<MessageRange>,
    pub source: Option<ChannelRef>,
    pub destination: Option<ChannelRef>,
}

impl Session {
    /// Drop everything collected during setup but keep the `running` flag.
    pub fn clear_setup(&mut self) {
        *self = Self {
            running: self.running,
            ..Self::default()
        };
    }
}

/// Per-chat conversation state. Entries are created on first access and only
/// ever reset, never removed.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<ChatId, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the session for `chat_id`, creating a default one if needed.
    pub async fn get(&self, chat_id: ChatId) -> Session {
        let mut inner = self.inner.lock().await;
        inner.entry(chat_id).or_default().clone()
    }

    /// Mutate the session for `chat_id` under the store lock.
    pub async fn update<R>(&self, chat_id: ChatId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut inner = self.inner.lock().await;
        f(inner.entry(chat_id).or_default())
    }

    pub async fn reset(&self, chat_id: ChatId) {
        let mut inner = self.inner.lock().await;
        inner.insert(chat_id, Session::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_ordered_regardless_of_input_order() {
        let range = MessageRange::new(30, 2);
        assert_eq!((range.start(), range.end()), (2, 30));
        assert_eq!(range.len(), 29);
        assert_eq!(MessageRange::new(7, 7).iter().collect::<Vec<_>>(), vec![7]);
    }

    #[tokio::test]
    async fn get_creates_default_session_once() {
        let store = SessionStore::new();
        assert_eq!(store.get(1).await, Session::default());

        store.update(1, |s| s.step = Step::AwaitingSource).await;
        assert_eq!(store.get(1).await.step, Step::AwaitingSource);
        assert_eq!(store.get(2).await.step, Step::Idle);
    }

    #[tokio::test]
    async fn reset_clears_every_field() {
        let store = SessionStore::new();
        store
            .update(5, |s| {
                s.step = Step::AwaitingDestination;
                s.running = true;
                s.range = Some(MessageRange::new(1, 3));
                s.source = Some(ChannelRef::Id(-100));
            })
            .await;

        store.reset(5).await;
        assert_eq!(store.get(5).await, Session::default());

        store.reset(5).await;
        assert_eq!(store.get(5).await, Session::default());
    }

    #[test]
    fn clear_setup_keeps_running_flag() {
        let mut session = Session {
            step: Step::AwaitingDestination,
            running: true,
            range: Some(MessageRange::new(1, 2)),
            source: Some(ChannelRef::Handle("@srcchan".to_owned())),
            destination: None,
        };
        session.clear_setup();
        assert_eq!(
            session,
            Session {
                running: true,
                ..Session::default()
            }
        );
    }
}
