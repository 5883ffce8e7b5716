pub mod channel;
pub mod factory;
pub mod messenger;
pub mod session;

use core::fmt;
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub use channel::ChannelRef;
pub use messenger::{ChatId, MessageIndex, Messenger, MessengerError};
pub use session::{MessageRange, Session, SessionStore, Step};

/// Everything a plugin needs to act on behalf of one incoming message.
#[derive(Clone)]
pub struct PluginContext {
    pub messenger: Arc<dyn Messenger>,
    pub chat_id: ChatId,
    pub registry: Arc<PluginRegistry>,
    pub sessions: Arc<SessionStore>,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn help(&self) -> &'static str;
    /// Whether non-command text should be delivered to [`Plugin::on_room_message`].
    fn handles_room_messages(&self) -> bool {
        false
    }
    async fn run(&self, ctx: &PluginContext, args: &str, spec: &PluginSpec) -> Result<()>;

    async fn on_room_message(
        &self,
        _ctx: &PluginContext,
        _text: &str,
        _spec: &PluginSpec,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PluginTriggers {
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginSpec {
    pub id: String,
    #[serde(default = "enabled_true")]
    pub enabled: bool,
    #[serde(default)]
    pub triggers: PluginTriggers,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

const fn enabled_true() -> bool {
    true
}

#[derive(Clone)]
pub struct PluginEntry {
    pub spec: PluginSpec,
    pub plugin: Arc<dyn Plugin>,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_id: HashMap<String, PluginEntry>,
    by_command: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, spec: PluginSpec, plugin: Arc<dyn Plugin>) -> Option<PluginEntry> {
        let mut inner = self.inner.write().await;
        let id = spec.id.clone();
        let previous = inner.by_id.insert(
            id.clone(),
            PluginEntry {
                spec: spec.clone(),
                plugin,
            },
        );
        inner.remove_triggers_for(&id);
        for cmd in &spec.triggers.commands {
            inner.by_command.insert(normalize_cmd(cmd), id.clone());
        }
        previous
    }

    pub async fn entry(&self, id: &str) -> Option<PluginEntry> {
        let inner = self.inner.read().await;
        inner.by_id.get(id).cloned()
    }

    /// Look up the plugin bound to a command token such as `/forward`.
    pub async fn entry_by_command(&self, token: &str) -> Option<PluginEntry> {
        let inner = self.inner.read().await;
        inner
            .by_command
            .get(&normalize_cmd(token))
            .and_then(|id| inner.by_id.get(id))
            .cloned()
    }

    /// All entries, sorted by plugin id.
    pub async fn entries(&self) -> Vec<(String, PluginEntry)> {
        let inner = self.inner.read().await;
        let mut entries: Vec<_> = inner
            .by_id
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub async fn is_enabled(&self, id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.by_id.get(id).is_some_and(|entry| entry.spec.enabled)
    }
}

impl RegistryInner {
    fn remove_triggers_for(&mut self, id: &str) {
        self.by_command.retain(|_, existing| existing != id);
    }
}

/// Commands are matched case-insensitively and always carry a leading `/`.
#[must_use]
pub fn normalize_cmd(s: &str) -> String {
    let lowered = s.to_lowercase();
    if lowered.starts_with('/') {
        lowered
    } else {
        format!("/{lowered}")
    }
}

#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub async fn send_text(ctx: &PluginContext, text: impl Into<String>) -> Result<()> {
    ctx.messenger.send_text(ctx.chat_id, &text.into()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        fn id(&self) -> &'static str {
            "noop"
        }
        fn help(&self) -> &'static str {
            "does nothing"
        }
        async fn run(&self, _ctx: &PluginContext, _args: &str, _spec: &PluginSpec) -> Result<()> {
            Ok(())
        }
    }

    fn spec(id: &str, commands: &[&str]) -> PluginSpec {
        PluginSpec {
            id: id.to_owned(),
            enabled: true,
            triggers: PluginTriggers {
                commands: commands.iter().map(|c| (*c).to_owned()).collect(),
            },
            config: serde_yaml::Value::default(),
        }
    }

    #[test]
    fn commands_normalize_to_lowercase_slash_form() {
        assert_eq!(normalize_cmd("forward"), "/forward");
        assert_eq!(normalize_cmd("/ChatId"), "/chatid");
    }

    #[tokio::test]
    async fn lookup_by_command_with_or_without_slash() {
        let registry = PluginRegistry::new();
        registry.register(spec("noop", &["noop", "/nop"]), Arc::new(Noop)).await;

        assert!(registry.entry_by_command("/noop").await.is_some());
        assert!(registry.entry_by_command("/NOP").await.is_some());
        assert!(registry.entry_by_command("/other").await.is_none());
    }

    #[tokio::test]
    async fn re_registering_replaces_old_triggers() {
        let registry = PluginRegistry::new();
        registry.register(spec("noop", &["/old"]), Arc::new(Noop)).await;
        let previous = registry.register(spec("noop", &["/new"]), Arc::new(Noop)).await;

        assert!(previous.is_some());
        assert!(registry.entry_by_command("/old").await.is_none());
        assert!(registry.entry_by_command("/new").await.is_some());
    }

    #[tokio::test]
    async fn disabled_specs_report_disabled() {
        let registry = PluginRegistry::new();
        let mut disabled = spec("noop", &["/noop"]);
        disabled.enabled = false;
        registry.register(disabled, Arc::new(Noop)).await;

        assert!(!registry.is_enabled("noop").await);
        assert!(!registry.is_enabled("missing").await);
    }

    #[test]
    fn spec_defaults_from_yaml() {
        let spec: PluginSpec = serde_yaml::from_str("id: forward").unwrap();
        assert!(spec.enabled);
        assert!(spec.triggers.commands.is_empty());
        assert!(spec.config.is_null());
    }
}
