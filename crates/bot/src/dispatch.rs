use std::sync::Arc;

use plugin_core::{ChatId, Messenger, PluginContext, PluginRegistry, SessionStore, truncate};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// No `@bot` suffix, or a suffix naming this bot.
    Us,
    OtherBot,
}

/// Split `/cmd@botname` into the bare command and whom it addresses.
pub fn classify_command_token(token: &str, own_username: Option<&str>) -> (String, Addressing) {
    let Some((cmd, target)) = token.split_once('@') else {
        return (token.to_owned(), Addressing::Us);
    };
    let routing = match own_username {
        Some(own) if own.trim_start_matches('@').eq_ignore_ascii_case(target) => Addressing::Us,
        _ => Addressing::OtherBot,
    };
    (cmd.to_owned(), routing)
}

/// Shared state handed to every incoming Telegram message.
pub struct BotState {
    pub messenger: Arc<dyn Messenger>,
    pub registry: Arc<PluginRegistry>,
    pub sessions: Arc<SessionStore>,
    pub username: Option<String>,
}

impl core::fmt::Debug for BotState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BotState")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BotState {
    fn context(&self, chat_id: ChatId) -> PluginContext {
        PluginContext {
            messenger: Arc::clone(&self.messenger),
            chat_id,
            registry: Arc::clone(&self.registry),
            sessions: Arc::clone(&self.sessions),
        }
    }

    /// Route one text message: `/commands` go to the plugin bound to them,
    /// anything else to plugins that follow free text.
    pub async fn handle_text(&self, chat_id: ChatId, text: &str) {
        let body = text.trim();
        info!(chat_id, body = %truncate(body, 200), "Incoming message");
        let ctx = self.context(chat_id);

        if body.starts_with('/') {
            let (token, args) = body
                .split_once(char::is_whitespace)
                .map_or((body, ""), |(t, a)| (t, a.trim()));
            let (cmd, addressing) = classify_command_token(token, self.username.as_deref());
            if addressing == Addressing::OtherBot {
                debug!(chat_id, cmd = %token, "Ignoring command addressed to another bot");
                return;
            }
            let Some(entry) = self.registry.entry_by_command(&cmd).await else {
                debug!(chat_id, cmd = %cmd, "Unknown command");
                return;
            };
            let plugin_id = entry.spec.id.clone();
            if !self.registry.is_enabled(&plugin_id).await {
                info!(plugin = %plugin_id, "Plugin disabled");
                return;
            }
            info!(chat_id, plugin = %plugin_id, cmd = %cmd, args = %args, "Running command");
            if let Err(e) = entry.plugin.run(&ctx, args, &entry.spec).await {
                warn!(chat_id, error = %e, plugin = %plugin_id, "Plugin failed");
            }
            return;
        }

        for (plugin_id, entry) in self.registry.entries().await {
            if !entry.plugin.handles_room_messages() || !entry.spec.enabled {
                continue;
            }
            if let Err(e) = entry.plugin.on_room_message(&ctx, body, &entry.spec).await {
                warn!(chat_id, error = %e, plugin = %plugin_id, "Plugin on_room_message failed");
            }
        }
    }
}
