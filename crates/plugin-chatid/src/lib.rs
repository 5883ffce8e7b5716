use std::sync::Arc;

use anyhow::Result;

use async_trait::async_trait;
use plugin_core::factory::PluginFactory;
use plugin_core::{Plugin, PluginContext, PluginSpec, PluginTriggers, send_text};

#[derive(Debug)]
pub struct ChatIdPlugin;

impl PluginFactory for ChatIdPlugin {
    fn register_defaults(&self, specs: &mut Vec<PluginSpec>) {
        if !specs.iter().any(|s| s.id == "chatid") {
            specs.push(PluginSpec {
                id: "chatid".to_owned(),
                enabled: true,
                triggers: PluginTriggers {
                    commands: vec!["/chatid".to_owned()],
                },
                config: serde_yaml::Value::default(),
            });
        }
    }

    fn build(&self) -> Arc<dyn Plugin> {
        Arc::new(ChatId)
    }
}

#[derive(Debug)]
pub struct ChatId;

#[async_trait]
impl Plugin for ChatId {
    fn id(&self) -> &'static str {
        "chatid"
    }
    fn help(&self) -> &'static str {
        "/chatid - show this chat's id"
    }

    async fn run(&self, ctx: &PluginContext, _args: &str, _spec: &PluginSpec) -> Result<()> {
        send_text(ctx, format!("chat_id = {}", ctx.chat_id)).await
    }
}
