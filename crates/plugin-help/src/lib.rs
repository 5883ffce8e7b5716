use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use plugin_core::factory::PluginFactory;
use plugin_core::{Plugin, PluginContext, PluginRegistry, PluginSpec, PluginTriggers, send_text};

#[derive(Debug)]
pub struct HelpPlugin;

impl PluginFactory for HelpPlugin {
    fn register_defaults(&self, specs: &mut Vec<PluginSpec>) {
        if !specs.iter().any(|t| t.id == "help") {
            specs.push(PluginSpec {
                id: "help".to_owned(),
                enabled: true,
                triggers: PluginTriggers {
                    commands: vec!["/start".to_owned(), "/help".to_owned()],
                },
                config: serde_yaml::Value::default(),
            });
        }
    }

    fn build(&self) -> Arc<dyn Plugin> {
        Arc::new(Help)
    }
}

#[derive(Debug)]
pub struct Help;

/// One line per enabled plugin, sorted by id.
pub async fn command_lines(registry: &PluginRegistry) -> Vec<String> {
    let mut rows = Vec::new();
    for (id, entry) in registry.entries().await {
        if id == "help" || !registry.is_enabled(&id).await {
            continue;
        }
        rows.push(entry.plugin.help().to_owned());
    }
    rows
}

#[async_trait]
impl Plugin for Help {
    fn id(&self) -> &'static str {
        "help"
    }
    fn help(&self) -> &'static str {
        "/help - list commands"
    }
    async fn run(&self, ctx: &PluginContext, _args: &str, _spec: &PluginSpec) -> Result<()> {
        let mut text = String::from("Forwarder bot ready ✅\n\nCommands:\n");
        text.push_str(&command_lines(&ctx.registry).await.join("\n"));
        text.push_str("\n\nExample:\n/forward 120 135");
        send_text(ctx, text).await
    }
}
