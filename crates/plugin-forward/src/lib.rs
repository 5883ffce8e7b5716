//! Copy a range of messages from one channel into another.
//!
//! Setup is a short conversation driven by [`Forward`]: `/forward <start> <end>`,
//! then the source channel, then the destination. Once both channels resolve,
//! the copy runs in its own task and reports back to the chat. [`Cancel`] and
//! [`Probe`] share the same per-chat session through the plugin context.

mod conversation;
mod forward_config;
mod runner;

#[cfg(test)]
mod fake;

pub use forward_config::ForwardConfig;
pub use runner::{CopyFailure, ForwardJob, ForwardReport, classify};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use plugin_core::factory::PluginFactory;
use plugin_core::{Plugin, PluginContext, PluginSpec, PluginTriggers};

fn default_spec(id: &str, commands: &[&str], config: serde_yaml::Value) -> PluginSpec {
    PluginSpec {
        id: id.to_owned(),
        enabled: true,
        triggers: PluginTriggers {
            commands: commands.iter().map(|c| (*c).to_owned()).collect(),
        },
        config,
    }
}

#[derive(Debug)]
pub struct ForwardPlugin;

impl PluginFactory for ForwardPlugin {
    fn register_defaults(&self, specs: &mut Vec<PluginSpec>) {
        if !specs.iter().any(|s| s.id == "forward") {
            let config = serde_yaml::to_value(ForwardConfig::default()).unwrap_or_default();
            specs.push(default_spec("forward", &["/forward"], config));
        }
    }

    fn build(&self) -> Arc<dyn Plugin> {
        Arc::new(Forward)
    }
}

#[derive(Debug)]
pub struct Forward;

#[async_trait]
impl Plugin for Forward {
    fn id(&self) -> &'static str {
        "forward"
    }

    fn help(&self) -> &'static str {
        "/forward <start_id> <end_id> - copy a message range between channels"
    }

    fn handles_room_messages(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &PluginContext, args: &str, _spec: &PluginSpec) -> Result<()> {
        conversation::begin(ctx, args).await
    }

    async fn on_room_message(
        &self,
        ctx: &PluginContext,
        text: &str,
        spec: &PluginSpec,
    ) -> Result<()> {
        let cfg = ForwardConfig::from_spec(spec);
        // The run reports back on its own; nothing to wait for here.
        let _run = conversation::on_text(ctx, text, &cfg).await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct CancelPlugin;

impl PluginFactory for CancelPlugin {
    fn register_defaults(&self, specs: &mut Vec<PluginSpec>) {
        if !specs.iter().any(|s| s.id == "cancel") {
            specs.push(default_spec("cancel", &["/cancel"], serde_yaml::Value::default()));
        }
    }

    fn build(&self) -> Arc<dyn Plugin> {
        Arc::new(Cancel)
    }
}

#[derive(Debug)]
pub struct Cancel;

#[async_trait]
impl Plugin for Cancel {
    fn id(&self) -> &'static str {
        "cancel"
    }

    fn help(&self) -> &'static str {
        "/cancel - abort the forward setup in progress"
    }

    async fn run(&self, ctx: &PluginContext, _args: &str, _spec: &PluginSpec) -> Result<()> {
        conversation::cancel(ctx).await
    }
}

#[derive(Debug)]
pub struct ProbePlugin;

impl PluginFactory for ProbePlugin {
    fn register_defaults(&self, specs: &mut Vec<PluginSpec>) {
        if !specs.iter().any(|s| s.id == "test") {
            specs.push(default_spec(
                "test",
                &["/test", "/resolve"],
                serde_yaml::Value::default(),
            ));
        }
    }

    fn build(&self) -> Arc<dyn Plugin> {
        Arc::new(Probe)
    }
}

/// Resolve a channel handle to its numeric id without starting a job.
#[derive(Debug)]
pub struct Probe;

#[async_trait]
impl Plugin for Probe {
    fn id(&self) -> &'static str {
        "test"
    }

    fn help(&self) -> &'static str {
        "/test - check that a channel @handle resolves"
    }

    fn handles_room_messages(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &PluginContext, _args: &str, _spec: &PluginSpec) -> Result<()> {
        conversation::start_test(ctx).await
    }

    async fn on_room_message(
        &self,
        ctx: &PluginContext,
        text: &str,
        _spec: &PluginSpec,
    ) -> Result<()> {
        conversation::on_test_text(ctx, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeMessenger, context};
    use plugin_core::Step;

    #[test]
    fn defaults_are_not_duplicated() {
        let mut specs = vec![default_spec("forward", &["/copy"], serde_yaml::Value::default())];
        ForwardPlugin.register_defaults(&mut specs);
        CancelPlugin.register_defaults(&mut specs);
        ProbePlugin.register_defaults(&mut specs);

        let ids: Vec<_> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["forward", "cancel", "test"]);
        assert_eq!(specs[0].triggers.commands, vec!["/copy".to_owned()]);
    }

    #[test]
    fn forward_default_spec_carries_delays() {
        let mut specs = Vec::new();
        ForwardPlugin.register_defaults(&mut specs);
        assert_eq!(ForwardConfig::from_spec(&specs[0]), ForwardConfig::default());
    }

    #[tokio::test]
    async fn plugins_share_the_chat_session() {
        let messenger = FakeMessenger::new();
        let ctx = context(&messenger, 9);
        let mut specs = Vec::new();
        ForwardPlugin.register_defaults(&mut specs);
        let spec = specs.remove(0);

        Forward.run(&ctx, "3 1", &spec).await.unwrap();
        Forward.on_room_message(&ctx, "@srcchan", &spec).await.unwrap();
        assert_eq!(ctx.sessions.get(9).await.step, Step::AwaitingDestination);

        Cancel.run(&ctx, "", &spec).await.unwrap();
        assert_eq!(ctx.sessions.get(9).await.step, Step::Idle);

        Probe.run(&ctx, "", &spec).await.unwrap();
        assert_eq!(ctx.sessions.get(9).await.step, Step::AwaitingTestInput);
    }

    #[tokio::test]
    async fn test_input_is_answered_by_probe_alone() {
        let messenger = FakeMessenger::new();
        messenger.with_handle("@srcchan", Ok(-1001));
        let ctx = context(&messenger, 9);
        let mut specs = Vec::new();
        ForwardPlugin.register_defaults(&mut specs);
        ProbePlugin.register_defaults(&mut specs);

        Probe.run(&ctx, "", &specs[1]).await.unwrap();
        Forward.on_room_message(&ctx, "srcchan", &specs[0]).await.unwrap();
        assert_eq!(ctx.sessions.get(9).await.step, Step::AwaitingTestInput);

        Probe.on_room_message(&ctx, "srcchan", &specs[1]).await.unwrap();
        assert_eq!(messenger.last_sent(), "✅ @srcchan → -1001");
        assert_eq!(ctx.sessions.get(9).await.step, Step::Idle);
    }
}
