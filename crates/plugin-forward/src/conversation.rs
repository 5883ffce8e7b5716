use anyhow::Result;
use plugin_core::{
    ChannelRef, ChatId, MessageRange, MessengerError, PluginContext, Session, Step, normalize_cmd,
    send_text,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    forward_config::ForwardConfig,
    runner::{self, ForwardJob, ForwardReport},
};

const DEFAULT_COMMAND: &str = "/forward";

const ALREADY_RUNNING: &str =
    "⚠️ A forward job is already running in this chat. Wait for the final report.";
const NOT_INTEGERS: &str = "❌ start_id and end_id must be integers.";
const INVALID_CHANNEL: &str = "❌ That doesn't look like a channel.\n\
     Send a public @handle (at least 5 letters, digits or _) or a numeric id such as -1001234567890.";
const RESOLVE_GUIDANCE: &str = "Make sure:\n\
     1) the channel is public, or you used its numeric id\n\
     2) the bot is a member (channels: an admin)";

/// The first trigger configured for the `forward` plugin, so hints match the
/// command users actually have.
async fn forward_command(ctx: &PluginContext) -> String {
    ctx.registry
        .entry("forward")
        .await
        .and_then(|entry| entry.spec.triggers.commands.first().map(|c| normalize_cmd(c)))
        .unwrap_or_else(|| DEFAULT_COMMAND.to_owned())
}

fn usage(command: &str) -> String {
    format!("Usage: {command} <start_id> <end_id>")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeError {
    Usage,
    NotIntegers,
}

fn parse_range(args: &str) -> Result<MessageRange, RangeError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [start, end] = parts.as_slice() else {
        return Err(RangeError::Usage);
    };
    match (start.parse(), end.parse()) {
        (Ok(start), Ok(end)) => Ok(MessageRange::new(start, end)),
        _ => Err(RangeError::NotIntegers),
    }
}

enum Begin {
    Accepted(MessageRange),
    Usage,
    Rejected(&'static str),
}

/// `/forward <start> <end>`: store the range and ask for the source channel.
pub async fn begin(ctx: &PluginContext, args: &str) -> Result<()> {
    let parsed = parse_range(args);
    let outcome = ctx
        .sessions
        .update(ctx.chat_id, |session| {
            if session.running {
                return Begin::Rejected(ALREADY_RUNNING);
            }
            match parsed {
                Ok(range) => {
                    session.clear_setup();
                    session.range = Some(range);
                    session.step = Step::AwaitingSource;
                    Begin::Accepted(range)
                }
                Err(RangeError::Usage) => Begin::Usage,
                Err(RangeError::NotIntegers) => Begin::Rejected(NOT_INTEGERS),
            }
        })
        .await;

    match outcome {
        Begin::Rejected(reply) => send_text(ctx, reply).await,
        Begin::Usage => send_text(ctx, usage(&forward_command(ctx).await)).await,
        Begin::Accepted(range) => {
            info!(chat_id = ctx.chat_id, start = range.start(), end = range.end(), "Forward setup started");
            send_text(
                ctx,
                format!(
                    "Range {} → {} ({} messages).\n\nSend the SOURCE channel (@handle or numeric id).\n/cancel to abort.",
                    range.start(),
                    range.end(),
                    range.len()
                ),
            )
            .await
        }
    }
}

/// `/cancel`: forget any setup in progress. A run already copying keeps going.
pub async fn cancel(ctx: &PluginContext) -> Result<()> {
    let running = ctx
        .sessions
        .update(ctx.chat_id, |session| {
            session.clear_setup();
            session.running
        })
        .await;
    info!(chat_id = ctx.chat_id, running, "Forward setup cancelled");
    let reply = if running {
        "Cancelled setup. The job already in progress will finish its range.".to_owned()
    } else {
        format!(
            "Cancelled. Send {} <start_id> <end_id> to start again.",
            forward_command(ctx).await
        )
    };
    send_text(ctx, reply).await
}

/// `/test`: ask for a handle to resolve.
pub async fn start_test(ctx: &PluginContext) -> Result<()> {
    ctx.sessions
        .update(ctx.chat_id, |session| {
            session.clear_setup();
            session.step = Step::AwaitingTestInput;
        })
        .await;
    send_text(ctx, "Send a public channel @handle and I'll resolve its numeric id.").await
}

/// Feed a non-command message into the chat's forward setup.
///
/// Returns the handle of the spawned forward run when this message completed
/// the setup. Text arriving outside the setup steps is ignored.
pub async fn on_text(
    ctx: &PluginContext,
    text: &str,
    cfg: &ForwardConfig,
) -> Result<Option<JoinHandle<ForwardReport>>> {
    let step = ctx.sessions.get(ctx.chat_id).await.step;
    match step {
        Step::Idle | Step::AwaitingTestInput => Ok(None),
        Step::AwaitingSource => {
            on_source(ctx, text).await?;
            Ok(None)
        }
        Step::AwaitingDestination => on_destination(ctx, text, cfg).await,
    }
}

/// Feed a non-command message into the `/test` flow, if the chat is in it.
pub async fn on_test_text(ctx: &PluginContext, text: &str) -> Result<()> {
    if ctx.sessions.get(ctx.chat_id).await.step != Step::AwaitingTestInput {
        return Ok(());
    }
    on_test_input(ctx, text).await
}

async fn on_source(ctx: &PluginContext, text: &str) -> Result<()> {
    let Some(source) = ChannelRef::normalize(text) else {
        return send_text(ctx, INVALID_CHANNEL).await;
    };
    let reply = format!("Source: {source}\n\nNow send the DESTINATION channel (@handle or numeric id).");
    ctx.sessions
        .update(ctx.chat_id, |session| {
            session.source = Some(source);
            session.step = Step::AwaitingDestination;
        })
        .await;
    send_text(ctx, reply).await
}

async fn on_destination(
    ctx: &PluginContext,
    text: &str,
    cfg: &ForwardConfig,
) -> Result<Option<JoinHandle<ForwardReport>>> {
    let Some(destination) = ChannelRef::normalize(text) else {
        send_text(ctx, INVALID_CHANNEL).await?;
        return Ok(None);
    };
    let session = ctx
        .sessions
        .update(ctx.chat_id, |session| {
            session.destination = Some(destination.clone());
            session.step = Step::Idle;
            session.clone()
        })
        .await;
    let (Some(range), Some(source)) = (session.range, session.source) else {
        ctx.sessions.reset(ctx.chat_id).await;
        send_text(ctx, usage(&forward_command(ctx).await)).await?;
        return Ok(None);
    };

    let Some(source_id) = resolve_or_reset(ctx, "SOURCE", &source).await? else {
        return Ok(None);
    };
    let Some(destination_id) = resolve_or_reset(ctx, "DESTINATION", &destination).await? else {
        return Ok(None);
    };

    ctx.sessions
        .update(ctx.chat_id, |session| session.running = true)
        .await;
    send_text(
        ctx,
        format!(
            "Starting copyMessage…\nFrom: {source} ({source_id})\nTo: {destination} ({destination_id})\nRange: {} → {}\nDelay: {}s",
            range.start(),
            range.end(),
            cfg.base_delay_secs
        ),
    )
    .await?;

    let job = ForwardJob {
        source: source_id,
        destination: destination_id,
        range,
    };
    Ok(Some(tokio::spawn(runner::execute(
        ctx.clone(),
        job,
        cfg.clone(),
    ))))
}

/// Resolve `channel`; on failure reset the session and tell the user which side broke.
async fn resolve_or_reset(
    ctx: &PluginContext,
    side: &str,
    channel: &ChannelRef,
) -> Result<Option<ChatId>> {
    match ctx.messenger.resolve(channel).await {
        Ok(id) => Ok(Some(id)),
        Err(err) => {
            warn!(chat_id = ctx.chat_id, side, channel = %channel, error = %err, "Channel resolution failed");
            ctx.sessions.reset(ctx.chat_id).await;
            send_text(ctx, resolve_failure(side, channel, &err)).await?;
            Ok(None)
        }
    }
}

fn resolve_failure(side: &str, channel: &ChannelRef, err: &MessengerError) -> String {
    format!("❌ Cannot access {side} {channel}.\n{RESOLVE_GUIDANCE}\n\nError: {err}")
}

async fn on_test_input(ctx: &PluginContext, text: &str) -> Result<()> {
    ctx.sessions.update(ctx.chat_id, Session::clear_setup).await;
    let reply = match ChannelRef::normalize(text) {
        None => INVALID_CHANNEL.to_owned(),
        Some(ChannelRef::Id(id)) => format!(
            "{id} is already a numeric id, nothing to resolve.\nSend an @handle instead, e.g. @durov."
        ),
        Some(handle) => match ctx.messenger.resolve(&handle).await {
            Ok(id) => format!("✅ {handle} → {id}"),
            Err(err) => {
                warn!(chat_id = ctx.chat_id, channel = %handle, error = %err, "Test resolution failed");
                resolve_failure("channel", &handle, &err)
            }
        },
    };
    send_text(ctx, reply).await
}
