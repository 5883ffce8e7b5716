use core::time::Duration;

use plugin_core::{ChatId, MessageRange, Messenger, MessengerError, PluginContext, send_text};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::forward_config::ForwardConfig;

/// Extra second added on top of the platform's retry hint.
const RATE_LIMIT_MARGIN: Duration = Duration::from_secs(1);

const HINT_CHAT_NOT_FOUND: &str =
    "Fix: the target chat id is wrong or the bot is not a member of it.";
const HINT_NO_RIGHTS: &str = "Fix: for channels the bot must be an admin; for groups allow it to post.";

/// What to do after a failed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyFailure {
    /// Wait this long, then retry the same message once.
    RateLimited(Duration),
    Transient,
    /// Will not go away by itself; carries a fix hint for the user.
    Fatal(&'static str),
}

#[must_use]
pub fn classify(err: &MessengerError) -> CopyFailure {
    match err {
        MessengerError::RateLimited { retry_after } => CopyFailure::RateLimited(*retry_after),
        MessengerError::Api { description } => {
            let lowered = description.to_lowercase();
            if lowered.contains("chat not found") {
                CopyFailure::Fatal(HINT_CHAT_NOT_FOUND)
            } else if lowered.contains("not enough rights") || lowered.contains("administrator") {
                CopyFailure::Fatal(HINT_NO_RIGHTS)
            } else {
                CopyFailure::Transient
            }
        }
        MessengerError::Network(_) => CopyFailure::Transient,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardJob {
    pub source: ChatId,
    pub destination: ChatId,
    pub range: MessageRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    pub succeeded: u64,
    pub failed: u64,
    /// First fix hint seen among permanent failures.
    pub hint: Option<&'static str>,
}

impl ForwardReport {
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Done.\nSuccess: {}\nFailed: {}",
            self.succeeded, self.failed
        );
        if let Some(hint) = self.hint {
            text.push_str("\n\n");
            text.push_str(hint);
        }
        text
    }

    fn record_failure(&mut self, failure: CopyFailure) {
        self.failed += 1;
        if let CopyFailure::Fatal(hint) = failure {
            self.hint.get_or_insert(hint);
        }
    }
}

/// Copy every message of the job's range in order, pacing between attempts.
///
/// Each index is attempted once, or twice when the first attempt was rate
/// limited. Failures are counted and never stop the run.
pub async fn run(messenger: &dyn Messenger, job: &ForwardJob, cfg: &ForwardConfig) -> ForwardReport {
    let mut report = ForwardReport::default();

    for mid in job.range.iter() {
        let Err(err) = messenger
            .copy_message(job.destination, job.source, mid)
            .await
        else {
            report.succeeded += 1;
            sleep(cfg.base_delay()).await;
            continue;
        };

        let failure = classify(&err);
        let CopyFailure::RateLimited(retry_after) = failure else {
            warn!(message_id = mid, error = %err, "Copy failed");
            report.record_failure(failure);
            sleep(cfg.fail_delay()).await;
            continue;
        };

        let wait = retry_after + RATE_LIMIT_MARGIN;
        info!(message_id = mid, wait_secs = wait.as_secs(), "Flood control, waiting before retry");
        sleep(wait).await;

        match messenger
            .copy_message(job.destination, job.source, mid)
            .await
        {
            Ok(()) => {
                report.succeeded += 1;
                sleep(cfg.base_delay()).await;
            }
            Err(retry_err) => {
                warn!(message_id = mid, error = %retry_err, "Retry failed");
                report.record_failure(classify(&retry_err));
                sleep(cfg.fail_delay()).await;
            }
        }
    }

    report
}

/// Run the job, post the summary to the requesting chat and release its session.
pub async fn execute(ctx: PluginContext, job: ForwardJob, cfg: ForwardConfig) -> ForwardReport {
    info!(
        chat_id = ctx.chat_id,
        source = job.source,
        destination = job.destination,
        start = job.range.start(),
        end = job.range.end(),
        "Forward run started"
    );
    let report = run(ctx.messenger.as_ref(), &job, &cfg).await;
    info!(
        chat_id = ctx.chat_id,
        succeeded = report.succeeded,
        failed = report.failed,
        "Forward run finished"
    );
    if let Err(e) = send_text(&ctx, report.summary()).await {
        warn!(chat_id = ctx.chat_id, error = %e, "Failed to send forward summary");
    }
    ctx.sessions.reset(ctx.chat_id).await;
    report
}
