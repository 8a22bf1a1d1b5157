// TaskSink trait — where routed task messages go.
//
// The broker-backed QueuePublisher is the production implementation.
// StdoutSink prints the JSON instead, for watching the filter work
// without a broker (`skyqueue dry-run`).

use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::pipeline::message::TaskMessage;

/// Queue receiving post create/delete tasks.
pub const POST_QUEUE: &str = "POST";
/// Queue receiving like create/delete tasks.
pub const LIKE_QUEUE: &str = "LIKE";
/// Every queue this service publishes to, declared at startup.
pub const QUEUES: [&str; 2] = [POST_QUEUE, LIKE_QUEUE];

/// Destination for task messages.
///
/// `publish` must not wait for the broker to acknowledge the message:
/// delivery failures are the implementation's to report, not the caller's.
/// An `Err` means the message could not even be handed off.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()>;
}

/// Writes one `<queue>\t<json>` line per message to stdout.
pub struct StdoutSink;

#[async_trait]
impl TaskSink for StdoutSink {
    async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()> {
        let payload = message.to_payload()?;
        let mut out = std::io::stdout().lock();
        out.write_all(queue.as_bytes())
            .and_then(|()| out.write_all(b"\t"))
            .and_then(|()| out.write_all(&payload))
            .and_then(|()| out.write_all(b"\n"))
            .context("Failed to write task message to stdout")
    }
}
