// Jetstream subscription client.
//
// A spawned reader task owns the WebSocket. It decodes frames into
// CommitEvents and hands them, together with lifecycle notifications,
// to the consumer through a bounded channel so delivery order is the
// arrival order. Reconnects (with cursor resume) happen inside the task;
// the consumer only ever sees Opened / Closed / Errored.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::event::{decode_frame, Collection, CommitEvent};
use super::reconnect::Backoff;

/// Default public Jetstream endpoint.
pub const DEFAULT_JETSTREAM_URL: &str = "wss://jetstream1.us-west.bsky.network/subscribe";

/// How many undelivered events the reader may run ahead of the consumer.
const EVENT_BUFFER: usize = 256;

/// How long `stop()` waits for the reader to wind down before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the subscription reports to its consumer.
#[derive(Debug)]
pub enum StreamEvent {
    /// A WebSocket connection was established.
    Opened,
    /// The connection ended, by us or by the remote.
    Closed,
    /// A transport-level failure. The subscription keeps reconnecting.
    Errored(String),
    Commit(CommitEvent),
}

#[derive(Debug, Clone)]
pub struct JetstreamConfig {
    pub endpoint: String,
    /// Microsecond cursor to resume from on the first connect
    pub cursor: Option<u64>,
    pub max_reconnect_delay: Duration,
}

/// Build the subscribe URL: one `wantedCollections` parameter per watched
/// collection, plus `cursor` when resuming.
pub fn subscribe_url(endpoint: &str, collections: &[Collection], cursor: Option<u64>) -> String {
    let mut params: Vec<String> = collections
        .iter()
        .map(|c| format!("wantedCollections={}", c.nsid()))
        .collect();
    if let Some(cursor) = cursor {
        params.push(format!("cursor={cursor}"));
    }

    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{separator}{}", params.join("&"))
}

/// Handle to a running (or not yet started) Jetstream subscription.
pub struct JetstreamClient {
    config: JetstreamConfig,
    shutdown_tx: Option<watch::Sender<bool>>,
    reader: Option<JoinHandle<()>>,
}

impl JetstreamClient {
    pub fn new(config: JetstreamConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            reader: None,
        }
    }

    /// Begin the subscription. Called once per process; returns the channel
    /// the consumer reads events from.
    pub fn start(&mut self) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.reader = Some(tokio::spawn(run_reader(
            self.config.clone(),
            tx,
            shutdown_rx,
        )));
        self.shutdown_tx = Some(shutdown_tx);
        rx
    }

    /// Close the subscription.
    ///
    /// Safe to call while events are still being delivered, and a no-op
    /// if the client was never started or is already stopped. Failures are
    /// logged here and never returned to the caller.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            // Err only means the reader already exited
            let _ = shutdown_tx.send(true);
        }

        let Some(mut reader) = self.reader.take() else {
            return;
        };

        match tokio::time::timeout(STOP_TIMEOUT, &mut reader).await {
            Ok(Ok(())) => debug!("Jetstream reader task finished"),
            Ok(Err(e)) => error!(error = %e, "Jetstream reader task failed during shutdown"),
            Err(_) => {
                warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "Jetstream reader did not stop in time, aborting"
                );
                reader.abort();
            }
        }
    }
}

/// Why a single connection's read loop ended.
enum ReadOutcome {
    Disconnected,
    Shutdown,
    ConsumerGone,
}

async fn run_reader(
    config: JetstreamConfig,
    tx: mpsc::Sender<StreamEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(config.max_reconnect_delay);
    let mut cursor = config.cursor;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let url = subscribe_url(&config.endpoint, &Collection::ALL, cursor);
        info!(url = %url, "Connecting to Jetstream");

        let connected = tokio::select! {
            res = tokio_tungstenite::connect_async(url.as_str()) => res,
            _ = shutdown_rx.changed() => break,
        };

        let ws_stream = match connected {
            Ok((stream, _response)) => {
                backoff.reset();
                if tx.send(StreamEvent::Opened).await.is_err() {
                    break;
                }
                stream
            }
            Err(e) => {
                if tx
                    .send(StreamEvent::Errored(format!("connection failed: {e}")))
                    .await
                    .is_err()
                {
                    break;
                }
                let delay = backoff.next_delay();
                tokio::select! {
                    () = tokio::time::sleep(delay) => continue,
                    _ = shutdown_rx.changed() => break,
                }
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let outcome = loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let decoded = match decode_frame(text.as_str()) {
                                Ok(decoded) => decoded,
                                Err(e) => {
                                    debug!(error = %e, "Skipping undecodable Jetstream frame");
                                    continue;
                                }
                            };
                            cursor = Some(decoded.time_us);
                            let Some(event) = decoded.event else {
                                continue;
                            };
                            tokio::select! {
                                sent = tx.send(StreamEvent::Commit(event)) => {
                                    if sent.is_err() {
                                        break ReadOutcome::ConsumerGone;
                                    }
                                }
                                _ = shutdown_rx.changed() => break ReadOutcome::Shutdown,
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(frame = ?frame, "Jetstream sent Close frame");
                            break ReadOutcome::Disconnected;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            debug!(size = data.len(), "Ignoring binary Jetstream frame");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = tx
                                .send(StreamEvent::Errored(format!("read failed: {e}")))
                                .await;
                            break ReadOutcome::Disconnected;
                        }
                        None => break ReadOutcome::Disconnected,
                    }
                }
                _ = shutdown_rx.changed() => break ReadOutcome::Shutdown,
            }
        };

        match outcome {
            ReadOutcome::Shutdown => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Failed to send Close frame");
                }
                // The consumer may already have stopped listening
                let _ = tx.try_send(StreamEvent::Closed);
                break;
            }
            ReadOutcome::ConsumerGone => break,
            ReadOutcome::Disconnected => {
                if tx.send(StreamEvent::Closed).await.is_err() {
                    break;
                }
                let delay = backoff.next_delay();
                info!(
                    delay_ms = delay.as_millis() as u64,
                    cursor = ?cursor,
                    "Reconnecting to Jetstream"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_url_lists_both_collections() {
        let url = subscribe_url(DEFAULT_JETSTREAM_URL, &Collection::ALL, None);
        assert_eq!(
            url,
            "wss://jetstream1.us-west.bsky.network/subscribe\
             ?wantedCollections=app.bsky.feed.post&wantedCollections=app.bsky.feed.like"
        );
    }

    #[test]
    fn test_subscribe_url_appends_cursor_to_existing_query() {
        let url = subscribe_url("ws://localhost:6008/subscribe?compress=false", &[Collection::Like], Some(42));
        assert_eq!(
            url,
            "ws://localhost:6008/subscribe?compress=false&wantedCollections=app.bsky.feed.like&cursor=42"
        );
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut client = JetstreamClient::new(JetstreamConfig {
            endpoint: DEFAULT_JETSTREAM_URL.to_string(),
            cursor: None,
            max_reconnect_delay: Duration::from_secs(1),
        });
        client.stop().await;
        client.stop().await;
    }
}
