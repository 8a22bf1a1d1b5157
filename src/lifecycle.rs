// Lifecycle controller — startup order, the consume loop, and shutdown.
//
// Startup: broker connection and queue declarations first (fatal if the
// broker is unreachable), then the Jetstream subscription. Shutdown runs
// at most once: stop the subscription so no new work arrives, then drain
// and close the publisher. Each shutdown step is best-effort.

use std::future::Future;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::jetstream::{JetstreamClient, StreamEvent};
use crate::pipeline::Router;
use crate::queue::{QueuePublisher, StdoutSink, TaskSink, QUEUES};

/// Run the bridge until SIGINT/SIGTERM or until the subscription ends.
pub async fn run(config: &Config) -> Result<()> {
    let mut publisher = QueuePublisher::connect(&config.amqp_url, config.publish_buffer)
        .await
        .with_context(|| format!("Broker unreachable at {}", config.redacted_amqp_url()))?;

    for queue in QUEUES {
        if let Err(e) = publisher.ensure_queue(queue).await {
            publisher.close().await;
            return Err(e);
        }
    }

    let mut stream = JetstreamClient::new(config.jetstream());
    let mut events = stream.start();
    let mut router = Router::new(publisher);

    let result = consume(&mut events, &mut router, shutdown_signal()).await;

    let stats = router.stats();
    let mut shutdown = Shutdown::new(Some(stream), Some(router.into_sink()));
    shutdown.run().await;

    info!(
        forwarded = stats.forwarded,
        dropped = stats.dropped,
        "Bridge stopped"
    );
    result
}

/// Subscribe and print would-be task messages instead of publishing them.
pub async fn dry_run(config: &Config) -> Result<()> {
    let mut stream = JetstreamClient::new(config.jetstream());
    let mut events = stream.start();
    let mut router = Router::new(StdoutSink);

    let result = consume(&mut events, &mut router, shutdown_signal()).await;

    Shutdown::<_, QueuePublisher>::new(Some(stream), None)
        .run()
        .await;
    result
}

/// The consume loop: handle stream events one at a time, in arrival order,
/// until `shutdown` resolves or the subscription ends.
///
/// Only a sink hand-off failure ends the loop with an error; transport
/// errors are logged and the subscription is left to recover by itself.
pub async fn consume<S, F>(
    events: &mut mpsc::Receiver<StreamEvent>,
    router: &mut Router<S>,
    shutdown: F,
) -> Result<()>
where
    S: TaskSink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
            event = events.recv() => match event {
                Some(StreamEvent::Opened) => info!("Connected to Jetstream"),
                Some(StreamEvent::Closed) => info!("Disconnected from Jetstream"),
                Some(StreamEvent::Errored(message)) => {
                    warn!(error = %message, "Jetstream error");
                }
                Some(StreamEvent::Commit(event)) => router.dispatch(&event).await?,
                None => {
                    warn!("Jetstream subscription ended");
                    return Ok(());
                }
            }
        }
    }
}

/// A resource torn down during shutdown. Implementations log their own
/// failures; release never fails from the caller's point of view.
#[async_trait]
pub trait Release: Send {
    async fn release(&mut self);
}

#[async_trait]
impl Release for JetstreamClient {
    async fn release(&mut self) {
        info!("Closing Jetstream subscription");
        self.stop().await;
    }
}

#[async_trait]
impl Release for QueuePublisher {
    async fn release(&mut self) {
        info!("Closing AMQP publisher");
        self.close().await;
    }
}

/// Owns everything that needs releasing at exit. `run()` only does work
/// the first time it is called.
pub struct Shutdown<S: Release, P: Release> {
    stream: Option<S>,
    publisher: Option<P>,
    done: bool,
}

impl<S: Release, P: Release> Shutdown<S, P> {
    pub fn new(stream: Option<S>, publisher: Option<P>) -> Self {
        Self {
            stream,
            publisher,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Stop the subscription first so no new work arrives, then release
    /// the publisher. Each step runs regardless of how the previous went.
    pub async fn run(&mut self) {
        if self.done {
            return;
        }
        self.done = true;

        if let Some(mut stream) = self.stream.take() {
            stream.release().await;
        }

        if let Some(mut publisher) = self.publisher.take() {
            publisher.release().await;
        }
    }
}

/// Resolve on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
