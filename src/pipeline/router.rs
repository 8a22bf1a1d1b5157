// Event routing — which commit events are forwarded, and to which queue.
//
// The policy is a fixed dispatch table keyed by (collection, operation).
// Each entry names the destination queue and a pure function that either
// builds the task message or declines the event. Declining is the normal
// outcome for most posts and is not an error.

use anyhow::Result;
use tracing::trace;

use super::message::{like_changed, post_created, post_deleted, TaskMessage};
use crate::jetstream::{Collection, CommitEvent, Mutation, Operation, Record};
use crate::queue::{TaskSink, LIKE_QUEUE, POST_QUEUE};

/// Only posts tagged with this language are forwarded.
pub const WANTED_LANG: &str = "ja";

type BuildFn = fn(&CommitEvent) -> Option<TaskMessage>;

/// One row of the dispatch table.
pub struct Route {
    pub collection: Collection,
    pub operation: Operation,
    pub queue: &'static str,
    build: BuildFn,
}

pub static ROUTES: [Route; 4] = [
    Route {
        collection: Collection::Post,
        operation: Operation::Create,
        queue: POST_QUEUE,
        build: build_post_create,
    },
    Route {
        collection: Collection::Post,
        operation: Operation::Delete,
        queue: POST_QUEUE,
        build: build_post_delete,
    },
    Route {
        collection: Collection::Like,
        operation: Operation::Create,
        queue: LIKE_QUEUE,
        build: build_like,
    },
    Route {
        collection: Collection::Like,
        operation: Operation::Delete,
        queue: LIKE_QUEUE,
        build: build_like,
    },
];

fn build_post_create(event: &CommitEvent) -> Option<TaskMessage> {
    match &event.mutation {
        Mutation::Create {
            cid,
            record: Record::Post(post),
        } if post.has_lang(WANTED_LANG) => Some(post_created(event, cid, post)),
        _ => None,
    }
}

// Deletes carry no language information, so every one is forwarded.
fn build_post_delete(event: &CommitEvent) -> Option<TaskMessage> {
    Some(post_deleted(event))
}

fn build_like(event: &CommitEvent) -> Option<TaskMessage> {
    Some(like_changed(event))
}

/// Look up the route for an event and apply it.
///
/// Returns the destination queue and message, or `None` if the event is
/// filtered out.
pub fn route(event: &CommitEvent) -> Option<(&'static str, TaskMessage)> {
    let operation = event.operation();
    let entry = ROUTES
        .iter()
        .find(|r| r.collection == event.collection && r.operation == operation)?;
    (entry.build)(event).map(|message| (entry.queue, message))
}

/// Counts of what the router did with the events it saw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub forwarded: u64,
    pub dropped: u64,
}

/// Routes events in arrival order and hands accepted messages to a sink.
pub struct Router<S: TaskSink> {
    sink: S,
    stats: RouterStats,
}

impl<S: TaskSink> Router<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stats: RouterStats::default(),
        }
    }

    /// Route one event. Events are handled strictly one at a time, so
    /// publish calls happen in arrival order.
    ///
    /// An `Err` means the sink could not accept the message at all (it was
    /// closed or the message would not serialize); broker delivery failures
    /// never surface here.
    pub async fn dispatch(&mut self, event: &CommitEvent) -> Result<()> {
        match route(event) {
            Some((queue, message)) => {
                self.sink.publish(queue, &message).await?;
                self.stats.forwarded += 1;
            }
            None => {
                trace!(did = %event.did, rkey = %event.rkey, "Dropped event");
                self.stats.dropped += 1;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Give the sink back, e.g. to close it during shutdown.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
