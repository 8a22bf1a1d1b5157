// Jetstream stream client — subscription, wire decoding, reconnect policy.
//
// Jetstream is Bluesky's JSON re-encoding of the repo firehose. Each
// submodule handles one concern of consuming it.

pub mod client;
pub mod event;
pub mod reconnect;

pub use client::{JetstreamClient, JetstreamConfig, StreamEvent};
pub use event::{Collection, CommitEvent, Mutation, Operation, Record};
