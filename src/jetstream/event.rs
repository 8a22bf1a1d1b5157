// Jetstream wire format and the typed commit events decoded from it.
//
// Jetstream frames are JSON objects tagged by `kind`. Only `commit` frames
// for the two watched collections become CommitEvents; identity/account
// frames, `update` operations, and foreign collections are filtered out
// here so they can never reach the router.

use anyhow::{Context, Result};
use atrium_api::types::Collection as _;
use serde::{Deserialize, Serialize};

use crate::records::{LikeRecord, PostRecord};

/// The record collections this service subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Post,
    Like,
}

impl Collection {
    /// Every watched collection, in subscription order.
    pub const ALL: [Collection; 2] = [Collection::Post, Collection::Like];

    /// The collection's NSID as it appears on the wire and in AT-URIs.
    pub fn nsid(self) -> &'static str {
        match self {
            Collection::Post => atrium_api::app::bsky::feed::Post::NSID,
            Collection::Like => atrium_api::app::bsky::feed::Like::NSID,
        }
    }

    /// Map a wire NSID onto the allow-list. Anything else is `None`.
    pub fn from_nsid(nsid: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.nsid() == nsid)
    }
}

/// The kind of record mutation. Serialized lowercase in task messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Delete,
}

/// A decoded record payload, matching the event's collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Post(PostRecord),
    Like(LikeRecord),
}

/// What happened to the record. Only creates carry a CID and a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create { cid: String, record: Record },
    Delete,
}

/// A record mutation in one of the watched collections.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub did: String,
    pub collection: Collection,
    pub rkey: String,
    /// Jetstream's microsecond timestamp, used as the resume cursor
    pub time_us: u64,
    pub mutation: Mutation,
}

impl CommitEvent {
    pub fn operation(&self) -> Operation {
        match self.mutation {
            Mutation::Create { .. } => Operation::Create,
            Mutation::Delete => Operation::Delete,
        }
    }
}

// -- Serde types for raw Jetstream frames --

#[derive(Debug, Deserialize)]
struct RawFrame {
    did: String,
    time_us: u64,
    kind: String,
    #[serde(default)]
    commit: Option<RawCommit>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    operation: String,
    collection: String,
    rkey: String,
    #[serde(default)]
    cid: Option<String>,
    #[serde(default)]
    record: Option<serde_json::Value>,
}

/// Result of decoding one frame: its cursor position plus the commit event,
/// if the frame is one we forward.
#[derive(Debug)]
pub struct Decoded {
    pub time_us: u64,
    pub event: Option<CommitEvent>,
}

/// Decode a single Jetstream text frame.
///
/// Returns an error only when the frame itself is not valid Jetstream JSON
/// or a create commit is missing its CID or record. Frames we simply don't
/// care about decode to `event: None`.
pub fn decode_frame(text: &str) -> Result<Decoded> {
    let frame: RawFrame = serde_json::from_str(text).context("Malformed Jetstream frame")?;
    let time_us = frame.time_us;

    let commit = match (frame.kind.as_str(), frame.commit) {
        ("commit", Some(commit)) => commit,
        _ => return Ok(Decoded { time_us, event: None }),
    };

    let Some(collection) = Collection::from_nsid(&commit.collection) else {
        return Ok(Decoded { time_us, event: None });
    };

    let mutation = match commit.operation.as_str() {
        "create" => {
            let cid = commit
                .cid
                .with_context(|| format!("Create commit without cid from {}", frame.did))?;
            let raw = commit
                .record
                .with_context(|| format!("Create commit without record from {}", frame.did))?;
            let record = match collection {
                Collection::Post => Record::Post(
                    serde_json::from_value(raw).context("Failed to decode post record")?,
                ),
                // Nothing on a like record reaches the task message, so an
                // off-shape record must not cost us the like
                Collection::Like => Record::Like(serde_json::from_value(raw).unwrap_or_default()),
            };
            Mutation::Create { cid, record }
        }
        "delete" => Mutation::Delete,
        // Updates aren't forwarded
        _ => return Ok(Decoded { time_us, event: None }),
    };

    Ok(Decoded {
        time_us,
        event: Some(CommitEvent {
            did: frame.did,
            collection,
            rkey: commit.rkey,
            time_us,
            mutation,
        }),
    })
}
