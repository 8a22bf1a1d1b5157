// Task message construction — the payloads downstream workers consume.
//
// Consumers tell the two kinds apart by field presence: post tasks always
// carry `uri`, like tasks never do. Every builder here is a pure function
// of its inputs, so the same event always serializes to the same bytes.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::jetstream::{CommitEvent, Operation};
use crate::records::{Embed, PostRecord};

/// A message bound for one of the work queues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskMessage {
    Post(PostTask),
    Like(LikeTask),
}

/// Work item for a created or deleted post.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTask {
    pub operation: Operation,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parent: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_root: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Present (possibly empty) on creates, absent on deletes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_list: Option<Vec<String>>,
}

/// Work item for a created or deleted like. Only the actor is forwarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LikeTask {
    pub operation: Operation,
    pub did: String,
}

impl TaskMessage {
    pub fn operation(&self) -> Operation {
        match self {
            TaskMessage::Post(task) => task.operation,
            TaskMessage::Like(task) => task.operation,
        }
    }

    /// Serialize to the JSON bytes placed on the queue.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize task message")
    }
}

/// Build the AT-URI for a record: `at://{did}/{collection}/{rkey}`.
pub fn at_uri(did: &str, collection: &str, rkey: &str) -> String {
    format!("at://{did}/{collection}/{rkey}")
}

/// Collect the non-empty alt texts from a post's embed, in embed order.
///
/// Images contribute each non-empty `alt`; a video contributes its `alt`
/// when set and non-empty; anything else contributes nothing.
pub fn extract_alt_text(embed: Option<&Embed>) -> Vec<String> {
    match embed {
        Some(Embed::Images { images }) => images
            .iter()
            .filter(|image| !image.alt.is_empty())
            .map(|image| image.alt.clone())
            .collect(),
        Some(Embed::Video { alt: Some(alt) }) if !alt.is_empty() => vec![alt.clone()],
        Some(Embed::Video { .. }) | Some(Embed::Other) | None => Vec::new(),
    }
}

/// Task for a newly created post.
pub fn post_created(event: &CommitEvent, cid: &str, post: &PostRecord) -> TaskMessage {
    TaskMessage::Post(PostTask {
        operation: Operation::Create,
        uri: at_uri(&event.did, event.collection.nsid(), &event.rkey),
        cid: Some(cid.to_string()),
        reply_parent: post.reply.as_ref().and_then(|r| r.parent.clone()),
        reply_root: post.reply.as_ref().and_then(|r| r.root.clone()),
        text: post.text.clone(),
        alt_list: Some(extract_alt_text(post.embed.as_ref())),
    })
}

/// Task for a deleted post. Deletes carry no record, so only the URI.
pub fn post_deleted(event: &CommitEvent) -> TaskMessage {
    TaskMessage::Post(PostTask {
        operation: Operation::Delete,
        uri: at_uri(&event.did, event.collection.nsid(), &event.rkey),
        cid: None,
        reply_parent: None,
        reply_root: None,
        text: None,
        alt_list: None,
    })
}

/// Task for a created or deleted like.
pub fn like_changed(event: &CommitEvent) -> TaskMessage {
    TaskMessage::Like(LikeTask {
        operation: event.operation(),
        did: event.did.clone(),
    })
}
