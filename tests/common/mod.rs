// Shared fixtures for the integration suites: a recording TaskSink and
// builders for commit events.

#![allow(dead_code)]

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use skyqueue::jetstream::{Collection, CommitEvent, Mutation, Record};
use skyqueue::pipeline::TaskMessage;
use skyqueue::queue::TaskSink;
use skyqueue::records::{LikeRecord, PostRecord};

/// Captures every publish call as (queue, JSON value), in call order.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskSink for RecordingSink {
    async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()> {
        let payload = message.to_payload()?;
        let value: serde_json::Value = serde_json::from_slice(&payload)?;
        self.published
            .lock()
            .unwrap()
            .push((queue.to_string(), value));
        Ok(())
    }
}

pub fn post_create(did: &str, rkey: &str, cid: &str, record_json: &str) -> CommitEvent {
    let post: PostRecord = serde_json::from_str(record_json).unwrap();
    CommitEvent {
        did: did.to_string(),
        collection: Collection::Post,
        rkey: rkey.to_string(),
        time_us: 1_725_911_162_329_308,
        mutation: Mutation::Create {
            cid: cid.to_string(),
            record: Record::Post(post),
        },
    }
}

pub fn delete(collection: Collection, did: &str, rkey: &str) -> CommitEvent {
    CommitEvent {
        did: did.to_string(),
        collection,
        rkey: rkey.to_string(),
        time_us: 1_725_911_162_329_308,
        mutation: Mutation::Delete,
    }
}

pub fn like_create(did: &str, rkey: &str) -> CommitEvent {
    CommitEvent {
        did: did.to_string(),
        collection: Collection::Like,
        rkey: rkey.to_string(),
        time_us: 1_725_911_162_329_308,
        mutation: Mutation::Create {
            cid: "bafyreilike".to_string(),
            record: Record::Like(LikeRecord::default()),
        },
    }
}
