// Unit tests for task message construction.
//
// Covers alt-text extraction, AT-URI construction, field carry-through,
// and the uri-presence convention consumers use to tell posts from likes.

mod common;

use std::collections::HashSet;

use common::{delete, like_create, post_create};
use skyqueue::jetstream::{Collection, Operation};
use skyqueue::pipeline::message::{
    at_uri, extract_alt_text, like_changed, post_created, post_deleted, TaskMessage,
};
use skyqueue::records::{Embed, ImageAlt, PostRecord};

fn json_of(message: &TaskMessage) -> serde_json::Value {
    serde_json::from_slice(&message.to_payload().unwrap()).unwrap()
}

fn build_created(record_json: &str) -> TaskMessage {
    let event = post_create("did:plc:abc", "xyz", "bafyabc", record_json);
    let skyqueue::jetstream::Mutation::Create {
        cid,
        record: skyqueue::jetstream::Record::Post(post),
    } = &event.mutation
    else {
        panic!("expected a post create");
    };
    post_created(&event, cid, post)
}

// ============================================================
// Alt-text extraction
// ============================================================

#[test]
fn images_skip_empty_alt_and_keep_order() {
    let embed = Embed::Images {
        images: vec![
            ImageAlt { alt: "a".into() },
            ImageAlt { alt: "".into() },
            ImageAlt { alt: "b".into() },
        ],
    };
    assert_eq!(extract_alt_text(Some(&embed)), vec!["a", "b"]);
}

#[test]
fn video_with_alt_yields_single_entry() {
    let embed = Embed::Video {
        alt: Some("desc".into()),
    };
    assert_eq!(extract_alt_text(Some(&embed)), vec!["desc"]);
}

#[test]
fn no_embed_yields_empty_list() {
    assert!(extract_alt_text(None).is_empty());
}

#[test]
fn alt_list_is_present_even_when_empty() {
    let json = json_of(&build_created(r#"{"text": "hi", "langs": ["ja"]}"#));
    assert_eq!(json["altList"], serde_json::json!([]));
}

#[test]
fn alt_list_from_wire_images_embed() {
    let json = json_of(&build_created(
        r#"{
            "text": "写真",
            "langs": ["ja"],
            "embed": {
                "$type": "app.bsky.embed.images",
                "images": [
                    {"alt": "猫", "image": {"$type": "blob", "mimeType": "image/jpeg", "size": 1}},
                    {"alt": "", "image": {"$type": "blob", "mimeType": "image/jpeg", "size": 1}}
                ]
            }
        }"#,
    ));
    assert_eq!(json["altList"], serde_json::json!(["猫"]));
}

#[test]
fn record_with_media_embed_yields_empty_list() {
    let json = json_of(&build_created(
        r#"{
            "text": "quote",
            "langs": ["ja"],
            "embed": {"$type": "app.bsky.embed.recordWithMedia", "record": {}, "media": {}}
        }"#,
    ));
    assert_eq!(json["altList"], serde_json::json!([]));
}

// ============================================================
// URIs
// ============================================================

#[test]
fn uri_matches_at_uri_format() {
    assert_eq!(
        at_uri("did:plc:abc", Collection::Post.nsid(), "xyz"),
        "at://did:plc:abc/app.bsky.feed.post/xyz"
    );
}

#[test]
fn distinct_triples_give_distinct_uris() {
    let dids = ["did:plc:abc", "did:plc:abd", "did:web:example.com"];
    let collections = [Collection::Post.nsid(), Collection::Like.nsid()];
    let rkeys = ["3k1abc", "3k1abd", "self"];

    let mut seen = HashSet::new();
    for did in dids {
        for collection in collections {
            for rkey in rkeys {
                assert!(
                    seen.insert(at_uri(did, collection, rkey)),
                    "collision for ({did}, {collection}, {rkey})"
                );
            }
        }
    }
    assert_eq!(seen.len(), 18);
}

// ============================================================
// Field carry-through and message shape
// ============================================================

#[test]
fn reply_refs_are_copied_verbatim() {
    let json = json_of(&build_created(
        r#"{
            "text": "返信",
            "langs": ["ja"],
            "reply": {
                "parent": {"uri": "at://did:plc:p/app.bsky.feed.post/1", "cid": "bafyparent"},
                "root": {"uri": "at://did:plc:r/app.bsky.feed.post/0", "cid": "bafyroot"}
            }
        }"#,
    ));
    assert_eq!(
        json["replyParent"],
        serde_json::json!({"uri": "at://did:plc:p/app.bsky.feed.post/1", "cid": "bafyparent"})
    );
    assert_eq!(
        json["replyRoot"],
        serde_json::json!({"uri": "at://did:plc:r/app.bsky.feed.post/0", "cid": "bafyroot"})
    );
}

#[test]
fn missing_optional_fields_are_omitted() {
    let json = json_of(&build_created(r#"{"langs": ["ja"]}"#));
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("text"));
    assert!(!obj.contains_key("replyParent"));
    assert!(!obj.contains_key("replyRoot"));
    assert_eq!(obj["cid"], "bafyabc");
}

#[test]
fn post_delete_has_only_operation_and_uri() {
    let message = post_deleted(&delete(Collection::Post, "did:plc:abc", "xyz"));
    assert_eq!(
        json_of(&message),
        serde_json::json!({"operation": "delete", "uri": "at://did:plc:abc/app.bsky.feed.post/xyz"})
    );
}

#[test]
fn post_tasks_always_carry_uri_and_like_tasks_never_do() {
    let post_messages = [
        build_created(r#"{"text": "x", "langs": ["ja"]}"#),
        post_deleted(&delete(Collection::Post, "did:plc:abc", "xyz")),
    ];
    for message in &post_messages {
        assert!(json_of(message).get("uri").is_some());
    }

    let like_messages = [
        like_changed(&like_create("did:plc:abc", "3l")),
        like_changed(&delete(Collection::Like, "did:plc:abc", "3l")),
    ];
    for message in &like_messages {
        let json = json_of(message);
        assert!(json.get("uri").is_none());
        assert_eq!(json["did"], "did:plc:abc");
    }
}

#[test]
fn operation_mirrors_the_event() {
    assert_eq!(
        build_created(r#"{"langs": ["ja"]}"#).operation(),
        Operation::Create
    );
    assert_eq!(
        like_changed(&like_create("did:plc:abc", "3l")).operation(),
        Operation::Create
    );
    assert_eq!(
        like_changed(&delete(Collection::Like, "did:plc:abc", "3l")).operation(),
        Operation::Delete
    );
}

#[test]
fn identical_input_gives_identical_bytes() {
    let record = r#"{
        "text": "同じ",
        "langs": ["ja", "en"],
        "embed": {"$type": "app.bsky.embed.video", "alt": "動画"}
    }"#;
    let first = build_created(record).to_payload().unwrap();
    let second = build_created(record).to_payload().unwrap();
    assert_eq!(first, second);
}

#[test]
fn field_order_on_the_wire() {
    let post: PostRecord =
        serde_json::from_str(r#"{"text": "こんにちは", "langs": ["ja"]}"#).unwrap();
    let event = post_create("did:plc:abc", "xyz", "bafyabc", r#"{"langs": ["ja"]}"#);
    let payload = post_created(&event, "bafyabc", &post).to_payload().unwrap();
    assert_eq!(
        String::from_utf8(payload).unwrap(),
        r#"{"operation":"create","uri":"at://did:plc:abc/app.bsky.feed.post/xyz","cid":"bafyabc","text":"こんにちは","altList":[]}"#
    );
}
