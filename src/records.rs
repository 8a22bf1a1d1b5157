// Typed AT Protocol record payloads carried on Jetstream commit events.
//
// Only the fields the forwarding pipeline reads are modeled. Everything
// else on the record (facets, labels, createdAt, ...) is ignored during
// deserialization so unrelated schema changes upstream don't break us.

use serde::{Deserialize, Deserializer};

/// Reply references on a post: the direct parent and the thread root.
///
/// Each side is normally a `com.atproto.repo.strongRef` (`{uri, cid}`),
/// but it is kept as raw JSON and passed through untouched, so a partial
/// or off-shape reference never rejects the post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplyRef {
    #[serde(default)]
    pub parent: Option<serde_json::Value>,
    #[serde(default)]
    pub root: Option<serde_json::Value>,
}

/// Media attached to a post, reduced to what alt-text extraction needs.
///
/// Unknown or malformed embeds decode as `Other` rather than failing the
/// whole record. A quote-post or link card must not cost us the post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    #[serde(rename = "app.bsky.embed.images")]
    Images { images: Vec<ImageAlt> },
    #[serde(rename = "app.bsky.embed.video")]
    Video {
        #[serde(default)]
        alt: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// One entry of an images embed. The blob itself is not needed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageAlt {
    #[serde(default)]
    pub alt: String,
}

/// An `app.bsky.feed.post` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostRecord {
    /// BCP-47 language tags chosen by the author
    #[serde(default)]
    pub langs: Option<Vec<String>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_reply")]
    pub reply: Option<ReplyRef>,
    #[serde(default, deserialize_with = "lenient_embed")]
    pub embed: Option<Embed>,
}

impl PostRecord {
    /// Whether the author tagged the post with the given language.
    /// A missing `langs` field counts as no languages.
    pub fn has_lang(&self, tag: &str) -> bool {
        self.langs
            .as_deref()
            .is_some_and(|langs| langs.iter().any(|l| l == tag))
    }
}

/// An `app.bsky.feed.like` record. Likes are forwarded by actor only, so
/// the subject is carried as raw JSON and never validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LikeRecord {
    #[serde(default)]
    pub subject: Option<serde_json::Value>,
}

/// Decode an embed, mapping anything that doesn't fit a known variant to
/// `Embed::Other` instead of rejecting the enclosing record.
fn lenient_embed<'de, D>(deserializer: D) -> Result<Option<Embed>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(|v| serde_json::from_value(v).unwrap_or(Embed::Other)))
}

/// Decode reply references, dropping a `reply` that isn't even an object
/// rather than rejecting the post.
fn lenient_reply<'de, D>(deserializer: D) -> Result<Option<ReplyRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
