//! Typed records and their resolution from commit blocks.

use crate::blocks::BlockStore;
use crate::uri::{FOLLOW_COLLECTION, LIKE_COLLECTION, POST_COLLECTION, REPOST_COLLECTION};
use arachne_codec::{from_cbor, CodecError, ContentHash, Value};
use thiserror::Error;

/// Embed type carrying images.
pub const IMAGES_EMBED: &str = "app.bsky.embed.images";
/// Embed type quoting a record next to media.
pub const RECORD_WITH_MEDIA_EMBED: &str = "app.bsky.embed.recordWithMedia";

/// A reference to a specific version of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrongRef {
    /// Record URI.
    pub uri: String,
    /// Record version.
    pub cid: ContentHash,
}

/// A reference to an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Declared MIME type.
    pub mime_type: String,
    /// Size in bytes (0 for legacy references).
    pub size: u64,
    /// Hash of the blob bytes.
    pub content_hash: ContentHash,
}

/// Declared image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    /// Width.
    pub width: u64,
    /// Height.
    pub height: u64,
}

/// One image attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Alt text.
    pub alt: String,
    /// The image blob.
    pub blob: BlobRef,
    /// Optional dimensions.
    pub aspect_ratio: Option<AspectRatio>,
}

/// The embed of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Embed {
    /// Attached images, in display order.
    Images(Vec<Image>),
    /// Any other embed, by type tag.
    Other(String),
}

/// A post record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Post text.
    pub text: String,
    /// Declared languages.
    pub langs: Vec<String>,
    /// Client-declared creation time.
    pub created_at: String,
    /// Optional embed.
    pub embed: Option<Embed>,
}

impl Post {
    /// Images attached to this post, if any.
    pub fn images(&self) -> &[Image] {
        match &self.embed {
            Some(Embed::Images(images)) => images,
            _ => &[],
        }
    }
}

/// A repost record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repost {
    /// The reposted record.
    pub subject: StrongRef,
    /// Client-declared creation time.
    pub created_at: String,
}

/// A like record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Like {
    /// The liked record.
    pub subject: StrongRef,
    /// Client-declared creation time.
    pub created_at: String,
}

/// A follow record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Follow {
    /// DID of the followed account.
    pub subject: String,
    /// Client-declared creation time.
    pub created_at: String,
}

/// A decoded record of one of the supported collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `app.bsky.feed.post`
    Post(Post),
    /// `app.bsky.feed.repost`
    Repost(Repost),
    /// `app.bsky.feed.like`
    Like(Like),
    /// `app.bsky.graph.follow`
    Follow(Follow),
}

impl Record {
    /// The `$type` this record was decoded from.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Record::Post(_) => POST_COLLECTION,
            Record::Repost(_) => REPOST_COLLECTION,
            Record::Like(_) => LIKE_COLLECTION,
            Record::Follow(_) => FOLLOW_COLLECTION,
        }
    }

    /// Decodes a record from a generic value by its `$type`.
    pub fn from_value(value: &Value) -> Result<Self, Unresolvable> {
        let type_tag = value
            .type_tag()
            .ok_or(Unresolvable::MissingField("$type"))?;

        match type_tag {
            POST_COLLECTION => Ok(Record::Post(Post {
                text: required_text(value, "text")?,
                langs: value
                    .get("langs")
                    .and_then(Value::as_array)
                    .map(|langs| {
                        langs
                            .iter()
                            .filter_map(Value::as_text)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                created_at: required_text(value, "createdAt")?,
                embed: value.get("embed").map(decode_embed).transpose()?,
            })),
            REPOST_COLLECTION => Ok(Record::Repost(Repost {
                subject: decode_strong_ref(value.get("subject"))?,
                created_at: required_text(value, "createdAt")?,
            })),
            LIKE_COLLECTION => Ok(Record::Like(Like {
                subject: decode_strong_ref(value.get("subject"))?,
                created_at: required_text(value, "createdAt")?,
            })),
            FOLLOW_COLLECTION => Ok(Record::Follow(Follow {
                subject: required_text(value, "subject")?,
                created_at: required_text(value, "createdAt")?,
            })),
            other => Err(Unresolvable::UnknownType(other.to_string())),
        }
    }
}

/// Why a record reference could not be turned into a [`Record`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unresolvable {
    /// No block with that content hash in the commit.
    #[error("block not found")]
    MissingBlock,
    /// The block is not valid DAG-CBOR.
    #[error("malformed block: {0}")]
    Malformed(CodecError),
    /// The record's `$type` is not one of the supported collections.
    #[error("unsupported record type '{0}'")]
    UnknownType(String),
    /// A required field is absent or has the wrong type.
    #[error("missing or invalid field '{0}'")]
    MissingField(&'static str),
}

/// Outcome of resolving a record reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The block decoded into a supported record.
    Resolved(Record),
    /// The reference could not be resolved.
    Unresolvable(Unresolvable),
}

/// Resolves content hashes against the blocks of one commit.
#[derive(Debug, Clone, Copy)]
pub struct RecordResolver<'a> {
    blocks: &'a BlockStore,
}

impl<'a> RecordResolver<'a> {
    /// Creates a resolver over `blocks`.
    pub fn new(blocks: &'a BlockStore) -> Self {
        Self { blocks }
    }

    /// Looks up and decodes the record named by `cid`.
    pub fn resolve(&self, cid: &ContentHash) -> Resolution {
        let Some(bytes) = self.blocks.get(cid) else {
            return Resolution::Unresolvable(Unresolvable::MissingBlock);
        };
        let value = match from_cbor(bytes) {
            Ok(value) => value,
            Err(e) => return Resolution::Unresolvable(Unresolvable::Malformed(e)),
        };
        match Record::from_value(&value) {
            Ok(record) => Resolution::Resolved(record),
            Err(reason) => Resolution::Unresolvable(reason),
        }
    }
}

fn required_text(value: &Value, field: &'static str) -> Result<String, Unresolvable> {
    value
        .get_text(field)
        .map(str::to_string)
        .ok_or(Unresolvable::MissingField(field))
}

fn decode_strong_ref(value: Option<&Value>) -> Result<StrongRef, Unresolvable> {
    let value = value.ok_or(Unresolvable::MissingField("subject"))?;
    let uri = required_text(value, "uri")?;
    let cid = value
        .get_text("cid")
        .and_then(|cid| cid.parse().ok())
        .ok_or(Unresolvable::MissingField("cid"))?;
    Ok(StrongRef { uri, cid })
}

fn decode_embed(embed: &Value) -> Result<Embed, Unresolvable> {
    match embed.type_tag() {
        Some(IMAGES_EMBED) => decode_images(embed),
        Some(RECORD_WITH_MEDIA_EMBED) => match embed.get("media") {
            Some(media) if media.type_tag() == Some(IMAGES_EMBED) => decode_images(media),
            _ => Ok(Embed::Other(RECORD_WITH_MEDIA_EMBED.to_string())),
        },
        other => Ok(Embed::Other(other.unwrap_or_default().to_string())),
    }
}

fn decode_images(embed: &Value) -> Result<Embed, Unresolvable> {
    let images = embed
        .get("images")
        .and_then(Value::as_array)
        .ok_or(Unresolvable::MissingField("images"))?;

    images
        .iter()
        .map(|image| {
            let aspect_ratio = image.get("aspectRatio").and_then(|ratio| {
                Some(AspectRatio {
                    width: u64::try_from(ratio.get_integer("width")?).ok()?,
                    height: u64::try_from(ratio.get_integer("height")?).ok()?,
                })
            });
            Ok(Image {
                alt: image.get_text("alt").unwrap_or_default().to_string(),
                blob: decode_blob(image.get("image"))?,
                aspect_ratio,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Embed::Images)
}

fn decode_blob(blob: Option<&Value>) -> Result<BlobRef, Unresolvable> {
    let blob = blob.ok_or(Unresolvable::MissingField("image"))?;
    let mime_type = required_text(blob, "mimeType")?;

    // Current blobs link their content; legacy ones carry the hash as text.
    if let Some(content_hash) = blob.get("ref").and_then(Value::as_link) {
        let size = blob
            .get_integer("size")
            .and_then(|size| u64::try_from(size).ok())
            .ok_or(Unresolvable::MissingField("size"))?;
        return Ok(BlobRef {
            mime_type,
            size,
            content_hash: content_hash.clone(),
        });
    }

    let content_hash = blob
        .get_text("cid")
        .and_then(|cid| cid.parse().ok())
        .ok_or(Unresolvable::MissingField("ref"))?;
    Ok(BlobRef {
        mime_type,
        size: 0,
        content_hash,
    })
}
