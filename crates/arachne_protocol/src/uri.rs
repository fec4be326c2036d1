//! Record URIs (`at://<repo>/<collection>/<rkey>`).

use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;
use std::str::FromStr;

/// Collection of posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";
/// Collection of reposts.
pub const REPOST_COLLECTION: &str = "app.bsky.feed.repost";
/// Collection of likes.
pub const LIKE_COLLECTION: &str = "app.bsky.feed.like";
/// Collection of follows.
pub const FOLLOW_COLLECTION: &str = "app.bsky.graph.follow";

/// Splits a repository path into `(collection, record key)`.
///
/// Returns `None` unless both halves are non-empty.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let (collection, rkey) = path.split_once('/')?;
    if collection.is_empty() || rkey.is_empty() || rkey.contains('/') {
        return None;
    }
    Some((collection, rkey))
}

/// A record address within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtUri {
    repo: String,
    collection: String,
    rkey: String,
}

impl AtUri {
    /// Builds the URI of `path` inside `repo`.
    ///
    /// # Errors
    ///
    /// Fails if `path` is not `<collection>/<rkey>`.
    pub fn from_path(repo: &str, path: &str) -> ProtocolResult<Self> {
        let (collection, rkey) = split_path(path).ok_or_else(|| ProtocolError::InvalidUri {
            uri: format!("at://{repo}/{path}"),
        })?;
        Ok(Self {
            repo: repo.to_string(),
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        })
    }

    /// The repository DID.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// The collection NSID.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The record key.
    pub fn rkey(&self) -> &str {
        &self.rkey
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.repo, self.collection, self.rkey)
    }
}

impl FromStr for AtUri {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        let invalid = || ProtocolError::InvalidUri { uri: s.to_string() };
        let rest = s.strip_prefix("at://").ok_or_else(invalid)?;
        let (repo, path) = rest.split_once('/').ok_or_else(invalid)?;
        if repo.is_empty() {
            return Err(invalid());
        }
        Self::from_path(repo, path).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_path() {
        let uri = AtUri::from_path("did:plc:abc", "app.bsky.feed.post/3kntzaxkxpd2x").unwrap();
        assert_eq!(uri.collection(), POST_COLLECTION);
        assert_eq!(uri.rkey(), "3kntzaxkxpd2x");
        assert_eq!(
            uri.to_string(),
            "at://did:plc:abc/app.bsky.feed.post/3kntzaxkxpd2x"
        );
    }

    #[test]
    fn parses_display_form() {
        let text = "at://did:plc:abc/app.bsky.graph.follow/3k";
        let uri: AtUri = text.parse().unwrap();
        assert_eq!(uri.repo(), "did:plc:abc");
        assert_eq!(uri.to_string(), text);
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(split_path("app.bsky.feed.post").is_none());
        assert!(split_path("/3k").is_none());
        assert!(split_path("app.bsky.feed.post/").is_none());
        assert!(split_path("a/b/c").is_none());
        assert!("https://example.com/x/y".parse::<AtUri>().is_err());
        assert!("at:///app.bsky.feed.post/3k".parse::<AtUri>().is_err());
    }
}
