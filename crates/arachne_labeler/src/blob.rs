//! Blob download.

use crate::config::LabelerConfig;
use crate::error::LabelerResult;
use arachne_codec::ContentHash;
use async_trait::async_trait;
use tracing::debug;

/// XRPC method serving raw blobs.
pub const GET_BLOB_METHOD: &str = "com.atproto.sync.getBlob";

/// Downloads the bytes of a blob stored in a repository.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    /// Fetches blob `cid` from the repository of `did`.
    async fn fetch(&self, did: &str, cid: &ContentHash) -> LabelerResult<Vec<u8>>;
}

/// Fetches blobs over XRPC from a PDS or relay.
pub struct XrpcBlobFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl XrpcBlobFetcher {
    /// Creates a fetcher against `config.blob_service_url`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &LabelerConfig) -> LabelerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.blob_service_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/xrpc/{GET_BLOB_METHOD}", self.base_url)
    }
}

#[async_trait]
impl BlobFetcher for XrpcBlobFetcher {
    async fn fetch(&self, did: &str, cid: &ContentHash) -> LabelerResult<Vec<u8>> {
        let cid = cid.to_string();
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("did", did), ("cid", cid.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        debug!(did, cid = %cid, len = bytes.len(), "blob fetched");
        Ok(bytes.to_vec())
    }
}
