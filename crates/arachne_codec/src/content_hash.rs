//! Content hashes (CIDv1).
//!
//! A [`ContentHash`] names a block by the digest of its bytes. The binary
//! form is `varint(1) || varint(codec) || varint(hash fn) || varint(len) || digest`
//! and the canonical string form is multibase base32 (lowercase, unpadded,
//! `b` prefix), e.g. `bafyreib...`.

use crate::error::{CodecError, CodecResult};
use cid::multihash::Multihash;
use cid::{Cid, Version};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Multicodec code for DAG-CBOR blocks.
pub const DAG_CBOR: u64 = 0x71;

/// Multicodec code for raw binary blobs.
pub const RAW: u64 = 0x55;

/// Multihash code for SHA2-256.
pub const SHA2_256: u64 = 0x12;

const SHA2_256_LEN: usize = 32;

/// A CIDv1 content identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(Cid);

impl ContentHash {
    /// Creates a content hash from its parts.
    ///
    /// # Errors
    ///
    /// Fails if the digest is longer than 64 bytes.
    pub fn new(codec: u64, hash_code: u64, digest: &[u8]) -> CodecResult<Self> {
        let hash = Multihash::wrap(hash_code, digest).map_err(invalid)?;
        Ok(Self(Cid::new_v1(codec, hash)))
    }

    /// Computes the SHA2-256 content hash of a DAG-CBOR block.
    pub fn for_dag_cbor(block: &[u8]) -> Self {
        Self::sha256(DAG_CBOR, block)
    }

    /// Computes the SHA2-256 content hash of a raw blob.
    pub fn for_raw(blob: &[u8]) -> Self {
        Self::sha256(RAW, blob)
    }

    fn sha256(codec: u64, bytes: &[u8]) -> Self {
        // A 32-byte digest always fits a 64-byte multihash.
        let hash = Multihash::wrap(SHA2_256, &Sha256::digest(bytes)).unwrap_or_default();
        Self(Cid::new_v1(codec, hash))
    }

    /// Parses a content hash from exactly `bytes`.
    ///
    /// # Errors
    ///
    /// Fails on CIDv0, unknown versions, truncation, or trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let (cid, used) = Self::read_prefix(bytes)?;
        if used != bytes.len() {
            return Err(CodecError::invalid_cid("trailing bytes after digest"));
        }
        Ok(cid)
    }

    /// Parses a content hash from the front of `bytes`.
    ///
    /// Returns the hash and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Fails on CIDv0, unknown versions, or truncation.
    pub fn read_prefix(bytes: &[u8]) -> CodecResult<(Self, usize)> {
        if bytes.starts_with(&[0x12, 0x20]) {
            return Err(CodecError::invalid_cid("CIDv0 is not supported"));
        }
        let mut reader = Cursor::new(bytes);
        let cid = Cid::read_bytes(&mut reader).map_err(invalid)?;
        let used = usize::try_from(reader.position()).map_err(invalid)?;
        Ok((Self::v1(cid)?, used))
    }

    fn v1(cid: Cid) -> CodecResult<Self> {
        match cid.version() {
            Version::V1 => Ok(Self(cid)),
            Version::V0 => Err(CodecError::invalid_cid("CIDv0 is not supported")),
        }
    }

    /// Returns the binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    /// Returns the multicodec of the content.
    pub fn codec(&self) -> u64 {
        self.0.codec()
    }

    /// Returns the multihash function code.
    pub fn hash_code(&self) -> u64 {
        self.0.hash().code()
    }

    /// Returns the raw digest.
    pub fn digest(&self) -> &[u8] {
        self.0.hash().digest()
    }

    /// Checks `bytes` against this hash.
    ///
    /// Only SHA2-256 can be verified; any other hash function reports `false`.
    pub fn verifies(&self, bytes: &[u8]) -> bool {
        self.hash_code() == SHA2_256
            && self.digest().len() == SHA2_256_LEN
            && Sha256::digest(bytes).as_slice() == self.digest()
    }
}

fn invalid(err: impl fmt::Display) -> CodecError {
    CodecError::invalid_cid(err.to_string())
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

impl FromStr for ContentHash {
    type Err = CodecError;

    /// Only the lowercase base32 multibase form (`b...`) is accepted.
    fn from_str(s: &str) -> CodecResult<Self> {
        if !s.starts_with('b') {
            return Err(CodecError::invalid_cid("expected base32 multibase prefix 'b'"));
        }
        Self::v1(Cid::try_from(s).map_err(invalid)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Record CID from a live firehose capture.
    const POST_CID: &str = "bafyreidaxqdy72piowe4csqnty7rvt4jh6sdu62i3gzaqia3afizldpfvi";
    // Blob CID (raw codec) from the same capture.
    const IMAGE_CID: &str = "bafkreicla36qauuuylngywjsjb3bztqt7msknfenlucuegl4objslujgjm";

    #[test]
    fn parses_dag_cbor_cid() {
        let cid: ContentHash = POST_CID.parse().unwrap();
        assert_eq!(cid.codec(), DAG_CBOR);
        assert_eq!(cid.hash_code(), SHA2_256);
        assert_eq!(cid.digest().len(), 32);
        assert_eq!(cid.to_string(), POST_CID);
    }

    #[test]
    fn parses_raw_cid() {
        let cid: ContentHash = IMAGE_CID.parse().unwrap();
        assert_eq!(cid.codec(), RAW);
        assert_eq!(cid.to_string(), IMAGE_CID);
    }

    #[test]
    fn binary_form_matches_string_form() {
        let cid: ContentHash = POST_CID.parse().unwrap();
        let bytes = cid.to_bytes();
        assert_eq!(&bytes[..4], &[0x01, 0x71, 0x12, 0x20]);
        assert_eq!(ContentHash::from_bytes(&bytes).unwrap(), cid);
    }

    #[test]
    fn computed_hash_verifies_its_block() {
        let block = [0xa1, 0x61, b'a', 0x01];
        let cid = ContentHash::for_dag_cbor(&block);
        assert!(cid.to_string().starts_with("bafyrei"));
        assert!(cid.verifies(&block));
        assert!(!cid.verifies(&[0xa0]));
    }

    #[test]
    fn raw_hash_has_raw_prefix() {
        let cid = ContentHash::for_raw(b"not really a jpeg");
        assert!(cid.to_string().starts_with("bafkrei"));
    }

    #[test]
    fn read_prefix_reports_length() {
        let cid = ContentHash::for_dag_cbor(b"x");
        let mut bytes = cid.to_bytes();
        let len = bytes.len();
        bytes.extend_from_slice(&[0xde, 0xad]);

        let (parsed, used) = ContentHash::read_prefix(&bytes).unwrap();
        assert_eq!(parsed, cid);
        assert_eq!(used, len);
        assert!(ContentHash::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_cid_v0() {
        let mut v0 = vec![0x12, 0x20];
        v0.extend_from_slice(&[0u8; 32]);
        assert!(matches!(
            ContentHash::from_bytes(&v0),
            Err(CodecError::InvalidCid { .. })
        ));
        assert!("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"
            .parse::<ContentHash>()
            .is_err());
    }

    #[test]
    fn rejects_truncated_digest() {
        let bytes = ContentHash::for_dag_cbor(b"x").to_bytes();
        assert!(ContentHash::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn builds_from_parts() {
        let cid = ContentHash::for_raw(b"jpeg");
        let rebuilt = ContentHash::new(RAW, SHA2_256, cid.digest()).unwrap();
        assert_eq!(rebuilt, cid);
        assert!(ContentHash::new(RAW, SHA2_256, &[0u8; 65]).is_err());
    }

    #[test]
    fn rejects_other_multibases() {
        let cid: ContentHash = POST_CID.parse().unwrap();
        let base58 = format!("z{}", &POST_CID[1..]);
        assert!(base58.parse::<ContentHash>().is_err());
        assert!(POST_CID.to_uppercase().parse::<ContentHash>().is_err());
        assert_eq!(POST_CID.parse::<ContentHash>().unwrap(), cid);
    }

    #[test]
    fn rejects_bad_base32() {
        assert!("bafy!!".parse::<ContentHash>().is_err());
        assert!("BAFYREI".parse::<ContentHash>().is_err());
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;
        let cid: ContentHash = POST_CID.parse().unwrap();
        let mut map = HashMap::new();
        map.insert(cid.clone(), 1);
        assert_eq!(map.get(&POST_CID.parse::<ContentHash>().unwrap()), Some(&1));
    }
}
