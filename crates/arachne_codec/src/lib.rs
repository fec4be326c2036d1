//! # Arachne Codec
//!
//! Strict DAG-CBOR, content hashes and varints for AT Protocol data.
//!
//! Everything the firehose carries bottoms out in these three encodings:
//! frame headers and bodies are DAG-CBOR, blocks are named by CIDv1
//! content hashes, and CAR archives prefix each section with a varint.
//!
//! ## DAG-CBOR rules
//!
//! - Map keys are text and sorted length-first, then bytewise
//! - Integers use the shortest encoding
//! - No floats, no indefinite lengths
//! - The only tag is 42 (content link)
//!
//! ## Usage
//!
//! ```
//! use arachne_codec::{from_cbor, to_canonical_cbor, ContentHash, Value};
//!
//! let record = Value::map(vec![
//!     (Value::from("$type"), Value::from("app.bsky.feed.like")),
//!     (Value::from("subject"), Value::Link(ContentHash::for_dag_cbor(b"post"))),
//! ]);
//! let bytes = to_canonical_cbor(&record).unwrap();
//! let cid = ContentHash::for_dag_cbor(&bytes);
//!
//! assert_eq!(from_cbor(&bytes).unwrap(), record);
//! assert!(cid.to_string().starts_with("bafyrei"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod content_hash;
mod decoder;
mod encoder;
mod error;
mod value;
mod varint;

pub use content_hash::{ContentHash, DAG_CBOR, RAW, SHA2_256};
pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;
pub use varint::{read_uvarint, write_uvarint};

/// Trait for types that can be encoded to DAG-CBOR.
pub trait Encode {
    /// Encode this value to canonical DAG-CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from DAG-CBOR.
pub trait Decode: Sized {
    /// Decode this value from DAG-CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> Value {
        Value::map(vec![
            (Value::from("$type"), Value::from("app.bsky.feed.post")),
            (Value::from("text"), Value::from(text)),
            (Value::from("createdAt"), Value::from("2024-03-18T23:02:46.310Z")),
        ])
    }

    #[test]
    fn nested_record_survives_codec() {
        let blob = Value::map(vec![
            (Value::from("$type"), Value::from("blob")),
            (
                Value::from("ref"),
                Value::Link(ContentHash::for_raw(b"jpeg bytes")),
            ),
            (Value::from("mimeType"), Value::from("image/jpeg")),
            (Value::from("size"), Value::Integer(624_777)),
        ]);
        let post = Value::map(vec![
            (Value::from("$type"), Value::from("app.bsky.feed.post")),
            (
                Value::from("embed"),
                Value::map(vec![
                    (Value::from("$type"), Value::from("app.bsky.embed.images")),
                    (
                        Value::from("images"),
                        Value::Array(vec![Value::map(vec![
                            (Value::from("alt"), Value::from("")),
                            (Value::from("image"), blob),
                        ])]),
                    ),
                ]),
            ),
        ]);

        let bytes = post.encode().unwrap();
        assert_eq!(Value::decode(&bytes).unwrap(), post);
    }

    #[test]
    fn identical_records_hash_identically() {
        let a = record("spider?").encode().unwrap();
        let b = record("spider?").encode().unwrap();
        let c = record("no spider").encode().unwrap();

        assert_eq!(ContentHash::for_dag_cbor(&a), ContentHash::for_dag_cbor(&b));
        assert_ne!(ContentHash::for_dag_cbor(&a), ContentHash::for_dag_cbor(&c));
    }

    #[test]
    fn negative_integers_survive() {
        let value = Value::map(vec![(Value::from("op"), Value::Integer(-1))]);
        let bytes = to_canonical_cbor(&value).unwrap();
        assert_eq!(bytes, vec![0xa1, 0x62, b'o', b'p', 0x20]);
        assert_eq!(from_cbor(&bytes).unwrap(), value);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decoding_garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
                let _ = from_cbor(&bytes);
            }

            #[test]
            fn sorted_text_maps_decode_strictly(
                entries in proptest::collection::btree_map("[a-z$]{1,12}", any::<i64>(), 0..16)
            ) {
                let value = Value::map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::from(k), Value::Integer(v)))
                        .collect(),
                );
                let bytes = to_canonical_cbor(&value).unwrap();
                prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
            }
        }
    }
}
