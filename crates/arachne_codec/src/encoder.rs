//! Deterministic DAG-CBOR encoder.

use crate::content_hash::ContentHash;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to canonical DAG-CBOR bytes.
///
/// Output is deterministic:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - No indefinite-length encoding
/// - Links are written as tag 42 over `0x00 || cid`
///
/// # Errors
///
/// Returns an error if a map has a non-text key or a duplicate key.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical DAG-CBOR encoder writing into an owned buffer.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Bytes(b) => self.encode_bytes(b),
            Value::Text(s) => self.encode_text(s),
            Value::Array(arr) => return self.encode_array(arr),
            Value::Map(pairs) => return self.encode_map(pairs),
            Value::Link(cid) => self.encode_link(cid),
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // -1 encodes as 0, -2 as 1, ...
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_bytes(&mut self, bytes: &[u8]) {
        self.encode_unsigned(2, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_link(&mut self, cid: &ContentHash) {
        let raw = cid.to_bytes();
        self.encode_unsigned(6, 42);
        self.encode_unsigned(2, raw.len() as u64 + 1);
        self.buffer.push(0x00);
        self.buffer.extend_from_slice(&raw);
    }

    fn encode_array(&mut self, arr: &[Value]) -> CodecResult<()> {
        self.encode_unsigned(4, arr.len() as u64);
        for item in arr {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut encoded_pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(pairs.len());

        for (key, value) in pairs {
            let Value::Text(text) = key else {
                return Err(CodecError::invalid_structure("map keys must be strings"));
            };
            let mut key_encoder = CanonicalEncoder::new();
            key_encoder.encode_text(text);
            encoded_pairs.push((key_encoder.into_bytes(), value));
        }

        // Sort by encoded key (length-first, then bytewise)
        encoded_pairs.sort_by(|a, b| match a.0.len().cmp(&b.0.len()) {
            std::cmp::Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        if encoded_pairs.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CodecError::invalid_structure("duplicate map key"));
        }

        self.encode_unsigned(5, pairs.len() as u64);
        for (encoded_key, value) in encoded_pairs {
            self.buffer.extend_from_slice(&encoded_key);
            self.encode(value)?;
        }

        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::from_cbor;

    #[test]
    fn encode_scalars() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(24)).unwrap(),
            vec![0x18, 24]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(-100)).unwrap(),
            vec![0x38, 99]
        );
    }

    #[test]
    fn encode_text_and_bytes() {
        assert_eq!(
            to_canonical_cbor(&Value::Text("a".to_string())).unwrap(),
            vec![0x61, b'a']
        );
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])).unwrap(),
            vec![0x43, 1, 2, 3]
        );
    }

    #[test]
    fn encode_map_sorted_length_first() {
        let map = Value::Map(vec![
            (Value::Text("bb".to_string()), Value::Integer(2)),
            (Value::Text("a".to_string()), Value::Integer(1)),
        ]);
        let bytes = to_canonical_cbor(&map).unwrap();

        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }

    #[test]
    fn encode_link_as_tag_42() {
        let cid = ContentHash::for_dag_cbor(b"block");
        let bytes = to_canonical_cbor(&Value::Link(cid.clone())).unwrap();

        assert_eq!(&bytes[..5], &[0xd8, 0x2a, 0x58, 37, 0x00]);
        assert_eq!(&bytes[5..], cid.to_bytes().as_slice());
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Link(cid));
    }

    #[test]
    fn reject_non_text_keys() {
        let map = Value::Map(vec![(Value::Integer(1), Value::Integer(1))]);
        assert!(matches!(
            to_canonical_cbor(&map),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_duplicate_keys() {
        let map = Value::Map(vec![
            (Value::from("k"), Value::Integer(1)),
            (Value::from("k"), Value::Integer(2)),
        ]);
        assert!(to_canonical_cbor(&map).is_err());
    }

    #[test]
    fn deterministic_encoding() {
        let map1 = Value::Map(vec![
            (Value::Text("$type".to_string()), Value::from("app.bsky.feed.like")),
            (Value::Text("createdAt".to_string()), Value::from("2024-03-18T23:02:46.310Z")),
        ]);
        let map2 = Value::Map(vec![
            (Value::Text("createdAt".to_string()), Value::from("2024-03-18T23:02:46.310Z")),
            (Value::Text("$type".to_string()), Value::from("app.bsky.feed.like")),
        ]);

        assert_eq!(
            to_canonical_cbor(&map1).unwrap(),
            to_canonical_cbor(&map2).unwrap()
        );
    }

    #[test]
    fn encoded_maps_decode_strictly() {
        let record = Value::Map(vec![
            (Value::from("text"), Value::from("a spider?")),
            (Value::from("$type"), Value::from("app.bsky.feed.post")),
            (Value::from("langs"), Value::from(vec!["en"])),
        ]);
        let bytes = to_canonical_cbor(&record).unwrap();

        // Strict decoding accepts our own output and sees sorted keys.
        let decoded = from_cbor(&bytes).unwrap();
        let keys: Vec<_> = decoded
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_text().unwrap())
            .collect();
        assert_eq!(keys, vec!["text", "$type", "langs"]);
    }
}
