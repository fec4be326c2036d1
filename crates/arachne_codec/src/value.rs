//! Dynamic DAG-CBOR value type.

use crate::content_hash::ContentHash;
use std::cmp::Ordering;

/// A dynamic DAG-CBOR value.
///
/// This covers the AT Protocol data model: floats are not part of it and
/// are not representable here. Content links (CBOR tag 42) decode into
/// [`Value::Link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map entries in canonical key order.
    Map(Vec<(Value, Value)>),
    /// Link to another block by content hash (tag 42).
    Link(ContentHash),
}

/// Canonical DAG-CBOR key order: shorter keys first, then bytewise.
///
/// Only text keys are legal; anything else sorts last so the encoder can
/// report it.
pub(crate) fn key_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Text(a), Value::Text(b)) => a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes())),
        (Value::Text(_), _) => Ordering::Less,
        (_, Value::Text(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty, |$v:ident| $out:expr) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<$ty> {
            match self {
                Value::$variant($v) => Some($out),
                _ => None,
            }
        }
    };
}

impl Value {
    /// Builds a map, putting entries in canonical key order.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| key_order(&a.0, &b.0));
        Value::Map(pairs)
    }

    accessor!(
        /// The boolean, if this is one.
        as_bool, Bool, bool, |b| *b
    );
    accessor!(
        /// The integer, if this is one.
        as_integer, Integer, i64, |n| *n
    );
    accessor!(
        /// The byte string, if this is one.
        as_bytes, Bytes, &[u8], |b| b.as_slice()
    );
    accessor!(
        /// The text, if this is a text string.
        as_text, Text, &str, |s| s.as_str()
    );
    accessor!(
        /// The elements, if this is an array.
        as_array, Array, &[Value], |a| a.as_slice()
    );
    accessor!(
        /// The entries, if this is a map.
        as_map, Map, &[(Value, Value)], |m| m.as_slice()
    );
    accessor!(
        /// The linked content hash, if this is a link.
        as_link, Link, &ContentHash, |cid| cid
    );

    /// Looks up a field of a map by its text key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Looks up a text field.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    /// Looks up an integer field.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    /// Returns the `$type` tag of a record-like map.
    pub fn type_tag(&self) -> Option<&str> {
        self.get_text("$type")
    }
}

macro_rules! from_impl {
    ($($ty:ty => |$v:ident| $out:expr;)*) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $out
                }
            }
        )*
    };
}

from_impl! {
    bool => |b| Value::Bool(b);
    i64 => |n| Value::Integer(n);
    i32 => |n| Value::Integer(i64::from(n));
    u32 => |n| Value::Integer(i64::from(n));
    String => |s| Value::Text(s);
    &str => |s| Value::Text(s.to_string());
    Vec<u8> => |b| Value::Bytes(b);
    &[u8] => |b| Value::Bytes(b.to_vec());
    ContentHash => |cid| Value::Link(cid);
}

// Sizes and offsets above i64::MAX saturate.
impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_text().unwrap())
            .collect()
    }

    #[test]
    fn record_keys_sort_length_first() {
        let record = Value::map(vec![
            (Value::from("createdAt"), Value::from("2024-03-18T23:02:46.310Z")),
            (Value::from("text"), Value::from("hi")),
            (Value::from("$type"), Value::from("app.bsky.feed.post")),
            (Value::from("embed"), Value::Null),
        ]);
        assert_eq!(keys(&record), vec!["text", "$type", "embed", "createdAt"]);
    }

    #[test]
    fn non_text_keys_sort_last() {
        let map = Value::map(vec![
            (Value::Integer(1), Value::Null),
            (Value::from("z"), Value::Null),
        ]);
        assert_eq!(map.as_map().unwrap()[0].0, Value::from("z"));
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_bool(), None);
        assert_eq!(Value::Integer(-7).as_integer(), Some(-7));
        assert_eq!(Value::from("42").as_integer(), None);
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1, 2][..]));
        assert_eq!(Value::from(vec!["en"]).as_array().map(<[_]>::len), Some(1));

        let cid = ContentHash::for_raw(b"blob");
        assert_eq!(Value::Link(cid.clone()).as_link(), Some(&cid));
        assert_eq!(Value::from(cid.to_string()).as_link(), None);
    }

    #[test]
    fn blob_fields() {
        let blob = Value::map(vec![
            (Value::from("$type"), Value::from("blob")),
            (Value::from("ref"), Value::Link(ContentHash::for_raw(b"jpeg"))),
            (Value::from("mimeType"), Value::from("image/jpeg")),
            (Value::from("size"), Value::from(624_777u64)),
        ]);

        assert_eq!(blob.type_tag(), Some("blob"));
        assert_eq!(blob.get_text("mimeType"), Some("image/jpeg"));
        assert_eq!(blob.get_integer("size"), Some(624_777));
        assert_eq!(blob.get_text("size"), None);
        assert!(blob.get("ref").and_then(Value::as_link).is_some());
        assert_eq!(blob.get("alt"), None);
        assert_eq!(Value::Null.type_tag(), None);
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(42u32), Value::Integer(42));
        assert_eq!(Value::from(u64::MAX), Value::Integer(i64::MAX));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }
}
