//! Moderation labels and the frames that carry them to subscribers.

use crate::error::{ProtocolError, ProtocolResult};
use arachne_codec::{from_cbor, to_canonical_cbor, ContentHash, Value};

/// A moderation label on a record or blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// DID of the actor the label is attributed to.
    pub src: String,
    /// URI of the labeled resource.
    pub uri: String,
    /// Optional version of the resource.
    pub cid: Option<ContentHash>,
    /// Label value.
    pub val: String,
    /// Negation flag; never set by this crate.
    pub neg: bool,
    /// Creation time, RFC 3339.
    pub cts: String,
}

impl Label {
    /// Creates a positive label.
    pub fn new(
        src: impl Into<String>,
        uri: impl Into<String>,
        cid: Option<ContentHash>,
        val: impl Into<String>,
        cts: impl Into<String>,
    ) -> Self {
        Self {
            src: src.into(),
            uri: uri.into(),
            cid,
            val: val.into(),
            neg: false,
            cts: cts.into(),
        }
    }

    /// Converts to a DAG-CBOR map.
    pub fn to_value(&self) -> Value {
        let mut pairs = vec![
            (Value::from("src"), Value::from(self.src.as_str())),
            (Value::from("uri"), Value::from(self.uri.as_str())),
            (Value::from("val"), Value::from(self.val.as_str())),
            (Value::from("neg"), Value::Bool(self.neg)),
            (Value::from("cts"), Value::from(self.cts.as_str())),
        ];
        if let Some(cid) = &self.cid {
            pairs.push((Value::from("cid"), Value::from(cid.to_string())));
        }
        Value::map(pairs)
    }

    /// Reads a label from a DAG-CBOR map.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let required = |name: &str| {
            value
                .get_text(name)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::invalid_message(format!("label without {name}")))
        };

        let cid = value
            .get_text("cid")
            .map(str::parse::<ContentHash>)
            .transpose()?;

        Ok(Self {
            src: required("src")?,
            uri: required("uri")?,
            cid,
            val: required("val")?,
            neg: value.get("neg").and_then(Value::as_bool).unwrap_or(false),
            cts: required("cts")?,
        })
    }

    /// Encodes to DAG-CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(to_canonical_cbor(&self.to_value())?)
    }

    /// Decodes from DAG-CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

/// Labels published at one log offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelsFrame {
    /// Log offset of the labels.
    pub seq: u64,
    /// The labels.
    pub labels: Vec<Label>,
}

impl LabelsFrame {
    /// Creates a frame.
    pub fn new(seq: u64, labels: Vec<Label>) -> Self {
        Self { seq, labels }
    }

    /// Encodes to DAG-CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let value = Value::map(vec![
            (Value::from("seq"), Value::from(self.seq)),
            (
                Value::from("labels"),
                Value::Array(self.labels.iter().map(Label::to_value).collect()),
            ),
        ]);
        Ok(to_canonical_cbor(&value)?)
    }

    /// Decodes from DAG-CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value = from_cbor(bytes)?;
        let seq = value
            .get_integer("seq")
            .and_then(|seq| u64::try_from(seq).ok())
            .ok_or_else(|| ProtocolError::invalid_message("labels frame without seq"))?;
        let labels = value
            .get("labels")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::invalid_message("labels frame without labels"))?
            .iter()
            .map(Label::from_value)
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self { seq, labels })
    }
}

/// A named protocol error sent to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    /// Error name.
    pub name: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorFrame {
    /// Name of the error sent for cursors older than the backfill window.
    pub const OUTDATED_CURSOR: &'static str = "OutdatedCursor";

    /// Builds the error for a cursor older than the backfill window.
    pub fn outdated_cursor(cursor: u64, lookback: u64, tail: u64) -> Self {
        Self {
            name: Self::OUTDATED_CURSOR.to_string(),
            message: format!(
                "Requested cursor '{cursor}' is more than max allowed backfill of {lookback} behind current seq {tail}"
            ),
        }
    }

    /// Encodes to DAG-CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let value = Value::map(vec![
            (Value::from("name"), Value::from(self.name.as_str())),
            (Value::from("message"), Value::from(self.message.as_str())),
        ]);
        Ok(to_canonical_cbor(&value)?)
    }

    /// Decodes from DAG-CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value = from_cbor(bytes)?;
        let field = |name: &str| {
            value
                .get_text(name)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::invalid_message(format!("error frame without {name}")))
        };
        Ok(Self {
            name: field("name")?,
            message: field("message")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> Label {
        Label::new(
            "did:plc:ghrlooc6r56in4d7n6ljr7qt",
            "at://did:plc:ghrlooc6r56in4d7n6ljr7qt/app.bsky.feed.post/3knyxhlml3i2x",
            Some(
                "bafyreidaxqdy72piowe4csqnty7rvt4jh6sdu62i3gzaqia3afizldpfvi"
                    .parse()
                    .unwrap(),
            ),
            "Yes",
            "2024-03-18T23:02:47Z",
        )
    }

    #[test]
    fn label_wire_shape() {
        let value = label().to_value();
        assert_eq!(value.get_text("val"), Some("Yes"));
        assert_eq!(value.get("neg"), Some(&Value::Bool(false)));
        assert_eq!(
            value.get_text("cid"),
            Some("bafyreidaxqdy72piowe4csqnty7rvt4jh6sdu62i3gzaqia3afizldpfvi")
        );
        assert_eq!(Label::decode(&label().encode().unwrap()).unwrap(), label());
    }

    #[test]
    fn label_without_cid_omits_key() {
        let mut label = label();
        label.cid = None;
        assert!(label.to_value().get("cid").is_none());
        assert_eq!(Label::decode(&label.encode().unwrap()).unwrap(), label);
    }

    #[test]
    fn label_missing_fields_is_invalid() {
        let bytes = to_canonical_cbor(&Value::map(vec![(
            Value::from("src"),
            Value::from("did:plc:x"),
        )]))
        .unwrap();
        assert!(matches!(
            Label::decode(&bytes),
            Err(ProtocolError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn labels_frame_carries_seq() {
        let frame = LabelsFrame::new(850, vec![label()]);
        let decoded = LabelsFrame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn outdated_cursor_message() {
        let frame = ErrorFrame::outdated_cursor(750, 200, 1000);
        assert_eq!(frame.name, "OutdatedCursor");
        assert_eq!(
            frame.message,
            "Requested cursor '750' is more than max allowed backfill of 200 behind current seq 1000"
        );
        assert_eq!(ErrorFrame::decode(&frame.encode().unwrap()).unwrap(), frame);
    }
}
