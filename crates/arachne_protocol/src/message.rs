//! Firehose message envelope.
//!
//! Each message is two DAG-CBOR items back to back: a header naming the
//! message kind (`{op: 1, t: "#commit"}`) or flagging an error (`{op: -1}`),
//! then the body.

use crate::car::read_car;
use crate::commit::{Action, PathOp, RepoDiffFrame};
use crate::error::{ProtocolError, ProtocolResult};
use arachne_codec::{to_canonical_cbor, CanonicalDecoder, Value};
use tracing::trace;

const COMMIT_KIND: &str = "#commit";

/// A `#commit` message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    /// Stream sequence number.
    pub seq: i64,
    /// DID of the repository.
    pub repo: String,
    /// Repository revision after the commit.
    pub rev: String,
    /// Time the commit was seen by the relay.
    pub time: String,
    /// Set when the commit was too large to carry its blocks.
    pub too_big: bool,
    /// Operations, in commit order.
    pub ops: Vec<PathOp>,
    /// CAR archive holding the commit's blocks.
    pub blocks: Vec<u8>,
}

impl CommitEvent {
    /// Unpacks the block archive into a [`RepoDiffFrame`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CorruptArchive`] if the archive is malformed.
    pub fn into_frame(self) -> ProtocolResult<RepoDiffFrame> {
        let (_, blocks) = read_car(&self.blocks)?;
        Ok(RepoDiffFrame {
            repo_id: self.repo,
            blocks,
            ops: self.ops,
        })
    }

    fn to_value(&self) -> Value {
        let ops = self
            .ops
            .iter()
            .map(|op| {
                Value::map(vec![
                    (Value::from("action"), Value::from(op.action.as_str())),
                    (Value::from("path"), Value::from(op.path.as_str())),
                    (
                        Value::from("cid"),
                        op.cid.clone().map_or(Value::Null, Value::Link),
                    ),
                ])
            })
            .collect();

        Value::map(vec![
            (Value::from("seq"), Value::Integer(self.seq)),
            (Value::from("repo"), Value::from(self.repo.as_str())),
            (Value::from("rev"), Value::from(self.rev.as_str())),
            (Value::from("time"), Value::from(self.time.as_str())),
            (Value::from("tooBig"), Value::Bool(self.too_big)),
            (Value::from("ops"), Value::Array(ops)),
            (Value::from("blocks"), Value::Bytes(self.blocks.clone())),
        ])
    }

    fn from_value(body: &Value) -> ProtocolResult<Self> {
        let get_field = |name: &str| body.get(name);

        let seq = get_field("seq")
            .and_then(Value::as_integer)
            .ok_or_else(|| ProtocolError::invalid_message("commit without seq"))?;
        let repo = get_field("repo")
            .and_then(Value::as_text)
            .ok_or_else(|| ProtocolError::invalid_message("commit without repo"))?
            .to_string();
        let blocks = get_field("blocks")
            .and_then(Value::as_bytes)
            .ok_or_else(|| ProtocolError::invalid_message("commit without blocks"))?
            .to_vec();
        let ops = get_field("ops")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::invalid_message("commit without ops"))?
            .iter()
            .filter_map(decode_op)
            .collect();

        Ok(Self {
            seq,
            repo,
            rev: get_field("rev")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string(),
            time: get_field("time")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string(),
            too_big: get_field("tooBig")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            ops,
            blocks,
        })
    }
}

fn decode_op(op: &Value) -> Option<PathOp> {
    let action = op.get_text("action")?;
    let Some(action) = Action::parse(action) else {
        trace!(action, "dropping op with unknown action");
        return None;
    };
    Some(PathOp {
        action,
        path: op.get_text("path")?.to_string(),
        cid: op.get("cid").and_then(Value::as_link).cloned(),
    })
}

/// A parsed firehose message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirehoseMessage {
    /// A repository commit.
    Commit(CommitEvent),
    /// An error reported by the relay.
    Error {
        /// Error name.
        error: String,
        /// Optional description.
        message: Option<String>,
    },
    /// Any other message kind (`#identity`, `#account`, `#info`, ...).
    Other {
        /// The header's `t`.
        kind: String,
        /// Sequence number, if the body has one.
        seq: Option<i64>,
    },
}

impl FirehoseMessage {
    /// Encodes header and body.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let (header, body) = match self {
            FirehoseMessage::Commit(commit) => (
                Value::map(vec![
                    (Value::from("op"), Value::Integer(1)),
                    (Value::from("t"), Value::from(COMMIT_KIND)),
                ]),
                commit.to_value(),
            ),
            FirehoseMessage::Error { error, message } => {
                let mut body = vec![(Value::from("error"), Value::from(error.as_str()))];
                if let Some(message) = message {
                    body.push((Value::from("message"), Value::from(message.as_str())));
                }
                (
                    Value::map(vec![(Value::from("op"), Value::Integer(-1))]),
                    Value::map(body),
                )
            }
            FirehoseMessage::Other { kind, seq } => (
                Value::map(vec![
                    (Value::from("op"), Value::Integer(1)),
                    (Value::from("t"), Value::from(kind.as_str())),
                ]),
                Value::map(
                    seq.map(|seq| (Value::from("seq"), Value::Integer(seq)))
                        .into_iter()
                        .collect(),
                ),
            ),
        };

        let mut bytes = to_canonical_cbor(&header)?;
        bytes.extend(to_canonical_cbor(&body)?);
        Ok(bytes)
    }
}

/// Parses one firehose message.
///
/// # Errors
///
/// Fails if either item is not valid DAG-CBOR, if anything follows the
/// body, or if a commit body lacks `seq`, `repo`, `ops` or `blocks`.
pub fn parse_message(bytes: &[u8]) -> ProtocolResult<FirehoseMessage> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let header = decoder.decode()?;
    let body = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(ProtocolError::invalid_message("trailing bytes after body"));
    }

    match header.get_integer("op") {
        Some(-1) => Ok(FirehoseMessage::Error {
            error: body
                .get_text("error")
                .ok_or_else(|| ProtocolError::invalid_message("error frame without name"))?
                .to_string(),
            message: body.get_text("message").map(str::to_string),
        }),
        Some(1) => {
            let kind = header
                .get_text("t")
                .ok_or_else(|| ProtocolError::invalid_message("header without type"))?;
            if kind == COMMIT_KIND {
                CommitEvent::from_value(&body).map(FirehoseMessage::Commit)
            } else {
                Ok(FirehoseMessage::Other {
                    kind: kind.to_string(),
                    seq: body.get_integer("seq"),
                })
            }
        }
        _ => Err(ProtocolError::invalid_message("unknown header op")),
    }
}
