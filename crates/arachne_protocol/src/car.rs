//! CAR v1 block archives.
//!
//! An archive is a varint-prefixed DAG-CBOR header `{version: 1, roots: [link]}`
//! followed by varint-prefixed sections, each holding a content hash and the
//! block it names.

use crate::blocks::{BlockStore, PutOutcome};
use crate::error::{ProtocolError, ProtocolResult};
use arachne_codec::{from_cbor, read_uvarint, to_canonical_cbor, write_uvarint, ContentHash, Value};
use tracing::debug;

/// Largest header or section accepted.
const MAX_SECTION_LEN: u64 = 8 * 1024 * 1024;

/// Reads an archive into its roots and a [`BlockStore`].
///
/// Blocks whose bytes do not hash to their content hash are left out; a
/// reference to one then fails to resolve like any missing block.
///
/// # Errors
///
/// Returns [`ProtocolError::CorruptArchive`] if the header or any section
/// is malformed.
pub fn read_car(bytes: &[u8]) -> ProtocolResult<(Vec<ContentHash>, BlockStore)> {
    let mut pos = 0;

    let header = next_section(bytes, &mut pos)?
        .ok_or_else(|| ProtocolError::corrupt_archive("missing header"))?;
    let header = from_cbor(header)
        .map_err(|e| ProtocolError::corrupt_archive(format!("header: {e}")))?;
    if header.get_integer("version") != Some(1) {
        return Err(ProtocolError::corrupt_archive("unsupported version"));
    }
    let roots = header
        .get("roots")
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::corrupt_archive("header has no roots"))?
        .iter()
        .map(|root| {
            root.as_link()
                .cloned()
                .ok_or_else(|| ProtocolError::corrupt_archive("root is not a link"))
        })
        .collect::<ProtocolResult<Vec<_>>>()?;

    let mut blocks = BlockStore::new();
    while let Some(section) = next_section(bytes, &mut pos)? {
        let (id, used) = ContentHash::read_prefix(section)
            .map_err(|e| ProtocolError::corrupt_archive(format!("section: {e}")))?;
        let block = &section[used..];
        if !id.verifies(block) {
            debug!(cid = %id, "dropping block whose digest does not match");
            continue;
        }
        if blocks.put(id.clone(), block.to_vec()) == PutOutcome::Conflict {
            debug!(cid = %id, "conflicting duplicate block ignored");
        }
    }

    Ok((roots, blocks))
}

fn next_section<'a>(bytes: &'a [u8], pos: &mut usize) -> ProtocolResult<Option<&'a [u8]>> {
    if *pos == bytes.len() {
        return Ok(None);
    }
    let (len, used) = read_uvarint(&bytes[*pos..])
        .map_err(|_| ProtocolError::corrupt_archive("bad section length"))?;
    if len == 0 || len > MAX_SECTION_LEN {
        return Err(ProtocolError::corrupt_archive(format!(
            "section length {len} out of range"
        )));
    }
    let start = *pos + used;
    let end = start + len as usize;
    if end > bytes.len() {
        return Err(ProtocolError::corrupt_archive("truncated section"));
    }
    *pos = end;
    Ok(Some(&bytes[start..end]))
}

/// Builds an archive section by section.
pub struct CarWriter {
    buffer: Vec<u8>,
}

impl CarWriter {
    /// Starts an archive with the given roots.
    pub fn new(roots: &[ContentHash]) -> ProtocolResult<Self> {
        let header = Value::map(vec![
            (Value::from("version"), Value::Integer(1)),
            (
                Value::from("roots"),
                Value::Array(roots.iter().cloned().map(Value::Link).collect()),
            ),
        ]);
        let header = to_canonical_cbor(&header)?;

        let mut buffer = Vec::with_capacity(header.len() + 1);
        write_uvarint(header.len() as u64, &mut buffer);
        buffer.extend_from_slice(&header);
        Ok(Self { buffer })
    }

    /// Appends a block under the given id.
    pub fn push(&mut self, id: &ContentHash, block: &[u8]) {
        let id = id.to_bytes();
        write_uvarint((id.len() + block.len()) as u64, &mut self.buffer);
        self.buffer.extend_from_slice(&id);
        self.buffer.extend_from_slice(block);
    }

    /// Returns the finished archive.
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Writes a complete archive.
pub fn write_car(
    roots: &[ContentHash],
    blocks: &[(ContentHash, Vec<u8>)],
) -> ProtocolResult<Vec<u8>> {
    let mut writer = CarWriter::new(roots)?;
    for (id, block) in blocks {
        writer.push(id, block);
    }
    Ok(writer.finish())
}
