//! Fuzz targets for the decoding path.
//!
//! Each target takes arbitrary bytes and must never panic; errors are fine.

use arachne_codec::from_cbor;
use arachne_protocol::{parse_message, read_car, CommitDecoder, FirehoseMessage, LabelsFrame};

/// Fuzz target for DAG-CBOR decoding.
pub fn fuzz_cbor_decode(data: &[u8]) {
    let _ = from_cbor(data);
}

/// Fuzz target for CAR archives.
///
/// Every block that survives reading must verify against its hash.
pub fn fuzz_car(data: &[u8]) {
    if let Ok((_, blocks)) = read_car(data) {
        for (cid, block) in blocks.iter() {
            assert!(cid.verifies(block), "unverified block {cid}");
        }
    }
}

/// Fuzz target for the whole inbound path, from message to buckets.
pub fn fuzz_firehose_message(data: &[u8]) {
    let Ok(FirehoseMessage::Commit(event)) = parse_message(data) else {
        return;
    };
    let op_count = event.ops.len();
    if let Ok(frame) = event.into_frame() {
        let decoded = CommitDecoder::decode(&frame);
        assert!(decoded.len() <= op_count);
    }
}

/// Fuzz target for label stream frames.
pub fn fuzz_labels_frame(data: &[u8]) {
    let _ = LabelsFrame::decode(data);
}
