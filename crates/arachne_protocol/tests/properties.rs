//! Property tests for firehose decoding.

use arachne_codec::{to_canonical_cbor, ContentHash, Value};
use arachne_protocol::{
    parse_message, read_car, write_car, Action, BlockStore, CommitDecoder, PathOp, RepoDiffFrame,
    POST_COLLECTION,
};
use proptest::prelude::*;

const REPO: &str = "did:plc:prop";

fn post_block(text: &str) -> (ContentHash, Vec<u8>) {
    let bytes = to_canonical_cbor(&Value::map(vec![
        (Value::from("$type"), Value::from(POST_COLLECTION)),
        (Value::from("text"), Value::from(text)),
        (Value::from("createdAt"), Value::from("2024-03-18T23:02:46.310Z")),
    ]))
    .unwrap();
    (ContentHash::for_dag_cbor(&bytes), bytes)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Create),
        Just(Action::Update),
        Just(Action::Delete)
    ]
}

fn arb_collection() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("app.bsky.feed.post"),
        Just("app.bsky.feed.like"),
        Just("app.bsky.feed.repost"),
        Just("app.bsky.graph.follow"),
        Just("app.bsky.actor.profile"),
    ]
}

proptest! {
    #[test]
    fn parse_message_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = parse_message(&bytes);
    }

    #[test]
    fn read_car_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = read_car(&bytes);
    }

    #[test]
    fn only_creates_and_deletes_survive(
        ops in proptest::collection::vec((arb_action(), arb_collection(), "[a-z0-9]{1,13}"), 0..24)
    ) {
        let (cid, bytes) = post_block("spider");
        let mut blocks = BlockStore::new();
        blocks.put(cid.clone(), bytes);

        let frame = RepoDiffFrame {
            repo_id: REPO.to_string(),
            blocks,
            ops: ops
                .iter()
                .map(|(action, collection, rkey)| {
                    PathOp::new(*action, format!("{collection}/{rkey}"), Some(cid.clone()))
                })
                .collect(),
        };
        let decoded = CommitDecoder::decode(&frame);

        // The only block is a post, so creates land in posts only.
        let expected_creates = ops
            .iter()
            .filter(|(a, c, _)| *a == Action::Create && *c == POST_COLLECTION)
            .count();
        let expected_deletes = ops
            .iter()
            .filter(|(a, c, _)| *a == Action::Delete && *c != "app.bsky.actor.profile")
            .count();

        prop_assert_eq!(decoded.posts_created.len(), expected_creates);
        prop_assert!(decoded.likes_created.is_empty());
        prop_assert_eq!(
            decoded.posts_deleted.len()
                + decoded.likes_deleted.len()
                + decoded.reposts_deleted.len()
                + decoded.follows_deleted.len(),
            expected_deletes
        );
        prop_assert_eq!(decoded.len(), expected_creates + expected_deletes);
    }

    #[test]
    fn car_archives_keep_every_valid_block(texts in proptest::collection::vec("[a-z ]{0,40}", 1..8)) {
        let blocks: Vec<_> = texts.iter().map(|t| post_block(t)).collect();
        let car = write_car(&[blocks[0].0.clone()], &blocks).unwrap();
        let (_, store) = read_car(&car).unwrap();
        for (cid, bytes) in &blocks {
            prop_assert_eq!(store.get(cid), Some(bytes.as_slice()));
        }
    }
}
