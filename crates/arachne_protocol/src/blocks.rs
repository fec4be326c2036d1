//! Per-frame block storage.

use arachne_codec::ContentHash;
use std::collections::HashMap;

/// Outcome of [`BlockStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The block was new.
    Inserted,
    /// The same bytes were already stored under this id.
    AlreadyPresent,
    /// Different bytes were already stored under this id; the first are kept.
    Conflict,
}

/// Content-addressed blocks carried by one commit.
///
/// A store lives exactly as long as the frame that introduced it.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: HashMap<ContentHash, Vec<u8>>,
}

impl BlockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a block.
    pub fn put(&mut self, id: ContentHash, bytes: Vec<u8>) -> PutOutcome {
        match self.blocks.get(&id) {
            Some(existing) if *existing == bytes => PutOutcome::AlreadyPresent,
            Some(_) => PutOutcome::Conflict,
            None => {
                self.blocks.insert(id, bytes);
                PutOutcome::Inserted
            }
        }
    }

    /// Returns the bytes of a block, if present.
    pub fn get(&self, id: &ContentHash) -> Option<&[u8]> {
        self.blocks.get(id).map(Vec::as_slice)
    }

    /// Returns true if the block is present.
    pub fn contains(&self, id: &ContentHash) -> bool {
        self.blocks.contains_key(id)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the store holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over all blocks in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentHash, &[u8])> {
        self.blocks.iter().map(|(id, bytes)| (id, bytes.as_slice()))
    }
}
