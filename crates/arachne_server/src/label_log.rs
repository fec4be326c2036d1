//! The append-only label log.

use crate::error::{ServerError, ServerResult};
use arachne_protocol::Label;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use tokio::sync::watch;

/// A label stored at an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelLogEntry {
    /// Position in the log.
    pub offset: u64,
    /// Publication key (content hash of the labeled subject).
    pub key: String,
    /// The label.
    pub label: Label,
}

/// An ordered, append-only sequence of labels.
///
/// Offsets are assigned at append time, strictly increasing, and never
/// reused. Implementations must be safe to share between many readers and
/// one or more writers.
pub trait LabelLog: Send + Sync {
    /// Appends a label and returns its offset.
    fn append(&self, key: &str, label: Label) -> ServerResult<u64>;

    /// The offset the next append will receive.
    fn end_offset(&self) -> u64;

    /// The lowest offset still retained.
    fn start_offset(&self) -> u64;

    /// Reads up to `limit` entries with offset `>= from`, in offset order.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::OffsetOutOfRange`] if `from` is below
    /// [`start_offset`](Self::start_offset).
    fn read(&self, from: u64, limit: usize) -> ServerResult<Vec<LabelLogEntry>>;

    /// A receiver that observes every change of the end offset.
    fn watch_tail(&self) -> watch::Receiver<u64>;
}

struct LogState {
    entries: VecDeque<LabelLogEntry>,
    start: u64,
    end: u64,
    key_counts: HashMap<String, usize>,
}

/// An in-memory [`LabelLog`] with optional retention.
pub struct MemoryLabelLog {
    state: RwLock<LogState>,
    tail: watch::Sender<u64>,
    max_retained: Option<usize>,
}

impl MemoryLabelLog {
    /// Creates an empty log starting at offset 0.
    pub fn new() -> Self {
        let (tail, _) = watch::channel(0);
        Self {
            state: RwLock::new(LogState {
                entries: VecDeque::new(),
                start: 0,
                end: 0,
                key_counts: HashMap::new(),
            }),
            tail,
            max_retained: None,
        }
    }

    /// Starts numbering at `offset` instead of 0.
    pub fn with_base_offset(self, offset: u64) -> Self {
        {
            let mut state = self.state.write();
            state.entries.clear();
            state.key_counts.clear();
            state.start = offset;
            state.end = offset;
        }
        self.tail.send_replace(offset);
        self
    }

    /// Keeps at most `max` entries, evicting the oldest.
    pub fn with_max_retained(mut self, max: usize) -> Self {
        self.max_retained = Some(max.max(1));
        self
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries ever appended under `key`.
    pub fn key_count(&self, key: &str) -> usize {
        self.state.read().key_counts.get(key).copied().unwrap_or(0)
    }
}

impl Default for MemoryLabelLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelLog for MemoryLabelLog {
    fn append(&self, key: &str, label: Label) -> ServerResult<u64> {
        let mut state = self.state.write();
        let offset = state.end;
        state.entries.push_back(LabelLogEntry {
            offset,
            key: key.to_string(),
            label,
        });
        state.end += 1;
        *state.key_counts.entry(key.to_string()).or_insert(0) += 1;

        if let Some(max) = self.max_retained {
            while state.entries.len() > max {
                state.entries.pop_front();
                state.start += 1;
            }
        }

        // Published under the lock so the watched tail never moves backwards.
        self.tail.send_replace(state.end);
        Ok(offset)
    }

    fn end_offset(&self) -> u64 {
        self.state.read().end
    }

    fn start_offset(&self) -> u64 {
        self.state.read().start
    }

    fn read(&self, from: u64, limit: usize) -> ServerResult<Vec<LabelLogEntry>> {
        let state = self.state.read();
        if from < state.start {
            return Err(ServerError::OffsetOutOfRange {
                requested: from,
                floor: state.start,
            });
        }
        let skip = usize::try_from(from - state.start).unwrap_or(usize::MAX);
        Ok(state.entries.iter().skip(skip).take(limit).cloned().collect())
    }

    fn watch_tail(&self) -> watch::Receiver<u64> {
        self.tail.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(val: &str) -> Label {
        Label::new(
            "did:plc:author",
            "at://did:plc:author/app.bsky.feed.post/3k",
            None,
            val,
            "2024-03-18T23:02:47Z",
        )
    }

    #[test]
    fn offsets_are_dense_and_increasing() {
        let log = MemoryLabelLog::new();
        assert_eq!(log.append("a", label("Yes")).unwrap(), 0);
        assert_eq!(log.append("b", label("No")).unwrap(), 1);
        assert_eq!(log.end_offset(), 2);
        assert_eq!(log.start_offset(), 0);
    }

    #[test]
    fn read_from_middle() {
        let log = MemoryLabelLog::new();
        for i in 0..10 {
            log.append("k", label(&i.to_string())).unwrap();
        }

        let entries = log.read(4, 3).unwrap();
        let offsets: Vec<_> = entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![4, 5, 6]);
        assert_eq!(entries[0].label.val, "4");
        assert!(log.read(10, 5).unwrap().is_empty());
        assert!(log.read(99, 5).unwrap().is_empty());
    }

    #[test]
    fn base_offset_shifts_numbering() {
        let log = MemoryLabelLog::new().with_base_offset(1000);
        assert_eq!(log.append("k", label("Yes")).unwrap(), 1000);
        assert_eq!(log.start_offset(), 1000);
        assert!(matches!(
            log.read(999, 1),
            Err(ServerError::OffsetOutOfRange {
                requested: 999,
                floor: 1000
            })
        ));
    }

    #[test]
    fn retention_advances_floor() {
        let log = MemoryLabelLog::new().with_max_retained(3);
        for _ in 0..5 {
            log.append("k", label("No")).unwrap();
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.start_offset(), 2);
        assert_eq!(log.end_offset(), 5);
        assert!(log.read(1, 10).is_err());
        assert_eq!(log.read(2, 10).unwrap().len(), 3);
        assert_eq!(log.key_count("k"), 5);
    }

    #[test]
    fn duplicates_are_kept() {
        let log = MemoryLabelLog::new();
        log.append("k", label("Yes")).unwrap();
        log.append("k", label("Yes")).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.key_count("k"), 2);
        assert_eq!(log.key_count("other"), 0);
    }

    #[tokio::test]
    async fn watch_sees_appends() {
        let log = MemoryLabelLog::new();
        let mut tail = log.watch_tail();
        assert_eq!(*tail.borrow(), 0);

        log.append("k", label("Yes")).unwrap();
        tail.changed().await.unwrap();
        assert_eq!(*tail.borrow_and_update(), 1);
    }
}
