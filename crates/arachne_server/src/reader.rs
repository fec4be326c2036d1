//! Per-subscriber consumption of the label log.

use crate::error::{ServerError, ServerResult};
use crate::label_log::{LabelLog, LabelLogEntry};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

/// A cursor over a [`LabelLog`] owned by one subscriber.
///
/// Entries come back in strictly increasing offset order. When the reader
/// has caught up with the tail it waits on the log's tail watch rather than
/// polling. Dropping the reader releases it.
pub struct LabelReader {
    log: Arc<dyn LabelLog>,
    position: u64,
    tail: watch::Receiver<u64>,
    buffer: VecDeque<LabelLogEntry>,
    batch: usize,
}

impl LabelReader {
    /// Creates a reader that yields entries from `position` onward.
    pub fn new(log: Arc<dyn LabelLog>, position: u64, batch: usize) -> Self {
        let tail = log.watch_tail();
        Self {
            log,
            position,
            tail,
            buffer: VecDeque::new(),
            batch: batch.max(1),
        }
    }

    /// Offset of the next entry this reader will yield.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Waits for and returns the next entry.
    ///
    /// # Errors
    ///
    /// Fails if the reader's position was evicted from the log.
    pub async fn next(&mut self) -> ServerResult<LabelLogEntry> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                self.position = entry.offset + 1;
                return Ok(entry);
            }

            // Mark the current tail seen before reading so an append that
            // lands after the read still wakes us.
            self.tail.borrow_and_update();
            let entries = self.log.read(self.position, self.batch)?;
            if entries.is_empty() {
                self.tail
                    .changed()
                    .await
                    .map_err(|_| ServerError::Internal("label log closed".into()))?;
            } else {
                self.buffer.extend(entries);
            }
        }
    }
}
