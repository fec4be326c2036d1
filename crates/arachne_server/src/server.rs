//! The label subscription server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{CursorWindow, SubscriptionState};
use crate::label_log::LabelLog;
use crate::reader::LabelReader;
use arachne_protocol::{ErrorFrame, LabelsFrame};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tracing::debug;

/// Serves a [`LabelLog`] to subscribers with cursor-based resumption.
///
/// # Example
///
/// ```
/// use arachne_server::{MemoryLabelLog, ServerConfig, Subscription, SubscriptionServer};
/// use std::sync::Arc;
///
/// let log = Arc::new(MemoryLabelLog::new());
/// let server = SubscriptionServer::new(ServerConfig::default().with_max_allowed_lookback(10), log);
///
/// // No cursor: stream new labels only.
/// assert!(matches!(server.subscribe(None).unwrap(), Subscription::Streaming(_)));
/// ```
pub struct SubscriptionServer {
    config: ServerConfig,
    log: Arc<dyn LabelLog>,
}

/// Outcome of a subscription request.
pub enum Subscription {
    /// The cursor was refused; send this frame and end the request.
    Rejected(ErrorFrame),
    /// The cursor was accepted.
    Streaming(LabelStream),
}

impl SubscriptionServer {
    /// Creates a server over `log`.
    pub fn new(config: ServerConfig, log: Arc<dyn LabelLog>) -> Self {
        Self { config, log }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the served log.
    pub fn log(&self) -> &Arc<dyn LabelLog> {
        &self.log
    }

    /// The cursor bounds a new subscription is checked against right now.
    pub fn window(&self) -> CursorWindow {
        CursorWindow {
            tail: self.log.end_offset(),
            floor: self.log.start_offset(),
            lookback: self.config.max_allowed_lookback,
        }
    }

    /// Starts a subscription.
    ///
    /// Without a cursor the stream starts at the current tail. A cursor
    /// further behind the tail than the backfill window, or below the
    /// retention floor, is rejected with an `OutdatedCursor` frame.
    ///
    /// # Errors
    ///
    /// Fails if the start position was evicted between the check and the
    /// first read.
    pub fn subscribe(&self, cursor: Option<u64>) -> ServerResult<Subscription> {
        let window = self.window();
        match SubscriptionState::Idle.validate(cursor).decide(&window) {
            SubscriptionState::Streaming { from } => {
                self.log.read(from, 0)?;
                debug!(?cursor, from, tail = window.tail, "subscription accepted");
                Ok(Subscription::Streaming(LabelStream {
                    reader: LabelReader::new(Arc::clone(&self.log), from, self.config.read_batch),
                }))
            }
            SubscriptionState::Rejected(frame) => {
                debug!(?cursor, min_allowed = window.min_allowed(), "outdated cursor");
                Ok(Subscription::Rejected(frame))
            }
            state => Err(ServerError::Internal(format!(
                "subscription stuck in {state:?}"
            ))),
        }
    }
}

/// An endless sequence of [`LabelsFrame`]s for one subscriber.
pub struct LabelStream {
    reader: LabelReader,
}

impl LabelStream {
    /// Offset of the next frame.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Waits for the next frame. Never returns when there is nothing new.
    pub async fn next_frame(&mut self) -> ServerResult<LabelsFrame> {
        let entry = self.reader.next().await?;
        Ok(LabelsFrame::new(entry.offset, vec![entry.label]))
    }

    /// Turns the subscription into a stream of encoded frames.
    ///
    /// The stream ends after the first error.
    pub fn into_encoded(self) -> impl Stream<Item = ServerResult<Vec<u8>>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut this = state?;
            match this.next_frame().await.and_then(|frame| frame.encode().map_err(ServerError::from)) {
                Ok(bytes) => Some((Ok(bytes), Some(this))),
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
