//! Cursor handling for label subscriptions.

use crate::error::{ServerError, ServerResult};
use arachne_protocol::ErrorFrame;

/// Lifecycle of one subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Request received, nothing checked yet.
    Idle,
    /// Cursor parsed, being checked against the log.
    Validating(Option<u64>),
    /// Cursor refused; the frame is sent once and the request ends.
    Rejected(ErrorFrame),
    /// Frames are being sent from this offset.
    Streaming {
        /// First offset sent.
        from: u64,
    },
    /// The client went away or the stream failed.
    Closed,
}

impl SubscriptionState {
    /// Advances `Idle` with a parsed cursor.
    pub fn validate(self, cursor: Option<u64>) -> Self {
        match self {
            SubscriptionState::Idle => SubscriptionState::Validating(cursor),
            other => other,
        }
    }

    /// Resolves `Validating` against the log's current bounds.
    pub fn decide(self, window: &CursorWindow) -> Self {
        match self {
            SubscriptionState::Validating(cursor) => match window.check(cursor) {
                Ok(from) => SubscriptionState::Streaming { from },
                Err(frame) => SubscriptionState::Rejected(frame),
            },
            other => other,
        }
    }

    /// Ends the subscription.
    pub fn close(self) -> Self {
        SubscriptionState::Closed
    }
}

/// Parses the `cursor` query parameter.
///
/// Absent means "start at the tail". Any integer is accepted: negative
/// values clamp to 0 and values past `u64::MAX` saturate.
///
/// # Errors
///
/// Returns [`ServerError::InvalidCursor`] if the value is not an integer.
pub fn parse_cursor(raw: Option<&str>) -> ServerResult<Option<u64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let invalid = || ServerError::InvalidCursor(raw.to_string());
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if negative {
        return Ok(Some(0));
    }
    // Only overflow can fail here.
    Ok(Some(digits.parse().unwrap_or(u64::MAX)))
}

/// The range of offsets a new subscription may start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorWindow {
    /// Next offset to be assigned.
    pub tail: u64,
    /// Lowest retained offset.
    pub floor: u64,
    /// Configured backfill window.
    pub lookback: u64,
}

impl CursorWindow {
    /// Lowest cursor that is accepted.
    pub fn min_allowed(&self) -> u64 {
        self.tail.saturating_sub(self.lookback).max(self.floor)
    }

    /// Returns the start offset for `cursor`, or the frame refusing it.
    pub fn check(&self, cursor: Option<u64>) -> Result<u64, ErrorFrame> {
        match cursor {
            None => Ok(self.tail),
            Some(cursor) if cursor < self.min_allowed() => Err(ErrorFrame::outdated_cursor(
                cursor,
                self.lookback,
                self.tail,
            )),
            Some(cursor) => Ok(cursor),
        }
    }
}
