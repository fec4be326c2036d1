//! # Arachne Label Server
//!
//! Publishes moderation labels on an append-only log and serves that log
//! to subscribers over `com.atproto.label.subscribeLabels`.
//!
//! This crate provides:
//! - The `LabelLog` trait and an in-memory implementation with retention
//! - `LabelReader`, one independent consumption handle per subscriber
//! - `SubscriptionServer`, cursor validation against a bounded backfill window
//! - An axum router and `HttpServer`
//!
//! # Protocol
//!
//! A client connects with an optional `cursor`:
//! 1. No cursor: frames start at the current tail
//! 2. A cursor inside the window: frames start at that offset
//! 3. A cursor more than `max_allowed_lookback` behind the tail (or below
//!    the retention floor): a single `OutdatedCursor` error frame
//!
//! Every accepted stream is endless; it follows the tail as labels are
//! appended.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod http;
mod label_log;
mod reader;
mod server;

pub use config::{ServerConfig, MAX_ALLOWED_LOOKBACK_ENV};
pub use error::{ServerError, ServerResult};
pub use handler::{parse_cursor, CursorWindow, SubscriptionState};
pub use http::{router, HttpServer, SUBSCRIBE_LABELS_PATH};
pub use label_log::{LabelLog, LabelLogEntry, MemoryLabelLog};
pub use reader::LabelReader;
pub use server::{LabelStream, Subscription, SubscriptionServer};
