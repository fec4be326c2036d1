//! # Arachne Testkit
//!
//! Test utilities for Arachne.
//!
//! This crate provides:
//! - Record and `#commit` frame fixtures (`CommitBuilder`)
//! - Temporary directories of captured frames
//! - Property-based test generators using proptest
//! - Fuzz targets for the decoding path
//!
//! ## Usage
//!
//! ```rust
//! use arachne_testkit::prelude::*;
//!
//! let frame = CommitBuilder::new(TEST_DID)
//!     .create("app.bsky.feed.post/3k", &post_with_images("look", &[(b"img", "image/jpeg")]))
//!     .message();
//! fuzz_firehose_message(&frame);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
