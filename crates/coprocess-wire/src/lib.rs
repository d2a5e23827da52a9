//! Wire codecs for talking to a child process over its standard streams
//!
//! This crate holds everything both ends of a coprocess pipe need to agree on:
//! how a message is delimited, how it is encoded, and how a cooperating child
//! is asked to exit. The host side lives in the `coprocess` crate; the bundled
//! echo children use the same functions so the two sides cannot drift apart.
//!
//! # Encodings
//!
//! - **Lines**: [`line`] - one UTF-8 line per message, `\n` terminated
//! - **JSON lines**: [`json`] - one JSON object per line, non-object lines skipped
//! - **Frames**: [`frame`] - 4-byte big-endian length prefix plus a JSON payload
//! - **Stop convention**: [`sentinel`] - the `STOP` payload in each encoding
//! - **Payloads**: [`sparse`] - sparse numeric vectors exchanged as frames
//!
//! All readers are async over `tokio::io` traits and report a clean end of
//! stream as `Ok(None)`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod json;
pub mod line;
pub mod sentinel;
pub mod sparse;

pub use error::{Result, WireError};
pub use frame::{HELLO_HOST, HELLO_PEER, MAX_FRAME_LEN, read_frame, write_frame};
pub use json::{JsonObject, encode_line, is_object_line, read_object_line, write_json_line};
pub use line::{read_line, strip_line_ending, write_line};
pub use sentinel::{STOP, is_stop_line, is_stop_value, stop_object};
pub use sparse::SparseVector;
