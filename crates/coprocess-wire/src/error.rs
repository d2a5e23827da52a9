//! Error types for wire operations
//!
//! Every codec in this crate reports failures through [`WireError`]. An end of
//! stream at a message boundary is not an error; readers return `Ok(None)`.

use std::fmt;
use std::io;

/// Result type for wire operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur while encoding or decoding messages on a pipe
#[derive(Debug)]
pub enum WireError {
    /// Reading from or writing to the underlying stream failed
    Io(io::Error),

    /// A value could not be serialized
    Encode(serde_json::Error),

    /// Bytes received from the peer could not be deserialized
    Decode(serde_json::Error),

    /// A frame header announced more bytes than the codec accepts
    FrameTooLarge {
        /// Announced (or attempted) payload length.
        len: usize,
        /// Largest accepted payload length.
        max: usize,
    },

    /// The stream ended in the middle of a frame
    UnexpectedEof {
        /// Bytes the frame still needed.
        expected: usize,
        /// Bytes that actually arrived.
        got: usize,
    },
}

impl WireError {
    /// True when the error means the peer has gone away.
    ///
    /// Broken pipes and truncated frames both mean the child closed its end.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof
            ),
            Self::UnexpectedEof { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Encode(err) => write!(f, "Encode error: {}", err),
            Self::Decode(err) => write!(f, "Decode error: {}", err),
            Self::FrameTooLarge { len, max } => {
                write!(f, "Frame too large: {} bytes (max {})", len, max)
            }
            Self::UnexpectedEof { expected, got } => write!(
                f,
                "Stream ended mid-frame: expected {} bytes, got {}",
                expected, got
            ),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Encode(err) | Self::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
