//! Length-prefixed object frames
//!
//! Each frame is a 4-byte big-endian payload length followed by the JSON
//! serialization of one value. Object streams open with a hello exchange:
//! each side writes one frame before any request is sent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WireError};

/// Hello frame written by the host when an object stream opens.
pub const HELLO_HOST: &str = "Hello from coprocess ObjectTransport v1";

/// Hello frame written by the bundled object echo child.
pub const HELLO_PEER: &str = "Hello";

/// Largest payload accepted in either direction (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Serialize `value` and write it as one frame, then flush.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(value).map_err(WireError::Encode)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    // Bounded by MAX_FRAME_LEN above, so the cast cannot truncate.
    let len = payload.len() as u32;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&payload);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and deserialize it.
///
/// Returns `Ok(None)` when the stream ends exactly at a frame boundary. An end
/// of stream anywhere inside a frame is [`WireError::UnexpectedEof`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; HEADER_LEN];
    let got = read_full(reader, &mut header).await?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_LEN {
        return Err(WireError::UnexpectedEof {
            expected: HEADER_LEN,
            got,
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    let got = read_full(reader, &mut payload).await?;
    if got < len {
        return Err(WireError::UnexpectedEof { expected: len, got });
    }

    serde_json::from_slice(&payload)
        .map(Some)
        .map_err(WireError::Decode)
}

/// Fill `buf` unless the stream ends first; returns the bytes read.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
