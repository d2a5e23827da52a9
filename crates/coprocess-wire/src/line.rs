//! Newline-delimited text messages

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Strip one trailing `\n` or `\r\n` from raw line bytes.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Read one line, without its terminator.
///
/// Returns `Ok(None)` once the stream is exhausted. A final line that is not
/// newline terminated is still returned.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let end = strip_line_ending(line.as_bytes()).len();
    line.truncate(end);
    Ok(Some(line))
}

/// Write `line` followed by `\n` and flush.
///
/// The line and its terminator go out in a single write so concurrent
/// writers sharing the sink cannot interleave inside a line. Embedded
/// newlines are not checked.
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"abc\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc"), b"abc");
        assert_eq!(strip_line_ending(b"\n"), b"");
        assert_eq!(strip_line_ending(b"abc\n\n"), b"abc\n");
    }

    #[tokio::test]
    async fn test_read_lines_until_eof() {
        let mock = Builder::new()
            .read(b"first\r\nsec")
            .read(b"ond\nlast")
            .build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some("first"));
        assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some("second"));
        assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some("last"));
        assert_eq!(read_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_line_is_not_eof() {
        let mock = Builder::new().read(b"\n").build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_line(&mut reader).await.unwrap().as_deref(), Some(""));
        assert_eq!(read_line(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let mut mock = Builder::new().write(b"1234\n").build();
        write_line(&mut mock, "1234").await.unwrap();
    }
}
