//! Single-line JSON objects
//!
//! Children frequently print banners, progress output or blank lines on
//! stdout. The reader only treats lines whose first non-whitespace character
//! is `{` as messages and silently skips everything else.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::trace;

use crate::error::{Result, WireError};
use crate::line::{read_line, write_line};

/// A decoded JSON object.
pub type JsonObject = Map<String, Value>;

/// True when `line` looks like a JSON object.
pub fn is_object_line(line: &str) -> bool {
    line.trim_start().starts_with('{')
}

/// Serialize `value` to a single line of JSON.
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(WireError::Encode)
}

/// Serialize `value` and write it as one line.
pub async fn write_json_line<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let line = encode_line(value)?;
    write_line(writer, &line).await
}

/// Read lines until one holds a JSON object.
///
/// Non-object lines are skipped. Returns `Ok(None)` if the stream ends before
/// an object line arrives. A line that starts with `{` but is not a valid
/// object is a [`WireError::Decode`].
pub async fn read_object_line<R>(reader: &mut R) -> Result<Option<JsonObject>>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0usize;
    loop {
        let Some(line) = read_line(reader).await? else {
            if skipped > 0 {
                trace!(skipped, "stream ended after non-object lines");
            }
            return Ok(None);
        };

        if !is_object_line(&line) {
            skipped += 1;
            trace!(line = %line, "skipping non-object line");
            continue;
        }

        return serde_json::from_str::<JsonObject>(line.trim())
            .map(Some)
            .map_err(WireError::Decode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    #[test]
    fn test_is_object_line() {
        assert!(is_object_line("{\"a\":1}"));
        assert!(is_object_line("   {}"));
        assert!(!is_object_line(""));
        assert!(!is_object_line("[1,2]"));
        assert!(!is_object_line("loading model..."));
    }

    #[tokio::test]
    async fn test_skips_noise_before_object() {
        let mock = Builder::new()
            .read(b"starting up\n\n[1,2,3]\n")
            .read(b"{\"x\":\"y\",\"cmd\":\"do\"}\n")
            .build();
        let mut reader = BufReader::new(mock);

        let obj = read_object_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(Value::Object(obj), json!({"x": "y", "cmd": "do"}));
        assert!(read_object_line(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_noise_then_eof_is_none() {
        let mock = Builder::new().read(b"bye\n").build();
        let mut reader = BufReader::new(mock);

        assert!(read_object_line(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_object_is_decode_error() {
        let mock = Builder::new().read(b"{not json\n").build();
        let mut reader = BufReader::new(mock);

        let err = read_object_line(&mut reader).await.unwrap_err();
        assert!(matches!(err, WireError::Decode(_)));
    }

    #[tokio::test]
    async fn test_write_json_line_is_single_line() {
        let mut mock = Builder::new()
            .write(b"{\"vals\":[1.1,2.2,3.3,4.4]}\n")
            .build();
        write_json_line(&mut mock, &json!({"vals": [1.1, 2.2, 3.3, 4.4]}))
            .await
            .unwrap();
    }
}
