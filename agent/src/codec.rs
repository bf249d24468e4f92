//! Line-oriented transport framing: one JSON value per newline-delimited
//! record, in both directions. The framer carries no semantic state; it is
//! purely a codec.

use tether_protocol::JsonRpcMessage;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Lines;

#[derive(Debug, Error)]
pub enum FramingError {
    /// A line that is not valid JSON. Fatal for the connection; framing
    /// cannot be recovered mid-stream.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads newline-delimited JSON-RPC messages off a byte stream.
pub struct MessageReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next parsed message, `Ok(None)` at end of stream. Blank lines are
    /// skipped; anything else that fails to parse is a fatal framing error.
    pub async fn next_message(&mut self) -> Result<Option<JsonRpcMessage>, FramingError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(line)?));
        }
    }
}

/// Writes one JSON value per line, flushing before accepting the next, so
/// every message reaches the peer whole and in caller order.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_message(&mut self, message: &JsonRpcMessage) -> Result<(), FramingError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tether_protocol::RequestId;

    use super::*;

    #[tokio::test]
    async fn reads_messages_and_skips_blank_lines() {
        let input = b"\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n\n" as &[u8];
        let mut reader = MessageReader::new(input);
        let message = reader
            .next_message()
            .await
            .expect("read")
            .expect("one message");
        let JsonRpcMessage::Request(request) = message else {
            panic!("expected request");
        };
        assert_eq!(request.method, "initialize");
        assert!(reader.next_message().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_a_framing_error() {
        let input = b"this is not json\n" as &[u8];
        let mut reader = MessageReader::new(input);
        let err = reader.next_message().await.err().expect("must fail");
        assert!(matches!(err, FramingError::Malformed(_)));
    }

    #[tokio::test]
    async fn writer_emits_one_line_per_message_in_order() {
        let mut buffer = Vec::new();
        {
            let mut writer = MessageWriter::new(&mut buffer);
            writer
                .write_message(&JsonRpcMessage::response(
                    RequestId::Integer(1),
                    serde_json::json!({}),
                ))
                .await
                .expect("write");
            writer
                .write_message(&JsonRpcMessage::response(
                    RequestId::Integer(2),
                    serde_json::json!({}),
                ))
                .await
                .expect("write");
        }
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"id\":1"));
        assert!(lines[1].contains("\"id\":2"));
    }
}
