use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use tether_agent::AgentConfig;
use tether_agent::run_connection;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::io::Lines;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives one agent connection over an in-memory pipe, speaking the
/// newline-delimited JSON-RPC framing a real client would.
pub struct TestClient {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    next_id: i64,
    /// Messages read off the wire while waiting for something else,
    /// kept in arrival order.
    pending: Vec<Value>,
}

impl TestClient {
    pub fn spawn(config: AgentConfig) -> Self {
        let (client_io, agent_io) = tokio::io::duplex(64 * 1024);
        let (agent_reader, agent_writer) = tokio::io::split(agent_io);
        tokio::spawn(run_connection(agent_reader, agent_writer, config));

        let (client_reader, client_writer) = tokio::io::split(client_io);
        Self {
            lines: BufReader::new(client_reader).lines(),
            writer: client_writer,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    pub async fn send_raw_line(&mut self, line: &str) {
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("write line");
        self.writer.write_all(b"\n").await.expect("write newline");
        self.writer.flush().await.expect("flush");
    }

    pub async fn request(&mut self, method: &str, params: Value) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.send_raw_line(&message.to_string()).await;
        id
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        let message = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.send_raw_line(&message.to_string()).await;
    }

    /// Next message from the agent, preferring ones buffered by an
    /// earlier [`wait_for_reply`]. `None` means the agent closed the
    /// connection.
    pub async fn read_message(&mut self) -> Option<Value> {
        if !self.pending.is_empty() {
            return Some(self.pending.remove(0));
        }
        self.read_from_wire().await
    }

    async fn read_from_wire(&mut self) -> Option<Value> {
        let line = tokio::time::timeout(DEFAULT_READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for the agent")
            .expect("read from agent")?;
        Some(serde_json::from_str(&line).expect("agent emitted invalid JSON"))
    }

    /// Reads until the response carrying `id` arrives, buffering every
    /// other message (notifications, unrelated responses) in arrival
    /// order.
    pub async fn wait_for_reply(&mut self, id: i64) -> Value {
        if let Some(pos) = self.pending.iter().position(|m| m["id"] == json!(id)) {
            return self.pending.remove(pos);
        }
        loop {
            let message = self
                .read_from_wire()
                .await
                .expect("connection closed before the reply arrived");
            if message["id"] == json!(id) {
                return message;
            }
            self.pending.push(message);
        }
    }

    /// Drains the buffered `sessionUpdate` notifications, returning
    /// their params in the order the agent sent them.
    pub fn take_updates(&mut self) -> Vec<Value> {
        let mut updates = Vec::new();
        let mut rest = Vec::new();
        for message in self.pending.drain(..) {
            if message["method"] == json!("sessionUpdate") {
                updates.push(message["params"].clone());
            } else {
                rest.push(message);
            }
        }
        self.pending = rest;
        updates
    }

    pub async fn initialize(&mut self) {
        let id = self.request("initialize", json!({"protocolVersion": 1})).await;
        let reply = self.wait_for_reply(id).await;
        assert_eq!(reply["result"]["protocolVersion"], json!(1));
    }

    pub async fn new_session(&mut self) -> String {
        let id = self.request("newSession", json!({})).await;
        let reply = self.wait_for_reply(id).await;
        reply["result"]["sessionId"]
            .as_str()
            .expect("newSession reply carries a session id")
            .to_string()
    }

    pub async fn expect_closed(&mut self) {
        assert!(self.pending.is_empty(), "unread messages: {:?}", self.pending);
        assert!(
            self.read_from_wire().await.is_none(),
            "expected the agent to close the connection"
        );
    }

    pub async fn expect_no_message(&mut self, window: Duration) {
        assert!(self.pending.is_empty(), "unread messages: {:?}", self.pending);
        let quiet = tokio::time::timeout(window, self.lines.next_line()).await;
        assert!(quiet.is_err(), "unexpected message: {quiet:?}");
    }
}
