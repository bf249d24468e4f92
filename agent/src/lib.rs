//! Agent-side session protocol over newline-delimited JSON.
//!
//! One connection is served by one read loop plus one writer task. The read
//! loop feeds parsed messages to the [`dispatcher::MessageProcessor`]; turn
//! updates and responses flow back through the ordered outgoing channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tether_core::SessionStore;
use tether_core::credentials::Credentials;
use tether_protocol::JsonRpcMessage;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

pub mod codec;
mod dispatcher;
mod error_code;
mod outgoing;

use crate::codec::FramingError;
use crate::codec::MessageReader;
use crate::dispatcher::MessageProcessor;
use crate::outgoing::OutgoingMessageSender;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Unit pace for the simulated turn script's delays.
    pub turn_pace: Duration,
    /// Workspace root used when `newSession` does not supply one.
    pub default_workspace: PathBuf,
    /// Credentials produced by the external bootstrap flow, if present.
    pub credentials: Option<Credentials>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            turn_pace: Duration::from_millis(100),
            default_workspace: PathBuf::from("/workspace"),
            credentials: None,
        }
    }
}

/// Serves one connection until the peer disconnects or a protocol error
/// makes the stream unusable.
pub async fn run_connection<R, W>(reader: R, writer: W, config: AgentConfig)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let store = Arc::new(SessionStore::new());
    serve_connection(reader, writer, store, config).await;
}

/// Like [`run_connection`], with a caller-supplied store. Separate dispatcher
/// instances never share sessions unless handed the same store.
pub async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    store: Arc<SessionStore>,
    config: AgentConfig,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outgoing, writer_task) = OutgoingMessageSender::spawn(writer);
    let outgoing = Arc::new(outgoing);
    let mut processor = MessageProcessor::new(store, outgoing, config);
    let mut reader = MessageReader::new(reader);

    loop {
        match reader.next_message().await {
            Ok(Some(JsonRpcMessage::Request(request))) => {
                if processor.process_request(request).await.is_break() {
                    break;
                }
            }
            Ok(Some(JsonRpcMessage::Notification(notification))) => {
                processor.process_notification(notification).await;
            }
            Ok(Some(message)) => {
                debug!("ignoring unexpected inbound message: {message:?}");
            }
            Ok(None) => {
                info!("peer closed the connection");
                break;
            }
            Err(FramingError::Malformed(err)) => {
                // Framing cannot be recovered mid-stream.
                error!("malformed frame, closing connection: {err}");
                break;
            }
            Err(FramingError::Io(err)) => {
                error!("transport read failed: {err}");
                break;
            }
        }
    }

    // Dropping the processor (and with it the last local sender) lets the
    // writer drain whatever is already queued before the task ends.
    drop(processor);
    if let Err(err) = writer_task.await {
        warn!("writer task aborted: {err}");
    }
}

/// Entry point for the stdio binary.
pub async fn run_main(home: Option<PathBuf>, config: AgentConfig) -> anyhow::Result<()> {
    use std::io::IsTerminal;

    if std::io::stdin().is_terminal() {
        anyhow::bail!("expected stdin to be a pipe, not a terminal");
    }

    // stdout belongs to the protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match home {
        Some(home) => match Credentials::load(&home) {
            Ok(credentials) => {
                info!("loaded credentials from {}", home.display());
                AgentConfig {
                    credentials: Some(credentials),
                    ..config
                }
            }
            Err(err) => {
                warn!("no usable credentials under {}: {err}", home.display());
                config
            }
        },
        None => config,
    };

    info!("agent started");
    run_connection(tokio::io::stdin(), tokio::io::stdout(), config).await;
    Ok(())
}
