use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tether_protocol::ContentBlock;
use tether_protocol::SessionUpdate;
use tether_protocol::ToolCall;
use tether_protocol::ToolCallContent;
use tether_protocol::ToolCallLocation;
use tether_protocol::ToolCallStatus;
use tether_protocol::ToolCallUpdate;
use tether_protocol::ToolKind;
use tokio_util::sync::CancellationToken;

use crate::error::TurnError;

/// Where a turn's updates go. The agent crate implements this on top of its
/// outgoing writer; tests implement it with a `Vec` behind a mutex.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn send_update(&self, update: SessionUpdate) -> Result<(), TurnError>;
}

/// One step of a turn script: emit an update or wait.
pub enum TurnStep {
    Emit(SessionUpdate),
    Sleep(Duration),
}

/// Terminal resolution of a turn that did not fail.
///
/// Cancellation is a first-class outcome, structurally distinct from
/// [`TurnError`]. It is decided at an explicit checkpoint, never inferred
/// from token state after some other failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
}

/// A fixed, ordered script of steps making up one turn of agent work.
pub struct TurnScript {
    steps: Vec<TurnStep>,
}

impl TurnScript {
    pub fn new(steps: Vec<TurnStep>) -> Self {
        Self { steps }
    }

    /// The simulated read-a-file turn: greeting chunk, pending tool call,
    /// completed tool-call update, closing chunk, with pauses in between.
    ///
    /// `pace` scales the pauses; the wall-clock defaults mirror the original
    /// interactive pacing, tests pass something near zero.
    pub fn simulated(workspace: &Path, pace: Duration) -> Self {
        let readme = workspace.join("README.md");
        let steps = vec![
            TurnStep::Emit(SessionUpdate::AgentMessageChunk {
                content: ContentBlock::text("Hello! Let me read a file for you."),
            }),
            TurnStep::Sleep(pace * 5),
            TurnStep::Emit(SessionUpdate::ToolCall(ToolCall {
                tool_call_id: "call_1".to_string(),
                title: format!("Reading {}", readme.display()),
                kind: ToolKind::Read,
                status: ToolCallStatus::Pending,
                locations: vec![ToolCallLocation {
                    path: readme.clone(),
                }],
                raw_input: Some(serde_json::json!({"path": readme})),
            })),
            TurnStep::Sleep(pace * 3),
            TurnStep::Emit(SessionUpdate::ToolCallUpdate(ToolCallUpdate {
                tool_call_id: "call_1".to_string(),
                status: ToolCallStatus::Completed,
                content: vec![ToolCallContent::Content {
                    content: ContentBlock::text("# Example Project\n\nSimulated file contents."),
                }],
                raw_output: Some(serde_json::json!({
                    "content": "# Example Project\n\nSimulated file contents.",
                })),
            })),
            TurnStep::Sleep(pace * 3),
            TurnStep::Emit(SessionUpdate::AgentMessageChunk {
                content: ContentBlock::text(
                    " I found the README. The project looks good! This session is working correctly.",
                ),
            }),
        ];
        Self::new(steps)
    }

    /// Executes the script as one cancellable unit of work.
    ///
    /// The token is checked before every step, and a sleep is abandoned the
    /// instant cancellation is signaled. An update, once begun, is written
    /// atomically by the sink; cancellation never truncates one mid-emission.
    pub async fn run(
        &self,
        token: &CancellationToken,
        sink: &dyn UpdateSink,
    ) -> Result<TurnOutcome, TurnError> {
        for step in &self.steps {
            if token.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }
            match step {
                TurnStep::Emit(update) => {
                    sink.send_update(update.clone()).await?;
                }
                TurnStep::Sleep(duration) => {
                    tokio::select! {
                        _ = token.cancelled() => return Ok(TurnOutcome::Cancelled),
                        _ = tokio::time::sleep(*duration) => {}
                    }
                }
            }
        }
        Ok(TurnOutcome::Completed)
    }
}
