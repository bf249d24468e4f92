//! Maps inbound method calls to handlers and drives turns.
//!
//! The processor is owned by the connection's single read loop, so session
//! state is only ever mutated from one task; `prompt` turns run on spawned
//! tasks that reach the store and the writer through `Arc`s.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tether_core::SessionStore;
use tether_core::TurnError;
use tether_core::TurnOutcome;
use tether_core::TurnScript;
use tether_core::UpdateSink;
use tether_protocol::AgentCapabilities;
use tether_protocol::AuthenticateParams;
use tether_protocol::AuthenticateResponse;
use tether_protocol::CancelParams;
use tether_protocol::InitializeParams;
use tether_protocol::InitializeResponse;
use tether_protocol::JsonRpcNotification;
use tether_protocol::JsonRpcRequest;
use tether_protocol::NewSessionParams;
use tether_protocol::NewSessionResponse;
use tether_protocol::PROTOCOL_VERSION;
use tether_protocol::PromptParams;
use tether_protocol::PromptResponse;
use tether_protocol::RequestId;
use tether_protocol::SessionId;
use tether_protocol::SessionNotification;
use tether_protocol::SessionUpdate;
use tether_protocol::SetSessionModeParams;
use tether_protocol::SetSessionModeResponse;
use tether_protocol::StopReason;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::AgentConfig;
use crate::error_code::INTERNAL_ERROR_CODE;
use crate::error_code::INVALID_PARAMS_ERROR_CODE;
use crate::error_code::INVALID_REQUEST_ERROR_CODE;
use crate::error_code::METHOD_NOT_FOUND_ERROR_CODE;
use crate::error_code::SESSION_NOT_FOUND_ERROR_CODE;
use crate::outgoing::OutgoingMessageSender;

/// Handles JSON-RPC messages for one connection.
pub(crate) struct MessageProcessor {
    store: Arc<SessionStore>,
    outgoing: Arc<OutgoingMessageSender>,
    config: AgentConfig,
    /// Set by a successful `initialize`; immutable afterwards.
    negotiated_version: Option<u16>,
}

impl MessageProcessor {
    pub(crate) fn new(
        store: Arc<SessionStore>,
        outgoing: Arc<OutgoingMessageSender>,
        config: AgentConfig,
    ) -> Self {
        Self {
            store,
            outgoing,
            config,
            negotiated_version: None,
        }
    }

    /// Processes one request. `ControlFlow::Break` means a protocol error
    /// that is fatal to the connection.
    pub(crate) async fn process_request(&mut self, request: JsonRpcRequest) -> ControlFlow<()> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        if self.negotiated_version.is_none() && method != "initialize" {
            self.outgoing
                .send_error(
                    id,
                    INVALID_REQUEST_ERROR_CODE,
                    format!("`initialize` must be called before `{method}`"),
                )
                .await;
            error!("protocol error: `{method}` before `initialize`; closing connection");
            return ControlFlow::Break(());
        }

        match method.as_str() {
            "initialize" => {
                // Capabilities are immutable after the handshake; there is no
                // renegotiation.
                if self.negotiated_version.is_some() {
                    self.outgoing
                        .send_error(
                            id,
                            INVALID_REQUEST_ERROR_CODE,
                            "`initialize` may only be called once".to_string(),
                        )
                        .await;
                } else if let Some(params) =
                    self.parse_params::<InitializeParams>(&id, params).await
                {
                    self.handle_initialize(id, params).await;
                }
            }
            "newSession" => {
                // Params are all optional; a missing object means defaults.
                let params = params.unwrap_or_else(|| Value::Object(Default::default()));
                if let Some(params) = self
                    .parse_params::<NewSessionParams>(&id, Some(params))
                    .await
                {
                    self.handle_new_session(id, params).await;
                }
            }
            "authenticate" => {
                let params = params.unwrap_or_else(|| Value::Object(Default::default()));
                if let Some(params) = self
                    .parse_params::<AuthenticateParams>(&id, Some(params))
                    .await
                {
                    self.handle_authenticate(id, params).await;
                }
            }
            "setSessionMode" => {
                if let Some(params) = self.parse_params::<SetSessionModeParams>(&id, params).await {
                    self.handle_set_session_mode(id, params).await;
                }
            }
            "prompt" => {
                if let Some(params) = self.parse_params::<PromptParams>(&id, params).await {
                    self.handle_prompt(id, params).await;
                }
            }
            _ => {
                self.outgoing
                    .send_error(
                        id,
                        METHOD_NOT_FOUND_ERROR_CODE,
                        format!("unknown method `{method}`"),
                    )
                    .await;
            }
        }
        ControlFlow::Continue(())
    }

    pub(crate) async fn process_notification(&mut self, notification: JsonRpcNotification) {
        let JsonRpcNotification { method, params, .. } = notification;
        match method.as_str() {
            "cancel" => match serde_json::from_value::<CancelParams>(params.unwrap_or(Value::Null))
            {
                Ok(params) => {
                    // Unknown session or no live turn: silent no-op by
                    // contract, never an error.
                    self.store.cancel(&params.session_id).await;
                }
                Err(err) => {
                    warn!("ignoring malformed cancel notification: {err}");
                }
            },
            _ => {
                debug!("ignoring unknown notification `{method}`");
            }
        }
    }

    async fn handle_initialize(&mut self, id: RequestId, params: InitializeParams) {
        let negotiated = params.protocol_version.min(PROTOCOL_VERSION);
        self.negotiated_version = Some(negotiated);
        info!(
            "initialized: client requested v{}, negotiated v{negotiated}",
            params.protocol_version
        );
        self.outgoing
            .send_response(
                id,
                InitializeResponse {
                    protocol_version: negotiated,
                    agent_capabilities: AgentCapabilities {
                        load_session: false,
                    },
                },
            )
            .await;
    }

    async fn handle_new_session(&self, id: RequestId, params: NewSessionParams) {
        let session_id = self.store.create(params.cwd).await;
        info!("created session {session_id}");
        self.outgoing
            .send_response(id, NewSessionResponse { session_id })
            .await;
    }

    async fn handle_authenticate(&self, id: RequestId, params: AuthenticateParams) {
        // Authentication is owned by the external auth service; this method
        // exists for protocol symmetry and always acknowledges.
        match params.token.or_else(|| {
            self.config
                .credentials
                .as_ref()
                .map(|credentials| credentials.token.clone())
        }) {
            Some(token) => debug!("authenticate acknowledged (token {}…)", truncate(&token, 8)),
            None => debug!("authenticate acknowledged (no token presented)"),
        }
        self.outgoing
            .send_response(id, AuthenticateResponse::default())
            .await;
    }

    async fn handle_set_session_mode(&self, id: RequestId, params: SetSessionModeParams) {
        match self.store.get(&params.session_id).await {
            Ok(_) => {
                // Session modes are not modeled; acknowledge and move on.
                debug!(
                    "session {} mode set to `{}` (not modeled)",
                    params.session_id, params.mode
                );
                self.outgoing
                    .send_response(id, SetSessionModeResponse::default())
                    .await;
            }
            Err(err) => {
                self.outgoing
                    .send_error(id, SESSION_NOT_FOUND_ERROR_CODE, err.to_string())
                    .await;
            }
        }
    }

    /// Installs the turn before yielding back to the read loop, then runs the
    /// script on its own task so the loop keeps draining racing `cancel`
    /// notifications while the caller is suspended on the response.
    ///
    /// The lookup and `begin_turn` must happen here, not on the spawned task:
    /// a `cancel` that follows this `prompt` on the wire is processed by the
    /// same read loop, and it must find the turn already registered.
    async fn handle_prompt(&self, id: RequestId, params: PromptParams) {
        let session_id = params.session_id;
        let session = match self.store.get(&session_id).await {
            Ok(session) => session,
            Err(err) => {
                self.outgoing
                    .send_error(id, SESSION_NOT_FOUND_ERROR_CODE, err.to_string())
                    .await;
                return;
            }
        };

        // Supersede any turn already running for this session.
        let handle = session.begin_turn().await;

        let outgoing = self.outgoing.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let workspace = session
                .cwd()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| config.default_workspace.clone());
            let script = TurnScript::simulated(&workspace, config.turn_pace);
            let sink = NotificationSink {
                outgoing: outgoing.clone(),
                session_id: session_id.clone(),
            };

            let result = script.run(handle.token(), &sink).await;
            session.finish_turn(&handle).await;

            match result {
                Ok(TurnOutcome::Completed) => {
                    outgoing
                        .send_response(
                            id,
                            PromptResponse {
                                stop_reason: StopReason::EndTurn,
                            },
                        )
                        .await;
                }
                Ok(TurnOutcome::Cancelled) => {
                    info!("turn for session {session_id} cancelled");
                    outgoing
                        .send_response(
                            id,
                            PromptResponse {
                                stop_reason: StopReason::Cancelled,
                            },
                        )
                        .await;
                }
                Err(err) => {
                    // The session record survives; subsequent prompts on it
                    // must keep working.
                    error!("turn for session {session_id} failed: {err}");
                    outgoing
                        .send_error(id, INTERNAL_ERROR_CODE, format!("turn failed: {err}"))
                        .await;
                }
            }
        });
    }

    async fn parse_params<T: DeserializeOwned>(
        &self,
        id: &RequestId,
        params: Option<Value>,
    ) -> Option<T> {
        match serde_json::from_value(params.unwrap_or(Value::Null)) {
            Ok(params) => Some(params),
            Err(err) => {
                self.outgoing
                    .send_error(
                        id.clone(),
                        INVALID_PARAMS_ERROR_CODE,
                        format!("invalid params: {err}"),
                    )
                    .await;
                None
            }
        }
    }
}

struct NotificationSink {
    outgoing: Arc<OutgoingMessageSender>,
    session_id: SessionId,
}

#[async_trait]
impl UpdateSink for NotificationSink {
    async fn send_update(&self, update: SessionUpdate) -> Result<(), TurnError> {
        let delivered = self
            .outgoing
            .send_session_update(SessionNotification {
                session_id: self.session_id.clone(),
                update,
            })
            .await;
        if delivered {
            Ok(())
        } else {
            Err(TurnError::UpdateChannelClosed)
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
