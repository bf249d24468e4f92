//! Wire types for the tether agent protocol.
//!
//! One JSON value per newline-delimited line, bidirectional, over any duplex
//! byte stream. Requests and responses follow JSON-RPC 2.0 framing; turn
//! progress flows back as one-way `sessionUpdate` notifications.

mod jsonrpc;
mod protocol;

pub use jsonrpc::ErrorObject;
pub use jsonrpc::JSONRPC_VERSION;
pub use jsonrpc::JsonRpcError;
pub use jsonrpc::JsonRpcMessage;
pub use jsonrpc::JsonRpcNotification;
pub use jsonrpc::JsonRpcRequest;
pub use jsonrpc::JsonRpcResponse;
pub use jsonrpc::RequestId;
pub use protocol::AgentCapabilities;
pub use protocol::AuthenticateParams;
pub use protocol::AuthenticateResponse;
pub use protocol::CancelParams;
pub use protocol::ContentBlock;
pub use protocol::InitializeParams;
pub use protocol::InitializeResponse;
pub use protocol::NewSessionParams;
pub use protocol::NewSessionResponse;
pub use protocol::PROTOCOL_VERSION;
pub use protocol::PromptParams;
pub use protocol::PromptResponse;
pub use protocol::SESSION_UPDATE_METHOD;
pub use protocol::SessionId;
pub use protocol::SessionNotification;
pub use protocol::SessionUpdate;
pub use protocol::SetSessionModeParams;
pub use protocol::SetSessionModeResponse;
pub use protocol::StopReason;
pub use protocol::ToolCall;
pub use protocol::ToolCallContent;
pub use protocol::ToolCallLocation;
pub use protocol::ToolCallStatus;
pub use protocol::ToolCallUpdate;
pub use protocol::ToolKind;
