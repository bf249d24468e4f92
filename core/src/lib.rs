//! Session and turn management for the tether agent.
//!
//! The [`SessionStore`] owns every session record; a [`TurnScript`] executes
//! as a cancellable unit of work that streams updates through an
//! [`UpdateSink`]. Transport and dispatch live in `tether-agent`.

pub mod credentials;
mod error;
mod session;
mod turn;

pub use error::CredentialsError;
pub use error::SessionError;
pub use error::TurnError;
pub use session::Session;
pub use session::SessionStore;
pub use session::TurnHandle;
pub use turn::TurnOutcome;
pub use turn::TurnScript;
pub use turn::TurnStep;
pub use turn::UpdateSink;
