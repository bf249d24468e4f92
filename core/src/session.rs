use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use rand::RngCore;
use tether_protocol::SessionId;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SessionError;

/// Process-wide mapping from session identifier to session state.
///
/// The store exclusively owns [`Session`] records. There is no delete
/// operation; sessions live for the process lifetime.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints an unguessable identifier and registers an idle session for it.
    pub async fn create(&self, cwd: Option<PathBuf>) -> SessionId {
        let mut sessions = self.sessions.write().await;
        loop {
            let id = mint_session_id();
            // 16 random bytes make a collision among live sessions all but
            // impossible, but the id must be unique, so check anyway.
            if sessions.contains_key(&id) {
                continue;
            }
            sessions.insert(id.clone(), Arc::new(Session::new(cwd)));
            return id;
        }
    }

    pub async fn get(&self, id: &SessionId) -> Result<Arc<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned().ok_or_else(|| SessionError::unknown(id))
    }

    /// Signals cancellation of the session's live turn, if any.
    ///
    /// Unknown sessions and sessions with no live turn are a silent no-op,
    /// never an error.
    pub async fn cancel(&self, id: &SessionId) {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(id).cloned()
        };
        match session {
            Some(session) => session.cancel_active_turn().await,
            None => debug!("cancel for unknown session {id} ignored"),
        }
    }
}

/// A long-lived conversational context holding at most one active turn.
pub struct Session {
    cwd: Option<PathBuf>,
    state: Mutex<SessionState>,
}

struct SessionState {
    active: Option<ActiveTurn>,
    next_generation: u64,
}

struct ActiveTurn {
    generation: u64,
    token: CancellationToken,
}

/// Handle to one turn's slot in its session. Carries the cancellation token
/// the turn script polls, plus the generation used to release the slot.
pub struct TurnHandle {
    generation: u64,
    token: CancellationToken,
}

impl TurnHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Session {
    fn new(cwd: Option<PathBuf>) -> Self {
        Self {
            cwd,
            state: Mutex::new(SessionState {
                active: None,
                next_generation: 0,
            }),
        }
    }

    /// Workspace root declared at `newSession` time, if any.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Installs a fresh turn, superseding any turn already running.
    ///
    /// Supersession cancels the previous turn's token; the superseded turn
    /// resolves as cancelled on its own task. This is not an error.
    pub async fn begin_turn(&self) -> TurnHandle {
        let mut state = self.state.lock().await;
        if let Some(prev) = state.active.take() {
            debug!("superseding turn generation {}", prev.generation);
            prev.token.cancel();
        }
        let generation = state.next_generation;
        state.next_generation += 1;
        let token = CancellationToken::new();
        state.active = Some(ActiveTurn {
            generation,
            token: token.clone(),
        });
        TurnHandle { generation, token }
    }

    /// Releases the turn slot, but only if `handle` still owns it.
    ///
    /// A superseded turn finishing late must not clobber the turn that
    /// replaced it, hence the generation check.
    pub async fn finish_turn(&self, handle: &TurnHandle) {
        let mut state = self.state.lock().await;
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.generation == handle.generation)
        {
            state.active = None;
        }
    }

    pub async fn cancel_active_turn(&self) {
        let state = self.state.lock().await;
        if let Some(active) = &state.active {
            active.token.cancel();
        }
    }

    pub async fn has_active_turn(&self) -> bool {
        self.state.lock().await.active.is_some()
    }
}

/// 16 random bytes, hex-encoded. `rand::rng()` is a CSPRNG, so identifiers
/// are unguessable as well as unique.
fn mint_session_id() -> SessionId {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
