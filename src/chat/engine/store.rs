//! Session store: the list of sessions, the current selection and undo.
//!
//! All state lives behind one `tokio::sync::Mutex`. Locks are never held
//! across model calls; long-running work looks its target up again by
//! session and message id once it has a result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::AbortHandle;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{DeletionToken, SessionId};
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::{ChatSession, SessionTemplate};
use crate::chat::prompt::prompt_builder;
use crate::classifier::ResponseClassifier;
use crate::llm::{ChatModel, Role};

/// Snapshot taken before a deletion so it can be undone.
struct RestorePoint {
    token: DeletionToken,
    sessions: Vec<ChatSession>,
    current: usize,
    expires_at: Instant,
}

pub(crate) struct StoreState {
    pub(crate) sessions: Vec<ChatSession>,
    pub(crate) current: usize,
    restore: Option<RestorePoint>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            sessions: vec![ChatSession::new()],
            current: 0,
            restore: None,
        }
    }

    pub(crate) fn session(&self, id: SessionId) -> ChatResult<&ChatSession> {
        self.sessions
            .iter()
            .find(|s| s.id == id)
            .ok_or(ChatError::SessionNotFound(id))
    }

    pub(crate) fn session_mut(&mut self, id: SessionId) -> ChatResult<&mut ChatSession> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ChatError::SessionNotFound(id))
    }

    fn position(&self, id: SessionId) -> ChatResult<usize> {
        self.sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or(ChatError::SessionNotFound(id))
    }

    fn check_index(&self, index: usize) -> ChatResult<()> {
        if index < self.sessions.len() {
            Ok(())
        } else {
            Err(ChatError::InvalidIndex {
                index,
                len: self.sessions.len(),
            })
        }
    }
}

/// Conversation store driving sessions, replies and background upkeep.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct ChatStore {
    pub(crate) config: Arc<ChatConfig>,
    pub(crate) model: Arc<dyn ChatModel>,
    pub(crate) classifier: Arc<ResponseClassifier>,
    pub(crate) state: Arc<Mutex<StoreState>>,
    pub(crate) aborts: Arc<DashMap<SessionId, AbortHandle>>,
}

impl ChatStore {
    /// Create a store holding one empty session.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: ChatConfig,
        model: Arc<dyn ChatModel>,
        classifier: ResponseClassifier,
    ) -> ChatResult<Self> {
        config.validate()?;
        info!(model = %config.llm.model, backend = model.name(), "chat store ready");
        Ok(Self {
            config: Arc::new(config),
            model,
            classifier: Arc::new(classifier),
            state: Arc::new(Mutex::new(StoreState::new())),
            aborts: Arc::new(DashMap::new()),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Reply classifier.
    #[must_use]
    pub fn classifier(&self) -> &ResponseClassifier {
        &self.classifier
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().await
    }

    // ===== Queries =========================================================

    /// Snapshot of every session, in display order.
    pub async fn sessions(&self) -> Vec<ChatSession> {
        self.lock().await.sessions.clone()
    }

    /// Index of the selected session.
    pub async fn current_index(&self) -> usize {
        self.lock().await.current
    }

    /// Snapshot of the selected session.
    pub async fn current_session(&self) -> ChatSession {
        let state = self.lock().await;
        state.sessions[state.current].clone()
    }

    /// Snapshot of one session.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown id.
    pub async fn session(&self, id: SessionId) -> ChatResult<ChatSession> {
        self.lock().await.session(id).cloned()
    }

    /// Messages that would be sent to the model for the next reply.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown id.
    pub async fn build_prompt_messages(&self, id: SessionId) -> ChatResult<Vec<ChatMessage>> {
        let state = self.lock().await;
        let session = state.session(id)?;
        Ok(prompt_builder::build_prompt_messages(session, &self.config))
    }

    // ===== Session management ==============================================

    /// Insert a new session at the front and select it.
    pub async fn new_session(&self, template: Option<SessionTemplate>) -> SessionId {
        let session = template.map_or_else(ChatSession::new, ChatSession::from_template);
        let id = session.id;
        let mut state = self.lock().await;
        state.sessions.insert(0, session);
        state.current = 0;
        info!(session = %id, "created session");
        id
    }

    /// Select the session at `index`.
    ///
    /// # Errors
    /// Returns `InvalidIndex` when out of range.
    pub async fn select_session(&self, index: usize) -> ChatResult<()> {
        let mut state = self.lock().await;
        state.check_index(index)?;
        state.current = index;
        Ok(())
    }

    /// Move a session; the selection follows the session it pointed at.
    ///
    /// # Errors
    /// Returns `InvalidIndex` when either index is out of range.
    pub async fn move_session(&self, from: usize, to: usize) -> ChatResult<()> {
        let mut state = self.lock().await;
        state.check_index(from)?;
        state.check_index(to)?;

        let session = state.sessions.remove(from);
        state.sessions.insert(to, session);

        let old = state.current;
        let mut new = if old == from { to } else { old };
        if old > from && old <= to {
            new -= 1;
        } else if old < from && old >= to {
            new += 1;
        }
        state.current = new;
        Ok(())
    }

    /// Step the selection by `delta`, wrapping around.
    pub async fn next_session(&self, delta: isize) {
        let mut state = self.lock().await;
        let len = state.sessions.len();
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let next = (state.current as isize + delta).rem_euclid(len as isize) as usize;
        state.current = next;
    }

    /// Delete the session at `index`, returning a token to undo it.
    ///
    /// The previous state can be restored within the undo window. Deleting
    /// the only session leaves a fresh empty one.
    ///
    /// # Errors
    /// Returns `InvalidIndex` when out of range.
    pub async fn delete_session_at(&self, index: usize) -> ChatResult<DeletionToken> {
        let mut state = self.lock().await;
        state.check_index(index)?;

        let mut snapshot = (state.sessions.clone(), state.current);
        let removed = state.sessions.remove(index);
        self.abort(removed.id);
        // The aborted reply can no longer find its session to settle it.
        settle_interrupted(&mut snapshot.0[index]);

        let next = if state.sessions.is_empty() {
            state.sessions.push(ChatSession::new());
            0
        } else {
            (state.current - usize::from(index < state.current)).min(state.sessions.len() - 1)
        };
        state.current = next;

        let token = DeletionToken::new();
        state.restore = Some(RestorePoint {
            token,
            sessions: snapshot.0,
            current: snapshot.1,
            expires_at: Instant::now()
                + Duration::from_secs(self.config.session.undo_window_secs),
        });
        info!(session = %removed.id, "deleted session");
        Ok(token)
    }

    /// Delete a session by id.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown id.
    pub async fn delete_session(&self, id: SessionId) -> ChatResult<DeletionToken> {
        let index = self.lock().await.position(id)?;
        self.delete_session_at(index).await
    }

    /// Undo the deletion identified by `token`.
    ///
    /// # Errors
    /// Returns `NothingToRestore` when the token is unknown or expired.
    pub async fn restore_deleted(&self, token: DeletionToken) -> ChatResult<()> {
        let mut state = self.lock().await;
        match state.restore.take() {
            Some(point) if point.token == token && Instant::now() <= point.expires_at => {
                state.sessions = point.sessions;
                state.current = point.current;
                info!("restored deleted session");
                Ok(())
            }
            other => {
                state.restore = other.filter(|p| Instant::now() <= p.expires_at);
                Err(ChatError::NothingToRestore(token))
            }
        }
    }

    /// Replace every session with one empty session.
    pub async fn clear_sessions(&self) {
        self.abort_all();
        let mut state = self.lock().await;
        *state = StoreState::new();
        info!("cleared all sessions");
    }

    /// Drop a session's messages and memory.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown id.
    pub async fn reset_session(&self, id: SessionId) -> ChatResult<()> {
        self.lock().await.session_mut(id)?.reset();
        Ok(())
    }

    /// Hide every current message from future prompts.
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown id.
    pub async fn clear_context(&self, id: SessionId) -> ChatResult<()> {
        let mut state = self.lock().await;
        let session = state.session_mut(id)?;
        session.clear_context();
        debug!(session = %id, index = ?session.clear_context_index, "cleared context");
        Ok(())
    }

    /// Clear `is_generating` on every session.
    pub async fn reset_generating_status(&self) {
        for session in &mut self.lock().await.sessions {
            session.is_generating = false;
        }
    }

    /// Settle interrupted replies.
    ///
    /// In every session a trailing assistant message that is still streaming
    /// with no content is removed, and every other message stops streaming.
    pub async fn stop_streaming(&self) {
        let mut state = self.lock().await;
        for session in &mut state.sessions {
            settle_messages(session);
        }
    }

    // ===== Abort handles ===================================================

    /// Abort the reply being generated for a session.
    pub fn abort(&self, id: SessionId) -> bool {
        match self.aborts.remove(&id) {
            Some((_, handle)) => {
                handle.abort();
                info!(session = %id, "aborted generation");
                true
            }
            None => false,
        }
    }

    /// Abort every reply in flight.
    pub fn abort_all(&self) {
        for entry in self.aborts.iter() {
            entry.value().abort();
        }
        self.aborts.clear();
    }
}

/// Drop an empty trailing reply placeholder and stop all streaming flags.
fn settle_messages(session: &mut ChatSession) {
    let dangling = session
        .messages
        .last()
        .is_some_and(|m| m.role() == Role::Assistant && m.streaming && m.content.is_empty());
    if dangling {
        session.messages.pop();
    }
    for message in &mut session.messages {
        message.streaming = false;
    }
}

/// Settle a session whose reply was cut off without a finish.
fn settle_interrupted(session: &mut ChatSession) {
    settle_messages(session);
    session.is_generating = false;
}
