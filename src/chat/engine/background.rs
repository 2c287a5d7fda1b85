//! Background upkeep after a finished reply: session titles and memory.
//!
//! Both jobs run as spawned tasks against a snapshot of the session and
//! write back through id lookups. A session deleted in the meantime is
//! logged and the result dropped.

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chat::core::ids::SessionId;
use crate::chat::core::message::ChatMessage;
use crate::chat::core::session::ChatSession;
use crate::chat::engine::store::ChatStore;
use crate::chat::prompt::prompt_builder::to_request_messages;
use crate::chat::summarization::{
    SummaryRequest, build_summary_request, build_topic_request, should_generate_topic,
    topic_from_reply,
};
use crate::llm::{LlmResult, StreamEvent};

/// Handles of the upkeep tasks spawned for one reply.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    /// Title generation, if one was due.
    pub topic: Option<JoinHandle<()>>,
    /// Memory compression, if one was due.
    pub summary: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Whether nothing was scheduled.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.topic.is_none() && self.summary.is_none()
    }

    /// Wait for every scheduled task.
    pub async fn join(self) {
        for handle in [self.topic, self.summary].into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task panicked");
            }
        }
    }
}

impl ChatStore {
    /// Schedule title generation and memory compression as needed.
    pub(crate) fn spawn_background(&self, session: &ChatSession) -> BackgroundTasks {
        let topic = should_generate_topic(session, &self.config).then(|| {
            let store = self.clone();
            let id = session.id;
            let messages = build_topic_request(session);
            tokio::spawn(async move { store.derive_topic(id, messages).await })
        });

        let summary = build_summary_request(session, &self.config).map(|request| {
            let store = self.clone();
            let id = session.id;
            tokio::spawn(async move { store.summarize(id, request).await })
        });

        BackgroundTasks { topic, summary }
    }

    /// One non-streaming title call; failures leave the topic untouched.
    async fn derive_topic(&self, id: SessionId, messages: Vec<ChatMessage>) {
        let requests = to_request_messages(&messages);
        let reply = match self.model.complete(&requests, &self.config.llm.bare()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session = %id, error = %e, "topic generation failed");
                return;
            }
        };

        let topic = topic_from_reply(&reply.text);
        let mut state = self.lock().await;
        match state.session_mut(id) {
            Ok(session) if session.has_default_topic() => {
                info!(session = %id, topic = %topic, "session titled");
                session.topic = topic;
            }
            Ok(_) => debug!(session = %id, "topic already set, keeping it"),
            Err(e) => debug!(error = %e, "session gone before its title arrived"),
        }
    }

    /// Stream a memory summary, committing it only when complete.
    async fn summarize(&self, id: SessionId, request: SummaryRequest) {
        let previous = match self.lock().await.session(id) {
            Ok(session) => session.memory_prompt.clone(),
            Err(e) => {
                debug!(error = %e, "session gone before summarizing");
                return;
            }
        };

        debug!(session = %id, history_len = request.history_len, "summarizing history");
        match self.stream_summary(id, &request).await {
            Ok(Some(memory)) => {
                let mut state = self.lock().await;
                if let Ok(session) = state.session_mut(id) {
                    session.memory_prompt = memory;
                    session.last_summarize_index = request.last_summarize_index;
                    info!(
                        session = %id,
                        last_summarize_index = request.last_summarize_index,
                        "memory updated"
                    );
                }
            }
            Ok(None) => debug!(session = %id, "session gone while summarizing"),
            Err(e) => {
                warn!(session = %id, error = %e, "summarization failed, restoring memory");
                let mut state = self.lock().await;
                if let Ok(session) = state.session_mut(id) {
                    session.memory_prompt = previous;
                }
            }
        }
    }

    /// Stream the summary, writing partial text into `memory_prompt`.
    ///
    /// Returns `None` when the session disappears mid-stream.
    async fn stream_summary(
        &self,
        id: SessionId,
        request: &SummaryRequest,
    ) -> LlmResult<Option<String>> {
        let config = self.config.llm.without_max_tokens().streaming(true);
        let requests = to_request_messages(&request.messages);
        let mut events = self.model.stream(&requests, &config).await?;

        let mut memory = String::new();
        while let Some(event) = events.next().await {
            if let StreamEvent::Delta(delta) = event? {
                memory.push_str(&delta);
                let mut state = self.lock().await;
                match state.session_mut(id) {
                    Ok(session) => session.memory_prompt.clone_from(&memory),
                    Err(_) => return Ok(None),
                }
            }
        }
        Ok(Some(memory))
    }
}
