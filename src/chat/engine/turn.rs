//! One user/assistant exchange: append, stream, finish or fail.
//!
//! State machine of the assistant message:
//! `pending -> streaming -> finished | errored`. Each partial update
//! replaces the displayed content. Finishing classifies the reply, stores
//! the widget and bookkeeping, clears `is_generating` and schedules
//! background upkeep.

use futures::StreamExt;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use tracing::{debug, error, info};

use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::{MessageId, SessionId};
use crate::chat::core::message::ChatMessage;
use crate::chat::engine::background::BackgroundTasks;
use crate::chat::engine::store::ChatStore;
use crate::chat::prompt::prompt_builder::{build_prompt_messages, to_request_messages};
use crate::chat::prompt::template::{TemplateVars, fill_template_with};
use crate::llm::{
    Completion, FinishReason, LlmResult, MessageContent, RequestMessage, StreamEvent, Usage,
};

/// A user turn that has been appended and awaits its reply.
#[derive(Clone, Debug)]
pub struct PendingTurn {
    /// Session the turn belongs to.
    pub session_id: SessionId,
    /// Stored user message.
    pub user_id: MessageId,
    /// Assistant placeholder to fill.
    pub assistant_id: MessageId,
    /// Prompt captured right after the user message was appended.
    pub prompt: Vec<ChatMessage>,
}

/// Result of a full turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Final state of the assistant message.
    pub message: ChatMessage,
    /// Upkeep scheduled by the turn.
    pub background: BackgroundTasks,
}

impl ChatStore {
    /// Run a full turn: append the input, generate the reply and finish it.
    ///
    /// Model failures do not surface as errors; they end up in the returned
    /// message with `is_error` set.
    ///
    /// # Errors
    /// Returns an error for empty input, an unknown session or a session that
    /// is already generating.
    pub async fn on_user_input(
        &self,
        session_id: SessionId,
        text: &str,
    ) -> ChatResult<TurnOutcome> {
        let turn = self.append_user_turn(session_id, text).await?;
        let background = self.generate(&turn).await;

        let state = self.lock().await;
        let message = state
            .session(session_id)?
            .message(turn.assistant_id)
            .cloned()
            .ok_or(ChatError::MessageNotFound(turn.assistant_id))?;
        Ok(TurnOutcome {
            message,
            background,
        })
    }

    /// Append a user message and an empty streaming assistant message.
    ///
    /// # Errors
    /// Returns an error for empty input, an unknown session or a session that
    /// is already generating.
    pub async fn append_user_turn(
        &self,
        session_id: SessionId,
        text: &str,
    ) -> ChatResult<PendingTurn> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let mut state = self.lock().await;
        let session = state.session_mut(session_id)?;
        if session.is_generating {
            return Err(ChatError::AlreadyGenerating(session_id));
        }

        let vars = TemplateVars::now(
            &self.config.prompt.provider,
            self.config.llm.model.as_str(),
            &self.config.prompt.lang,
        );
        let user = ChatMessage::user(fill_template_with(
            text,
            &self.config.prompt.input_template,
            &vars,
        ));
        let user_id = user.id;
        session.messages.push(user);

        let prompt = build_prompt_messages(session, &self.config);

        let assistant = ChatMessage::assistant_placeholder(self.config.llm.model.clone());
        let assistant_id = assistant.id;
        session.messages.push(assistant);
        session.is_generating = true;
        session.touch();

        debug!(session = %session_id, prompt = prompt.len(), "appended user turn");
        Ok(PendingTurn {
            session_id,
            user_id,
            assistant_id,
            prompt,
        })
    }

    /// Replace the displayed content of a streaming reply.
    ///
    /// # Errors
    /// Returns an error if the session or message no longer exists.
    pub async fn on_assistant_chunk(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        partial: &str,
    ) -> ChatResult<()> {
        let mut state = self.lock().await;
        let message = state
            .session_mut(session_id)?
            .message_mut(message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;
        message.content = MessageContent::Text(partial.to_string());
        Ok(())
    }

    /// Finish a reply: classify it, store the result and schedule upkeep.
    ///
    /// # Errors
    /// Returns an error if the session or message no longer exists.
    pub async fn on_assistant_finish(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        full: &str,
        stop_reason: Option<FinishReason>,
        usage: Option<Usage>,
    ) -> ChatResult<BackgroundTasks> {
        let classified = self.classifier.classify(full).await;

        let snapshot = {
            let mut state = self.lock().await;
            let session = state.session_mut(session_id)?;
            session.is_generating = false;

            let message = session
                .message_mut(message_id)
                .ok_or(ChatError::MessageNotFound(message_id))?;
            message.content = MessageContent::Text(classified.content);
            message.widget = classified.widget;
            message.stop_reason = stop_reason;
            message.usage = usage;
            message.streaming = false;
            let finished = message.clone();

            session.record_stat(&finished);
            session.touch();
            session.clone()
        };

        info!(
            session = %session_id,
            kind = ?classified.kind,
            stop_reason = ?stop_reason,
            "assistant reply finished"
        );
        Ok(self.spawn_background(&snapshot))
    }

    /// Mark a reply as failed, appending the error to its content.
    ///
    /// # Errors
    /// Returns an error if the session or message no longer exists.
    pub async fn on_assistant_error(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        err: &str,
    ) -> ChatResult<()> {
        let mut state = self.lock().await;
        let session = state.session_mut(session_id)?;
        session.is_generating = false;

        let message = session
            .message_mut(message_id)
            .ok_or(ChatError::MessageNotFound(message_id))?;
        message.content.push_str(&format!("\n\n{err}"));
        message.streaming = false;
        message.is_error = true;
        Ok(())
    }

    /// Generate the reply for `turn` under an abort handle.
    async fn generate(&self, turn: &PendingTurn) -> BackgroundTasks {
        let requests = to_request_messages(&turn.prompt);
        let (handle, registration) = AbortHandle::new_pair();
        self.aborts.insert(turn.session_id, handle);

        let reply = if self.config.llm.stream {
            self.stream_reply(turn, &requests, registration).await
        } else {
            self.complete_reply(&requests, registration).await
        };
        self.aborts.remove(&turn.session_id);

        let settled = match reply {
            Ok(reply) => {
                self.on_assistant_finish(
                    turn.session_id,
                    turn.assistant_id,
                    &reply.text,
                    reply.stop_reason,
                    reply.usage,
                )
                .await
            }
            Err(e) => {
                error!(session = %turn.session_id, error = %e, "assistant reply failed");
                self.on_assistant_error(turn.session_id, turn.assistant_id, &e.to_string())
                    .await
                    .map(|()| BackgroundTasks::default())
            }
        };

        settled.unwrap_or_else(|e| {
            // The session or placeholder went away mid-turn.
            debug!(session = %turn.session_id, error = %e, "turn result dropped");
            BackgroundTasks::default()
        })
    }

    async fn stream_reply(
        &self,
        turn: &PendingTurn,
        requests: &[RequestMessage],
        registration: AbortRegistration,
    ) -> LlmResult<Completion> {
        let stream = self.model.stream(requests, &self.config.llm).await?;
        let mut events = Abortable::new(stream, registration);

        let mut text = String::new();
        let mut stop_reason = None;
        let mut usage = None;
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Delta(delta) => {
                    text.push_str(&delta);
                    if let Err(e) = self
                        .on_assistant_chunk(turn.session_id, turn.assistant_id, &text)
                        .await
                    {
                        debug!(error = %e, "partial update dropped");
                    }
                }
                StreamEvent::Finish {
                    stop_reason: reason,
                    usage: reported,
                } => {
                    stop_reason = reason;
                    usage = reported;
                }
            }
        }

        if events.is_aborted() {
            stop_reason = Some(FinishReason::Abort);
        }
        Ok(Completion {
            text,
            stop_reason,
            usage,
        })
    }

    async fn complete_reply(
        &self,
        requests: &[RequestMessage],
        registration: AbortRegistration,
    ) -> LlmResult<Completion> {
        let config = self.config.llm.streaming(false);
        match Abortable::new(self.model.complete(requests, &config), registration).await {
            Ok(reply) => reply,
            Err(_aborted) => Ok(Completion {
                text: String::new(),
                stop_reason: Some(FinishReason::Abort),
                usage: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::chat::core::config::ChatConfig;
    use crate::chat::core::errors::ChatError;
    use crate::chat::engine::store::tests::{Script, ScriptedModel, store, store_with};
    use crate::llm::{FinishReason, Role};
    use crate::widgets::types::Widget;

    #[tokio::test]
    async fn full_turn_classifies_reply() {
        let store = store_with(
            ScriptedModel::replying("The first Monday of 2025 is January 6th._calendar_2025-01-06"),
            ChatConfig::default(),
        );
        let id = store.current_session().await.id;

        let outcome = store.on_user_input(id, "When is the first Monday of 2025?").await;
        let Ok(outcome) = outcome else {
            panic!("turn should run");
        };
        let message = &outcome.message;
        assert_eq!(message.role(), Role::Assistant);
        assert_eq!(message.text(), "The first Monday of 2025 is January 6th.");
        assert!(matches!(message.widget, Some(Widget::Calendar { .. })));
        assert_eq!(message.stop_reason, Some(FinishReason::Stop));
        assert!(message.usage.is_some());
        assert!(!message.streaming);

        let session = store.session(id).await.unwrap_or_default();
        assert_eq!(session.messages.len(), 2);
        assert!(!session.is_generating);
        assert!(session.stat.char_count > 0);
        assert_eq!(session.stat.token_count, 5);
    }

    #[tokio::test]
    async fn chunks_replace_content() {
        let store = store();
        let id = store.current_session().await.id;
        let Ok(turn) = store.append_user_turn(id, "hi").await else {
            panic!("append should succeed");
        };
        assert!(turn.prompt.iter().all(|m| m.id != turn.assistant_id));
        assert_eq!(turn.prompt.last().map(|m| m.id), Some(turn.user_id));

        store.on_assistant_chunk(id, turn.assistant_id, "Hel").await.ok();
        store.on_assistant_chunk(id, turn.assistant_id, "Hello").await.ok();
        let session = store.session(id).await.unwrap_or_default();
        let reply = session.message(turn.assistant_id).map(|m| m.text().to_string());
        assert_eq!(reply.as_deref(), Some("Hello"));
        assert!(session.is_generating);
    }

    #[tokio::test]
    async fn busy_and_empty_input_are_rejected() {
        let store = store();
        let id = store.current_session().await.id;
        assert!(matches!(
            store.append_user_turn(id, "   ").await,
            Err(ChatError::EmptyInput)
        ));
        assert!(store.append_user_turn(id, "first").await.is_ok());
        assert!(matches!(
            store.append_user_turn(id, "second").await,
            Err(ChatError::AlreadyGenerating(_))
        ));
    }

    #[tokio::test]
    async fn model_error_marks_message() {
        let mut model = ScriptedModel::replying("unused");
        model.script = Script::Fail;
        let store = store_with(model, ChatConfig::default());
        let id = store.current_session().await.id;

        let Ok(outcome) = store.on_user_input(id, "hi").await else {
            panic!("turn should settle");
        };
        assert!(outcome.message.is_error);
        assert!(!outcome.message.streaming);
        assert!(outcome.message.text().starts_with("\n\n"));
        assert!(outcome.message.text().contains("upstream exploded"));
        assert!(!store.session(id).await.unwrap_or_default().is_generating);
    }

    #[tokio::test]
    async fn abort_keeps_partial_text() {
        let mut model = ScriptedModel::replying("partial answer");
        model.script = Script::Hang;
        let store = store_with(model, ChatConfig::default());
        let id = store.current_session().await.id;

        let running = {
            let store = store.clone();
            tokio::spawn(async move { store.on_user_input(id, "tell me a story").await })
        };

        let mut aborted = false;
        for _ in 0..200 {
            let streamed = store
                .session(id)
                .await
                .ok()
                .and_then(|s| s.messages.last().map(|m| m.text() == "partial answer"))
                .unwrap_or(false);
            if streamed && store.abort(id) {
                aborted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(aborted);

        let outcome = match running.await {
            Ok(Ok(outcome)) => outcome,
            _ => panic!("turn should finish after abort"),
        };
        assert_eq!(outcome.message.text(), "partial answer");
        assert_eq!(outcome.message.stop_reason, Some(FinishReason::Abort));
        assert!(!store.abort(id));
    }

    #[tokio::test]
    async fn undoing_delete_mid_reply_leaves_session_usable() {
        let mut model = ScriptedModel::replying("partial answer");
        model.script = Script::Hang;
        let store = store_with(model, ChatConfig::default());
        let id = store.current_session().await.id;

        let running = {
            let store = store.clone();
            tokio::spawn(async move { store.on_user_input(id, "tell me a story").await })
        };

        let mut streamed = false;
        for _ in 0..200 {
            streamed = store
                .session(id)
                .await
                .ok()
                .and_then(|s| s.messages.last().map(|m| m.text() == "partial answer"))
                .unwrap_or(false);
            if streamed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(streamed);

        let token = store.delete_session(id).await.unwrap_or_default();
        assert!(matches!(
            running.await,
            Ok(Err(ChatError::SessionNotFound(_)))
        ));
        assert!(store.restore_deleted(token).await.is_ok());

        let session = store.session(id).await.unwrap_or_default();
        assert!(!session.is_generating);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].text(), "partial answer");
        assert!(!session.messages[1].streaming);
        assert!(store.append_user_turn(id, "go on").await.is_ok());
    }

    #[tokio::test]
    async fn non_streaming_mode_uses_single_completion() {
        let mut config = ChatConfig::default();
        config.llm.stream = false;
        let store = store_with(ScriptedModel::replying("unused"), config);
        let id = store.current_session().await.id;

        let Ok(outcome) = store.on_user_input(id, "name this").await else {
            panic!("turn should run");
        };
        assert_eq!(outcome.message.text(), "\"Trip Planning Basics\"");
    }
}
