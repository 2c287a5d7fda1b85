//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::{ChatConfig, ChatResult, ChatStore};
use crate::classifier::ResponseClassifier;
use crate::llm::{ChatModel, OpenAiClient};
use crate::widgets::{WidgetConfig, WidgetService};

/// Shared application state.
pub struct AppState {
    /// Conversation store.
    pub store: ChatStore,
}

impl AppState {
    /// Wire the model client, widget service and store together.
    ///
    /// # Errors
    /// Returns an error if any configuration is invalid or a client cannot
    /// be created.
    pub fn new(chat: ChatConfig, widgets: WidgetConfig) -> ChatResult<Arc<Self>> {
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiClient::new(&chat.endpoint)?);
        let service =
            WidgetService::new(widgets)?.with_chart_model(model.clone(), chat.llm.clone());
        let classifier = ResponseClassifier::new(service)?;
        let store = ChatStore::new(chat, model, classifier)?;
        Ok(Arc::new(Self { store }))
    }

    /// State around an existing store.
    #[must_use]
    pub fn with_store(store: ChatStore) -> Arc<Self> {
        Arc::new(Self { store })
    }
}
