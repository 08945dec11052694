use std::sync::Arc;

use vb_conversation::ConversationStore;
use vb_domain::config::Config;
use vb_store::StoreProvider;

use crate::tools::ToolDispatcher;

/// Shared application state passed to all handlers.
///
/// Everything here is immutable configuration or a long-lived client;
/// per-call state lives inside each bridge task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn StoreProvider>,
    pub conversations: Arc<ConversationStore>,
    pub dispatcher: Arc<ToolDispatcher>,
}
