//! Conversation Store (C8): append-only per-user list of conversations,
//! each serialized by its own mutex so cross-conversation operations can
//! proceed in parallel (spec.md §4.8/§5).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{BrokerError, BrokerResult};
use crate::types::{Conversation, ConversationId, IntegrationId, Message, SandboxId, UserId};

/// In-memory conversation store.
pub struct ConversationStore {
    /// One mutex per conversation: mutations within a conversation are
    /// serial, but different conversations never contend with each other.
    conversations: RwLock<HashMap<ConversationId, Arc<Mutex<Conversation>>>>,
    by_user: RwLock<HashMap<UserId, Vec<ConversationId>>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new conversation owned by `user_id`.
    pub fn create(&self, user_id: &str, title: impl Into<String>) -> Conversation {
        let id = uuid::Uuid::new_v4().to_string();
        let conversation = Conversation::new(id.clone(), user_id.to_string(), title);

        self.conversations
            .write()
            .insert(id.clone(), Arc::new(Mutex::new(conversation.clone())));
        self.by_user
            .write()
            .entry(user_id.to_string())
            .or_default()
            .push(id);

        conversation
    }

    fn handle(&self, conversation_id: &str) -> BrokerResult<Arc<Mutex<Conversation>>> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(format!("no conversation {conversation_id}")))
    }

    pub fn get(&self, conversation_id: &str) -> BrokerResult<Conversation> {
        Ok(self.handle(conversation_id)?.lock().clone())
    }

    /// Append a message to a conversation's log and bump `updated_at`.
    pub fn append_message(&self, conversation_id: &str, message: Message) -> BrokerResult<()> {
        let handle = self.handle(conversation_id)?;
        let mut conversation = handle.lock();
        conversation.messages.push(message);
        conversation.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Record the sandbox a conversation has been bound to (projected
    /// from a `status` turn event, spec.md §4.7).
    pub fn set_sandbox_id(&self, conversation_id: &str, sandbox_id: SandboxId) -> BrokerResult<()> {
        let handle = self.handle(conversation_id)?;
        let mut conversation = handle.lock();
        conversation.sandbox_id = Some(sandbox_id);
        conversation.updated_at = chrono::Utc::now();
        Ok(())
    }

    pub fn set_enabled_tools(
        &self,
        conversation_id: &str,
        tools: std::collections::HashSet<IntegrationId>,
    ) -> BrokerResult<()> {
        let handle = self.handle(conversation_id)?;
        let mut conversation = handle.lock();
        conversation.enabled_tools = Some(tools);
        conversation.updated_at = chrono::Utc::now();
        Ok(())
    }

    pub fn update_title(&self, conversation_id: &str, title: impl Into<String>) -> BrokerResult<()> {
        let handle = self.handle(conversation_id)?;
        let mut conversation = handle.lock();
        conversation.title = title.into();
        conversation.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Delete a conversation. Deletion is terminal.
    pub fn delete(&self, conversation_id: &str) {
        self.conversations.write().remove(conversation_id);
        for ids in self.by_user.write().values_mut() {
            ids.retain(|id| id != conversation_id);
        }
    }

    /// List a user's conversations, most recently updated first.
    pub fn list(&self, user_id: &str) -> Vec<Conversation> {
        let ids = self
            .by_user
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        let conversations_lock = self.conversations.read();
        let mut conversations: Vec<Conversation> = ids
            .iter()
            .filter_map(|id| conversations_lock.get(id))
            .map(|handle| handle.lock().clone())
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn create_then_get_round_trips() {
        let store = ConversationStore::new();
        let created = store.create("user-1", "New chat");
        let got = store.get(&created.id).unwrap();
        assert_eq!(got.id, created.id);
        assert_eq!(got.user_id, "user-1");
        assert!(got.messages.is_empty());
    }

    #[test]
    fn append_message_preserves_order() {
        let store = ConversationStore::new();
        let conversation = store.create("user-1", "chat");
        store
            .append_message(&conversation.id, Message::new(Role::User, "hi"))
            .unwrap();
        store
            .append_message(&conversation.id, Message::new(Role::Assistant, "hello"))
            .unwrap();
        let got = store.get(&conversation.id).unwrap();
        assert_eq!(got.messages.len(), 2);
        assert_eq!(got.messages[0].content, "hi");
        assert_eq!(got.messages[1].content, "hello");
    }

    #[test]
    fn list_sorts_by_last_update_descending() {
        let store = ConversationStore::new();
        let first = store.create("user-1", "first");
        let second = store.create("user-1", "second");
        // Touch `first` so it becomes most recently updated.
        store
            .append_message(&first.id, Message::new(Role::User, "hi"))
            .unwrap();
        let listed = store.list("user-1");
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn delete_is_terminal() {
        let store = ConversationStore::new();
        let conversation = store.create("user-1", "chat");
        store.delete(&conversation.id);
        assert!(store.get(&conversation.id).is_err());
        assert!(store.list("user-1").is_empty());
    }

    #[test]
    fn get_unknown_conversation_is_not_found() {
        let store = ConversationStore::new();
        let err = store.get("nope").unwrap_err();
        assert_eq!(err.kind(), "not-found");
    }
}
