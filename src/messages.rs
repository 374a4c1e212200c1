use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{MessagingError, StoreError, ValidationError};
use crate::models::{Conversation, Message};
use crate::store::{Filter, Order, RemoteStore, RemoteStoreExt, SelectQuery, CONVERSATIONS, MESSAGES};

#[derive(Serialize)]
struct NewMessage<'a> {
    conversation_id: &'a str,
    sender_id: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct NewConversation<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    listing_id: Option<&'a str>,
    participant_1: &'a str,
    participant_2: &'a str,
}

/// Buyer/seller conversations over the remote store
pub struct MessagingService {
    store: Arc<dyn RemoteStore>,
}

impl MessagingService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Conversations the user takes part in, most recent activity first
    pub async fn conversations_for(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let query = SelectQuery::new()
            .filter(Filter::any_eq([
                ("participant_1", user_id),
                ("participant_2", user_id),
            ]))
            .order(Order::desc("last_message_at"));

        let mut conversations: Vec<Conversation> =
            self.store.select_as(CONVERSATIONS, &query).await?;
        conversations.retain(|c| c.involves(user_id));
        debug!(user_id, count = conversations.len(), "Fetched conversations");
        Ok(conversations)
    }

    /// Messages of one conversation, oldest first
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let query = SelectQuery::new()
            .filter(Filter::eq("conversation_id", conversation_id))
            .order(Order::asc("created_at"));
        self.store.select_as(MESSAGES, &query).await
    }

    pub async fn send(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let message: Message = self
            .store
            .insert_as(
                MESSAGES,
                &NewMessage {
                    conversation_id,
                    sender_id,
                    content,
                },
            )
            .await?;
        info!(conversation_id, sender_id, "✉️  Message sent");
        Ok(message)
    }

    /// Reuse the buyer's thread with the seller about `listing_id`, or open one
    pub async fn start_conversation(
        &self,
        listing_id: Option<&str>,
        buyer_id: &str,
        seller_id: &str,
    ) -> Result<Conversation, StoreError> {
        let mut query = SelectQuery::new()
            .filter(Filter::eq("participant_1", buyer_id))
            .filter(Filter::eq("participant_2", seller_id));
        if let Some(listing_id) = listing_id {
            query = query.filter(Filter::eq("listing_id", listing_id));
        }

        let existing: Option<Conversation> = self.store.select_one(CONVERSATIONS, &query).await?;
        if let Some(conversation) = existing {
            debug!(conversation_id = %conversation.id, "Reusing conversation");
            return Ok(conversation);
        }

        let conversation: Conversation = self
            .store
            .insert_as(
                CONVERSATIONS,
                &NewConversation {
                    listing_id,
                    participant_1: buyer_id,
                    participant_2: seller_id,
                },
            )
            .await?;
        info!(conversation_id = %conversation.id, buyer_id, seller_id, "Conversation started");
        Ok(conversation)
    }
}
