//! Typed attributes for Dixa entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation attributes; the conversation summary is the entity content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DixaConversation {
    pub subject: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DixaMessage {
    pub conversation_id: String,
    pub author_type: String,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Internal agent note attached to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DixaNote {
    pub conversation_id: String,
    pub author_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
