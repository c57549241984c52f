//! Typed attributes for Discord entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guild attributes. Guilds are hierarchy records, not indexed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordGuild {
    pub name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Channel attributes. Like guilds, channels anchor the breadcrumb chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordChannel {
    pub name: String,
    pub channel_type: i64,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub parent_id: Option<String>,
    pub position: i64,
}

/// Message attributes; the message body itself lives in `Entity::content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordMessage {
    pub author_id: String,
    pub channel_id: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub pinned: bool,
}

/// Archived thread attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordThread {
    pub name: String,
    pub parent_id: String,
    pub owner_id: String,
    pub archived: bool,
    pub locked: bool,
    pub message_count: i64,
}

/// Extra attributes carried alongside an attachment's file reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordAttachment {
    pub message_id: String,
    pub channel_id: String,
    pub description: Option<String>,
    pub height: Option<i64>,
    pub width: Option<i64>,
}

/// Guild member attributes. Members are hierarchy records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordUser {
    pub username: String,
    pub discriminator: String,
    pub display_name: Option<String>,
    pub bot: bool,
}
