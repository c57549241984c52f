//! Discord connector
//!
//! Walks guild → channel → message/thread/attachment, emitting the breadcrumb
//! chain to every descendant. Messages paginate with Discord's `before`
//! cursor, guild members with `after`; both loops end on a page shorter than
//! the configured limit.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use async_trait::async_trait;

use tributary_common::Result;

use crate::config::DiscordConfig;
use crate::entities::discord::{
    DiscordAttachment, DiscordChannel, DiscordGuild, DiscordMessage, DiscordThread, DiscordUser,
};
use crate::entities::{Breadcrumb, Entity, FileRef};

use super::http::{ApiClient, RetryPolicy};
use super::{Connector, EntitySink};

/// Channel types worth syncing: text, voice, announcement and thread kinds.
const SYNCED_CHANNEL_TYPES: [i64; 6] = [0, 2, 5, 10, 11, 12];
/// Channel types that carry messages and threads.
const TEXT_CHANNEL_TYPES: [i64; 2] = [0, 5];
/// Discord epoch offset for snowflake ids, in milliseconds.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

#[derive(Debug)]
pub struct DiscordConnector {
    client: ApiClient,
    base_url: String,
    page_size: usize,
    member_page_size: usize,
}

impl DiscordConnector {
    /// Authenticate and build the connector. The token is validated against
    /// `/users/@me` before any entity is emitted; a rejected token surfaces
    /// as an authentication error.
    pub async fn create(config: &DiscordConfig, policy: RetryPolicy) -> Result<Self> {
        let client = ApiClient::bearer(&config.token, policy)?;
        client
            .get_json(&format!("{}/users/@me", config.base_url), &[])
            .await?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            page_size: config.page_size,
            member_page_size: config.member_page_size,
        })
    }

    async fn emit_guild(&self, out: &mut EntitySink, guild: &Value) -> Result<()> {
        let Some((entity, crumb)) = parse_guild(guild) else {
            warn!("skipping malformed guild record");
            return Ok(());
        };
        out.emit(entity).await?;

        let channels = self
            .client
            .get_json(
                &format!("{}/guilds/{}/channels", self.base_url, crumb.entity_id),
                &[],
            )
            .await?;
        for channel in channels.as_array().into_iter().flatten() {
            self.emit_channel(out, channel, &crumb).await?;
        }

        self.emit_members(out, &crumb).await?;
        Ok(())
    }

    async fn emit_channel(
        &self,
        out: &mut EntitySink,
        channel: &Value,
        guild_crumb: &Breadcrumb,
    ) -> Result<()> {
        let channel_type = channel["type"].as_i64().unwrap_or(-1);
        if !SYNCED_CHANNEL_TYPES.contains(&channel_type) {
            return Ok(());
        }
        let Some((entity, crumb)) = parse_channel(channel, guild_crumb) else {
            warn!(guild = %guild_crumb.entity_id, "skipping malformed channel record");
            return Ok(());
        };
        let channel_id = crumb.entity_id.clone();
        out.emit(entity).await?;

        if TEXT_CHANNEL_TYPES.contains(&channel_type) {
            let breadcrumbs = vec![guild_crumb.clone(), crumb];
            self.emit_messages(out, &channel_id, &breadcrumbs).await?;
            self.emit_threads(out, &channel_id, &breadcrumbs).await?;
        }
        Ok(())
    }

    /// Message history, newest first, paginated with the `before` cursor.
    async fn emit_messages(
        &self,
        out: &mut EntitySink,
        channel_id: &str,
        breadcrumbs: &[Breadcrumb],
    ) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let mut before: Option<String> = None;

        loop {
            let mut params = vec![("limit", self.page_size.to_string())];
            if let Some(cursor) = &before {
                params.push(("before", cursor.clone()));
            }
            let page = self.client.get_json(&url, &params).await?;
            let messages = page.as_array().cloned().unwrap_or_default();
            if messages.is_empty() {
                break;
            }

            for message in &messages {
                for attachment in message["attachments"].as_array().into_iter().flatten() {
                    match parse_attachment(attachment, message, channel_id) {
                        Some(entity) => {
                            out.emit(entity.with_breadcrumbs(breadcrumbs.to_vec())).await?
                        },
                        None => warn!(channel_id, "skipping malformed attachment"),
                    }
                }
                match parse_message(message, channel_id) {
                    Some(entity) => {
                        out.emit(entity.with_breadcrumbs(breadcrumbs.to_vec())).await?
                    },
                    None => warn!(channel_id, "skipping malformed message"),
                }
            }

            if messages.len() < self.page_size {
                break;
            }
            // Advance the cursor from the oldest message of the full page.
            match messages.last().and_then(|m| m["id"].as_str()) {
                Some(id) => before = Some(id.to_string()),
                None => break,
            }
        }
        Ok(())
    }

    async fn emit_threads(
        &self,
        out: &mut EntitySink,
        channel_id: &str,
        breadcrumbs: &[Breadcrumb],
    ) -> Result<()> {
        let url = format!(
            "{}/channels/{}/threads/archived/public",
            self.base_url, channel_id
        );
        let response = self.client.get_json(&url, &[]).await?;
        for thread in response["threads"].as_array().into_iter().flatten() {
            match parse_thread(thread, channel_id) {
                Some(entity) => out.emit(entity.with_breadcrumbs(breadcrumbs.to_vec())).await?,
                None => warn!(channel_id, "skipping malformed thread"),
            }
        }
        Ok(())
    }

    /// Guild members, paginated with the `after` cursor.
    async fn emit_members(&self, out: &mut EntitySink, guild_crumb: &Breadcrumb) -> Result<()> {
        let url = format!("{}/guilds/{}/members", self.base_url, guild_crumb.entity_id);
        let mut after: Option<String> = None;

        loop {
            let mut params = vec![("limit", self.member_page_size.to_string())];
            if let Some(cursor) = &after {
                params.push(("after", cursor.clone()));
            }
            let page = self.client.get_json(&url, &params).await?;
            let members = page.as_array().cloned().unwrap_or_default();
            if members.is_empty() {
                break;
            }

            for member in &members {
                match parse_member(member) {
                    Some(entity) => {
                        out.emit(entity.with_breadcrumbs(vec![guild_crumb.clone()])).await?
                    },
                    None => warn!(guild = %guild_crumb.entity_id, "skipping malformed member"),
                }
            }

            if members.len() < self.member_page_size {
                break;
            }
            match members.last().and_then(|m| m["user"]["id"].as_str()) {
                Some(id) => after = Some(id.to_string()),
                None => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for DiscordConnector {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn run(&mut self, out: &mut EntitySink) -> Result<()> {
        let guilds = self
            .client
            .get_json(&format!("{}/users/@me/guilds", self.base_url), &[])
            .await?;
        let guilds = guilds.as_array().cloned().unwrap_or_default();
        debug!(count = guilds.len(), "fetched guilds");

        for guild in &guilds {
            self.emit_guild(out, guild).await?;
        }
        Ok(())
    }
}

/// Creation time encoded in a snowflake id.
fn snowflake_time(id: &str) -> Option<DateTime<Utc>> {
    let raw: u64 = id.parse().ok()?;
    let millis = (raw >> 22) + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_guild(guild: &Value) -> Option<(Entity, Breadcrumb)> {
    let id = guild["id"].as_str()?;
    let name = guild["name"].as_str()?;
    let attributes = DiscordGuild {
        name: name.to_string(),
        description: guild["description"].as_str().map(String::from),
        icon_url: guild["icon"].as_str().map(|icon| {
            format!("https://cdn.discordapp.com/icons/{id}/{icon}.png")
        }),
        created_at: snowflake_time(id)?,
    };
    let entity = Entity::record(id).with_attributes(&attributes).ok()?;
    Some((entity, Breadcrumb::new(id, name, "guild")))
}

fn parse_channel(channel: &Value, guild_crumb: &Breadcrumb) -> Option<(Entity, Breadcrumb)> {
    let id = channel["id"].as_str()?;
    let name = channel["name"].as_str()?;
    let attributes = DiscordChannel {
        name: name.to_string(),
        channel_type: channel["type"].as_i64()?,
        topic: channel["topic"].as_str().map(String::from),
        nsfw: channel["nsfw"].as_bool().unwrap_or(false),
        parent_id: channel["parent_id"].as_str().map(String::from),
        position: channel["position"].as_i64().unwrap_or(0),
    };
    let entity = Entity::record(id)
        .with_attributes(&attributes)
        .ok()?
        .with_breadcrumbs(vec![guild_crumb.clone()]);
    Some((entity, Breadcrumb::new(id, name, "channel")))
}

fn parse_message(message: &Value, channel_id: &str) -> Option<Entity> {
    let id = message["id"].as_str()?;
    let content = message["content"].as_str()?;
    let attributes = DiscordMessage {
        author_id: message["author"]["id"].as_str()?.to_string(),
        channel_id: channel_id.to_string(),
        created_at: parse_rfc3339(message["timestamp"].as_str()?)?,
        edited_at: message["edited_timestamp"]
            .as_str()
            .and_then(parse_rfc3339),
        pinned: message["pinned"].as_bool().unwrap_or(false),
    };
    Entity::chunk(id, content).with_attributes(&attributes).ok()
}

fn parse_thread(thread: &Value, channel_id: &str) -> Option<Entity> {
    let id = thread["id"].as_str()?;
    let name = thread["name"].as_str()?;
    let metadata = &thread["thread_metadata"];
    let attributes = DiscordThread {
        name: name.to_string(),
        parent_id: channel_id.to_string(),
        owner_id: thread["owner_id"].as_str()?.to_string(),
        archived: metadata["archived"].as_bool().unwrap_or(false),
        locked: metadata["locked"].as_bool().unwrap_or(false),
        message_count: thread["message_count"].as_i64().unwrap_or(0),
    };
    Entity::chunk(id, name).with_attributes(&attributes).ok()
}

fn parse_attachment(attachment: &Value, message: &Value, channel_id: &str) -> Option<Entity> {
    let id = attachment["id"].as_str()?;
    let file = FileRef {
        file_id: id.to_string(),
        name: attachment["filename"].as_str()?.to_string(),
        mime_type: attachment["content_type"].as_str().map(String::from),
        size: attachment["size"].as_i64(),
        download_url: attachment["url"].as_str()?.to_string(),
    };
    let attributes = DiscordAttachment {
        message_id: message["id"].as_str()?.to_string(),
        channel_id: channel_id.to_string(),
        description: attachment["description"].as_str().map(String::from),
        height: attachment["height"].as_i64(),
        width: attachment["width"].as_i64(),
    };
    Entity::file(id, file).with_attributes(&attributes).ok()
}

fn parse_member(member: &Value) -> Option<Entity> {
    let user = &member["user"];
    let id = user["id"].as_str()?;
    let attributes = DiscordUser {
        username: user["username"].as_str()?.to_string(),
        discriminator: user["discriminator"].as_str().unwrap_or("0").to_string(),
        display_name: member["nick"].as_str().map(String::from),
        bot: user["bot"].as_bool().unwrap_or(false),
    };
    Entity::record(id).with_attributes(&attributes).ok()
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
