//! Dixa connector
//!
//! Retrieves conversations, their messages and their internal notes.
//! Conversations paginate by page number; a failure while processing one
//! conversation is logged and skipped so the stream continues with the next
//! one. Authentication failures and cancellation still abort the run.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use async_trait::async_trait;

use tributary_common::{Result, SyncError};

use crate::config::DixaConfig;
use crate::entities::dixa::{DixaConversation, DixaMessage, DixaNote};
use crate::entities::{Breadcrumb, Entity};

use super::http::{ApiClient, RetryPolicy};
use super::{Connector, EntitySink};

pub struct DixaConnector {
    client: ApiClient,
    base_url: String,
    page_size: usize,
}

impl DixaConnector {
    /// Build the connector. Dixa rejects a bad key on the first request,
    /// which surfaces as an authentication error from the call wrapper.
    pub fn create(config: &DixaConfig, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: ApiClient::bearer(&config.api_key, policy)?,
            base_url: config.base_url.clone(),
            page_size: config.page_size,
        })
    }

    async fn emit_conversation(&self, out: &mut EntitySink, conversation: &Value) -> Result<()> {
        let Some((entity, crumb)) = parse_conversation(conversation) else {
            warn!("skipping malformed conversation record");
            return Ok(());
        };
        let conversation_id = crumb.entity_id.clone();
        out.emit(entity).await?;

        let breadcrumbs = vec![crumb];
        self.emit_messages(out, &conversation_id, &breadcrumbs).await?;
        self.emit_notes(out, &conversation_id, &breadcrumbs).await?;
        Ok(())
    }

    async fn emit_messages(
        &self,
        out: &mut EntitySink,
        conversation_id: &str,
        breadcrumbs: &[Breadcrumb],
    ) -> Result<()> {
        let url = format!(
            "{}/conversations/{}/messages",
            self.base_url, conversation_id
        );
        let response = self.client.get_json(&url, &[]).await?;
        for message in response["data"].as_array().into_iter().flatten() {
            match parse_message(message, conversation_id) {
                Some(entity) => {
                    out.emit(entity.with_breadcrumbs(breadcrumbs.to_vec())).await?
                },
                None => warn!(conversation_id, "skipping malformed message"),
            }
        }
        Ok(())
    }

    async fn emit_notes(
        &self,
        out: &mut EntitySink,
        conversation_id: &str,
        breadcrumbs: &[Breadcrumb],
    ) -> Result<()> {
        let url = format!("{}/conversations/{}/notes", self.base_url, conversation_id);
        let response = self.client.get_json(&url, &[]).await?;
        for note in response["data"].as_array().into_iter().flatten() {
            match parse_note(note, conversation_id) {
                Some(entity) => {
                    out.emit(entity.with_breadcrumbs(breadcrumbs.to_vec())).await?
                },
                None => warn!(conversation_id, "skipping malformed note"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for DixaConnector {
    fn name(&self) -> &'static str {
        "dixa"
    }

    async fn run(&mut self, out: &mut EntitySink) -> Result<()> {
        let url = format!("{}/conversations", self.base_url);
        let mut page = 1usize;

        loop {
            let params = [
                ("page", page.to_string()),
                ("limit", self.page_size.to_string()),
            ];
            let response = self.client.get_json(&url, &params).await?;
            let conversations = response["data"].as_array().cloned().unwrap_or_default();
            if conversations.is_empty() {
                break;
            }
            debug!(page, count = conversations.len(), "fetched conversations");

            for conversation in &conversations {
                if let Err(err) = self.emit_conversation(out, conversation).await {
                    match err {
                        SyncError::Authentication(_) | SyncError::Cancelled => return Err(err),
                        err => warn!(
                            error = %err,
                            "skipping conversation after processing failure"
                        ),
                    }
                }
            }

            if conversations.len() < self.page_size {
                break;
            }
            page += 1;
        }
        Ok(())
    }
}

fn parse_conversation(conversation: &Value) -> Option<(Entity, Breadcrumb)> {
    let id = json_id(&conversation["id"])?;
    let subject = conversation["subject"].as_str().map(String::from);
    let attributes = DixaConversation {
        subject: subject.clone(),
        status: conversation["status"].as_str().unwrap_or("unknown").to_string(),
        created_at: parse_time(&conversation["created_at"])?,
        updated_at: parse_time(&conversation["updated_at"]),
    };
    let content = conversation["summary"].as_str().unwrap_or_default();
    let entity = Entity::chunk(id.clone(), content)
        .with_attributes(&attributes)
        .ok()?;
    let name = subject.unwrap_or_else(|| id.clone());
    Some((entity, Breadcrumb::new(id, name, "conversation")))
}

fn parse_message(message: &Value, conversation_id: &str) -> Option<Entity> {
    let id = json_id(&message["id"])?;
    let attributes = DixaMessage {
        conversation_id: conversation_id.to_string(),
        author_type: message["author_type"].as_str().unwrap_or("unknown").to_string(),
        author_name: message["author_name"].as_str().map(String::from),
        created_at: parse_time(&message["created_at"])?,
    };
    let content = message["content"].as_str().unwrap_or_default();
    Entity::chunk(id, content).with_attributes(&attributes).ok()
}

fn parse_note(note: &Value, conversation_id: &str) -> Option<Entity> {
    let id = json_id(&note["id"])?;
    let attributes = DixaNote {
        conversation_id: conversation_id.to_string(),
        author_name: note["author_name"].as_str().map(String::from),
        created_at: parse_time(&note["created_at"])?,
    };
    let content = note["content"].as_str().unwrap_or_default();
    Entity::chunk(id, content).with_attributes(&attributes).ok()
}

/// Dixa ids arrive as either strings or numbers.
fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_conversation_with_numeric_id() {
        let conversation = json!({
            "id": 12345,
            "subject": "Broken widget",
            "status": "open",
            "summary": "Customer reports a broken widget",
            "created_at": "2026-02-01T08:30:00Z"
        });
        let (entity, crumb) = parse_conversation(&conversation).unwrap();
        assert_eq!(entity.entity_id, "12345");
        assert_eq!(entity.content, "Customer reports a broken widget");
        assert_eq!(crumb.kind, "conversation");
    }

    #[test]
    fn test_parse_message_requires_created_at() {
        let message = json!({"id": "m1", "content": "hello"});
        assert!(parse_message(&message, "12345").is_none());
    }

    #[test]
    fn test_parse_note_defaults() {
        let note = json!({
            "id": "n1",
            "content": "internal note",
            "created_at": "2026-02-01T09:00:00Z"
        });
        let entity = parse_note(&note, "12345").unwrap();
        assert_eq!(entity.entity_id, "n1");
        assert_eq!(entity.attributes["conversation_id"], json!("12345"));
    }
}
