//! Intercom connector
//!
//! Retrieves contacts, companies, conversations and tickets. Every collection
//! uses Intercom's native cursor pagination: each response carries a
//! `pages.next` URL, and the loop follows it until the field is absent.

use serde_json::Value;
use tracing::{debug, warn};

use async_trait::async_trait;

use tributary_common::Result;

use crate::config::IntercomConfig;
use crate::entities::intercom::{
    IntercomCompany, IntercomContact, IntercomConversation, IntercomTicket,
};
use crate::entities::Entity;

use super::http::{ApiClient, RetryPolicy};
use super::{Connector, EntitySink};

pub struct IntercomConnector {
    client: ApiClient,
    base_url: String,
}

impl IntercomConnector {
    pub fn create(config: &IntercomConfig, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: ApiClient::bearer(&config.token, policy)?,
            base_url: config.base_url.clone(),
        })
    }

    /// Drain one collection, following `pages.next` until exhausted.
    async fn emit_collection(
        &self,
        out: &mut EntitySink,
        path: &str,
        label: &'static str,
        parse: fn(&Value) -> Option<Entity>,
    ) -> Result<()> {
        let mut url = format!("{}{}", self.base_url, path);
        loop {
            let response = self.client.get_json(&url, &[]).await?;
            let items = response["data"].as_array().cloned().unwrap_or_default();
            debug!(label, count = items.len(), "fetched page");

            for item in &items {
                match parse(item) {
                    Some(entity) => out.emit(entity).await?,
                    None => warn!(label, "skipping malformed record"),
                }
            }

            match response["pages"]["next"].as_str() {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for IntercomConnector {
    fn name(&self) -> &'static str {
        "intercom"
    }

    async fn run(&mut self, out: &mut EntitySink) -> Result<()> {
        self.emit_collection(out, "/contacts", "contacts", parse_contact)
            .await?;
        self.emit_collection(out, "/companies", "companies", parse_company)
            .await?;
        self.emit_collection(out, "/conversations", "conversations", parse_conversation)
            .await?;
        self.emit_collection(out, "/tickets", "tickets", parse_ticket)
            .await?;
        Ok(())
    }
}

fn parse_contact(contact: &Value) -> Option<Entity> {
    let id = contact["id"].as_str()?;
    let name = contact["name"].as_str().map(String::from);
    let email = contact["email"].as_str().map(String::from);
    let attributes = IntercomContact {
        role: contact["role"].as_str().map(String::from),
        external_id: contact["external_id"].as_str().map(String::from),
        email: email.clone(),
        phone: contact["phone"].as_str().map(String::from),
        name: name.clone(),
        created_at: contact["created_at"].as_i64(),
        updated_at: contact["updated_at"].as_i64(),
        archived: contact["archived"].as_bool().unwrap_or(false),
    };
    let content = [name, email]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    Entity::chunk(id, content).with_attributes(&attributes).ok()
}

fn parse_company(company: &Value) -> Option<Entity> {
    let id = company["id"].as_str()?;
    let name = company["name"].as_str().map(String::from);
    let attributes = IntercomCompany {
        name: name.clone(),
        company_id: company["company_id"].as_str().map(String::from),
        plan: company["plan"]["name"].as_str().map(String::from),
        monthly_spend: company["monthly_spend"].as_f64(),
        session_count: company["session_count"].as_i64(),
        user_count: company["user_count"].as_i64(),
    };
    Entity::chunk(id, name.unwrap_or_default())
        .with_attributes(&attributes)
        .ok()
}

fn parse_conversation(conversation: &Value) -> Option<Entity> {
    let id = conversation["id"].as_str()?;
    let title = conversation["title"].as_str().map(String::from);
    let attributes = IntercomConversation {
        title: title.clone(),
        state: conversation["state"].as_str().map(String::from),
        open: conversation["open"].as_bool().unwrap_or(false),
        created_at: conversation["created_at"].as_i64(),
        updated_at: conversation["updated_at"].as_i64(),
    };
    // The opening message body is the most useful indexable text.
    let content = conversation["source"]["body"]
        .as_str()
        .map(String::from)
        .or(title)
        .unwrap_or_default();
    Entity::chunk(id, content).with_attributes(&attributes).ok()
}

fn parse_ticket(ticket: &Value) -> Option<Entity> {
    let id = ticket["id"].as_str()?;
    let attributes = IntercomTicket {
        state: ticket["ticket_state"].as_str().map(String::from),
        category: ticket["category"].as_str().map(String::from),
        created_at: ticket["created_at"].as_i64(),
        updated_at: ticket["updated_at"].as_i64(),
    };
    let content = ticket["ticket_attributes"]["_default_title_"]
        .as_str()
        .unwrap_or_default();
    Entity::chunk(id, content).with_attributes(&attributes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_contact_content_joins_name_and_email() {
        let contact = json!({
            "id": "c1",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "role": "user"
        });
        let entity = parse_contact(&contact).unwrap();
        assert_eq!(entity.content, "Ada Lovelace ada@example.com");
    }

    #[test]
    fn test_parse_conversation_prefers_source_body() {
        let conversation = json!({
            "id": "conv1",
            "title": "Billing question",
            "source": {"body": "Why was I charged twice?"},
            "state": "open"
        });
        let entity = parse_conversation(&conversation).unwrap();
        assert_eq!(entity.content, "Why was I charged twice?");
    }

    #[test]
    fn test_parse_ticket_requires_id() {
        assert!(parse_ticket(&json!({"ticket_state": "submitted"})).is_none());
    }
}
