use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::db::Database;
use crate::extract::FieldExtractor;
use crate::models::{PoRecord, RawMessage, Sender};
use crate::normalize::TextNormalizer;

pub struct MailboxConfig {
    pub base_url: String,
    pub token: String,
    pub page_size: usize,
}

impl MailboxConfig {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            page_size: 50,
        }
    }

    pub fn from_token_file(base_url: &str, token_file: &Path) -> Result<Self> {
        let token = fs::read_to_string(token_file)
            .with_context(|| format!("Failed to read token file: {:?}", token_file))?;
        Ok(Self::new(base_url, &token))
    }
}

// Wire shapes of the mailbox API. The sender sits one level deeper than we
// keep it, and the HTML body arrives wrapped in a content envelope.

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<ApiMessage>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    from: Option<ApiRecipient>,
    #[serde(default, rename = "receivedDateTime")]
    received: String,
    #[serde(default, rename = "bodyPreview")]
    body_preview: String,
    #[serde(default, rename = "webLink")]
    web_link: String,
    #[serde(default)]
    body: Option<ApiBody>,
}

#[derive(Debug, Deserialize)]
struct ApiRecipient {
    #[serde(rename = "emailAddress")]
    email_address: ApiAddress,
}

#[derive(Debug, Deserialize)]
struct ApiAddress {
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ApiBody {
    #[serde(default)]
    content: String,
}

impl ApiMessage {
    fn into_raw(self) -> RawMessage {
        RawMessage {
            id: self.id,
            subject: self.subject,
            from: self.from.map(|f| Sender {
                name: f.email_address.name,
                address: f.email_address.address,
            }),
            received: self.received,
            body_preview: self.body_preview,
            web_link: self.web_link,
            body_html: self.body.map(|b| b.content).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncStats {
    pub messages_fetched: usize,
    pub records_upserted: usize,
    pub errors: usize,
}

pub struct MailboxClient {
    config: MailboxConfig,
    client: reqwest::blocking::Client,
    normalizer: TextNormalizer,
    extractor: FieldExtractor,
}

impl MailboxClient {
    pub fn new(config: MailboxConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            client,
            normalizer: TextNormalizer::new()?,
            extractor: FieldExtractor::new()?,
        })
    }

    /// Fetches every notification message received in the last `days`
    /// days, following the server's continuation links until the listing
    /// is exhausted.
    pub fn fetch_messages(&self, days: u32) -> Result<Vec<RawMessage>> {
        let since = chrono::Utc::now() - chrono::Duration::days(days as i64);
        let filter = format!(
            "receivedDateTime ge {}",
            since.format("%Y-%m-%dT%H:%M:%SZ")
        );

        let mut messages = Vec::new();
        let first_url = format!("{}/messages", self.config.base_url);
        let mut request = self
            .client
            .get(&first_url)
            .query(&[
                ("$top", self.config.page_size.to_string().as_str()),
                ("$filter", filter.as_str()),
                ("$orderby", "receivedDateTime desc"),
            ])
            .bearer_auth(&self.config.token);

        loop {
            let response = request
                .send()
                .context("Failed to reach the mailbox API")?;

            if !response.status().is_success() {
                let status = response.status();
                let detail = response.text().unwrap_or_default();
                return Err(anyhow!(
                    "Mailbox API request failed with status {}: {}",
                    status,
                    detail
                ));
            }

            let page: MessagePage = response
                .json()
                .context("Failed to decode mailbox API response")?;
            messages.extend(page.value.into_iter().map(ApiMessage::into_raw));

            match page.next_link {
                Some(next) => {
                    // Continuation links come back fully formed, token and
                    // all query parameters included.
                    request = self.client.get(next).bearer_auth(&self.config.token);
                }
                None => break,
            }
        }

        Ok(messages)
    }

    /// Runs each fetched body through the pipeline and upserts the result.
    /// A failure on one record is counted and reported, never fatal to the
    /// batch.
    pub fn sync(&self, db: &Database, days: u32, dry_run: bool) -> Result<SyncStats> {
        let messages = self.fetch_messages(days)?;

        let mut stats = SyncStats {
            messages_fetched: messages.len(),
            ..Default::default()
        };

        for message in messages {
            let record = self.build_record(message);
            if dry_run {
                println!(
                    "[DRY RUN] Would store: {} ({})",
                    record
                        .extracted
                        .candidate_name
                        .as_deref()
                        .unwrap_or(&record.subject),
                    record.id
                );
                continue;
            }
            match db.upsert_record(&record) {
                Ok(()) => stats.records_upserted += 1,
                Err(e) => {
                    stats.errors += 1;
                    eprintln!("  Error storing record {}: {}", record.id, e);
                }
            }
        }

        Ok(stats)
    }

    /// Normalize the HTML body, extract the labeled fields, and join them
    /// with the message envelope. Pure per message; batches have no
    /// cross-record dependency.
    pub fn build_record(&self, message: RawMessage) -> PoRecord {
        let text = self.normalizer.flatten(&message.body_html);
        let extracted = self.extractor.extract(&text);
        PoRecord {
            id: message.id,
            subject: message.subject,
            from: message.from,
            received: message.received,
            body_preview: message.body_preview,
            web_link: message.web_link,
            extracted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MailboxClient {
        MailboxClient::new(MailboxConfig::new("https://mail.example/v1.0/me", "token"))
            .unwrap()
    }

    #[test]
    fn test_build_record_runs_the_pipeline() {
        let message = RawMessage {
            id: "m1".to_string(),
            subject: "PO for Jane Doe".to_string(),
            from: Some(Sender {
                name: "Recruiting".to_string(),
                address: "po@staffing.example".to_string(),
            }),
            received: "2024-03-05T10:00:00Z".to_string(),
            body_preview: "Name of Candidate: Jane Doe".to_string(),
            web_link: "https://outlook.example/m1".to_string(),
            body_html: "<p>Name of Candidate: Jane&nbsp;Doe SST Location: USA</p>\
                        <p>Rate: $55.00/hr</p>"
                .to_string(),
        };

        let record = client().build_record(message);
        assert_eq!(record.id, "m1");
        assert_eq!(record.extracted.candidate_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.extracted.location.as_deref(), Some("USA"));
        assert_eq!(record.extracted.rate.as_deref(), Some("55.00/hr"));
    }

    #[test]
    fn test_build_record_on_empty_body() {
        let message = RawMessage {
            id: "m2".to_string(),
            subject: "Weekly digest".to_string(),
            from: None,
            received: String::new(),
            body_preview: String::new(),
            web_link: String::new(),
            body_html: String::new(),
        };

        let record = client().build_record(message);
        assert_eq!(record.extracted, crate::models::ExtractedFields::default());
    }

    #[test]
    fn test_message_page_decodes_graph_shape() {
        let json = r#"{
            "value": [{
                "id": "AAMk1",
                "subject": "PO for Jane Doe",
                "from": { "emailAddress": { "name": "Recruiting", "address": "po@staffing.example" } },
                "receivedDateTime": "2024-03-05T10:00:00Z",
                "bodyPreview": "Name of Candidate: Jane Doe",
                "webLink": "https://outlook.example/AAMk1",
                "body": { "contentType": "html", "content": "<p>Name of Candidate: Jane Doe SST</p>" }
            }],
            "@odata.nextLink": "https://mail.example/v1.0/me/messages?$skip=50"
        }"#;
        let page: MessagePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.is_some());

        let raw = page.value.into_iter().next().unwrap().into_raw();
        assert_eq!(raw.id, "AAMk1");
        assert_eq!(raw.from.as_ref().unwrap().address, "po@staffing.example");
        assert!(raw.body_html.contains("Name of Candidate"));
    }

    #[test]
    fn test_message_page_tolerates_sparse_messages() {
        let json = r#"{ "value": [{ "id": "AAMk2" }] }"#;
        let page: MessagePage = serde_json::from_str(json).unwrap();
        let raw = page.value.into_iter().next().unwrap().into_raw();
        assert_eq!(raw.id, "AAMk2");
        assert_eq!(raw.from, None);
        assert_eq!(raw.body_html, "");
        assert!(page.next_link.is_none());
    }
}
