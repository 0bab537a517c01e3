//! Request and response records for the sendwithus API.
//!
//! # Design
//! Request-side fields that may be left unset are `Option`s and every field
//! skips serialization when empty, so a partial `Version` update only sends
//! what the caller filled in. Response-side records default every missing
//! field and ignore unknown ones.
//!
//! `Sender` and `Log` extend another record on the wire; here they hold it as
//! a flattened field instead.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Free-form substitution data handed to the template engine.
pub type TemplateData = serde_json::Map<String, serde_json::Value>;

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

/// An email template with its versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub created: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<Version>,
}

/// A single version of a template. Also the payload for creating templates
/// and versions, where `None` fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// An email address with an optional display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

/// The "from" side of an email: a recipient plus a reply-to address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(flatten)]
    pub recipient: Recipient,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Sender {
    pub fn new(recipient: Recipient) -> Self {
        Self {
            recipient,
            reply_to: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.recipient.address
    }

    pub fn name(&self) -> Option<&str> {
        self.recipient.name.as_deref()
    }
}

/// A named file, content base64-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl Attachment {
    /// Build an attachment from raw bytes, encoding them as base64.
    pub fn from_bytes(id: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        Self {
            id: id.into(),
            data: STANDARD.encode(bytes),
        }
    }
}

/// Payload for `POST /send`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Email {
    #[serde(rename = "email_id", skip_serializing_if = "String::is_empty")]
    pub template_id: String,
    pub recipient: Recipient,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Recipient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub email_data: TemplateData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<Attachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esp_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
}

impl Email {
    pub fn new(template_id: impl Into<String>, recipient: Recipient) -> Self {
        Self {
            template_id: template_id.into(),
            recipient,
            ..Self::default()
        }
    }
}

/// Payload for activating a drip campaign for one recipient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Drip {
    pub recipient: Recipient,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Recipient>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub email_data: TemplateData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esp_account: Option<String>,
}

impl Drip {
    pub fn new(recipient: Recipient) -> Self {
        Self {
            recipient,
            ..Self::default()
        }
    }
}

/// Email details echoed back by `POST /send`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SentEmail {
    pub name: String,
    pub version_name: String,
    pub locale: String,
}

/// Acknowledgement for a sent email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SendResponse {
    pub success: bool,
    pub status: String,
    pub receipt_id: String,
    pub email: SentEmail,
}

/// One event in the history of a sent email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogEvent {
    pub object: String,
    pub created: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// A send log entry. Carries the fields of its latest `LogEvent` inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Log {
    #[serde(flatten)]
    pub event: LogEvent,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub recipient_address: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub email_id: String,
    #[serde(default)]
    pub email_name: String,
    #[serde(default)]
    pub email_version: String,
    #[serde(default)]
    pub events_url: String,
}

impl Log {
    pub fn event(&self) -> &LogEvent {
        &self.event
    }
}

/// Filters for `GET /logs`. Zero means "not set" for every field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    pub count: u32,
    pub offset: u32,
    pub created_gt: i64,
    pub created_gte: i64,
    pub created_lt: i64,
    pub created_lte: i64,
}

impl LogQuery {
    /// Encode the non-zero filters as `key=value` pairs joined by `&`.
    pub fn to_query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if self.count != 0 {
            query.append_pair("count", &self.count.to_string());
        }
        if self.offset != 0 {
            query.append_pair("offset", &self.offset.to_string());
        }
        let bounds = [
            ("created_gt", self.created_gt),
            ("created_gte", self.created_gte),
            ("created_lt", self.created_lt),
            ("created_lte", self.created_lte),
        ];
        for (key, value) in bounds {
            if value != 0 {
                query.append_pair(key, &value.to_string());
            }
        }
        query.finish()
    }
}

/// Email details echoed back by `POST /resend`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResentEmail {
    pub name: String,
    pub version_name: String,
}

/// Acknowledgement for a resent log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogResend {
    pub success: bool,
    pub status: String,
    #[serde(rename = "log_id")]
    pub id: String,
    pub email: ResentEmail,
}

/// Payload for `POST /render`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub template_data: TemplateData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

impl RenderRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderedTemplate {
    pub id: String,
    pub name: String,
    pub version_name: String,
    pub locale: String,
}

/// A template rendered with the supplied data, without sending it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderResponse {
    pub success: bool,
    pub status: String,
    pub template: RenderedTemplate,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_skips_unset_fields() {
        let version = Version {
            subject: Some("New subject".to_string()),
            ..Version::default()
        };
        let body = serde_json::to_value(&version).unwrap();
        assert_eq!(body, json!({"subject": "New subject"}));
    }

    #[test]
    fn version_keeps_explicit_empty_string() {
        let version = Version {
            html: Some(String::new()),
            ..Version::default()
        };
        let body = serde_json::to_value(&version).unwrap();
        assert_eq!(body, json!({"html": ""}));
    }

    #[test]
    fn minimal_email_has_only_template_and_recipient() {
        let email = Email::new("tem_123", Recipient::new("a@example.com"));
        let body = serde_json::to_value(&email).unwrap();
        assert_eq!(
            body,
            json!({"email_id": "tem_123", "recipient": {"address": "a@example.com"}})
        );
    }

    #[test]
    fn sender_serializes_flat() {
        let sender = Sender {
            recipient: Recipient::named("from@example.com", "Company"),
            reply_to: Some("help@example.com".to_string()),
        };
        let body = serde_json::to_value(&sender).unwrap();
        assert_eq!(
            body,
            json!({"address": "from@example.com", "name": "Company", "reply_to": "help@example.com"})
        );
        assert_eq!(sender.address(), "from@example.com");
        assert_eq!(sender.name(), Some("Company"));
    }

    #[test]
    fn full_email_serializes_all_sections() {
        let mut data = TemplateData::new();
        data.insert("first_name".to_string(), json!("Ada"));
        let email = Email {
            cc: vec![Recipient::new("cc@example.com")],
            sender: Some(Sender::new(Recipient::new("from@example.com"))),
            email_data: data,
            tags: vec!["welcome".to_string()],
            inline: Some(Attachment::from_bytes("logo.png", b"png")),
            esp_account: Some("esp_1".to_string()),
            ..Email::new("tem_123", Recipient::new("a@example.com"))
        };
        let body = serde_json::to_value(&email).unwrap();
        assert_eq!(body["cc"], json!([{"address": "cc@example.com"}]));
        assert_eq!(body["sender"], json!({"address": "from@example.com"}));
        assert_eq!(body["email_data"], json!({"first_name": "Ada"}));
        assert_eq!(body["inline"], json!({"id": "logo.png", "data": "cG5n"}));
        assert_eq!(body["esp_account"], "esp_1");
        assert!(body.get("bcc").is_none());
        assert!(body.get("files").is_none());
        assert!(body.get("version_name").is_none());
    }

    #[test]
    fn log_decodes_event_fields_inline() {
        let log: Log = serde_json::from_str(
            r#"{"id":"log_1","object":"log","created":1400000000,"type":"sent",
                "message":"Sent","status":"sent","email_id":"tem_1","email_name":"Welcome",
                "events_url":"/logs/log_1/events","unknown":true}"#,
        )
        .unwrap();
        assert_eq!(log.id, "log_1");
        assert_eq!(log.event().kind, "sent");
        assert_eq!(log.event().created, 1400000000);
        assert_eq!(log.email_name, "Welcome");
        assert!(log.recipient_address.is_empty());
    }

    #[test]
    fn template_decodes_with_missing_fields() {
        let template: Template =
            serde_json::from_str(r#"{"id":"tem_1","versions":[{"id":"ver_1","published":true}]}"#)
                .unwrap();
        assert_eq!(template.id, "tem_1");
        assert!(template.tags.is_empty());
        assert_eq!(template.versions[0].published, Some(true));
        assert!(template.versions[0].html.is_none());
    }

    #[test]
    fn log_query_omits_zero_filters() {
        let query = LogQuery {
            count: 10,
            offset: 0,
            ..LogQuery::default()
        };
        assert_eq!(query.to_query_string(), "count=10");
    }

    #[test]
    fn log_query_encodes_all_bounds() {
        let query = LogQuery {
            count: 5,
            offset: 20,
            created_gt: 1,
            created_gte: 2,
            created_lt: 3,
            created_lte: 4,
        };
        assert_eq!(
            query.to_query_string(),
            "count=5&offset=20&created_gt=1&created_gte=2&created_lt=3&created_lte=4"
        );
    }

    #[test]
    fn empty_log_query_is_empty_string() {
        assert_eq!(LogQuery::default().to_query_string(), "");
    }
}
