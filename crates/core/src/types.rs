use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Who authored a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageAuthor {
    /// Typed by the visitor on the host page.
    User,
    /// Produced by the widget's responder (bot, agent or canned reply).
    System,
}

impl MessageAuthor {
    pub fn is_user(self) -> bool {
        matches!(self, MessageAuthor::User)
    }
}

/// A single chat message held by the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    /// Position in the conversation, assigned at append time.
    pub sequence: u64,
    pub content: String,
    pub author: MessageAuthor,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sequence: u64, content: impl Into<String>, author: MessageAuthor) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            content: content.into(),
            author,
            timestamp: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.author.is_user()
    }
}

/// Page context attached to message hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_data: HashMap<String, serde_json::Value>,
}

/// A file the visitor attached to an outgoing message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

impl FileAttachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }

    /// Lower-cased extension including the leading dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()))
    }
}

/// Outcome of `sendMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Synchronous reply, when the responder produced one inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(message_id: Uuid, conversation_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id),
            conversation_id,
            reply: None,
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            conversation_id: None,
            reply: None,
            error: Some(reason.into()),
        }
    }
}

/// Satisfaction survey answer submitted from the widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveyFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub conversation_id: String,
    pub visitor_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub is_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_online: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VisitorInfo {
    /// Anonymous visitor known only by its durable identifier.
    pub fn anonymous(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: None,
            email: None,
            is_online: true,
            first_seen_at: now,
            last_seen_at: now,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_extension() {
        assert_eq!(
            FileAttachment::new("Report.PDF", "application/pdf", 10).extension(),
            Some(".pdf".to_string())
        );
        assert_eq!(FileAttachment::new("README", "text/plain", 1).extension(), None);
        assert_eq!(FileAttachment::new(".bashrc", "text/plain", 1).extension(), None);
    }

    #[test]
    fn test_send_result_wire_shape() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(SendResult::sent(id, Some("conv-1".into()))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["conversationId"], "conv-1");
        assert!(json.get("error").is_none());

        let rejected = SendResult::rejected("empty message");
        assert!(!rejected.success);
        assert_eq!(rejected.error.as_deref(), Some("empty message"));
    }
}
