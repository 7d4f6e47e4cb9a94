use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub time: String,
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub title: String,
    pub items: Vec<ScheduleItem>,
}

/// One chunk of extracted guide text tied to a source page and section.
#[derive(Debug, Clone)]
pub struct PageChunk {
    pub id: String,
    pub text: String,
    pub page: u32,
    pub section: String,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub filename: String,
    pub page_count: usize,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub schedule: Vec<ScheduleDay>,
}

/// Pointer from an answer back to a supporting section/page of the guide.
/// Identity is the (section, page) pair; the excerpt never participates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub section: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub document_id: String,
    pub question: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleGuide {
    pub slug: String,
    pub name: String,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One conversation turn. Immutable after creation; lives until the
/// conversation is reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, citations: Option<Vec<Citation>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            citations,
        }
    }
}
