//! Email domain types.
//!
//! Represents persisted email records and the tags attached to them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, EmailRecordId, ThreadId};

/// Subject stored when a message has none.
pub const NO_SUBJECT: &str = "No Subject";

/// Maximum number of characters kept in a snippet.
pub const SNIPPET_MAX_CHARS: usize = 2000;

/// Lifecycle status of a stored email.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    /// Kept in the inbox.
    #[default]
    Keep,
    /// Flagged for the user to review before deletion.
    DeleteReview,
    /// Soft-deleted.
    Deleted,
    /// Archived.
    Archived,
}

impl EmailStatus {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Keep => "keep",
            EmailStatus::DeleteReview => "delete_review",
            EmailStatus::Deleted => "deleted",
            EmailStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(EmailStatus::Keep),
            "delete_review" => Ok(EmailStatus::DeleteReview),
            "deleted" => Ok(EmailStatus::Deleted),
            "archived" => Ok(EmailStatus::Archived),
            other => Err(format!("unknown email status: {other}")),
        }
    }
}

/// Overall tone of an email.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    /// Parses a model label such as `POSITIVE` or `negative`.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "positive" | "label_1" => Sentiment::Positive,
            "negative" | "label_0" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

/// How quickly an email needs attention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    High,
    #[default]
    Normal,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "High",
            Urgency::Normal => "Normal",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("high") {
            Urgency::High
        } else {
            Urgency::Normal
        }
    }
}

/// A persisted email record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Local row identifier.
    pub id: EmailRecordId,
    /// Gmail message id, unique when present.
    pub gmail_id: Option<String>,
    /// Owning account.
    pub account_id: Option<AccountId>,
    /// Conversation this email belongs to.
    pub thread_id: Option<ThreadId>,
    pub subject: String,
    /// Short preview, at most 2000 characters.
    pub snippet: Option<String>,
    pub body_text: Option<String>,
    pub from_email: Option<String>,
    /// Comma-separated recipients.
    pub to_email: Option<String>,
    pub has_attachments: bool,
    /// Category name assigned by classification.
    pub category: String,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    pub status: EmailStatus,
    pub is_read: bool,
    pub is_starred: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An email to insert or merge into the store.
///
/// Every field is optional: on update only the fields that are `Some`
/// overwrite the stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEmail {
    #[serde(default)]
    pub gmail_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub to_email: Option<String>,
    #[serde(default)]
    pub has_attachments: Option<bool>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub status: Option<EmailStatus>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub is_starred: Option<bool>,
}

impl NewEmail {
    /// Creates an email with a subject and body.
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            body_text: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn gmail_id(mut self, id: impl Into<String>) -> Self {
        self.gmail_id = Some(id.into());
        self
    }

    pub fn from_email(mut self, from: impl Into<String>) -> Self {
        self.from_email = Some(from.into());
        self
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }
}

/// Truncates `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
