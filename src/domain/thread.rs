//! Thread domain types.
//!
//! A thread groups emails that share a provider conversation id or a
//! normalized subject line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, ThreadId};

/// A conversation thread with derived statistics.
///
/// `message_count`, `participants`, `has_unread` and the message timestamps
/// are recomputed from member emails, never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailThread {
    /// Local row identifier.
    pub id: i64,
    /// Thread identifier shared with member emails.
    pub thread_id: ThreadId,
    /// Normalized subject (prefix-stripped, lowercased).
    pub subject: String,
    /// Number of member emails.
    pub message_count: i64,
    /// Number of distinct participants.
    pub participant_count: i64,
    /// Distinct participant addresses, sorted.
    pub participants: Vec<String>,
    /// Whether any member email is unread.
    pub has_unread: bool,
    /// Archived threads are hidden from the default listing.
    pub is_archived: bool,
    pub first_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Owning account, if known.
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Splits a stored comma-separated participant list.
pub fn split_participants(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
