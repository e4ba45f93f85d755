//! Thread service for grouping emails into conversations.
//!
//! Provides:
//! - Subject normalization (reply and forward prefixes stripped)
//! - Thread lookup by provider id or normalized subject, with creation
//! - Recomputation of derived thread statistics
//! - Listing, member retrieval and archiving

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::info;

use super::error::{ensure_range, ServiceError, ServiceResult};
use crate::domain::{split_participants, AccountId, EmailRecord, EmailThread, ThreadId};
use crate::storage::queries::threads::{self, NewThread, ThreadFilter};
use crate::storage::queries::emails;
use crate::storage::Database;

static REPLY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(re|fwd|fw):\s*").expect("prefix pattern is valid"));

/// Characters of the normalized subject used in a generated thread id.
const THREAD_ID_SUBJECT_CHARS: usize = 50;

/// Largest page of threads accepted by [`ThreadService::list`].
pub const MAX_THREAD_PAGE: u32 = 200;

/// Largest number of member emails returned for one thread.
pub const MAX_THREAD_EMAILS: u32 = 500;

/// Normalizes a subject for thread matching.
///
/// One leading `re:`, `fwd:` or `fw:` is removed, whitespace runs collapse to a
/// single space and the result is lowercased.
pub fn normalize_subject(subject: &str) -> String {
    let stripped = REPLY_PREFIX.replace(subject, "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Builds the id of a thread created without a provider conversation id.
pub fn generate_thread_id(normalized_subject: &str, at: DateTime<Utc>) -> ThreadId {
    let prefix: String = normalized_subject
        .chars()
        .take(THREAD_ID_SUBJECT_CHARS)
        .collect();
    ThreadId(format!("thread_{}_{}", prefix, at.timestamp_micros()))
}

/// The message a thread is looked up for.
#[derive(Debug, Clone, Default)]
pub struct ThreadMessage<'a> {
    /// Provider conversation id, when known.
    pub thread_id: Option<&'a ThreadId>,
    pub subject: &'a str,
    pub from_email: Option<&'a str>,
    pub to_email: Option<&'a str>,
    pub sent_at: Option<DateTime<Utc>>,
    pub account_id: Option<AccountId>,
}

impl<'a> From<&'a EmailRecord> for ThreadMessage<'a> {
    fn from(email: &'a EmailRecord) -> Self {
        Self {
            thread_id: email.thread_id.as_ref(),
            subject: &email.subject,
            from_email: email.from_email.as_deref(),
            to_email: email.to_email.as_deref(),
            sent_at: Some(email.created_at),
            account_id: email.account_id,
        }
    }
}

/// Service for thread operations.
#[derive(Debug, Clone)]
pub struct ThreadService {
    db: Database,
}

impl ThreadService {
    /// Creates a new thread service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Finds the thread a message belongs to, creating one if needed.
    ///
    /// A known provider conversation id wins. Otherwise the normalized subject
    /// is matched within the account (or across all threads without one).
    pub async fn get_or_create_thread(&self, message: ThreadMessage<'_>) -> ServiceResult<EmailThread> {
        if let Some(thread_id) = message.thread_id {
            if let Some(existing) = threads::get_by_thread_id(&self.db, thread_id).await? {
                return Ok(existing);
            }
        }

        let normalized = normalize_subject(message.subject);
        if let Some(existing) =
            threads::find_by_subject(&self.db, &normalized, message.account_id).await?
        {
            return Ok(existing);
        }

        let mut participants = BTreeSet::new();
        if let Some(from) = message.from_email.map(str::trim).filter(|f| !f.is_empty()) {
            participants.insert(from.to_string());
        }
        if let Some(to) = message.to_email {
            participants.extend(split_participants(to));
        }

        let thread_id = message
            .thread_id
            .cloned()
            .unwrap_or_else(|| generate_thread_id(&normalized, Utc::now()));

        let created = threads::insert(
            &self.db,
            &NewThread {
                thread_id,
                subject: normalized,
                participants: participants.into_iter().collect(),
                first_message_at: message.sent_at,
                account_id: message.account_id,
            },
        )
        .await?;
        info!(thread_id = %created.thread_id, "Created thread");
        Ok(created)
    }

    /// Gets a thread by its thread ID.
    pub async fn get(&self, thread_id: &ThreadId) -> ServiceResult<EmailThread> {
        threads::get_by_thread_id(&self.db, thread_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Thread not found".to_string()))
    }

    /// Recomputes a thread's statistics from its member emails.
    pub async fn update_thread_stats(&self, thread_id: &ThreadId) -> ServiceResult<EmailThread> {
        threads::recompute_stats(&self.db, thread_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Thread not found".to_string()))
    }

    /// Member emails of a thread, oldest first.
    pub async fn get_thread_emails(
        &self,
        thread_id: &ThreadId,
        limit: u32,
    ) -> ServiceResult<Vec<EmailRecord>> {
        ensure_range("limit", limit as i64, 1, MAX_THREAD_EMAILS as i64)?;
        Ok(emails::list_by_thread(&self.db, thread_id, limit).await?)
    }

    /// Lists threads, most recently active first.
    pub async fn list(&self, filter: &ThreadFilter) -> ServiceResult<Vec<EmailThread>> {
        ensure_range("limit", filter.limit as i64, 1, MAX_THREAD_PAGE as i64)?;
        Ok(threads::list(&self.db, filter).await?)
    }

    pub async fn archive(&self, thread_id: &ThreadId) -> ServiceResult<()> {
        self.set_archived(thread_id, true).await
    }

    pub async fn unarchive(&self, thread_id: &ThreadId) -> ServiceResult<()> {
        self.set_archived(thread_id, false).await
    }

    async fn set_archived(&self, thread_id: &ThreadId, archived: bool) -> ServiceResult<()> {
        if !threads::set_archived(&self.db, thread_id, archived).await? {
            return Err(ServiceError::NotFound("Thread not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewEmail;
    use pretty_assertions::assert_eq;

    async fn service() -> (ThreadService, Database) {
        let db = Database::open_in_memory().await.unwrap();
        (ThreadService::new(db.clone()), db)
    }

    fn message(subject: &str) -> ThreadMessage<'_> {
        ThreadMessage {
            subject,
            from_email: Some("ana@example.com"),
            ..Default::default()
        }
    }

    #[test]
    fn normalize_strips_one_prefix() {
        assert_eq!(normalize_subject("Re: Budget  Review"), "budget review");
        assert_eq!(normalize_subject("FWD:Budget"), "budget");
        assert_eq!(normalize_subject("fw:   Budget"), "budget");
        assert_eq!(normalize_subject("Re: Re: Budget"), "re: budget");
        assert_eq!(normalize_subject("  Spaced\tout \n subject "), "spaced out subject");
    }

    #[test]
    fn generated_id_truncates_subject() {
        let at = DateTime::from_timestamp_micros(1_700_000_000_123_456).unwrap();
        let id = generate_thread_id(&"x".repeat(80), at);
        assert_eq!(id.0, format!("thread_{}_1700000000123456", "x".repeat(50)));
    }

    #[tokio::test]
    async fn replies_join_the_original_thread() {
        let (svc, _) = service().await;
        let first = svc.get_or_create_thread(message("Budget")).await.unwrap();
        let reply = svc.get_or_create_thread(message("RE: budget")).await.unwrap();
        assert_eq!(first.thread_id, reply.thread_id);
        assert_eq!(first.subject, "budget");
        assert!(first.thread_id.0.starts_with("thread_budget_"));
    }

    #[tokio::test]
    async fn provider_thread_id_is_used() {
        let (svc, _) = service().await;
        let provider_id = ThreadId::from("gmail-thread-1");
        let created = svc
            .get_or_create_thread(ThreadMessage {
                thread_id: Some(&provider_id),
                to_email: Some("b@example.com, c@example.com"),
                ..message("Hello")
            })
            .await
            .unwrap();
        assert_eq!(created.thread_id, provider_id);
        assert_eq!(
            created.participants,
            vec!["ana@example.com", "b@example.com", "c@example.com"]
        );

        // Same provider id with a different subject still resolves to it.
        let again = svc
            .get_or_create_thread(ThreadMessage {
                thread_id: Some(&provider_id),
                ..message("Other subject")
            })
            .await
            .unwrap();
        assert_eq!(again.id, created.id);
    }

    #[tokio::test]
    async fn subject_match_is_scoped_to_account() {
        let (svc, db) = service().await;
        let alice = crate::storage::queries::accounts::insert(
            &db,
            &crate::domain::NewAccount {
                email: "alice@example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let global = svc.get_or_create_thread(message("Status")).await.unwrap();
        let scoped = svc
            .get_or_create_thread(ThreadMessage {
                account_id: Some(alice.id),
                ..message("Status")
            })
            .await
            .unwrap();
        assert_ne!(global.thread_id, scoped.thread_id);
    }

    #[tokio::test]
    async fn stats_follow_member_emails() {
        let (svc, db) = service().await;
        let thread = svc.get_or_create_thread(message("Plan")).await.unwrap();

        let stored = emails::upsert(
            &db,
            vec![
                NewEmail {
                    is_read: Some(true),
                    to_email: Some("zed@example.com".to_string()),
                    ..NewEmail::new("Plan", "v1").from_email("ana@example.com")
                },
                NewEmail::new("Re: Plan", "v2").from_email("bob@example.com"),
            ],
        )
        .await
        .unwrap();
        for upserted in &stored {
            emails::set_thread(&db, upserted.record.id, &thread.thread_id)
                .await
                .unwrap();
        }

        let updated = svc.update_thread_stats(&thread.thread_id).await.unwrap();
        assert_eq!(updated.message_count, 2);
        assert!(updated.has_unread);
        assert_eq!(
            updated.participants,
            vec!["ana@example.com", "bob@example.com", "zed@example.com"]
        );
        assert_eq!(updated.participant_count, 3);

        let members = svc.get_thread_emails(&thread.thread_id, 100).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].body_text.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn archive_hides_from_default_listing() {
        let (svc, _) = service().await;
        let thread = svc.get_or_create_thread(message("Old news")).await.unwrap();

        svc.archive(&thread.thread_id).await.unwrap();
        assert!(svc.list(&ThreadFilter::default()).await.unwrap().is_empty());
        assert_eq!(
            svc.list(&ThreadFilter::default().archived()).await.unwrap().len(),
            1
        );

        svc.unarchive(&thread.thread_id).await.unwrap();
        assert_eq!(svc.list(&ThreadFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_thread_is_not_found() {
        let (svc, _) = service().await;
        let missing = ThreadId::from("nope");
        assert!(matches!(
            svc.archive(&missing).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.update_thread_stats(&missing).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
