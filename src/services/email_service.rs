//! Email service for stored email records.
//!
//! The [`EmailService`] wraps the email queries with paging limits, status
//! parsing and the remote Gmail side of delete and move.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::account_service::ensure_account_exists;
use super::error::{ensure_not_blank, ensure_range, ServiceError, ServiceResult};
use crate::domain::{AccountId, EmailRecord, EmailRecordId, EmailStatus, NewEmail, ThreadId};
use crate::providers::email::MailSource;
use crate::storage::queries::emails::{self, EmailSearch, Upserted};
use crate::storage::Database;

/// Default page size for listing and searching.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size accepted for listing and searching.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Parses an optional status filter.
pub fn parse_status(status: Option<&str>) -> ServiceResult<Option<EmailStatus>> {
    status
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EmailStatus>().map_err(ServiceError::Validation))
        .transpose()
}

fn validate_page(limit: u32) -> ServiceResult<()> {
    ensure_range("limit", limit as i64, 1, MAX_PAGE_SIZE as i64)
}

/// Outcome of a best-effort remote operation over several messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Service for email persistence operations.
#[derive(Debug, Clone)]
pub struct EmailService {
    db: Database,
}

impl EmailService {
    /// Creates a new email service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fails with `NotFound` when `account_id` names no registered account.
    pub async fn ensure_account(&self, account_id: Option<AccountId>) -> ServiceResult<()> {
        ensure_account_exists(&self.db, account_id).await
    }

    /// Inserts or merges emails by Gmail ID, keeping input order.
    ///
    /// Every referenced account must exist.
    pub async fn upsert(
        &self,
        emails: Vec<NewEmail>,
    ) -> ServiceResult<Vec<Upserted>> {
        let accounts: BTreeSet<AccountId> = emails.iter().filter_map(|e| e.account_id).collect();
        for account_id in accounts {
            self.ensure_account(Some(account_id)).await?;
        }
        Ok(emails::upsert(&self.db, emails).await?)
    }

    /// Gets an email by ID.
    pub async fn get(&self, id: EmailRecordId) -> ServiceResult<EmailRecord> {
        emails::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Email not found".to_string()))
    }

    /// Gets an email by Gmail message ID.
    pub async fn get_by_gmail_id(&self, gmail_id: &str) -> ServiceResult<Option<EmailRecord>> {
        Ok(emails::get_by_gmail_id(&self.db, gmail_id).await?)
    }

    /// Lists emails newest first.
    pub async fn list(
        &self,
        status: Option<EmailStatus>,
        category: Option<String>,
        limit: u32,
        offset: u32,
    ) -> ServiceResult<Vec<EmailRecord>> {
        validate_page(limit)?;
        Ok(emails::list(&self.db, status, category, limit, offset).await?)
    }

    /// Searches emails. Returns one page and the total number of matches.
    pub async fn search(&self, search: EmailSearch) -> ServiceResult<(Vec<EmailRecord>, u64)> {
        validate_page(search.limit)?;
        if let (Some(from), Some(to)) = (search.date_from, search.date_to) {
            if from > to {
                return Err(ServiceError::Validation(
                    "date_from must not be after date_to".to_string(),
                ));
            }
        }

        let total = emails::search_count(&self.db, search.clone()).await?;
        let page = emails::search_page(&self.db, search).await?;
        Ok((page, total))
    }

    /// Emails of a thread, oldest first.
    pub async fn thread_emails(
        &self,
        thread_id: &ThreadId,
        limit: u32,
    ) -> ServiceResult<Vec<EmailRecord>> {
        Ok(emails::list_by_thread(&self.db, thread_id, limit).await?)
    }

    /// Sets the status of the given emails.
    pub async fn mark_status(
        &self,
        ids: &[EmailRecordId],
        status: EmailStatus,
    ) -> ServiceResult<usize> {
        Ok(emails::set_status(&self.db, ids, status).await?)
    }

    /// Soft-deletes emails by Gmail ID. Returns the number changed.
    pub async fn delete_by_gmail_ids(&self, gmail_ids: &[String]) -> ServiceResult<usize> {
        Ok(emails::set_status_by_gmail_ids(&self.db, gmail_ids, EmailStatus::Deleted).await?)
    }

    pub async fn bulk_archive(&self, ids: &[EmailRecordId]) -> ServiceResult<usize> {
        self.mark_status(ids, EmailStatus::Archived).await
    }

    pub async fn bulk_delete(&self, ids: &[EmailRecordId]) -> ServiceResult<usize> {
        self.mark_status(ids, EmailStatus::Deleted).await
    }

    pub async fn bulk_mark_read(&self, ids: &[EmailRecordId], is_read: bool) -> ServiceResult<usize> {
        Ok(emails::set_read(&self.db, ids, is_read).await?)
    }

    pub async fn bulk_star(&self, ids: &[EmailRecordId], is_starred: bool) -> ServiceResult<usize> {
        Ok(emails::set_starred(&self.db, ids, is_starred).await?)
    }

    /// Assigns an email to a thread.
    pub async fn assign_thread(&self, id: EmailRecordId, thread_id: &ThreadId) -> ServiceResult<()> {
        emails::set_thread(&self.db, id, thread_id).await?;
        Ok(())
    }

    /// Trashes messages remotely, one by one. Failures are logged and skipped.
    pub async fn trash_remote(&self, source: &dyn MailSource, gmail_ids: &[String]) -> RemoteOutcome {
        let mut outcome = RemoteOutcome::default();
        for id in gmail_ids {
            match source.trash_message(id).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    warn!(gmail_id = %id, error = %e, "Remote trash failed");
                    outcome.failed += 1;
                }
            }
        }
        info!(
            source = source.source_name(),
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "Remote trash finished"
        );
        outcome
    }

    /// Adds a label remotely, one message at a time. Failures are logged and skipped.
    pub async fn label_remote(
        &self,
        source: &dyn MailSource,
        gmail_ids: &[String],
        label_id: &str,
    ) -> ServiceResult<RemoteOutcome> {
        ensure_not_blank("label_id", label_id)?;

        let mut outcome = RemoteOutcome::default();
        for id in gmail_ids {
            match source.add_label(id, label_id).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    warn!(gmail_id = %id, label_id, error = %e, "Remote label failed");
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::email::{MockMailSource, ProviderError};
    use pretty_assertions::assert_eq;

    async fn service() -> EmailService {
        EmailService::new(Database::open_in_memory().await.unwrap())
    }

    async fn seed(svc: &EmailService) -> Vec<EmailRecordId> {
        let stored = svc
            .upsert(vec![
                NewEmail::new("Invoice #1", "Payment due").gmail_id("g-1"),
                NewEmail::new("Lunch", "Tomorrow?").gmail_id("g-2"),
                NewEmail::new("Invoice #2", "Thanks").gmail_id("g-3"),
            ])
            .await
            .unwrap();
        stored.into_iter().map(|u| u.record.id).collect()
    }

    #[test]
    fn status_parsing() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("")).unwrap(), None);
        assert_eq!(
            parse_status(Some("delete_review")).unwrap(),
            Some(EmailStatus::DeleteReview)
        );
        assert!(matches!(
            parse_status(Some("bogus")),
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn list_validates_limit() {
        let svc = service().await;
        assert!(matches!(
            svc.list(None, None, 0, 0).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.list(None, None, 501, 0).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn upsert_rejects_unknown_account() {
        let svc = service().await;
        let result = svc
            .upsert(vec![NewEmail::new("Hi", "there")
                .gmail_id("g-x")
                .account(AccountId(999))])
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(svc.get_by_gmail_id("g-x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_count_ignores_pagination() {
        let svc = service().await;
        seed(&svc).await;

        let (page, total) = svc
            .search(EmailSearch {
                query: Some("invoice".to_string()),
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn bulk_operations_report_counts() {
        let svc = service().await;
        let ids = seed(&svc).await;

        assert_eq!(svc.bulk_archive(&ids[..2]).await.unwrap(), 2);
        assert_eq!(svc.bulk_star(&ids, true).await.unwrap(), 3);
        assert_eq!(svc.bulk_mark_read(&[ids[2]], true).await.unwrap(), 1);

        let first = svc.get(ids[0]).await.unwrap();
        assert_eq!(first.status, EmailStatus::Archived);
        assert!(first.is_starred);
        assert!(!first.is_read);
    }

    #[tokio::test]
    async fn soft_delete_by_gmail_id() {
        let svc = service().await;
        seed(&svc).await;

        let deleted = svc
            .delete_by_gmail_ids(&["g-1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        let record = svc.get_by_gmail_id("g-1").await.unwrap().unwrap();
        assert_eq!(record.status, EmailStatus::Deleted);
    }

    #[tokio::test]
    async fn remote_trash_is_best_effort() {
        let svc = service().await;
        let mut source = MockMailSource::new();
        source.expect_source_name().return_const("mock");
        source.expect_trash_message().returning(|id| {
            if id == "bad" {
                Err(ProviderError::NotFound(id.to_string()))
            } else {
                Ok(())
            }
        });

        let outcome = svc
            .trash_remote(&source, &["a".to_string(), "bad".to_string(), "b".to_string()])
            .await;
        assert_eq!(
            outcome,
            RemoteOutcome {
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn remote_label_requires_label() {
        let svc = service().await;
        let source = MockMailSource::new();
        let result = svc.label_remote(&source, &["a".to_string()], " ").await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
