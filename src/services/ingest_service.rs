//! Ingest pipeline: fetch, classify, store and thread messages.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::category_service::CategoryService;
use super::classifier_service::ClassifierService;
use super::email_service::EmailService;
use super::error::ServiceResult;
use super::thread_service::{ThreadMessage, ThreadService};
use crate::domain::{AccountId, EmailRecord, NewEmail, ThreadId, NO_SUBJECT};
use crate::providers::email::MailSource;

/// Runs fetched messages through classification, storage and threading.
#[derive(Debug, Clone)]
pub struct IngestService {
    classifier: ClassifierService,
    categories: CategoryService,
    emails: EmailService,
    threads: ThreadService,
}

impl IngestService {
    pub fn new(
        classifier: ClassifierService,
        categories: CategoryService,
        emails: EmailService,
        threads: ThreadService,
    ) -> Self {
        Self {
            classifier,
            categories,
            emails,
            threads,
        }
    }

    /// Fetches up to `max_results` messages from `source` and ingests them.
    ///
    /// Returns the stored records in fetch order.
    pub async fn ingest(
        &self,
        source: &dyn MailSource,
        account_id: Option<AccountId>,
        max_results: u32,
    ) -> ServiceResult<Vec<EmailRecord>> {
        let fetched = source.fetch_emails(max_results).await?;
        let records = self.ingest_messages(fetched, account_id).await?;
        info!(
            source = source.source_name(),
            account_id = ?account_id,
            count = records.len(),
            "Ingested emails"
        );
        Ok(records)
    }

    /// Ingests already fetched messages.
    pub async fn ingest_messages(
        &self,
        messages: Vec<NewEmail>,
        account_id: Option<AccountId>,
    ) -> ServiceResult<Vec<EmailRecord>> {
        // Checked before classification so no category is auto-created for it.
        self.emails.ensure_account(account_id).await?;

        let mut tagged = Vec::with_capacity(messages.len());
        for mut message in messages {
            let subject = message.subject.as_deref().unwrap_or(NO_SUBJECT);
            let body = message
                .body_text
                .as_deref()
                .or(message.snippet.as_deref())
                .unwrap_or("");
            let analysis = self
                .classifier
                .analyze(subject, body, account_id, true)
                .await?;

            message.category = Some(analysis.category);
            message.sentiment = Some(analysis.sentiment);
            message.urgency = Some(analysis.urgency);
            if account_id.is_some() {
                message.account_id = account_id;
            }
            tagged.push(message);
        }

        let stored = self.emails.upsert(tagged).await?;

        let mut touched: BTreeSet<ThreadId> = BTreeSet::new();
        let mut records = Vec::with_capacity(stored.len());
        for upserted in stored {
            let mut record = upserted.record;
            if upserted.created {
                self.categories
                    .increment_count(&record.category, record.account_id)
                    .await?;
            }

            let thread = self
                .threads
                .get_or_create_thread(ThreadMessage::from(&record))
                .await?;
            if record.thread_id.as_ref() != Some(&thread.thread_id) {
                self.emails.assign_thread(record.id, &thread.thread_id).await?;
                record.thread_id = Some(thread.thread_id.clone());
            }
            debug!(email_id = %record.id, thread_id = %thread.thread_id, "Threaded email");
            touched.insert(thread.thread_id);
            records.push(record);
        }

        for thread_id in &touched {
            self.threads.update_thread_stats(thread_id).await?;
        }

        Ok(records)
    }
}
