//! Mail source trait definition.
//!
//! This module defines the [`MailSource`] trait which abstracts over the places
//! messages are fetched from (the Gmail API, a bundled sample set). The ingest
//! pipeline and the Gmail routes only talk to sources through this trait.

use async_trait::async_trait;

use crate::domain::NewEmail;

/// Result type alias for mail source operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during mail source operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider-specific error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Upper bound on messages a single fetch returns.
pub const MAX_FETCH_RESULTS: u32 = 50;

/// A place messages can be fetched from and modified in.
///
/// # Example
///
/// ```ignore
/// use mailroom::providers::email::{MailSource, SampleSource};
///
/// async fn preview(source: &dyn MailSource) {
///     for email in source.fetch_emails(10).await.unwrap_or_default() {
///         println!("{}", email.subject.unwrap_or_default());
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Short name used in logs and metric labels.
    fn source_name(&self) -> &'static str;

    /// Fetches up to `max_results` recent messages, newest first.
    ///
    /// `max_results` is capped at [`MAX_FETCH_RESULTS`].
    async fn fetch_emails(&self, max_results: u32) -> Result<Vec<NewEmail>>;

    /// Moves a message to the provider's trash.
    async fn trash_message(&self, message_id: &str) -> Result<()>;

    /// Adds a provider label to a message.
    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display() {
        let auth_err = ProviderError::Authentication("token expired".to_string());
        assert_eq!(auth_err.to_string(), "authentication failed: token expired");

        let rate_err = ProviderError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert!(rate_err.to_string().contains("rate limit"));

        let not_found = ProviderError::NotFound("msg-123".to_string());
        assert!(not_found.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn mock_source_reports_fetches() {
        let mut source = MockMailSource::new();
        source.expect_source_name().return_const("mock");
        source
            .expect_fetch_emails()
            .withf(|max| *max == 5)
            .returning(|_| Ok(vec![NewEmail::new("Hi", "Body")]));

        let emails = source.fetch_emails(5).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(source.source_name(), "mock");
    }
}
