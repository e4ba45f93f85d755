//! Offline mail source backed by a JSON file of sample messages.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{MailSource, ProviderError, Result, MAX_FETCH_RESULTS};
use crate::domain::{truncate_chars, NewEmail, SNIPPET_MAX_CHARS};

const BUNDLED_SAMPLES: &str = include_str!("../../../data/sample_emails.json");

/// Sender used when a sample has none.
pub const SAMPLE_SENDER: &str = "sample@example.com";

/// One entry of a sample file.
#[derive(Debug, Deserialize)]
struct SampleEmail {
    gmail_id: Option<String>,
    subject: Option<String>,
    #[serde(default)]
    snippet: String,
    body_text: Option<String>,
    from_email: Option<String>,
    to_email: Option<String>,
    is_read: Option<bool>,
    is_starred: Option<bool>,
}

impl SampleEmail {
    fn into_new_email(self, idx: usize) -> NewEmail {
        let body_text = self.body_text.unwrap_or_else(|| self.snippet.clone());
        NewEmail {
            gmail_id: Some(self.gmail_id.unwrap_or_else(|| format!("sample-{idx}"))),
            subject: self.subject,
            snippet: Some(truncate_chars(&self.snippet, SNIPPET_MAX_CHARS)),
            body_text: Some(body_text),
            from_email: Some(self.from_email.unwrap_or_else(|| SAMPLE_SENDER.to_string())),
            to_email: self.to_email,
            is_read: self.is_read,
            is_starred: self.is_starred,
            ..Default::default()
        }
    }
}

/// Mail source that replays sample messages.
///
/// With no path the bundled set is used. Remote operations are no-ops.
#[derive(Debug, Clone, Default)]
pub struct SampleSource {
    path: Option<PathBuf>,
}

impl SampleSource {
    /// Uses the bundled sample set.
    pub fn bundled() -> Self {
        Self::default()
    }

    /// Reads samples from `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    async fn load_raw(&self) -> Result<Option<String>> {
        let Some(path) = &self.path else {
            return Ok(Some(BUNDLED_SAMPLES.to_string()));
        };
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Sample email file not found");
                Ok(None)
            }
            Err(e) => Err(ProviderError::Internal(format!(
                "read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl MailSource for SampleSource {
    fn source_name(&self) -> &'static str {
        "sample"
    }

    async fn fetch_emails(&self, max_results: u32) -> Result<Vec<NewEmail>> {
        let Some(raw) = self.load_raw().await? else {
            return Ok(Vec::new());
        };
        let samples: Vec<SampleEmail> = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Internal(format!("invalid sample file: {}", e)))?;

        let limit = max_results.min(MAX_FETCH_RESULTS) as usize;
        let emails: Vec<NewEmail> = samples
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, sample)| sample.into_new_email(idx))
            .collect();

        debug!(count = emails.len(), "Loaded sample emails");
        Ok(emails)
    }

    async fn trash_message(&self, _message_id: &str) -> Result<()> {
        Ok(())
    }

    async fn add_label(&self, _message_id: &str, _label_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn bundled_samples_load() {
        let emails = SampleSource::bundled().fetch_emails(50).await.unwrap();
        assert!(!emails.is_empty());
        assert_eq!(emails[0].gmail_id.as_deref(), Some("sample-0"));
        assert!(emails.iter().all(|e| e.from_email.is_some()));
        assert!(emails.iter().all(|e| e.body_text.is_some()));
    }

    #[tokio::test]
    async fn limit_is_respected() {
        let emails = SampleSource::bundled().fetch_emails(3).await.unwrap();
        assert_eq!(emails.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = SampleSource::from_path(dir.path().join("nope.json"));
        assert!(source.fetch_emails(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn defaults_are_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(
            &path,
            r#"[{"subject": "One", "snippet": "first"}, {"gmail_id": "keep-me", "snippet": "second", "from_email": "x@example.com"}]"#,
        )
        .unwrap();

        let emails = SampleSource::from_path(&path).fetch_emails(10).await.unwrap();
        assert_eq!(emails[0].gmail_id.as_deref(), Some("sample-0"));
        assert_eq!(emails[0].from_email.as_deref(), Some(SAMPLE_SENDER));
        assert_eq!(emails[0].body_text.as_deref(), Some("first"));
        assert_eq!(emails[1].gmail_id.as_deref(), Some("keep-me"));
        assert_eq!(emails[1].subject, None);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let result = SampleSource::from_path(&path).fetch_emails(10).await;
        assert!(matches!(result, Err(ProviderError::Internal(_))));
    }
}
