//! Gmail API mail source.
//!
//! This module provides a [`MailSource`] implementation over the Gmail REST API.
//!
//! # Authentication
//!
//! Credentials come from an authorized-user token file (`token.json`) or from the
//! tokens stored on an [`Account`]. An expired token-file credential is refreshed
//! once against Google's token endpoint and written back. The interactive consent
//! flow is not performed here.
//!
//! # API Usage
//!
//! - `users.messages.list` for recent message ids
//! - `users.messages.get` (full format) for headers and MIME bodies
//! - `users.messages.trash` and `users.messages.modify` for remote changes

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{MailSource, ProviderError, Result, MAX_FETCH_RESULTS};
use crate::domain::{truncate_chars, Account, AccountId, NewEmail, ThreadId, NO_SUBJECT, SNIPPET_MAX_CHARS};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Message detail requests kept in flight during a fetch.
const CONCURRENT_GETS: usize = 8;

/// Sender used when a message has no `From` header.
pub const UNKNOWN_SENDER: &str = "Unknown sender";

/// Gmail API message list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail API message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    thread_id: Option<String>,
    label_ids: Option<Vec<String>>,
    snippet: Option<String>,
    payload: Option<GmailPart>,
}

/// Gmail message part. The top-level payload has the same shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPart {
    mime_type: Option<String>,
    filename: Option<String>,
    headers: Option<Vec<GmailHeader>>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPart>>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GmailBody {
    data: Option<String>,
}

/// Gmail modify request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest {
    add_label_ids: Vec<String>,
}

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// An authorized-user credential as written to `token.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUserToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Unknown keys (scopes, universe domain, ...) survive a rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizedUserToken {
    /// Whether the access token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Decoded body text gathered from a MIME tree.
#[derive(Debug, Default, PartialEq)]
struct ExtractedBody {
    plain: Vec<String>,
    html: Vec<String>,
}

impl ExtractedBody {
    /// Plain parts joined by newline, or the HTML parts when there is no plain text.
    fn into_text(self) -> Option<String> {
        if !self.plain.is_empty() {
            Some(self.plain.join("\n"))
        } else if !self.html.is_empty() {
            Some(self.html.join("\n"))
        } else {
            None
        }
    }
}

/// Gmail API mail source.
///
/// # Example
///
/// ```ignore
/// use mailroom::providers::email::{GmailProvider, MailSource};
///
/// let provider = GmailProvider::from_token_file("token.json").await?;
/// let emails = provider.fetch_emails(25).await?;
/// ```
pub struct GmailProvider {
    /// HTTP client for API requests.
    client: reqwest::Client,
    api_base: String,
    access_token: String,
    account_id: Option<AccountId>,
}

impl GmailProvider {
    /// Creates a provider with an already valid access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: GMAIL_API_BASE.to_string(),
            access_token: access_token.into(),
            account_id: None,
        }
    }

    /// Creates a provider from an account's stored tokens.
    pub fn from_account(account: &Account) -> Self {
        if account
            .token_expiry
            .is_some_and(|expiry| expiry <= Utc::now())
        {
            warn!(account_id = %account.id, "Stored Gmail token has expired");
        }
        Self {
            account_id: Some(account.id),
            ..Self::new(account.access_token.clone())
        }
    }

    /// Loads an authorized-user token file, refreshing it once if expired.
    pub async fn from_token_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let client = reqwest::Client::new();
        let mut token = read_token_file(path).await?;

        if token.is_expired(Utc::now()) {
            if !token.can_refresh() {
                return Err(ProviderError::Authentication(
                    "token expired and cannot be refreshed".to_string(),
                ));
            }
            refresh_token(&client, &mut token).await?;
            write_token_file(path, &token).await?;
            info!(path = %path.display(), "Gmail token refreshed");
        }

        Ok(Self {
            client,
            ..Self::new(token.token)
        })
    }

    /// Applies a whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.client = client;
        }
        self
    }

    /// Builds authorization headers for API requests.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base, endpoint);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
    }

    /// Makes an authenticated POST request whose response body is ignored.
    async fn post_no_response<B: Serialize>(&self, endpoint: &str, body: Option<&B>) -> Result<()> {
        let url = format!("{}{}", self.api_base, endpoint);
        let mut headers = self.auth_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut request = self.client.post(&url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(handle_error(response).await);
        }
        Ok(())
    }

    /// Converts a full-format Gmail message to a storable email.
    fn message_to_email(&self, msg: GmailMessage) -> NewEmail {
        let payload = msg.payload.unwrap_or_default();

        let subject = header(&payload, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string());
        let from = header(&payload, "From").unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        let to = header(&payload, "To");

        let labels = msg.label_ids.unwrap_or_default();
        let is_read = !labels.iter().any(|l| l == "UNREAD");
        let is_starred = labels.iter().any(|l| l == "STARRED");

        let mut extracted = ExtractedBody::default();
        extract_body(&payload, &mut extracted);

        NewEmail {
            gmail_id: Some(msg.id),
            account_id: self.account_id,
            thread_id: msg.thread_id.map(ThreadId::from),
            subject: Some(subject),
            snippet: msg
                .snippet
                .map(|s| truncate_chars(&s, SNIPPET_MAX_CHARS)),
            body_text: extracted.into_text(),
            from_email: Some(from),
            to_email: to,
            has_attachments: Some(has_attachment(&payload)),
            is_read: Some(is_read),
            is_starred: Some(is_starred),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MailSource for GmailProvider {
    fn source_name(&self) -> &'static str {
        "gmail"
    }

    async fn fetch_emails(&self, max_results: u32) -> Result<Vec<NewEmail>> {
        let max_results = max_results.clamp(1, MAX_FETCH_RESULTS);
        let list: MessageListResponse = self
            .get("/messages", &[("maxResults", max_results.to_string())])
            .await?;

        let refs = list.messages.unwrap_or_default();
        let emails: Vec<NewEmail> = stream::iter(refs)
            .map(|message| async move {
                let endpoint = format!("/messages/{}", message.id);
                self.get::<GmailMessage>(&endpoint, &[("format", "full".to_string())])
                    .await
                    .map(|full| self.message_to_email(full))
            })
            .buffered(CONCURRENT_GETS)
            .try_collect()
            .await?;

        debug!(count = emails.len(), "Fetched Gmail messages");
        Ok(emails)
    }

    async fn trash_message(&self, message_id: &str) -> Result<()> {
        let endpoint = format!("/messages/{}/trash", message_id);
        self.post_no_response::<()>(&endpoint, None).await
    }

    async fn add_label(&self, message_id: &str, label_id: &str) -> Result<()> {
        let endpoint = format!("/messages/{}/modify", message_id);
        let body = ModifyRequest {
            add_label_ids: vec![label_id.to_string()],
        };
        self.post_no_response(&endpoint, Some(&body)).await
    }
}

/// Maps an API error response to a provider error.
async fn handle_error(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status.as_u16() {
        401 => ProviderError::Authentication(format!("unauthorized: {}", body)),
        404 => ProviderError::NotFound(body),
        429 => ProviderError::RateLimited {
            retry_after_secs: None,
        },
        400 => ProviderError::InvalidRequest(body),
        _ => ProviderError::Provider(format!("API error ({}): {}", status, body)),
    }
}

async fn read_token_file(path: &Path) -> Result<AuthorizedUserToken> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        ProviderError::Authentication(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| ProviderError::Authentication(format!("invalid token file: {}", e)))
}

async fn write_token_file(path: &Path, token: &AuthorizedUserToken) -> Result<()> {
    let json = serde_json::to_string_pretty(token)
        .map_err(|e| ProviderError::Internal(format!("serialize token: {}", e)))?;
    tokio::fs::write(PathBuf::from(path), json)
        .await
        .map_err(|e| ProviderError::Internal(format!("write token file: {}", e)))
}

/// Exchanges the refresh token for a new access token.
async fn refresh_token(client: &reqwest::Client, token: &mut AuthorizedUserToken) -> Result<()> {
    let (Some(refresh), Some(client_id), Some(client_secret)) = (
        token.refresh_token.as_deref(),
        token.client_id.as_deref(),
        token.client_secret.as_deref(),
    ) else {
        return Err(ProviderError::Authentication(
            "no refresh credentials available".to_string(),
        ));
    };

    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];
    let url = token.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URL);

    let response = client
        .post(url)
        .form(&params)
        .send()
        .await
        .map_err(|e| ProviderError::Connection(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Authentication(format!(
            "token refresh failed ({}): {}",
            status, body
        )));
    }

    let refreshed: TokenResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::Internal(format!("parse token response: {}", e)))?;

    token.token = refreshed.access_token;
    token.expiry = refreshed
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
    Ok(())
}

fn header(payload: &GmailPart, name: &str) -> Option<String> {
    payload.headers.as_ref().and_then(|headers| {
        headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    })
}

fn decode_part_data(data: &str) -> Option<String> {
    // Gmail emits URL-safe base64, usually without padding.
    let trimmed = data.trim_end_matches('=');
    BASE64_URL_SAFE_NO_PAD
        .decode(trimmed)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Collects decoded bodies depth-first. Data on a non-text part counts as plain.
fn extract_body(part: &GmailPart, out: &mut ExtractedBody) {
    let mime = part.mime_type.as_deref().unwrap_or("");

    if let Some(text) = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .and_then(decode_part_data)
        .filter(|t| !t.is_empty())
    {
        if mime.starts_with("text/html") {
            out.html.push(text);
        } else {
            out.plain.push(text);
        }
    }

    for nested in part.parts.iter().flatten() {
        extract_body(nested, out);
    }
}

fn has_attachment(part: &GmailPart) -> bool {
    part.filename.as_deref().is_some_and(|f| !f.is_empty())
        || part.parts.iter().flatten().any(has_attachment)
}
