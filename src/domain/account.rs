//! Account domain types.
//!
//! Represents Gmail accounts, their OAuth token fields and fetch cadence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AccountId;

/// Default number of minutes between scheduled fetches.
pub const DEFAULT_FETCH_INTERVAL_MINUTES: u32 = 15;

/// A Gmail account registered with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for this account.
    pub id: AccountId,
    /// Email address for this account.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// OAuth access token.
    pub access_token: String,
    /// OAuth refresh token.
    pub refresh_token: Option<String>,
    /// When the access token expires.
    pub token_expiry: Option<DateTime<Utc>>,
    /// Inactive accounts are skipped by the scheduler.
    pub is_active: bool,
    /// Whether scheduled fetching is enabled.
    pub fetch_enabled: bool,
    /// Minutes between scheduled fetches.
    pub fetch_interval_minutes: u32,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Returns true if the scheduler should run fetches for this account.
    pub fn is_schedulable(&self) -> bool {
        self.is_active && self.fetch_enabled
    }
}

/// Fields for registering a new account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
}

/// Partial update of an account's fetch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSettingsUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub fetch_enabled: Option<bool>,
    #[serde(default)]
    pub fetch_interval_minutes: Option<u32>,
}

/// Replacement OAuth tokens for an account.
///
/// `refresh_token` and `token_expiry` are only written when provided.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUpdate {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
}
