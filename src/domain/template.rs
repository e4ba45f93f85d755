//! Reply template domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, TemplateId};

/// A reusable reply template with `{{var}}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier for this template.
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
    /// Optional subject line template.
    pub subject_template: Option<String>,
    /// Body template.
    pub body_template: String,
    /// Category this template is meant for.
    pub category: Option<String>,
    /// Comma-separated tags.
    pub tags: Option<String>,
    /// Number of times the template has been rendered.
    pub usage_count: i64,
    /// When the template was last rendered.
    pub last_used: Option<DateTime<Utc>>,
    /// Owning account, or `None` for a shared template.
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject_template: Option<String>,
    pub body_template: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
}

/// Partial update of a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject_template: Option<String>,
    #[serde(default)]
    pub body_template: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// Output of rendering a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedTemplate {
    /// Rendered subject, `None` when the template has no subject.
    pub subject: Option<String>,
    pub body: String,
}
