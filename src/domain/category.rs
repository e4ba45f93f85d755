//! Category domain types.
//!
//! Categories form the labeling taxonomy. A category with no account is
//! global and visible to every account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, CategoryId};

/// Name given to emails that no rule or model could place.
pub const UNLABELED: &str = "Unlabeled";

/// Color used when a category is created without one.
pub const DEFAULT_COLOR: &str = "#808080";

/// A labeling category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier for this category.
    pub id: CategoryId,
    /// Display name, unique within its scope.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Hex color, e.g. "#4CAF50".
    pub color: String,
    /// Icon name for clients.
    pub icon: Option<String>,
    /// System categories cannot be deleted.
    pub is_system: bool,
    /// Number of emails tagged with this category.
    pub email_count: i64,
    /// Owning account, or `None` for a global category.
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Only set when seeding built-in categories.
    #[serde(skip)]
    pub is_system: bool,
}

/// Partial update of a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// The built-in categories seeded at startup.
pub mod default_categories {
    use super::NewCategory;

    /// (name, description, color) for each built-in category, in rule order.
    pub const ALL: [(&str, &str, &str); 6] = [
        ("Billing", "Invoices, payments, receipts", "#4CAF50"),
        ("Account Info", "Account settings, security", "#2196F3"),
        ("Work Update", "Meetings, projects, reports", "#FF9800"),
        ("Promotion", "Sales, offers, deals", "#9C27B0"),
        ("Spam", "Unwanted emails", "#F44336"),
        ("Personal", "Personal correspondence", "#00BCD4"),
    ];

    /// Returns the built-in categories as global system categories.
    pub fn new_categories() -> Vec<NewCategory> {
        ALL.iter()
            .map(|(name, description, color)| NewCategory {
                name: (*name).to_string(),
                description: Some((*description).to_string()),
                color: Some((*color).to_string()),
                icon: None,
                account_id: None,
                is_system: true,
            })
            .collect()
    }

    /// Returns the names of the built-in categories.
    pub fn names() -> Vec<&'static str> {
        ALL.iter().map(|(name, _, _)| *name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_categories_are_global_system() {
        let cats = default_categories::new_categories();
        assert_eq!(cats.len(), 6);
        assert!(cats.iter().all(|c| c.is_system && c.account_id.is_none()));
        assert_eq!(cats[0].name, "Billing");
        assert_eq!(cats[0].color.as_deref(), Some("#4CAF50"));
    }

    #[test]
    fn new_category_deserializes_with_defaults() {
        let new: NewCategory = serde_json::from_str(r#"{"name":"Travel"}"#).unwrap();
        assert_eq!(new.name, "Travel");
        assert!(!new.is_system);
        assert!(new.account_id.is_none());
    }
}
