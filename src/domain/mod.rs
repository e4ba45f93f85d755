//! Domain layer types for the mailroom backend.
//!
//! This module contains the core entities: accounts, categories, email
//! records, reply templates and conversation threads.

mod account;
mod category;
mod email;
mod template;
mod thread;
mod types;

pub use account::{
    Account, AccountSettingsUpdate, NewAccount, TokenUpdate, DEFAULT_FETCH_INTERVAL_MINUTES,
};
pub use category::{
    default_categories, Category, CategoryUpdate, NewCategory, DEFAULT_COLOR, UNLABELED,
};
pub use email::{
    truncate_chars, EmailRecord, EmailStatus, NewEmail, Sentiment, Urgency, NO_SUBJECT,
    SNIPPET_MAX_CHARS,
};
pub use template::{NewTemplate, RenderedTemplate, Template, TemplateUpdate};
pub use thread::{split_participants, EmailThread};
pub use types::{AccountId, CategoryId, EmailRecordId, TemplateId, ThreadId};
