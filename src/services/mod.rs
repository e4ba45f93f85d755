//! Business services layer.
//!
//! Services sit between the HTTP API and the infrastructure layer:
//!
//! ```text
//!   API (routes, middleware)
//!          |
//!          v
//!    Services Layer
//!          |
//!          v
//! Infrastructure (Providers, Storage)
//! ```
//!
//! # Services Overview
//!
//! - [`AccountService`], [`CategoryService`], [`TemplateService`]: validated stores
//! - [`ClassifierService`]: keyword rules with an optional hosted model
//! - [`EmailService`] and [`ThreadService`]: stored emails and conversations
//! - [`IngestService`]: fetch, classify, store and thread in one pass
//! - [`Scheduler`]: per-account interval fetches
//! - [`AssistantService`]: reply drafting, summaries and rewrites
//! - [`Metrics`]: request and domain counters

mod account_service;
mod assistant_service;
mod category_service;
mod classifier_service;
mod email_service;
mod error;
mod ingest_service;
mod metrics;
mod scheduler;
mod template_service;
mod thread_service;

pub use account_service::AccountService;
pub use assistant_service::{
    AssistantService, ACTIONS_FAILED, GEMINI_NOT_CONFIGURED, MAX_PROMPT_CHARS, MAX_TONE_CHARS,
    OPENAI_NOT_CONFIGURED, REPLY_FAILED, REWRITE_FAILED, SUMMARY_FAILED,
};
pub use category_service::CategoryService;
pub use classifier_service::{categorize_by_rules, detect_urgency, Analysis, ClassifierService};
pub use email_service::{parse_status, EmailService, RemoteOutcome, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use error::{
    ensure_max_len, ensure_not_blank, ensure_opt_max_len, ensure_range, ServiceError,
    ServiceResult,
};
pub use ingest_service::IngestService;
pub use metrics::{
    Metrics, EMAIL_DELETE_TOTAL, EMAIL_FETCH_TOTAL, EMAIL_MOVE_TOTAL, HTTP_REQUESTS_TOTAL,
    PROMETHEUS_CONTENT_TYPE,
};
pub use scheduler::{
    describe_interval, job_id, AccountSourceFactory, GmailSourceFactory, JobInfo, Scheduler,
    SCHEDULE_INTERVAL_RANGE,
};
pub use template_service::{extract_variables, render_text, TemplateService};
pub use thread_service::{
    generate_thread_id, normalize_subject, ThreadMessage, ThreadService, MAX_THREAD_EMAILS,
    MAX_THREAD_PAGE,
};
