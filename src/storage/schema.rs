//! SQL schema definitions as const strings.
//!
//! Timestamps are stored as RFC 3339 text with microsecond precision so that
//! lexical ordering matches chronological ordering.

/// SQL to create the accounts table.
pub const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    token_expiry TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    fetch_enabled INTEGER NOT NULL DEFAULT 1,
    fetch_interval_minutes INTEGER NOT NULL DEFAULT 15,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create the categories table.
pub const CREATE_CATEGORIES: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    color TEXT NOT NULL DEFAULT '#808080',
    icon TEXT,
    is_system INTEGER NOT NULL DEFAULT 0,
    email_count INTEGER NOT NULL DEFAULT 0,
    account_id INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// One category per name within a scope; global categories use scope 0.
pub const CREATE_CATEGORY_INDEXES: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_scope_name
    ON categories(name, IFNULL(account_id, 0));
CREATE INDEX IF NOT EXISTS idx_categories_account ON categories(account_id)
"#;

/// SQL to create the emails table.
pub const CREATE_EMAILS: &str = r#"
CREATE TABLE IF NOT EXISTS emails (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    gmail_id TEXT UNIQUE,
    account_id INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
    thread_id TEXT,
    subject TEXT NOT NULL DEFAULT 'No Subject',
    snippet TEXT,
    body_text TEXT,
    from_email TEXT,
    to_email TEXT,
    has_attachments INTEGER NOT NULL DEFAULT 0,
    category TEXT NOT NULL DEFAULT 'Unlabeled',
    sentiment TEXT NOT NULL DEFAULT 'Neutral',
    urgency TEXT NOT NULL DEFAULT 'Normal',
    status TEXT NOT NULL DEFAULT 'keep',
    is_read INTEGER NOT NULL DEFAULT 0,
    is_starred INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create email indexes.
pub const CREATE_EMAIL_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_emails_account ON emails(account_id);
CREATE INDEX IF NOT EXISTS idx_emails_thread ON emails(thread_id);
CREATE INDEX IF NOT EXISTS idx_emails_status ON emails(status);
CREATE INDEX IF NOT EXISTS idx_emails_category ON emails(category);
CREATE INDEX IF NOT EXISTS idx_emails_created ON emails(created_at DESC)
"#;

/// SQL to create the reply templates table.
pub const CREATE_TEMPLATES: &str = r#"
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    subject_template TEXT,
    body_template TEXT NOT NULL,
    category TEXT,
    tags TEXT,
    usage_count INTEGER NOT NULL DEFAULT 0,
    last_used TEXT,
    account_id INTEGER REFERENCES accounts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create the threads table.
pub const CREATE_THREADS: &str = r#"
CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL UNIQUE,
    subject TEXT NOT NULL,
    message_count INTEGER NOT NULL DEFAULT 0,
    participant_count INTEGER NOT NULL DEFAULT 0,
    participants TEXT NOT NULL DEFAULT '',
    has_unread INTEGER NOT NULL DEFAULT 0,
    is_archived INTEGER NOT NULL DEFAULT 0,
    first_message_at TEXT,
    last_message_at TEXT,
    account_id INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// SQL to create thread indexes.
pub const CREATE_THREAD_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_threads_subject ON threads(subject);
CREATE INDEX IF NOT EXISTS idx_threads_account ON threads(account_id);
CREATE INDEX IF NOT EXISTS idx_threads_last_message ON threads(last_message_at DESC)
"#;

/// Returns all schema creation statements in order.
pub fn all_migrations() -> Vec<&'static str> {
    vec![
        CREATE_ACCOUNTS,
        CREATE_CATEGORIES,
        CREATE_CATEGORY_INDEXES,
        CREATE_EMAILS,
        CREATE_EMAIL_INDEXES,
        CREATE_TEMPLATES,
        CREATE_THREADS,
        CREATE_THREAD_INDEXES,
    ]
}
